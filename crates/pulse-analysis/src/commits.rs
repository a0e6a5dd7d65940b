use std::collections::{HashMap, HashSet};

use petgraph::graphmap::DiGraphMap;
use pulse_core::{AuthorAlias, AuthorId, RawCommit, RawPatch, SECONDS_PER_HOUR};
use pulse_store::IdentityStore;
use regex::{Regex, RegexBuilder};

use crate::error::EngineError;
use crate::identity::AuthorResolver;

/// Age reported for commits without any parent loaded in the window.
pub const MISSING_PARENT_AGE: i64 = -1;

const FIX_LABEL_PATTERN: &str = r"^\s*(?:bug|hot)?fix(?:\([^)\n]*\))?!?:";

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCommit {
    pub raw: RawCommit,
    pub aid: AuthorId,
    pub cid: AuthorId,
    pub is_merge: bool,
    pub is_bugfix: bool,
    pub age: i64,
    pub hours_measured: f64,
}

#[derive(Debug, Clone)]
pub struct BugfixClassifier {
    keywords: Option<Regex>,
    label: Regex,
}

impl BugfixClassifier {
    pub fn new(keywords: &[String]) -> Result<Self, regex::Error> {
        let alternatives = keywords
            .iter()
            .map(|keyword| keyword.trim())
            .filter(|keyword| !keyword.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>();

        let keywords = if alternatives.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
                    .case_insensitive(true)
                    .build()?,
            )
        };
        let label = RegexBuilder::new(FIX_LABEL_PATTERN)
            .case_insensitive(true)
            .build()?;

        Ok(Self { keywords, label })
    }

    pub fn is_bugfix(&self, message: &str) -> bool {
        self.label.is_match(message)
            || self
                .keywords
                .as_ref()
                .is_some_and(|keywords| keywords.is_match(message))
    }
}

/// Resolves identities and derives per-commit attributes for one window.
/// Output is ordered by authored time, then commit id; duplicate commit ids
/// keep their first occurrence.
pub fn prepare_commits<S>(
    mut commits: Vec<RawCommit>,
    patches: &[RawPatch],
    resolver: &AuthorResolver,
    store: &S,
    classifier: &BugfixClassifier,
) -> Result<Vec<PreparedCommit>, EngineError>
where
    S: IdentityStore + ?Sized,
{
    commits.sort_by(|left, right| {
        left.atime
            .cmp(&right.atime)
            .then_with(|| left.commit_id.cmp(&right.commit_id))
    });
    let mut seen = HashSet::new();
    commits.retain(|commit| seen.insert(commit.commit_id.clone()));

    let ages = commit_ages(&commits, patches);

    let mut resolved = HashMap::<AuthorAlias, AuthorId>::new();
    let mut resolve = |alias: AuthorAlias| -> Result<AuthorId, EngineError> {
        if let Some(id) = resolved.get(&alias) {
            return Ok(*id);
        }
        let id = resolver.resolve(store, &alias)?.id;
        resolved.insert(alias, id);
        Ok(id)
    };

    let mut prepared = Vec::with_capacity(commits.len());
    for raw in commits {
        let aid = resolve(raw.author_alias())?;
        let cid = resolve(raw.committer_alias())?;
        let age = ages
            .get(raw.commit_id.as_str())
            .copied()
            .unwrap_or(MISSING_PARENT_AGE);
        prepared.push(PreparedCommit {
            aid,
            cid,
            is_merge: raw.nparents > 1,
            is_bugfix: classifier.is_bugfix(&raw.message),
            age,
            hours_measured: 0.0,
            raw,
        });
    }

    measure_hours(&mut prepared);
    Ok(prepared)
}

/// Seconds since the closest parent authored in the window, or
/// [`MISSING_PARENT_AGE`]. Parent links come from patch parent ids and the
/// commit's own parent list; links authored after the child are ignored.
pub fn commit_ages(commits: &[RawCommit], patches: &[RawPatch]) -> HashMap<String, i64> {
    let atimes = commits
        .iter()
        .map(|commit| (commit.commit_id.as_str(), commit.atime))
        .collect::<HashMap<_, _>>();

    let mut parents = DiGraphMap::<&str, ()>::new();
    for commit in commits {
        parents.add_node(commit.commit_id.as_str());
        for parent in &commit.parent_ids {
            parents.add_edge(commit.commit_id.as_str(), parent.as_str(), ());
        }
    }
    for patch in patches {
        if let Some(parent) = patch.parent_commit_id.as_deref().filter(|id| !id.is_empty()) {
            parents.add_edge(patch.commit_id.as_str(), parent, ());
        }
    }

    commits
        .iter()
        .map(|commit| {
            let age = parents
                .neighbors(commit.commit_id.as_str())
                .filter_map(|parent| atimes.get(parent))
                .map(|parent_atime| commit.atime - parent_atime)
                .filter(|delta| *delta >= 0)
                .min()
                .unwrap_or(MISSING_PARENT_AGE);
            (commit.commit_id.clone(), age)
        })
        .collect()
}

fn measure_hours(commits: &mut [PreparedCommit]) {
    let mut previous_by_author = HashMap::<AuthorId, i64>::new();
    for commit in commits.iter_mut() {
        let gap = previous_by_author
            .insert(commit.aid, commit.raw.atime)
            .map(|previous| commit.raw.atime - previous);
        let age = (commit.age >= 0).then_some(commit.age);

        let seconds = match (age, gap) {
            (Some(age), Some(gap)) => age.min(gap),
            (Some(age), None) => age,
            (None, Some(gap)) => gap,
            (None, None) => 0,
        };
        commit.hours_measured = seconds as f64 / SECONDS_PER_HOUR as f64;
    }
}
