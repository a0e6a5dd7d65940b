use pulse_config::MetricsConfig;
use pulse_core::{CalculatedCommit, CalculatedPatch, SECONDS_PER_DAY, WindowData};
use pulse_store::IdentityStore;

use crate::aggregate::aggregate;
use crate::collaboration;
use crate::commits::{BugfixClassifier, prepare_commits};
use crate::error::EngineError;
use crate::finalize::finalize_patches;
use crate::identity::AuthorResolver;
use crate::outliers;
use crate::patches::{join_commits, prepare_patches};
use crate::uploc;

pub struct WindowContext<'a> {
    pub metrics: &'a MetricsConfig,
    pub resolver: &'a AuthorResolver,
    pub classifier: &'a BugfixClassifier,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculatedWindow {
    pub commits: Vec<CalculatedCommit>,
    pub patches: Vec<CalculatedPatch>,
}

pub fn calculate_window<S>(
    data: WindowData,
    store: &S,
    context: &WindowContext<'_>,
) -> Result<CalculatedWindow, EngineError>
where
    S: IdentityStore + ?Sized,
{
    let WindowData {
        commits,
        patches,
        rewrites,
        pull_request_commits,
    } = data;

    let commits = prepare_commits(
        commits,
        &patches,
        context.resolver,
        store,
        context.classifier,
    )?;
    let mut patches = join_commits(prepare_patches(patches, context.metrics), &commits);

    let grace_secs = i64::from(context.metrics.uploc_grace_days) * SECONDS_PER_DAY;
    let totals = uploc::accumulate(&rewrites, &commits, grace_secs);
    uploc::apply(&mut patches, &totals);

    let segments = outliers::segment(&patches);
    collaboration::classify(&mut patches, context.metrics);

    let commits = aggregate(
        commits,
        &patches,
        &segments,
        &pull_request_commits,
        context.metrics,
    );
    let patches = finalize_patches(patches);

    Ok(CalculatedWindow { commits, patches })
}
