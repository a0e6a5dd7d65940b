use std::collections::HashMap;

use pulse_core::{AuthorAlias, AuthorIdentity};

use super::similarity::{AliasFingerprint, MatchPolicy};

#[derive(Debug)]
pub struct IdentityIndex {
    identities: Vec<AuthorIdentity>,
    fingerprints: Vec<Vec<AliasFingerprint>>,
    exact: HashMap<AuthorAlias, usize>,
    by_email: HashMap<String, usize>,
    by_login: HashMap<String, usize>,
}

impl IdentityIndex {
    pub fn build(mut identities: Vec<AuthorIdentity>, policy: &MatchPolicy) -> Self {
        identities.sort_by_key(|identity| identity.id);

        let mut exact = HashMap::new();
        let mut by_email = HashMap::new();
        let mut by_login = HashMap::new();
        let mut fingerprints = Vec::with_capacity(identities.len());

        for (position, identity) in identities.iter().enumerate() {
            let mut prints = Vec::with_capacity(identity.aliases.len());
            for alias in &identity.aliases {
                exact.entry(alias.clone()).or_insert(position);
                let print = AliasFingerprint::new(alias, policy);
                if let Some(email) = print.email.clone() {
                    by_email.entry(email).or_insert(position);
                }
                if let Some(login) = print.login.clone() {
                    by_login.entry(login).or_insert(position);
                }
                prints.push(print);
            }
            fingerprints.push(prints);
        }

        Self {
            identities,
            fingerprints,
            exact,
            by_email,
            by_login,
        }
    }

    pub fn identities(&self) -> &[AuthorIdentity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn find_exact(&self, alias: &AuthorAlias) -> Option<&AuthorIdentity> {
        self.exact
            .get(alias)
            .map(|position| &self.identities[*position])
    }

    /// First identity in id order with any alias matching `alias`.
    pub fn find_fuzzy(&self, alias: &AuthorAlias, policy: &MatchPolicy) -> Option<&AuthorIdentity> {
        let print = AliasFingerprint::new(alias, policy);

        // Email and login hits are O(1); token similarity only has to beat
        // them to an earlier identity.
        let direct = [
            print.email.as_ref().and_then(|email| self.by_email.get(email)),
            print.login.as_ref().and_then(|login| self.by_login.get(login)),
        ]
        .into_iter()
        .flatten()
        .copied()
        .min();
        let scan_limit = direct.unwrap_or(self.identities.len());

        let by_tokens = self.fingerprints[..scan_limit]
            .iter()
            .position(|prints| prints.iter().any(|known| known.matches(&print, policy)));

        by_tokens
            .or(direct)
            .map(|position| &self.identities[position])
    }
}
