use serde::{Deserialize, Serialize};

pub type AuthorId = i64;

/// One raw authorship signature as seen in commit metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuthorAlias {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
}

impl AuthorAlias {
    pub fn new(name: &str, email: &str, login: Option<&str>) -> Self {
        Self {
            name: normalize_field(Some(name)),
            email: normalize_field(Some(email)),
            login: normalize_field(login),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.login.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorIdentity {
    pub id: AuthorId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub aliases: Vec<AuthorAlias>,
}

impl AuthorIdentity {
    pub fn has_alias(&self, alias: &AuthorAlias) -> bool {
        self.aliases.iter().any(|known| known == alias)
    }

    /// Returns `true` when the alias was not known before.
    pub fn add_alias(&mut self, alias: AuthorAlias) -> bool {
        if self.has_alias(&alias) {
            return false;
        }
        if self.name.is_none() {
            self.name = alias.name.clone();
        }
        if self.email.is_none() {
            self.email = alias.email.clone();
        }
        self.aliases.push(alias);
        true
    }
}

fn normalize_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_new_trims_and_drops_blank_fields() {
        let alias = AuthorAlias::new("  Jane Doe ", "", Some("  "));
        assert_eq!(alias.name.as_deref(), Some("Jane Doe"));
        assert_eq!(alias.email, None);
        assert_eq!(alias.login, None);
        assert!(!alias.is_empty());
        assert!(AuthorAlias::new(" ", "", None).is_empty());
    }

    #[test]
    fn add_alias_is_idempotent_and_fills_canonical_fields() {
        let mut identity = AuthorIdentity {
            id: 1,
            name: None,
            email: None,
            active: true,
            aliases: Vec::new(),
        };
        let alias = AuthorAlias::new("Jane Doe", "jane@co.com", None);

        assert!(identity.add_alias(alias.clone()));
        assert!(!identity.add_alias(alias));
        assert_eq!(identity.aliases.len(), 1);
        assert_eq!(identity.name.as_deref(), Some("Jane Doe"));
        assert_eq!(identity.email.as_deref(), Some("jane@co.com"));
    }
}
