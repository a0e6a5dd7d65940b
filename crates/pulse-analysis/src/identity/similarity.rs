use pulse_config::IdentityConfig;
use pulse_core::AuthorAlias;
use unicode_normalization::UnicodeNormalization;

const MIN_EMAIL_TOKENS: usize = 2;
const MIN_EMAIL_KEY_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchPolicy {
    pub threshold: f64,
    pub filler_tokens: Vec<String>,
}

impl MatchPolicy {
    pub fn from_config(config: &IdentityConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            filler_tokens: config.filler_tokens.clone(),
        }
    }

    fn is_filler(&self, token: &str) -> bool {
        self.filler_tokens.iter().any(|filler| filler == token)
    }
}

/// Pre-normalised comparison material for one alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasFingerprint {
    pub email: Option<String>,
    pub login: Option<String>,
    pub keys: Vec<String>,
}

impl AliasFingerprint {
    pub fn new(alias: &AuthorAlias, policy: &MatchPolicy) -> Self {
        let mut keys = Vec::new();

        if let Some(name) = alias.name.as_deref() {
            push_key(&mut keys, tokens(name, policy));
        }

        if let Some(local) = alias
            .email
            .as_deref()
            .and_then(|email| email.split('@').next())
        {
            let email_tokens = tokens(local, policy);
            let meaningful_chars = email_tokens.iter().map(String::len).sum::<usize>();
            if email_tokens.len() >= MIN_EMAIL_TOKENS || meaningful_chars >= MIN_EMAIL_KEY_CHARS {
                push_key(&mut keys, email_tokens);
            }
        }

        if let Some(login) = alias.login.as_deref() {
            push_key(&mut keys, tokens(login, policy));
        }

        Self {
            email: alias.email.as_deref().map(|email| email.trim().to_lowercase()),
            login: alias.login.as_deref().map(|login| login.trim().to_lowercase()),
            keys,
        }
    }

    pub fn matches(&self, other: &Self, policy: &MatchPolicy) -> bool {
        if self.email.is_some() && self.email == other.email {
            return true;
        }
        if self.login.is_some() && self.login == other.login {
            return true;
        }

        self.keys.iter().any(|left| {
            other
                .keys
                .iter()
                .any(|right| levenshtein_ratio(left, right) > policy.threshold)
        })
    }
}

/// Lower-cased, transliterated, punctuation-free, sorted word tokens with
/// single characters and filler words removed.
pub fn tokens(text: &str, policy: &MatchPolicy) -> Vec<String> {
    let ascii = text
        .nfkd()
        .filter(char::is_ascii)
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>();

    let mut tokens = ascii
        .split_whitespace()
        .filter(|token| token.len() > 1 && !policy.is_filler(token))
        .map(str::to_owned)
        .collect::<Vec<_>>();
    tokens.sort();
    tokens.dedup();
    tokens
}

fn push_key(keys: &mut Vec<String>, tokens: Vec<String>) {
    if tokens.is_empty() {
        return;
    }
    let key = tokens.join(" ");
    if !keys.contains(&key) {
        keys.push(key);
    }
}

/// Similarity in `[0, 1]` derived from the edit distance where insertions and
/// deletions cost 1 and substitutions cost 2: `(len_a + len_b - dist) / (len_a + len_b)`.
pub fn levenshtein_ratio(left: &str, right: &str) -> f64 {
    let left = left.chars().collect::<Vec<_>>();
    let right = right.chars().collect::<Vec<_>>();
    let total = left.len() + right.len();
    if total == 0 {
        return 1.0;
    }

    let mut previous = (0..=right.len()).collect::<Vec<_>>();
    let mut current = vec![0usize; right.len() + 1];

    for (row, left_char) in left.iter().enumerate() {
        current[0] = row + 1;
        for (column, right_char) in right.iter().enumerate() {
            let substitution = if left_char == right_char { 0 } else { 2 };
            current[column + 1] = (previous[column] + substitution)
                .min(previous[column + 1] + 1)
                .min(current[column] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    let distance = previous[right.len()];
    (total - distance) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> MatchPolicy {
        MatchPolicy::from_config(&IdentityConfig::default())
    }

    #[test]
    fn levenshtein_ratio_matches_indel_similarity() {
        assert_eq!(levenshtein_ratio("abc", "abc"), 1.0);
        assert_eq!(levenshtein_ratio("", ""), 1.0);
        assert_eq!(levenshtein_ratio("abc", ""), 0.0);
        assert!((levenshtein_ratio("kitten", "sitting") - 8.0 / 13.0).abs() < 1e-9);
        assert!((levenshtein_ratio("jane smith", "john smith") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn tokens_transliterate_strip_punctuation_and_fillers() {
        let policy = policy();
        assert_eq!(tokens("José  Müller-Lüdenscheidt", &policy), vec![
            "jose",
            "ludenscheidt",
            "muller"
        ]);
        assert_eq!(tokens("J. Doe", &policy), vec!["doe"]);
        assert_eq!(tokens("jane+github@noreply", &policy), vec!["jane"]);
    }

    #[test]
    fn email_local_part_needs_two_tokens_or_ten_characters() {
        let policy = policy();
        let short = AliasFingerprint::new(&AuthorAlias::new("", "jane@co.com", None), &policy);
        assert!(short.keys.is_empty());

        let dotted =
            AliasFingerprint::new(&AuthorAlias::new("", "jane.doe@personal.com", None), &policy);
        assert_eq!(dotted.keys, vec!["doe jane"]);

        let long = AliasFingerprint::new(&AuthorAlias::new("", "janedoe1984@x.io", None), &policy);
        assert_eq!(long.keys, vec!["janedoe1984"]);
    }

    #[test]
    fn fingerprints_match_on_email_login_or_similar_tokens() {
        let policy = policy();
        let jane = AliasFingerprint::new(&AuthorAlias::new("Jane Doe", "jane@co.com", None), &policy);
        let personal = AliasFingerprint::new(
            &AuthorAlias::new("J. Doe", "jane.doe@personal.com", None),
            &policy,
        );
        assert!(jane.matches(&personal, &policy));

        let same_email =
            AliasFingerprint::new(&AuthorAlias::new("Robot", "JANE@co.com", None), &policy);
        assert!(jane.matches(&same_email, &policy));

        let login_a = AliasFingerprint::new(&AuthorAlias::new("A", "a@x.io", Some("octo")), &policy);
        let login_b = AliasFingerprint::new(&AuthorAlias::new("B", "b@y.io", Some("Octo")), &policy);
        assert!(login_a.matches(&login_b, &policy));

        let john = AliasFingerprint::new(&AuthorAlias::new("John Smith", "js@a.io", None), &policy);
        let other_jane =
            AliasFingerprint::new(&AuthorAlias::new("Jane Smith", "jsm@b.io", None), &policy);
        assert!(!john.matches(&other_jane, &policy));
    }
}
