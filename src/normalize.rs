//! Provider key-format rules
//!
//! Every provider declares a display name; this module maps that name to the
//! key format the provider accepts and rewrites non-conforming keys into a
//! conforming shape. Normalization is total, deterministic and idempotent.
//! It is also lossy: truncation and character substitution can make two
//! distinct canonical keys collide on the provider side, and that collision
//! is not detected here. The resolution manager logs a warning whenever the
//! rewritten key differs from the canonical one, since the provider-side
//! name becomes a permanent alias the operator has to track.

use once_cell::sync::Lazy;
use regex::Regex;

/// Format rule for one provider family.
struct KeyFormat {
    /// Full-key acceptance test.
    pattern: Regex,
    /// Character-level filter used while rewriting.
    allowed: fn(char) -> bool,
    /// Substitute for characters the provider rejects.
    replacement: char,
    /// Whether the provider folds keys to upper case.
    uppercase: bool,
    /// Provider-side length limit in characters.
    max_len: Option<usize>,
}

impl KeyFormat {
    fn is_valid(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        if let Some(max) = self.max_len {
            if key.chars().count() > max {
                return false;
            }
        }
        self.pattern.is_match(key)
    }

    fn rewrite(&self, key: &str) -> String {
        if self.is_valid(key) {
            return key.to_string();
        }
        let mut out = String::with_capacity(key.len());
        for c in key.chars() {
            let c = if self.uppercase {
                c.to_ascii_uppercase()
            } else {
                c
            };
            if (self.allowed)(c) {
                out.push(c);
            } else {
                out.push(self.replacement);
            }
        }
        if out.is_empty() {
            out.push(self.replacement);
        }
        if !self.pattern.is_match(&out) {
            out.insert(0, self.replacement);
        }
        if let Some(max) = self.max_len {
            if out.chars().count() > max {
                out = out.chars().take(max).collect();
            }
        }
        out
    }
}

/// Strict environment-variable format shared by the local providers.
static ENV_FORMAT: Lazy<KeyFormat> = Lazy::new(|| KeyFormat {
    pattern: Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("env key pattern"),
    allowed: |c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_',
    replacement: '_',
    uppercase: true,
    max_len: None,
});

/// Anything printable goes; for providers without naming constraints.
static PERMISSIVE_FORMAT: Lazy<KeyFormat> = Lazy::new(|| KeyFormat {
    pattern: Regex::new(r"^[^\x00-\x1F\x7F]+$").expect("permissive key pattern"),
    allowed: |c| !c.is_control(),
    replacement: '_',
    uppercase: false,
    max_len: None,
});

static AWS_FORMAT: Lazy<KeyFormat> = Lazy::new(|| KeyFormat {
    pattern: Regex::new(r"^[A-Za-z0-9_.\-/+=@]+$").expect("aws key pattern"),
    allowed: |c| c.is_ascii_alphanumeric() || "_.-/+=@".contains(c),
    replacement: '_',
    uppercase: false,
    max_len: Some(512),
});

static GCP_FORMAT: Lazy<KeyFormat> = Lazy::new(|| KeyFormat {
    pattern: Regex::new(r"^[A-Za-z0-9_-]+$").expect("gcp key pattern"),
    allowed: |c| c.is_ascii_alphanumeric() || c == '_' || c == '-',
    replacement: '_',
    uppercase: false,
    max_len: Some(255),
});

static AZURE_FORMAT: Lazy<KeyFormat> = Lazy::new(|| KeyFormat {
    pattern: Regex::new(r"^[A-Za-z0-9-]+$").expect("azure key pattern"),
    allowed: |c| c.is_ascii_alphanumeric() || c == '-',
    replacement: '-',
    uppercase: false,
    max_len: Some(127),
});

static VAULT_FORMAT: Lazy<KeyFormat> = Lazy::new(|| KeyFormat {
    pattern: Regex::new(r"^[A-Za-z0-9-]+$").expect("vault key pattern"),
    allowed: |c| c.is_ascii_alphanumeric() || c == '-',
    replacement: '-',
    uppercase: false,
    max_len: Some(255),
});

fn format_for(provider: &str) -> &'static KeyFormat {
    match provider {
        "env" | "dotenv" | "memory" => &ENV_FORMAT,
        "aws" => &AWS_FORMAT,
        "gcp" => &GCP_FORMAT,
        "azure" => &AZURE_FORMAT,
        "vault" => &VAULT_FORMAT,
        // keyring and anything we have no rule for
        _ => &PERMISSIVE_FORMAT,
    }
}

/// Tests a key against the named provider's format rule.
pub fn validate(provider: &str, key: &str) -> bool {
    format_for(provider).is_valid(key)
}

/// Rewrites a key into a shape the named provider accepts.
///
/// Conforming keys come back unchanged. Rewriting folds case where the
/// provider requires it, substitutes rejected characters, then truncates to
/// the provider's length limit, so the result can alias another key.
pub fn normalize(provider: &str, key: &str) -> String {
    format_for(provider).rewrite(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_format_accepts_upper_snake() {
        assert!(validate("env", "API_KEY"));
        assert!(validate("env", "_PRIVATE"));
        assert!(validate("env", "KEY2"));
        assert!(!validate("env", "my.key"));
        assert!(!validate("env", "9KEY"));
        assert!(!validate("env", "lower"));
        assert!(!validate("env", ""));
    }

    #[test]
    fn env_normalization_is_documented_shape() {
        assert_eq!(normalize("env", "my.key"), "MY_KEY");
        assert_eq!(normalize("env", "api-token"), "API_TOKEN");
        assert_eq!(normalize("env", "9key"), "_9KEY");
        assert_eq!(normalize("env", ""), "_");
        assert_eq!(normalize("env", "ALREADY_FINE"), "ALREADY_FINE");
    }

    #[test]
    fn normalization_is_deterministic_and_idempotent() {
        for provider in ["env", "keyring", "aws", "gcp", "azure", "vault", "unknown"] {
            for key in ["my.key", "A b/c", "ALREADY_FINE", "ümlaut", "9", ""] {
                let once = normalize(provider, key);
                assert_eq!(once, normalize(provider, key), "{provider}/{key}");
                assert_eq!(normalize(provider, &once), once, "{provider}/{key}");
                assert!(validate(provider, &once), "{provider}/{key} -> {once}");
            }
        }
    }

    #[test]
    fn hyphen_providers_substitute_underscores() {
        assert_eq!(normalize("azure", "MY_KEY"), "MY-KEY");
        assert_eq!(normalize("vault", "a.b.c"), "a-b-c");
    }

    #[test]
    fn distinct_keys_can_collide_after_rewriting() {
        assert_eq!(normalize("azure", "A_B"), normalize("azure", "A-B"));
        assert_eq!(normalize("env", "a.b"), normalize("env", "a_b"));
    }

    #[test]
    fn truncation_applies_after_substitution() {
        let long = "k".repeat(400);
        assert_eq!(normalize("azure", &long).chars().count(), 127);
        assert_eq!(normalize("gcp", &long).chars().count(), 255);
        assert_eq!(normalize("aws", &long), long);
        let long_aws = "k".repeat(600);
        assert_eq!(normalize("aws", &long_aws).chars().count(), 512);
    }

    #[test]
    fn permissive_rule_applies_to_unknown_providers() {
        assert!(validate("unknown", "any key at all"));
        assert_eq!(normalize("unknown", "any key at all"), "any key at all");
        assert_eq!(normalize("keyring", "tab\tkey"), "tab_key");
    }
}
