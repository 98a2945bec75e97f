//! Checker-tree configuration.
//!
//! One [`CheckerConfig`] is given to the root checker and handed down to
//! every child created under it, unless the child is given its own.

use serde::Deserialize;

/// What to do when a check function errors or panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckErrorPolicy {
    /// Log and accept the value, as if the check reported nothing.
    #[default]
    FailOpen,
    /// Log and report a blocking "check failed" message.
    FailClosed,
}

/// How to treat a check that completes after a newer one for the same field
/// has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleCheckPolicy {
    /// Whatever completes last is recorded.
    #[default]
    LastCompleted,
    /// Completions of superseded checks are dropped.
    LatestStarted,
}

/// Configuration shared by a checker tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CheckerConfig {
    pub check_errors: CheckErrorPolicy,
    pub stale_checks: StaleCheckPolicy,
    /// Maintain per-field indicator cells.
    pub display_status: bool,
    /// Allow callers to force a field's indicator.
    pub status_overridable: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            check_errors: CheckErrorPolicy::FailOpen,
            stale_checks: StaleCheckPolicy::LastCompleted,
            display_status: true,
            status_overridable: false,
        }
    }
}

impl CheckerConfig {
    /// Parse a standalone TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CheckerConfig::default();
        assert_eq!(cfg.check_errors, CheckErrorPolicy::FailOpen);
        assert_eq!(cfg.stale_checks, StaleCheckPolicy::LastCompleted);
        assert!(cfg.display_status);
        assert!(!cfg.status_overridable);
    }

    #[test]
    fn parse_partial_toml() {
        let cfg = CheckerConfig::from_toml_str(
            r#"
            check-errors = "fail-closed"
            status-overridable = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.check_errors, CheckErrorPolicy::FailClosed);
        assert!(cfg.status_overridable);
        assert_eq!(cfg.stale_checks, StaleCheckPolicy::LastCompleted);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(CheckerConfig::from_toml_str("colour = true").is_err());
    }
}
