#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! Sources, lowest to highest precedence: [`RuntimeConfig::default`], a TOML
//! document (feature `config-file`), environment variables.
//!
//! | Env var | Field |
//! |---------|-------|
//! | `MBIND_MAX_PROPAGATION_DEPTH` | `max_propagation_depth` |
//! | `MBIND_MAX_HANDLERS_PER_FLUSH` | `max_handlers_per_flush` |
//! | `MBIND_LOG_HANDLER_ERRORS` | `log_handler_errors` |
//!
//! Unparsable environment values are ignored with a warning.

use core::str::FromStr;

/// Limits and switches for a [`ViewTree`](crate::ViewTree).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, deny_unknown_fields))]
pub struct RuntimeConfig {
    /// Longest chain of field mappings followed from one write.
    pub max_propagation_depth: usize,
    /// Handlers run per view per flush; the rest wait for the next tick.
    pub max_handlers_per_flush: usize,
    /// Log failing change handlers at error level.
    pub log_handler_errors: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_propagation_depth: 32,
            max_handlers_per_flush: 256,
            log_handler_errors: true,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_max_propagation_depth(mut self, depth: usize) -> Self {
        self.max_propagation_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_handlers_per_flush(mut self, count: usize) -> Self {
        self.max_handlers_per_flush = count.max(1);
        self
    }

    #[must_use]
    pub fn with_log_handler_errors(mut self, enabled: bool) -> Self {
        self.log_handler_errors = enabled;
        self
    }

    /// Defaults overridden by `MBIND_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_var(&lookup, "MBIND_MAX_PROPAGATION_DEPTH") {
            self.max_propagation_depth = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, "MBIND_MAX_HANDLERS_PER_FLUSH") {
            self.max_handlers_per_flush = v.max(1);
        }
        if let Some(v) = parse_var(&lookup, "MBIND_LOG_HANDLER_ERRORS") {
            self.log_handler_errors = v;
        }
        self
    }

    /// Parse a TOML document; missing keys keep their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(doc: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(doc)?;
        config.max_handlers_per_flush = config.max_handlers_per_flush.max(1);
        Ok(config)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn builders_override_defaults() {
        let c = RuntimeConfig::default()
            .with_max_propagation_depth(4)
            .with_max_handlers_per_flush(0)
            .with_log_handler_errors(false);
        assert_eq!(c.max_propagation_depth, 4);
        assert_eq!(c.max_handlers_per_flush, 1);
        assert!(!c.log_handler_errors);
    }

    #[test]
    fn env_overrides_apply() {
        let c = RuntimeConfig::default().with_env_overrides(env(&[
            ("MBIND_MAX_PROPAGATION_DEPTH", "8"),
            ("MBIND_LOG_HANDLER_ERRORS", "false"),
        ]));
        assert_eq!(c.max_propagation_depth, 8);
        assert_eq!(c.max_handlers_per_flush, 256);
        assert!(!c.log_handler_errors);
    }

    #[traced_test]
    #[test]
    fn bad_env_values_are_ignored() {
        let c = RuntimeConfig::default()
            .with_env_overrides(env(&[("MBIND_MAX_PROPAGATION_DEPTH", "deep")]));
        assert_eq!(c, RuntimeConfig::default());
        assert!(logs_contain("ignoring unparsable configuration value"));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_document() {
        let c = RuntimeConfig::from_toml_str("max_propagation_depth = 3\n").unwrap();
        assert_eq!(c.max_propagation_depth, 3);
        assert_eq!(c.max_handlers_per_flush, 256);
        assert!(RuntimeConfig::from_toml_str("unknown = 1").is_err());
    }
}
