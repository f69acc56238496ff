//! Compiler configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Share compiled units between structurally equal operators.
    pub cache_enabled: bool,

    /// Workers used when compiling several vertices at once.
    pub worker_threads: usize,

    /// Prefix of generated unit names.
    pub unit_prefix: String,

    /// Reject leftover destination properties in split operators too.
    /// Off by default: split leaves them unset while merge rejects them.
    pub split_strict: bool,

    /// Stop a batch compilation at the first error instead of collecting all.
    pub fail_fast: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            worker_threads: 4,
            unit_prefix: "dagc".to_string(),
            split_strict: false,
            fail_fast: false,
        }
    }
}

impl CompilerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `DAGC_CACHE_ENABLED`: `true`/`false`
    /// - `DAGC_WORKER_THREADS`: parallel vertex compilations
    /// - `DAGC_UNIT_PREFIX`: generated unit name prefix
    /// - `DAGC_SPLIT_STRICT`: `true`/`false`
    /// - `DAGC_FAIL_FAST`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("DAGC_CACHE_ENABLED") {
            if let Some(v) = parse_flag(&s) {
                cfg.cache_enabled = v;
            }
        }

        if let Ok(s) = std::env::var("DAGC_WORKER_THREADS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.worker_threads = v.max(1);
            }
        }

        if let Ok(s) = std::env::var("DAGC_UNIT_PREFIX") {
            let s = s.trim();
            if !s.is_empty() {
                cfg.unit_prefix = s.to_string();
            }
        }

        if let Ok(s) = std::env::var("DAGC_SPLIT_STRICT") {
            if let Some(v) = parse_flag(&s) {
                cfg.split_strict = v;
            }
        }

        if let Ok(s) = std::env::var("DAGC_FAIL_FAST") {
            if let Some(v) = parse_flag(&s) {
                cfg.fail_fast = v;
            }
        }

        cfg
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse_loosely() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn defaults_keep_split_relaxed() {
        let cfg = CompilerConfig::default();
        assert!(cfg.cache_enabled);
        assert!(!cfg.split_strict);
        assert_eq!(cfg.with_workers(0).worker_threads, 1);
    }

    #[test]
    fn env_overrides_defaults() {
        std::env::set_var("DAGC_WORKER_THREADS", "0");
        std::env::set_var("DAGC_UNIT_PREFIX", " job ");
        std::env::set_var("DAGC_FAIL_FAST", "yes");
        let cfg = CompilerConfig::from_env();
        std::env::remove_var("DAGC_WORKER_THREADS");
        std::env::remove_var("DAGC_UNIT_PREFIX");
        std::env::remove_var("DAGC_FAIL_FAST");

        assert_eq!(cfg.worker_threads, 1);
        assert_eq!(cfg.unit_prefix, "job");
        assert!(cfg.fail_fast);
        assert!(cfg.cache_enabled);
    }
}
