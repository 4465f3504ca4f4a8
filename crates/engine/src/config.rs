use crate::error::{EngineError, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_CLIENT_MODULE: &str = "@apiscope/client";
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Fields surfaced in generated console output. Fixed list; order matters.
pub const IMPORTANT_FIELDS: [&str; 4] = ["id", "uuid", "name", "slug"];

/// Configuration for the example engine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Example cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Module the generated `import { createClient }` line points at.
    #[serde(default = "default_client_module")]
    pub client_module: String,

    /// Hard bound on schema recursion during synthesis (backs the visited-ref guard).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum number of cached examples.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entry freshness in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_client_module() -> String {
    DEFAULT_CLIENT_MODULE.to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl_ms: DEFAULT_CACHE_TTL_MS,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            client_module: default_client_module(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CacheConfig {
    /// TTL as a signed delta usable against `DateTime<Utc>` arithmetic.
    ///
    /// # Errors
    ///
    /// Returns an error if the TTL does not fit in a `TimeDelta`.
    pub fn ttl(&self) -> Result<TimeDelta> {
        i64::try_from(self.ttl_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .ok_or_else(|| EngineError::Config(format!("cache ttlMs {} is too large", self.ttl_ms)))
    }
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache capacity is zero, the TTL is out of range, or the recursion
    /// bound is zero.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(EngineError::Config(
                "cache capacity must be at least 1".to_string(),
            ));
        }
        self.cache.ttl()?;
        if self.max_depth == 0 {
            return Err(EngineError::Config(
                "maxDepth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.cache.capacity, 100);
        assert_eq!(cfg.cache.ttl_ms, 300_000);
        assert_eq!(cfg.client_module, "@apiscope/client");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: EngineConfig = serde_yaml::from_str("cache:\n  ttlMs: 1000\n").unwrap();
        assert_eq!(cfg.cache.ttl_ms, 1000);
        assert_eq!(cfg.cache.capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(cfg.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn rejects_zero_capacity_and_huge_ttl() {
        let mut cfg = EngineConfig::default();
        cfg.cache.capacity = 0;
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));

        let mut cfg = EngineConfig::default();
        cfg.cache.ttl_ms = u64::MAX;
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));
    }
}
