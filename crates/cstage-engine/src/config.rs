use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use cstage_common::key::MetricKey;

/// Engine tuning knobs, set once at construction.
///
/// Deserialized from the agent's TOML config; every field has a default
/// so an empty `[engine]` table is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of cached (key, params) results; 0 disables caching.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Freshness window for probes whose descriptor declares no TTL.
    #[serde(default = "default_cache_ttl_secs")]
    pub default_cache_ttl_secs: u64,
    /// How long failures are cached to bound re-attempts against an
    /// unreachable subsystem; 0 disables negative caching.
    #[serde(default = "default_negative_cache_ttl_secs")]
    pub negative_cache_ttl_secs: u64,
    /// Upper bound on concurrently executing probes across all keys.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Per-key timeout overrides (seconds), taking precedence over the
    /// descriptor's timeout.
    #[serde(default)]
    pub timeout_overrides_secs: HashMap<String, u64>,
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_cache_ttl_secs() -> u64 {
    30
}

fn default_negative_cache_ttl_secs() -> u64 {
    5
}

fn default_max_in_flight() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_capacity: default_cache_capacity(),
            default_cache_ttl_secs: default_cache_ttl_secs(),
            negative_cache_ttl_secs: default_negative_cache_ttl_secs(),
            max_in_flight: default_max_in_flight(),
            timeout_overrides_secs: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn default_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.default_cache_ttl_secs)
    }

    pub fn negative_cache_ttl(&self) -> Option<Duration> {
        (self.negative_cache_ttl_secs > 0)
            .then(|| Duration::from_secs(self.negative_cache_ttl_secs))
    }

    /// Effective timeout for `key`: config override, else the
    /// descriptor's own budget.
    pub fn timeout_for(&self, key: &MetricKey, descriptor_timeout: Duration) -> Duration {
        self.timeout_overrides_secs
            .get(key.as_str())
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(descriptor_timeout)
    }
}
