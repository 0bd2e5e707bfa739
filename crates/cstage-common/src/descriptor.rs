use serde::Serialize;
use std::time::Duration;

use crate::key::MetricKey;
use crate::params::{ParamSpec, ProbeParams};
use crate::types::ProbeError;

/// Timeout applied when a descriptor does not declare its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Registration-time metadata for one metric family.
///
/// Built once when the probe is registered and immutable for the process
/// lifetime. The registry validates incoming raw parameters against the
/// descriptor's schema so probes only ever see coerced values.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeDescriptor {
    pub key: MetricKey,
    pub description: String,
    pub params: Vec<ParamSpec>,
    #[serde(skip)]
    pub timeout: Duration,
    /// Freshness window for cached results; `None` falls back to the
    /// engine-wide default TTL.
    #[serde(skip)]
    pub cache_ttl: Option<Duration>,
}

impl ProbeDescriptor {
    pub fn new(key: MetricKey, description: impl Into<String>) -> Self {
        ProbeDescriptor {
            key,
            description: description.into(),
            params: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: None,
        }
    }

    pub fn with_params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Validates and coerces raw host parameters against this schema.
    pub fn validate(&self, raw: &[String]) -> Result<ProbeParams, ProbeError> {
        ProbeParams::coerce(&self.params, raw)
    }
}
