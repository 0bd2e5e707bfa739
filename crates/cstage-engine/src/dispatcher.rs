use std::sync::Arc;
use std::time::Duration;

use cstage_common::key::MetricKey;
use cstage_common::params::ProbeParams;
use cstage_common::types::{ProbeError, ProbeResult};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::cache::{CacheEntry, CacheKey, ResultCache};
use crate::config::EngineConfig;
use crate::flight::FlightTable;
use crate::registry::{ProbeRegistry, RegistryEntry};

/// Resolves metric requests to probe executions.
///
/// One instance serves the whole process; `collect` is called
/// concurrently for many keys with no global lock. Per (key, parameters)
/// pair, at most one probe executes at a time: duplicates queue on the
/// flight table and pick up the leader's cached result. Probe executions
/// run on their own tasks so a blocking subsystem cannot stall unrelated
/// requests, and the registry is never mutated after construction.
pub struct Dispatcher {
    registry: Arc<ProbeRegistry>,
    cache: ResultCache,
    flight: FlightTable,
    limiter: Arc<Semaphore>,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProbeRegistry>, config: EngineConfig) -> Self {
        let cache = ResultCache::new(config.cache_capacity);
        let limiter = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Dispatcher {
            registry,
            cache,
            flight: FlightTable::new(),
            limiter,
            config,
        }
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Collects the current value for `key`, the one inbound call of the
    /// host contract.
    ///
    /// # Errors
    ///
    /// Unknown or malformed keys are [`ProbeError::Unsupported`]; schema
    /// mismatches are [`ProbeError::InvalidParameters`]; everything else
    /// is the probe's own classified failure, with
    /// [`ProbeError::Timeout`] when the deadline expires first.
    pub async fn collect(&self, key: &str, raw_params: &[String]) -> ProbeResult {
        let Ok(metric) = key.parse::<MetricKey>() else {
            return Err(ProbeError::unsupported(key));
        };
        let Some(entry) = self.registry.resolve(&metric) else {
            return Err(ProbeError::unsupported(key));
        };
        let params = entry.descriptor().validate(raw_params)?;
        let cache_key = CacheKey::new(metric.clone(), params.cache_tuple());

        if let Some(hit) = self.cache.get(&cache_key).await {
            tracing::debug!(key = %metric, age_ms = hit.age().as_millis() as u64, "Cache hit");
            return hit.outcome;
        }

        let _in_flight = self.flight.acquire(&cache_key).await;
        // Queued duplicates find the leader's result on the double-check.
        if let Some(hit) = self.cache.get(&cache_key).await {
            tracing::debug!(key = %metric, "Coalesced with in-flight execution");
            return hit.outcome;
        }

        let outcome = self.execute(entry, &metric, params).await;
        if let Err(e) = &outcome {
            tracing::debug!(key = %metric, kind = e.kind(), "Probe failed");
        }
        self.store(cache_key, entry.descriptor().cache_ttl, &outcome)
            .await;
        outcome
    }

    /// Runs the probe on its own task under the effective timeout.
    async fn execute(
        &self,
        entry: &RegistryEntry,
        metric: &MetricKey,
        params: ProbeParams,
    ) -> ProbeResult {
        let budget = self.config.timeout_for(metric, entry.descriptor().timeout);
        let permit = Arc::clone(&self.limiter)
            .acquire_owned()
            .await
            .map_err(|_| ProbeError::internal("execution limiter closed"))?;

        let probe = entry.probe();
        let mut task = tokio::spawn(async move {
            let _permit = permit;
            probe.execute(&params).await
        });

        match timeout(budget, &mut task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                // A panicking probe must not take the dispatcher or other
                // in-flight probes with it.
                tracing::warn!(key = %metric, error = %join_err, "Probe task died");
                Err(ProbeError::internal(format!("probe task died: {join_err}")))
            }
            Err(_) => {
                // Abandon the execution; probes are read-only one-round
                // adapters, safe to cancel at any await point.
                task.abort();
                tracing::warn!(
                    key = %metric,
                    timeout_ms = budget.as_millis() as u64,
                    "Probe timed out"
                );
                Err(ProbeError::Timeout {
                    timeout_ms: budget.as_millis() as u64,
                })
            }
        }
    }

    /// Caches the outcome: successes with the probe's TTL, failures for
    /// the negative-cache window (if enabled) as backpressure against
    /// hammering an unreachable subsystem.
    async fn store(
        &self,
        cache_key: CacheKey,
        descriptor_ttl: Option<Duration>,
        outcome: &ProbeResult,
    ) {
        let ttl = match outcome {
            Ok(_) => descriptor_ttl.unwrap_or_else(|| self.config.default_cache_ttl()),
            Err(_) => match self.config.negative_cache_ttl() {
                Some(ttl) => ttl,
                None => return,
            },
        };
        if ttl.is_zero() {
            return;
        }
        self.cache
            .put(cache_key, CacheEntry::new(outcome.clone(), ttl))
            .await;
    }
}
