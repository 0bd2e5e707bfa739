use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cstage_common::descriptor::ProbeDescriptor;
use cstage_common::params::{ParamKind, ParamSpec, ProbeParams};
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use cstage_probe::echo::EchoProbe;
use cstage_probe::Probe;

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::registry::RegistryBuilder;

/// Stub probe that counts executions and can simulate slow subsystems.
struct CountingProbe {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    value: f64,
}

impl CountingProbe {
    fn new(calls: Arc<AtomicUsize>, delay: Duration, value: f64) -> Self {
        CountingProbe {
            calls,
            delay,
            value,
        }
    }
}

#[async_trait]
impl Probe for CountingProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(MetricValue::Scalar(self.value))
    }
}

struct FailingProbe {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Probe for FailingProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProbeError::SubsystemUnreachable {
            subsystem: "stub".to_string(),
            reason: "connection reset".to_string(),
        })
    }
}

struct PanickingProbe;

#[async_trait]
impl Probe for PanickingProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        panic!("probe bug");
    }
}

fn descriptor(key: &str, timeout: Duration) -> ProbeDescriptor {
    ProbeDescriptor::new(key.parse().unwrap(), "stub probe").with_timeout(timeout)
}

fn config(cache_capacity: usize, negative_secs: u64) -> EngineConfig {
    EngineConfig {
        cache_capacity,
        default_cache_ttl_secs: 60,
        negative_cache_ttl_secs: negative_secs,
        max_in_flight: 16,
        timeout_overrides_secs: HashMap::new(),
    }
}

fn engine(
    entries: Vec<(ProbeDescriptor, Arc<dyn Probe>)>,
    config: EngineConfig,
) -> Dispatcher {
    let mut builder = RegistryBuilder::new();
    for (descriptor, probe) in entries {
        builder.register(descriptor, probe).unwrap();
    }
    Dispatcher::new(Arc::new(builder.build()), config)
}

fn raw(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn unknown_keys_are_always_unsupported() {
    let dispatcher = engine(vec![], config(8, 0));
    for key in ["unknown.key", "not-a-valid-key", "", "cstage.linux.cpu"] {
        let err = dispatcher.collect(key, &[]).await.unwrap_err();
        assert!(
            matches!(err, ProbeError::Unsupported { .. }),
            "{key:?} must be unsupported, got {err:?}"
        );
    }
}

#[tokio::test]
async fn demo_echo_scenario() {
    let descriptor = ProbeDescriptor::new("demo.echo".parse().unwrap(), "Echo.")
        .with_params(vec![ParamSpec::required("msg", ParamKind::Text)])
        .with_timeout(Duration::from_secs(1));
    let dispatcher = engine(vec![(descriptor, Arc::new(EchoProbe))], config(8, 0));

    let value = dispatcher.collect("demo.echo", &raw(&["hi"])).await.unwrap();
    assert_eq!(value, MetricValue::from("hi"));

    let err = dispatcher.collect("demo.echo", &[]).await.unwrap_err();
    assert!(matches!(err, ProbeError::InvalidParameters { .. }));

    let err = dispatcher.collect("unknown.key", &[]).await.unwrap_err();
    assert!(matches!(err, ProbeError::Unsupported { .. }));
}

#[tokio::test]
async fn sequential_collects_inside_ttl_hit_the_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = CountingProbe::new(Arc::clone(&calls), Duration::ZERO, 42.0);
    let dispatcher = engine(
        vec![(
            descriptor("stub.metric", Duration::from_secs(1)),
            Arc::new(probe),
        )],
        config(8, 0),
    );

    let first = dispatcher.collect("stub.metric", &[]).await.unwrap();
    let second = dispatcher.collect("stub.metric", &[]).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "cache hit must not re-execute");
}

#[tokio::test]
async fn concurrent_duplicates_run_the_probe_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = CountingProbe::new(Arc::clone(&calls), Duration::from_millis(50), 7.0);
    let dispatcher = Arc::new(engine(
        vec![(
            descriptor("stub.metric", Duration::from_secs(2)),
            Arc::new(probe),
        )],
        config(8, 0),
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            dispatcher.collect("stub.metric", &[]).await
        }));
    }
    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value, MetricValue::Scalar(7.0));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "duplicates must coalesce");
}

#[tokio::test]
async fn distinct_params_do_not_coalesce() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = CountingProbe::new(Arc::clone(&calls), Duration::ZERO, 1.0);
    let descriptor = ProbeDescriptor::new("stub.metric".parse().unwrap(), "stub")
        .with_params(vec![ParamSpec::optional("target", ParamKind::Text)])
        .with_timeout(Duration::from_secs(1));
    let dispatcher = engine(vec![(descriptor, Arc::new(probe))], config(8, 0));

    dispatcher.collect("stub.metric", &raw(&["a"])).await.unwrap();
    dispatcher.collect("stub.metric", &raw(&["b"])).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn slow_probe_times_out_within_margin() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = CountingProbe::new(Arc::clone(&calls), Duration::from_millis(500), 0.0);
    let dispatcher = engine(
        vec![(
            descriptor("stub.slow", Duration::from_millis(50)),
            Arc::new(probe),
        )],
        config(8, 0),
    );

    let started = Instant::now();
    let err = dispatcher.collect("stub.slow", &[]).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ProbeError::Timeout { timeout_ms: 50 }));
    assert!(
        elapsed < Duration::from_millis(300),
        "collect must return promptly on deadline expiry, took {elapsed:?}"
    );
}

#[tokio::test]
async fn panicking_probe_is_internal_and_isolated() {
    let calls = Arc::new(AtomicUsize::new(0));
    let healthy = CountingProbe::new(Arc::clone(&calls), Duration::ZERO, 3.0);
    let dispatcher = engine(
        vec![
            (
                descriptor("stub.panics", Duration::from_secs(1)),
                Arc::new(PanickingProbe),
            ),
            (
                descriptor("stub.healthy", Duration::from_secs(1)),
                Arc::new(healthy),
            ),
        ],
        config(8, 0),
    );

    let err = dispatcher.collect("stub.panics", &[]).await.unwrap_err();
    assert!(matches!(err, ProbeError::Internal { .. }));

    // Unrelated probes keep working after the panic.
    let value = dispatcher.collect("stub.healthy", &[]).await.unwrap();
    assert_eq!(value, MetricValue::Scalar(3.0));
}

#[tokio::test]
async fn failures_are_negatively_cached_when_enabled() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = FailingProbe {
        calls: Arc::clone(&calls),
    };
    let dispatcher = engine(
        vec![(
            descriptor("stub.down", Duration::from_secs(1)),
            Arc::new(probe),
        )],
        config(8, 60),
    );

    let first = dispatcher.collect("stub.down", &[]).await.unwrap_err();
    let second = dispatcher.collect("stub.down", &[]).await.unwrap_err();
    assert_eq!(first, second);
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "negative cache must bound re-attempts"
    );
}

#[tokio::test]
async fn failures_retry_when_negative_caching_is_disabled() {
    let calls = Arc::new(AtomicUsize::new(0));
    let probe = FailingProbe {
        calls: Arc::clone(&calls),
    };
    let dispatcher = engine(
        vec![(
            descriptor("stub.down", Duration::from_secs(1)),
            Arc::new(probe),
        )],
        config(8, 0),
    );

    dispatcher.collect("stub.down", &[]).await.unwrap_err();
    dispatcher.collect("stub.down", &[]).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn lru_entry_is_re_collected_after_eviction() {
    let calls_a = Arc::new(AtomicUsize::new(0));
    let calls_b = Arc::new(AtomicUsize::new(0));
    let calls_c = Arc::new(AtomicUsize::new(0));
    let dispatcher = engine(
        vec![
            (
                descriptor("stub.a", Duration::from_secs(1)),
                Arc::new(CountingProbe::new(Arc::clone(&calls_a), Duration::ZERO, 1.0)),
            ),
            (
                descriptor("stub.b", Duration::from_secs(1)),
                Arc::new(CountingProbe::new(Arc::clone(&calls_b), Duration::ZERO, 2.0)),
            ),
            (
                descriptor("stub.c", Duration::from_secs(1)),
                Arc::new(CountingProbe::new(Arc::clone(&calls_c), Duration::ZERO, 3.0)),
            ),
        ],
        config(2, 0),
    );

    dispatcher.collect("stub.a", &[]).await.unwrap();
    dispatcher.collect("stub.b", &[]).await.unwrap();
    // Touch a; b becomes least recently used.
    dispatcher.collect("stub.a", &[]).await.unwrap();
    // Third distinct entry exceeds capacity 2 and evicts b.
    dispatcher.collect("stub.c", &[]).await.unwrap();

    dispatcher.collect("stub.a", &[]).await.unwrap();
    dispatcher.collect("stub.b", &[]).await.unwrap();
    assert_eq!(calls_a.load(Ordering::SeqCst), 1, "a stayed cached");
    assert_eq!(calls_b.load(Ordering::SeqCst), 2, "b was evicted and re-ran");
    assert_eq!(calls_c.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn registry_advertises_every_descriptor() {
    let dispatcher = engine(
        vec![
            (
                descriptor("stub.a", Duration::from_secs(1)),
                Arc::new(CountingProbe::new(Arc::new(AtomicUsize::new(0)), Duration::ZERO, 0.0)),
            ),
            (descriptor("demo.echo", Duration::from_secs(1)), Arc::new(EchoProbe)),
        ],
        config(8, 0),
    );
    let keys: Vec<&str> = dispatcher
        .registry()
        .descriptors()
        .iter()
        .map(|d| d.key.as_str())
        .collect();
    assert_eq!(keys, vec!["demo.echo", "stub.a"]);
}
