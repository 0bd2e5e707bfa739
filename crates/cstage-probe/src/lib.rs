//! Probe implementations for the cstage agent.
//!
//! Each [`Probe`] inspects one subsystem family (kernel, CPU, a database
//! server, a web server, ...) and returns a typed
//! [`MetricValue`](cstage_common::types::MetricValue) or a classified
//! [`ProbeError`](cstage_common::types::ProbeError). Probes are
//! state-free adapters: one round of work per call, no shared mutable
//! state, safe to abandon on timeout.
//!
//! `system` holds the dedicated Linux probes (procfs/sysfs + sysinfo);
//! `service` holds the generic building blocks for daemon families (TCP
//! connect, HTTP endpoint, read-only command, path presence, process
//! presence); [`catalog`] maps every `cstage.*` metric family onto one of
//! them.

pub mod catalog;
pub mod echo;
pub mod service;
pub mod system;

use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::ProbeResult;

/// A single unit of collection work for one metric family.
///
/// Implementations are registered against a [`ProbeDescriptor`] and
/// invoked by the dispatcher with parameters already validated against
/// the descriptor's schema. The trait requires `Send + Sync` because the
/// dispatcher executes probes concurrently on spawned tasks.
///
/// Probes are strictly read-only clients of the subsystems they inspect
/// and must classify every failure into the [`ProbeError`] taxonomy at
/// this boundary.
///
/// [`ProbeDescriptor`]: cstage_common::descriptor::ProbeDescriptor
/// [`ProbeError`]: cstage_common::types::ProbeError
#[async_trait]
pub trait Probe: Send + Sync {
    /// Collects the current value for this metric family.
    async fn execute(&self, params: &ProbeParams) -> ProbeResult;
}
