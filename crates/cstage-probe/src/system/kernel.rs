use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use sysinfo::System;

use crate::system::procfs;
use crate::Probe;

/// Kernel identity and activity counters for `cstage.linux.kernel`.
pub struct KernelProbe;

/// Extracts a single-token counter line (`ctxt 12345`) from `/proc/stat`.
pub(crate) fn stat_counter(stat: &str, name: &str) -> Option<u64> {
    stat.lines()
        .find(|l| l.starts_with(name) && l[name.len()..].starts_with(' '))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

#[async_trait]
impl Probe for KernelProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let release = procfs::read_trimmed("kernel", "/proc/sys/kernel/osrelease")?;
        let hostname = procfs::read_trimmed("kernel", "/proc/sys/kernel/hostname")?;
        let stat = procfs::read("kernel", "/proc/stat")?;

        Ok(MetricValue::object([
            ("release", json!(release)),
            ("hostname", json!(hostname)),
            ("uptime_secs", json!(System::uptime())),
            (
                "context_switches_total",
                json!(stat_counter(&stat, "ctxt").unwrap_or(0)),
            ),
            (
                "forks_total",
                json!(stat_counter(&stat, "processes").unwrap_or(0)),
            ),
            (
                "procs_running",
                json!(stat_counter(&stat, "procs_running").unwrap_or(0)),
            ),
            (
                "procs_blocked",
                json!(stat_counter(&stat, "procs_blocked").unwrap_or(0)),
            ),
        ]))
    }
}

/// Available entropy for `cstage.linux.entropy`.
pub struct EntropyProbe;

#[async_trait]
impl Probe for EntropyProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let bits = procfs::read_u64("entropy", "/proc/sys/kernel/random/entropy_avail")?;
        Ok(MetricValue::Scalar(bits as f64))
    }
}

/// Cumulative interrupt and context-switch counts for
/// `cstage.linux.interrupts`.
pub struct InterruptsProbe;

#[async_trait]
impl Probe for InterruptsProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let stat = procfs::read("interrupts", "/proc/stat")?;
        let intr = stat_counter(&stat, "intr")
            .ok_or_else(|| ProbeError::internal("no intr line in /proc/stat"))?;
        Ok(MetricValue::object([
            ("interrupts_total", json!(intr)),
            (
                "context_switches_total",
                json!(stat_counter(&stat, "ctxt").unwrap_or(0)),
            ),
        ]))
    }
}

/// Netfilter connection-tracking table usage for
/// `cstage.linux.conntrack`.
pub struct ConntrackProbe;

#[async_trait]
impl Probe for ConntrackProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let count = procfs::read_u64("conntrack", "/proc/sys/net/netfilter/nf_conntrack_count")?;
        let max = procfs::read_u64("conntrack", "/proc/sys/net/netfilter/nf_conntrack_max")?;
        let used_pct = if max > 0 {
            (count as f64 / max as f64) * 100.0
        } else {
            0.0
        };
        Ok(MetricValue::object([
            ("count", json!(count)),
            ("max", json!(max)),
            ("used_percent", json!(used_pct)),
        ]))
    }
}
