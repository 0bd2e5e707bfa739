use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use sysinfo::System;

use crate::system::procfs;
use crate::Probe;

/// CPU load, wait and steal metrics for `cstage.linux.cpu`.
///
/// Time shares come from the aggregate `cpu` line of `/proc/stat` and are
/// fractions of total CPU time since boot; the host differentiates
/// between collections to get instantaneous load.
pub struct CpuProbe;

#[derive(Debug, PartialEq)]
pub(crate) struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
pub(crate) fn parse_proc_stat_cpu(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let mut fields = line.split_whitespace().skip(1).map(|f| f.parse::<u64>());
    let mut next = || fields.next().and_then(Result::ok);
    Some(CpuTimes {
        user: next()?,
        nice: next()?,
        system: next()?,
        idle: next()?,
        iowait: next().unwrap_or(0),
        irq: next().unwrap_or(0),
        softirq: next().unwrap_or(0),
        steal: next().unwrap_or(0),
    })
}

/// Counts `cpuN` lines in `/proc/stat`.
pub(crate) fn count_cores(stat: &str) -> usize {
    stat.lines()
        .filter(|l| {
            l.starts_with("cpu") && l.as_bytes().get(3).is_some_and(|b| b.is_ascii_digit())
        })
        .count()
}

#[async_trait]
impl Probe for CpuProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let stat = procfs::read("cpu", "/proc/stat")?;
        let times = parse_proc_stat_cpu(&stat)
            .ok_or_else(|| ProbeError::internal("no aggregate cpu line in /proc/stat"))?;
        let total = times.total().max(1) as f64;
        let pct = |v: u64| (v as f64 / total) * 100.0;

        let load = System::load_average();
        Ok(MetricValue::object([
            ("cores", json!(count_cores(&stat))),
            ("load_1", json!(load.one)),
            ("load_5", json!(load.five)),
            ("load_15", json!(load.fifteen)),
            ("user_pct", json!(pct(times.user + times.nice))),
            ("system_pct", json!(pct(times.system))),
            ("iowait_pct", json!(pct(times.iowait))),
            ("steal_pct", json!(pct(times.steal))),
            ("idle_pct", json!(pct(times.idle))),
        ]))
    }
}
