use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use std::path::PathBuf;

use crate::Probe;

/// Cron daemon liveness and job inventory for `cstage.linux.cron`.
pub struct CronProbe {
    pid_paths: Vec<PathBuf>,
    system_dir: PathBuf,
    spool_dir: PathBuf,
}

impl CronProbe {
    pub fn new() -> Self {
        CronProbe {
            // Debian ships cron, RHEL ships crond.
            pid_paths: vec![
                PathBuf::from("/var/run/crond.pid"),
                PathBuf::from("/var/run/cron.pid"),
                PathBuf::from("/run/crond.pid"),
            ],
            system_dir: PathBuf::from("/etc/cron.d"),
            spool_dir: PathBuf::from("/var/spool/cron"),
        }
    }

    fn daemon_running(&self) -> bool {
        self.pid_paths.iter().any(|p| p.exists())
    }

    /// Entry count in a crontab directory; missing directories count as
    /// zero, denied reads are surfaced.
    fn count_entries(&self, dir: &PathBuf) -> Result<usize, ProbeError> {
        match std::fs::read_dir(dir) {
            Ok(entries) => Ok(entries.filter_map(Result::ok).count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(ProbeError::from_read("cron", &dir.to_string_lossy(), &e)),
        }
    }
}

impl Default for CronProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for CronProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let running = self.daemon_running();
        let system_jobs = self.count_entries(&self.system_dir)?;
        let user_crontabs = self.count_entries(&self.spool_dir)?;

        if !running && system_jobs == 0 && user_crontabs == 0 {
            return Err(ProbeError::SubsystemAbsent {
                subsystem: "cron".to_string(),
            });
        }
        Ok(MetricValue::object([
            ("daemon_running", json!(running)),
            ("system_jobs", json!(system_jobs)),
            ("user_crontabs", json!(user_crontabs)),
        ]))
    }
}
