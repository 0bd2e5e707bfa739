use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use tokio::process::Command;

use crate::Probe;

/// Unit health summary for `cstage.linux.systemd`, queried through
/// `systemctl` as a read-only client.
pub struct SystemdProbe;

/// Failed-unit names from `systemctl --failed --no-legend --plain` output.
pub(crate) fn parse_failed_units(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .filter(|name| name.contains('.'))
        .map(str::to_string)
        .collect()
}

async fn systemctl(args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProbeError::SubsystemAbsent {
                subsystem: "systemd".to_string(),
            },
            std::io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied {
                resource: "systemctl".to_string(),
            },
            _ => ProbeError::internal(format!("spawning systemctl: {e}")),
        })?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl Probe for SystemdProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        // Exit status is non-zero for any state except "running"; the
        // state string itself is the signal.
        let state = systemctl(&["is-system-running"]).await?.trim().to_string();
        if state.is_empty() {
            return Err(ProbeError::SubsystemUnreachable {
                subsystem: "systemd".to_string(),
                reason: "systemctl produced no state".to_string(),
            });
        }
        let failed_raw = systemctl(&["--failed", "--no-legend", "--plain"]).await?;
        let failed = parse_failed_units(&failed_raw);

        Ok(MetricValue::object([
            ("state", json!(state)),
            ("healthy", json!(state == "running")),
            ("failed_units", json!(failed.len())),
            ("failed", json!(failed)),
        ]))
    }
}
