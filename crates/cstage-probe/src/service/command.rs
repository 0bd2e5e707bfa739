use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use tokio::process::Command;

use crate::Probe;

/// How to interpret a status command's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputParser {
    /// First stdout line as a summary string.
    Summary,
    /// `zpool status -x` health phrasing.
    ZpoolStatus,
}

/// Health of a subsystem queried through a fixed read-only command
/// (e.g. `zpool status -x`, `docker version`). The command and its
/// arguments are registration-time constants; request parameters are
/// never interpolated into them.
pub struct CommandProbe {
    subsystem: &'static str,
    program: &'static str,
    args: &'static [&'static str],
    parser: OutputParser,
}

impl CommandProbe {
    pub fn new(
        subsystem: &'static str,
        program: &'static str,
        args: &'static [&'static str],
        parser: OutputParser,
    ) -> Self {
        CommandProbe {
            subsystem,
            program,
            args,
            parser,
        }
    }
}

pub(crate) fn first_line(output: &str) -> String {
    output.lines().next().unwrap_or("").trim().to_string()
}

pub(crate) fn zpool_healthy(stdout: &str) -> bool {
    stdout.contains("all pools are healthy") || stdout.contains("no pools available")
}

#[async_trait]
impl Probe for CommandProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let output = Command::new(self.program)
            .args(self.args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ProbeError::SubsystemAbsent {
                    subsystem: self.subsystem.to_string(),
                },
                std::io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied {
                    resource: self.program.to_string(),
                },
                _ => ProbeError::internal(format!("spawning {}: {e}", self.program)),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            tracing::debug!(
                subsystem = self.subsystem,
                program = self.program,
                status = %output.status,
                "Status command failed"
            );
            // The CLI is installed but its daemon rejected or dropped the
            // request (e.g. docker CLI without a running dockerd).
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                first_line(&stderr)
            };
            return Err(ProbeError::SubsystemUnreachable {
                subsystem: self.subsystem.to_string(),
                reason: detail,
            });
        }

        let (healthy, summary) = match self.parser {
            OutputParser::Summary => (true, first_line(&stdout)),
            OutputParser::ZpoolStatus => (zpool_healthy(&stdout), first_line(&stdout)),
        };
        Ok(MetricValue::object([
            ("healthy", json!(healthy)),
            ("summary", json!(summary)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zpool_health_phrases() {
        assert!(zpool_healthy("all pools are healthy\n"));
        assert!(zpool_healthy("no pools available\n"));
        assert!(!zpool_healthy(
            "  pool: tank\n state: DEGRADED\nstatus: One or more devices has failed.\n"
        ));
    }

    #[tokio::test]
    async fn missing_program_is_absent() {
        let probe = CommandProbe::new(
            "zfs",
            "definitely-not-a-real-binary-cstage",
            &[],
            OutputParser::ZpoolStatus,
        );
        let err = probe.execute(&ProbeParams::default()).await.unwrap_err();
        assert!(matches!(err, ProbeError::SubsystemAbsent { .. }));
    }

    #[tokio::test]
    async fn failing_command_is_unreachable() {
        // `false` exists everywhere and always exits non-zero.
        let probe = CommandProbe::new("demo", "false", &[], OutputParser::Summary);
        let err = probe.execute(&ProbeParams::default()).await.unwrap_err();
        assert!(matches!(err, ProbeError::SubsystemUnreachable { .. }));
    }

    #[tokio::test]
    async fn successful_command_reports_summary() {
        let probe = CommandProbe::new("demo", "echo", &["server version 1.2.3"], OutputParser::Summary);
        let value = probe.execute(&ProbeParams::default()).await.unwrap();
        let rendered = serde_json::to_string(&value).unwrap();
        assert!(rendered.contains("\"summary\":\"server version 1.2.3\""));
        assert!(rendered.contains("\"healthy\":true"));
    }
}
