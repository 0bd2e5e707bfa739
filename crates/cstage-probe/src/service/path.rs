use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use std::path::PathBuf;

use crate::Probe;

/// Presence of a subsystem detected through marker paths (control
/// sockets, devices, pseudo-filesystem mounts). The first candidate that
/// exists wins; none existing means the subsystem is absent.
pub struct PathPresenceProbe {
    subsystem: &'static str,
    candidates: Vec<PathBuf>,
}

impl PathPresenceProbe {
    pub fn new(subsystem: &'static str, candidates: &[&str]) -> Self {
        PathPresenceProbe {
            subsystem,
            candidates: candidates.iter().map(PathBuf::from).collect(),
        }
    }
}

fn file_type_name(ft: &std::fs::FileType) -> &'static str {
    if ft.is_dir() {
        "directory"
    } else if ft.is_symlink() {
        "symlink"
    } else if ft.is_file() {
        "file"
    } else {
        // Sockets, devices and the rest of the unix zoo.
        "special"
    }
}

#[async_trait]
impl Probe for PathPresenceProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        for path in &self.candidates {
            match std::fs::symlink_metadata(path) {
                Ok(meta) => {
                    return Ok(MetricValue::object([
                        ("present", json!(true)),
                        ("path", json!(path.to_string_lossy())),
                        ("type", json!(file_type_name(&meta.file_type()))),
                    ]));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(ProbeError::from_read(
                        self.subsystem,
                        &path.to_string_lossy(),
                        &e,
                    ))
                }
            }
        }
        Err(ProbeError::SubsystemAbsent {
            subsystem: self.subsystem.to_string(),
        })
    }
}
