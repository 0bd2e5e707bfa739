use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use sysinfo::System;

use crate::Probe;

/// Presence of a subsystem detected through its process name, for
/// daemons with no stable port or marker path (or several alternative
/// implementations, like NTP). The first candidate with at least one
/// live process wins.
pub struct ProcessPresenceProbe {
    subsystem: &'static str,
    candidates: &'static [&'static str],
}

impl ProcessPresenceProbe {
    pub fn new(subsystem: &'static str, candidates: &'static [&'static str]) -> Self {
        ProcessPresenceProbe {
            subsystem,
            candidates,
        }
    }
}

#[async_trait]
impl Probe for ProcessPresenceProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let mut system = System::new_all();
        system.refresh_all();

        for candidate in self.candidates {
            let count = system
                .processes()
                .values()
                .filter(|p| p.name().to_string_lossy() == *candidate)
                .count();
            if count > 0 {
                return Ok(MetricValue::object([
                    ("running", json!(true)),
                    ("process", json!(candidate)),
                    ("instances", json!(count)),
                ]));
            }
        }
        Err(ProbeError::SubsystemAbsent {
            subsystem: self.subsystem.to_string(),
        })
    }
}
