use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeResult};
use serde_json::json;
use sysinfo::System;

use crate::Probe;

/// RAM and swap usage for `cstage.linux.memory`. All sizes in bytes.
pub struct MemoryProbe;

#[async_trait]
impl Probe for MemoryProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let mut system = System::new();
        system.refresh_memory();

        let total = system.total_memory();
        let used = system.used_memory();
        let used_pct = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let swap_total = system.total_swap();
        let swap_used = system.used_swap();
        let swap_pct = if swap_total > 0 {
            (swap_used as f64 / swap_total as f64) * 100.0
        } else {
            0.0
        };

        Ok(MetricValue::object([
            ("total_bytes", json!(total)),
            ("used_bytes", json!(used)),
            ("available_bytes", json!(system.available_memory())),
            ("used_percent", json!(used_pct)),
            ("swap_total_bytes", json!(swap_total)),
            ("swap_used_bytes", json!(swap_used)),
            ("swap_used_percent", json!(swap_pct)),
        ]))
    }
}
