use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use sysinfo::Disks;

use crate::system::procfs;
use crate::Probe;

/// Filesystem capacity per mount point for `cstage.linux.disk.usage`.
///
/// Accepts an optional `mount` parameter restricting the report to one
/// mount point; unknown mounts are invalid parameters, not an empty
/// result.
pub struct DiskUsageProbe;

#[async_trait]
impl Probe for DiskUsageProbe {
    async fn execute(&self, params: &ProbeParams) -> ProbeResult {
        let filter = params.text("mount");
        let disks = Disks::new_with_refreshed_list();

        let mut filesystems = Vec::new();
        let mut total: u64 = 0;
        let mut used: u64 = 0;
        for disk in disks.list() {
            let mount = disk.mount_point().to_string_lossy().to_string();
            if let Some(wanted) = filter {
                if mount != wanted {
                    continue;
                }
            }
            let disk_total = disk.total_space();
            let disk_used = disk_total.saturating_sub(disk.available_space());
            let used_pct = if disk_total > 0 {
                (disk_used as f64 / disk_total as f64) * 100.0
            } else {
                0.0
            };
            total += disk_total;
            used += disk_used;
            filesystems.push(json!({
                "mount": mount,
                "total_bytes": disk_total,
                "used_bytes": disk_used,
                "used_percent": used_pct,
            }));
        }

        if filesystems.is_empty() {
            if let Some(wanted) = filter {
                return Err(ProbeError::invalid_params(format!(
                    "unknown mount point '{wanted}'"
                )));
            }
        }

        let used_pct = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Ok(MetricValue::object([
            ("filesystems", json!(filesystems)),
            ("total_bytes", json!(total)),
            ("used_bytes", json!(used)),
            ("used_percent", json!(used_pct)),
        ]))
    }
}

/// Block device I/O counters from `/proc/diskstats` for
/// `cstage.linux.disk.io`. Counters are cumulative since boot.
pub struct DiskIoProbe;

#[derive(Debug, PartialEq)]
pub(crate) struct DiskIoStats {
    pub device: String,
    pub reads_completed: u64,
    pub sectors_read: u64,
    pub writes_completed: u64,
    pub sectors_written: u64,
    pub io_in_progress: u64,
}

/// Parses `/proc/diskstats`, skipping loop and ram pseudo-devices.
pub(crate) fn parse_diskstats(contents: &str) -> Vec<DiskIoStats> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // major minor name reads ... ; 14 fields minimum since 2.6
        if fields.len() < 14 {
            continue;
        }
        let device = fields[2];
        if device.starts_with("loop") || device.starts_with("ram") {
            continue;
        }
        let num = |i: usize| fields.get(i).and_then(|f| f.parse::<u64>().ok()).unwrap_or(0);
        out.push(DiskIoStats {
            device: device.to_string(),
            reads_completed: num(3),
            sectors_read: num(5),
            writes_completed: num(7),
            sectors_written: num(9),
            io_in_progress: num(11),
        });
    }
    out
}

const SECTOR_BYTES: u64 = 512;

#[async_trait]
impl Probe for DiskIoProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let contents = procfs::read("diskstats", "/proc/diskstats")?;
        let stats = parse_diskstats(&contents);

        let devices: Vec<_> = stats
            .iter()
            .map(|d| {
                json!({
                    "device": d.device,
                    "reads": d.reads_completed,
                    "writes": d.writes_completed,
                    "read_bytes": d.sectors_read * SECTOR_BYTES,
                    "write_bytes": d.sectors_written * SECTOR_BYTES,
                    "in_progress": d.io_in_progress,
                })
            })
            .collect();
        let read_bytes: u64 = stats.iter().map(|d| d.sectors_read * SECTOR_BYTES).sum();
        let write_bytes: u64 = stats.iter().map(|d| d.sectors_written * SECTOR_BYTES).sum();

        Ok(MetricValue::object([
            ("devices", json!(devices)),
            ("read_bytes_total", json!(read_bytes)),
            ("write_bytes_total", json!(write_bytes)),
        ]))
    }
}
