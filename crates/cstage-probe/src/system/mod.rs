//! Dedicated probes for the `cstage.linux.*` families.
//!
//! Everything here reads procfs/sysfs or queries `sysinfo`; nothing
//! mutates host state. Parsing is kept in pure functions over the file
//! contents so it can be tested without the real filesystem.

pub mod cpu;
pub mod cron;
pub mod disk;
pub mod kernel;
pub mod memory;
pub mod network;
pub(crate) mod procfs;
pub mod security;
pub mod systemd;
