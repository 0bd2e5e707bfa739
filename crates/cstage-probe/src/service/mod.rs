//! Generic building blocks for daemon-family probes.
//!
//! The `cstage.database.*`, `cstage.web.*`, `cstage.middleware.*`,
//! `cstage.storage.*`, `cstage.infra.*` and `cstage.service.*` families
//! share a handful of collection shapes: connect to a TCP port, query a
//! conventional HTTP status endpoint, run a read-only command, check for
//! a marker path, or look for a process. The catalog instantiates these
//! with per-family defaults.

pub mod command;
pub mod http;
pub mod path;
pub mod process;
pub mod tcp;
