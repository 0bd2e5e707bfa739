//! Shared vocabulary for the cstage metric-collection agent.
//!
//! Defines the [`key::MetricKey`] namespace type, the
//! [`types::MetricValue`] / [`types::ProbeError`] result contract shared
//! by probes, engine and host glue, and the parameter schema types used
//! by the registry to validate incoming requests.

pub mod descriptor;
pub mod key;
pub mod params;
pub mod types;
