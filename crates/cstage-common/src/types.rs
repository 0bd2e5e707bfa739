use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io;

/// A collected metric value, ready for the host's wire representation.
///
/// Serializes untagged: scalars as numbers, text as strings, structured
/// results as JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Text(String),
    Object(Map<String, Value>),
}

impl MetricValue {
    /// Builds an [`MetricValue::Object`] from field pairs.
    pub fn object<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let mut map = Map::new();
        for (name, value) in fields {
            map.insert(name.to_string(), value);
        }
        MetricValue::Object(map)
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Scalar(v)
    }
}

impl From<&str> for MetricValue {
    fn from(s: &str) -> Self {
        MetricValue::Text(s.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(s: String) -> Self {
        MetricValue::Text(s)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Scalar(v) => write!(f, "{v}"),
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Object(map) => {
                write!(f, "{}", Value::Object(map.clone()))
            }
        }
    }
}

/// Probe failure taxonomy.
///
/// Every failure a probe or the dispatcher can produce is classified into
/// one of these kinds at the probe boundary; subsystem-specific error
/// types never travel past it. Variants carry rendered context only, so
/// errors stay `Clone` and can live in the result cache.
///
/// # Examples
///
/// ```
/// use cstage_common::types::ProbeError;
///
/// let err = ProbeError::SubsystemUnreachable {
///     subsystem: "postgres".to_string(),
///     reason: "connection timed out".to_string(),
/// };
/// assert_eq!(err.kind(), "subsystem_unreachable");
/// assert!(err.to_string().contains("postgres"));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    /// The metric key is not registered.
    #[error("unsupported metric key '{key}'")]
    Unsupported { key: String },

    /// The request parameters do not match the probe's schema.
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    /// The probe did not complete within its timeout budget.
    #[error("probe timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The subsystem is not installed or not running on this host.
    #[error("{subsystem} is not present on this host")]
    SubsystemAbsent { subsystem: String },

    /// The subsystem is present but could not be reached.
    #[error("{subsystem} is unreachable: {reason}")]
    SubsystemUnreachable { subsystem: String, reason: String },

    /// The agent lacks permission to read a required resource.
    #[error("permission denied reading {resource}")]
    PermissionDenied { resource: String },

    /// A bug or unexpected condition inside a probe.
    #[error("internal probe failure: {cause}")]
    Internal { cause: String },
}

impl ProbeError {
    pub fn unsupported(key: impl Into<String>) -> Self {
        ProbeError::Unsupported { key: key.into() }
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        ProbeError::InvalidParameters {
            reason: reason.into(),
        }
    }

    pub fn internal(cause: impl fmt::Display) -> Self {
        ProbeError::Internal {
            cause: cause.to_string(),
        }
    }

    /// Classifies an I/O error from reading a local resource (status file,
    /// socket path, pseudo-filesystem entry) for `subsystem`.
    ///
    /// Missing resources mean the subsystem is not installed; permission
    /// failures are surfaced as such; anything else is internal.
    pub fn from_read(subsystem: &str, resource: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ProbeError::SubsystemAbsent {
                subsystem: subsystem.to_string(),
            },
            io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied {
                resource: resource.to_string(),
            },
            _ => ProbeError::Internal {
                cause: format!("reading {resource}: {err}"),
            },
        }
    }

    /// Stable snake_case tag for logs and the host response contract.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Unsupported { .. } => "unsupported",
            ProbeError::InvalidParameters { .. } => "invalid_parameters",
            ProbeError::Timeout { .. } => "timeout",
            ProbeError::SubsystemAbsent { .. } => "subsystem_absent",
            ProbeError::SubsystemUnreachable { .. } => "subsystem_unreachable",
            ProbeError::PermissionDenied { .. } => "permission_denied",
            ProbeError::Internal { .. } => "internal",
        }
    }
}

/// Convenience alias for probe execution results.
pub type ProbeResult = Result<MetricValue, ProbeError>;

/// A timestamped collection outcome, as reported to the host.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub key: String,
    pub collected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<MetricValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Sample {
    pub fn from_outcome(key: &str, outcome: &ProbeResult) -> Self {
        match outcome {
            Ok(value) => Sample {
                key: key.to_string(),
                collected_at: Utc::now(),
                value: Some(value.clone()),
                error_kind: None,
                error: None,
            },
            Err(err) => Sample {
                key: key.to_string(),
                collected_at: Utc::now(),
                value: None,
                error_kind: Some(err.kind().to_string()),
                error: Some(err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metric_value_serializes_untagged() {
        assert_eq!(
            serde_json::to_string(&MetricValue::Scalar(1.5)).unwrap(),
            "1.5"
        );
        assert_eq!(
            serde_json::to_string(&MetricValue::from("up")).unwrap(),
            "\"up\""
        );
        let obj = MetricValue::object([("status", json!("ok")), ("latency_ms", json!(3))]);
        assert_eq!(
            serde_json::to_string(&obj).unwrap(),
            "{\"status\":\"ok\",\"latency_ms\":3}"
        );
    }

    #[test]
    fn io_errors_classify_three_ways() {
        let absent = io::Error::from(io::ErrorKind::NotFound);
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let other = io::Error::other("wedged");

        assert!(matches!(
            ProbeError::from_read("selinux", "/sys/fs/selinux/enforce", &absent),
            ProbeError::SubsystemAbsent { .. }
        ));
        assert!(matches!(
            ProbeError::from_read("auditd", "/var/log/audit", &denied),
            ProbeError::PermissionDenied { .. }
        ));
        assert!(matches!(
            ProbeError::from_read("kernel", "/proc/stat", &other),
            ProbeError::Internal { .. }
        ));
    }

    #[test]
    fn sample_captures_error_kind() {
        let sample = Sample::from_outcome(
            "cstage.database.redis",
            &Err(ProbeError::SubsystemAbsent {
                subsystem: "redis".to_string(),
            }),
        );
        assert_eq!(sample.error_kind.as_deref(), Some("subsystem_absent"));
        assert!(sample.value.is_none());
    }
}
