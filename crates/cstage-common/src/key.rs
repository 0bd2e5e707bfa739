use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dot-namespaced metric identifier (e.g. `cstage.database.postgres`).
///
/// Keys are lowercase, with at least two non-empty segments of ASCII
/// letters, digits or underscores. A key is immutable once parsed and
/// unique within a registry.
///
/// # Examples
///
/// ```
/// use cstage_common::key::MetricKey;
///
/// let key: MetricKey = "cstage.linux.cpu".parse().unwrap();
/// assert_eq!(key.as_str(), "cstage.linux.cpu");
/// assert_eq!(key.domain(), "cstage");
/// assert!("CSTAGE.Linux".parse::<MetricKey>().is_err());
/// assert!("standalone".parse::<MetricKey>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetricKey(String);

impl MetricKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First segment of the key (e.g. `cstage`).
    pub fn domain(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MetricKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('.').collect();
        if segments.len() < 2 {
            return Err(format!("metric key '{s}' must have at least two segments"));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(format!("metric key '{s}' contains an empty segment"));
            }
            if !segment
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
            {
                return Err(format!(
                    "metric key '{s}': segment '{segment}' must be lowercase alphanumeric"
                ));
            }
        }
        Ok(MetricKey(s.to_string()))
    }
}

impl TryFrom<String> for MetricKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MetricKey> for String {
    fn from(key: MetricKey) -> Self {
        key.0
    }
}
