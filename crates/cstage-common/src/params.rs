//! Parameter schema and coercion.
//!
//! Hosts pass parameters as ordered strings (the Zabbix-style
//! `key[param1,param2]` convention). The registry validates and coerces
//! them against the probe's [`ParamSpec`] list before the probe ever runs,
//! so probes only see typed, complete [`ProbeParams`].

use serde::Serialize;

use crate::types::ProbeError;

/// Expected type of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Text,
    Integer,
    Float,
    Bool,
    /// TCP port: integer in 1..=65535.
    Port,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Text => "text",
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
            ParamKind::Port => "port",
        }
    }
}

/// Schema entry for one positional, named parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        ParamSpec {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind) -> Self {
        ParamSpec {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn with_default(name: &'static str, kind: ParamKind, default: impl Into<String>) -> Self {
        ParamSpec {
            name,
            kind,
            required: false,
            default: Some(default.into()),
        }
    }
}

/// A coerced parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Port(u16),
    /// Optional parameter that was neither supplied nor defaulted.
    Absent,
}

impl ParamValue {
    /// Canonical string form, used to build the cache key so that
    /// equivalent requests (`"8080"` vs `"08080"`) coalesce.
    pub fn canonical(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Integer(v) => v.to_string(),
            ParamValue::Float(v) => v.to_string(),
            ParamValue::Bool(v) => v.to_string(),
            ParamValue::Port(v) => v.to_string(),
            ParamValue::Absent => String::new(),
        }
    }
}

/// Validated, ordered parameters handed to a probe.
///
/// # Examples
///
/// ```
/// use cstage_common::params::{ParamKind, ParamSpec, ProbeParams};
///
/// let schema = [
///     ParamSpec::with_default("host", ParamKind::Text, "127.0.0.1"),
///     ParamSpec::with_default("port", ParamKind::Port, "5432"),
/// ];
/// let params = ProbeParams::coerce(&schema, &["db.example".to_string()]).unwrap();
/// assert_eq!(params.text("host"), Some("db.example"));
/// assert_eq!(params.port("port"), Some(5432));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProbeParams {
    values: Vec<(&'static str, ParamValue)>,
}

impl ProbeParams {
    /// Validates `raw` against `schema` and coerces each position.
    ///
    /// Empty strings count as omitted (the host convention for skipped
    /// middle positions). Surplus parameters, missing required ones,
    /// unparseable values and out-of-range ports are all
    /// [`ProbeError::InvalidParameters`].
    pub fn coerce(schema: &[ParamSpec], raw: &[String]) -> Result<Self, ProbeError> {
        if raw.len() > schema.len() {
            return Err(ProbeError::invalid_params(format!(
                "too many parameters: got {}, expected at most {}",
                raw.len(),
                schema.len()
            )));
        }

        let mut values = Vec::with_capacity(schema.len());
        for (i, spec) in schema.iter().enumerate() {
            let supplied = raw.get(i).map(String::as_str).filter(|s| !s.is_empty());
            let effective = supplied.or(spec.default.as_deref());
            let value = match effective {
                Some(s) => Self::parse_one(spec, s)?,
                None if spec.required => {
                    return Err(ProbeError::invalid_params(format!(
                        "missing required parameter '{}'",
                        spec.name
                    )));
                }
                None => ParamValue::Absent,
            };
            values.push((spec.name, value));
        }
        Ok(ProbeParams { values })
    }

    fn parse_one(spec: &ParamSpec, s: &str) -> Result<ParamValue, ProbeError> {
        let fail = |detail: &str| {
            ProbeError::invalid_params(format!(
                "parameter '{}' ({}): {detail}: '{s}'",
                spec.name,
                spec.kind.name()
            ))
        };
        match spec.kind {
            ParamKind::Text => Ok(ParamValue::Text(s.to_string())),
            ParamKind::Integer => s
                .parse::<i64>()
                .map(ParamValue::Integer)
                .map_err(|_| fail("not an integer")),
            ParamKind::Float => match s.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(ParamValue::Float(v)),
                _ => Err(fail("not a finite number")),
            },
            ParamKind::Bool => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(ParamValue::Bool(true)),
                "false" | "no" | "0" => Ok(ParamValue::Bool(false)),
                _ => Err(fail("not a boolean")),
            },
            ParamKind::Port => match s.parse::<u32>() {
                Ok(v) if (1..=65535).contains(&v) => Ok(ParamValue::Port(v as u16)),
                Ok(_) => Err(fail("out of range 1..=65535")),
                Err(_) => Err(fail("not a port number")),
            },
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ParamValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn port(&self, name: &str) -> Option<u16> {
        match self.get(name)? {
            ParamValue::Port(v) => Some(*v),
            _ => None,
        }
    }

    fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Canonical parameter tuple for cache keying.
    pub fn cache_tuple(&self) -> Vec<String> {
        self.values.iter().map(|(_, v)| v.canonical()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> [ParamSpec; 3] {
        [
            ParamSpec::required("host", ParamKind::Text),
            ParamSpec::with_default("port", ParamKind::Port, "6379"),
            ParamSpec::optional("verbose", ParamKind::Bool),
        ]
    }

    fn raw(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn applies_defaults_and_coerces() {
        let params = ProbeParams::coerce(&schema(), &raw(&["redis-01"])).unwrap();
        assert_eq!(params.text("host"), Some("redis-01"));
        assert_eq!(params.port("port"), Some(6379));
        assert_eq!(params.boolean("verbose"), None);
    }

    #[test]
    fn empty_string_means_omitted() {
        let params = ProbeParams::coerce(&schema(), &raw(&["redis-01", "", "yes"])).unwrap();
        assert_eq!(params.port("port"), Some(6379));
        assert_eq!(params.boolean("verbose"), Some(true));
    }

    #[test]
    fn rejects_missing_required() {
        let err = ProbeParams::coerce(&schema(), &[]).unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn rejects_surplus_parameters() {
        let err = ProbeParams::coerce(&schema(), &raw(&["h", "1", "no", "extra"])).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidParameters { .. }));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let err = ProbeParams::coerce(&schema(), &raw(&["h", "70000"])).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn canonical_tuple_normalizes_numbers() {
        let a = ProbeParams::coerce(&schema(), &raw(&["h", "08080"])).unwrap();
        let b = ProbeParams::coerce(&schema(), &raw(&["h", "8080"])).unwrap();
        assert_eq!(a.cache_tuple(), b.cache_tuple());
    }
}
