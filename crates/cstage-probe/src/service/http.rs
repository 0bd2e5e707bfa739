use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::{json, Map, Value};
use std::error::Error as _;
use std::io;
use std::time::Instant;

use crate::service::tcp::classify_connect_error;
use crate::Probe;

/// How to interpret a status endpoint's response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyParser {
    /// Status code and latency only.
    None,
    /// nginx `stub_status` plain-text format.
    NginxStub,
    /// Apache `mod_status` machine-readable (`?auto`) format.
    ApacheStatus,
    /// JSON body; top-level primitive fields are merged into the result.
    JsonHealth,
}

/// Health of a daemon exposing a conventional HTTP status endpoint.
///
/// Parameters `host`, `port` and `path` default per family in the
/// catalog. Any HTTP response means the daemon is present and reachable;
/// `healthy` reflects a 2xx status. The client is probe-owned and reused
/// across calls.
pub struct HttpEndpointProbe {
    subsystem: &'static str,
    parser: BodyParser,
    client: reqwest::Client,
}

impl HttpEndpointProbe {
    pub fn new(subsystem: &'static str, parser: BodyParser) -> Self {
        HttpEndpointProbe {
            subsystem,
            parser,
            client: reqwest::Client::new(),
        }
    }
}

/// Walks a reqwest error chain looking for the underlying I/O error.
fn io_cause(err: &reqwest::Error) -> Option<&io::Error> {
    let mut source: Option<&(dyn std::error::Error + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err);
        }
        source = cause.source();
    }
    None
}

fn classify_request_error(subsystem: &str, err: &reqwest::Error) -> ProbeError {
    if let Some(io_err) = io_cause(err) {
        return classify_connect_error(subsystem, io_err);
    }
    if err.is_timeout() || err.is_connect() {
        return ProbeError::SubsystemUnreachable {
            subsystem: subsystem.to_string(),
            reason: err.to_string(),
        };
    }
    ProbeError::internal(format!("http request failed: {err}"))
}

/// Parses nginx stub_status output:
///
/// ```text
/// Active connections: 291
/// server accepts handled requests
///  16630948 16630948 31070465
/// Reading: 6 Writing: 179 Waiting: 106
/// ```
pub(crate) fn parse_nginx_stub(body: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    let mut lines = body.lines();

    if let Some(active) = lines
        .next()
        .and_then(|l| l.strip_prefix("Active connections:"))
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        fields.insert("active_connections".to_string(), json!(active));
    }
    // Header line "server accepts handled requests", then the counters.
    if lines.next().is_some() {
        if let Some(counters) = lines.next() {
            let values: Vec<u64> = counters
                .split_whitespace()
                .filter_map(|v| v.parse().ok())
                .collect();
            if let [accepts, handled, requests] = values[..] {
                fields.insert("accepts".to_string(), json!(accepts));
                fields.insert("handled".to_string(), json!(handled));
                fields.insert("requests".to_string(), json!(requests));
            }
        }
    }
    if let Some(states) = lines.next() {
        let mut tokens = states.split_whitespace();
        while let Some(label) = tokens.next() {
            let Some(value) = tokens.next().and_then(|v| v.parse::<u64>().ok()) else {
                continue;
            };
            match label {
                "Reading:" => fields.insert("reading".to_string(), json!(value)),
                "Writing:" => fields.insert("writing".to_string(), json!(value)),
                "Waiting:" => fields.insert("waiting".to_string(), json!(value)),
                _ => None,
            };
        }
    }
    fields
}

/// Parses Apache mod_status `?auto` output (`Key: value` lines), keeping
/// the counters a monitoring host cares about.
pub(crate) fn parse_apache_status(body: &str) -> Map<String, Value> {
    const KEEP: [(&str, &str); 6] = [
        ("Total Accesses", "total_accesses"),
        ("Total kBytes", "total_kbytes"),
        ("Uptime", "uptime_secs"),
        ("ReqPerSec", "req_per_sec"),
        ("BusyWorkers", "busy_workers"),
        ("IdleWorkers", "idle_workers"),
    ];
    let mut fields = Map::new();
    for line in body.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some((_, name)) = KEEP.iter().find(|(k, _)| *k == key.trim()) else {
            continue;
        };
        if let Ok(num) = value.trim().parse::<f64>() {
            fields.insert(name.to_string(), json!(num));
        }
    }
    fields
}

/// Merges top-level primitive fields of a JSON body, capped to keep
/// pathological payloads out of the result.
pub(crate) fn parse_json_health(body: &str) -> Map<String, Value> {
    const MAX_FIELDS: usize = 16;
    let mut fields = Map::new();
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return fields;
    };
    for (key, value) in map {
        if fields.len() >= MAX_FIELDS {
            break;
        }
        if matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
            fields.insert(key, value);
        }
    }
    fields
}

#[async_trait]
impl Probe for HttpEndpointProbe {
    async fn execute(&self, params: &ProbeParams) -> ProbeResult {
        let host = params.text("host").unwrap_or("127.0.0.1");
        let port = params
            .port("port")
            .ok_or_else(|| ProbeError::invalid_params("missing required parameter 'port'"))?;
        let path = params.text("path").unwrap_or("/");
        let url = format!("http://{host}:{port}{path}");

        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_request_error(self.subsystem, &e))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::trace!(
            subsystem = self.subsystem,
            url,
            status = status.as_u16(),
            "Status endpoint answered"
        );

        let mut fields = Map::new();
        fields.insert("http_status".to_string(), json!(status.as_u16()));
        fields.insert("healthy".to_string(), json!(status.is_success()));
        fields.insert("latency_ms".to_string(), json!(latency_ms));
        if status.is_success() {
            let parsed = match self.parser {
                BodyParser::None => Map::new(),
                BodyParser::NginxStub => parse_nginx_stub(&body),
                BodyParser::ApacheStatus => parse_apache_status(&body),
                BodyParser::JsonHealth => parse_json_health(&body),
            };
            fields.extend(parsed);
        }
        Ok(MetricValue::Object(fields))
    }
}
