use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use std::io;
use std::time::Instant;
use tokio::net::TcpStream;

use crate::Probe;

/// Reachability and connect latency for daemons with a conventional TCP
/// port. Parameters `host` and `port` default per family in the catalog.
///
/// A refused connection means nothing is listening on the family's port,
/// which is reported as the subsystem being absent; routing failures and
/// connect timeouts mean it exists but cannot be reached.
pub struct TcpConnectProbe {
    subsystem: &'static str,
}

impl TcpConnectProbe {
    pub fn new(subsystem: &'static str) -> Self {
        TcpConnectProbe { subsystem }
    }
}

pub(crate) fn classify_connect_error(subsystem: &str, err: &io::Error) -> ProbeError {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ProbeError::SubsystemAbsent {
            subsystem: subsystem.to_string(),
        },
        io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied {
            resource: format!("{subsystem} socket"),
        },
        _ => ProbeError::SubsystemUnreachable {
            subsystem: subsystem.to_string(),
            reason: err.to_string(),
        },
    }
}

#[async_trait]
impl Probe for TcpConnectProbe {
    async fn execute(&self, params: &ProbeParams) -> ProbeResult {
        let host = params.text("host").unwrap_or("127.0.0.1");
        let port = params
            .port("port")
            .ok_or_else(|| ProbeError::invalid_params("missing required parameter 'port'"))?;

        let started = Instant::now();
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| classify_connect_error(self.subsystem, &e))?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        drop(stream);

        Ok(MetricValue::object([
            ("reachable", json!(true)),
            ("host", json!(host)),
            ("port", json!(port)),
            ("latency_ms", json!(latency_ms)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cstage_common::params::{ParamKind, ParamSpec};
    use tokio::net::TcpListener;

    fn schema(default_port: Option<u16>) -> Vec<ParamSpec> {
        let mut schema = vec![ParamSpec::with_default("host", ParamKind::Text, "127.0.0.1")];
        schema.push(match default_port {
            Some(p) => ParamSpec::with_default("port", ParamKind::Port, p.to_string()),
            None => ParamSpec::required("port", ParamKind::Port),
        });
        schema
    }

    #[tokio::test]
    async fn reports_listening_socket_with_latency() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let params =
            ProbeParams::coerce(&schema(Some(port)), &[]).unwrap();
        let value = TcpConnectProbe::new("redis").execute(&params).await.unwrap();
        let rendered = serde_json::to_string(&value).unwrap();
        assert!(rendered.contains("\"reachable\":true"));
        assert!(rendered.contains(&format!("\"port\":{port}")));
    }

    #[tokio::test]
    async fn refused_connection_is_absent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener); // Free the port so the connect is refused.

        let params = ProbeParams::coerce(&schema(Some(port)), &[]).unwrap();
        let err = TcpConnectProbe::new("redis")
            .execute(&params)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::SubsystemAbsent { .. }));
    }

    #[test]
    fn classification_covers_the_three_ways() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let timed_out = io::Error::from(io::ErrorKind::TimedOut);

        assert!(matches!(
            classify_connect_error("pg", &refused),
            ProbeError::SubsystemAbsent { .. }
        ));
        assert!(matches!(
            classify_connect_error("pg", &denied),
            ProbeError::PermissionDenied { .. }
        ));
        assert!(matches!(
            classify_connect_error("pg", &timed_out),
            ProbeError::SubsystemUnreachable { .. }
        ));
    }
}
