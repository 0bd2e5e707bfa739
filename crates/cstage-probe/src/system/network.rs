use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;

use crate::system::procfs;
use crate::Probe;

/// Interface byte/packet/error counters from `/proc/net/dev` for
/// `cstage.linux.network.traffic`. Counters are cumulative since boot;
/// loopback is excluded. Optional `interface` parameter restricts the
/// report to one interface.
pub struct NetTrafficProbe;

#[derive(Debug, PartialEq)]
pub(crate) struct InterfaceCounters {
    pub name: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

/// Parses `/proc/net/dev`, skipping the two header lines and `lo`.
pub(crate) fn parse_net_dev(contents: &str) -> Vec<InterfaceCounters> {
    let mut out = Vec::new();
    for line in contents.lines().skip(2) {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name == "lo" {
            continue;
        }
        let fields: Vec<u64> = rest
            .split_whitespace()
            .map(|f| f.parse::<u64>().unwrap_or(0))
            .collect();
        if fields.len() < 16 {
            continue;
        }
        out.push(InterfaceCounters {
            name: name.to_string(),
            rx_bytes: fields[0],
            rx_packets: fields[1],
            rx_errors: fields[2],
            tx_bytes: fields[8],
            tx_packets: fields[9],
            tx_errors: fields[10],
        });
    }
    out
}

#[async_trait]
impl Probe for NetTrafficProbe {
    async fn execute(&self, params: &ProbeParams) -> ProbeResult {
        let contents = procfs::read("network", "/proc/net/dev")?;
        let mut interfaces = parse_net_dev(&contents);

        if let Some(wanted) = params.text("interface") {
            interfaces.retain(|i| i.name == wanted);
            if interfaces.is_empty() {
                return Err(ProbeError::invalid_params(format!(
                    "unknown interface '{wanted}'"
                )));
            }
        }

        let rx_total: u64 = interfaces.iter().map(|i| i.rx_bytes).sum();
        let tx_total: u64 = interfaces.iter().map(|i| i.tx_bytes).sum();
        let detail: Vec<_> = interfaces
            .iter()
            .map(|i| {
                json!({
                    "interface": i.name,
                    "rx_bytes": i.rx_bytes,
                    "rx_packets": i.rx_packets,
                    "rx_errors": i.rx_errors,
                    "tx_bytes": i.tx_bytes,
                    "tx_packets": i.tx_packets,
                    "tx_errors": i.tx_errors,
                })
            })
            .collect();

        Ok(MetricValue::object([
            ("interfaces", json!(detail)),
            ("rx_bytes_total", json!(rx_total)),
            ("tx_bytes_total", json!(tx_total)),
        ]))
    }
}

/// Socket table summary from `/proc/net/sockstat` for
/// `cstage.linux.network.sockets`.
pub struct NetSocketsProbe;

/// Extracts a named counter from a sockstat line such as
/// `TCP: inuse 12 orphan 0 tw 4 alloc 20 mem 3`.
pub(crate) fn sockstat_counter(contents: &str, proto: &str, field: &str) -> Option<u64> {
    let line = contents
        .lines()
        .find(|l| l.starts_with(proto) && l[proto.len()..].starts_with(':'))?;
    let mut tokens = line.split_whitespace().skip(1);
    while let Some(name) = tokens.next() {
        let value = tokens.next()?;
        if name == field {
            return value.parse().ok();
        }
    }
    None
}

#[async_trait]
impl Probe for NetSocketsProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let contents = procfs::read("sockets", "/proc/net/sockstat")?;
        let counter = |proto: &str, field: &str| sockstat_counter(&contents, proto, field);

        Ok(MetricValue::object([
            ("sockets_used", json!(counter("sockets", "used").unwrap_or(0))),
            ("tcp_in_use", json!(counter("TCP", "inuse").unwrap_or(0))),
            ("tcp_orphaned", json!(counter("TCP", "orphan").unwrap_or(0))),
            ("tcp_time_wait", json!(counter("TCP", "tw").unwrap_or(0))),
            ("tcp_allocated", json!(counter("TCP", "alloc").unwrap_or(0))),
            ("udp_in_use", json!(counter("UDP", "inuse").unwrap_or(0))),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  123456     789    0    0    0     0          0         0   123456     789    0    0    0     0       0          0
  eth0: 9876543    5432    2    0    0     0          0         0  1234567    4321    1    0    0     0       0          0
";

    const SOCKSTAT: &str = "\
sockets: used 290
TCP: inuse 12 orphan 0 tw 4 alloc 20 mem 3
UDP: inuse 7 mem 2
UDPLITE: inuse 0
RAW: inuse 0
FRAG: inuse 0 memory 0
";

    #[test]
    fn parses_interfaces_excluding_loopback() {
        let interfaces = parse_net_dev(NET_DEV);
        assert_eq!(interfaces.len(), 1);
        let eth0 = &interfaces[0];
        assert_eq!(eth0.name, "eth0");
        assert_eq!(eth0.rx_bytes, 9876543);
        assert_eq!(eth0.rx_errors, 2);
        assert_eq!(eth0.tx_bytes, 1234567);
        assert_eq!(eth0.tx_packets, 4321);
    }

    #[test]
    fn extracts_sockstat_counters() {
        assert_eq!(sockstat_counter(SOCKSTAT, "sockets", "used"), Some(290));
        assert_eq!(sockstat_counter(SOCKSTAT, "TCP", "inuse"), Some(12));
        assert_eq!(sockstat_counter(SOCKSTAT, "TCP", "tw"), Some(4));
        assert_eq!(sockstat_counter(SOCKSTAT, "UDP", "inuse"), Some(7));
        assert_eq!(sockstat_counter(SOCKSTAT, "TCP", "missing"), None);
        assert_eq!(sockstat_counter(SOCKSTAT, "SCTP", "inuse"), None);
    }
}
