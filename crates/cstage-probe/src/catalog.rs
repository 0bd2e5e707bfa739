//! The metric family catalog.
//!
//! Every key the CSTAGE agent answers for is declared here once, mapped
//! onto a probe implementation with the family's defaults (port, status
//! path, parser, timeout, cache TTL). Hosts can override `host`/`port`
//! per request; everything else is registration-time data.

use std::sync::Arc;
use std::time::Duration;

use cstage_common::descriptor::ProbeDescriptor;
use cstage_common::key::MetricKey;
use cstage_common::params::{ParamKind, ParamSpec};

use crate::echo::EchoProbe;
use crate::service::command::{CommandProbe, OutputParser};
use crate::service::http::{BodyParser, HttpEndpointProbe};
use crate::service::path::PathPresenceProbe;
use crate::service::process::ProcessPresenceProbe;
use crate::service::tcp::TcpConnectProbe;
use crate::system::cpu::CpuProbe;
use crate::system::cron::CronProbe;
use crate::system::disk::{DiskIoProbe, DiskUsageProbe};
use crate::system::kernel::{ConntrackProbe, EntropyProbe, InterruptsProbe, KernelProbe};
use crate::system::memory::MemoryProbe;
use crate::system::network::{NetSocketsProbe, NetTrafficProbe};
use crate::system::security::{
    ApparmorProbe, AuditProbe, Fail2banProbe, FirewallProbe, SelinuxProbe, SshProbe,
};
use crate::system::systemd::SystemdProbe;
use crate::Probe;

/// One registerable (descriptor, probe) pair.
pub struct CatalogEntry {
    pub descriptor: ProbeDescriptor,
    pub probe: Arc<dyn Probe>,
}

const LOCAL_TIMEOUT: Duration = Duration::from_secs(2);
const SERVICE_TIMEOUT: Duration = Duration::from_secs(3);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

const LOCAL_TTL: Duration = Duration::from_secs(15);
const SERVICE_TTL: Duration = Duration::from_secs(30);

/// Builds the full catalog: all `cstage.*` families plus `demo.echo`.
pub fn all() -> Vec<CatalogEntry> {
    let mut entries = Vec::with_capacity(128);
    linux(&mut entries);
    database(&mut entries);
    web(&mut entries);
    middleware(&mut entries);
    storage(&mut entries);
    infra(&mut entries);
    network_services(&mut entries);

    let descriptor = ProbeDescriptor::new(key("demo.echo"), "Echoes its parameter back.")
        .with_params(vec![ParamSpec::required("msg", ParamKind::Text)])
        .with_timeout(Duration::from_secs(1));
    entries.push(CatalogEntry {
        descriptor,
        probe: Arc::new(EchoProbe),
    });
    entries
}

fn key(raw: &str) -> MetricKey {
    raw.parse().expect("catalog keys are statically valid")
}

fn host_port_params(port: u16) -> Vec<ParamSpec> {
    vec![
        ParamSpec::with_default("host", ParamKind::Text, "127.0.0.1"),
        ParamSpec::with_default("port", ParamKind::Port, port.to_string()),
    ]
}

/// Local probe over procfs/sysfs/sysinfo; no connection parameters.
fn local(
    entries: &mut Vec<CatalogEntry>,
    raw_key: &str,
    description: &str,
    probe: Arc<dyn Probe>,
) {
    entries.push(CatalogEntry {
        descriptor: ProbeDescriptor::new(key(raw_key), description)
            .with_timeout(LOCAL_TIMEOUT)
            .with_cache_ttl(LOCAL_TTL),
        probe,
    });
}

fn local_with_params(
    entries: &mut Vec<CatalogEntry>,
    raw_key: &str,
    description: &str,
    params: Vec<ParamSpec>,
    probe: Arc<dyn Probe>,
) {
    entries.push(CatalogEntry {
        descriptor: ProbeDescriptor::new(key(raw_key), description)
            .with_params(params)
            .with_timeout(LOCAL_TIMEOUT)
            .with_cache_ttl(LOCAL_TTL),
        probe,
    });
}

/// Daemon with a conventional TCP port.
fn tcp(
    entries: &mut Vec<CatalogEntry>,
    raw_key: &str,
    description: &str,
    subsystem: &'static str,
    port: u16,
) {
    entries.push(CatalogEntry {
        descriptor: ProbeDescriptor::new(key(raw_key), description)
            .with_params(host_port_params(port))
            .with_timeout(SERVICE_TIMEOUT)
            .with_cache_ttl(SERVICE_TTL),
        probe: Arc::new(TcpConnectProbe::new(subsystem)),
    });
}

/// Daemon with no conventional port; `port` is a required parameter.
fn tcp_any_port(
    entries: &mut Vec<CatalogEntry>,
    raw_key: &str,
    description: &str,
    subsystem: &'static str,
) {
    entries.push(CatalogEntry {
        descriptor: ProbeDescriptor::new(key(raw_key), description)
            .with_params(vec![
                ParamSpec::with_default("host", ParamKind::Text, "127.0.0.1"),
                ParamSpec::required("port", ParamKind::Port),
            ])
            .with_timeout(SERVICE_TIMEOUT)
            .with_cache_ttl(SERVICE_TTL),
        probe: Arc::new(TcpConnectProbe::new(subsystem)),
    });
}

/// Daemon with a conventional HTTP status endpoint.
fn http(
    entries: &mut Vec<CatalogEntry>,
    raw_key: &str,
    description: &str,
    subsystem: &'static str,
    port: u16,
    path: &str,
    parser: BodyParser,
) {
    let mut params = host_port_params(port);
    params.push(ParamSpec::with_default("path", ParamKind::Text, path));
    entries.push(CatalogEntry {
        descriptor: ProbeDescriptor::new(key(raw_key), description)
            .with_params(params)
            .with_timeout(SERVICE_TIMEOUT)
            .with_cache_ttl(SERVICE_TTL),
        probe: Arc::new(HttpEndpointProbe::new(subsystem, parser)),
    });
}

/// Subsystem queried through a fixed read-only command.
fn command(
    entries: &mut Vec<CatalogEntry>,
    raw_key: &str,
    description: &str,
    subsystem: &'static str,
    program: &'static str,
    args: &'static [&'static str],
    parser: OutputParser,
) {
    entries.push(CatalogEntry {
        descriptor: ProbeDescriptor::new(key(raw_key), description)
            .with_timeout(COMMAND_TIMEOUT)
            .with_cache_ttl(SERVICE_TTL),
        probe: Arc::new(CommandProbe::new(subsystem, program, args, parser)),
    });
}

/// Subsystem detected through marker paths.
fn marker(
    entries: &mut Vec<CatalogEntry>,
    raw_key: &str,
    description: &str,
    subsystem: &'static str,
    candidates: &[&str],
) {
    entries.push(CatalogEntry {
        descriptor: ProbeDescriptor::new(key(raw_key), description)
            .with_timeout(LOCAL_TIMEOUT)
            .with_cache_ttl(SERVICE_TTL),
        probe: Arc::new(PathPresenceProbe::new(subsystem, candidates)),
    });
}

/// Subsystem detected through its process name(s).
fn daemon(
    entries: &mut Vec<CatalogEntry>,
    raw_key: &str,
    description: &str,
    subsystem: &'static str,
    processes: &'static [&'static str],
) {
    entries.push(CatalogEntry {
        descriptor: ProbeDescriptor::new(key(raw_key), description)
            .with_timeout(LOCAL_TIMEOUT)
            .with_cache_ttl(SERVICE_TTL),
        probe: Arc::new(ProcessPresenceProbe::new(subsystem, processes)),
    });
}

fn linux(e: &mut Vec<CatalogEntry>) {
    local(e, "cstage.linux.kernel", "Kernel status and activity counters.", Arc::new(KernelProbe));
    local(e, "cstage.linux.cpu", "CPU load, wait and steal metrics.", Arc::new(CpuProbe));
    local(e, "cstage.linux.memory", "RAM and swap usage.", Arc::new(MemoryProbe));
    local(e, "cstage.linux.disk.io", "Block device I/O counters.", Arc::new(DiskIoProbe));
    local_with_params(
        e,
        "cstage.linux.disk.usage",
        "Filesystem space usage.",
        vec![ParamSpec::optional("mount", ParamKind::Text)],
        Arc::new(DiskUsageProbe),
    );
    local(e, "cstage.linux.security.ssh", "SSH daemon hardening summary.", Arc::new(SshProbe::new()));
    local(e, "cstage.linux.security.selinux", "SELinux enforcement state.", Arc::new(SelinuxProbe::new()));
    local(e, "cstage.linux.security.apparmor", "AppArmor state and loaded profiles.", Arc::new(ApparmorProbe::new()));
    local(e, "cstage.linux.security.firewall", "Packet filter backend status (iptables/nftables).", Arc::new(FirewallProbe::new()));
    local(e, "cstage.linux.security.audit", "Audit daemon liveness.", Arc::new(AuditProbe::new()));
    local(e, "cstage.linux.security.fail2ban", "Fail2ban server liveness.", Arc::new(Fail2banProbe::new()));
    local_with_params(
        e,
        "cstage.linux.network.traffic",
        "Network interface traffic counters.",
        vec![ParamSpec::optional("interface", ParamKind::Text)],
        Arc::new(NetTrafficProbe),
    );
    local(e, "cstage.linux.network.sockets", "TCP/UDP socket table summary.", Arc::new(NetSocketsProbe));
    local(e, "cstage.linux.systemd", "Systemd unit health summary.", Arc::new(SystemdProbe));
    local(e, "cstage.linux.cron", "Cron daemon and job inventory.", Arc::new(CronProbe::new()));
    local(e, "cstage.linux.entropy", "Available kernel entropy.", Arc::new(EntropyProbe));
    local(e, "cstage.linux.interrupts", "CPU interrupt counters.", Arc::new(InterruptsProbe));
    local(e, "cstage.linux.conntrack", "Netfilter conntrack table usage.", Arc::new(ConntrackProbe));
}

fn database(e: &mut Vec<CatalogEntry>) {
    tcp(e, "cstage.database.oracle", "Oracle DB listener reachability.", "oracle", 1521);
    tcp(e, "cstage.database.postgres", "PostgreSQL server reachability.", "postgres", 5432);
    tcp(e, "cstage.database.mysql", "MySQL/MariaDB server reachability.", "mysql", 3306);
    tcp(e, "cstage.database.sqlserver", "SQL Server reachability.", "sqlserver", 1433);
    tcp(e, "cstage.database.mongodb", "MongoDB server reachability.", "mongodb", 27017);
    tcp(e, "cstage.database.redis", "Redis server reachability.", "redis", 6379);
    tcp(e, "cstage.database.cassandra", "Cassandra native transport reachability.", "cassandra", 9042);
    tcp(e, "cstage.database.scylladb", "ScyllaDB native transport reachability.", "scylladb", 9042);
    http(e, "cstage.database.elasticsearch", "Elasticsearch cluster health.", "elasticsearch", 9200, "/_cluster/health", BodyParser::JsonHealth);
    http(e, "cstage.database.solr", "Solr node health.", "solr", 8983, "/solr/admin/info/health", BodyParser::JsonHealth);
    http(e, "cstage.database.clickhouse", "ClickHouse HTTP ping.", "clickhouse", 8123, "/ping", BodyParser::None);
    http(e, "cstage.database.influxdb", "InfluxDB health endpoint.", "influxdb", 8086, "/health", BodyParser::JsonHealth);
    tcp(e, "cstage.database.timescaledb", "TimescaleDB server reachability.", "timescaledb", 5432);
    http(e, "cstage.database.couchdb", "CouchDB liveness endpoint.", "couchdb", 5984, "/_up", BodyParser::JsonHealth);
    tcp(e, "cstage.database.neo4j", "Neo4j bolt port reachability.", "neo4j", 7687);
    http(e, "cstage.database.arangodb", "ArangoDB version endpoint.", "arangodb", 8529, "/_api/version", BodyParser::JsonHealth);
    http(e, "cstage.database.cockroachdb", "CockroachDB node readiness.", "cockroachdb", 8080, "/health?ready=1", BodyParser::JsonHealth);
    tcp(e, "cstage.database.tidb", "TiDB server reachability.", "tidb", 4000);
    tcp(e, "cstage.database.vitess", "Vitess vtgate reachability.", "vitess", 15000);
    http(e, "cstage.database.presto", "Presto/Trino coordinator info.", "presto", 8080, "/v1/info", BodyParser::JsonHealth);
}

fn web(e: &mut Vec<CatalogEntry>) {
    http(e, "cstage.web.nginx", "Nginx stub_status metrics.", "nginx", 80, "/nginx_status", BodyParser::NginxStub);
    http(e, "cstage.web.apache", "Apache mod_status metrics.", "apache", 80, "/server-status?auto", BodyParser::ApacheStatus);
    http(e, "cstage.web.haproxy", "HAProxy stats endpoint.", "haproxy", 8404, "/stats;csv", BodyParser::None);
    tcp(e, "cstage.web.varnish", "Varnish cache reachability.", "varnish", 6081);
    http(e, "cstage.web.traefik", "Traefik ping endpoint.", "traefik", 8080, "/ping", BodyParser::None);
    http(e, "cstage.web.caddy", "Caddy admin endpoint.", "caddy", 2019, "/config/", BodyParser::None);
    http(e, "cstage.web.envoy", "Envoy readiness endpoint.", "envoy", 9901, "/ready", BodyParser::None);
    tcp(e, "cstage.web.litespeed", "LiteSpeed admin port reachability.", "litespeed", 7080);
    tcp(e, "cstage.web.squid", "Squid proxy reachability.", "squid", 3128);
    http(e, "cstage.web.kong", "Kong gateway status.", "kong", 8001, "/status", BodyParser::JsonHealth);
    http(e, "cstage.web.tyk", "Tyk gateway liveness.", "tyk", 8080, "/hello", BodyParser::JsonHealth);
    http(e, "cstage.web.istio", "Istio ingress readiness.", "istio", 15021, "/healthz/ready", BodyParser::None);
    http(e, "cstage.web.ats", "Apache Traffic Server stats.", "trafficserver", 8083, "/_stats", BodyParser::JsonHealth);
}

fn middleware(e: &mut Vec<CatalogEntry>) {
    tcp(e, "cstage.middleware.tomcat", "Apache Tomcat reachability.", "tomcat", 8080);
    tcp(e, "cstage.middleware.jboss", "JBoss/WildFly management port reachability.", "jboss", 9990);
    tcp(e, "cstage.middleware.weblogic", "Oracle WebLogic reachability.", "weblogic", 7001);
    tcp(e, "cstage.middleware.websphere", "IBM WebSphere admin console reachability.", "websphere", 9060);
    tcp(e, "cstage.middleware.glassfish", "GlassFish admin port reachability.", "glassfish", 4848);
    tcp(e, "cstage.middleware.jetty", "Jetty server reachability.", "jetty", 8080);
    tcp(e, "cstage.middleware.rabbitmq", "RabbitMQ AMQP port reachability.", "rabbitmq", 5672);
    tcp(e, "cstage.middleware.kafka", "Kafka broker reachability.", "kafka", 9092);
    tcp(e, "cstage.middleware.activemq", "ActiveMQ broker reachability.", "activemq", 61616);
    http(e, "cstage.middleware.nats", "NATS server variables.", "nats", 8222, "/varz", BodyParser::JsonHealth);
    http(e, "cstage.middleware.pulsar", "Pulsar broker health.", "pulsar", 8080, "/admin/v2/brokers/health", BodyParser::None);
    tcp(e, "cstage.middleware.mqtt", "Mosquitto/MQTT broker reachability.", "mqtt", 1883);
    tcp_any_port(e, "cstage.middleware.zeromq", "ZeroMQ endpoint reachability.", "zeromq");
    http(e, "cstage.middleware.emqx", "EMQX node status.", "emqx", 18083, "/status", BodyParser::None);
}

fn storage(e: &mut Vec<CatalogEntry>) {
    tcp(e, "cstage.storage.ceph", "Ceph monitor reachability.", "ceph", 6789);
    http(e, "cstage.storage.minio", "MinIO liveness endpoint.", "minio", 9000, "/minio/health/live", BodyParser::None);
    tcp(e, "cstage.storage.glusterfs", "GlusterFS daemon reachability.", "glusterfs", 24007);
    tcp(e, "cstage.storage.openebs", "OpenEBS API reachability.", "openebs", 5656);
    tcp(e, "cstage.storage.longhorn", "Longhorn manager reachability.", "longhorn", 9500);
    http(e, "cstage.storage.portworx", "Portworx node status.", "portworx", 9001, "/status", BodyParser::JsonHealth);
    daemon(e, "cstage.storage.rook", "Rook operator presence.", "rook", &["rook"]);
    tcp(e, "cstage.storage.moosefs", "MooseFS master reachability.", "moosefs", 9421);
    marker(e, "cstage.storage.lustre", "Lustre client modules presence.", "lustre", &["/sys/fs/lustre", "/proc/fs/lustre"]);
    tcp(e, "cstage.storage.beegfs", "BeeGFS management daemon reachability.", "beegfs", 8008);
    http(e, "cstage.storage.swift", "OpenStack Swift proxy healthcheck.", "swift", 8080, "/healthcheck", BodyParser::None);
    command(e, "cstage.storage.zfs", "OpenZFS pool health.", "zfs", "zpool", &["status", "-x"], OutputParser::ZpoolStatus);
    marker(e, "cstage.storage.drbd", "DRBD kernel module presence.", "drbd", &["/proc/drbd"]);
    http(e, "cstage.storage.hdfs", "HDFS NameNode status.", "hdfs", 9870, "/jmx?qry=Hadoop:service=NameNode,name=NameNodeStatus", BodyParser::JsonHealth);
    http(e, "cstage.storage.seaweedfs", "SeaweedFS master cluster status.", "seaweedfs", 9333, "/cluster/status", BodyParser::JsonHealth);
    http(e, "cstage.storage.juicefs", "JuiceFS client metrics endpoint.", "juicefs", 9567, "/metrics", BodyParser::None);
}

fn infra(e: &mut Vec<CatalogEntry>) {
    command(e, "cstage.infra.docker", "Docker engine version.", "docker", "docker", &["version", "--format", "{{.Server.Version}}"], OutputParser::Summary);
    command(e, "cstage.infra.podman", "Podman version.", "podman", "podman", &["version", "--format", "{{.Version}}"], OutputParser::Summary);
    marker(e, "cstage.infra.containerd", "Containerd control socket presence.", "containerd", &["/run/containerd/containerd.sock", "/var/run/containerd/containerd.sock"]);
    http(e, "cstage.infra.kubernetes", "Kubelet health endpoint.", "kubelet", 10248, "/healthz", BodyParser::None);
    tcp(e, "cstage.infra.k3s", "K3s API server reachability.", "k3s", 6443);
    tcp(e, "cstage.infra.openshift", "OpenShift API server reachability.", "openshift", 6443);
    http(e, "cstage.infra.nomad", "Nomad agent health.", "nomad", 4646, "/v1/agent/health", BodyParser::JsonHealth);
    tcp(e, "cstage.infra.proxmox", "Proxmox VE web API reachability.", "proxmox", 8006);
    tcp(e, "cstage.infra.xcpng", "XCP-ng XAPI reachability.", "xcpng", 443);
    tcp(e, "cstage.infra.vmware", "VMware host API reachability.", "vmware", 443);
    tcp(e, "cstage.infra.nutanix", "Nutanix Prism reachability.", "nutanix", 9440);
    http(e, "cstage.infra.openstack", "OpenStack Keystone identity endpoint.", "keystone", 5000, "/v3", BodyParser::JsonHealth);
    command(e, "cstage.infra.lxc", "LXC container inventory.", "lxc", "lxc-ls", &[], OutputParser::Summary);
    marker(e, "cstage.infra.kvm", "KVM device presence.", "kvm", &["/dev/kvm"]);
    marker(e, "cstage.infra.xen", "Xen hypervisor presence.", "xen", &["/proc/xen", "/sys/hypervisor/type"]);
    marker(e, "cstage.infra.kata", "Kata Containers runtime presence.", "kata", &["/usr/bin/kata-runtime", "/opt/kata/bin/kata-runtime"]);
    daemon(e, "cstage.infra.firecracker", "Firecracker microVM presence.", "firecracker", &["firecracker"]);
}

fn network_services(e: &mut Vec<CatalogEntry>) {
    daemon(e, "cstage.service.ntp", "Time synchronization daemon presence.", "ntp", &["chronyd", "ntpd", "systemd-timesyncd"]);
    tcp(e, "cstage.service.dns", "DNS server reachability (Bind/Unbound).", "dns", 53);
    daemon(e, "cstage.service.dhcp", "DHCP server presence.", "dhcp", &["dhcpd", "dnsmasq", "kea-dhcp4"]);
    tcp(e, "cstage.service.mail", "Mail server reachability (Postfix/Exim).", "mail", 25);
    tcp(e, "cstage.service.ldap", "LDAP/FreeIPA server reachability.", "ldap", 389);
    tcp(e, "cstage.service.samba", "Samba/AD server reachability.", "samba", 445);
    tcp(e, "cstage.service.nfs", "NFS server reachability.", "nfs", 2049);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_covers_every_family_once() {
        let entries = all();
        // 105 cstage.* families plus demo.echo.
        assert_eq!(entries.len(), 106);

        let mut seen = HashSet::new();
        for entry in &entries {
            assert!(
                seen.insert(entry.descriptor.key.clone()),
                "duplicate catalog key {}",
                entry.descriptor.key
            );
            assert!(
                !entry.descriptor.description.is_empty(),
                "{} has no description",
                entry.descriptor.key
            );
        }
    }

    #[test]
    fn group_counts_match_the_original_plugin() {
        let entries = all();
        let count = |prefix: &str| {
            entries
                .iter()
                .filter(|e| e.descriptor.key.as_str().starts_with(prefix))
                .count()
        };
        assert_eq!(count("cstage.linux."), 18);
        assert_eq!(count("cstage.database."), 20);
        assert_eq!(count("cstage.web."), 13);
        assert_eq!(count("cstage.middleware."), 14);
        assert_eq!(count("cstage.storage."), 16);
        assert_eq!(count("cstage.infra."), 17);
        assert_eq!(count("cstage.service."), 7);
        assert_eq!(count("demo."), 1);
    }

    #[test]
    fn service_families_accept_host_and_port_overrides() {
        let entries = all();
        let postgres = entries
            .iter()
            .find(|e| e.descriptor.key.as_str() == "cstage.database.postgres")
            .unwrap();
        let params = postgres
            .descriptor
            .validate(&["db-01".to_string(), "5433".to_string()])
            .unwrap();
        assert_eq!(params.text("host"), Some("db-01"));
        assert_eq!(params.port("port"), Some(5433));

        // Defaults apply when the host sends nothing.
        let params = postgres.descriptor.validate(&[]).unwrap();
        assert_eq!(params.port("port"), Some(5432));
    }

    #[test]
    fn zeromq_requires_an_explicit_port() {
        let entries = all();
        let zeromq = entries
            .iter()
            .find(|e| e.descriptor.key.as_str() == "cstage.middleware.zeromq")
            .unwrap();
        assert!(zeromq.descriptor.validate(&[]).is_err());
        assert!(zeromq
            .descriptor
            .validate(&["".to_string(), "5555".to_string()])
            .is_ok());
    }
}
