//! Probes for the `cstage.linux.security.*` families.
//!
//! Each probe distinguishes absent (not installed), unreachable/denied
//! and healthy, since monitoring consumers alert differently on each.

use async_trait::async_trait;
use cstage_common::params::ProbeParams;
use cstage_common::types::{MetricValue, ProbeError, ProbeResult};
use serde_json::json;
use std::path::PathBuf;

use crate::system::procfs;
use crate::Probe;

/// SSH daemon hardening summary for `cstage.linux.security.ssh`,
/// read from `sshd_config`.
pub struct SshProbe {
    config_path: PathBuf,
}

impl SshProbe {
    pub fn new() -> Self {
        SshProbe {
            config_path: PathBuf::from("/etc/ssh/sshd_config"),
        }
    }
}

impl Default for SshProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// First effective value of a directive; sshd uses the first occurrence.
pub(crate) fn sshd_directive<'a>(config: &'a str, name: &str) -> Option<&'a str> {
    config
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .find_map(|l| {
            let (key, value) = l.split_once(char::is_whitespace)?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
}

#[async_trait]
impl Probe for SshProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let config = std::fs::read_to_string(&self.config_path).map_err(|e| {
            ProbeError::from_read("sshd", &self.config_path.to_string_lossy(), &e)
        })?;
        Ok(MetricValue::object([
            ("port", json!(sshd_directive(&config, "Port").unwrap_or("22"))),
            (
                "permit_root_login",
                json!(sshd_directive(&config, "PermitRootLogin").unwrap_or("prohibit-password")),
            ),
            (
                "password_authentication",
                json!(sshd_directive(&config, "PasswordAuthentication").unwrap_or("yes")),
            ),
            (
                "pubkey_authentication",
                json!(sshd_directive(&config, "PubkeyAuthentication").unwrap_or("yes")),
            ),
        ]))
    }
}

/// SELinux enforcement state for `cstage.linux.security.selinux`.
pub struct SelinuxProbe {
    enforce_path: PathBuf,
}

impl SelinuxProbe {
    pub fn new() -> Self {
        SelinuxProbe {
            enforce_path: PathBuf::from("/sys/fs/selinux/enforce"),
        }
    }
}

impl Default for SelinuxProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for SelinuxProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let raw = procfs::read_trimmed("selinux", &self.enforce_path)?;
        let mode = match raw.as_str() {
            "1" => "enforcing",
            "0" => "permissive",
            _ => "unknown",
        };
        Ok(MetricValue::object([
            ("mode", json!(mode)),
            ("enforcing", json!(raw == "1")),
        ]))
    }
}

/// AppArmor state for `cstage.linux.security.apparmor`.
pub struct ApparmorProbe {
    enabled_path: PathBuf,
    profiles_path: PathBuf,
}

impl ApparmorProbe {
    pub fn new() -> Self {
        ApparmorProbe {
            enabled_path: PathBuf::from("/sys/module/apparmor/parameters/enabled"),
            profiles_path: PathBuf::from("/sys/kernel/security/apparmor/profiles"),
        }
    }
}

impl Default for ApparmorProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for ApparmorProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let enabled = procfs::read_trimmed("apparmor", &self.enabled_path)?;
        // Profile list needs CAP_MAC_ADMIN on some kernels; a denied read
        // surfaces as permission_denied instead of being hidden.
        let profiles = procfs::read("apparmor", &self.profiles_path).map(|s| s.lines().count())?;
        Ok(MetricValue::object([
            ("enabled", json!(enabled == "Y")),
            ("profiles_loaded", json!(profiles)),
        ]))
    }
}

/// Packet-filter backend summary for `cstage.linux.security.firewall`.
///
/// Reports which of the legacy iptables tables and the nf_tables module
/// are active; frontend daemons (ufw, firewalld) sit on top of these.
pub struct FirewallProbe {
    ip_tables_names: PathBuf,
    modules_path: PathBuf,
}

impl FirewallProbe {
    pub fn new() -> Self {
        FirewallProbe {
            ip_tables_names: PathBuf::from("/proc/net/ip_tables_names"),
            modules_path: PathBuf::from("/proc/modules"),
        }
    }
}

impl Default for FirewallProbe {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn module_loaded(modules: &str, name: &str) -> bool {
    modules
        .lines()
        .any(|l| l.split_whitespace().next() == Some(name))
}

#[async_trait]
impl Probe for FirewallProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let iptables_tables: Vec<String> = match std::fs::read_to_string(&self.ip_tables_names) {
            Ok(s) => s.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(ProbeError::from_read(
                    "firewall",
                    &self.ip_tables_names.to_string_lossy(),
                    &e,
                ))
            }
        };
        let modules = procfs::read("firewall", &self.modules_path)?;
        let nf_tables = module_loaded(&modules, "nf_tables");

        if iptables_tables.is_empty() && !nf_tables {
            return Err(ProbeError::SubsystemAbsent {
                subsystem: "firewall".to_string(),
            });
        }
        let backend = if nf_tables { "nftables" } else { "iptables" };
        Ok(MetricValue::object([
            ("backend", json!(backend)),
            ("nf_tables_loaded", json!(nf_tables)),
            ("iptables_tables", json!(iptables_tables)),
        ]))
    }
}

/// Audit daemon liveness for `cstage.linux.security.audit`.
pub struct AuditProbe {
    pid_path: PathBuf,
}

impl AuditProbe {
    pub fn new() -> Self {
        AuditProbe {
            pid_path: PathBuf::from("/var/run/auditd.pid"),
        }
    }
}

impl Default for AuditProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for AuditProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        let pid = procfs::read_trimmed("auditd", &self.pid_path)?;
        let pid: u32 = pid
            .parse()
            .map_err(|_| ProbeError::internal(format!("bad pid in auditd pidfile: '{pid}'")))?;
        let running = std::path::Path::new(&format!("/proc/{pid}")).exists();
        if !running {
            return Err(ProbeError::SubsystemUnreachable {
                subsystem: "auditd".to_string(),
                reason: format!("stale pidfile, process {pid} is gone"),
            });
        }
        Ok(MetricValue::object([
            ("running", json!(true)),
            ("pid", json!(pid)),
        ]))
    }
}

/// Fail2ban server liveness for `cstage.linux.security.fail2ban`,
/// detected through its control socket.
pub struct Fail2banProbe {
    socket_paths: Vec<PathBuf>,
}

impl Fail2banProbe {
    pub fn new() -> Self {
        Fail2banProbe {
            socket_paths: vec![
                PathBuf::from("/var/run/fail2ban/fail2ban.sock"),
                PathBuf::from("/run/fail2ban/fail2ban.sock"),
            ],
        }
    }
}

impl Default for Fail2banProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for Fail2banProbe {
    async fn execute(&self, _params: &ProbeParams) -> ProbeResult {
        for path in &self.socket_paths {
            match std::fs::metadata(path) {
                Ok(_) => {
                    return Ok(MetricValue::object([
                        ("running", json!(true)),
                        ("socket", json!(path.to_string_lossy())),
                    ]));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(ProbeError::from_read(
                        "fail2ban",
                        &path.to_string_lossy(),
                        &e,
                    ))
                }
            }
        }
        Err(ProbeError::SubsystemAbsent {
            subsystem: "fail2ban".to_string(),
        })
    }
}
