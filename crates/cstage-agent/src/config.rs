use cstage_engine::config::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,
    /// Print the supported-metric advertisement once at startup.
    #[serde(default = "default_advertise")]
    pub advertise_on_start: bool,
    /// Metric keys collected each interval. Empty means the standard
    /// local set.
    #[serde(default)]
    pub collect: Vec<CollectTarget>,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectTarget {
    pub key: String,
    #[serde(default)]
    pub params: Vec<String>,
}

fn default_collection_interval() -> u64 {
    10
}

fn default_advertise() -> bool {
    true
}

const DEFAULT_TARGETS: [&str; 6] = [
    "cstage.linux.kernel",
    "cstage.linux.cpu",
    "cstage.linux.memory",
    "cstage.linux.disk.usage",
    "cstage.linux.network.traffic",
    "cstage.linux.network.sockets",
];

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Configured targets, or the standard local set when none are given.
    pub fn collection_targets(&self) -> Vec<CollectTarget> {
        if !self.collect.is_empty() {
            return self.collect.clone();
        }
        DEFAULT_TARGETS
            .iter()
            .map(|key| CollectTarget {
                key: key.to_string(),
                params: Vec::new(),
            })
            .collect()
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.engine.clone()
    }
}
