use std::collections::HashMap;
use std::sync::Arc;

use cstage_common::descriptor::ProbeDescriptor;
use cstage_common::key::MetricKey;
use cstage_probe::Probe;

/// Errors raised while assembling the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A metric key was registered twice.
    #[error("metric key '{key}' is already registered")]
    DuplicateKey { key: MetricKey },
}

/// A registered probe with its registration-time metadata.
pub struct RegistryEntry {
    descriptor: ProbeDescriptor,
    probe: Arc<dyn Probe>,
}

impl RegistryEntry {
    pub fn descriptor(&self) -> &ProbeDescriptor {
        &self.descriptor
    }

    pub fn probe(&self) -> Arc<dyn Probe> {
        Arc::clone(&self.probe)
    }
}

/// Accumulates registrations before the engine starts serving.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cstage_common::descriptor::ProbeDescriptor;
/// use cstage_engine::registry::RegistryBuilder;
/// use cstage_probe::echo::EchoProbe;
///
/// let mut builder = RegistryBuilder::new();
/// let descriptor = ProbeDescriptor::new("demo.echo".parse().unwrap(), "Echo.");
/// builder.register(descriptor.clone(), Arc::new(EchoProbe)).unwrap();
/// assert!(builder.register(descriptor, Arc::new(EchoProbe)).is_err());
///
/// let registry = builder.build();
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<MetricKey, RegistryEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `probe` under `descriptor.key`.
    pub fn register(
        &mut self,
        descriptor: ProbeDescriptor,
        probe: Arc<dyn Probe>,
    ) -> Result<(), RegistryError> {
        let key = descriptor.key.clone();
        if self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey { key });
        }
        self.entries.insert(key, RegistryEntry { descriptor, probe });
        Ok(())
    }

    /// Freezes the accumulated registrations into an immutable registry.
    pub fn build(self) -> ProbeRegistry {
        ProbeRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable MetricKey → probe mapping.
///
/// Built once at startup and never mutated afterward, so concurrent
/// lookups need no locking. A lookup miss is classified by the dispatcher
/// as `Unsupported`, never as an internal error.
pub struct ProbeRegistry {
    entries: HashMap<MetricKey, RegistryEntry>,
}

impl ProbeRegistry {
    pub fn resolve(&self, key: &MetricKey) -> Option<&RegistryEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All descriptors in key order, for the one-time host advertisement.
    pub fn descriptors(&self) -> Vec<&ProbeDescriptor> {
        let mut descriptors: Vec<&ProbeDescriptor> =
            self.entries.values().map(RegistryEntry::descriptor).collect();
        descriptors.sort_by(|a, b| a.key.cmp(&b.key));
        descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cstage_probe::echo::EchoProbe;

    fn descriptor(key: &str) -> ProbeDescriptor {
        ProbeDescriptor::new(key.parse().unwrap(), "test probe")
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(descriptor("demo.echo"), Arc::new(EchoProbe))
            .unwrap();
        let err = builder
            .register(descriptor("demo.echo"), Arc::new(EchoProbe))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKey { .. }));
    }

    #[test]
    fn resolve_returns_the_same_probe_every_call() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(descriptor("demo.echo"), Arc::new(EchoProbe))
            .unwrap();
        let registry = builder.build();

        let key: MetricKey = "demo.echo".parse().unwrap();
        let first = registry.resolve(&key).unwrap().probe();
        let second = registry.resolve(&key).unwrap().probe();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn descriptors_are_sorted_by_key() {
        let mut builder = RegistryBuilder::new();
        for key in ["cstage.linux.memory", "cstage.database.redis", "demo.echo"] {
            builder.register(descriptor(key), Arc::new(EchoProbe)).unwrap();
        }
        let registry = builder.build();
        let keys: Vec<&str> = registry
            .descriptors()
            .iter()
            .map(|d| d.key.as_str())
            .collect();
        assert_eq!(
            keys,
            vec!["cstage.database.redis", "cstage.linux.memory", "demo.echo"]
        );
    }
}
