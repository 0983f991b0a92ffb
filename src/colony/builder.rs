//! Builder wiring a [`Colony`] from configuration, key, sinks, and paths.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::colony::{Colony, HeartbeatTracker};
use crate::config::ColonyConfig;
use crate::error::RuntimeError;
use crate::events::{EventSink, SinkSet};
use crate::integrity::HmacKey;
use crate::registry::RegistryStore;
use crate::signals::Bus;

/// Builder for constructing a [`Colony`].
pub struct ColonyBuilder {
    cfg: ColonyConfig,
    key: Option<HmacKey>,
    sinks: Vec<Arc<dyn EventSink>>,
    registry_path: Option<PathBuf>,
}

impl ColonyBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ColonyConfig) -> Self {
        Self {
            cfg,
            key: None,
            sinks: Vec::new(),
            registry_path: None,
        }
    }

    /// Sets the externally supplied HMAC key. Required.
    pub fn with_key(mut self, key: HmacKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Sets governance-event sinks.
    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Sets the registry snapshot path. Required.
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    /// Builds the colony.
    ///
    /// Fatal when the key is missing or the registry snapshot is corrupt:
    /// the colony refuses to operate on unverifiable or inconsistent state.
    pub fn build(self) -> Result<Colony, RuntimeError> {
        let key = self.key.ok_or(RuntimeError::MissingHmacKey)?;
        let registry_path = self.registry_path.ok_or_else(|| {
            RuntimeError::SnapshotIo(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "registry path not configured",
            ))
        })?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let sinks = Arc::new(SinkSet::new(self.sinks));
        let store = Arc::new(RegistryStore::open(registry_path)?);
        let runtime_token = CancellationToken::new();

        let tracker = HeartbeatTracker::new(bus.clone());
        tracker.spawn_listener(runtime_token.clone());

        Ok(Colony {
            cfg: self.cfg,
            bus,
            key,
            sinks,
            store,
            tracker,
            runtime_token,
            zooids: tokio::sync::Mutex::new(tokio::task::JoinSet::new()),
        })
    }
}
