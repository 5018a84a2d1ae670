//! World configuration
//!
//! Table sizes are starting capacities only. Every table grows by doubling
//! when it fills up, so these values never limit how many entities or
//! storages a world can hold.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Default initial size of the entity slot table.
pub const DEFAULT_ENTITY_CAPACITY: usize = 512;
/// Default initial size of the storage table.
pub const DEFAULT_STORAGE_CAPACITY: usize = 512;
/// Default number of ticks an event survives after being sent.
pub const DEFAULT_EVENT_RETENTION: u32 = 1;

/// Construction parameters for a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Initial number of entity slots (bitsets and generations) to allocate.
    pub entity_capacity: usize,
    /// Initial number of storage slots to allocate.
    pub storage_capacity: usize,
    /// An event is expired by the first tick after which its age exceeds this.
    pub event_retention: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: DEFAULT_ENTITY_CAPACITY,
            storage_capacity: DEFAULT_STORAGE_CAPACITY,
            event_retention: DEFAULT_EVENT_RETENTION,
        }
    }
}

impl WorldConfig {
    /// Parse a configuration from TOML. Missing keys fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded world config from {:?}", path);
        Ok(config)
    }

    /// Builder-style override of the entity capacity.
    pub fn with_entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Builder-style override of the storage capacity.
    pub fn with_storage_capacity(mut self, capacity: usize) -> Self {
        self.storage_capacity = capacity;
        self
    }

    /// Builder-style override of the event retention window.
    pub fn with_event_retention(mut self, ticks: u32) -> Self {
        self.event_retention = ticks;
        self
    }
}
