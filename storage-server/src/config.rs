//! Binary configuration: bus address and the ambient knobs this
//! simulated fabric needs that the original hardware-driven system
//! gets for free (diff interval, console history). Loaded the way
//! `steel::config` loads `SteelConfig`: read `config/*.json5` or write
//! a bundled default and read that back.
//!
//! The domain files this config merely points at (routing config,
//! item attributes) keep their own bespoke line-oriented grammars
//! (spec §6) and are not part of this struct.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config/storage_config.json5");
const DEFAULT_ROUTING_CONFIG: &str = include_str!("../config/routing.cfg");

#[derive(Debug, Clone, Deserialize)]
pub struct StorageServerConfig {
    pub bus_bind: SocketAddr,
    pub peer_addr: Option<SocketAddr>,
    pub routing_config_path: String,
    pub item_attributes_path: Option<String>,
    pub diff_interval_ms: u64,
    pub console_history_path: String,
}

impl StorageServerConfig {
    /// Loads `path`, creating it (and a default routing config
    /// alongside it, if also missing) from the bundled defaults.
    ///
    /// # Panics
    /// Panics if the config directory cannot be created, the config
    /// file cannot be read/written, or its contents fail to parse.
    #[must_use]
    pub fn load_or_create(path: &Path) -> Self {
        let config: Self = if path.exists() {
            let text = fs::read_to_string(path).expect("failed to read storage server config");
            serde_json5::from_str(&text).expect("failed to parse storage server config")
        } else {
            fs::create_dir_all(path.parent().expect("config path has a parent"))
                .expect("failed to create config directory");
            fs::write(path, DEFAULT_CONFIG).expect("failed to write default config");
            serde_json5::from_str(DEFAULT_CONFIG).expect("bundled default config is well-formed")
        };

        let routing_path = Path::new(&config.routing_config_path);
        if !routing_path.exists() {
            if let Some(parent) = routing_path.parent() {
                fs::create_dir_all(parent).expect("failed to create routing config directory");
            }
            fs::write(routing_path, DEFAULT_ROUTING_CONFIG).expect("failed to write default routing config");
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_default_config_parses() {
        let config: StorageServerConfig = serde_json5::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.diff_interval_ms, 250);
        assert_eq!(config.routing_config_path, "config/routing.cfg");
    }
}
