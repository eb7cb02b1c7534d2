//! Binary configuration, loaded the same way as `storage-server`'s:
//! read `config/*.json5` or write a bundled default and read that
//! back. The recipe file and worker connectivity file keep their own
//! bespoke grammars (spec §6) and are not part of this struct.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config/crafting_config.json5");
const DEFAULT_RECIPES: &str = include_str!("../config/recipes.cfg");
const DEFAULT_WORKER_CONN: &str = include_str!("../config/worker_conn.cfg");

#[derive(Debug, Clone, Deserialize)]
pub struct CraftingServerConfig {
    pub bus_bind: SocketAddr,
    pub storage_peer: SocketAddr,
    pub recipes_path: String,
    pub worker_conn_path: String,
    pub tick_interval_ms: u64,
    pub console_history_path: String,
}

impl CraftingServerConfig {
    /// # Panics
    /// Panics if the config directory cannot be created, the config
    /// file cannot be read/written, or its contents fail to parse.
    #[must_use]
    pub fn load_or_create(path: &Path) -> Self {
        let config: Self = if path.exists() {
            let text = fs::read_to_string(path).expect("failed to read crafting server config");
            serde_json5::from_str(&text).expect("failed to parse crafting server config")
        } else {
            fs::create_dir_all(path.parent().expect("config path has a parent"))
                .expect("failed to create config directory");
            fs::write(path, DEFAULT_CONFIG).expect("failed to write default config");
            serde_json5::from_str(DEFAULT_CONFIG).expect("bundled default config is well-formed")
        };

        write_default_if_missing(&config.recipes_path, DEFAULT_RECIPES);
        write_default_if_missing(&config.worker_conn_path, DEFAULT_WORKER_CONN);

        config
    }
}

fn write_default_if_missing(path: &str, default: &str) {
    let path = Path::new(path);
    if path.exists() {
        return;
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directory");
    }
    fs::write(path, default).expect("failed to write default config file");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_default_config_parses() {
        let config: CraftingServerConfig = serde_json5::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.tick_interval_ms, 250);
        assert_eq!(config.recipes_path, "config/recipes.cfg");
    }
}
