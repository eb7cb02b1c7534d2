mod config;
mod console;
mod net;
mod server;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fabric_protocol::BusSocket;
use fabric_storage::{ItemAttributes, ItemKind};
use fabric_utils::locks::AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::StorageServerConfig;
use server::Server;

/// Flat `kind;max_stack;label` lines, one per item worth pre-seeding
/// attributes for; anything not listed falls back to a max-stack-64
/// default the first time it's seen in storage.
fn load_item_attributes(path: &str) -> HashMap<ItemKind, ItemAttributes> {
    let Ok(text) = std::fs::read_to_string(path) else {
        tracing::warn!(path, "item attributes file not found, using defaults only");
        return HashMap::new();
    };
    let mut attrs = HashMap::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').collect();
        let (Some(kind_str), Some(max_stack_str), Some(label)) = (fields.first(), fields.get(1), fields.get(2)) else {
            tracing::warn!(line, "malformed item attributes line, skipping");
            continue;
        };
        let (Some(kind), Ok(max_stack_size)) = (ItemKind::parse(kind_str), max_stack_str.parse()) else {
            tracing::warn!(line, "malformed item attributes line, skipping");
            continue;
        };
        attrs.insert(kind, ItemAttributes { max_stack_size, label: (*label).to_string(), max_damage: None });
    }
    attrs
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let debug_log = fabric_utils::logger::init_debug_log();

    let config = StorageServerConfig::load_or_create(Path::new("config/storage_config.json5"));

    let routing_text = std::fs::read_to_string(&config.routing_config_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", config.routing_config_path));
    let graph = fabric_storage::config::load(&config.routing_config_path, &routing_text)
        .unwrap_or_else(|e| panic!("routing config fatal: {e}"));

    let attributes = config.item_attributes_path.as_deref().map(load_item_attributes).unwrap_or_default();

    let engine = fabric_storage::StorageEngine::new(graph);
    let server = Arc::new(AsyncMutex::new(Server::new(engine, attributes)));

    let socket = BusSocket::bind(config.bus_bind, config.peer_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind bus socket {}: {e}", config.bus_bind));
    let cancel = CancellationToken::new();
    let socket = Arc::new(AsyncMutex::new(socket));

    tracing::info!(bind = %config.bus_bind, "storage server started");

    let recv_task = tokio::spawn(net::run_recv_loop(socket.clone(), server.clone(), cancel.clone()));
    let diff_task = tokio::spawn(net::run_diff_loop(
        socket.clone(),
        server.clone(),
        Duration::from_millis(config.diff_interval_ms),
        config.peer_addr,
        cancel.clone(),
    ));
    let purge_task = tokio::spawn({
        let socket = socket.clone();
        let cancel = cancel.clone();
        async move { BusSocket::run_purge_loop(socket, cancel).await }
    });
    let console_task = tokio::spawn(console::run(debug_log, config.console_history_path.clone(), cancel.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received interrupt, shutting down");
            cancel.cancel();
        }
        () = cancel.cancelled() => {}
    }

    let _ = tokio::join!(recv_task, diff_task, purge_task, console_task);
}
