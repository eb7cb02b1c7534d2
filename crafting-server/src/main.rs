mod config;
mod console;
mod net;
mod server;
mod worker_conn;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fabric_protocol::{BusSocket, Message};
use fabric_utils::locks::AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::CraftingServerConfig;
use server::Server;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let debug_log = fabric_utils::logger::init_debug_log();

    let config = CraftingServerConfig::load_or_create(Path::new("config/crafting_config.json5"));

    let recipes_text =
        std::fs::read_to_string(&config.recipes_path).unwrap_or_else(|e| panic!("failed to read {}: {e}", config.recipes_path));
    let catalog = fabric_recipes::RecipeCatalog::load(&config.recipes_path, &recipes_text)
        .unwrap_or_else(|e| panic!("recipe catalog fatal: {e}"));

    let worker_conn_text =
        std::fs::read_to_string(&config.worker_conn_path).unwrap_or_else(|e| panic!("failed to read {}: {e}", config.worker_conn_path));
    let conn = worker_conn::load(&config.worker_conn_path, &worker_conn_text).unwrap_or_else(|e| panic!("worker connectivity fatal: {e}"));

    let server = Arc::new(AsyncMutex::new(Server::new(catalog, conn.pool, conn.drones, config.storage_peer)));

    let socket = BusSocket::bind(config.bus_bind, Some(config.storage_peer))
        .await
        .unwrap_or_else(|e| panic!("failed to bind bus socket {}: {e}", config.bus_bind));
    let cancel = CancellationToken::new();
    let socket = Arc::new(AsyncMutex::new(socket));

    tracing::info!(bind = %config.bus_bind, storage_peer = %config.storage_peer, "crafting server started");

    {
        let socket = socket.lock().await;
        if let Err(err) = socket.send(&Message::StorDiscover).await {
            tracing::warn!(%err, "failed to send initial stor_discover");
        }
    }

    let recv_task = tokio::spawn(net::run_recv_loop(socket.clone(), server.clone(), cancel.clone()));
    let tick_task = tokio::spawn(net::run_tick_loop(
        socket.clone(),
        server.clone(),
        Duration::from_millis(config.tick_interval_ms),
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

    let _ = tokio::join!(recv_task, tick_task, purge_task, console_task);
}
