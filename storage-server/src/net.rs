//! Bus wiring: receives frames, dispatches them against the shared
//! [`Server`], and runs the Diff Broadcast on its own interval. Mirrors
//! the teacher's `SteelServer::start` select-loop shape
//! (`steel::lib::SteelServer`), minus per-connection state since the
//! bus is one socket shared by every peer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fabric_protocol::{BusSocket, Message};
use fabric_utils::locks::AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::server::Server;

pub async fn run_recv_loop(socket: Arc<AsyncMutex<BusSocket>>, server: Arc<AsyncMutex<Server>>, cancel: CancellationToken) {
    loop {
        let recv_result = {
            let mut socket = socket.lock().await;
            tokio::select! {
                () = cancel.cancelled() => return,
                result = socket.recv() => result,
            }
        };
        let (msg, from) = match recv_result {
            Ok((Some(msg), from)) => (msg, from),
            Ok((None, _)) => continue,
            Err(err) => {
                tracing::warn!(%err, "dropping malformed bus frame");
                continue;
            }
        };

        fabric_utils::dlog!("net", "recv {msg:?} from {from}");
        let replies = server.lock().await.handle(msg);
        send_all(&socket, &replies, from).await;
    }
}

/// Runs the Diff Broadcast (spec §4.6) on a fixed interval rather than
/// synchronously after each handler — the Item Index's and
/// Reservation Overlay's changes maps already accumulate across
/// handlers, so polling them periodically produces the same content,
/// just with the latency of one tick instead of none.
pub async fn run_diff_loop(socket: Arc<AsyncMutex<BusSocket>>, server: Arc<AsyncMutex<Server>>, interval: Duration, peer: Option<SocketAddr>, cancel: CancellationToken) {
    let Some(peer) = peer else {
        tracing::info!("no peer_addr configured; diff broadcast disabled");
        return;
    };
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let replies = server.lock().await.diff_now();
        if replies.is_empty() {
            continue;
        }
        let socket = socket.lock().await;
        for msg in &replies {
            if let Err(err) = socket.send_to(msg, peer).await {
                tracing::warn!(%err, "failed to broadcast diff");
            }
        }
    }
}

async fn send_all(socket: &Arc<AsyncMutex<BusSocket>>, messages: &[Message], to: SocketAddr) {
    let socket = socket.lock().await;
    for msg in messages {
        if let Err(err) = socket.send_to(msg, to).await {
            tracing::warn!(%err, "failed to send reply");
        }
    }
}
