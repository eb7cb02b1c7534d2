//! Bus wiring: receives frames and dispatches them against the shared
//! [`Server`], and separately drives the dispatcher tick on its own
//! interval. Mirrors `storage-server::net`'s recv-loop/tick-loop split.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

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
        let replies = server.lock().await.handle(msg, from);
        send_all(&socket, replies).await;
    }
}

/// Drives `Server::tick_all` (the Dispatcher, spec §4.8) on a fixed
/// interval rather than event-by-event — tasks complete, extracts
/// resolve, and pending tickets expire purely as a function of time
/// and accumulated bus traffic, so one periodic pass over every
/// active ticket is sufficient and far simpler than re-deriving a
/// per-ticket wakeup schedule.
pub async fn run_tick_loop(socket: Arc<AsyncMutex<BusSocket>>, server: Arc<AsyncMutex<Server>>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let replies = server.lock().await.tick_all(Instant::now());
        if replies.is_empty() {
            continue;
        }
        send_all(&socket, replies).await;
    }
}

async fn send_all(socket: &Arc<AsyncMutex<BusSocket>>, messages: Vec<(SocketAddr, Message)>) {
    let socket = socket.lock().await;
    for (addr, msg) in messages {
        if let Err(err) = socket.send_to(&msg, addr).await {
            tracing::warn!(%err, %addr, "failed to send reply");
        }
    }
}
