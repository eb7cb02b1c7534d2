//! The bus socket (SPEC_FULL §6 supplement): a concrete best-effort
//! point-to-point datagram transport standing in for the radio
//! hardware the spec places out of scope. One [`BusSocket`] wraps one
//! `UdpSocket`; chunking/reassembly is layered on top via
//! [`crate::codec`]/[`crate::reassembler`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::codec::{self, Chunk};
use crate::errors::{ReadingError, WritingError};
use crate::message::Message;
use crate::reassembler::Reassembler;

/// Wraps one bound `UdpSocket`, minting sequence tokens for outbound
/// messages and reassembling inbound ones.
pub struct BusSocket {
    socket: UdpSocket,
    next_sequence: AtomicU32,
    reassembler: Reassembler,
    /// Signalled to stop a [`Self::run_purge_loop`] background task.
    pub cancel: CancellationToken,
}

impl BusSocket {
    /// Binds a UDP socket for the bus; `peer` is the default send
    /// target (the other server's or a worker's known address).
    pub async fn bind(local: SocketAddr, peer: Option<SocketAddr>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        if let Some(peer) = peer {
            socket.connect(peer).await?;
        }
        Ok(Self {
            socket,
            next_sequence: AtomicU32::new(0),
            reassembler: Reassembler::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Encodes and sends `msg` to the connected peer, fragmenting if
    /// it doesn't fit in one datagram.
    #[tracing::instrument(level = "trace", skip(self, msg))]
    pub async fn send(&self, msg: &Message) -> Result<(), WritingError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let text = msg.encode();
        for datagram in codec::encode_datagrams(sequence, &text)? {
            self.socket.send(&datagram).await.map_err(|e| WritingError::Message(e.to_string()))?;
        }
        Ok(())
    }

    /// Sends `msg` to an explicit address rather than the connected
    /// peer (used by the Crafting Server, which talks to many workers
    /// off one socket).
    pub async fn send_to(&self, msg: &Message, addr: SocketAddr) -> Result<(), WritingError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let text = msg.encode();
        for datagram in codec::encode_datagrams(sequence, &text)? {
            self.socket.send_to(&datagram, addr).await.map_err(|e| WritingError::Message(e.to_string()))?;
        }
        Ok(())
    }

    /// Receives one datagram, feeds it to the reassembler, and
    /// decodes a [`Message`] once its sequence is complete. Returns
    /// `Ok(None)` for a datagram that is only part of a still-pending
    /// sequence.
    pub async fn recv(&mut self) -> Result<(Option<Message>, SocketAddr), ReadingError> {
        let mut buf = vec![0u8; codec::MAX_CHUNK_BYTES + 256];
        let (len, from) = self.socket.recv_from(&mut buf).await.map_err(|e| ReadingError::Message(e.to_string()))?;
        let chunk: Chunk = codec::decode_chunk(&buf[..len])?;
        let text = self.reassembler.accept(chunk, Instant::now());
        match text {
            Some(text) => Ok((Some(Message::decode(&text)?), from)),
            None => Ok((None, from)),
        }
    }

    /// Periodically drops expired partial sequences (spec §6 bounded
    /// reassembly lifetime) until `cancel` fires.
    pub async fn run_purge_loop(socket: Arc<tokio::sync::Mutex<Self>>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(crate::reassembler::BUFFER_LIFETIME);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    socket.lock().await.reassembler.purge_expired(Instant::now());
                }
            }
        }
    }
}
