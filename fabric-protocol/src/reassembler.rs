//! Chunk reassembly (spec §6 "the receiver reassembles by sequence
//! with a bounded buffer lifetime (5 s)"). No ACKs: a sequence that
//! never completes within the lifetime is simply dropped.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::codec::Chunk;

pub const BUFFER_LIFETIME: Duration = Duration::from_secs(5);

struct Pending {
    slots: Vec<Option<String>>,
    received: u16,
    first_seen: Instant,
}

/// Per-sender (or per-socket, if the transport is one-peer-per-socket)
/// partial-message buffer.
#[derive(Default)]
pub struct Reassembler {
    pending: FxHashMap<u32, Pending>,
}

impl Reassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk in. Returns the reassembled text once every
    /// chunk of its sequence has arrived.
    pub fn accept(&mut self, chunk: Chunk, now: Instant) -> Option<String> {
        if chunk.count == 1 {
            return Some(chunk.payload);
        }

        let entry = self.pending.entry(chunk.sequence).or_insert_with(|| Pending {
            slots: vec![None; chunk.count as usize],
            received: 0,
            first_seen: now,
        });

        let idx = chunk.index as usize;
        if idx >= entry.slots.len() {
            return None;
        }
        if entry.slots[idx].is_none() {
            entry.slots[idx] = Some(chunk.payload);
            entry.received += 1;
        }

        if entry.received as usize == entry.slots.len() {
            let pending = self.pending.remove(&chunk.sequence).expect("just matched this sequence");
            let mut text = String::new();
            for slot in pending.slots {
                text.push_str(&slot.expect("received count matched slot count"));
            }
            Some(text)
        } else {
            None
        }
    }

    /// Drops any sequence whose first chunk arrived more than
    /// [`BUFFER_LIFETIME`] ago, incomplete.
    pub fn purge_expired(&mut self, now: Instant) {
        self.pending.retain(|_, p| now.duration_since(p.first_seen) < BUFFER_LIFETIME);
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn single_chunk_messages_reassemble_immediately() {
        let mut r = Reassembler::new();
        let chunks = codec::split(1, "stor_discover");
        assert_eq!(r.accept(chunks[0].clone(), Instant::now()), Some("stor_discover".to_string()));
    }

    #[test]
    fn multi_chunk_messages_reassemble_once_all_arrive_out_of_order() {
        let mut r = Reassembler::new();
        let text = "x".repeat(codec::MAX_CHUNK_BYTES * 2 + 5);
        let mut chunks = codec::split(9, &text);
        chunks.reverse();
        let now = Instant::now();
        assert_eq!(r.accept(chunks[0].clone(), now), None);
        assert_eq!(r.accept(chunks[1].clone(), now), None);
        assert_eq!(r.accept(chunks[2].clone(), now), Some(text));
    }

    #[test]
    fn expired_incomplete_sequences_are_purged() {
        let mut r = Reassembler::new();
        let text = "x".repeat(codec::MAX_CHUNK_BYTES * 2 + 5);
        let chunks = codec::split(9, &text);
        let t0 = Instant::now();
        r.accept(chunks[0].clone(), t0);
        assert_eq!(r.pending_count(), 1);
        r.purge_expired(t0 + BUFFER_LIFETIME);
        assert_eq!(r.pending_count(), 0);
    }
}
