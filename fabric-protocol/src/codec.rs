//! Datagram framing over the text grammar of [`crate::message`] (spec
//! §6 "a sequence token permitting a sender to split a message into
//! chunks", "a length-prefix scheme for structured payloads").
//!
//! One [`Message`] may be larger than fits in one bus datagram; it is
//! cut into chunks sharing a `sequence` token, each carrying its
//! `index` and the total `count`, reassembled by [`crate::reassembler`].

use crate::errors::{ReadingError, WritingError};

/// Chunks no larger than this are emitted; conservative for a
/// best-effort bus with no fragmentation of its own.
pub const MAX_CHUNK_BYTES: usize = 1024;

/// One wire chunk: `sequence,index,count,<length-prefixed text>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence: u32,
    pub index: u16,
    pub count: u16,
    pub payload: String,
}

/// Splits `text` (a [`crate::message::Message::encode`] result) into
/// one or more chunks under `sequence`.
#[must_use]
pub fn split(sequence: u32, text: &str) -> Vec<Chunk> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return vec![Chunk { sequence, index: 0, count: 1, payload: String::new() }];
    }
    let count = (bytes.len() + MAX_CHUNK_BYTES - 1) / MAX_CHUNK_BYTES;
    bytes
        .chunks(MAX_CHUNK_BYTES)
        .enumerate()
        .map(|(i, slice)| Chunk {
            sequence,
            index: i as u16,
            count: count as u16,
            payload: String::from_utf8_lossy(slice).into_owned(),
        })
        .collect()
}

/// Encodes one chunk as `seq,index,count,len:payload` — the
/// length-prefix guards against a payload that itself contains a `,`
/// or `:` from corrupting the header.
#[must_use]
pub fn encode_chunk(chunk: &Chunk) -> Vec<u8> {
    format!("{},{},{},{}:{}", chunk.sequence, chunk.index, chunk.count, chunk.payload.len(), chunk.payload).into_bytes()
}

/// The inverse of [`encode_chunk`].
pub fn decode_chunk(bytes: &[u8]) -> Result<Chunk, ReadingError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ReadingError::Malformed(format!("non-utf8 chunk: {e}")))?;
    let mut header = text.splitn(4, ',');
    let sequence: u32 = header
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ReadingError::Malformed("missing chunk sequence".into()))?;
    let index: u16 = header
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ReadingError::Malformed("missing chunk index".into()))?;
    let count: u16 = header
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ReadingError::Malformed("missing chunk count".into()))?;
    let rest = header.next().ok_or_else(|| ReadingError::Malformed("missing chunk length-prefixed payload".into()))?;
    let (len_str, payload) = rest.split_once(':').ok_or_else(|| ReadingError::Malformed("missing length-prefix separator".into()))?;
    let len: usize = len_str.parse().map_err(|_| ReadingError::Malformed(format!("bad chunk length: {len_str}")))?;
    if payload.len() != len {
        return Err(ReadingError::Incomplete(format!("expected {len} bytes, got {}", payload.len())));
    }
    Ok(Chunk { sequence, index, count, payload: payload.to_string() })
}

/// Convenience used by [`crate::transport`]: split + encode every
/// chunk of one message in one call.
pub fn encode_datagrams(sequence: u32, text: &str) -> Result<Vec<Vec<u8>>, WritingError> {
    if text.len() > (u16::MAX as usize) * MAX_CHUNK_BYTES {
        return Err(WritingError::Message("message too large to fragment".into()));
    }
    Ok(split(sequence, text).iter().map(encode_chunk).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_becomes_a_single_chunk() {
        let chunks = split(1, "stor_discover");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].count, 1);
    }

    #[test]
    fn long_text_splits_into_multiple_chunks_sharing_a_sequence() {
        let text = "x".repeat(MAX_CHUNK_BYTES * 2 + 10);
        let chunks = split(7, &text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.sequence == 7));
        assert!(chunks.iter().all(|c| c.count == 3));
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[2].index, 2);
    }

    #[test]
    fn chunk_round_trips_through_wire_encoding() {
        let chunk = Chunk { sequence: 3, index: 1, count: 2, payload: "hello,world:1".into() };
        let bytes = encode_chunk(&chunk);
        assert_eq!(decode_chunk(&bytes).unwrap(), chunk);
    }
}
