//! Codec failure (spec §6 wire protocol). Grounded in
//! `steel-protocol::codec::errors`'s `ReadingError`/`WritingError`
//! split: one enum for malformed input, one for encode-side failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("EOF, expected {0} but no bytes remained")]
    CleanEof(String),
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("incomplete frame: {0}")]
    Incomplete(String),
    #[error("unknown message tag {0}")]
    UnknownTag(String),
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Error)]
pub enum WritingError {
    #[error("{0}")]
    Message(String),
}
