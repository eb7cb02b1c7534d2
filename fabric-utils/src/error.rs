//! The error taxonomy of spec §7, shared by both servers so a fatal
//! condition raised in storage can be reported through the same
//! vocabulary as one raised in crafting.

use thiserror::Error;

/// Startup-time failure: missing/malformed config, missing hardware
/// component, a network with no input/output inventory. Aborts
/// startup (spec §7 "Configuration fatal").
#[derive(Debug, Error)]
pub enum ConfigFatal {
    #[error("config file {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("routing config has no inventory tagged {role}")]
    MissingRole { role: &'static str },
    #[error("routing config names unknown transposer index {0}")]
    UnknownTransposer(u32),
    #[error("station {0} uses an unrecognized option {1}")]
    UnknownStationOption(String, String),
}

/// A failure detected during normal operation that invalidates a
/// server's in-memory state: no route exists, a mid-route hop moved
/// fewer items than required, a storage request waited past its
/// timeout. Per spec §7 this terminates the owning thread with exit
/// code 1 (spec §6 "Exit code 1 on any fatal thread error").
#[derive(Debug, Error)]
pub enum RuntimeFatal {
    #[error("no route between {from} and {to}")]
    NoRoute { from: String, to: String },
    #[error("mid-route shortfall moving {kind} through {at}: expected {expected}, got {got}")]
    MidRouteShortfall {
        kind: String,
        at: String,
        expected: u32,
        got: u32,
    },
    #[error("storage request for ticket {ticket} exceeded its {timeout_secs}s timeout")]
    StorageTimeout { ticket: u64, timeout_secs: u64 },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
