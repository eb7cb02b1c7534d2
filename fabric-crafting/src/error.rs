//! Ticket-local failure (spec §7): cancels one craft ticket and is
//! surfaced to the interface as `craft_recipe_error`, with no effect
//! on any other ticket or on the Storage Server's own indices.

use fabric_utils::TicketId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("ticket {ticket}: worker {worker} reported a failed craft: {message}")]
    WorkerCraftFailed {
        ticket: TicketId,
        worker: String,
        message: String,
    },
    #[error("ticket {ticket}: storage extract exceeded its {timeout_secs}s timeout")]
    StorageExtractTimeout { ticket: TicketId, timeout_secs: u64 },
    #[error("ticket {ticket}: reservation for {kind} insufficient at activation")]
    ReservationShortfall { ticket: TicketId, kind: String },
    #[error("ticket {ticket}: destination full when not expected for {kind}")]
    UnexpectedFull { ticket: TicketId, kind: String },
}
