//! Small newtype identifiers shared across the storage and crafting
//! crates, plus the monotonic counters that mint them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A Crafting Server craft ticket handle (spec §2 CTT, §3 "Ticket").
/// The unit of cancellation and progress reporting for one user craft
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket#{}", self.0)
    }
}

/// A worker task handle, scoped to one ticket's `craftingTasks` map
/// (spec §3 craft ticket fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Monotonically increasing id generator; one instance per table that
/// owns the ids (the Craft Ticket Table mints `TicketId`s, each ticket
/// mints its own `TaskId`s via its `taskCounter`, per spec §3).
#[derive(Debug, Default)]
pub struct IdCounter(AtomicU64);

impl IdCounter {
    /// Creates a counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Returns the next id and advances the counter.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments() {
        let c = IdCounter::new();
        assert_eq!(c.next(), 0);
        assert_eq!(c.next(), 1);
        assert_eq!(c.next(), 2);
    }
}
