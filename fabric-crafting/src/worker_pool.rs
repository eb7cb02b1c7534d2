//! Worker Pool (spec §2 WP): the Crafting Server's map of worker
//! addresses and their `free | pending | busy` state.
//!
//! Named in the spec's component list with no dedicated subsection of
//! its own (SPEC_FULL §5 supplement); grounded in the teacher's plain
//! state-map ownership style used for registries like `KeyStore`
//! rather than anything event-driven — workers are looked up and
//! mutated synchronously from within one dispatcher tick.

use rustc_hash::{FxHashMap, FxHashSet};

use fabric_storage::InventoryId;

/// A worker's wire address — opaque to this crate beyond identity and
/// ordering (spec §6 names no concrete address format for the radio
/// bus, only that `robot_*` messages are addressed to one).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerAddr(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Free,
    Pending,
    Busy,
}

struct WorkerEntry {
    state: WorkerState,
    /// Drone staging inventories this worker is physically adjacent
    /// to — the set `workers_adjacent_to` filters against.
    adjacent: FxHashSet<InventoryId>,
}

/// Address → state map plus each worker's adjacency to drone staging
/// inventories (spec §4.8 "prerequisite workers exist... robots
/// adjacent to some free staging").
#[derive(Default)]
pub struct WorkerPool {
    workers: FxHashMap<WorkerAddr, WorkerEntry>,
}

impl WorkerPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or re-registers a worker as `free`, with the given
    /// adjacency set (spec §6 "worker connectivity config":
    /// `droneInventoryIndex -> map(workerAddress -> sideSeenByWorker)`,
    /// inverted here to worker → inventories).
    pub fn register(&mut self, addr: WorkerAddr, adjacent: impl IntoIterator<Item = InventoryId>) {
        self.workers.insert(
            addr,
            WorkerEntry {
                state: WorkerState::Free,
                adjacent: adjacent.into_iter().collect(),
            },
        );
    }

    #[must_use]
    pub fn state(&self, addr: &WorkerAddr) -> Option<WorkerState> {
        self.workers.get(addr).map(|e| e.state)
    }

    /// Marks a worker `pending` after the dispatcher hands it a task
    /// (spec §4.8 "dispatch the task... mark it pending").
    pub fn reserve(&mut self, addr: &WorkerAddr) {
        if let Some(e) = self.workers.get_mut(addr) {
            e.state = WorkerState::Pending;
        }
    }

    /// Marks a worker `busy` once it has been sent `robot_start_craft`.
    pub fn mark_busy(&mut self, addr: &WorkerAddr) {
        if let Some(e) = self.workers.get_mut(addr) {
            e.state = WorkerState::Busy;
        }
    }

    /// Returns a worker to `free` on `robot_finished_craft` or
    /// `robot_error` (spec §4.8 "Worker completion"/"Worker failure").
    pub fn release(&mut self, addr: &WorkerAddr) {
        if let Some(e) = self.workers.get_mut(addr) {
            e.state = WorkerState::Free;
        }
    }

    /// Every worker currently `free` and adjacent to `staging` (spec
    /// §4.8 "Snapshot the set of workers adjacent to the allocated
    /// staging whose state is free").
    #[must_use]
    pub fn free_workers_adjacent_to(&self, staging: InventoryId) -> Vec<WorkerAddr> {
        self.workers
            .iter()
            .filter(|(_, e)| e.state == WorkerState::Free && e.adjacent.contains(&staging))
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    #[must_use]
    pub fn any_adjacent(&self, staging: InventoryId) -> bool {
        self.workers.values().any(|e| e.adjacent.contains(&staging))
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
    fn only_free_adjacent_workers_are_returned() {
        let mut pool = WorkerPool::new();
        pool.register(WorkerAddr("bot-1".into()), [inv(0)]);
        pool.register(WorkerAddr("bot-2".into()), [inv(1)]);
        pool.reserve(&WorkerAddr("bot-1".into()));

        assert!(pool.free_workers_adjacent_to(inv(0)).is_empty());
        assert_eq!(
            pool.free_workers_adjacent_to(inv(1)),
            vec![WorkerAddr("bot-2".into())]
        );
    }

    #[test]
    fn lifecycle_round_trips_through_pending_and_busy_back_to_free() {
        let mut pool = WorkerPool::new();
        let addr = WorkerAddr("bot-1".into());
        pool.register(addr.clone(), [inv(0)]);
        assert_eq!(pool.state(&addr), Some(WorkerState::Free));
        pool.reserve(&addr);
        assert_eq!(pool.state(&addr), Some(WorkerState::Pending));
        pool.mark_busy(&addr);
        assert_eq!(pool.state(&addr), Some(WorkerState::Busy));
        pool.release(&addr);
        assert_eq!(pool.state(&addr), Some(WorkerState::Free));
    }
}
