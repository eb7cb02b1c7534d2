//! Drone Staging mirror (spec §2 DS, §3 "Drone staging entry").
//!
//! This is the Storage Server's slot-level view of the drone
//! inventories' contents; it exists because workers can write to a
//! drone inventory directly, so the Storage Server must periodically
//! reconcile rather than assume its own writes are the only writes.

use rustc_hash::FxHashMap;

use crate::item::ItemKind;
use crate::topology::InventoryId;

#[derive(Debug, Clone)]
pub struct DroneStagingEntry {
    pub kind: ItemKind,
    pub count: u32,
    pub max_stack_size: u32,
}

/// Per-(drone, slot) mirror plus a dirty bit per drone inventory (spec
/// §3 "A per-inventory dirty flag marks entries whose last scan is
/// stale").
#[derive(Debug, Default)]
pub struct DroneStaging {
    slots: FxHashMap<(InventoryId, usize), DroneStagingEntry>,
    dirty: FxHashMap<InventoryId, bool>,
}

impl DroneStaging {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_slot(&mut self, inv: InventoryId, slot: usize, entry: Option<DroneStagingEntry>) {
        match entry {
            Some(entry) => {
                self.slots.insert((inv, slot), entry);
            }
            None => {
                self.slots.remove(&(inv, slot));
            }
        }
    }

    #[must_use]
    pub fn slot(&self, inv: InventoryId, slot: usize) -> Option<&DroneStagingEntry> {
        self.slots.get(&(inv, slot))
    }

    #[must_use]
    pub fn slots_of(&self, inv: InventoryId) -> impl Iterator<Item = (usize, &DroneStagingEntry)> {
        self.slots
            .iter()
            .filter(move |((i, _), _)| *i == inv)
            .map(|((_, slot), e)| (*slot, e))
    }

    pub fn mark_dirty(&mut self, inv: InventoryId) {
        self.dirty.insert(inv, true);
    }

    pub fn clear_dirty(&mut self, inv: InventoryId) {
        self.dirty.insert(inv, false);
    }

    #[must_use]
    pub fn is_dirty(&self, inv: InventoryId) -> bool {
        self.dirty.get(&inv).copied().unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::InventoryRole;

    #[test]
    fn unscanned_inventory_starts_dirty() {
        let ds = DroneStaging::new();
        assert!(ds.is_dirty(InventoryId::new(InventoryRole::Drone, 0)));
    }

    #[test]
    fn clearing_dirty_flag_sticks_until_marked_again() {
        let mut ds = DroneStaging::new();
        let inv = InventoryId::new(InventoryRole::Drone, 0);
        ds.clear_dirty(inv);
        assert!(!ds.is_dirty(inv));
        ds.mark_dirty(inv);
        assert!(ds.is_dirty(inv));
    }
}
