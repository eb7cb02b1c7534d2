//! The Item Index (spec §2 II, §3 "Item Index entry").

use rustc_hash::FxHashMap;

use crate::item::{ItemAttributes, ItemKind};
use crate::topology::InventoryId;

/// Per-kind bookkeeping: total count and the insert/extract cursors
/// (spec §3).
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub total: u32,
    pub insert: (InventoryId, usize),
    pub extract: (InventoryId, usize),
    /// True once a forward sweep from `insert` to `extract` has found
    /// no other partial stack of this kind (spec §4.2 phase 2).
    pub checked_partials: bool,
    pub attributes: ItemAttributes,
}

/// A before/after pair recorded the first time a kind's total changes
/// within a diff cycle (spec §3 "a changes map that records each
/// entry's prior total since the last diff broadcast").
#[derive(Debug, Clone, Copy)]
pub struct PriorTotal(pub u32);

/// The Storage Server's catalog of what lives where. Holds one
/// [`IndexEntry`] per kind currently present, plus the sidecar
/// `firstEmptySlot` cursor and the pending-diff changes map (spec §3
/// "A sidecar **data** record").
#[derive(Debug, Default)]
pub struct ItemIndex {
    entries: FxHashMap<ItemKind, IndexEntry>,
    /// The global `firstEmptyIndex/Slot` cursor (spec §3 "data"
    /// sidecar) — one value for the whole network, not per kind.
    first_empty: Option<(InventoryId, usize)>,
    changes: FxHashMap<ItemKind, PriorTotal>,
}

impl ItemIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entry(&self, kind: &ItemKind) -> Option<&IndexEntry> {
        self.entries.get(kind)
    }

    #[must_use]
    pub fn total(&self, kind: &ItemKind) -> u32 {
        self.entries.get(kind).map_or(0, |e| e.total)
    }

    #[must_use]
    pub fn kinds(&self) -> impl Iterator<Item = &ItemKind> {
        self.entries.keys()
    }

    #[must_use]
    pub fn first_empty_slot(&self) -> Option<(InventoryId, usize)> {
        self.first_empty
    }

    pub fn set_first_empty_slot(&mut self, at: Option<(InventoryId, usize)>) {
        self.first_empty = at;
    }

    /// Records the kind's total before a mutation the first time it
    /// is touched in the current diff cycle, then applies `f`.
    pub fn mutate(&mut self, kind: &ItemKind, attrs: impl FnOnce() -> ItemAttributes, f: impl FnOnce(&mut IndexEntry)) {
        let prior = self.entries.get(kind).map_or(0, |e| e.total);
        self.changes.entry(kind.clone()).or_insert(PriorTotal(prior));

        let entry = self.entries.entry(kind.clone()).or_insert_with(|| IndexEntry {
            total: 0,
            insert: (InventoryId::new(crate::topology::InventoryRole::Storage, 0), 0),
            extract: (InventoryId::new(crate::topology::InventoryRole::Storage, 0), 0),
            checked_partials: false,
            attributes: attrs(),
        });
        f(entry);

        if entry.total == 0 {
            self.entries.remove(kind);
        }
    }

    /// Drains the changes map, returning `(kind, prior total)` pairs
    /// for the diff broadcaster to merge with the Reservation
    /// Overlay's own changes map (spec §4.6).
    pub fn drain_changes(&mut self) -> Vec<(ItemKind, PriorTotal)> {
        self.changes.drain().collect()
    }

    pub fn set_insert_cursor(&mut self, kind: &ItemKind, at: (InventoryId, usize)) {
        if let Some(e) = self.entries.get_mut(kind) {
            e.insert = at;
        }
    }

    pub fn set_extract_cursor(&mut self, kind: &ItemKind, at: (InventoryId, usize)) {
        if let Some(e) = self.entries.get_mut(kind) {
            e.extract = at;
        }
    }

    pub fn set_checked_partials(&mut self, kind: &ItemKind, value: bool) {
        if let Some(e) = self.entries.get_mut(kind) {
            e.checked_partials = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::InventoryRole;

    fn kind() -> ItemKind {
        ItemKind::new("minecraft", "stick", 0, false, None)
    }

    fn attrs() -> ItemAttributes {
        ItemAttributes {
            max_stack_size: 64,
            label: "Stick".into(),
            max_damage: None,
        }
    }

    #[test]
    fn new_kind_creates_entry_and_removing_to_zero_drops_it() {
        let mut idx = ItemIndex::new();
        let k = kind();
        let slot = (InventoryId::new(InventoryRole::Storage, 0), 0);
        idx.mutate(&k, attrs, |e| {
            e.total += 5;
            e.insert = slot;
            e.extract = slot;
        });
        assert_eq!(idx.total(&k), 5);
        idx.mutate(&k, attrs, |e| e.total -= 5);
        assert_eq!(idx.total(&k), 0);
        assert!(idx.entry(&k).is_none());
    }

    #[test]
    fn changes_map_records_prior_total_once_per_cycle() {
        let mut idx = ItemIndex::new();
        let k = kind();
        idx.mutate(&k, attrs, |e| e.total += 5);
        idx.mutate(&k, attrs, |e| e.total += 5);
        let changes = idx.drain_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].1.0, 0);
        assert_eq!(idx.total(&k), 10);
    }
}
