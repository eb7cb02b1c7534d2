//! Physical slot contents for every inventory in the [`TransposerGraph`].
//!
//! The spec's storage engine is a software system with no real
//! hardware to drive; this module plays the role that `Container` /
//! `Slot` play in the teacher (`steel-core::inventory`) — the
//! authoritative record of what is actually sitting in each slot,
//! which the Router moves items between and the Item Index caches a
//! summary of.

use rustc_hash::FxHashMap;

use crate::item::ItemKind;
use crate::topology::{InventoryId, TransposerGraph};

/// A slot either holds nothing, or one kind at some count.
pub type Slot = Option<(ItemKind, u32)>;

/// Anything that can be asked for, and mutated at, a `(inventory,
/// slot)` coordinate. Exists so the Router and the Storage Engine
/// share one notion of "the physical world" without either owning a
/// concrete collection type.
pub trait SlotStore {
    fn slot_count(&self, inv: InventoryId) -> usize;
    fn get(&self, inv: InventoryId, slot: usize) -> Slot;
    fn set(&mut self, inv: InventoryId, slot: usize, value: Slot);
}

/// The default, in-memory `SlotStore`: one `Vec<Slot>` per inventory,
/// sized from the [`TransposerGraph`] at construction time.
#[derive(Debug, Clone, Default)]
pub struct PhysicalInventories {
    slots: FxHashMap<InventoryId, Vec<Slot>>,
}

impl PhysicalInventories {
    /// Allocates empty slot vectors for every inventory named in
    /// `graph`.
    #[must_use]
    pub fn from_graph(graph: &TransposerGraph) -> Self {
        let mut slots = FxHashMap::default();
        for meta in graph.all_inventories() {
            slots.insert(meta.id, vec![None; meta.slot_count]);
        }
        Self { slots }
    }

    /// Iterates `(slot index, kind, count)` for every occupied slot in
    /// `inv`, in slot order — used by the startup scan and by flush.
    pub fn occupied(&self, inv: InventoryId) -> impl Iterator<Item = (usize, &ItemKind, u32)> {
        self.slots
            .get(&inv)
            .into_iter()
            .flatten()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|(k, c)| (i, k, *c)))
    }
}

impl SlotStore for PhysicalInventories {
    fn slot_count(&self, inv: InventoryId) -> usize {
        self.slots.get(&inv).map_or(0, Vec::len)
    }

    fn get(&self, inv: InventoryId, slot: usize) -> Slot {
        self.slots.get(&inv).and_then(|v| v.get(slot)).cloned()
    }

    fn set(&mut self, inv: InventoryId, slot: usize, value: Slot) {
        if let Some(v) = self.slots.get_mut(&inv) {
            if slot < v.len() {
                v[slot] = value;
            }
        }
    }
}
