//! Diff Broadcast (spec §4.6): merges the Item Index's and
//! Reservation Overlay's changes maps into one set of `stor_item_diff`
//! entries, emitted after every state-changing handler.

use std::collections::HashSet;

use crate::index::ItemIndex;
use crate::item::ItemKind;
use crate::reservation::ReservationOverlay;

/// One line of a diff payload: either the new public view of a kind,
/// or a removal marker (spec §6 "total=0 means removed").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEntry {
    Updated {
        kind: ItemKind,
        available: u32,
        max_stack_size: u32,
        label: String,
    },
    Removed {
        kind: ItemKind,
    },
}

/// Computes the diff for every kind touched by either change map
/// since the last call, draining both maps. Only kinds whose
/// `available()` actually changed are included (spec §4.6).
pub fn compute_diff(
    index: &mut ItemIndex,
    reservations: &mut ReservationOverlay,
    previously_available: &mut std::collections::HashMap<ItemKind, u32>,
) -> Vec<DiffEntry> {
    let touched: HashSet<ItemKind> = index
        .drain_changes()
        .into_iter()
        .map(|(k, _)| k)
        .chain(reservations.drain_changes().into_iter().map(|(k, _)| k))
        .collect();

    let mut diff = Vec::new();
    for kind in touched {
        let total = index.total(&kind);
        let available = reservations.available(&kind, total);
        let before = previously_available.get(&kind).copied();
        if before == Some(available) {
            continue;
        }
        if available == 0 {
            previously_available.remove(&kind);
            diff.push(DiffEntry::Removed { kind });
        } else {
            previously_available.insert(kind.clone(), available);
            let attrs = &index.entry(&kind).expect("nonzero available implies an entry").attributes;
            diff.push(DiffEntry::Updated {
                kind,
                available,
                max_stack_size: attrs.max_stack_size,
                label: attrs.label.clone(),
            });
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemAttributes;
    use crate::topology::{InventoryId, InventoryRole};
    use std::collections::HashMap;

    fn kind() -> ItemKind {
        ItemKind::new("minecraft", "torch", 0, false, None)
    }

    fn attrs() -> ItemAttributes {
        ItemAttributes {
            max_stack_size: 64,
            label: "Torch".into(),
            max_damage: None,
        }
    }

    #[test]
    fn reservation_hides_items_from_available_but_not_total() {
        let mut index = ItemIndex::new();
        let mut ro = ReservationOverlay::new();
        let mut seen = HashMap::new();
        let k = kind();
        let slot = (InventoryId::new(InventoryRole::Storage, 0), 0);
        index.mutate(&k, attrs, |e| {
            e.total = 10;
            e.insert = slot;
            e.extract = slot;
        });
        let diff = compute_diff(&mut index, &mut ro, &mut seen);
        assert_eq!(
            diff,
            vec![DiffEntry::Updated {
                kind: k.clone(),
                available: 10,
                max_stack_size: 64,
                label: "Torch".into(),
            }]
        );

        ro.change_reserved(&k, 4);
        let diff = compute_diff(&mut index, &mut ro, &mut seen);
        assert_eq!(
            diff,
            vec![DiffEntry::Updated {
                kind: k.clone(),
                available: 6,
                max_stack_size: 64,
                label: "Torch".into(),
            }]
        );

        ro.change_reserved(&k, -4);
        let diff = compute_diff(&mut index, &mut ro, &mut seen);
        assert_eq!(
            diff,
            vec![DiffEntry::Updated {
                kind: k,
                available: 10,
                max_stack_size: 64,
                label: "Torch".into(),
            }]
        );
    }

    #[test]
    fn total_drop_to_zero_emits_removal() {
        let mut index = ItemIndex::new();
        let mut ro = ReservationOverlay::new();
        let mut seen = HashMap::new();
        let k = kind();
        let slot = (InventoryId::new(InventoryRole::Storage, 0), 0);
        index.mutate(&k, attrs, |e| {
            e.total = 5;
            e.insert = slot;
            e.extract = slot;
        });
        compute_diff(&mut index, &mut ro, &mut seen);
        index.mutate(&k, attrs, |e| e.total = 0);
        let diff = compute_diff(&mut index, &mut ro, &mut seen);
        assert_eq!(diff, vec![DiffEntry::Removed { kind: k }]);
    }
}
