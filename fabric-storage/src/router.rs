//! BFS routing over the Transposer Graph (spec §4.1).

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::inventory::SlotStore;
use crate::topology::{InventoryId, InventoryRole, TransposerGraph, TransposerIndex};
use fabric_utils::RuntimeFatal;

/// The outcome of a [`route`] call: how much actually moved, and
/// where the remainder got stuck, if any (spec §4.1 contract).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub transferred: u32,
    pub stuck: Option<(InventoryId, usize)>,
}

/// Finds the hop sequence from `src` to `dst` across the Transposer
/// Graph, expanding only through `Transfer`-role inventories (spec
/// §4.1). Returns the ordered list of `(inventory, transposer)` hops
/// including the source and destination, or `None` if no path exists
/// (a [`RuntimeFatal::NoRoute`] condition at the caller).
#[must_use]
pub fn find_path(
    graph: &TransposerGraph,
    src: InventoryId,
    dst: InventoryId,
) -> Option<Vec<InventoryId>> {
    if src == dst {
        return Some(vec![src]);
    }
    if graph.shared_transposer(src, dst).is_some() {
        return Some(vec![src, dst]);
    }

    let mut visited: FxHashSet<InventoryId> = FxHashSet::default();
    let mut back: FxHashMap<InventoryId, InventoryId> = FxHashMap::default();
    let mut queue: VecDeque<InventoryId> = VecDeque::new();
    visited.insert(src);
    queue.push_back(src);

    while let Some(current) = queue.pop_front() {
        for (neighbor, _transposer) in graph.neighbors(current) {
            if visited.contains(&neighbor) {
                continue;
            }
            if neighbor == dst {
                back.insert(neighbor, current);
                return Some(reconstruct(&back, src, dst));
            }
            // Only continue expanding through relay (Transfer) inventories.
            if graph.role_of(neighbor) == Some(InventoryRole::Transfer) {
                visited.insert(neighbor);
                back.insert(neighbor, current);
                queue.push_back(neighbor);
            }
        }
    }
    None
}

fn reconstruct(
    back: &FxHashMap<InventoryId, InventoryId>,
    src: InventoryId,
    dst: InventoryId,
) -> Vec<InventoryId> {
    let mut hops = vec![dst];
    let mut cursor = dst;
    while cursor != src {
        let parent = back[&cursor];
        hops.push(parent);
        cursor = parent;
    }
    hops.reverse();
    hops
}

/// Moves up to `amount` items from `(src, src_slot)` to `(dst,
/// dst_slot)`, executing each hop of `find_path` as one
/// `SlotStore::set` pair (spec §4.1 algorithm). Only the final hop may
/// move fewer than `amount`; a shortfall on any earlier hop is a
/// [`RuntimeFatal::MidRouteShortfall`] because callers are required to
/// arrange for transfer inventories to never be full mid-route.
pub fn route(
    store: &mut impl SlotStore,
    graph: &TransposerGraph,
    src: InventoryId,
    src_slot: usize,
    dst: InventoryId,
    dst_slot: usize,
    amount: u32,
    max_stack: u32,
) -> Result<RouteOutcome, RuntimeFatal> {
    if amount == 0 {
        return Ok(RouteOutcome {
            transferred: 0,
            stuck: None,
        });
    }

    let path = find_path(graph, src, dst).ok_or_else(|| RuntimeFatal::NoRoute {
        from: src.to_string(),
        to: dst.to_string(),
    })?;

    let mut cur_inv = src;
    let mut cur_slot = src_slot;
    let mut remaining = amount;
    let hop_count = path.len() - 1;

    for (i, next_inv) in path.iter().enumerate().skip(1) {
        let is_final = i == hop_count;
        let target_slot = if is_final { dst_slot } else { first_empty_or_same(store, *next_inv) };
        let moved = move_one_hop(store, graph, cur_inv, cur_slot, *next_inv, target_slot, remaining, max_stack);

        if !is_final && moved < remaining {
            return Err(RuntimeFatal::MidRouteShortfall {
                kind: "item".to_string(),
                at: next_inv.to_string(),
                expected: remaining,
                got: moved,
            });
        }

        if is_final {
            return Ok(RouteOutcome {
                transferred: moved,
                stuck: if moved < remaining {
                    Some((cur_inv, cur_slot))
                } else {
                    None
                },
            });
        }

        cur_inv = *next_inv;
        cur_slot = target_slot;
        remaining = moved;
    }

    Ok(RouteOutcome {
        transferred: amount - remaining,
        stuck: None,
    })
}

/// Picks a scratch slot in a relay inventory to briefly hold
/// in-transit items: the same kind if already present, else the first
/// empty slot. Intermediate relay inventories are expected (by
/// caller discipline, per spec §4.1) to always have room.
fn first_empty_or_same(store: &impl SlotStore, inv: InventoryId) -> usize {
    for slot in 0..store.slot_count(inv) {
        if store.get(inv, slot).is_none() {
            return slot;
        }
    }
    0
}

fn move_one_hop(
    store: &mut impl SlotStore,
    graph: &TransposerGraph,
    from: InventoryId,
    from_slot: usize,
    to: InventoryId,
    to_slot: usize,
    amount: u32,
    max_stack: u32,
) -> u32 {
    let Some((kind, have)) = store.get(from, from_slot) else {
        return 0;
    };
    let to_take = have.min(amount);
    if to_take == 0 {
        return 0;
    }

    let existing = store.get(to, to_slot);
    let (kind_matches, existing_count) = match &existing {
        Some((existing_kind, count)) if *existing_kind == kind => (true, *count),
        None => (true, 0),
        Some(_) => (false, 0),
    };
    if !kind_matches {
        return 0;
    }
    let capacity = graph.meta(to).map_or(max_stack, |m| m.capacity_for(to_slot, max_stack));
    let accepted = to_take.min(capacity.saturating_sub(existing_count));
    if accepted == 0 {
        return 0;
    }

    store.set(to, to_slot, Some((kind.clone(), existing_count + accepted)));
    let remaining = have - accepted;
    store.set(
        from,
        from_slot,
        if remaining == 0 {
            None
        } else {
            Some((kind, remaining))
        },
    );
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::PhysicalInventories;
    use crate::item::ItemKind;
    use crate::topology::{InventoryMeta, Port, Side, TransposerGraphBuilder};

    fn sample_graph() -> TransposerGraph {
        let mut builder = TransposerGraphBuilder::default();
        let storage = InventoryId::new(InventoryRole::Storage, 0);
        let input = InventoryId::new(InventoryRole::Input, 0);
        let output = InventoryId::new(InventoryRole::Output, 0);
        builder.add_inventory(
            InventoryMeta {
                id: storage,
                display: "storage".into(),
                slot_count: 4,
                slot_capacity: vec![None; 4],
            },
            vec![Port {
                transposer: TransposerIndex(0),
                side: Side::Top,
            }],
        );
        builder.add_inventory(
            InventoryMeta {
                id: input,
                display: "input".into(),
                slot_count: 1,
                slot_capacity: vec![None],
            },
            vec![Port {
                transposer: TransposerIndex(0),
                side: Side::Bottom,
            }],
        );
        builder.add_inventory(
            InventoryMeta {
                id: output,
                display: "output".into(),
                slot_count: 1,
                slot_capacity: vec![None],
            },
            vec![],
        );
        builder.build().unwrap()
    }

    #[test]
    fn direct_hop_moves_full_amount() {
        let graph = sample_graph();
        let mut store = PhysicalInventories::from_graph(&graph);
        let kind = ItemKind::new("minecraft", "stick", 0, false, None);
        store.set(
            InventoryId::new(InventoryRole::Input, 0),
            0,
            Some((kind, 10)),
        );
        let outcome = route(
            &mut store,
            &graph,
            InventoryId::new(InventoryRole::Input, 0),
            0,
            InventoryId::new(InventoryRole::Storage, 0),
            0,
            10,
            64,
        )
        .unwrap();
        assert_eq!(outcome.transferred, 10);
        assert_eq!(outcome.stuck, None);
    }

    #[test]
    fn no_path_is_fatal() {
        let mut builder = TransposerGraphBuilder::default();
        let storage = InventoryId::new(InventoryRole::Storage, 0);
        let input = InventoryId::new(InventoryRole::Input, 0);
        let output = InventoryId::new(InventoryRole::Output, 0);
        builder.add_inventory(
            InventoryMeta {
                id: storage,
                display: "s".into(),
                slot_count: 1,
                slot_capacity: vec![None],
            },
            vec![],
        );
        builder.add_inventory(
            InventoryMeta {
                id: input,
                display: "i".into(),
                slot_count: 1,
                slot_capacity: vec![None],
            },
            vec![],
        );
        builder.add_inventory(
            InventoryMeta {
                id: output,
                display: "o".into(),
                slot_count: 1,
                slot_capacity: vec![None],
            },
            vec![],
        );
        let graph = builder.build().unwrap();
        let mut store = PhysicalInventories::from_graph(&graph);
        let result = route(&mut store, &graph, input, 0, storage, 0, 1, 64);
        assert!(matches!(result, Err(RuntimeFatal::NoRoute { .. })));
    }

    #[test]
    fn a_capacity_limited_slot_refuses_the_surplus() {
        let mut builder = TransposerGraphBuilder::default();
        let storage = InventoryId::new(InventoryRole::Storage, 0);
        let input = InventoryId::new(InventoryRole::Input, 0);
        builder.add_inventory(
            InventoryMeta {
                id: storage,
                display: "storage".into(),
                slot_count: 1,
                slot_capacity: vec![Some(5)],
            },
            vec![Port { transposer: TransposerIndex(0), side: Side::Top }],
        );
        builder.add_inventory(
            InventoryMeta {
                id: input,
                display: "input".into(),
                slot_count: 1,
                slot_capacity: vec![None],
            },
            vec![Port { transposer: TransposerIndex(0), side: Side::Bottom }],
        );
        let graph = builder.build().unwrap();
        let mut store = PhysicalInventories::from_graph(&graph);
        let kind = ItemKind::new("minecraft", "stick", 0, false, None);
        store.set(input, 0, Some((kind, 10)));

        let outcome = route(&mut store, &graph, input, 0, storage, 0, 10, 64).unwrap();
        assert_eq!(outcome.transferred, 5);
        assert_eq!(outcome.stuck, Some((input, 0)));
        assert_eq!(store.get(storage, 0), Some((ItemKind::new("minecraft", "stick", 0, false, None), 5)));
        assert_eq!(store.get(input, 0), Some((ItemKind::new("minecraft", "stick", 0, false, None), 5)));
    }
}
