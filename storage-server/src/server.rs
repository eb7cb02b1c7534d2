//! Packet handling: turns one inbound [`Message`] into zero or more
//! outbound ones against a [`StorageEngine`]. Mirrors the shape of the
//! teacher's `Server` (`steel::server::Server`) as the one state object
//! a connection task dispatches against, minus any player/world
//! concepts that don't apply here.

use std::collections::HashMap;

use fabric_protocol::{DroneOp, DroneSlotListing, ItemListing, Message};
use fabric_storage::{
    compute_diff, InventoryId, InventoryRole, ItemAttributes, ItemKind, RequestStatus, StorageEngine,
};
use fabric_utils::TicketId;
use rustc_hash::FxHashMap;

const FALLBACK_MAX_STACK: u32 = 64;

fn fallback_attrs(kind: &ItemKind) -> ItemAttributes {
    ItemAttributes { max_stack_size: FALLBACK_MAX_STACK, label: kind.canonical_key(), max_damage: None }
}

/// The Storage Server's owned state: the engine plus the per-ticket
/// reservation ledger (spec §4.8 "On start, the Crafting Server asks
/// Storage Server to reserve inputs (update RO)") needed to undo a
/// reservation cleanly on `stor_recipe_cancel`.
pub struct Server {
    pub engine: StorageEngine,
    attributes: HashMap<ItemKind, ItemAttributes>,
    previously_available: HashMap<ItemKind, u32>,
    ticket_reservations: FxHashMap<TicketId, Vec<(ItemKind, u32)>>,
}

impl Server {
    /// Clears residue left in transfer/drone inventories by a prior
    /// run, then cold-scans storage to build the Item Index (spec §3
    /// lifecycle).
    #[must_use]
    pub fn new(mut engine: StorageEngine, attributes: HashMap<ItemKind, ItemAttributes>) -> Self {
        for role in [InventoryRole::Transfer, InventoryRole::Drone] {
            let _ = engine.flush_to_output(role);
        }
        engine.rescan(&attributes);
        Self {
            engine,
            attributes,
            previously_available: HashMap::new(),
            ticket_reservations: FxHashMap::default(),
        }
    }

    fn attrs_for(&self, kind: &ItemKind) -> ItemAttributes {
        self.attributes.get(kind).cloned().unwrap_or_else(|| fallback_attrs(kind))
    }

    fn snapshot(&self) -> Vec<ItemListing> {
        self.engine
            .index
            .kinds()
            .map(|kind| {
                let entry = self.engine.index.entry(kind).expect("kind came from index.kinds()");
                let available = self.engine.reservations.available(kind, entry.total);
                ItemListing {
                    kind: kind.clone(),
                    max_stack_size: entry.attributes.max_stack_size,
                    label: entry.attributes.label.clone(),
                    available,
                }
            })
            .collect()
    }

    /// Drains the Item Index's and Reservation Overlay's changes maps
    /// into a `stor_item_diff` payload, if anything actually changed.
    pub fn diff_now(&mut self) -> Vec<Message> {
        let diff = compute_diff(&mut self.engine.index, &mut self.engine.reservations, &mut self.previously_available);
        if diff.is_empty() {
            Vec::new()
        } else {
            vec![Message::StorItemDiff(diff)]
        }
    }

    /// Drains every occupied slot of `from` into storage via repeated
    /// `insert`, stopping once a pass makes no progress.
    fn drain_into_storage(&mut self, from: InventoryId) {
        loop {
            let Some(meta) = self.engine.graph.meta(from) else { return };
            let slot_count = meta.slot_count;
            let mut moved_any = false;
            for slot in 0..slot_count {
                let Some((kind, _)) = self.engine.physical.get(from, slot) else { continue };
                let attrs = self.attrs_for(&kind);
                match self.engine.insert(from, Some(slot), None, attrs) {
                    Ok(result) if result.transferred > 0 => moved_any = true,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!(%err, "fatal error draining {from} into storage");
                        return;
                    }
                }
            }
            if !moved_any {
                return;
            }
        }
    }

    fn drone_listing(&mut self, inv: InventoryId) -> Vec<DroneSlotListing> {
        let Some(meta) = self.engine.graph.meta(inv) else { return Vec::new() };
        let slot_count = meta.slot_count;
        (0..slot_count)
            .filter_map(|slot| {
                self.engine.physical.get(inv, slot).map(|(kind, count)| {
                    let attrs = self.attrs_for(&kind);
                    DroneSlotListing { drone_index: inv.index, slot: slot as u32, kind, count, max_stack_size: attrs.max_stack_size }
                })
            })
            .collect()
    }

    fn drone_extract(&mut self, inv: InventoryId, extract: &[(ItemKind, u32)]) -> RequestStatus {
        let mut worst = RequestStatus::Ok;
        for (kind, amount) in extract {
            let transferred = match self.engine.extract(inv, None, kind, Some(*amount), None) {
                Ok(result) => result.transferred,
                Err(err) => {
                    tracing::error!(%err, "fatal error extracting into drone {inv}");
                    return RequestStatus::Missing;
                }
            };
            let status = RequestStatus::classify(*amount, transferred);
            if status != RequestStatus::Ok {
                worst = status;
            }
        }
        worst
    }

    /// Dispatches one inbound frame, returning whatever should be
    /// sent back to the sender.
    #[tracing::instrument(level = "debug", skip(self, msg))]
    pub fn handle(&mut self, msg: Message) -> Vec<Message> {
        match msg {
            Message::StorDiscover => {
                let mut out = vec![Message::StorStarted, Message::StorItemList(self.snapshot())];
                out.extend(self.diff_now());
                out
            }
            Message::StorInsert => {
                let input = self.engine.graph.input_id;
                self.drain_into_storage(input);
                self.diff_now()
            }
            Message::StorExtract { kind, amount } => {
                let Some(kind) = kind.or_else(|| {
                    self.engine
                        .index
                        .kinds()
                        .find(|k| self.engine.reservations.available(k, self.engine.index.total(k)) > 0)
                        .cloned()
                }) else {
                    return Vec::new();
                };
                let output = self.engine.graph.output_id;
                if let Err(err) = self.engine.extract(output, None, &kind, amount, Some(true)) {
                    tracing::error!(%err, "fatal error extracting to output");
                }
                self.diff_now()
            }
            Message::StorRecipeReserve { ticket, required_items } => {
                for (kind, amount) in &required_items {
                    self.engine.reservations.change_reserved(kind, i64::from(*amount));
                }
                self.ticket_reservations.insert(ticket, required_items);
                self.diff_now()
            }
            Message::StorRecipeStart { .. } => Vec::new(),
            Message::StorRecipeCancel { ticket } => {
                if let Some(items) = self.ticket_reservations.remove(&ticket) {
                    for (kind, amount) in items {
                        self.engine.reservations.change_reserved(&kind, -i64::from(amount));
                    }
                }
                self.diff_now()
            }
            Message::StorGetDroneItemList => {
                let order = self.engine.graph.drone_order.clone();
                let slots = order.into_iter().flat_map(|inv| self.drone_listing(inv)).collect();
                vec![Message::StorDroneItemList(slots)]
            }
            Message::StorDroneInsert { drone_index, .. } => {
                let inv = InventoryId::new(InventoryRole::Drone, drone_index);
                self.drain_into_storage(inv);
                let mut out = vec![Message::StorDroneItemDiff { op: DroneOp::Insert, result: RequestStatus::Ok, diff: Vec::new() }];
                out.extend(self.diff_now());
                out
            }
            Message::StorDroneExtract { drone_index, ticket, extract, .. } => {
                let inv = InventoryId::new(InventoryRole::Drone, drone_index);
                // An empty list with a ticket set means "pull whatever
                // that ticket still has reserved" (the Crafting Server
                // dispatcher tracks amounts itself and doesn't repeat
                // them on the wire); fall back to the caller-supplied
                // list otherwise.
                let extract = if extract.is_empty() {
                    ticket.and_then(|t| self.ticket_reservations.get(&t).cloned()).unwrap_or_default()
                } else {
                    extract
                };
                let result = self.drone_extract(inv, &extract);
                let mut out = vec![Message::StorDroneItemDiff { op: DroneOp::Extract, result, diff: Vec::new() }];
                out.extend(self.diff_now());
                out
            }
            other => {
                tracing::warn!(?other, "storage server has no handler for this message");
                Vec::new()
            }
        }
    }
}
