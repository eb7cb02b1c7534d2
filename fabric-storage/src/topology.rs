//! The Transposer Graph (spec §2 TG, §3 "Transposer port"/"Transposer
//! graph edges"): the physical wiring between inventories, built once
//! at startup and frozen for the process lifetime (the same
//! `freeze()`-after-load shape the teacher uses for its block/item
//! registries).

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use fabric_utils::ConfigFatal;

/// One of the six faces a transposer can reach on an adjacent block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    North,
    South,
    East,
    West,
}

impl Side {
    /// Parses the lowercase side names used in the routing config file.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            "north" => Self::North,
            "south" => Self::South,
            "east" => Self::East,
            "west" => Self::West,
            _ => return None,
        })
    }
}

/// Index of a transposer device in the routing config's `transposers:`
/// section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransposerIndex(pub u32);

/// One side of one transposer; connects to exactly one inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    pub transposer: TransposerIndex,
    pub side: Side,
}

/// The role tag an inventory carries (spec §2 TG bullet list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InventoryRole {
    Storage,
    Input,
    Output,
    Transfer,
    Drone,
}

impl InventoryRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Input => "input",
            Self::Output => "output",
            Self::Transfer => "transfer",
            Self::Drone => "drone",
        }
    }
}

/// An inventory identity: its role plus its position within that
/// role's priority-ordered list (spec §3 "Inventory. Identified by
/// (role, index)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InventoryId {
    pub role: InventoryRole,
    pub index: u32,
}

impl InventoryId {
    #[must_use]
    pub const fn new(role: InventoryRole, index: u32) -> Self {
        Self { role, index }
    }
}

impl std::fmt::Display for InventoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.role.as_str(), self.index)
    }
}

/// Static metadata for one inventory: its slot count and any
/// oversized slot capacities (spec §3 "some slots may have an
/// effective capacity far exceeding the nominal max stack size").
#[derive(Debug, Clone)]
pub struct InventoryMeta {
    pub id: InventoryId,
    pub display: String,
    pub slot_count: usize,
    /// `Some(cap)` overrides the per-kind max stack size for that
    /// slot; `None` means the slot's capacity is whatever kind sits
    /// in it allows.
    pub slot_capacity: Vec<Option<u32>>,
}

impl InventoryMeta {
    #[must_use]
    pub fn capacity_for(&self, slot: usize, kind_max_stack: u32) -> u32 {
        self.slot_capacity
            .get(slot)
            .copied()
            .flatten()
            .unwrap_or(kind_max_stack)
    }
}

/// The frozen wiring graph: which ports reach which inventories, and
/// the priority-ordered `storage`/`drone` lists the Storage Engine
/// walks when picking where to insert/extract/stage (spec §6
/// "Priority within `storage:` and `drone:` follows file order").
#[derive(Debug, Clone)]
pub struct TransposerGraph {
    inventories: FxHashMap<InventoryId, InventoryMeta>,
    ports_of: FxHashMap<InventoryId, SmallVec<[Port; 6]>>,
    inventory_of_port: FxHashMap<Port, InventoryId>,
    transposer_members: FxHashMap<TransposerIndex, SmallVec<[InventoryId; 6]>>,
    pub storage_order: Vec<InventoryId>,
    pub drone_order: Vec<InventoryId>,
    pub input_id: InventoryId,
    pub output_id: InventoryId,
    pub transfer_ids: Vec<InventoryId>,
}

/// Builder used by the routing-config parser; validated into a
/// [`TransposerGraph`] by [`TransposerGraphBuilder::build`].
#[derive(Debug, Default)]
pub struct TransposerGraphBuilder {
    pub inventories: FxHashMap<InventoryId, InventoryMeta>,
    pub ports_of: FxHashMap<InventoryId, SmallVec<[Port; 6]>>,
    pub storage_order: Vec<InventoryId>,
    pub drone_order: Vec<InventoryId>,
    pub input_id: Option<InventoryId>,
    pub output_id: Option<InventoryId>,
    pub transfer_ids: Vec<InventoryId>,
}

impl TransposerGraphBuilder {
    pub fn add_inventory(&mut self, meta: InventoryMeta, ports: Vec<Port>) {
        let id = meta.id;
        match id.role {
            InventoryRole::Storage => self.storage_order.push(id),
            InventoryRole::Drone => self.drone_order.push(id),
            InventoryRole::Input => self.input_id = Some(id),
            InventoryRole::Output => self.output_id = Some(id),
            InventoryRole::Transfer => self.transfer_ids.push(id),
        }
        self.inventories.insert(id, meta);
        self.ports_of.insert(id, ports.into_iter().collect());
    }

    /// Validates the exactly-one-input/output, at-least-one-storage
    /// invariant from spec §6 and freezes the reverse port→inventory
    /// index.
    pub fn build(self) -> Result<TransposerGraph, ConfigFatal> {
        let input_id = self.input_id.ok_or(ConfigFatal::MissingRole { role: "input" })?;
        let output_id = self
            .output_id
            .ok_or(ConfigFatal::MissingRole { role: "output" })?;
        if self.storage_order.is_empty() {
            return Err(ConfigFatal::MissingRole { role: "storage" });
        }

        let mut inventory_of_port = FxHashMap::default();
        let mut transposer_members: FxHashMap<TransposerIndex, SmallVec<[InventoryId; 6]>> =
            FxHashMap::default();
        for (id, ports) in &self.ports_of {
            for port in ports {
                inventory_of_port.insert(*port, *id);
                transposer_members.entry(port.transposer).or_default().push(*id);
            }
        }

        Ok(TransposerGraph {
            inventories: self.inventories,
            ports_of: self.ports_of,
            inventory_of_port,
            transposer_members,
            storage_order: self.storage_order,
            drone_order: self.drone_order,
            input_id,
            output_id,
            transfer_ids: self.transfer_ids,
        })
    }
}

impl TransposerGraph {
    #[must_use]
    pub fn meta(&self, id: InventoryId) -> Option<&InventoryMeta> {
        self.inventories.get(&id)
    }

    #[must_use]
    pub fn ports_of(&self, id: InventoryId) -> &[Port] {
        self.ports_of.get(&id).map_or(&[], SmallVec::as_slice)
    }

    #[must_use]
    pub fn inventory_of_port(&self, port: Port) -> Option<InventoryId> {
        self.inventory_of_port.get(&port).copied()
    }

    /// `Some(transposer)` if `a` and `b` share a transposer (one hop,
    /// cost 1, per spec §3).
    #[must_use]
    pub fn shared_transposer(&self, a: InventoryId, b: InventoryId) -> Option<TransposerIndex> {
        let a_ports = self.ports_of(a);
        let b_ports = self.ports_of(b);
        a_ports.iter().find_map(|pa| {
            b_ports
                .iter()
                .find(|pb| pb.transposer == pa.transposer)
                .map(|_| pa.transposer)
        })
    }

    #[must_use]
    pub fn all_inventories(&self) -> impl Iterator<Item = &InventoryMeta> {
        self.inventories.values()
    }

    /// Every inventory (other than `from` itself) that shares a
    /// transposer with `from`, paired with the transposer used — the
    /// Router's BFS neighbor function.
    #[must_use]
    pub fn neighbors(&self, from: InventoryId) -> Vec<(InventoryId, TransposerIndex)> {
        let mut out = Vec::new();
        for port in self.ports_of(from) {
            if let Some(members) = self.transposer_members.get(&port.transposer) {
                for &member in members {
                    if member != from {
                        out.push((member, port.transposer));
                    }
                }
            }
        }
        out
    }

    #[must_use]
    pub fn role_of(&self, id: InventoryId) -> Option<InventoryRole> {
        self.inventories.get(&id).map(|_| id.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: InventoryId, slots: usize) -> InventoryMeta {
        InventoryMeta {
            id,
            display: format!("{id}"),
            slot_count: slots,
            slot_capacity: vec![None; slots],
        }
    }

    #[test]
    fn build_requires_input_output_and_storage() {
        let builder = TransposerGraphBuilder::default();
        assert!(matches!(
            builder.build(),
            Err(ConfigFatal::MissingRole { role: "input" })
        ));
    }

    #[test]
    fn shared_transposer_detects_one_hop_adjacency() {
        let mut builder = TransposerGraphBuilder::default();
        let storage = InventoryId::new(InventoryRole::Storage, 0);
        let input = InventoryId::new(InventoryRole::Input, 0);
        let output = InventoryId::new(InventoryRole::Output, 0);
        builder.add_inventory(
            meta(storage, 27),
            vec![Port {
                transposer: TransposerIndex(0),
                side: Side::Top,
            }],
        );
        builder.add_inventory(
            meta(input, 9),
            vec![Port {
                transposer: TransposerIndex(0),
                side: Side::Bottom,
            }],
        );
        builder.add_inventory(meta(output, 9), vec![]);
        let graph = builder.build().unwrap();
        assert_eq!(
            graph.shared_transposer(storage, input),
            Some(TransposerIndex(0))
        );
        assert_eq!(graph.shared_transposer(storage, output), None);
    }
}
