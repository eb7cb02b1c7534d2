//! Worker connectivity config (spec §6 "Persisted state — worker
//! connectivity config"): `droneInventoryIndex -> map(workerAddress ->
//! sideSeenByWorker)`. Parsed into registrations for the [`WorkerPool`]
//! and into the drone index list the [`StagingAllocator`] scans,
//! mirroring `fabric_storage::config`'s line-oriented, `#`-comment
//! grammar style rather than growing a JSON/json5 schema for it.
//!
//! ```text
//! 0: 127.0.0.1:4827=2, 127.0.0.1:4828=4
//! 1: 127.0.0.1:4829=0
//! ```
//!
//! `sideSeenByWorker` is carried through only as far as confirming the
//! line parses; this crate has no notion of redstone sides beyond
//! that, matching `WorkerPool::register`'s adjacency-only contract.

use fabric_storage::{InventoryId, InventoryRole};
use fabric_utils::ConfigFatal;
use rustc_hash::FxHashMap;

use fabric_crafting::{WorkerAddr, WorkerPool};

pub struct WorkerConnections {
    pub drones: Vec<InventoryId>,
    pub pool: WorkerPool,
}

pub fn load(path: &str, text: &str) -> Result<WorkerConnections, ConfigFatal> {
    let mut adjacency: FxHashMap<WorkerAddr, Vec<InventoryId>> = FxHashMap::default();
    let mut drones = Vec::new();

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let (index_str, rest) = line.split_once(':').ok_or_else(|| malformed(path, line_no, "expected 'droneIndex: worker=side, ...'"))?;
        let drone_index: u32 = index_str.trim().parse().map_err(|_| malformed(path, line_no, "drone index must be an integer"))?;
        let inv = InventoryId::new(InventoryRole::Drone, drone_index);
        drones.push(inv);

        for entry in rest.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (addr, side) = entry.split_once('=').ok_or_else(|| malformed(path, line_no, "expected 'workerAddress=side'"))?;
            side.trim().parse::<u32>().map_err(|_| malformed(path, line_no, "side must be an integer"))?;
            adjacency.entry(WorkerAddr(addr.trim().to_string())).or_default().push(inv);
        }
    }

    let mut pool = WorkerPool::new();
    for (addr, invs) in adjacency {
        pool.register(addr, invs);
    }

    Ok(WorkerConnections { drones, pool })
}

fn malformed(path: &str, line_no: usize, reason: &str) -> ConfigFatal {
    ConfigFatal::Malformed { path: path.to_string(), reason: format!("line {}: {reason}", line_no + 1) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_drone_indices_and_worker_adjacency() {
        let text = "0: 127.0.0.1:1=2, 127.0.0.1:2=4\n1: 127.0.0.1:3=0\n";
        let conn = load("worker_conn.cfg", text).unwrap();
        assert_eq!(conn.drones.len(), 2);
        assert_eq!(
            conn.pool.free_workers_adjacent_to(InventoryId::new(InventoryRole::Drone, 0)).len(),
            2
        );
    }

    #[test]
    fn rejects_a_line_with_no_colon() {
        assert!(load("worker_conn.cfg", "not a valid line\n").is_err());
    }
}
