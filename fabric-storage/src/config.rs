//! Loader for the persisted routing-config text format (spec §6
//! "Persisted state — routing config"): comment lines start with `#`,
//! sections in order `transposers:`, `storage:`, `input:`, `output:`,
//! `transfer:`, `drone:`. Priority within `storage:`/`drone:` follows
//! file order.
//!
//! The distilled grammar only names `connections`; it says nothing
//! about where an inventory's slot count comes from, because in the
//! original system that's read off the live hardware. This loader
//! carries an ambient `slots`/`capacity` clause per inventory line so
//! the same text format is self-contained for a simulated fabric.

use std::collections::HashSet;

use fabric_utils::ConfigFatal;

use crate::topology::{
    InventoryId, InventoryMeta, InventoryRole, Port, Side, TransposerGraph, TransposerGraphBuilder,
    TransposerIndex,
};

const DEFAULT_SLOT_COUNT: usize = 27;

/// Parses the routing-config text into a frozen [`TransposerGraph`].
pub fn load(path: &str, text: &str) -> Result<TransposerGraph, ConfigFatal> {
    let mut transposers: HashSet<u32> = HashSet::new();
    let mut builder = TransposerGraphBuilder::default();
    let mut section: Option<InventoryRole> = None;
    let mut role_counters = [0u32; 5];

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if let Some(section_name) = line.strip_suffix(':') {
            section = Some(match section_name {
                "transposers" => {
                    section = None;
                    continue;
                }
                "storage" => InventoryRole::Storage,
                "input" => InventoryRole::Input,
                "output" => InventoryRole::Output,
                "transfer" => InventoryRole::Transfer,
                "drone" => InventoryRole::Drone,
                other => {
                    return Err(malformed(path, line_no, format!("unknown section '{other}'")))
                }
            });
            continue;
        }

        if section.is_none() {
            // Inside `transposers:`, expect `<index> = <uuid>`.
            let (idx_str, _uuid) = line
                .split_once('=')
                .ok_or_else(|| malformed(path, line_no, "expected '<index> = <uuid>'".into()))?;
            let idx: u32 = idx_str
                .trim()
                .parse()
                .map_err(|_| malformed(path, line_no, "transposer index must be an integer".into()))?;
            transposers.insert(idx);
            continue;
        }

        let role = section.expect("checked above");
        let (display, rest) = parse_display(line)
            .ok_or_else(|| malformed(path, line_no, "expected '\"<display>\"; connections = ...'".into()))?;

        let mut slots = DEFAULT_SLOT_COUNT;
        let mut capacity_overrides: Vec<(usize, u32)> = Vec::new();
        let mut connections: Vec<Port> = Vec::new();

        for clause in rest.split(';') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let (key, value) = clause
                .split_once('=')
                .ok_or_else(|| malformed(path, line_no, format!("malformed clause '{clause}'")))?;
            match key.trim() {
                "connections" => {
                    for token in value.split(',') {
                        let token = token.trim();
                        if token.is_empty() {
                            continue;
                        }
                        let (idx_str, side_str) = token.split_once(':').ok_or_else(|| {
                            malformed(path, line_no, format!("malformed port '{token}'"))
                        })?;
                        let idx: u32 = idx_str.trim().parse().map_err(|_| {
                            malformed(path, line_no, format!("bad transposer index '{idx_str}'"))
                        })?;
                        if !transposers.contains(&idx) {
                            return Err(ConfigFatal::UnknownTransposer(idx));
                        }
                        let side = Side::parse(side_str.trim()).ok_or_else(|| {
                            malformed(path, line_no, format!("unknown side '{side_str}'"))
                        })?;
                        connections.push(Port {
                            transposer: TransposerIndex(idx),
                            side,
                        });
                    }
                }
                "slots" => {
                    slots = value
                        .trim()
                        .parse()
                        .map_err(|_| malformed(path, line_no, "slots must be an integer".into()))?;
                }
                "capacity" => {
                    for token in value.split(',') {
                        let token = token.trim();
                        if token.is_empty() {
                            continue;
                        }
                        let (slot_str, cap_str) = token.split_once(':').ok_or_else(|| {
                            malformed(path, line_no, format!("malformed capacity override '{token}'"))
                        })?;
                        let slot: usize = slot_str.trim().parse().map_err(|_| {
                            malformed(path, line_no, "capacity slot index must be an integer".into())
                        })?;
                        let cap: u32 = cap_str.trim().parse().map_err(|_| {
                            malformed(path, line_no, "capacity value must be an integer".into())
                        })?;
                        capacity_overrides.push((slot, cap));
                    }
                }
                other => {
                    return Err(ConfigFatal::UnknownStationOption(
                        other.to_string(),
                        path.to_string(),
                    ))
                }
            }
        }

        let mut slot_capacity = vec![None; slots];
        for (slot, cap) in capacity_overrides {
            if let Some(entry) = slot_capacity.get_mut(slot) {
                *entry = Some(cap);
            }
        }

        let index = role_counters[role as usize];
        role_counters[role as usize] += 1;
        let id = InventoryId::new(role, index);
        builder.add_inventory(
            InventoryMeta {
                id,
                display: display.to_string(),
                slot_count: slots,
                slot_capacity,
            },
            connections,
        );
    }

    builder.build()
}

fn parse_display(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('"')?;
    let end = rest.find('"')?;
    let (display, tail) = rest.split_at(end);
    let tail = tail[1..].trim_start();
    let tail = tail.strip_prefix(';').unwrap_or(tail);
    Some((display, tail))
}

fn malformed(path: &str, line_no: usize, reason: String) -> ConfigFatal {
    ConfigFatal::Malformed {
        path: path.to_string(),
        reason: format!("line {}: {reason}", line_no + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# sample routing config
transposers:
0 = 123e4567-e89b-12d3-a456-426614174000
1 = 223e4567-e89b-12d3-a456-426614174001

storage:
"Main Storage"; slots = 27; connections = 0:top
"Overflow"; connections = 1:bottom

input:
"Input Chest"; connections = 0:bottom

output:
"Output Chest"; connections = 1:top

transfer:
"Relay"; connections = 0:east,1:west
"#;

    #[test]
    fn loads_sample_routing_config_with_priority_order() {
        let graph = load("routing.cfg", SAMPLE).unwrap();
        assert_eq!(graph.storage_order.len(), 2);
        assert_eq!(graph.storage_order[0], InventoryId::new(InventoryRole::Storage, 0));
        assert_eq!(graph.storage_order[1], InventoryId::new(InventoryRole::Storage, 1));
        assert_eq!(graph.meta(graph.storage_order[0]).unwrap().display, "Main Storage");
        assert_eq!(graph.meta(graph.storage_order[0]).unwrap().slot_count, 27);
    }

    #[test]
    fn unknown_transposer_reference_is_fatal() {
        let text = "transposers:\n0 = u\n\nstorage:\n\"S\"; connections = 9:top\n\ninput:\n\"I\"; connections = 0:top\n\noutput:\n\"O\"; connections = 0:bottom\n";
        let result = load("routing.cfg", text);
        assert!(matches!(result, Err(ConfigFatal::UnknownTransposer(9))));
    }

    #[test]
    fn missing_required_role_is_fatal() {
        let text = "transposers:\n0 = u\n\nstorage:\n\"S\"; connections = 0:top\n";
        let result = load("routing.cfg", text);
        assert!(matches!(result, Err(ConfigFatal::MissingRole { role: "input" })));
    }
}
