//! The radio-bus packet set (spec §6 table): one `Message` variant per
//! row, a flat text grammar (`;` separates records, `,` separates a
//! record's fields), `serde`-free hand-rolled `encode`/`decode` (spec
//! §9 "tagged dispatch, one handler per variant" redesign flag).

use fabric_storage::{DiffEntry, ItemKind, RequestStatus};
use fabric_utils::{TaskId, TicketId};

use crate::errors::ReadingError;

/// One `stor_item_list` / `craft_recipe_list` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemListing {
    pub kind: ItemKind,
    pub max_stack_size: u32,
    pub label: String,
    pub available: u32,
}

/// One `stor_drone_item_list` slot entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroneSlotListing {
    pub drone_index: u32,
    pub slot: u32,
    pub kind: ItemKind,
    pub count: u32,
    pub max_stack_size: u32,
}

/// `craft_recipe_list`'s entry: no availability field, unlike
/// [`ItemListing`] — what the Crafting Server offers to craft, not
/// what is currently on hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeListing {
    pub kind: ItemKind,
    pub max_stack_size: u32,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DroneOp {
    Insert,
    Extract,
}

/// `craft_recipe_confirm`'s per-kind preview line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeProgress {
    pub kind: ItemKind,
    pub required: u32,
    pub produced: u32,
    pub have: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    StorDiscover,
    StorItemList(Vec<ItemListing>),
    StorItemDiff(Vec<DiffEntry>),
    StorInsert,
    StorExtract { kind: Option<ItemKind>, amount: Option<u32> },
    StorRecipeReserve { ticket: TicketId, required_items: Vec<(ItemKind, u32)> },
    StorRecipeStart { ticket: TicketId },
    StorRecipeCancel { ticket: TicketId },
    StorGetDroneItemList,
    StorDroneItemList(Vec<DroneSlotListing>),
    StorDroneInsert { drone_index: u32, ticket: Option<TicketId> },
    StorDroneExtract {
        drone_index: u32,
        ticket: Option<TicketId>,
        extract: Vec<(ItemKind, u32)>,
        supply_indices: Vec<(u32, bool)>,
    },
    StorDroneItemDiff { op: DroneOp, result: RequestStatus, diff: Vec<DiffEntry> },
    StorStarted,

    CraftDiscover,
    CraftRecipeList(Vec<RecipeListing>),
    CraftCheckRecipe { kind: ItemKind, amount: u32 },
    CraftRecipeConfirm { ticket: Option<TicketId>, progress: Vec<RecipeProgress> },
    CraftRecipeError { stage: String, message: String },
    CraftRecipeStart { ticket: TicketId },
    CraftRecipeCancel { ticket: TicketId },
    CraftStarted,

    RobotPrepareCraft { ticket: TicketId, task: TaskId, staging_index: u32, recipe_index: usize, batches: u32 },
    RobotStartCraft { ticket: TicketId, task: TaskId },
    RobotFinishedCraft { ticket: TicketId, task: TaskId },
    RobotError { kind: String, message: String },
    RobotHalt,
    RobotUploadFirmware { payload: Vec<u8> },
}

fn join_fields(fields: &[String]) -> String {
    fields.join(",")
}

fn opt_u32(v: Option<u32>) -> String {
    v.map_or_else(|| "_".to_string(), |v| v.to_string())
}

fn parse_opt_u32(s: &str) -> Result<Option<u32>, ReadingError> {
    if s == "_" {
        return Ok(None);
    }
    s.parse().map(Some).map_err(|_| ReadingError::Malformed(format!("not a u32: {s}")))
}

fn opt_ticket(t: Option<TicketId>) -> String {
    t.map_or_else(|| "_".to_string(), |t| t.0.to_string())
}

fn parse_opt_ticket(s: &str) -> Result<Option<TicketId>, ReadingError> {
    if s == "_" {
        return Ok(None);
    }
    s.parse().map(TicketId).map(Some).map_err(|_| ReadingError::Malformed(format!("not a ticket id: {s}")))
}

fn parse_u32(s: &str) -> Result<u32, ReadingError> {
    s.parse().map_err(|_| ReadingError::Malformed(format!("not a u32: {s}")))
}

fn parse_kind(s: &str) -> Result<ItemKind, ReadingError> {
    ItemKind::parse(s).ok_or_else(|| ReadingError::Malformed(format!("not an item kind: {s}")))
}

fn parse_result(s: &str) -> Result<RequestStatus, ReadingError> {
    Ok(match s {
        "ok" => RequestStatus::Ok,
        "missing" => RequestStatus::Missing,
        "full" => RequestStatus::Full,
        _ => return Err(ReadingError::Malformed(format!("not a result status: {s}"))),
    })
}

fn result_str(r: RequestStatus) -> &'static str {
    match r {
        RequestStatus::Ok => "ok",
        RequestStatus::Missing => "missing",
        RequestStatus::Full => "full",
    }
}

fn encode_diff_record(entry: &DiffEntry) -> String {
    match entry {
        DiffEntry::Updated { kind, available, max_stack_size, label } => {
            format!("{},{available},{max_stack_size},{label}", kind.canonical_key())
        }
        DiffEntry::Removed { kind } => format!("{},0", kind.canonical_key()),
    }
}

fn decode_diff_record(s: &str) -> Result<DiffEntry, ReadingError> {
    let parts: Vec<&str> = s.split(',').collect();
    let kind = parts.first().ok_or_else(|| ReadingError::Malformed("empty diff record".into())).and_then(|k| parse_kind(k))?;
    match parts.len() {
        2 if parts[1] == "0" => Ok(DiffEntry::Removed { kind }),
        4 => Ok(DiffEntry::Updated {
            kind,
            available: parse_u32(parts[1])?,
            max_stack_size: parse_u32(parts[2])?,
            label: parts[3].to_string(),
        }),
        _ => Err(ReadingError::Malformed(format!("malformed diff record: {s}"))),
    }
}

impl Message {
    /// Serializes to the flat text grammar: `tag` alone for a
    /// no-body message, `tag;record1;record2;...` otherwise (a
    /// scalar-field message is just one record).
    #[must_use]
    pub fn encode(&self) -> String {
        let (tag, records): (&str, Vec<String>) = match self {
            Self::StorDiscover => ("stor_discover", vec![]),
            Self::StorItemList(items) => (
                "stor_item_list",
                items
                    .iter()
                    .map(|i| format!("{},{},{},{}", i.kind.canonical_key(), i.max_stack_size, i.label, i.available))
                    .collect(),
            ),
            Self::StorItemDiff(diff) => ("stor_item_diff", diff.iter().map(encode_diff_record).collect()),
            Self::StorInsert => ("stor_insert", vec![]),
            Self::StorExtract { kind, amount } => (
                "stor_extract",
                vec![join_fields(&[
                    kind.as_ref().map_or_else(|| "_".to_string(), ItemKind::canonical_key),
                    opt_u32(*amount),
                ])],
            ),
            Self::StorRecipeReserve { ticket, required_items } => (
                "stor_recipe_reserve",
                std::iter::once(ticket.0.to_string())
                    .chain(required_items.iter().map(|(k, n)| format!("{},{n}", k.canonical_key())))
                    .collect(),
            ),
            Self::StorRecipeStart { ticket } => ("stor_recipe_start", vec![ticket.0.to_string()]),
            Self::StorRecipeCancel { ticket } => ("stor_recipe_cancel", vec![ticket.0.to_string()]),
            Self::StorGetDroneItemList => ("stor_get_drone_item_list", vec![]),
            Self::StorDroneItemList(slots) => (
                "stor_drone_item_list",
                slots
                    .iter()
                    .map(|s| format!("{},{},{},{},{}", s.drone_index, s.slot, s.kind.canonical_key(), s.count, s.max_stack_size))
                    .collect(),
            ),
            Self::StorDroneInsert { drone_index, ticket } => (
                "stor_drone_insert",
                vec![join_fields(&[drone_index.to_string(), opt_ticket(*ticket)])],
            ),
            Self::StorDroneExtract { drone_index, ticket, extract, supply_indices } => (
                "stor_drone_extract",
                std::iter::once(join_fields(&[drone_index.to_string(), opt_ticket(*ticket)]))
                    .chain(extract.iter().map(|(k, n)| format!("{},{n}", k.canonical_key())))
                    .chain(supply_indices.iter().map(|(i, dirty)| format!("{i},{}", u8::from(*dirty))))
                    .collect(),
            ),
            Self::StorDroneItemDiff { op, result, diff } => (
                "stor_drone_item_diff",
                std::iter::once(join_fields(&[
                    match op {
                        DroneOp::Insert => "insert".to_string(),
                        DroneOp::Extract => "extract".to_string(),
                    },
                    result_str(*result).to_string(),
                ]))
                .chain(diff.iter().map(encode_diff_record))
                .collect(),
            ),
            Self::StorStarted => ("stor_started", vec![]),

            Self::CraftDiscover => ("craft_discover", vec![]),
            Self::CraftRecipeList(items) => (
                "craft_recipe_list",
                items.iter().map(|i| format!("{},{},{}", i.kind.canonical_key(), i.max_stack_size, i.label)).collect(),
            ),
            Self::CraftCheckRecipe { kind, amount } => ("craft_check_recipe", vec![format!("{},{amount}", kind.canonical_key())]),
            Self::CraftRecipeConfirm { ticket, progress } => (
                "craft_recipe_confirm",
                std::iter::once(opt_ticket(*ticket))
                    .chain(progress.iter().map(|p| format!("{},{},{},{}", p.kind.canonical_key(), p.required, p.produced, p.have)))
                    .collect(),
            ),
            Self::CraftRecipeError { stage, message } => ("craft_recipe_error", vec![join_fields(&[stage.clone(), message.clone()])]),
            Self::CraftRecipeStart { ticket } => ("craft_recipe_start", vec![ticket.0.to_string()]),
            Self::CraftRecipeCancel { ticket } => ("craft_recipe_cancel", vec![ticket.0.to_string()]),
            Self::CraftStarted => ("craft_started", vec![]),

            Self::RobotPrepareCraft { ticket, task, staging_index, recipe_index, batches } => (
                "robot_prepare_craft",
                vec![join_fields(&[
                    ticket.0.to_string(),
                    task.0.to_string(),
                    staging_index.to_string(),
                    recipe_index.to_string(),
                    batches.to_string(),
                ])],
            ),
            Self::RobotStartCraft { ticket, task } => {
                ("robot_start_craft", vec![join_fields(&[ticket.0.to_string(), task.0.to_string()])])
            }
            Self::RobotFinishedCraft { ticket, task } => {
                ("robot_finished_craft", vec![join_fields(&[ticket.0.to_string(), task.0.to_string()])])
            }
            Self::RobotError { kind, message } => ("robot_error", vec![join_fields(&[kind.clone(), message.clone()])]),
            Self::RobotHalt => ("robot_halt", vec![]),
            Self::RobotUploadFirmware { payload } => ("robot_upload_firmware", vec![hex_encode(payload)]),
        };

        if records.is_empty() {
            tag.to_string()
        } else {
            format!("{tag};{}", records.join(";"))
        }
    }

    /// Parses a frame produced by [`Self::encode`].
    pub fn decode(frame: &str) -> Result<Self, ReadingError> {
        let mut parts = frame.split(';');
        let tag = parts.next().ok_or_else(|| ReadingError::Malformed("empty frame".into()))?;
        let records: Vec<&str> = parts.collect();

        match tag {
            "stor_discover" => Ok(Self::StorDiscover),
            "stor_item_list" => {
                let mut items = Vec::with_capacity(records.len());
                for r in records {
                    let f: Vec<&str> = r.split(',').collect();
                    if f.len() != 4 {
                        return Err(ReadingError::Malformed(format!("bad stor_item_list record: {r}")));
                    }
                    items.push(ItemListing {
                        kind: parse_kind(f[0])?,
                        max_stack_size: parse_u32(f[1])?,
                        label: f[2].to_string(),
                        available: parse_u32(f[3])?,
                    });
                }
                Ok(Self::StorItemList(items))
            }
            "stor_item_diff" => {
                let diff = records.iter().map(|r| decode_diff_record(r)).collect::<Result<Vec<_>, _>>()?;
                Ok(Self::StorItemDiff(diff))
            }
            "stor_insert" => Ok(Self::StorInsert),
            "stor_extract" => {
                let r = records.first().ok_or_else(|| ReadingError::Malformed("stor_extract missing body".into()))?;
                let f: Vec<&str> = r.split(',').collect();
                if f.len() != 2 {
                    return Err(ReadingError::Malformed(format!("bad stor_extract body: {r}")));
                }
                let kind = if f[0] == "_" { None } else { Some(parse_kind(f[0])?) };
                Ok(Self::StorExtract { kind, amount: parse_opt_u32(f[1])? })
            }
            "stor_recipe_reserve" => {
                let (ticket_str, rest) = records.split_first().ok_or_else(|| ReadingError::Malformed("stor_recipe_reserve missing ticket".into()))?;
                let ticket = TicketId(parse_u32(ticket_str)? as u64);
                let mut required_items = Vec::with_capacity(rest.len());
                for r in rest {
                    let f: Vec<&str> = r.split(',').collect();
                    if f.len() != 2 {
                        return Err(ReadingError::Malformed(format!("bad required-item record: {r}")));
                    }
                    required_items.push((parse_kind(f[0])?, parse_u32(f[1])?));
                }
                Ok(Self::StorRecipeReserve { ticket, required_items })
            }
            "stor_recipe_start" => Ok(Self::StorRecipeStart { ticket: parse_ticket_only(&records)? }),
            "stor_recipe_cancel" => Ok(Self::StorRecipeCancel { ticket: parse_ticket_only(&records)? }),
            "stor_get_drone_item_list" => Ok(Self::StorGetDroneItemList),
            "stor_drone_item_list" => {
                let mut slots = Vec::with_capacity(records.len());
                for r in records {
                    let f: Vec<&str> = r.split(',').collect();
                    if f.len() != 5 {
                        return Err(ReadingError::Malformed(format!("bad drone slot record: {r}")));
                    }
                    slots.push(DroneSlotListing {
                        drone_index: parse_u32(f[0])?,
                        slot: parse_u32(f[1])?,
                        kind: parse_kind(f[2])?,
                        count: parse_u32(f[3])?,
                        max_stack_size: parse_u32(f[4])?,
                    });
                }
                Ok(Self::StorDroneItemList(slots))
            }
            "stor_drone_insert" => {
                let r = records.first().ok_or_else(|| ReadingError::Malformed("stor_drone_insert missing body".into()))?;
                let f: Vec<&str> = r.split(',').collect();
                if f.len() != 2 {
                    return Err(ReadingError::Malformed(format!("bad stor_drone_insert body: {r}")));
                }
                Ok(Self::StorDroneInsert { drone_index: parse_u32(f[0])?, ticket: parse_opt_ticket(f[1])? })
            }
            "stor_drone_extract" => {
                let (head, rest) = records.split_first().ok_or_else(|| ReadingError::Malformed("stor_drone_extract missing body".into()))?;
                let hf: Vec<&str> = head.split(',').collect();
                if hf.len() != 2 {
                    return Err(ReadingError::Malformed(format!("bad stor_drone_extract head: {head}")));
                }
                let drone_index = parse_u32(hf[0])?;
                let ticket = parse_opt_ticket(hf[1])?;
                let mut extract = Vec::new();
                let mut supply_indices = Vec::new();
                for r in rest {
                    let f: Vec<&str> = r.split(',').collect();
                    if f.len() != 2 {
                        return Err(ReadingError::Malformed(format!("bad stor_drone_extract record: {r}")));
                    }
                    match ItemKind::parse(f[0]) {
                        Some(kind) => extract.push((kind, parse_u32(f[1])?)),
                        None => supply_indices.push((parse_u32(f[0])?, f[1] != "0")),
                    }
                }
                Ok(Self::StorDroneExtract { drone_index, ticket, extract, supply_indices })
            }
            "stor_drone_item_diff" => {
                let (head, rest) = records.split_first().ok_or_else(|| ReadingError::Malformed("stor_drone_item_diff missing head".into()))?;
                let hf: Vec<&str> = head.split(',').collect();
                if hf.len() != 2 {
                    return Err(ReadingError::Malformed(format!("bad stor_drone_item_diff head: {head}")));
                }
                let op = match hf[0] {
                    "insert" => DroneOp::Insert,
                    "extract" => DroneOp::Extract,
                    _ => return Err(ReadingError::Malformed(format!("bad drone op: {}", hf[0]))),
                };
                let result = parse_result(hf[1])?;
                let diff = rest.iter().map(|r| decode_diff_record(r)).collect::<Result<Vec<_>, _>>()?;
                Ok(Self::StorDroneItemDiff { op, result, diff })
            }
            "stor_started" => Ok(Self::StorStarted),

            "craft_discover" => Ok(Self::CraftDiscover),
            "craft_recipe_list" => {
                let mut items = Vec::with_capacity(records.len());
                for r in records {
                    let f: Vec<&str> = r.split(',').collect();
                    if f.len() != 3 {
                        return Err(ReadingError::Malformed(format!("bad craft_recipe_list record: {r}")));
                    }
                    items.push(RecipeListing {
                        kind: parse_kind(f[0])?,
                        max_stack_size: parse_u32(f[1])?,
                        label: f[2].to_string(),
                    });
                }
                Ok(Self::CraftRecipeList(items))
            }
            "craft_check_recipe" => {
                let r = records.first().ok_or_else(|| ReadingError::Malformed("craft_check_recipe missing body".into()))?;
                let f: Vec<&str> = r.split(',').collect();
                if f.len() != 2 {
                    return Err(ReadingError::Malformed(format!("bad craft_check_recipe body: {r}")));
                }
                Ok(Self::CraftCheckRecipe { kind: parse_kind(f[0])?, amount: parse_u32(f[1])? })
            }
            "craft_recipe_confirm" => {
                let (ticket_str, rest) = records.split_first().ok_or_else(|| ReadingError::Malformed("craft_recipe_confirm missing ticket".into()))?;
                let ticket = parse_opt_ticket(ticket_str)?;
                let mut progress = Vec::with_capacity(rest.len());
                for r in rest {
                    let f: Vec<&str> = r.split(',').collect();
                    if f.len() != 4 {
                        return Err(ReadingError::Malformed(format!("bad progress record: {r}")));
                    }
                    progress.push(RecipeProgress {
                        kind: parse_kind(f[0])?,
                        required: parse_u32(f[1])?,
                        produced: parse_u32(f[2])?,
                        have: parse_u32(f[3])?,
                    });
                }
                Ok(Self::CraftRecipeConfirm { ticket, progress })
            }
            "craft_recipe_error" => {
                let r = records.first().ok_or_else(|| ReadingError::Malformed("craft_recipe_error missing body".into()))?;
                let (stage, message) = r.split_once(',').ok_or_else(|| ReadingError::Malformed(format!("bad craft_recipe_error body: {r}")))?;
                Ok(Self::CraftRecipeError { stage: stage.to_string(), message: message.to_string() })
            }
            "craft_recipe_start" => Ok(Self::CraftRecipeStart { ticket: parse_ticket_only(&records)? }),
            "craft_recipe_cancel" => Ok(Self::CraftRecipeCancel { ticket: parse_ticket_only(&records)? }),
            "craft_started" => Ok(Self::CraftStarted),

            "robot_prepare_craft" => {
                let r = records.first().ok_or_else(|| ReadingError::Malformed("robot_prepare_craft missing body".into()))?;
                let f: Vec<&str> = r.split(',').collect();
                if f.len() != 5 {
                    return Err(ReadingError::Malformed(format!("bad robot_prepare_craft body: {r}")));
                }
                Ok(Self::RobotPrepareCraft {
                    ticket: TicketId(parse_u32(f[0])? as u64),
                    task: TaskId(parse_u32(f[1])? as u64),
                    staging_index: parse_u32(f[2])?,
                    recipe_index: parse_u32(f[3])? as usize,
                    batches: parse_u32(f[4])?,
                })
            }
            "robot_start_craft" => {
                let (ticket, task) = parse_ticket_task(&records)?;
                Ok(Self::RobotStartCraft { ticket, task })
            }
            "robot_finished_craft" => {
                let (ticket, task) = parse_ticket_task(&records)?;
                Ok(Self::RobotFinishedCraft { ticket, task })
            }
            "robot_error" => {
                let r = records.first().ok_or_else(|| ReadingError::Malformed("robot_error missing body".into()))?;
                let (kind, message) = r.split_once(',').ok_or_else(|| ReadingError::Malformed(format!("bad robot_error body: {r}")))?;
                Ok(Self::RobotError { kind: kind.to_string(), message: message.to_string() })
            }
            "robot_halt" => Ok(Self::RobotHalt),
            "robot_upload_firmware" => {
                let r = records.first().ok_or_else(|| ReadingError::Malformed("robot_upload_firmware missing body".into()))?;
                Ok(Self::RobotUploadFirmware { payload: hex_decode(r)? })
            }
            other => Err(ReadingError::UnknownTag(other.to_string())),
        }
    }
}

fn parse_ticket_only(records: &[&str]) -> Result<TicketId, ReadingError> {
    let r = records.first().ok_or_else(|| ReadingError::Malformed("missing ticket".into()))?;
    Ok(TicketId(parse_u32(r)? as u64))
}

fn parse_ticket_task(records: &[&str]) -> Result<(TicketId, TaskId), ReadingError> {
    let r = records.first().ok_or_else(|| ReadingError::Malformed("missing ticket/task".into()))?;
    let f: Vec<&str> = r.split(',').collect();
    if f.len() != 2 {
        return Err(ReadingError::Malformed(format!("bad ticket/task body: {r}")));
    }
    Ok((TicketId(parse_u32(f[0])? as u64), TaskId(parse_u32(f[1])? as u64)))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ReadingError> {
    if s.len() % 2 != 0 {
        return Err(ReadingError::Malformed("odd-length hex payload".into()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ReadingError::Malformed(format!("bad hex byte at {i}"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind() -> ItemKind {
        ItemKind::new("minecraft", "torch", 0, false, None)
    }

    #[test]
    fn no_body_messages_round_trip() {
        for msg in [Message::StorDiscover, Message::StorStarted, Message::CraftStarted, Message::RobotHalt] {
            let encoded = msg.encode();
            assert_eq!(Message::decode(&encoded).unwrap(), msg);
        }
    }

    #[test]
    fn item_list_round_trips() {
        let msg = Message::StorItemList(vec![ItemListing {
            kind: kind(),
            max_stack_size: 64,
            label: "Torch".into(),
            available: 12,
        }]);
        let encoded = msg.encode();
        assert_eq!(Message::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn stor_extract_handles_omitted_kind_and_amount() {
        let msg = Message::StorExtract { kind: None, amount: None };
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
        let msg = Message::StorExtract { kind: Some(kind()), amount: Some(4) };
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn recipe_reserve_carries_a_required_items_list() {
        let msg = Message::StorRecipeReserve {
            ticket: TicketId(7),
            required_items: vec![(kind(), 16), (ItemKind::new("minecraft", "stick", 0, false, None), 4)],
        };
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn unknown_tag_is_a_reading_error() {
        assert!(Message::decode("not_a_real_tag").is_err());
    }

    #[test]
    fn firmware_payload_round_trips_through_hex() {
        let msg = Message::RobotUploadFirmware { payload: vec![0x00, 0xab, 0xff] };
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }
}
