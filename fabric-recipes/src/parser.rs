//! Recipe-file loader (spec §6 "Persisted state — recipe files"):
//! whitespace-tolerant, line-oriented, `#`-comments, mirroring
//! `fabric_storage::config`'s hand-rolled grammar style.
//!
//! ```text
//! station furnace
//!   in = 1
//!   out = 1
//!   time = 200
//!   type = sequential
//! end
//!
//! furnace:
//! 4 minecraft:planks#0 "Planks" 64
//! with
//! 1 minecraft:log#0
//!
//! craft:
//! 4 minecraft:stick#0 "Stick" 64
//! with
//! minecraft:planks#0 1 minecraft:planks#0 4
//! ```

use fabric_storage::ItemKind;
use fabric_utils::ConfigFatal;

use crate::recipe::{Recipe, RecipeId, RecipeInputs, RecipeOutput, Station, StationKind};

/// One parsed recipe file: the station table plus every recipe, in
/// file order (the order [`crate::catalog::RecipeCatalog`] assigns
/// `RecipeId`s in).
pub struct ParsedFile {
    pub stations: Vec<Station>,
    pub recipes: Vec<Recipe>,
}

pub fn load(path: &str, text: &str) -> Result<ParsedFile, ConfigFatal> {
    let mut stations = Vec::new();
    let mut recipes = Vec::new();

    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let raw = lines[i];
        let line = strip_comment(raw);
        if line.is_empty() {
            i += 1;
            continue;
        }

        if let Some(name) = line.strip_prefix("station ") {
            let (station, next) = parse_station(path, name.trim(), &lines, i + 1)?;
            stations.push(station);
            i = next;
            continue;
        }

        if let Some(station_name) = line.strip_suffix(':') {
            let (recipe, next) = parse_recipe(path, station_name.trim(), recipes.len(), &lines, i + 1)?;
            recipes.push(recipe);
            i = next;
            continue;
        }

        return Err(malformed(path, i, format!("unexpected line '{line}'")));
    }

    Ok(ParsedFile { stations, recipes })
}

fn parse_station(
    path: &str,
    name: &str,
    lines: &[&str],
    start: usize,
) -> Result<(Station, usize), ConfigFatal> {
    let mut station = Station {
        name: name.to_string(),
        in_slots: 0,
        out_slots: 0,
        paths: Vec::new(),
        time_ticks: 0,
        kind: StationKind::Default,
    };

    let mut i = start;
    loop {
        if i >= lines.len() {
            return Err(malformed(path, start, format!("station '{name}' missing 'end'")));
        }
        let line = strip_comment(lines[i]);
        if line.is_empty() {
            i += 1;
            continue;
        }
        if line == "end" {
            return Ok((station, i + 1));
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| malformed(path, i, format!("malformed station field '{line}'")))?;
        let key = key.trim();
        let value = value.trim();
        match key {
            "in" => station.in_slots = parse_u32(path, i, value)?,
            "out" => station.out_slots = parse_u32(path, i, value)?,
            "time" => station.time_ticks = parse_u32(path, i, value)?,
            "type" => {
                station.kind = StationKind::parse(value)
                    .ok_or_else(|| malformed(path, i, format!("unknown station type '{value}'")))?;
            }
            other if other.starts_with("path") => station.paths.push(value.to_string()),
            other => return Err(ConfigFatal::UnknownStationOption(name.to_string(), other.to_string())),
        }
        i += 1;
    }
}

fn parse_recipe(
    path: &str,
    station_name: &str,
    index: usize,
    lines: &[&str],
    start: usize,
) -> Result<(Recipe, usize), ConfigFatal> {
    let mut outputs = Vec::new();
    let mut i = start;
    loop {
        if i >= lines.len() {
            return Err(malformed(path, start, "recipe ended before 'with'".into()));
        }
        let line = strip_comment(lines[i]);
        i += 1;
        if line.is_empty() {
            continue;
        }
        if line == "with" {
            break;
        }
        outputs.push(parse_output_line(path, i - 1, line)?);
    }
    if outputs.is_empty() {
        return Err(malformed(path, start, "recipe has no output lines".into()));
    }

    let is_craft = station_name == "craft";
    let mut processing_inputs = Vec::new();
    let mut workbench: [Option<ItemKind>; 9] = Default::default();

    while i < lines.len() {
        let line = strip_comment(lines[i]);
        if line.is_empty() {
            i += 1;
            break;
        }
        if is_craft {
            parse_craft_input_line(path, i, line, &mut workbench)?;
        } else {
            processing_inputs.push(parse_processing_input_line(path, i, line)?);
        }
        i += 1;
    }

    let inputs = if is_craft {
        RecipeInputs::Craft(Box::new(workbench))
    } else {
        RecipeInputs::Processing(processing_inputs)
    };

    Ok((
        Recipe {
            id: RecipeId(index),
            station: station_name.to_string(),
            outputs,
            inputs,
        },
        i,
    ))
}

fn parse_output_line(path: &str, line_no: usize, line: &str) -> Result<RecipeOutput, ConfigFatal> {
    let mut rest = line;
    let count = take_token(&mut rest)
        .ok_or_else(|| malformed(path, line_no, "expected output count".into()))?;
    let count: u32 = count
        .parse()
        .map_err(|_| malformed(path, line_no, "output count must be an integer".into()))?;
    let kind_token = take_token(&mut rest)
        .ok_or_else(|| malformed(path, line_no, "expected output item kind".into()))?;
    let kind = ItemKind::parse(kind_token)
        .ok_or_else(|| malformed(path, line_no, format!("malformed item kind '{kind_token}'")))?;
    let rest_trimmed = rest.trim_start();
    let label_end = rest_trimmed
        .strip_prefix('"')
        .and_then(|r| r.find('"'))
        .ok_or_else(|| malformed(path, line_no, "expected quoted output label".into()))?;
    let label = rest_trimmed[1..1 + label_end].to_string();
    let mut after_label = &rest_trimmed[2 + label_end..];
    let max_stack_token = take_token(&mut after_label)
        .ok_or_else(|| malformed(path, line_no, "expected output max stack size".into()))?;
    let max_stack: u32 = max_stack_token
        .parse()
        .map_err(|_| malformed(path, line_no, "max stack size must be an integer".into()))?;

    Ok(RecipeOutput {
        kind,
        count,
        label,
        max_stack,
    })
}

fn parse_processing_input_line(path: &str, line_no: usize, line: &str) -> Result<(ItemKind, u32), ConfigFatal> {
    let mut rest = line;
    let count = take_token(&mut rest)
        .ok_or_else(|| malformed(path, line_no, "expected input count".into()))?;
    let count: u32 = count
        .parse()
        .map_err(|_| malformed(path, line_no, "input count must be an integer".into()))?;
    let kind_token = take_token(&mut rest)
        .ok_or_else(|| malformed(path, line_no, "expected input item kind".into()))?;
    let kind = ItemKind::parse(kind_token)
        .ok_or_else(|| malformed(path, line_no, format!("malformed item kind '{kind_token}'")))?;
    Ok((kind, count))
}

fn parse_craft_input_line(
    path: &str,
    line_no: usize,
    line: &str,
    workbench: &mut [Option<ItemKind>; 9],
) -> Result<(), ConfigFatal> {
    let mut rest = line;
    loop {
        let Some(kind_token) = take_token(&mut rest) else { break };
        let kind = ItemKind::parse(kind_token)
            .ok_or_else(|| malformed(path, line_no, format!("malformed item kind '{kind_token}'")))?;
        let slot_token = take_token(&mut rest)
            .ok_or_else(|| malformed(path, line_no, "expected workbench slot index after item kind".into()))?;
        let slot: usize = slot_token
            .parse()
            .map_err(|_| malformed(path, line_no, "workbench slot must be an integer".into()))?;
        if slot == 0 || slot > 9 {
            return Err(malformed(path, line_no, format!("workbench slot {slot} out of range 1..=9")));
        }
        workbench[slot - 1] = Some(kind);
    }
    Ok(())
}

fn take_token<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let trimmed = rest.trim_start();
    if trimmed.is_empty() {
        *rest = trimmed;
        return None;
    }
    let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let (token, remainder) = trimmed.split_at(end);
    *rest = remainder;
    Some(token)
}

fn strip_comment(raw: &str) -> &str {
    raw.split('#').next().unwrap_or("").trim()
}

fn parse_u32(path: &str, line_no: usize, value: &str) -> Result<u32, ConfigFatal> {
    value
        .parse()
        .map_err(|_| malformed(path, line_no, format!("expected an integer, got '{value}'")))
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
# station table
station furnace
  in = 1
  out = 1
  time = 200
  type = sequential
end

furnace:
4 minecraft:planks#0 "Planks" 64
with
1 minecraft:log#0

craft:
4 minecraft:stick#0 "Stick" 64
with
minecraft:planks#0 1 minecraft:planks#0 4
"#;

    #[test]
    fn parses_station_and_both_recipe_kinds() {
        let parsed = load("recipes.cfg", SAMPLE).unwrap();
        assert_eq!(parsed.stations.len(), 1);
        let furnace = &parsed.stations[0];
        assert_eq!(furnace.name, "furnace");
        assert_eq!(furnace.time_ticks, 200);
        assert!(matches!(furnace.kind, StationKind::Sequential));

        assert_eq!(parsed.recipes.len(), 2);
        let planks = &parsed.recipes[0];
        assert_eq!(planks.station, "furnace");
        assert_eq!(planks.primary_output().count, 4);
        assert_eq!(planks.primary_output().label, "Planks");
        match &planks.inputs {
            RecipeInputs::Processing(items) => {
                assert_eq!(items, &vec![(ItemKind::parse("minecraft:log#0").unwrap(), 1)]);
            }
            RecipeInputs::Craft(_) => panic!("expected processing inputs"),
        }

        let stick = &parsed.recipes[1];
        assert_eq!(stick.station, "craft");
        match &stick.inputs {
            RecipeInputs::Craft(grid) => {
                assert_eq!(grid[0], Some(ItemKind::parse("minecraft:planks#0").unwrap()));
                assert_eq!(grid[3], Some(ItemKind::parse("minecraft:planks#0").unwrap()));
                assert_eq!(grid[1], None);
            }
            RecipeInputs::Processing(_) => panic!("expected craft workbench inputs"),
        }
    }

    #[test]
    fn unknown_station_type_is_fatal() {
        let text = "station s\n  type = exotic\nend\n";
        let result = load("recipes.cfg", text);
        assert!(matches!(result, Err(ConfigFatal::Malformed { .. })));
    }
}
