//! Station and recipe types (spec §2 RC, §6 recipe file format).

use fabric_storage::ItemKind;

/// Index of a recipe within a loaded [`crate::catalog::RecipeCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipeId(pub usize);

/// Recognized `type` values for a processing station (§9 "Configuration
/// via free-form file → enumerated schema" redesign flag: unknown
/// values are parse errors, not ignored).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationKind {
    Default,
    Sequential,
    Bulk,
}

impl StationKind {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "default" => Self::Default,
            "sequential" => Self::Sequential,
            "bulk" => Self::Bulk,
            _ => return None,
        })
    }
}

/// A physical crafting/processing station (`station <name> ... end`
/// block). `in`/`out` are the slot counts the station exposes to
/// recipes; `path<n>` lines are opaque per-slot routing hints the
/// Dispatcher's processing-station branch may use when it drives a
/// drone to a specific port (spec §9 notes this branch makes no claim
/// about path-finding, so paths are carried through uninterpreted).
#[derive(Debug, Clone)]
pub struct Station {
    pub name: String,
    pub in_slots: u32,
    pub out_slots: u32,
    pub paths: Vec<String>,
    pub time_ticks: u32,
    pub kind: StationKind,
}

/// One line of a recipe's output (`<count> <kind> "<label>"
/// <max-stack>`).
#[derive(Debug, Clone)]
pub struct RecipeOutput {
    pub kind: ItemKind,
    pub count: u32,
    pub label: String,
    pub max_stack: u32,
}

/// A recipe's consumed inputs: either a flat count list for a
/// processing station, or a 3x3 workbench layout for the synthetic
/// `craft` station (spec §6 "for the synthetic station `craft`, `<kind>
/// <slot-index>...` listing workbench slots 1..9").
#[derive(Debug, Clone)]
pub enum RecipeInputs {
    Processing(Vec<(ItemKind, u32)>),
    Craft(Box<[Option<ItemKind>; 9]>),
}

impl RecipeInputs {
    /// Net input quantities, collapsing the workbench layout into
    /// per-kind counts — what the Dependency Solver actually consumes.
    #[must_use]
    pub fn net_inputs(&self) -> Vec<(ItemKind, u32)> {
        match self {
            Self::Processing(items) => items.clone(),
            Self::Craft(grid) => {
                let mut counts: Vec<(ItemKind, u32)> = Vec::new();
                for slot in grid.iter().flatten() {
                    if let Some(entry) = counts.iter_mut().find(|(k, _)| k == slot) {
                        entry.1 += 1;
                    } else {
                        counts.push((slot.clone(), 1));
                    }
                }
                counts
            }
        }
    }
}

/// One recipe: which station produces it, what it outputs, and what
/// it consumes.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub id: RecipeId,
    pub station: String,
    pub outputs: Vec<RecipeOutput>,
    pub inputs: RecipeInputs,
}

impl Recipe {
    /// The recipe's primary output — the first output line, which the
    /// Dependency Solver treats as "the" product when matching a
    /// requested kind (spec §4.7 `output-per-batch`).
    #[must_use]
    pub fn primary_output(&self) -> &RecipeOutput {
        &self.outputs[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(id: &str) -> ItemKind {
        ItemKind::new("minecraft", id, 0, false, None)
    }

    #[test]
    fn craft_inputs_collapse_workbench_into_counts() {
        let mut grid: [Option<ItemKind>; 9] = Default::default();
        grid[0] = Some(kind("plank"));
        grid[2] = Some(kind("plank"));
        grid[4] = Some(kind("stick"));
        let inputs = RecipeInputs::Craft(Box::new(grid));
        let mut net = inputs.net_inputs();
        net.sort_by(|a, b| a.0.canonical_key().cmp(&b.0.canonical_key()));
        assert_eq!(net, vec![(kind("plank"), 2), (kind("stick"), 1)]);
    }
}
