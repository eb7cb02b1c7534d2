//! The Recipe Catalog (spec §2 RC): loaded once from a recipe file and
//! read-only thereafter, indexed by output kind so the Dependency
//! Solver can look up every recipe that can produce a given kind.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use fabric_storage::ItemKind;
use fabric_utils::ConfigFatal;

use crate::parser;
use crate::recipe::{Recipe, RecipeId, Station};

/// Frozen after [`RecipeCatalog::load`]: stations by name, recipes in
/// file order, and a reverse index from output kind to the recipes
/// that can produce it.
pub struct RecipeCatalog {
    stations: FxHashMap<String, Station>,
    recipes: Vec<Recipe>,
    by_output: FxHashMap<ItemKind, SmallVec<[RecipeId; 4]>>,
}

impl RecipeCatalog {
    pub fn load(path: &str, text: &str) -> Result<Self, ConfigFatal> {
        let parsed = parser::load(path, text)?;

        let mut stations = FxHashMap::default();
        for station in parsed.stations {
            stations.insert(station.name.clone(), station);
        }

        let mut by_output: FxHashMap<ItemKind, SmallVec<[RecipeId; 4]>> = FxHashMap::default();
        for recipe in &parsed.recipes {
            for output in &recipe.outputs {
                by_output.entry(output.kind.clone()).or_default().push(recipe.id);
            }
        }

        Ok(Self {
            stations,
            recipes: parsed.recipes,
            by_output,
        })
    }

    #[must_use]
    pub fn station(&self, name: &str) -> Option<&Station> {
        self.stations.get(name)
    }

    #[must_use]
    pub fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(id.0)
    }

    /// Every recipe that can produce `kind`, in file order — the
    /// Dependency Solver's "several recipes can produce the kind"
    /// candidate set (spec §4.7).
    #[must_use]
    pub fn recipes_for(&self, kind: &ItemKind) -> &[RecipeId] {
        self.by_output.get(kind).map_or(&[], SmallVec::as_slice)
    }

    #[must_use]
    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    /// Every loaded recipe in file order, for building a full
    /// `craft_recipe_list` snapshot.
    #[must_use]
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
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
    fn indexes_recipes_by_output_kind() {
        let catalog = RecipeCatalog::load("recipes.cfg", SAMPLE).unwrap();
        let planks = ItemKind::parse("minecraft:planks#0").unwrap();
        let stick = ItemKind::parse("minecraft:stick#0").unwrap();
        assert_eq!(catalog.recipes_for(&planks).len(), 1);
        assert_eq!(catalog.recipes_for(&stick).len(), 1);
        assert_eq!(catalog.recipe_count(), 2);
    }

    #[test]
    fn multiple_recipes_for_the_same_output_are_all_indexed() {
        let text = r#"
coal_furnace:
4 minecraft:charcoal#0 "Charcoal" 64
with
1 minecraft:log#0

charcoal_pit:
4 minecraft:charcoal#0 "Charcoal" 64
with
1 minecraft:log#0
1 minecraft:sand#0
"#;
        let catalog = RecipeCatalog::load("recipes.cfg", text).unwrap();
        let charcoal = ItemKind::parse("minecraft:charcoal#0").unwrap();
        assert_eq!(catalog.recipes_for(&charcoal).len(), 2);
    }
}
