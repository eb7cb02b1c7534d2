//! Recipe-file parse failures. These are config-time, not runtime:
//! a malformed recipe file is a startup [`fabric_utils::ConfigFatal`].

pub use fabric_utils::ConfigFatal as RecipeError;
