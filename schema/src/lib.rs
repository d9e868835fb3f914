// PvP Battle Schema - Shared rules-catalog definitions
// This crate contains the catalog descriptors (moves, abilities, items) and
// the small closed enums shared between the battle engine and its data files.

pub use ability_data::*;
pub use catalog_data::*;
pub use field_data::*;
pub use item_data::*;
pub use move_data::*;
pub use pokemon_types::*;
pub use stat_types::*;

pub mod ability_data;
pub mod catalog_data;
pub mod field_data;
pub mod item_data;
pub mod move_data;
pub mod pokemon_types;
pub mod stat_types;
