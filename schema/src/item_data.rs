use crate::{BaseStats, PokemonType, StatType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum ItemEffect {
    #[default]
    None,
    /// Multiplies the given stat by 1.5 and locks the holder into one move.
    ChoiceLock { stat: StatType },
    /// Ignores entry hazards.
    HazardImmunity,
    /// Restores 1/16 max HP at the end of each turn.
    EndOfTurnHeal,
    ExtendsWeather,
    ExtendsScreens,
    /// Halves speed and grounds the holder.
    IronBall,
    /// Lifts the holder off the ground.
    AirBalloon,
    MegaStone {
        species: String,
        ability: String,
        types: Vec<PokemonType>,
        base_stats: BaseStats,
    },
    ZCrystal { move_type: PokemonType },
    /// Bag item used as a turn action.
    Medicine { heal: u16, cures_status: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub name: String,
    #[serde(default)]
    pub effect: ItemEffect,
}

impl ItemDescriptor {
    pub fn inert(name: &str) -> Self {
        Self {
            name: name.to_string(),
            effect: ItemEffect::None,
        }
    }
}
