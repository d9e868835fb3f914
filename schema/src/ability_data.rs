use crate::{PokemonType, Terrain, Weather};
use serde::{Deserialize, Serialize};

/// Closed set of ability behaviours the engine understands, resolved once at lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum AbilityEffect {
    #[default]
    None,
    /// Opponents cannot switch out (Shadow Tag).
    TrapsOpponent,
    /// Grounded opponents cannot switch out (Arena Trap).
    TrapsGrounded,
    /// Steel-type opponents cannot switch out (Magnet Pull).
    TrapsSteel,
    /// Opposing moves aimed at the holder cost one extra PP (Pressure).
    ExtraPpCost,
    /// Sets weather that lasts only while the holder stays active.
    PersistentWeather(Weather),
    SetWeatherOnEntry(Weather),
    SetTerrainOnEntry(Terrain),
    IntimidateOnEntry,
    /// Doubles speed in the given weather family.
    SpeedInWeather(Weather),
    /// Status moves gain one priority.
    Prankster,
    /// Contact moves ignore protection.
    IgnoresProtection,
    /// Damages the attacker by 1/4 of its max HP on a contact knock-out.
    Aftermath,
    /// Boosts attack and locks the holder into its first move.
    ChoiceLock,
    MagicBounce,
    /// Immune to indirect damage.
    MagicGuard,
    Levitate,
    /// Changes typing once HP falls to half or below.
    FormChangeBelowHalf { types: Vec<PokemonType> },
    SpeedBoost,
    Regenerator,
    NaturalCure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDescriptor {
    pub name: String,
    #[serde(default)]
    pub effect: AbilityEffect,
}

impl AbilityDescriptor {
    pub fn inert(name: &str) -> Self {
        Self {
            name: name.to_string(),
            effect: AbilityEffect::None,
        }
    }
}
