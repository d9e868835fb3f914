use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Weather {
    Rain,
    #[strum(serialize = "harsh sunlight")]
    Sun,
    Sandstorm,
    Snow,
    #[strum(serialize = "heavy rain")]
    HeavyRain,
    #[strum(serialize = "extremely harsh sunlight")]
    HarshSun,
    #[strum(serialize = "strong winds")]
    StrongWinds,
}

impl Weather {
    /// Persistent weather is tied to an ability holder rather than a turn counter.
    pub fn is_persistent(self) -> bool {
        matches!(
            self,
            Weather::HeavyRain | Weather::HarshSun | Weather::StrongWinds
        )
    }

    pub fn is_rain(self) -> bool {
        matches!(self, Weather::Rain | Weather::HeavyRain)
    }

    pub fn is_sun(self) -> bool {
        matches!(self, Weather::Sun | Weather::HarshSun)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Terrain {
    #[strum(serialize = "Electric Terrain")]
    Electric,
    #[strum(serialize = "Grassy Terrain")]
    Grassy,
    #[strum(serialize = "Misty Terrain")]
    Misty,
    #[strum(serialize = "Psychic Terrain")]
    Psychic,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Hazard {
    #[strum(serialize = "Stealth Rock")]
    StealthRock,
    Spikes,
    #[strum(serialize = "Toxic Spikes")]
    ToxicSpikes,
    #[strum(serialize = "Sticky Web")]
    StickyWeb,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Screen {
    Reflect,
    #[strum(serialize = "Light Screen")]
    LightScreen,
    #[strum(serialize = "Aurora Veil")]
    AuroraVeil,
    Tailwind,
    Safeguard,
    Mist,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum GlobalEffect {
    Gravity,
    #[strum(serialize = "Trick Room")]
    TrickRoom,
    #[strum(serialize = "Magic Room")]
    MagicRoom,
    /// Lowered stat stages stay on a combatant through switches while active.
    Stasis,
}
