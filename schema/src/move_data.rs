use crate::{GlobalEffect, Hazard, PokemonType, Screen, StatType, StatusType, Terrain, Weather};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Name of the PP-less move used when nothing else is selectable.
pub const UNIVERSAL_MOVE: &str = "struggle";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MoveTarget {
    #[default]
    Opponent,
    User,
    UserSide,
    OpponentSide,
    Field,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ProtectionKind {
    Plain,
    SpikyShield,
    BanefulBunker,
    KingsShield,
    Obstruct,
    SilkTrap,
    BurningBulwark,
}

/// Behaviour tag attached to a move at catalog-lookup time. The move executor
/// dispatches on this instead of the move's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MoveClass {
    #[default]
    Standard,
    Protection(ProtectionKind),
    SetWeather(Weather),
    SetTerrain(Terrain),
    SetHazard(Hazard),
    SetScreen(Screen),
    SetGlobal(GlobalEffect),
    ClearHazards,
    Pivot { transfers_volatiles: bool },
    ForceOut,
    Charge,
    Recharge,
    Rampage,
    Binding,
    DelayedAttack,
    Wish,
    Substitute,
    LeechSeed,
    Taunt,
    LockOn,
    TrapTarget,
    Inert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MoveFlags {
    #[serde(default)]
    pub contact: bool,
    #[serde(default)]
    pub ignores_protection: bool,
    #[serde(default)]
    pub reflectable: bool,
    #[serde(default)]
    pub sound: bool,
    /// Charge moves with this flag fire immediately under sun.
    #[serde(default)]
    pub solar: bool,
    /// The charging turn leaves the user out of reach (Fly, Dig).
    #[serde(default)]
    pub semi_invulnerable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectTarget {
    User,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecondaryEffect {
    Status { status: StatusType, chance: u8 },
    Confuse { chance: u8 },
    Flinch { chance: u8 },
    StatChange { target: EffectTarget, stat: StatType, stages: i8, chance: u8 },
    /// Percentage of damage dealt taken back as recoil.
    Recoil { percent: u8 },
    /// Percentage of damage dealt restored to the user.
    Drain { percent: u8 },
    /// Percentage of the user's max HP restored.
    Heal { percent: u8 },
    /// Field-setting rider on an attack (Max Moves). Silent if it cannot start.
    SetWeather(Weather),
    SetTerrain(Terrain),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveDescriptor {
    pub name: String,
    pub move_type: PokemonType,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: Option<u16>,
    /// `None` never misses.
    #[serde(default)]
    pub accuracy: Option<u8>,
    /// Zero means the move carries no PP cap.
    #[serde(default)]
    pub max_pp: u8,
    #[serde(default)]
    pub priority: i8,
    #[serde(default)]
    pub target: MoveTarget,
    #[serde(default)]
    pub class: MoveClass,
    #[serde(default)]
    pub flags: MoveFlags,
    #[serde(default)]
    pub secondary: Vec<SecondaryEffect>,
}

impl MoveDescriptor {
    /// Safe default for an unknown move: a status move that does nothing.
    pub fn inert(name: &str) -> Self {
        Self {
            name: name.to_string(),
            move_type: PokemonType::Typeless,
            category: MoveCategory::Status,
            power: None,
            accuracy: None,
            max_pp: 0,
            priority: 0,
            target: MoveTarget::User,
            class: MoveClass::Inert,
            flags: MoveFlags::default(),
            secondary: Vec::new(),
        }
    }

    /// Built-in fallback for the universal move.
    pub fn struggle() -> Self {
        Self {
            name: UNIVERSAL_MOVE.to_string(),
            move_type: PokemonType::Typeless,
            category: MoveCategory::Physical,
            power: Some(50),
            accuracy: None,
            max_pp: 0,
            priority: 0,
            target: MoveTarget::Opponent,
            class: MoveClass::Standard,
            flags: MoveFlags {
                contact: true,
                ..MoveFlags::default()
            },
            secondary: vec![SecondaryEffect::Recoil { percent: 25 }],
        }
    }

    pub fn is_damaging(&self) -> bool {
        self.category != MoveCategory::Status && self.power.unwrap_or(0) > 0
    }

    pub fn is_status(&self) -> bool {
        self.category == MoveCategory::Status
    }

    pub fn targets_opponent(&self) -> bool {
        self.target == MoveTarget::Opponent
    }

    pub fn has_pp_cap(&self) -> bool {
        self.max_pp > 0
    }
}
