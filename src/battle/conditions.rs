use schema::ProtectionKind;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Volatile state on the active combatant. Cleared on switch-out except for
/// the baton-passable subset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum VolatileCondition {
    Confused {
        turns_remaining: u8,
    }, // Counts down on each attempt to act
    Substitute {
        hp: u16,
    },
    Protected {
        kind: ProtectionKind,
    },
    Rampaging {
        move_name: String,
        turns_remaining: u8,
    },
    ChoiceLocked {
        move_name: String,
    },
    Trapped {
        source: usize,
    }, // Side whose move trapped this combatant
    PartiallyTrapped {
        source: usize,
        turns_remaining: u8,
    },
    Invulnerable {
        move_name: String,
    },
    Charging {
        move_name: String,
    },
    Recharging,
    Flinched,
    Taunted {
        turns_remaining: u8,
    },
    LockOn {
        target: usize,
    },
    Seeded {
        source: usize,
    },
    Dynamaxed {
        turns_remaining: u8,
    },
    ZPowered,
}

/// Condition type without data payload, used as the map key
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum VolatileKind {
    #[strum(serialize = "confusion")]
    Confused,
    #[strum(serialize = "substitute")]
    Substitute,
    #[strum(serialize = "protection")]
    Protected,
    #[strum(serialize = "rampage")]
    Rampaging,
    #[strum(serialize = "choice lock")]
    ChoiceLocked,
    #[strum(serialize = "trap")]
    Trapped,
    #[strum(serialize = "bind")]
    PartiallyTrapped,
    #[strum(serialize = "semi-invulnerability")]
    Invulnerable,
    #[strum(serialize = "charging")]
    Charging,
    #[strum(serialize = "recharge")]
    Recharging,
    #[strum(serialize = "flinch")]
    Flinched,
    #[strum(serialize = "taunt")]
    Taunted,
    #[strum(serialize = "lock-on")]
    LockOn,
    #[strum(serialize = "leech seed")]
    Seeded,
    #[strum(serialize = "dynamax")]
    Dynamaxed,
    #[strum(serialize = "Z-power")]
    ZPowered,
}

impl VolatileCondition {
    pub fn kind(&self) -> VolatileKind {
        match self {
            VolatileCondition::Confused { .. } => VolatileKind::Confused,
            VolatileCondition::Substitute { .. } => VolatileKind::Substitute,
            VolatileCondition::Protected { .. } => VolatileKind::Protected,
            VolatileCondition::Rampaging { .. } => VolatileKind::Rampaging,
            VolatileCondition::ChoiceLocked { .. } => VolatileKind::ChoiceLocked,
            VolatileCondition::Trapped { .. } => VolatileKind::Trapped,
            VolatileCondition::PartiallyTrapped { .. } => VolatileKind::PartiallyTrapped,
            VolatileCondition::Invulnerable { .. } => VolatileKind::Invulnerable,
            VolatileCondition::Charging { .. } => VolatileKind::Charging,
            VolatileCondition::Recharging => VolatileKind::Recharging,
            VolatileCondition::Flinched => VolatileKind::Flinched,
            VolatileCondition::Taunted { .. } => VolatileKind::Taunted,
            VolatileCondition::LockOn { .. } => VolatileKind::LockOn,
            VolatileCondition::Seeded { .. } => VolatileKind::Seeded,
            VolatileCondition::Dynamaxed { .. } => VolatileKind::Dynamaxed,
            VolatileCondition::ZPowered => VolatileKind::ZPowered,
        }
    }

    /// The other side this condition points at, if any. Used to release
    /// back-references when that side's combatant leaves the field.
    pub fn referenced_side(&self) -> Option<usize> {
        match self {
            VolatileCondition::Trapped { source }
            | VolatileCondition::PartiallyTrapped { source, .. }
            | VolatileCondition::Seeded { source } => Some(*source),
            VolatileCondition::LockOn { target } => Some(*target),
            _ => None,
        }
    }
}

impl VolatileKind {
    /// Flags that only last until the end of the turn they were set in.
    pub fn is_one_turn(self) -> bool {
        matches!(
            self,
            VolatileKind::Protected | VolatileKind::Flinched | VolatileKind::ZPowered
        )
    }

    /// State a volatile-transferring pivot hands to the incoming combatant.
    pub fn is_transferable(self) -> bool {
        matches!(
            self,
            VolatileKind::Substitute
                | VolatileKind::Seeded
                | VolatileKind::Trapped
                | VolatileKind::PartiallyTrapped
                | VolatileKind::Confused
        )
    }

    /// Conditions that lock the combatant into its next action.
    pub fn forces_action(self) -> bool {
        matches!(
            self,
            VolatileKind::Rampaging | VolatileKind::Charging | VolatileKind::Recharging
        )
    }
}
