use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum StatType {
    Hp,
    Attack,
    Defense,
    #[strum(serialize = "Special Attack")]
    SpecialAttack,
    #[strum(serialize = "Special Defense")]
    SpecialDefense,
    Speed,
    #[strum(serialize = "accuracy")]
    Accuracy,
    #[strum(serialize = "evasiveness")]
    Evasion,
}

impl StatType {
    /// Index into a six-entry stat array (HP, ATK, DEF, SP.ATK, SP.DEF, SPD).
    /// Accuracy and evasion only exist as stages.
    pub fn index(self) -> Option<usize> {
        match self {
            StatType::Hp => Some(0),
            StatType::Attack => Some(1),
            StatType::Defense => Some(2),
            StatType::SpecialAttack => Some(3),
            StatType::SpecialDefense => Some(4),
            StatType::Speed => Some(5),
            StatType::Accuracy | StatType::Evasion => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BaseStats {
    pub hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub sp_attack: u16,
    pub sp_defense: u16,
    pub speed: u16,
}

impl BaseStats {
    pub fn as_array(&self) -> [u16; 6] {
        [
            self.hp,
            self.attack,
            self.defense,
            self.sp_attack,
            self.sp_defense,
            self.speed,
        ]
    }
}

/// Non-volatile status kinds as they appear in catalog data.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StatusType {
    #[strum(serialize = "sleep")]
    Sleep,
    #[strum(serialize = "burn")]
    Burn,
    #[strum(serialize = "paralysis")]
    Paralysis,
    #[strum(serialize = "poison")]
    Poison,
    #[strum(serialize = "bad poison")]
    BadlyPoisoned,
    #[strum(serialize = "freeze")]
    Freeze,
}
