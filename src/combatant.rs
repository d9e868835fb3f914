use crate::battle::conditions::{VolatileCondition, VolatileKind};
use schema::{BaseStats, PokemonType, StatType, StatusType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Nature {
    #[default]
    Hardy,
    Adamant,
    Brave,
    Jolly,
    Modest,
    Quiet,
    Timid,
    Bold,
    Impish,
    Calm,
    Careful,
    Relaxed,
    Sassy,
}

impl Nature {
    /// (raised, lowered) stat pair, `None` for neutral natures.
    fn modified_stats(self) -> Option<(StatType, StatType)> {
        use StatType::*;
        match self {
            Nature::Hardy => None,
            Nature::Adamant => Some((Attack, SpecialAttack)),
            Nature::Brave => Some((Attack, Speed)),
            Nature::Jolly => Some((Speed, SpecialAttack)),
            Nature::Modest => Some((SpecialAttack, Attack)),
            Nature::Quiet => Some((SpecialAttack, Speed)),
            Nature::Timid => Some((Speed, Attack)),
            Nature::Bold => Some((Defense, Attack)),
            Nature::Impish => Some((Defense, SpecialAttack)),
            Nature::Calm => Some((SpecialDefense, Attack)),
            Nature::Careful => Some((SpecialDefense, SpecialAttack)),
            Nature::Relaxed => Some((Defense, Speed)),
            Nature::Sassy => Some((SpecialDefense, Speed)),
        }
    }

    pub fn multiplier(self, stat: StatType) -> f32 {
        match self.modified_stats() {
            Some((raised, _)) if raised == stat => 1.1,
            Some((_, lowered)) if lowered == stat => 0.9,
            _ => 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCondition {
    Sleep { turns: u8 },
    Burn,
    Paralysis,
    Poison,
    BadlyPoisoned { counter: u8 },
    Freeze,
}

impl StatusCondition {
    pub fn status_type(&self) -> StatusType {
        match self {
            StatusCondition::Sleep { .. } => StatusType::Sleep,
            StatusCondition::Burn => StatusType::Burn,
            StatusCondition::Paralysis => StatusType::Paralysis,
            StatusCondition::Poison => StatusType::Poison,
            StatusCondition::BadlyPoisoned { .. } => StatusType::BadlyPoisoned,
            StatusCondition::Freeze => StatusType::Freeze,
        }
    }

    /// Fresh condition for a catalog status. Sleep length comes from the caller.
    pub fn from_type(status: StatusType, sleep_turns: u8) -> Self {
        match status {
            StatusType::Sleep => StatusCondition::Sleep { turns: sleep_turns },
            StatusType::Burn => StatusCondition::Burn,
            StatusType::Paralysis => StatusCondition::Paralysis,
            StatusType::Poison => StatusCondition::Poison,
            StatusType::BadlyPoisoned => StatusCondition::BadlyPoisoned { counter: 1 },
            StatusType::Freeze => StatusCondition::Freeze,
        }
    }
}

/// Serialized description of a roster member, as handed over by the roster source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantTemplate {
    pub species: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub level: u8,
    pub base_stats: BaseStats,
    pub types: Vec<PokemonType>,
    pub ability: String,
    #[serde(default)]
    pub item: Option<String>,
    pub moves: Vec<String>,
    #[serde(default)]
    pub nature: Nature,
    #[serde(default = "default_ivs")]
    pub ivs: [u8; 6],
    #[serde(default)]
    pub evs: [u8; 6],
    #[serde(default)]
    pub tera_type: Option<PokemonType>,
}

fn default_ivs() -> [u8; 6] {
    [31; 6]
}

/// One creature's mutable in-battle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub species: String,
    pub nickname: Option<String>,
    pub level: u8,
    pub base_stats: BaseStats,
    pub ivs: [u8; 6],
    pub evs: [u8; 6],
    pub nature: Nature,
    pub stats: [u16; 6], // HP, ATK, DEF, SP.ATK, SP.DEF, SPD
    current_hp: u16,
    pub base_types: Vec<PokemonType>,
    pub types: Vec<PokemonType>,
    pub base_ability: String,
    pub ability: String,
    pub item: Option<String>,
    pub moves: Vec<String>, // Up to 4; PP lives in the ledger
    pub status: Option<StatusCondition>,
    pub volatiles: HashMap<VolatileKind, VolatileCondition>,
    pub stat_stages: HashMap<StatType, i8>,
    pub last_move: Option<String>,
    pub consecutive_protects: u8,
    pub turns_active: u32,
    pub tera_type: Option<PokemonType>,
    pub terastallized: bool,
    pub mega_evolved: bool,
    pub form_changed: bool,
}

impl Combatant {
    pub fn from_template(template: &CombatantTemplate) -> Self {
        let stats = calculate_stats(
            &template.base_stats,
            template.level,
            &template.ivs,
            &template.evs,
            template.nature,
        );

        Combatant {
            species: template.species.clone(),
            nickname: template.nickname.clone(),
            level: template.level,
            base_stats: template.base_stats,
            ivs: template.ivs,
            evs: template.evs,
            nature: template.nature,
            stats,
            current_hp: stats[0],
            base_types: template.types.clone(),
            types: template.types.clone(),
            base_ability: template.ability.clone(),
            ability: template.ability.clone(),
            item: template.item.clone(),
            moves: template.moves.iter().take(4).cloned().collect(),
            status: None,
            volatiles: HashMap::new(),
            stat_stages: HashMap::new(),
            last_move: None,
            consecutive_protects: 0,
            turns_active: 0,
            tera_type: template.tera_type,
            terastallized: false,
            mega_evolved: false,
            form_changed: false,
        }
    }

    /// Display name: nickname if set, species otherwise.
    pub fn name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.species)
    }

    // === HP ===

    pub fn max_hp(&self) -> u16 {
        self.stats[0]
    }

    pub fn current_hp(&self) -> u16 {
        self.current_hp
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    pub fn is_alive(&self) -> bool {
        !self.is_fainted()
    }

    /// Set HP, clamped to [0, max_hp].
    pub fn set_hp(&mut self, hp: u16) {
        self.current_hp = hp.min(self.max_hp());
    }

    pub fn set_hp_to_max(&mut self) {
        self.current_hp = self.max_hp();
    }

    /// Apply damage, returning true if this knocked the combatant out.
    pub fn take_damage(&mut self, amount: u16) -> bool {
        let was_alive = self.is_alive();
        self.current_hp = self.current_hp.saturating_sub(amount);
        was_alive && self.is_fainted()
    }

    /// Restore HP, returning the amount actually healed. Fainted combatants cannot be healed.
    pub fn heal(&mut self, amount: u16) -> u16 {
        if self.is_fainted() {
            return 0;
        }
        let healed = amount.min(self.max_hp() - self.current_hp);
        self.current_hp += healed;
        healed
    }

    /// Fraction of max HP, rounded down, at least 1.
    pub fn fraction_of_max_hp(&self, denominator: u16) -> u16 {
        (self.max_hp() / denominator.max(1)).max(1)
    }

    pub fn is_at_or_below_half(&self) -> bool {
        self.current_hp * 2 <= self.max_hp()
    }

    /// Recompute stats after a base-stat change, keeping damage taken.
    pub fn recalculate_stats(&mut self) {
        let damage_taken = self.max_hp() - self.current_hp;
        self.stats = calculate_stats(&self.base_stats, self.level, &self.ivs, &self.evs, self.nature);
        if self.current_hp > 0 {
            self.current_hp = self.stats[0].saturating_sub(damage_taken).max(1);
        }
    }

    /// Scale max and current HP together (Dynamax).
    pub fn scale_hp(&mut self, numerator: u16, denominator: u16) {
        let denominator = denominator.max(1);
        let new_max = ((self.stats[0] as u32 * numerator as u32) / denominator as u32) as u16;
        let new_current = ((self.current_hp as u32 * numerator as u32 + denominator as u32 - 1)
            / denominator as u32) as u16;
        self.stats[0] = new_max.max(1);
        self.current_hp = if self.current_hp == 0 {
            0
        } else {
            new_current.clamp(1, self.stats[0])
        };
    }

    // === Stats and typing ===

    pub fn stat(&self, stat: StatType) -> u16 {
        stat.index().map(|i| self.stats[i]).unwrap_or(0)
    }

    pub fn has_type(&self, pokemon_type: PokemonType) -> bool {
        self.types.contains(&pokemon_type)
    }

    /// Types used for the same-type bonus: original typing plus the tera type.
    pub fn stab_types(&self) -> Vec<PokemonType> {
        let mut types = self.base_types.clone();
        if self.terastallized {
            if let Some(tera) = self.tera_type {
                if !types.contains(&tera) {
                    types.push(tera);
                }
            }
        }
        types
    }

    // === Stat stages ===

    pub fn stat_stage(&self, stat: StatType) -> i8 {
        self.stat_stages.get(&stat).copied().unwrap_or(0)
    }

    /// Set the stage for a stat type (clamped to -6 to +6)
    pub fn set_stat_stage(&mut self, stat: StatType, stage: i8) {
        let clamped_stage = stage.clamp(-6, 6);
        if clamped_stage == 0 {
            self.stat_stages.remove(&stat);
        } else {
            self.stat_stages.insert(stat, clamped_stage);
        }
    }

    /// Modify a stage by a delta, returning (old, new).
    pub fn modify_stat_stage(&mut self, stat: StatType, delta: i8) -> (i8, i8) {
        let old = self.stat_stage(stat);
        self.set_stat_stage(stat, old.saturating_add(delta));
        (old, self.stat_stage(stat))
    }

    pub fn clear_stat_stages(&mut self) {
        self.stat_stages.clear();
    }

    /// Drop every non-negative stage, keeping only the lowered ones.
    pub fn keep_only_negative_stages(&mut self) {
        self.stat_stages.retain(|_, stage| *stage < 0);
    }

    // === Volatile conditions ===

    pub fn has_volatile(&self, kind: VolatileKind) -> bool {
        self.volatiles.contains_key(&kind)
    }

    pub fn volatile(&self, kind: VolatileKind) -> Option<&VolatileCondition> {
        self.volatiles.get(&kind)
    }

    pub fn volatile_mut(&mut self, kind: VolatileKind) -> Option<&mut VolatileCondition> {
        self.volatiles.get_mut(&kind)
    }

    /// Add or replace a volatile condition
    pub fn add_volatile(&mut self, condition: VolatileCondition) {
        self.volatiles.insert(condition.kind(), condition);
    }

    pub fn remove_volatile(&mut self, kind: VolatileKind) -> Option<VolatileCondition> {
        self.volatiles.remove(&kind)
    }

    /// Move locked in by a choice item or ability, if any.
    pub fn choice_locked_move(&self) -> Option<&str> {
        match self.volatile(VolatileKind::ChoiceLocked) {
            Some(VolatileCondition::ChoiceLocked { move_name }) => Some(move_name.as_str()),
            _ => None,
        }
    }

    pub fn knows_move(&self, move_name: &str) -> Option<usize> {
        self.moves.iter().position(|m| m == move_name)
    }
}

/// Calculate current stats based on base stats, level, IVs, EVs and nature
/// HP = floor((2 * Base + IV + floor(EV / 4)) * Level / 100) + Level + 10
/// Other = floor((floor((2 * Base + IV + floor(EV / 4)) * Level / 100) + 5) * Nature)
pub fn calculate_stats(
    base_stats: &BaseStats,
    level: u8,
    ivs: &[u8; 6],
    evs: &[u8; 6],
    nature: Nature,
) -> [u16; 6] {
    let base = base_stats.as_array();
    let natured = [
        StatType::Hp,
        StatType::Attack,
        StatType::Defense,
        StatType::SpecialAttack,
        StatType::SpecialDefense,
        StatType::Speed,
    ];
    let level = level as u32;
    let mut stats = [0u16; 6];

    for i in 0..6 {
        let base_calculation = 2 * base[i] as u32 + ivs[i] as u32 + (evs[i] as u32 / 4);
        let stat = if i == 0 {
            (base_calculation * level) / 100 + level + 10
        } else {
            let raw = (base_calculation * level) / 100 + 5;
            (raw as f32 * nature.multiplier(natured[i])).floor() as u32
        };
        stats[i] = stat.min(u16::MAX as u32) as u16;
    }

    stats
}
