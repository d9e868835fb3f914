use crate::battle::conditions::{VolatileCondition, VolatileKind};
use crate::battle::field::FieldState;
use crate::battle::side::SideState;
use crate::battle::state::TurnRng;
use crate::catalog::CatalogView;
use crate::combatant::{Combatant, StatusCondition};
use schema::{
    AbilityEffect, GlobalEffect, ItemEffect, MoveCategory, MoveDescriptor, PokemonType, Screen,
    StatType,
};

/// Calculate effective attack stat including stat stages, held items and ability boosts
pub fn effective_attack(
    combatant: &Combatant,
    category: MoveCategory,
    catalog: &CatalogView,
    field: &FieldState,
) -> u16 {
    let attack_stat = match category {
        MoveCategory::Physical => StatType::Attack,
        MoveCategory::Special => StatType::SpecialAttack,
        MoveCategory::Status => return 0, // Status moves don't use attack stats
    };

    let stage = combatant.stat_stage(attack_stat);
    let mut multiplied_attack =
        apply_stat_stage_multiplier(combatant.stat(attack_stat), stage) as f64;

    if let ItemEffect::ChoiceLock { stat } = catalog.held_item_effect(combatant, field) {
        if stat == attack_stat {
            multiplied_attack *= 1.5;
        }
    }
    if attack_stat == StatType::Attack
        && catalog.active_ability(combatant) == AbilityEffect::ChoiceLock
    {
        multiplied_attack *= 1.5;
    }

    multiplied_attack.round().min(u16::MAX as f64) as u16
}

/// Calculate effective defense stat including stat stages
pub fn effective_defense(combatant: &Combatant, category: MoveCategory) -> u16 {
    let defense_stat = match category {
        MoveCategory::Physical => StatType::Defense,
        MoveCategory::Special => StatType::SpecialDefense,
        MoveCategory::Status => return 0, // Status moves don't target defense
    };

    let stage = combatant.stat_stage(defense_stat);
    apply_stat_stage_multiplier(combatant.stat(defense_stat), stage).max(1)
}

/// Calculate effective speed including stat stages, paralysis, items, abilities and tailwind
pub fn effective_speed(
    combatant: &Combatant,
    side: &SideState,
    field: &FieldState,
    catalog: &CatalogView,
) -> u32 {
    let stage = combatant.stat_stage(StatType::Speed);
    let mut speed = apply_stat_stage_multiplier(combatant.stat(StatType::Speed), stage) as f64;

    // Paralysis halves speed
    if matches!(combatant.status, Some(StatusCondition::Paralysis)) {
        speed *= 0.5;
    }

    match catalog.held_item_effect(combatant, field) {
        ItemEffect::ChoiceLock {
            stat: StatType::Speed,
        } => speed *= 1.5,
        ItemEffect::IronBall => speed *= 0.5,
        _ => {}
    }

    if let AbilityEffect::SpeedInWeather(weather) = catalog.active_ability(combatant) {
        let active = field.weather.is_some_and(|current| {
            current == weather
                || (weather.is_rain() && current.is_rain())
                || (weather.is_sun() && current.is_sun())
        });
        if active {
            speed *= 2.0;
        }
    }

    if side.has_screen(Screen::Tailwind) {
        speed *= 2.0;
    }

    speed.floor() as u32
}

/// Grounded combatants are touched by terrain and most hazards.
pub fn is_grounded(combatant: &Combatant, field: &FieldState, catalog: &CatalogView) -> bool {
    let item = catalog.held_item_effect(combatant, field);
    if field.is_active(GlobalEffect::Gravity) || item == ItemEffect::IronBall {
        return true;
    }
    if item == ItemEffect::AirBalloon {
        return false;
    }
    !combatant.has_type(PokemonType::Flying)
        && catalog.active_ability(combatant) != AbilityEffect::Levitate
}

/// Calculate if a move hits based on accuracy, evasion, and move accuracy
/// Returns true if the move hits, false if it misses
pub fn move_hits(
    attacker: &Combatant,
    defender: &Combatant,
    defender_side: usize,
    descriptor: &MoveDescriptor,
    field: &FieldState,
    rng: &mut TurnRng,
) -> bool {
    // Lock-On guarantees the next move against its target
    if let Some(VolatileCondition::LockOn { target }) = attacker.volatile(VolatileKind::LockOn) {
        if *target == defender_side {
            return true;
        }
    }

    // If move has no accuracy value, it never misses
    let Some(base_accuracy) = descriptor.accuracy else {
        return true;
    };

    // Calculate adjusted stages: attacker's accuracy - defender's evasion
    let accuracy_stage = attacker.stat_stage(StatType::Accuracy);
    let evasion_stage = defender.stat_stage(StatType::Evasion);
    let adjusted_stage = (accuracy_stage - evasion_stage).clamp(-6, 6);

    let mut modified_accuracy = base_accuracy as f64 * apply_accuracy_stage_multiplier(adjusted_stage);
    if field.is_active(GlobalEffect::Gravity) {
        modified_accuracy *= 5.0 / 3.0;
    }
    let clamped_accuracy = modified_accuracy.round().clamp(1.0, 100.0) as u8;

    rng.chance(clamped_accuracy, "accuracy")
}

/// Apply accuracy/evasion stage multipliers
/// Uses different multipliers than regular stats
/// Stages range from -6 to +6
pub fn apply_accuracy_stage_multiplier(stage: i8) -> f64 {
    match stage {
        -6 => 3.0 / 9.0,
        -5 => 3.0 / 8.0,
        -4 => 3.0 / 7.0,
        -3 => 3.0 / 6.0,
        -2 => 3.0 / 5.0,
        -1 => 3.0 / 4.0,
        0 => 3.0 / 3.0,
        1 => 4.0 / 3.0,
        2 => 5.0 / 3.0,
        3 => 6.0 / 3.0,
        4 => 7.0 / 3.0,
        5 => 8.0 / 3.0,
        6 => 9.0 / 3.0,
        _ => 1.0,
    }
}

/// Apply stat stage multipliers
/// Stages range from -6 to +6
/// Negative stages: (2 / (2 + |stage|))
/// Positive stages: ((2 + stage) / 2)
pub fn apply_stat_stage_multiplier(base_stat: u16, stage: i8) -> u16 {
    let clamped_stage = stage.clamp(-6, 6);

    if clamped_stage == 0 {
        return base_stat;
    }

    let multiplier = if clamped_stage < 0 {
        2.0 / (2.0 + (-clamped_stage) as f64)
    } else {
        (2.0 + clamped_stage as f64) / 2.0
    };

    ((base_stat as f64) * multiplier).round() as u16
}
