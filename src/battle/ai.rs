//! Automated opponents.

use crate::battle::conditions::VolatileKind;
use crate::battle::normalizer::{forced_move, is_ability_trapped, is_move_trapped};
use crate::battle::state::{Battle, GameState, TurnAction};
use crate::battle::stats::effective_attack;
use crate::catalog::CatalogView;
use crate::combatant::Combatant;
use ordered_float::OrderedFloat;
use schema::{
    EffectTarget, MoveCategory, MoveClass, MoveDescriptor, MoveTarget, PokemonType,
    SecondaryEffect, UNIVERSAL_MOVE,
};

/// A trait for any system that can decide on a battle action.
pub trait Behavior: Send + Sync {
    /// Inspects the battle and decides on the next action for `side`.
    fn decide_action(&self, side: usize, battle: &Battle) -> TurnAction;
}

/// Whether `side` owes a switch choice rather than a regular action.
pub fn owes_switch(side: usize, battle: &Battle) -> bool {
    match battle.game_state {
        GameState::AwaitingPivotSwitch { side: waiting } => waiting == side,
        state => state.sides_needing_replacement().contains(&side),
    }
}

/// Moves the active combatant can select this turn, by name.
pub fn selectable_moves(side: usize, battle: &Battle) -> Vec<String> {
    let Some(combatant) = battle.active(side) else {
        return Vec::new();
    };
    if let Some(locked) = forced_move(combatant) {
        return vec![locked];
    }
    let slot = battle.active_slot(side);
    let locked = combatant.choice_locked_move();
    combatant
        .moves
        .iter()
        .enumerate()
        .filter(|(index, _)| battle.pp.has_pp(side, slot, *index))
        .filter(|(_, name)| locked.map_or(true, |l| l == name.as_str()))
        .map(|(_, name)| name.clone())
        .collect()
}

/// Bench slots `side` may switch to right now.
pub fn switch_targets(side: usize, battle: &Battle, catalog: &CatalogView) -> Vec<usize> {
    let replacing = owes_switch(side, battle);
    let blocked = !replacing
        && (is_move_trapped(side, battle)
            || is_ability_trapped(side, battle, catalog)
            || battle.active(side).and_then(forced_move).is_some());
    if blocked {
        return Vec::new();
    }
    battle.rosters[side].bench_slots().collect()
}

fn effectiveness(descriptor: &MoveDescriptor, defender: &Combatant) -> f32 {
    descriptor.move_type.effectiveness_against(&defender.types)
}

pub struct ScoringAI {
    catalog: CatalogView,
    jitter: bool,
}

impl ScoringAI {
    pub fn new(catalog: CatalogView) -> Self {
        Self {
            catalog,
            jitter: true,
        }
    }

    /// Scores without the random tie-breaking factor.
    pub fn deterministic(catalog: CatalogView) -> Self {
        Self {
            catalog,
            jitter: false,
        }
    }

    fn random_factor(&self, spread: f32) -> f32 {
        if self.jitter {
            1.0 + (rand::random::<f32>() * 2.0 - 1.0) * spread
        } else {
            1.0
        }
    }

    fn score_move(&self, move_name: &str, side: usize, battle: &Battle) -> f32 {
        let (Some(attacker), Some(defender)) = (battle.active(side), battle.active(1 - side))
        else {
            return 0.0;
        };
        let descriptor = self.catalog.move_descriptor(move_name);

        // Damage part
        let mut damage_score = 0.0;
        if descriptor.category != MoveCategory::Status {
            let power = descriptor.power.unwrap_or(0) as f32;
            let effectiveness = effectiveness(&descriptor, defender);
            if effectiveness < 0.1 {
                return -1.0;
            }
            let stab = if attacker.stab_types().contains(&descriptor.move_type) {
                1.5
            } else {
                1.0
            };
            let attack =
                effective_attack(attacker, descriptor.category, &self.catalog, &battle.field);
            let level_scalar = (attacker.level as f32 * 2.0).max(1.0);
            damage_score = power * effectiveness * stab * (attack as f32 / level_scalar);
        }

        let utility_score = self.utility(&descriptor, side, attacker, defender, battle);
        let mut score = damage_score + utility_score;

        if descriptor.category == MoveCategory::Status && utility_score < 1.0 {
            return -1.0;
        }
        if descriptor.category != MoveCategory::Status {
            let accuracy = descriptor.accuracy.unwrap_or(101);
            score *= accuracy as f32 / 100.0;
        }
        score * self.random_factor(0.05)
    }

    fn utility(
        &self,
        descriptor: &MoveDescriptor,
        side: usize,
        attacker: &Combatant,
        defender: &Combatant,
        battle: &Battle,
    ) -> f32 {
        let opponent = 1 - side;
        let mut utility = 0.0;
        for effect in &descriptor.secondary {
            match *effect {
                SecondaryEffect::StatChange {
                    target: EffectTarget::User,
                    stat,
                    stages,
                    chance,
                } if stages > 0 => {
                    let current = attacker.stat_stage(stat);
                    if current < 6 {
                        let potential_gain = 1.0 - current as f32 / 6.0;
                        utility += 20.0 * stages as f32 * potential_gain * (chance as f32 / 100.0);
                    }
                }
                SecondaryEffect::StatChange {
                    target: EffectTarget::Target,
                    stat,
                    stages,
                    chance,
                } if stages < 0 => {
                    if defender.stat_stage(stat) > -6 {
                        utility += 15.0 * stages.unsigned_abs() as f32 * (chance as f32 / 100.0);
                    }
                }
                SecondaryEffect::Status { chance, .. } => {
                    if defender.status.is_none() {
                        utility += 45.0 * (chance as f32 / 100.0);
                    }
                }
                SecondaryEffect::Confuse { chance } => {
                    if !defender.has_volatile(VolatileKind::Confused) {
                        utility += 25.0 * (chance as f32 / 100.0);
                    }
                }
                SecondaryEffect::Flinch { chance } => {
                    utility += 30.0 * (chance as f32 / 100.0);
                }
                SecondaryEffect::Heal { percent } => {
                    let missing = 1.0 - attacker.current_hp() as f32 / attacker.max_hp() as f32;
                    utility += percent as f32 * missing;
                }
                _ => {}
            }
        }

        let opponent_has_bench = battle.rosters[opponent].has_alive_bench();
        utility += match descriptor.class {
            MoveClass::Protection(_) if attacker.consecutive_protects == 0 => 10.0,
            MoveClass::SetWeather(weather) if battle.field.weather != Some(weather) => 25.0,
            MoveClass::SetTerrain(terrain) if battle.field.terrain != Some(terrain) => 20.0,
            MoveClass::SetHazard(hazard)
                if opponent_has_bench && battle.sides[opponent].hazard_layers(hazard) == 0 =>
            {
                30.0
            }
            MoveClass::SetScreen(screen) if !battle.sides[side].has_screen(screen) => 30.0,
            MoveClass::SetGlobal(effect) if !battle.field.is_active(effect) => 15.0,
            MoveClass::ClearHazards if battle.sides[side].has_hazards() => 25.0,
            MoveClass::Substitute
                if !attacker.has_volatile(VolatileKind::Substitute)
                    && attacker.current_hp() > attacker.max_hp() / 2 =>
            {
                25.0
            }
            MoveClass::LeechSeed
                if !defender.has_volatile(VolatileKind::Seeded)
                    && !defender.has_type(PokemonType::Grass) =>
            {
                35.0
            }
            MoveClass::Taunt if !defender.has_volatile(VolatileKind::Taunted) => 15.0,
            MoveClass::Wish if attacker.current_hp() * 5 < attacker.max_hp() * 3 => 30.0,
            MoveClass::ForceOut if opponent_has_bench => 10.0,
            MoveClass::TrapTarget if !defender.has_volatile(VolatileKind::Trapped) => 10.0,
            _ => 0.0,
        };
        utility
    }

    /// A small positive baseline, better for a combatant that resists the
    /// opponent's typing.
    fn score_switch(&self, slot: usize, side: usize, battle: &Battle) -> f32 {
        let base_score = 1.0;
        let Some(candidate) = battle.rosters[side].member(slot) else {
            return 0.0;
        };
        let resists = battle.active(1 - side).map_or(0.0, |opponent| {
            let worst = opponent
                .types
                .iter()
                .map(|t| t.effectiveness_against(&candidate.types))
                .fold(0.0_f32, f32::max);
            if worst < 1.0 {
                2.0
            } else {
                0.0
            }
        });
        let health = candidate.current_hp() as f32 / candidate.max_hp().max(1) as f32;
        (base_score + resists + health) * self.random_factor(0.05)
    }

    fn best_switch(&self, side: usize, battle: &Battle) -> Option<(usize, f32)> {
        switch_targets(side, battle, &self.catalog)
            .into_iter()
            .map(|slot| (slot, self.score_switch(slot, side, battle)))
            .max_by_key(|(_, score)| OrderedFloat(*score))
    }
}

impl Behavior for ScoringAI {
    fn decide_action(&self, side: usize, battle: &Battle) -> TurnAction {
        if owes_switch(side, battle) {
            return match self.best_switch(side, battle) {
                Some((slot, _)) => TurnAction::Switch { slot },
                None => TurnAction::Forfeit,
            };
        }

        let best_move = selectable_moves(side, battle)
            .into_iter()
            .map(|name| {
                let score = self.score_move(&name, side, battle);
                (name, score)
            })
            .max_by_key(|(_, score)| OrderedFloat(*score));
        let best_switch = self.best_switch(side, battle);

        match (best_move, best_switch) {
            (Some((name, move_score)), Some((slot, switch_score))) => {
                if switch_score > move_score {
                    TurnAction::Switch { slot }
                } else {
                    TurnAction::UseMove { move_name: name }
                }
            }
            (Some((name, _)), None) => TurnAction::UseMove { move_name: name },
            (None, Some((slot, _))) => TurnAction::Switch { slot },
            (None, None) => TurnAction::use_move(UNIVERSAL_MOVE),
        }
    }
}

/// Fast fallback: the strongest usable attack, else the first healthy
/// switch, else the universal move. Always legal, never blocks.
pub struct HeuristicAI {
    catalog: CatalogView,
}

impl HeuristicAI {
    pub fn new(catalog: CatalogView) -> Self {
        Self { catalog }
    }
}

impl Behavior for HeuristicAI {
    fn decide_action(&self, side: usize, battle: &Battle) -> TurnAction {
        if owes_switch(side, battle) {
            return battle.rosters[side]
                .bench_slots()
                .next()
                .map_or(TurnAction::Forfeit, |slot| TurnAction::Switch { slot });
        }

        let defender = battle.active(1 - side);
        let strongest = selectable_moves(side, battle)
            .into_iter()
            .filter_map(|name| {
                let descriptor = self.catalog.move_descriptor(&name);
                if descriptor.category == MoveCategory::Status
                    || descriptor.target != MoveTarget::Opponent
                {
                    return None;
                }
                let effectiveness = defender.map_or(1.0, |d| effectiveness(&descriptor, d));
                let score = descriptor.power.unwrap_or(0) as f32 * effectiveness;
                (score > 0.0).then_some((name, score))
            })
            .max_by_key(|(_, score)| OrderedFloat(*score));
        if let Some((name, _)) = strongest {
            return TurnAction::UseMove { move_name: name };
        }

        if let Some(slot) = switch_targets(side, battle, &self.catalog).first() {
            return TurnAction::Switch { slot: *slot };
        }
        selectable_moves(side, battle)
            .into_iter()
            .next()
            .map_or_else(|| TurnAction::use_move(UNIVERSAL_MOVE), |name| TurnAction::UseMove { move_name: name })
    }
}
