use crate::battle::state::{Battle, TurnAction, TurnRng};
use crate::battle::stats::effective_speed;
use crate::catalog::CatalogView;
use schema::{AbilityEffect, GlobalEffect};
use std::cmp::Ordering;
use tracing::debug;

/// Sort key for one side's action. Compared field by field, higher first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ActionRank {
    pub class: u8,
    pub priority: i8,
    /// Negated under Trick Room; priority never is.
    pub speed: i64,
}

fn action_class(action: &TurnAction) -> u8 {
    match action {
        TurnAction::Forfeit => 3,
        TurnAction::Switch { .. } => 2,
        TurnAction::UseItem { .. } => 1,
        TurnAction::UseMove { .. } => 0,
    }
}

/// Priority of a move action, including the Prankster bump for status moves.
pub fn move_priority(side: usize, move_name: &str, battle: &Battle, catalog: &CatalogView) -> i8 {
    let descriptor = catalog.move_descriptor(move_name);
    let mut priority = descriptor.priority;
    let prankster = battle
        .active(side)
        .is_some_and(|c| catalog.active_ability(c) == AbilityEffect::Prankster);
    if prankster && descriptor.is_status() {
        priority = priority.saturating_add(1);
    }
    priority
}

pub fn rank_action(
    side: usize,
    action: &TurnAction,
    battle: &Battle,
    catalog: &CatalogView,
) -> ActionRank {
    let priority = match action {
        TurnAction::UseMove { move_name } => move_priority(side, move_name, battle, catalog),
        _ => 0,
    };
    let speed = battle
        .active(side)
        .map(|c| effective_speed(c, &battle.sides[side], &battle.field, catalog) as i64)
        .unwrap_or(0);
    let speed = if battle.field.is_active(GlobalEffect::TrickRoom) {
        -speed
    } else {
        speed
    };

    ActionRank {
        class: action_class(action),
        priority,
        speed,
    }
}

/// Order the two normalised actions. Returns side indices, first actor first.
/// An exact tie costs one coin flip.
pub fn determine_action_order(
    battle: &Battle,
    actions: &[TurnAction; 2],
    catalog: &CatalogView,
    rng: &mut TurnRng,
) -> [usize; 2] {
    let first = rank_action(0, &actions[0], battle, catalog);
    let second = rank_action(1, &actions[1], battle, catalog);

    let order = match first.cmp(&second) {
        Ordering::Greater => [0, 1],
        Ordering::Less => [1, 0],
        Ordering::Equal => {
            if rng.coin_flip("speed tie") {
                [0, 1]
            } else {
                [1, 0]
            }
        }
    };
    debug!(?first, ?second, ?order, "turn order");
    order
}
