//! Turns raw choices into legal, executable actions. Never fails: anything
//! illegal or stale is replaced by the closest legal action.
use crate::battle::conditions::{VolatileCondition, VolatileKind};
use crate::battle::state::{Battle, TurnAction};
use crate::battle::stats::is_grounded;
use crate::catalog::{normalize_name, CatalogView};
use crate::combatant::Combatant;
use schema::{AbilityEffect, ItemEffect, PokemonType, UNIVERSAL_MOVE};
use tracing::debug;

/// What the normaliser changed, when it changed something worth logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    SwitchBlockedByTrap,
    ForcedMove,
    ChoiceLocked,
    OutOfPp,
    Replaced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAction {
    pub action: TurnAction,
    pub adjustment: Option<Adjustment>,
}

impl NormalizedAction {
    fn kept(action: TurnAction) -> Self {
        Self {
            action,
            adjustment: None,
        }
    }

    fn adjusted(action: TurnAction, adjustment: Adjustment) -> Self {
        Self {
            action,
            adjustment: Some(adjustment),
        }
    }
}

/// The move a combatant is locked into by rampage, charging or recharging.
pub fn forced_move(combatant: &Combatant) -> Option<String> {
    for kind in [
        VolatileKind::Rampaging,
        VolatileKind::Charging,
        VolatileKind::Recharging,
    ] {
        match combatant.volatile(kind) {
            Some(VolatileCondition::Rampaging { move_name, .. })
            | Some(VolatileCondition::Charging { move_name }) => return Some(move_name.clone()),
            Some(VolatileCondition::Recharging) => {
                return Some(
                    combatant
                        .last_move
                        .clone()
                        .unwrap_or_else(|| UNIVERSAL_MOVE.to_string()),
                )
            }
            _ => {}
        }
    }
    None
}

/// Normalise both sides' raw actions for a regular turn.
pub fn normalize_actions(battle: &Battle, catalog: &CatalogView) -> [NormalizedAction; 2] {
    // Abilities stop a switch only if the other side is not itself switching out.
    let switching = [0, 1].map(|side| attempts_valid_switch(battle, side));
    [0, 1].map(|side| normalize(side, battle, catalog, switching[1 - side]))
}

/// Normalise one side's action. `opponent_switching` enables the
/// simultaneous-switch bypass for trapping abilities.
pub fn normalize(
    side: usize,
    battle: &Battle,
    catalog: &CatalogView,
    opponent_switching: bool,
) -> NormalizedAction {
    let Some(combatant) = battle.active(side) else {
        return NormalizedAction::kept(TurnAction::Forfeit);
    };
    let raw = battle.action_queue.get(side).and_then(|a| a.clone());

    if matches!(raw, Some(TurnAction::Forfeit)) {
        return NormalizedAction::kept(TurnAction::Forfeit);
    }

    if let Some(forced) = forced_move(combatant) {
        return NormalizedAction::adjusted(TurnAction::use_move(&forced), Adjustment::ForcedMove);
    }

    let normalized = match raw {
        None => NormalizedAction::adjusted(default_move(side, battle), Adjustment::Replaced),
        Some(TurnAction::Forfeit) => NormalizedAction::kept(TurnAction::Forfeit),
        Some(TurnAction::Switch { slot }) => {
            normalize_switch(side, slot, battle, catalog, opponent_switching)
        }
        Some(TurnAction::UseItem { item, target_slot }) => {
            normalize_item(side, item, target_slot, battle, catalog)
        }
        Some(TurnAction::UseMove { move_name }) => normalize_move(side, &move_name, battle),
    };

    if normalized.adjustment.is_some() {
        debug!(side, action = %normalized.action, adjustment = ?normalized.adjustment, "normalised action");
    }
    normalized
}

fn normalize_switch(
    side: usize,
    slot: usize,
    battle: &Battle,
    catalog: &CatalogView,
    opponent_switching: bool,
) -> NormalizedAction {
    if !battle.rosters[side].is_valid_switch_target(slot) {
        return NormalizedAction::adjusted(default_move(side, battle), Adjustment::Replaced);
    }
    if is_move_trapped(side, battle)
        || (!opponent_switching && is_ability_trapped(side, battle, catalog))
    {
        return NormalizedAction::adjusted(
            default_move(side, battle),
            Adjustment::SwitchBlockedByTrap,
        );
    }
    NormalizedAction::kept(TurnAction::Switch { slot })
}

fn normalize_item(
    side: usize,
    item: String,
    target_slot: usize,
    battle: &Battle,
    catalog: &CatalogView,
) -> NormalizedAction {
    let usable = matches!(catalog.item(&item).effect, ItemEffect::Medicine { .. });
    let target_alive = battle.rosters[side]
        .member(target_slot)
        .is_some_and(|c| c.is_alive());
    if usable && target_alive {
        NormalizedAction::kept(TurnAction::UseItem { item, target_slot })
    } else {
        NormalizedAction::adjusted(default_move(side, battle), Adjustment::Replaced)
    }
}

fn normalize_move(side: usize, move_name: &str, battle: &Battle) -> NormalizedAction {
    let slot = battle.active_slot(side);
    let Some(combatant) = battle.active(side) else {
        return NormalizedAction::kept(TurnAction::Forfeit);
    };

    if let Some(locked) = combatant.choice_locked_move() {
        let action = match combatant.knows_move(locked) {
            Some(index) if battle.pp.has_pp(side, slot, index) => TurnAction::use_move(locked),
            _ => TurnAction::use_move(UNIVERSAL_MOVE),
        };
        return if action == TurnAction::use_move(move_name) {
            NormalizedAction::kept(action)
        } else {
            NormalizedAction::adjusted(action, Adjustment::ChoiceLocked)
        };
    }

    if normalize_name(move_name) == UNIVERSAL_MOVE {
        return NormalizedAction::kept(TurnAction::use_move(UNIVERSAL_MOVE));
    }

    match known_move_index(combatant, move_name) {
        Some(index) if battle.pp.has_pp(side, slot, index) => {
            NormalizedAction::kept(TurnAction::use_move(&combatant.moves[index]))
        }
        Some(_) => NormalizedAction::adjusted(TurnAction::use_move(UNIVERSAL_MOVE), Adjustment::OutOfPp),
        None => NormalizedAction::adjusted(default_move(side, battle), Adjustment::Replaced),
    }
}

fn known_move_index(combatant: &Combatant, move_name: &str) -> Option<usize> {
    let wanted = normalize_name(move_name);
    combatant
        .moves
        .iter()
        .position(|m| normalize_name(m) == wanted)
}

/// First selectable move, or the universal move if nothing has PP left.
pub fn default_move(side: usize, battle: &Battle) -> TurnAction {
    let slot = battle.active_slot(side);
    let Some(combatant) = battle.active(side) else {
        return TurnAction::use_move(UNIVERSAL_MOVE);
    };
    if let Some(locked) = combatant.choice_locked_move() {
        return match combatant.knows_move(locked) {
            Some(index) if battle.pp.has_pp(side, slot, index) => TurnAction::use_move(locked),
            _ => TurnAction::use_move(UNIVERSAL_MOVE),
        };
    }
    combatant
        .moves
        .iter()
        .enumerate()
        .find(|(index, _)| battle.pp.has_pp(side, slot, *index))
        .map(|(_, name)| TurnAction::use_move(name))
        .unwrap_or_else(|| TurnAction::use_move(UNIVERSAL_MOVE))
}

fn attempts_valid_switch(battle: &Battle, side: usize) -> bool {
    let Some(TurnAction::Switch { slot }) = battle.action_queue[side] else {
        return false;
    };
    let forced = battle.active(side).and_then(forced_move).is_some();
    !forced && battle.rosters[side].is_valid_switch_target(slot) && !is_move_trapped(side, battle)
}

/// Trapped by a move (Mean Look, binding). Always blocks switching.
pub fn is_move_trapped(side: usize, battle: &Battle) -> bool {
    battle.active(side).is_some_and(|c| {
        c.has_volatile(VolatileKind::Trapped) || c.has_volatile(VolatileKind::PartiallyTrapped)
    })
}

/// Trapped by the opposing active combatant's ability. Ghosts always escape.
pub fn is_ability_trapped(side: usize, battle: &Battle, catalog: &CatalogView) -> bool {
    let (Some(own), Some(opponent)) = (battle.active(side), battle.active(1 - side)) else {
        return false;
    };
    if opponent.is_fainted() || own.has_type(PokemonType::Ghost) {
        return false;
    }
    match catalog.active_ability(opponent) {
        AbilityEffect::TrapsOpponent => true,
        AbilityEffect::TrapsGrounded => is_grounded(own, &battle.field, catalog),
        AbilityEffect::TrapsSteel => own.has_type(PokemonType::Steel),
        _ => false,
    }
}
