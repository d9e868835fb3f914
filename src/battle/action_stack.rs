use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Why a switch is happening; decides which leaving/entry rules apply.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCause {
    Voluntary,
    /// A pivot move connected. `transfer` hands the allow-listed volatile state on.
    Pivot { transfer: bool },
    /// Dragged out by an opposing move.
    ForcedOut,
    /// Replacing a fainted combatant.
    Replacement,
}

/// Internal action types for the action stack
/// These represent atomic actions that can be executed during battle resolution
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum BattleAction {
    /// Side forfeits the battle
    Forfeit { side: usize },

    /// Side switches its active combatant
    Switch {
        side: usize,
        slot: usize,
        cause: SwitchCause,
    },

    /// Side uses a bag item on a roster slot
    UseItem {
        side: usize,
        item: String,
        target_slot: usize,
    },

    /// Side's active combatant uses a move. `forced` marks rampage/charge
    /// continuations, which spend no PP.
    Move {
        side: usize,
        move_name: String,
        forced: bool,
    },
}

impl BattleAction {
    pub fn side(&self) -> usize {
        match self {
            BattleAction::Forfeit { side }
            | BattleAction::Switch { side, .. }
            | BattleAction::UseItem { side, .. }
            | BattleAction::Move { side, .. } => *side,
        }
    }
}

/// Action stack for managing battle action execution
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ActionStack {
    actions: VecDeque<BattleAction>,
}

impl ActionStack {
    pub fn new() -> Self {
        Self {
            actions: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, action: BattleAction) {
        self.actions.push_back(action);
    }

    pub fn push_front(&mut self, action: BattleAction) {
        self.actions.push_front(action);
    }

    pub fn pop_front(&mut self) -> Option<BattleAction> {
        self.actions.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BattleAction> {
        self.actions.iter()
    }

    /// Whether `side` still has an action waiting.
    pub fn has_action_for(&self, side: usize) -> bool {
        self.actions.iter().any(|a| a.side() == side)
    }

    /// Drop every queued action belonging to `side`.
    pub fn remove_side(&mut self, side: usize) {
        self.actions.retain(|a| a.side() != side);
    }
}
