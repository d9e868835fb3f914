//! Structured hooks fired during resolution. Observers are notified after the
//! state change has been applied and cannot alter the outcome.
use crate::battle::state::Battle;
use crate::battle::transform::TransformationKind;
use std::sync::Arc;
use tracing::info;

pub trait BattleObserver: Send + Sync {
    fn on_faint(&self, _battle: &Battle, _side: usize, _name: &str) {}

    fn on_switch(&self, _battle: &Battle, _side: usize, _old_name: &str, _new_name: &str) {}

    fn on_transform(&self, _battle: &Battle, _side: usize, _kind: TransformationKind) {}
}

/// Fan-out list of observers.
#[derive(Clone, Default)]
pub struct HookRegistry {
    observers: Vec<Arc<dyn BattleObserver>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn BattleObserver>) {
        self.observers.push(observer);
    }

    pub fn with_observer(mut self, observer: Arc<dyn BattleObserver>) -> Self {
        self.register(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify_faint(&self, battle: &Battle, side: usize, name: &str) {
        for observer in &self.observers {
            observer.on_faint(battle, side, name);
        }
    }

    pub fn notify_switch(&self, battle: &Battle, side: usize, old_name: &str, new_name: &str) {
        for observer in &self.observers {
            observer.on_switch(battle, side, old_name, new_name);
        }
    }

    pub fn notify_transform(&self, battle: &Battle, side: usize, kind: TransformationKind) {
        for observer in &self.observers {
            observer.on_transform(battle, side, kind);
        }
    }
}

/// Logs every hook through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BattleObserver for TracingObserver {
    fn on_faint(&self, battle: &Battle, side: usize, name: &str) {
        info!(battle_id = %battle.battle_id, turn = battle.turn_number, side, name, "combatant fainted");
    }

    fn on_switch(&self, battle: &Battle, side: usize, old_name: &str, new_name: &str) {
        info!(
            battle_id = %battle.battle_id,
            turn = battle.turn_number,
            side,
            old_name,
            new_name,
            "combatant switched"
        );
    }

    fn on_transform(&self, battle: &Battle, side: usize, kind: TransformationKind) {
        info!(battle_id = %battle.battle_id, turn = battle.turn_number, side, %kind, "transformation");
    }
}
