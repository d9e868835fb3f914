//! Per-side conditions: entry hazards, screens, pending timers and the
//! once-per-battle transformation flag.
use crate::battle::transform::TransformationKind;
use schema::{Hazard, Screen};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An attack registered now that lands on this side later.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PendingDelayedAttack {
    pub move_name: String,
    pub user_name: String,
    pub damage: u16,
    pub turns_remaining: u8,
}

/// Healing pledged by a combatant on this side for a later turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PendingWish {
    pub user_name: String,
    pub heal_amount: u16,
    pub turns_remaining: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardChange {
    Added { layers: u8 },
    AtMaxLayers,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SideState {
    /// Hazard layers laid on this side.
    pub hazards: HashMap<Hazard, u8>,
    /// Screens protecting this side, value is turns remaining.
    pub screens: HashMap<Screen, u8>,
    pub delayed_attacks: Vec<PendingDelayedAttack>,
    pub wish: Option<PendingWish>,
    pub transformation_used: Option<TransformationKind>,
    // Per-turn flags, reset at the start of every turn.
    pub switched_this_turn: bool,
    pub moved_this_turn: bool,
}

impl SideState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hazard_layers(&self, hazard: Hazard) -> u8 {
        self.hazards.get(&hazard).copied().unwrap_or(0)
    }

    pub fn has_hazards(&self) -> bool {
        !self.hazards.is_empty()
    }

    /// Add one layer of a hazard, failing once the hazard is at `max_layers`.
    pub fn add_hazard(&mut self, hazard: Hazard, max_layers: u8) -> HazardChange {
        let layers = self.hazard_layers(hazard);
        if layers >= max_layers.max(1) {
            return HazardChange::AtMaxLayers;
        }
        self.hazards.insert(hazard, layers + 1);
        HazardChange::Added { layers: layers + 1 }
    }

    pub fn remove_hazard(&mut self, hazard: Hazard) -> bool {
        self.hazards.remove(&hazard).is_some()
    }

    /// Remove every hazard, returning what was cleared.
    pub fn clear_hazards(&mut self) -> Vec<Hazard> {
        let mut cleared: Vec<Hazard> = self.hazards.drain().map(|(h, _)| h).collect();
        cleared.sort_by_key(|h| h.to_string());
        cleared
    }

    pub fn has_screen(&self, screen: Screen) -> bool {
        self.screens.contains_key(&screen)
    }

    /// Raise a screen. Returns false if it is already up.
    pub fn set_screen(&mut self, screen: Screen, turns: u8) -> bool {
        if self.has_screen(screen) {
            return false;
        }
        self.screens.insert(screen, turns);
        true
    }

    /// Decrement all screen turns and remove expired ones, returning those that expired.
    pub fn tick_screens(&mut self) -> Vec<Screen> {
        let mut expired = Vec::new();
        self.screens.retain(|screen, turns| {
            *turns = turns.saturating_sub(1);
            if *turns == 0 {
                expired.push(*screen);
                false
            } else {
                true
            }
        });
        expired.sort_by_key(|s| s.to_string());
        expired
    }

    pub fn reset_turn_flags(&mut self) {
        self.switched_this_turn = false;
        self.moved_this_turn = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hazard_layers_cap() {
        let mut side = SideState::new();

        assert_eq!(side.add_hazard(Hazard::Spikes, 3), HazardChange::Added { layers: 1 });
        assert_eq!(side.add_hazard(Hazard::Spikes, 3), HazardChange::Added { layers: 2 });
        assert_eq!(side.add_hazard(Hazard::Spikes, 3), HazardChange::Added { layers: 3 });
        assert_eq!(side.add_hazard(Hazard::Spikes, 3), HazardChange::AtMaxLayers);
        assert_eq!(side.hazard_layers(Hazard::Spikes), 3);

        assert_eq!(side.add_hazard(Hazard::StealthRock, 1), HazardChange::Added { layers: 1 });
        assert_eq!(side.add_hazard(Hazard::StealthRock, 1), HazardChange::AtMaxLayers);
    }

    #[test]
    fn test_clear_hazards_reports_cleared() {
        let mut side = SideState::new();
        side.add_hazard(Hazard::Spikes, 3);
        side.add_hazard(Hazard::StealthRock, 1);

        assert_eq!(side.clear_hazards(), vec![Hazard::Spikes, Hazard::StealthRock]);
        assert!(!side.has_hazards());
    }

    #[test]
    fn test_screens_tick_and_expire() {
        let mut side = SideState::new();
        assert!(side.set_screen(Screen::Reflect, 2));
        assert!(!side.set_screen(Screen::Reflect, 5), "already up");
        side.set_screen(Screen::Tailwind, 1);

        assert_eq!(side.tick_screens(), vec![Screen::Tailwind]);
        assert_eq!(side.tick_screens(), vec![Screen::Reflect]);
        assert!(side.screens.is_empty());
    }
}
