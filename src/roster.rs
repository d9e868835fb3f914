use crate::combatant::{Combatant, CombatantTemplate};
use crate::errors::BattleStateError;
use serde::{Deserialize, Serialize};

pub const MAX_ROSTER_SIZE: usize = 6;

/// Serialized roster as handed over by a roster source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterTemplate {
    pub id: String,
    pub trainer_name: String,
    pub members: Vec<CombatantTemplate>,
}

/// A side's ordered set of combatants with exactly one active slot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Roster {
    // Identifier used by the persistence collaborator. For a human this could
    // be an account id, for an automated trainer something like "AI_Rival".
    pub id: String,
    pub trainer_name: String,
    pub members: Vec<Combatant>,
    pub active: usize,
}

impl Roster {
    pub fn new(id: String, trainer_name: String, members: Vec<Combatant>) -> Self {
        Roster {
            id,
            trainer_name,
            members: members.into_iter().take(MAX_ROSTER_SIZE).collect(),
            active: 0,
        }
    }

    pub fn from_template(template: &RosterTemplate) -> Self {
        let members = template
            .members
            .iter()
            .map(Combatant::from_template)
            .collect();
        Self::new(template.id.clone(), template.trainer_name.clone(), members)
    }

    pub fn validate(&self, side: usize) -> Result<(), BattleStateError> {
        let count = self.members.len();
        if count == 0 || count > MAX_ROSTER_SIZE {
            return Err(BattleStateError::InvalidRosterSize { side, count });
        }
        Ok(())
    }

    /// Get the currently active combatant
    pub fn active(&self) -> Option<&Combatant> {
        self.members.get(self.active)
    }

    /// Get the currently active combatant mutably
    pub fn active_mut(&mut self) -> Option<&mut Combatant> {
        self.members.get_mut(self.active)
    }

    pub fn member(&self, slot: usize) -> Option<&Combatant> {
        self.members.get(slot)
    }

    pub fn member_mut(&mut self, slot: usize) -> Option<&mut Combatant> {
        self.members.get_mut(slot)
    }

    pub fn alive_count(&self) -> usize {
        self.members.iter().filter(|c| c.is_alive()).count()
    }

    pub fn has_alive(&self) -> bool {
        self.alive_count() > 0
    }

    /// Whether a benched combatant could come in.
    pub fn has_alive_bench(&self) -> bool {
        self.bench_slots().next().is_some()
    }

    /// Alive slots other than the active one.
    pub fn bench_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter(move |(slot, c)| *slot != self.active && c.is_alive())
            .map(|(slot, _)| slot)
    }

    /// A switch target must exist, be alive and not already active.
    pub fn is_valid_switch_target(&self, slot: usize) -> bool {
        slot != self.active && self.members.get(slot).is_some_and(|c| c.is_alive())
    }

    pub fn active_is_fainted(&self) -> bool {
        self.active().map_or(true, |c| c.is_fainted())
    }
}
