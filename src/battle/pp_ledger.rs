//! Remaining-use counters for every (side, slot, move). Every mutation is
//! clamped to the entry's `[min, max]` bounds.
use crate::catalog::CatalogView;
use crate::persistence::{RosterPp, SlotPp};
use crate::roster::Roster;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpEntry {
    pub current: u8,
    pub min: u8,
    pub max: u8,
}

impl PpEntry {
    pub fn full(max: u8) -> Self {
        Self {
            current: max,
            min: 0,
            max,
        }
    }

    /// Entries with a zero max carry no cap and are never spent.
    pub fn is_capped(&self) -> bool {
        self.max > 0
    }

    pub fn is_empty(&self) -> bool {
        self.is_capped() && self.current == 0
    }

    fn clamp(&mut self) {
        self.current = self.current.clamp(self.min.min(self.max), self.max);
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PpLedger {
    // [side][slot][move index], parallel to each combatant's move list
    entries: [Vec<Vec<PpEntry>>; 2],
}

impl PpLedger {
    /// Fresh ledger with every capped move at full PP.
    pub fn from_rosters(rosters: &[Roster; 2], catalog: &CatalogView) -> Self {
        let build = |roster: &Roster| {
            roster
                .members
                .iter()
                .map(|member| {
                    member
                        .moves
                        .iter()
                        .map(|name| PpEntry::full(catalog.max_pp(name)))
                        .collect()
                })
                .collect()
        };
        Self {
            entries: [build(&rosters[0]), build(&rosters[1])],
        }
    }

    /// Overlay stored PP for one side. Moves are matched by name per slot;
    /// stored values are clamped into the stored bounds.
    pub fn apply_stored(&mut self, side: usize, roster: &Roster, stored: &RosterPp) {
        let Some(side_entries) = self.entries.get_mut(side) else {
            return;
        };
        for (slot, member) in roster.members.iter().enumerate() {
            let (Some(slot_entries), Some(stored_slot)) =
                (side_entries.get_mut(slot), stored.slots.get(slot))
            else {
                continue;
            };
            for (move_index, name) in member.moves.iter().enumerate() {
                let Some(stored_index) = stored_slot.moves.iter().position(|m| m == name) else {
                    continue;
                };
                let (Some(entry), Some(current), Some(min), Some(max)) = (
                    slot_entries.get_mut(move_index),
                    stored_slot.current.get(stored_index),
                    stored_slot.min.get(stored_index),
                    stored_slot.max.get(stored_index),
                ) else {
                    continue;
                };
                entry.current = *current;
                entry.min = *min;
                entry.max = *max;
                entry.clamp();
            }
        }
        debug!(side, "applied stored PP");
    }

    /// Export one side in the persisted shape.
    pub fn to_roster_pp(&self, side: usize, roster: &Roster) -> RosterPp {
        let slots = roster
            .members
            .iter()
            .enumerate()
            .map(|(slot, member)| {
                let entries = self
                    .entries
                    .get(side)
                    .and_then(|s| s.get(slot))
                    .cloned()
                    .unwrap_or_default();
                SlotPp {
                    moves: member.moves.clone(),
                    current: entries.iter().map(|e| e.current).collect(),
                    min: entries.iter().map(|e| e.min).collect(),
                    max: entries.iter().map(|e| e.max).collect(),
                }
            })
            .collect();
        RosterPp { slots }
    }

    pub fn entry(&self, side: usize, slot: usize, move_index: usize) -> Option<&PpEntry> {
        self.entries.get(side)?.get(slot)?.get(move_index)
    }

    fn entry_mut(&mut self, side: usize, slot: usize, move_index: usize) -> Option<&mut PpEntry> {
        self.entries.get_mut(side)?.get_mut(slot)?.get_mut(move_index)
    }

    /// Whether the move can still be selected. Uncapped moves always can.
    pub fn has_pp(&self, side: usize, slot: usize, move_index: usize) -> bool {
        self.entry(side, slot, move_index)
            .map_or(false, |entry| !entry.is_empty())
    }

    /// Spend `cost` PP, returning (before, after) for capped moves.
    pub fn spend(
        &mut self,
        side: usize,
        slot: usize,
        move_index: usize,
        cost: u8,
    ) -> Option<(u8, u8)> {
        let entry = self.entry_mut(side, slot, move_index)?;
        if !entry.is_capped() {
            return None;
        }
        let before = entry.current;
        entry.current = before.saturating_sub(cost).max(entry.min);
        Some((before, entry.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{test_catalog, TestCombatantBuilder};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn rosters() -> [Roster; 2] {
        let a = TestCombatantBuilder::new("pikachu")
            .with_moves(&["thunderbolt", "struggle"])
            .build();
        let b = TestCombatantBuilder::new("snorlax").with_moves(&["tackle"]).build();
        [
            Roster::new("p1".into(), "Player 1".into(), vec![a]),
            Roster::new("p2".into(), "Player 2".into(), vec![b]),
        ]
    }

    #[test]
    fn test_ledger_starts_full() {
        let ledger = PpLedger::from_rosters(&rosters(), &test_catalog());

        assert_eq!(ledger.entry(0, 0, 0), Some(&PpEntry::full(15)));
        assert_eq!(ledger.entry(1, 0, 0), Some(&PpEntry::full(35)));
        assert!(!ledger.entry(0, 0, 1).map_or(true, |e| e.is_capped()));
        assert!(ledger.has_pp(0, 0, 1), "uncapped moves are always selectable");
    }

    #[rstest]
    #[case(15, 1, 14)]
    #[case(15, 2, 13)]
    #[case(1, 2, 0)]
    #[case(0, 1, 0)]
    fn test_spend_clamps_at_zero(#[case] before: u8, #[case] cost: u8, #[case] expected: u8) {
        let mut ledger = PpLedger::from_rosters(&rosters(), &test_catalog());
        ledger.entries[0][0][0].current = before;

        assert_eq!(ledger.spend(0, 0, 0, cost), Some((before, expected)));
    }

    #[test]
    fn test_spend_respects_stored_minimum() {
        let mut ledger = PpLedger::from_rosters(&rosters(), &test_catalog());
        ledger.entries[0][0][0] = PpEntry {
            current: 3,
            min: 2,
            max: 15,
        };

        assert_eq!(ledger.spend(0, 0, 0, 5), Some((3, 2)));
        assert_eq!(ledger.spend(0, 0, 1, 1), None, "struggle is uncapped");
    }

    #[test]
    fn test_stored_pp_round_trip_is_clamped() {
        let rosters = rosters();
        let mut ledger = PpLedger::from_rosters(&rosters, &test_catalog());
        let stored = RosterPp {
            slots: vec![SlotPp {
                moves: vec!["thunderbolt".into()],
                current: vec![40],
                min: vec![0],
                max: vec![24],
            }],
        };

        ledger.apply_stored(0, &rosters[0], &stored);
        assert_eq!(ledger.entry(0, 0, 0).map(|e| e.current), Some(24));

        let exported = ledger.to_roster_pp(0, &rosters[0]);
        assert_eq!(exported.slots[0].moves, vec!["thunderbolt", "struggle"]);
        assert_eq!(exported.slots[0].current, vec![24, 0]);
        assert_eq!(exported.slots[0].max, vec![24, 0]);
    }
}
