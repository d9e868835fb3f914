//! Once-per-battle transformations. A side requests one alongside its turn
//! action; the request is committed after switches resolve and before the
//! first move, and only if the side is actually using a move this turn.
use crate::battle::conditions::{VolatileCondition, VolatileKind};
use crate::battle::engine::BattleEnv;
use crate::battle::power_moves::{crystal_type, z_move};
use crate::battle::state::{Battle, BattleEvent, EventBus, TurnAction};
use crate::catalog::CatalogView;
use crate::combatant::Combatant;
use schema::ItemEffect;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TransformationKind {
    #[strum(serialize = "mega evolution")]
    Mega,
    #[strum(serialize = "dynamax")]
    Dynamax,
    #[strum(serialize = "terastallization")]
    Terastallize,
    #[strum(serialize = "Z-move")]
    ZMove,
}

impl TransformationKind {
    pub fn activation_text(self) -> &'static str {
        match self {
            TransformationKind::Mega => "mega evolved",
            TransformationKind::Dynamax => "dynamaxed",
            TransformationKind::Terastallize => "terastallized",
            TransformationKind::ZMove => "surrounded itself with its Z-Power",
        }
    }
}

/// Capability check for transformations (equipment, unlocks). The engine
/// only asks; it never decides eligibility itself.
pub trait TransformationGate: Send + Sync {
    fn can_transform(
        &self,
        kind: TransformationKind,
        combatant: &Combatant,
        catalog: &CatalogView,
    ) -> bool;
}

/// Default gate: eligibility follows the held item and tera type.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquipmentGate;

impl TransformationGate for EquipmentGate {
    fn can_transform(
        &self,
        kind: TransformationKind,
        combatant: &Combatant,
        catalog: &CatalogView,
    ) -> bool {
        let held = combatant.item.as_deref().map(|item| catalog.item(item).effect.clone());
        match kind {
            TransformationKind::Mega => {
                !combatant.mega_evolved && matches!(held, Some(ItemEffect::MegaStone { .. }))
            }
            TransformationKind::ZMove => matches!(held, Some(ItemEffect::ZCrystal { .. })),
            TransformationKind::Terastallize => {
                !combatant.terastallized && combatant.tera_type.is_some()
            }
            TransformationKind::Dynamax => !combatant.has_volatile(VolatileKind::Dynamaxed),
        }
    }
}

/// Commit or cancel every pending transformation request. `actions` are the
/// normalised actions for this turn.
pub fn apply_pending_transformations(
    battle: &mut Battle,
    actions: &[Option<TurnAction>; 2],
    env: &BattleEnv,
    bus: &mut EventBus,
) {
    for side in 0..2 {
        let Some(kind) = battle.pending_transformations[side].take() else {
            continue;
        };

        let chosen_move = match &actions[side] {
            Some(TurnAction::UseMove { move_name }) => Some(move_name.as_str()),
            _ => None,
        };
        let using_move = chosen_move.is_some();
        let already_used = battle.sides[side].transformation_used.is_some();
        let eligible = battle.active(side).is_some_and(|c| {
            c.is_alive()
                && env.gate.can_transform(kind, c, env.catalog)
                && (kind != TransformationKind::ZMove
                    || chosen_move.is_some_and(|name| has_z_move(c, name, env.catalog)))
        });

        if !using_move || already_used || !eligible {
            debug!(
                side,
                %kind,
                using_move,
                already_used,
                eligible,
                "transformation request dropped"
            );
            bus.push(BattleEvent::TransformationCancelled { side, kind });
            continue;
        }

        let Some(combatant) = battle.active_mut(side) else {
            continue;
        };
        if !transform(combatant, kind, env) {
            bus.push(BattleEvent::TransformationCancelled { side, kind });
            continue;
        }

        let name = combatant.name().to_string();
        battle.sides[side].transformation_used = Some(kind);
        bus.push(BattleEvent::Transformed { side, name, kind });
        env.hooks.notify_transform(battle, side, kind);
    }
}

fn transform(combatant: &mut Combatant, kind: TransformationKind, env: &BattleEnv) -> bool {
    match kind {
        TransformationKind::Mega => {
            let Some(item) = combatant.item.clone() else {
                return false;
            };
            let ItemEffect::MegaStone {
                species,
                ability,
                types,
                base_stats,
            } = env.catalog.item(&item).effect.clone()
            else {
                return false;
            };
            // Mega forms stay for the rest of the battle, so they replace the base values too.
            combatant.species = species;
            combatant.base_ability = ability.clone();
            combatant.ability = ability;
            combatant.base_types = types.clone();
            combatant.types = types;
            combatant.base_stats = base_stats;
            combatant.recalculate_stats();
            combatant.mega_evolved = true;
        }
        TransformationKind::Dynamax => {
            combatant.scale_hp(2, 1);
            combatant.add_volatile(VolatileCondition::Dynamaxed {
                turns_remaining: env.rules.dynamax_turns,
            });
        }
        TransformationKind::Terastallize => {
            let Some(tera) = combatant.tera_type else {
                return false;
            };
            combatant.types = vec![tera];
            combatant.terastallized = true;
        }
        TransformationKind::ZMove => {
            combatant.add_volatile(VolatileCondition::ZPowered);
        }
    }
    true
}

/// A Z-move needs an attack matching the held crystal's type.
fn has_z_move(combatant: &Combatant, move_name: &str, catalog: &CatalogView) -> bool {
    crystal_type(combatant, catalog)
        .and_then(|crystal| z_move(&catalog.move_descriptor(move_name), crystal))
        .is_some()
}

/// Undo dynamax, halving HP back. Returns true if the combatant was dynamaxed.
pub fn revert_dynamax(combatant: &mut Combatant) -> bool {
    if combatant.remove_volatile(VolatileKind::Dynamaxed).is_none() {
        return false;
    }
    combatant.scale_hp(1, 2);
    true
}
