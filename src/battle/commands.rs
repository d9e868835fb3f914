use crate::battle::conditions::{VolatileCondition, VolatileKind};
use crate::battle::hooks::HookRegistry;
use crate::battle::state::{Battle, BattleEvent, EventBus, GameState, ResidualSource};
use crate::combatant::StatusCondition;
use crate::errors::BattleStateError;
use schema::StatType;
use tracing::debug;

/// Atomic commands representing final state changes
#[derive(Debug, Clone, PartialEq)]
pub enum BattleCommand {
    // Direct state changes
    SetGameState(GameState),
    IncrementTurnNumber,
    ClearActionQueue,

    // Active combatant modifications
    DealDamage {
        side: usize,
        amount: u16,
        /// `None` for a direct hit, otherwise the indirect source for the log.
        source: Option<ResidualSource>,
    },
    Heal {
        side: usize,
        amount: u16,
    },
    SetStatus {
        side: usize,
        status: Option<StatusCondition>,
    },
    AddVolatile {
        side: usize,
        condition: VolatileCondition,
    },
    RemoveVolatile {
        side: usize,
        kind: VolatileKind,
    },
    ChangeStatStage {
        side: usize,
        stat: StatType,
        delta: i8,
    },

    // Battle flow
    EmitEvent(BattleEvent),
}

/// Execute a batch of commands in order, stopping at the first failure.
pub fn execute_command_batch(
    commands: Vec<BattleCommand>,
    battle: &mut Battle,
    bus: &mut EventBus,
    hooks: &HookRegistry,
) -> Result<(), BattleStateError> {
    for command in commands {
        execute_command(command, battle, bus, hooks)?;
    }
    Ok(())
}

pub fn execute_command(
    command: BattleCommand,
    battle: &mut Battle,
    bus: &mut EventBus,
    hooks: &HookRegistry,
) -> Result<(), BattleStateError> {
    match command {
        BattleCommand::EmitEvent(event) => {
            bus.push(event);
            Ok(())
        }
        BattleCommand::DealDamage {
            side,
            amount,
            source,
        } => execute_deal_damage_command(side, amount, source, battle, bus, hooks),
        BattleCommand::Heal { side, amount } => {
            let combatant = active_mut(battle, side)?;
            let healed = combatant.heal(amount);
            if healed > 0 {
                let event = BattleEvent::CombatantHealed {
                    side,
                    name: combatant.name().to_string(),
                    amount: healed,
                    new_hp: combatant.current_hp(),
                };
                bus.push(event);
            }
            Ok(())
        }
        BattleCommand::SetStatus { side, status } => {
            let combatant = active_mut(battle, side)?;
            let name = combatant.name().to_string();
            let previous = std::mem::replace(&mut combatant.status, status);
            match (previous, status) {
                (_, Some(applied)) => bus.push(BattleEvent::StatusApplied {
                    side,
                    name,
                    status: applied,
                }),
                (Some(removed), None) => bus.push(BattleEvent::StatusRemoved {
                    side,
                    name,
                    status: removed,
                }),
                (None, None) => {}
            }
            Ok(())
        }
        BattleCommand::AddVolatile { side, condition } => {
            let combatant = active_mut(battle, side)?;
            let kind = condition.kind();
            combatant.add_volatile(condition);
            bus.push(BattleEvent::VolatileApplied {
                side,
                name: combatant.name().to_string(),
                kind,
            });
            Ok(())
        }
        BattleCommand::RemoveVolatile { side, kind } => {
            let combatant = active_mut(battle, side)?;
            combatant.remove_volatile(kind);
            Ok(())
        }
        BattleCommand::ChangeStatStage { side, stat, delta } => {
            let combatant = active_mut(battle, side)?;
            let name = combatant.name().to_string();
            let (old_stage, new_stage) = combatant.modify_stat_stage(stat, delta);
            if old_stage == new_stage {
                bus.push(BattleEvent::StatChangeBlocked { side, name, stat });
            } else {
                bus.push(BattleEvent::StatStageChanged {
                    side,
                    name,
                    stat,
                    old_stage,
                    new_stage,
                });
            }
            Ok(())
        }
        BattleCommand::SetGameState(new_state) => {
            battle.game_state = new_state;
            Ok(())
        }
        BattleCommand::IncrementTurnNumber => {
            battle.turn_number += 1;
            Ok(())
        }
        BattleCommand::ClearActionQueue => {
            battle.action_queue = [None, None];
            Ok(())
        }
    }
}

fn active_mut(
    battle: &mut Battle,
    side: usize,
) -> Result<&mut crate::combatant::Combatant, BattleStateError> {
    if side > 1 {
        return Err(BattleStateError::InvalidSide(side));
    }
    battle
        .active_mut(side)
        .ok_or(BattleStateError::NoActiveCombatant(side))
}

/// DealDamage with event emission and the fainting cascade
fn execute_deal_damage_command(
    side: usize,
    amount: u16,
    source: Option<ResidualSource>,
    battle: &mut Battle,
    bus: &mut EventBus,
    hooks: &HookRegistry,
) -> Result<(), BattleStateError> {
    let combatant = active_mut(battle, side)?;
    if combatant.is_fainted() {
        return Ok(());
    }
    let did_faint = combatant.take_damage(amount);
    let name = combatant.name().to_string();
    let remaining_hp = combatant.current_hp();

    match source {
        None => bus.push(BattleEvent::DamageDealt {
            side,
            target_name: name.clone(),
            damage: amount,
            remaining_hp,
        }),
        Some(source) => bus.push(BattleEvent::ResidualDamage {
            side,
            name: name.clone(),
            source,
            damage: amount,
        }),
    }

    if did_faint {
        handle_faint(side, &name, battle, bus, hooks);
    }
    Ok(())
}

/// Fainting cascade: drop the fallen combatant's volatile state, release
/// anything the other side held pointing at it, then settle the battle if a
/// roster is now empty.
pub fn handle_faint(
    side: usize,
    name: &str,
    battle: &mut Battle,
    bus: &mut EventBus,
    hooks: &HookRegistry,
) {
    bus.push(BattleEvent::CombatantFainted {
        side,
        name: name.to_string(),
    });

    if let Some(fallen) = battle.active_mut(side) {
        fallen.volatiles.clear();
        fallen.clear_stat_stages();
    }
    release_references_to(battle, side);

    debug!(
        battle_id = %battle.battle_id,
        side,
        alive = battle.rosters[side].alive_count(),
        "combatant fainted"
    );
    check_win_conditions(battle, bus);
    hooks.notify_faint(battle, side, name);
}

/// Remove volatile conditions on the other side's active combatant that
/// reference `side` (traps, binds, lock-on, seeding).
pub fn release_references_to(battle: &mut Battle, side: usize) {
    let other = 1 - side;
    if let Some(holder) = battle.active_mut(other) {
        holder
            .volatiles
            .retain(|_, condition| condition.referenced_side() != Some(side));
    }
}

/// Check win conditions and update battle state accordingly. Does nothing
/// once the battle is already over.
pub fn check_win_conditions(battle: &mut Battle, bus: &mut EventBus) {
    if battle.is_over() {
        return;
    }
    let side_one_alive = battle.rosters[0].has_alive();
    let side_two_alive = battle.rosters[1].has_alive();

    match (side_one_alive, side_two_alive) {
        (false, false) => {
            battle.game_state = GameState::Draw;
            bus.push(BattleEvent::BattleEnded { winner: None });
        }
        (false, true) => {
            battle.game_state = GameState::Player2Win;
            bus.push(BattleEvent::PlayerDefeated { side: 0 });
            bus.push(BattleEvent::BattleEnded { winner: Some(1) });
        }
        (true, false) => {
            battle.game_state = GameState::Player1Win;
            bus.push(BattleEvent::PlayerDefeated { side: 1 });
            bus.push(BattleEvent::BattleEnded { winner: Some(0) });
        }
        (true, true) => {}
    }
}
