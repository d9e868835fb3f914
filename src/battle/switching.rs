//! Switch handling: leaving residuals, volatile reset and transfer, entry
//! hazards, and entry ability hooks.
use crate::battle::action_stack::SwitchCause;
use crate::battle::commands::{execute_command, release_references_to, BattleCommand};
use crate::battle::conditions::{VolatileCondition, VolatileKind};
use crate::battle::engine::BattleEnv;
use crate::battle::field::FieldChange;
use crate::battle::state::{Battle, BattleEvent, EventBus, ResidualSource};
use crate::battle::stats::is_grounded;
use crate::battle::transform::{revert_dynamax, TransformationKind};
use crate::combatant::StatusCondition;
use crate::errors::BattleStateError;
use schema::{
    AbilityEffect, GlobalEffect, Hazard, ItemEffect, PokemonType, StatType, StatusType,
};
use std::collections::HashMap;
use tracing::debug;

/// Everything the outgoing combatant hands over on a volatile-transferring pivot.
#[derive(Debug, Default)]
struct Handover {
    volatiles: Vec<VolatileCondition>,
    stat_stages: HashMap<StatType, i8>,
}

/// Switch `side`'s active combatant out for the one in `slot`.
pub fn perform_switch(
    side: usize,
    slot: usize,
    cause: SwitchCause,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    if side > 1 {
        return Err(BattleStateError::InvalidSide(side));
    }
    if !battle.rosters[side].is_valid_switch_target(slot) {
        return Err(BattleStateError::InvalidSlot { side, slot });
    }

    let old_slot = battle.active_slot(side);
    let old_name = battle.active_name(side);
    let outgoing_alive = battle.active(side).is_some_and(|c| c.is_alive());

    if outgoing_alive {
        apply_leaving_residual(side, battle, env, bus)?;
    }

    let transfer = matches!(cause, SwitchCause::Pivot { transfer: true });
    let handover = retire_active(side, transfer, battle, env, bus);
    release_references_to(battle, side);

    battle.rosters[side].active = slot;
    battle.sides[side].switched_this_turn = true;

    let Some(incoming) = battle.active_mut(side) else {
        return Err(BattleStateError::InvalidSlot { side, slot });
    };
    incoming.turns_active = 0;
    for condition in handover.volatiles {
        incoming.add_volatile(condition);
    }
    for (stat, stage) in handover.stat_stages {
        incoming.set_stat_stage(stat, stage);
    }
    let new_name = incoming.name().to_string();

    debug!(
        battle_id = %battle.battle_id,
        side,
        old_slot,
        new_slot = slot,
        ?cause,
        "switch"
    );

    if cause == SwitchCause::Replacement || !outgoing_alive {
        bus.push(BattleEvent::CombatantSentOut {
            side,
            name: new_name.clone(),
        });
    } else {
        bus.push(BattleEvent::CombatantSwitched {
            side,
            old_name: old_name.clone(),
            new_name: new_name.clone(),
        });
    }

    apply_entry_hazards(side, battle, env, bus)?;
    if battle.active(side).is_some_and(|c| c.is_alive()) {
        apply_entry_abilities(side, battle, env, bus)?;
    }

    env.hooks.notify_switch(battle, side, &old_name, &new_name);
    Ok(())
}

/// Draining effects bite one last time as their victim leaves.
fn apply_leaving_residual(
    side: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    let Some(outgoing) = battle.active(side) else {
        return Ok(());
    };
    if env.catalog.active_ability(outgoing) == AbilityEffect::MagicGuard {
        return Ok(());
    }
    let seeded = outgoing.has_volatile(VolatileKind::Seeded);
    let bound = outgoing.has_volatile(VolatileKind::PartiallyTrapped);
    let chip = outgoing.fraction_of_max_hp(8);

    if seeded {
        let drained = chip.min(outgoing.current_hp());
        execute_command(
            BattleCommand::DealDamage {
                side,
                amount: chip,
                source: Some(ResidualSource::LeechSeed),
            },
            battle,
            bus,
            env.hooks,
        )?;
        if battle.active(1 - side).is_some_and(|c| c.is_alive()) {
            execute_command(
                BattleCommand::Heal {
                    side: 1 - side,
                    amount: drained,
                },
                battle,
                bus,
                env.hooks,
            )?;
        }
    }
    if bound && battle.active(side).is_some_and(|c| c.is_alive()) {
        execute_command(
            BattleCommand::DealDamage {
                side,
                amount: chip,
                source: Some(ResidualSource::Binding),
            },
            battle,
            bus,
            env.hooks,
        )?;
    }
    Ok(())
}

/// Reset the outgoing combatant and collect what a transferring pivot passes on.
fn retire_active(
    side: usize,
    transfer: bool,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Handover {
    let stasis = battle.field.is_active(GlobalEffect::Stasis);
    let Some(outgoing) = battle.active_mut(side) else {
        return Handover::default();
    };
    let name = outgoing.name().to_string();
    let alive = outgoing.is_alive();

    if revert_dynamax(outgoing) {
        bus.push(BattleEvent::TransformationReverted {
            side,
            name: name.clone(),
            kind: TransformationKind::Dynamax,
        });
    }
    outgoing.remove_volatile(VolatileKind::ZPowered);

    // Battle-only overrides. Mega and tera persist; their base values were already replaced.
    outgoing.ability = outgoing.base_ability.clone();
    if !outgoing.terastallized {
        outgoing.types = outgoing.base_types.clone();
    }
    outgoing.form_changed = false;

    let mut handover = Handover::default();
    let volatiles = std::mem::take(&mut outgoing.volatiles);
    if transfer {
        handover.volatiles = volatiles
            .into_values()
            .filter(|condition| condition.kind().is_transferable())
            .collect();
        handover.stat_stages = std::mem::take(&mut outgoing.stat_stages);
    } else if stasis {
        outgoing.keep_only_negative_stages();
    } else {
        outgoing.clear_stat_stages();
    }

    outgoing.consecutive_protects = 0;
    outgoing.last_move = None;

    if alive {
        match env.catalog.ability_effect(&outgoing.ability) {
            AbilityEffect::Regenerator => {
                let amount = outgoing.fraction_of_max_hp(3);
                let healed = outgoing.heal(amount);
                if healed > 0 {
                    bus.push(BattleEvent::AbilityActivated {
                        side,
                        name: name.clone(),
                        ability: outgoing.ability.clone(),
                    });
                    bus.push(BattleEvent::CombatantHealed {
                        side,
                        name: name.clone(),
                        amount: healed,
                        new_hp: outgoing.current_hp(),
                    });
                }
            }
            AbilityEffect::NaturalCure => {
                if let Some(status) = outgoing.status.take() {
                    bus.push(BattleEvent::StatusRemoved {
                        side,
                        name: name.clone(),
                        status,
                    });
                }
            }
            _ => {}
        }
    }
    handover
}

/// Apply every hazard on `side` to its freshly arrived combatant.
pub fn apply_entry_hazards(
    side: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    if !battle.sides[side].has_hazards() {
        return Ok(());
    }
    let Some(incoming) = battle.active(side) else {
        return Ok(());
    };
    if env.catalog.held_item_effect(incoming, &battle.field) == ItemEffect::HazardImmunity {
        debug!(side, "hazards ignored by held item");
        return Ok(());
    }
    let grounded = is_grounded(incoming, &battle.field, env.catalog);
    let magic_guard = env.catalog.active_ability(incoming) == AbilityEffect::MagicGuard;
    let max_hp = incoming.max_hp() as f32;
    let types = incoming.types.clone();
    let is_poison = incoming.has_type(PokemonType::Poison);
    let is_steel = incoming.has_type(PokemonType::Steel);
    let has_status = incoming.status.is_some();

    let side_state = &battle.sides[side];
    let rock = side_state.hazard_layers(Hazard::StealthRock);
    let spikes = side_state.hazard_layers(Hazard::Spikes);
    let toxic = side_state.hazard_layers(Hazard::ToxicSpikes);
    let web = side_state.hazard_layers(Hazard::StickyWeb);

    let mut commands = Vec::new();
    if rock > 0 && !magic_guard {
        let effectiveness = PokemonType::Rock.effectiveness_against(&types);
        let damage = ((max_hp * effectiveness) / 8.0).floor() as u16;
        if damage > 0 {
            commands.push(BattleCommand::DealDamage {
                side,
                amount: damage,
                source: Some(ResidualSource::Hazard(Hazard::StealthRock)),
            });
        }
    }
    if grounded && spikes > 0 && !magic_guard {
        let denominator = match spikes {
            1 => 8.0,
            2 => 6.0,
            _ => 4.0,
        };
        commands.push(BattleCommand::DealDamage {
            side,
            amount: ((max_hp / denominator).floor() as u16).max(1),
            source: Some(ResidualSource::Hazard(Hazard::Spikes)),
        });
    }
    if grounded && toxic > 0 {
        if is_poison {
            battle.sides[side].remove_hazard(Hazard::ToxicSpikes);
            commands.push(BattleCommand::EmitEvent(BattleEvent::HazardsCleared {
                side,
                hazards: vec![Hazard::ToxicSpikes],
            }));
        } else if !is_steel && !has_status {
            let status = if toxic >= 2 {
                StatusType::BadlyPoisoned
            } else {
                StatusType::Poison
            };
            commands.push(BattleCommand::SetStatus {
                side,
                status: Some(StatusCondition::from_type(status, 0)),
            });
        }
    }
    if grounded && web > 0 {
        commands.push(BattleCommand::ChangeStatStage {
            side,
            stat: StatType::Speed,
            delta: -1,
        });
    }

    for command in commands {
        if battle.active(side).map_or(true, |c| c.is_fainted()) {
            break;
        }
        execute_command(command, battle, bus, env.hooks)?;
    }
    Ok(())
}

/// Entry ability effects of `side`'s active combatant.
pub fn apply_entry_abilities(
    side: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    let Some(combatant) = battle.active(side) else {
        return Ok(());
    };
    let name = combatant.name().to_string();
    let ability = combatant.ability.clone();
    let effect = env.catalog.active_ability(combatant);
    let extends_weather =
        env.catalog.held_item_effect(combatant, &battle.field) == ItemEffect::ExtendsWeather;
    let activated = BattleEvent::AbilityActivated {
        side,
        name,
        ability,
    };

    match effect {
        AbilityEffect::PersistentWeather(weather) => {
            if battle.field.set_persistent_weather(weather, side) == FieldChange::Started {
                bus.push(activated);
                bus.push(BattleEvent::WeatherStarted { weather });
            }
        }
        AbilityEffect::SetWeatherOnEntry(weather) => {
            let turns = if extends_weather {
                env.rules.extended_weather_turns
            } else {
                env.rules.weather_turns
            };
            if battle.field.set_weather(weather, turns) == FieldChange::Started {
                bus.push(activated);
                bus.push(BattleEvent::WeatherStarted { weather });
            }
        }
        AbilityEffect::SetTerrainOnEntry(terrain) => {
            if battle.field.set_terrain(terrain, env.rules.terrain_turns) == FieldChange::Started {
                bus.push(activated);
                bus.push(BattleEvent::TerrainStarted { terrain });
            }
        }
        AbilityEffect::IntimidateOnEntry => {
            let opponent = 1 - side;
            if battle.active(opponent).is_some_and(|c| c.is_alive()) {
                bus.push(activated);
                execute_command(
                    BattleCommand::ChangeStatStage {
                        side: opponent,
                        stat: StatType::Attack,
                        delta: -1,
                    },
                    battle,
                    bus,
                    env.hooks,
                )?;
            }
        }
        _ => {}
    }
    Ok(())
}
