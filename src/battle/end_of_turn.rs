//! End-of-turn pass. Runs in a fixed order and re-checks for a finished
//! battle after every step that can knock something out.
use crate::battle::commands::{execute_command, execute_command_batch, handle_faint, BattleCommand};
use crate::battle::conditions::{VolatileCondition, VolatileKind};
use crate::battle::engine::BattleEnv;
use crate::battle::state::{Battle, BattleEvent, EventBus, ResidualSource};
use crate::battle::stats::is_grounded;
use crate::battle::transform::{revert_dynamax, TransformationKind};
use crate::combatant::StatusCondition;
use crate::errors::BattleStateError;
use schema::{AbilityEffect, ItemEffect, PokemonType, StatType, Terrain, Weather};
use tracing::debug;

pub fn process_end_of_turn(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    debug!(battle_id = %battle.battle_id, turn = battle.turn_number, "end of turn");

    reconcile_persistent_weather(battle, env, bus);

    let steps: [fn(&mut Battle, &BattleEnv, &mut EventBus) -> Result<(), BattleStateError>; 4] = [
        apply_weather_damage,
        apply_status_damage,
        apply_binding_damage,
        apply_leech_seed,
    ];
    for step in steps {
        step(battle, env, bus)?;
        if battle.is_over() {
            return Ok(());
        }
    }

    tick_field_counters(battle, bus);
    tick_volatile_counters(battle, bus);

    resolve_delayed_attacks(battle, env, bus)?;
    if battle.is_over() {
        return Ok(());
    }
    resolve_wishes(battle, env, bus)?;

    apply_end_of_turn_hooks(battle, env, bus)?;
    clear_turn_state(battle);
    Ok(())
}

/// Drop a persistent weather whose ability holder is no longer on the field.
/// Running it twice in a row changes nothing the second time.
pub fn reconcile_persistent_weather(battle: &mut Battle, env: &BattleEnv, bus: &mut EventBus) {
    let Some(weather) = battle.field.weather.filter(|w| w.is_persistent()) else {
        return;
    };
    let upheld = (0..2).any(|side| {
        battle.active(side).is_some_and(|c| {
            c.is_alive() && env.catalog.active_ability(c) == AbilityEffect::PersistentWeather(weather)
        })
    });
    if upheld {
        return;
    }
    battle.field.clear_weather();
    debug!(%weather, "persistent weather lost its holder");
    bus.push(BattleEvent::WeatherEnded { weather });
}

/// Combatants on both sides that are still standing, in side order.
fn living_sides(battle: &Battle) -> Vec<usize> {
    (0..2)
        .filter(|side| battle.active(*side).is_some_and(|c| c.is_alive()))
        .collect()
}

fn has_magic_guard(side: usize, battle: &Battle, env: &BattleEnv) -> bool {
    battle
        .active(side)
        .is_some_and(|c| env.catalog.active_ability(c) == AbilityEffect::MagicGuard)
}

fn apply_weather_damage(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    if battle.field.weather != Some(Weather::Sandstorm) {
        return Ok(());
    }
    for side in living_sides(battle) {
        let Some(combatant) = battle.active(side) else {
            continue;
        };
        let immune = [PokemonType::Rock, PokemonType::Ground, PokemonType::Steel]
            .iter()
            .any(|t| combatant.has_type(*t));
        if immune || has_magic_guard(side, battle, env) {
            continue;
        }
        let amount = combatant.fraction_of_max_hp(16);
        execute_command(
            BattleCommand::DealDamage {
                side,
                amount,
                source: Some(ResidualSource::Weather(Weather::Sandstorm)),
            },
            battle,
            bus,
            env.hooks,
        )?;
        if battle.is_over() {
            break;
        }
    }
    Ok(())
}

fn apply_status_damage(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    for side in living_sides(battle) {
        if has_magic_guard(side, battle, env) {
            continue;
        }
        let Some(combatant) = battle.active_mut(side) else {
            continue;
        };
        let max_hp = combatant.max_hp();
        let damage = match combatant.status {
            Some(StatusCondition::Burn) => combatant.fraction_of_max_hp(16),
            Some(StatusCondition::Poison) => combatant.fraction_of_max_hp(8),
            Some(StatusCondition::BadlyPoisoned { counter }) => {
                combatant.status = Some(StatusCondition::BadlyPoisoned {
                    counter: counter.saturating_add(1).min(15),
                });
                ((max_hp as u32 * counter.max(1) as u32) / 16).max(1) as u16
            }
            _ => continue,
        };
        let Some(status) = combatant.status else {
            continue;
        };
        let fainted = combatant.take_damage(damage);
        let name = combatant.name().to_string();
        bus.push(BattleEvent::StatusDamage {
            side,
            name: name.clone(),
            status,
            damage,
            remaining_hp: combatant.current_hp(),
        });
        if fainted {
            handle_faint(side, &name, battle, bus, env.hooks);
            if battle.is_over() {
                break;
            }
        }
    }
    Ok(())
}

fn apply_binding_damage(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    for side in living_sides(battle) {
        let Some(combatant) = battle.active(side) else {
            continue;
        };
        if !combatant.has_volatile(VolatileKind::PartiallyTrapped) {
            continue;
        }
        let amount = combatant.fraction_of_max_hp(8);
        if !has_magic_guard(side, battle, env) {
            execute_command(
                BattleCommand::DealDamage {
                    side,
                    amount,
                    source: Some(ResidualSource::Binding),
                },
                battle,
                bus,
                env.hooks,
            )?;
            if battle.is_over() {
                break;
            }
        }

        let Some(combatant) = battle.active_mut(side) else {
            continue;
        };
        let expired = match combatant.volatile_mut(VolatileKind::PartiallyTrapped) {
            Some(VolatileCondition::PartiallyTrapped {
                turns_remaining, ..
            }) => {
                *turns_remaining = turns_remaining.saturating_sub(1);
                *turns_remaining == 0
            }
            _ => false,
        };
        if expired {
            combatant.remove_volatile(VolatileKind::PartiallyTrapped);
            bus.push(BattleEvent::VolatileExpired {
                side,
                name: combatant.name().to_string(),
                kind: VolatileKind::PartiallyTrapped,
            });
        }
    }
    Ok(())
}

fn apply_leech_seed(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    for side in living_sides(battle) {
        let Some(combatant) = battle.active(side) else {
            continue;
        };
        let Some(VolatileCondition::Seeded { source }) =
            combatant.volatile(VolatileKind::Seeded).cloned()
        else {
            continue;
        };
        if has_magic_guard(side, battle, env) || combatant.is_fainted() {
            continue;
        }
        let drained = combatant.fraction_of_max_hp(8).min(combatant.current_hp());
        let mut commands = vec![BattleCommand::DealDamage {
            side,
            amount: drained,
            source: Some(ResidualSource::LeechSeed),
        }];
        if battle.active(source).is_some_and(|c| c.is_alive()) {
            commands.push(BattleCommand::Heal {
                side: source,
                amount: drained,
            });
        }
        execute_command_batch(commands, battle, bus, env.hooks)?;
        if battle.is_over() {
            break;
        }
    }
    Ok(())
}

fn tick_field_counters(battle: &mut Battle, bus: &mut EventBus) {
    if let Some(weather) = battle.field.weather {
        match battle.field.tick_weather() {
            Some(ended) => bus.push(BattleEvent::WeatherEnded { weather: ended }),
            None => bus.push(BattleEvent::WeatherContinues { weather }),
        }
    }
    if let Some(terrain) = battle.field.tick_terrain() {
        bus.push(BattleEvent::TerrainEnded { terrain });
    }
    for side in 0..2 {
        for screen in battle.sides[side].tick_screens() {
            bus.push(BattleEvent::ScreenExpired { side, screen });
        }
    }
    for effect in battle.field.tick_globals() {
        bus.push(BattleEvent::GlobalEffectEnded { effect });
    }
    debug!(
        weather = ?battle.field.weather,
        weather_turns = battle.field.weather_turns,
        terrain = ?battle.field.terrain,
        "field counters ticked"
    );
}

fn tick_volatile_counters(battle: &mut Battle, bus: &mut EventBus) {
    for side in 0..2 {
        let Some(combatant) = battle.active_mut(side) else {
            continue;
        };
        let expired = match combatant.volatile_mut(VolatileKind::Taunted) {
            Some(VolatileCondition::Taunted { turns_remaining }) => {
                *turns_remaining = turns_remaining.saturating_sub(1);
                *turns_remaining == 0
            }
            _ => false,
        };
        if expired {
            combatant.remove_volatile(VolatileKind::Taunted);
            bus.push(BattleEvent::VolatileExpired {
                side,
                name: combatant.name().to_string(),
                kind: VolatileKind::Taunted,
            });
        }
    }
}

/// Delayed attacks land on whoever is active on the target side when the timer runs out.
fn resolve_delayed_attacks(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    for side in 0..2 {
        let mut landing = Vec::new();
        battle.sides[side].delayed_attacks.retain_mut(|attack| {
            attack.turns_remaining = attack.turns_remaining.saturating_sub(1);
            if attack.turns_remaining == 0 {
                landing.push(attack.clone());
                false
            } else {
                true
            }
        });

        for attack in landing {
            let Some(target) = battle.active(side).filter(|c| c.is_alive()) else {
                debug!(side, move_name = %attack.move_name, "delayed attack found no target");
                continue;
            };
            let landed = BattleEvent::DelayedAttackLanded {
                side,
                target_name: target.name().to_string(),
                move_name: attack.move_name.clone(),
            };
            execute_command_batch(
                vec![
                    BattleCommand::EmitEvent(landed),
                    BattleCommand::DealDamage {
                        side,
                        amount: attack.damage,
                        source: None,
                    },
                ],
                battle,
                bus,
                env.hooks,
            )?;
            if battle.is_over() {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn resolve_wishes(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    for side in 0..2 {
        let Some(wish) = battle.sides[side].wish.as_mut() else {
            continue;
        };
        wish.turns_remaining = wish.turns_remaining.saturating_sub(1);
        if wish.turns_remaining > 0 {
            continue;
        }
        let Some(wish) = battle.sides[side].wish.take() else {
            continue;
        };
        if !battle.active(side).is_some_and(|c| c.is_alive()) {
            continue;
        }
        execute_command_batch(
            vec![
                BattleCommand::EmitEvent(BattleEvent::WishGranted {
                    side,
                    user_name: wish.user_name,
                }),
                BattleCommand::Heal {
                    side,
                    amount: wish.heal_amount,
                },
            ],
            battle,
            bus,
            env.hooks,
        )?;
    }
    Ok(())
}

/// Turn-gated abilities, HP-based form changes, dynamax expiry and passive healing.
fn apply_end_of_turn_hooks(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    for side in living_sides(battle) {
        let Some(combatant) = battle.active(side) else {
            continue;
        };
        let name = combatant.name().to_string();
        let ability = env.catalog.active_ability(combatant);
        let item = env.catalog.held_item_effect(combatant, &battle.field);
        let grounded = is_grounded(combatant, &battle.field, env.catalog);
        let sixteenth = combatant.fraction_of_max_hp(16);

        match ability {
            AbilityEffect::SpeedBoost if combatant.turns_active > 0 => {
                let activated = BattleEvent::AbilityActivated {
                    side,
                    name: name.clone(),
                    ability: combatant.ability.clone(),
                };
                execute_command_batch(
                    vec![
                        BattleCommand::EmitEvent(activated),
                        BattleCommand::ChangeStatStage {
                            side,
                            stat: StatType::Speed,
                            delta: 1,
                        },
                    ],
                    battle,
                    bus,
                    env.hooks,
                )?;
            }
            AbilityEffect::FormChangeBelowHalf { types }
                if !combatant.form_changed && combatant.is_at_or_below_half() =>
            {
                if let Some(combatant) = battle.active_mut(side) {
                    combatant.types = types;
                    combatant.form_changed = true;
                }
                bus.push(BattleEvent::FormChanged {
                    side,
                    name: name.clone(),
                });
            }
            _ => {}
        }

        if let Some(combatant) = battle.active_mut(side) {
            let expired = match combatant.volatile_mut(VolatileKind::Dynamaxed) {
                Some(VolatileCondition::Dynamaxed { turns_remaining }) => {
                    *turns_remaining = turns_remaining.saturating_sub(1);
                    *turns_remaining == 0
                }
                _ => false,
            };
            if expired && revert_dynamax(combatant) {
                bus.push(BattleEvent::TransformationReverted {
                    side,
                    name: name.clone(),
                    kind: TransformationKind::Dynamax,
                });
            }
        }

        let mut healing = Vec::new();
        if item == ItemEffect::EndOfTurnHeal {
            healing.push(BattleCommand::Heal {
                side,
                amount: sixteenth,
            });
        }
        if battle.field.terrain == Some(Terrain::Grassy) && grounded {
            healing.push(BattleCommand::Heal {
                side,
                amount: sixteenth,
            });
        }
        execute_command_batch(healing, battle, bus, env.hooks)?;
    }
    Ok(())
}

/// One-turn flags go, turn counters advance.
fn clear_turn_state(battle: &mut Battle) {
    for side in 0..2 {
        if let Some(combatant) = battle.active_mut(side) {
            combatant.volatiles.retain(|kind, _| !kind.is_one_turn());
            if combatant.is_alive() {
                combatant.turns_active += 1;
            }
        }
        battle.sides[side].reset_turn_flags();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_test_battle, test_services, TestCombatantBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reconcile_is_idempotent() {
        let services = test_services();
        let env = services.env();
        let mut battle = create_test_battle(
            TestCombatantBuilder::new("kyogre").build(),
            TestCombatantBuilder::new("eevee").build(),
        );
        battle.field.set_persistent_weather(Weather::HeavyRain, 0);

        let mut first = EventBus::new();
        reconcile_persistent_weather(&mut battle, &env, &mut first);
        let after_first = battle.field.clone();
        let mut second = EventBus::new();
        reconcile_persistent_weather(&mut battle, &env, &mut second);

        assert_eq!(
            first.events(),
            &[BattleEvent::WeatherEnded {
                weather: Weather::HeavyRain
            }]
        );
        assert_eq!(battle.field.weather, None);
        assert!(second.is_empty());
        assert_eq!(battle.field, after_first);
    }

    #[test]
    fn test_reconcile_keeps_weather_while_holder_is_active() {
        let services = test_services();
        let env = services.env();
        let mut battle = create_test_battle(
            TestCombatantBuilder::new("kyogre")
                .with_ability("primordial-sea")
                .build(),
            TestCombatantBuilder::new("eevee").build(),
        );
        battle.field.set_persistent_weather(Weather::HeavyRain, 0);

        let mut bus = EventBus::new();
        reconcile_persistent_weather(&mut battle, &env, &mut bus);
        reconcile_persistent_weather(&mut battle, &env, &mut bus);

        assert_eq!(battle.field.weather, Some(Weather::HeavyRain));
        assert!(bus.is_empty());
    }
}
