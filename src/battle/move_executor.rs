//! Per-action state machine for a move: cannot-act checks, PP, protection,
//! reflection, accuracy, then dispatch on the move's class tag. Anything that
//! needs a switch afterwards is handed back as a [`PostActionEffect`].
use crate::battle::action_stack::ActionStack;
use crate::battle::commands::{execute_command, execute_command_batch, BattleCommand};
use crate::battle::conditions::{VolatileCondition, VolatileKind};
use crate::battle::damage::DamageContext;
use crate::battle::engine::BattleEnv;
use crate::battle::field::FieldChange;
use crate::battle::power_moves;
use crate::battle::side::{HazardChange, PendingDelayedAttack, PendingWish};
use crate::battle::state::{
    ActionFailureReason, Battle, BattleEvent, EventBus, ResidualSource, TurnRng,
};
use crate::battle::stats::{is_grounded, move_hits};
use crate::combatant::StatusCondition;
use crate::errors::BattleStateError;
use schema::{
    AbilityEffect, EffectTarget, GlobalEffect, Hazard, ItemEffect, MoveCategory, MoveClass,
    MoveDescriptor, MoveFlags, MoveTarget, PokemonType, ProtectionKind, Screen, SecondaryEffect,
    StatType, StatusType, Terrain, Weather,
};
use tracing::{debug, warn};

/// Switches a move asks for. The orchestrator applies them at one point,
/// right after the action that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostActionEffect {
    /// A pivot connected; `side` picks its replacement before the turn goes on.
    PivotSwitch { side: usize, transfer: bool },
    /// `side` is dragged out in favour of a random healthy bench member.
    ForcedSwitch { side: usize },
}

/// Result of one damaging hit.
#[derive(Debug, Clone, Copy)]
struct Strike {
    damage: u16,
    behind_substitute: bool,
    knocked_out: bool,
}

/// Execute `move_name` for `side`'s active combatant. `forced` marks a
/// locked continuation (rampage, second charge turn), which spends no PP.
/// `remaining` is the rest of this turn's queue.
#[allow(clippy::too_many_arguments)]
pub fn execute_move(
    side: usize,
    move_name: &str,
    forced: bool,
    remaining: &ActionStack,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<Vec<PostActionEffect>, BattleStateError> {
    let mut effects = Vec::new();
    let Some(user) = battle.active(side) else {
        return Ok(effects);
    };
    if user.is_fainted() {
        return Ok(effects);
    }
    let user_name = user.name().to_string();
    let taunted = user.has_volatile(VolatileKind::Taunted);
    let base = env.catalog.move_descriptor(move_name);
    battle.sides[side].moved_this_turn = true;

    if !can_act(side, battle, env, bus, rng)? {
        disrupt_locked_move(side, battle);
        return Ok(effects);
    }

    // Z-power is spent by the first move that gets off the ground.
    let Some(user) = battle.active_mut(side) else {
        return Ok(effects);
    };
    let z_powered = user.remove_volatile(VolatileKind::ZPowered).is_some();
    let descriptor = power_moves::convert(user, base.clone(), z_powered, env.catalog);

    if taunted && descriptor.is_status() {
        bus.push(BattleEvent::ActionFailed {
            side,
            name: user_name,
            reason: ActionFailureReason::IsTaunted,
        });
        return Ok(effects);
    }

    if !forced {
        spend_pp(side, move_name, &base, battle, env);
    }

    bus.push(BattleEvent::MoveUsed {
        side,
        name: user_name,
        move_name: descriptor.name.clone(),
    });
    if let Some(user) = battle.active_mut(side) {
        user.last_move = Some(move_name.to_string());
        if !matches!(descriptor.class, MoveClass::Protection(_)) {
            user.consecutive_protects = 0;
        }
    }

    run_move(side, &descriptor, remaining, battle, env, bus, rng, &mut effects)?;

    apply_choice_lock(side, move_name, battle, env);
    if descriptor.targets_opponent() && descriptor.class != MoveClass::LockOn {
        if let Some(user) = battle.active_mut(side) {
            user.remove_volatile(VolatileKind::LockOn);
        }
    }
    Ok(effects)
}

#[allow(clippy::too_many_arguments)]
fn run_move(
    side: usize,
    descriptor: &MoveDescriptor,
    remaining: &ActionStack,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
    effects: &mut Vec<PostActionEffect>,
) -> Result<(), BattleStateError> {
    let target = 1 - side;

    if descriptor.class == MoveClass::Charge && !ready_to_fire(side, descriptor, battle, bus) {
        return Ok(());
    }

    let opponent_alive = battle.active(target).is_some_and(|c| c.is_alive());
    match descriptor.target {
        MoveTarget::Opponent => {
            if !opponent_alive {
                fail(side, battle, bus, ActionFailureReason::NoTarget);
                disrupt_locked_move(side, battle);
                return Ok(());
            }
            if descriptor.class == MoveClass::DelayedAttack {
                return register_delayed_attack(side, descriptor, battle, env, bus, rng);
            }
            if !passes_target_checks(side, descriptor, battle, env, bus, rng)? {
                disrupt_locked_move(side, battle);
                return Ok(());
            }
            if reflected(side, descriptor, battle, env, bus) {
                return dispatch(target, side, descriptor, remaining, battle, env, bus, rng, effects);
            }
            let (Some(attacker), Some(defender)) = (battle.active(side), battle.active(target))
            else {
                return Ok(());
            };
            if !move_hits(attacker, defender, target, descriptor, &battle.field, rng) {
                bus.push(BattleEvent::MoveMissed {
                    side,
                    name: attacker.name().to_string(),
                });
                disrupt_locked_move(side, battle);
                return Ok(());
            }
            if descriptor.is_status()
                && !descriptor.flags.sound
                && defender.has_volatile(VolatileKind::Substitute)
            {
                fail(side, battle, bus, ActionFailureReason::Generic);
                return Ok(());
            }
        }
        MoveTarget::OpponentSide => {
            if opponent_alive && reflected(side, descriptor, battle, env, bus) {
                return dispatch(target, side, descriptor, remaining, battle, env, bus, rng, effects);
            }
        }
        MoveTarget::User | MoveTarget::UserSide | MoveTarget::Field => {}
    }

    dispatch(side, target, descriptor, remaining, battle, env, bus, rng, effects)
}

/// Charge moves spend their first turn charging, unless sunlight fires a solar move at once.
fn ready_to_fire(
    side: usize,
    descriptor: &MoveDescriptor,
    battle: &mut Battle,
    bus: &mut EventBus,
) -> bool {
    let instant =
        descriptor.flags.solar && battle.field.weather.is_some_and(|w| w.is_sun());
    let Some(user) = battle.active_mut(side) else {
        return false;
    };
    if user.remove_volatile(VolatileKind::Charging).is_some() {
        user.remove_volatile(VolatileKind::Invulnerable);
        return true;
    }
    if instant {
        return true;
    }
    user.add_volatile(VolatileCondition::Charging {
        move_name: descriptor.name.clone(),
    });
    if descriptor.flags.semi_invulnerable {
        user.add_volatile(VolatileCondition::Invulnerable {
            move_name: descriptor.name.clone(),
        });
    }
    bus.push(BattleEvent::ChargingStarted {
        side,
        name: user.name().to_string(),
        move_name: descriptor.name.clone(),
    });
    false
}

/// Semi-invulnerability and protection on the target.
fn passes_target_checks(
    side: usize,
    descriptor: &MoveDescriptor,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<bool, BattleStateError> {
    let target = 1 - side;
    let (Some(attacker), Some(defender)) = (battle.active(side), battle.active(target)) else {
        return Ok(false);
    };

    if defender.has_volatile(VolatileKind::Invulnerable) && !has_lock_on(side, target, battle) {
        bus.push(BattleEvent::MoveMissed {
            side,
            name: attacker.name().to_string(),
        });
        return Ok(false);
    }

    let Some(VolatileCondition::Protected { kind }) =
        defender.volatile(VolatileKind::Protected).cloned()
    else {
        return Ok(true);
    };
    let ability_bypass = descriptor.flags.contact
        && env.catalog.active_ability(attacker) == AbilityEffect::IgnoresProtection;
    if descriptor.flags.ignores_protection || ability_bypass {
        debug!(side, move_name = %descriptor.name, "protection bypassed");
        return Ok(true);
    }

    bus.push(BattleEvent::ProtectionBlocked {
        side: target,
        name: defender.name().to_string(),
    });
    if descriptor.flags.contact {
        punish_contact(side, kind, battle, env, bus, rng)?;
    }
    Ok(false)
}

/// Counter-effect of a protection variant on an attacker that made contact.
fn punish_contact(
    side: usize,
    kind: ProtectionKind,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<(), BattleStateError> {
    let Some(attacker) = battle.active(side) else {
        return Ok(());
    };
    let chip = attacker.fraction_of_max_hp(8);
    let magic_guard = env.catalog.active_ability(attacker) == AbilityEffect::MagicGuard;

    match kind {
        ProtectionKind::Plain => {}
        ProtectionKind::SpikyShield => {
            if !magic_guard {
                execute_command(
                    BattleCommand::DealDamage {
                        side,
                        amount: chip,
                        source: Some(ResidualSource::ProtectionContact(kind)),
                    },
                    battle,
                    bus,
                    env.hooks,
                )?;
            }
        }
        ProtectionKind::BanefulBunker => {
            try_inflict_status(side, StatusType::Poison, false, battle, env, bus, rng)?;
        }
        ProtectionKind::BurningBulwark => {
            try_inflict_status(side, StatusType::Burn, false, battle, env, bus, rng)?;
        }
        ProtectionKind::KingsShield => change_stage(side, StatType::Attack, -1, battle, env, bus)?,
        ProtectionKind::Obstruct => change_stage(side, StatType::Defense, -2, battle, env, bus)?,
        ProtectionKind::SilkTrap => change_stage(side, StatType::Speed, -1, battle, env, bus)?,
    }
    Ok(())
}

/// Magic Bounce sends reflectable status moves back. Returns true if the
/// move was reflected; the caller then runs it with the roles swapped.
fn reflected(
    side: usize,
    descriptor: &MoveDescriptor,
    battle: &Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> bool {
    if !descriptor.flags.reflectable || !descriptor.is_status() {
        return false;
    }
    let target = 1 - side;
    let Some(defender) = battle.active(target) else {
        return false;
    };
    if env.catalog.active_ability(defender) != AbilityEffect::MagicBounce {
        return false;
    }
    bus.push(BattleEvent::MoveReflected {
        side: target,
        name: defender.name().to_string(),
        move_name: descriptor.name.clone(),
    });
    true
}

/// Run the move's class behaviour with `user` acting on `target`.
#[allow(clippy::too_many_arguments)]
fn dispatch(
    user: usize,
    target: usize,
    descriptor: &MoveDescriptor,
    remaining: &ActionStack,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
    effects: &mut Vec<PostActionEffect>,
) -> Result<(), BattleStateError> {
    if descriptor.is_damaging() {
        let Some(strike) = strike(user, target, descriptor, battle, env, bus, rng)? else {
            disrupt_locked_move(user, battle);
            return Ok(());
        };
        if battle.is_over() {
            return Ok(());
        }
        after_strike(user, target, descriptor, &strike, battle, env, bus, rng, effects)?;
        apply_secondaries(user, target, descriptor, Some(&strike), remaining, battle, env, bus, rng)?;
        apply_aftermath(user, target, descriptor, &strike, battle, env, bus)?;
        return Ok(());
    }

    let succeeded = match descriptor.class {
        MoveClass::Protection(kind) => protect(user, kind, remaining, battle, env, bus, rng)?,
        MoveClass::SetWeather(weather) => set_weather(user, weather, battle, env, bus),
        MoveClass::SetTerrain(terrain) => set_terrain(user, terrain, battle, env, bus),
        MoveClass::SetHazard(hazard) => set_hazard(user, target, hazard, battle, env, bus),
        MoveClass::SetScreen(screen) => set_screen(user, screen, battle, env, bus),
        MoveClass::SetGlobal(effect) => set_global(user, effect, battle, env, bus),
        MoveClass::ClearHazards => {
            clear_user_hazards(user, battle, bus);
            true
        }
        MoveClass::Pivot { transfers_volatiles } => {
            if battle.rosters[user].has_alive_bench() {
                queue_pivot(user, transfers_volatiles, battle, bus, effects);
                true
            } else {
                fail(user, battle, bus, ActionFailureReason::Generic);
                false
            }
        }
        MoveClass::ForceOut => {
            if battle.rosters[target].has_alive_bench() {
                effects.push(PostActionEffect::ForcedSwitch { side: target });
                true
            } else {
                fail(user, battle, bus, ActionFailureReason::Generic);
                false
            }
        }
        MoveClass::Wish => make_wish(user, battle, env, bus),
        MoveClass::Substitute => make_substitute(user, battle, env, bus)?,
        MoveClass::LeechSeed => seed(user, target, battle, env, bus)?,
        MoveClass::Taunt => {
            let already = battle
                .active(target)
                .is_some_and(|c| c.has_volatile(VolatileKind::Taunted));
            add_volatile_or_fail(
                user,
                target,
                already,
                VolatileCondition::Taunted {
                    turns_remaining: env.rules.taunt_turns,
                },
                battle,
                env,
                bus,
            )?
        }
        MoveClass::LockOn => {
            execute_command(
                BattleCommand::AddVolatile {
                    side: user,
                    condition: VolatileCondition::LockOn { target },
                },
                battle,
                bus,
                env.hooks,
            )?;
            true
        }
        MoveClass::TrapTarget => {
            let already = battle
                .active(target)
                .is_some_and(|c| c.has_volatile(VolatileKind::Trapped));
            add_volatile_or_fail(
                user,
                target,
                already,
                VolatileCondition::Trapped { source: user },
                battle,
                env,
                bus,
            )?
        }
        MoveClass::Inert => {
            fail(user, battle, bus, ActionFailureReason::Generic);
            false
        }
        MoveClass::DelayedAttack => {
            register_delayed_attack(user, descriptor, battle, env, bus, rng)?;
            false
        }
        MoveClass::Standard
        | MoveClass::Charge
        | MoveClass::Recharge
        | MoveClass::Rampage
        | MoveClass::Binding => {
            if descriptor.secondary.is_empty() {
                fail(user, battle, bus, ActionFailureReason::Generic);
                false
            } else {
                let applied = apply_secondaries(
                    user, target, descriptor, None, remaining, battle, env, bus, rng,
                )?;
                if !applied {
                    fail(user, battle, bus, ActionFailureReason::Generic);
                }
                return Ok(());
            }
        }
    };

    if succeeded && descriptor.class != MoveClass::Inert && !descriptor.secondary.is_empty() {
        apply_secondaries(user, target, descriptor, None, remaining, battle, env, bus, rng)?;
    }
    Ok(())
}

/// Ask the damage collaborator for one hit and apply it, substitute first.
/// `None` means nothing landed (immunity or a collaborator failure).
fn strike(
    user: usize,
    target: usize,
    descriptor: &MoveDescriptor,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<Option<Strike>, BattleStateError> {
    let (Some(attacker), Some(defender)) = (battle.active(user), battle.active(target)) else {
        return Ok(None);
    };
    let ctx = DamageContext {
        attacker,
        defender,
        descriptor,
        defender_side: &battle.sides[target],
        field: &battle.field,
        catalog: env.catalog,
        self_inflicted: false,
    };
    let outcome = match env.damage.calculate(&ctx, rng) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(
                battle_id = %battle.battle_id,
                side = user,
                move_name = %descriptor.name,
                error = %err,
                "damage collaborator failed; action skipped"
            );
            return Ok(None);
        }
    };
    let defender_name = defender.name().to_string();
    let defender_hp = defender.current_hp();

    if outcome.effectiveness == 0.0 {
        bus.push(BattleEvent::NoEffect {
            target_name: defender_name,
        });
        return Ok(None);
    }
    if outcome.critical {
        bus.push(BattleEvent::CriticalHit);
    }
    bus.push(BattleEvent::AttackTypeEffectiveness {
        multiplier: outcome.effectiveness,
    });

    let substitute_hp = match defender.volatile(VolatileKind::Substitute) {
        Some(VolatileCondition::Substitute { hp }) if !descriptor.flags.sound => Some(*hp),
        _ => None,
    };
    if let Some(hp) = substitute_hp {
        let absorbed = outcome.damage.min(hp);
        let left = hp - absorbed;
        if let Some(defender) = battle.active_mut(target) {
            if left == 0 {
                defender.remove_volatile(VolatileKind::Substitute);
            } else {
                defender.add_volatile(VolatileCondition::Substitute { hp: left });
            }
        }
        bus.push(BattleEvent::SubstituteDamaged {
            side: target,
            name: defender_name.clone(),
            damage: absorbed,
        });
        if left == 0 {
            bus.push(BattleEvent::SubstituteBroke {
                side: target,
                name: defender_name,
            });
        }
        return Ok(Some(Strike {
            damage: absorbed,
            behind_substitute: true,
            knocked_out: false,
        }));
    }

    let dealt = outcome.damage.min(defender_hp);
    execute_command(
        BattleCommand::DealDamage {
            side: target,
            amount: outcome.damage,
            source: None,
        },
        battle,
        bus,
        env.hooks,
    )?;
    let knocked_out = battle.active(target).map_or(true, |c| c.is_fainted());
    Ok(Some(Strike {
        damage: dealt,
        behind_substitute: false,
        knocked_out,
    }))
}

/// Class-specific follow-up once a damaging move has landed.
#[allow(clippy::too_many_arguments)]
fn after_strike(
    user: usize,
    target: usize,
    descriptor: &MoveDescriptor,
    strike: &Strike,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
    effects: &mut Vec<PostActionEffect>,
) -> Result<(), BattleStateError> {
    let user_alive = battle.active(user).is_some_and(|c| c.is_alive());
    match descriptor.class {
        MoveClass::Recharge if user_alive => {
            if let Some(combatant) = battle.active_mut(user) {
                combatant.add_volatile(VolatileCondition::Recharging);
            }
        }
        MoveClass::Rampage if user_alive => continue_rampage(user, descriptor, battle, env, bus, rng)?,
        MoveClass::Binding => {
            let can_bind = !strike.behind_substitute
                && battle
                    .active(target)
                    .is_some_and(|c| c.is_alive() && !c.has_volatile(VolatileKind::PartiallyTrapped));
            if can_bind {
                let turns = rng.next_range(4, 5, "binding turns") as u8;
                execute_command(
                    BattleCommand::AddVolatile {
                        side: target,
                        condition: VolatileCondition::PartiallyTrapped {
                            source: user,
                            turns_remaining: turns,
                        },
                    },
                    battle,
                    bus,
                    env.hooks,
                )?;
            }
        }
        MoveClass::ClearHazards if user_alive => {
            clear_user_hazards(user, battle, bus);
            if let Some(combatant) = battle.active_mut(user) {
                combatant.remove_volatile(VolatileKind::PartiallyTrapped);
                combatant.remove_volatile(VolatileKind::Seeded);
            }
        }
        MoveClass::Pivot { transfers_volatiles } => {
            if user_alive && battle.rosters[user].has_alive_bench() {
                queue_pivot(user, transfers_volatiles, battle, bus, effects);
            }
        }
        _ => {}
    }
    Ok(())
}

fn continue_rampage(
    user: usize,
    descriptor: &MoveDescriptor,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<(), BattleStateError> {
    let Some(combatant) = battle.active_mut(user) else {
        return Ok(());
    };
    let finished = match combatant.volatile_mut(VolatileKind::Rampaging) {
        Some(VolatileCondition::Rampaging {
            turns_remaining, ..
        }) => {
            *turns_remaining = turns_remaining.saturating_sub(1);
            *turns_remaining == 0
        }
        _ => {
            let extra = rng.next_range(1, 2, "rampage length") as u8;
            combatant.add_volatile(VolatileCondition::Rampaging {
                move_name: descriptor.name.clone(),
                turns_remaining: extra,
            });
            false
        }
    };
    if finished {
        combatant.remove_volatile(VolatileKind::Rampaging);
        if !combatant.has_volatile(VolatileKind::Confused) {
            let turns = rng.next_range(2, 5, "fatigue confusion") as u8;
            execute_command(
                BattleCommand::AddVolatile {
                    side: user,
                    condition: VolatileCondition::Confused {
                        turns_remaining: turns,
                    },
                },
                battle,
                bus,
                env.hooks,
            )?;
        }
    }
    Ok(())
}

fn queue_pivot(
    user: usize,
    transfer: bool,
    battle: &Battle,
    bus: &mut EventBus,
    effects: &mut Vec<PostActionEffect>,
) {
    bus.push(BattleEvent::PivotPending {
        side: user,
        name: battle.active_name(user),
    });
    effects.push(PostActionEffect::PivotSwitch {
        side: user,
        transfer,
    });
}

/// Secondary effects. Returns true if at least one of them did something.
#[allow(clippy::too_many_arguments)]
fn apply_secondaries(
    user: usize,
    target: usize,
    descriptor: &MoveDescriptor,
    strike: Option<&Strike>,
    remaining: &ActionStack,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<bool, BattleStateError> {
    let shielded = strike.is_some_and(|s| s.behind_substitute);
    let damage = strike.map_or(0, |s| s.damage);
    let mut applied = false;

    for effect in &descriptor.secondary {
        if battle.is_over() {
            break;
        }
        let target_alive = battle.active(target).is_some_and(|c| c.is_alive());
        let user_alive = battle.active(user).is_some_and(|c| c.is_alive());

        match *effect {
            SecondaryEffect::Status { status, chance } => {
                if target_alive && !shielded && rng.chance(chance, "secondary status") {
                    applied |= try_inflict_status(target, status, user != target, battle, env, bus, rng)?;
                }
            }
            SecondaryEffect::Confuse { chance } => {
                let confused = battle
                    .active(target)
                    .is_some_and(|c| c.has_volatile(VolatileKind::Confused));
                if target_alive && !shielded && !confused && rng.chance(chance, "confusion") {
                    let turns = rng.next_range(2, 5, "confusion turns") as u8;
                    execute_command(
                        BattleCommand::AddVolatile {
                            side: target,
                            condition: VolatileCondition::Confused {
                                turns_remaining: turns,
                            },
                        },
                        battle,
                        bus,
                        env.hooks,
                    )?;
                    applied = true;
                }
            }
            SecondaryEffect::Flinch { chance } => {
                let yet_to_move = remaining.has_action_for(target);
                if strike.is_some()
                    && target_alive
                    && !shielded
                    && yet_to_move
                    && rng.chance(chance, "flinch")
                {
                    if let Some(defender) = battle.active_mut(target) {
                        defender.add_volatile(VolatileCondition::Flinched);
                    }
                    applied = true;
                }
            }
            SecondaryEffect::StatChange {
                target: who,
                stat,
                stages,
                chance,
            } => {
                let side = match who {
                    EffectTarget::User => user,
                    EffectTarget::Target => target,
                };
                let alive = battle.active(side).is_some_and(|c| c.is_alive());
                let blocked_by_substitute = side != user && shielded;
                if alive && !blocked_by_substitute && rng.chance(chance, "stat change") {
                    if side != user && stages < 0 && battle.sides[side].has_screen(Screen::Mist) {
                        bus.push(BattleEvent::StatChangeBlocked {
                            side,
                            name: battle.active_name(side),
                            stat,
                        });
                    } else {
                        change_stage(side, stat, stages, battle, env, bus)?;
                    }
                    applied = true;
                }
            }
            SecondaryEffect::Recoil { percent } => {
                let magic_guard = battle
                    .active(user)
                    .is_some_and(|c| env.catalog.active_ability(c) == AbilityEffect::MagicGuard);
                if user_alive && damage > 0 && !magic_guard {
                    let recoil = ((damage as u32 * percent as u32) / 100).max(1) as u16;
                    execute_command(
                        BattleCommand::DealDamage {
                            side: user,
                            amount: recoil,
                            source: Some(ResidualSource::Recoil),
                        },
                        battle,
                        bus,
                        env.hooks,
                    )?;
                    applied = true;
                }
            }
            SecondaryEffect::Drain { percent } => {
                if user_alive && damage > 0 {
                    let amount = ((damage as u32 * percent as u32) / 100).max(1) as u16;
                    execute_command(
                        BattleCommand::Heal { side: user, amount },
                        battle,
                        bus,
                        env.hooks,
                    )?;
                    applied = true;
                }
            }
            SecondaryEffect::Heal { percent } => {
                let Some(combatant) = battle.active(user) else {
                    continue;
                };
                if user_alive && combatant.current_hp() < combatant.max_hp() {
                    let amount =
                        ((combatant.max_hp() as u32 * percent as u32) / 100).max(1) as u16;
                    execute_command(
                        BattleCommand::Heal { side: user, amount },
                        battle,
                        bus,
                        env.hooks,
                    )?;
                    applied = true;
                }
            }
            SecondaryEffect::SetWeather(weather) => {
                if battle.field.set_weather(weather, env.rules.weather_turns) == FieldChange::Started {
                    bus.push(BattleEvent::WeatherStarted { weather });
                    applied = true;
                }
            }
            SecondaryEffect::SetTerrain(terrain) => {
                if battle.field.set_terrain(terrain, env.rules.terrain_turns) == FieldChange::Started {
                    bus.push(BattleEvent::TerrainStarted { terrain });
                    applied = true;
                }
            }
        }
    }
    Ok(applied)
}

/// Aftermath: knocking out the holder with a contact move costs a quarter of max HP.
fn apply_aftermath(
    user: usize,
    target: usize,
    descriptor: &MoveDescriptor,
    strike: &Strike,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    if !strike.knocked_out || !descriptor.flags.contact {
        return Ok(());
    }
    let (Some(attacker), Some(fallen)) = (battle.active(user), battle.active(target)) else {
        return Ok(());
    };
    if env.catalog.active_ability(fallen) != AbilityEffect::Aftermath
        || attacker.is_fainted()
        || env.catalog.active_ability(attacker) == AbilityEffect::MagicGuard
    {
        return Ok(());
    }
    let amount = attacker.fraction_of_max_hp(4);
    let activated = BattleEvent::AbilityActivated {
        side: target,
        name: fallen.name().to_string(),
        ability: fallen.ability.clone(),
    };
    execute_command_batch(
        vec![
            BattleCommand::EmitEvent(activated),
            BattleCommand::DealDamage {
                side: user,
                amount,
                source: Some(ResidualSource::Aftermath),
            },
        ],
        battle,
        bus,
        env.hooks,
    )
}

/// Cannot-act checks. Returns false if the combatant loses its action.
fn can_act(
    side: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<bool, BattleStateError> {
    let Some(combatant) = battle.active(side) else {
        return Ok(false);
    };
    let name = combatant.name().to_string();
    let status = combatant.status;

    match status {
        Some(StatusCondition::Sleep { turns: 0 }) => {
            execute_command(BattleCommand::SetStatus { side, status: None }, battle, bus, env.hooks)?;
        }
        Some(StatusCondition::Sleep { turns }) => {
            if let Some(sleeper) = battle.active_mut(side) {
                sleeper.status = Some(StatusCondition::Sleep { turns: turns - 1 });
            }
            bus.push(BattleEvent::ActionFailed {
                side,
                name,
                reason: ActionFailureReason::IsAsleep,
            });
            return Ok(false);
        }
        Some(StatusCondition::Freeze) => {
            if rng.chance(20, "thaw") {
                execute_command(BattleCommand::SetStatus { side, status: None }, battle, bus, env.hooks)?;
            } else {
                bus.push(BattleEvent::ActionFailed {
                    side,
                    name,
                    reason: ActionFailureReason::IsFrozen,
                });
                return Ok(false);
            }
        }
        _ => {}
    }

    let Some(combatant) = battle.active_mut(side) else {
        return Ok(false);
    };
    if combatant.remove_volatile(VolatileKind::Recharging).is_some() {
        bus.push(BattleEvent::ActionFailed {
            side,
            name,
            reason: ActionFailureReason::MustRecharge,
        });
        return Ok(false);
    }
    if combatant.has_volatile(VolatileKind::Flinched) {
        bus.push(BattleEvent::ActionFailed {
            side,
            name,
            reason: ActionFailureReason::IsFlinching,
        });
        return Ok(false);
    }

    if let Some(VolatileCondition::Confused { turns_remaining }) =
        combatant.volatile_mut(VolatileKind::Confused)
    {
        if *turns_remaining == 0 {
            combatant.remove_volatile(VolatileKind::Confused);
            bus.push(BattleEvent::VolatileExpired {
                side,
                name: name.clone(),
                kind: VolatileKind::Confused,
            });
        } else {
            *turns_remaining -= 1;
            if rng.chance(33, "confusion self-hit") {
                confusion_self_hit(side, battle, env, bus, rng)?;
                return Ok(false);
            }
        }
    }

    let paralyzed = battle
        .active(side)
        .is_some_and(|c| matches!(c.status, Some(StatusCondition::Paralysis)));
    if paralyzed && rng.chance(25, "full paralysis") {
        bus.push(BattleEvent::ActionFailed {
            side,
            name,
            reason: ActionFailureReason::IsParalyzed,
        });
        return Ok(false);
    }
    Ok(true)
}

/// 40-power typeless physical hit against itself.
fn confusion_self_hit(
    side: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<(), BattleStateError> {
    let descriptor = MoveDescriptor {
        name: "confusion".to_string(),
        move_type: PokemonType::Typeless,
        category: MoveCategory::Physical,
        power: Some(40),
        accuracy: None,
        max_pp: 0,
        priority: 0,
        target: MoveTarget::User,
        class: MoveClass::Standard,
        flags: MoveFlags::default(),
        secondary: Vec::new(),
    };
    let Some(combatant) = battle.active(side) else {
        return Ok(());
    };
    let ctx = DamageContext {
        attacker: combatant,
        defender: combatant,
        descriptor: &descriptor,
        defender_side: &battle.sides[side],
        field: &battle.field,
        catalog: env.catalog,
        self_inflicted: true,
    };
    let damage = match env.damage.calculate(&ctx, rng) {
        Ok(outcome) => outcome.damage,
        Err(err) => {
            warn!(side, error = %err, "confusion damage failed; skipped");
            return Ok(());
        }
    };
    execute_command(
        BattleCommand::DealDamage {
            side,
            amount: damage,
            source: Some(ResidualSource::Confusion),
        },
        battle,
        bus,
        env.hooks,
    )
}

/// A lost or failed turn ends any multi-turn lock.
fn disrupt_locked_move(side: usize, battle: &mut Battle) {
    if let Some(combatant) = battle.active_mut(side) {
        combatant.remove_volatile(VolatileKind::Rampaging);
        combatant.remove_volatile(VolatileKind::Charging);
        combatant.remove_volatile(VolatileKind::Invulnerable);
    }
}

/// Spend PP: one, plus one if the opposing active carries an extra-cost ability
/// and the move is aimed at it.
fn spend_pp(
    side: usize,
    move_name: &str,
    descriptor: &MoveDescriptor,
    battle: &mut Battle,
    env: &BattleEnv,
) {
    let slot = battle.active_slot(side);
    let Some(index) = battle.active(side).and_then(|c| c.knows_move(move_name)) else {
        return;
    };
    let aimed_at_opponent = matches!(
        descriptor.target,
        MoveTarget::Opponent | MoveTarget::OpponentSide
    );
    let pressure = battle.active(1 - side).is_some_and(|c| {
        c.is_alive() && env.catalog.active_ability(c) == AbilityEffect::ExtraPpCost
    });
    let cost = if aimed_at_opponent && pressure { 2 } else { 1 };

    if let Some((before, after)) = battle.pp.spend(side, slot, index, cost) {
        debug!(side, slot, move_name, cost, before, after, "pp spent");
    }
}

/// Lock the user into `move_name` if it holds a choice item or ability.
fn apply_choice_lock(side: usize, move_name: &str, battle: &mut Battle, env: &BattleEnv) {
    let Some(user) = battle.active(side) else {
        return;
    };
    if user.is_fainted()
        || user.has_volatile(VolatileKind::ChoiceLocked)
        || user.knows_move(move_name).is_none()
    {
        return;
    }
    let item_lock = matches!(
        env.catalog.held_item_effect(user, &battle.field),
        ItemEffect::ChoiceLock { .. }
    );
    let ability_lock = env.catalog.active_ability(user) == AbilityEffect::ChoiceLock;
    if !(item_lock || ability_lock) {
        return;
    }
    if let Some(user) = battle.active_mut(side) {
        user.add_volatile(VolatileCondition::ChoiceLocked {
            move_name: move_name.to_string(),
        });
    }
}

fn has_lock_on(side: usize, target: usize, battle: &Battle) -> bool {
    matches!(
        battle.active(side).and_then(|c| c.volatile(VolatileKind::LockOn)),
        Some(VolatileCondition::LockOn { target: locked }) if *locked == target
    )
}

fn fail(side: usize, battle: &Battle, bus: &mut EventBus, reason: ActionFailureReason) {
    bus.push(BattleEvent::ActionFailed {
        side,
        name: battle.active_name(side),
        reason,
    });
}

fn change_stage(
    side: usize,
    stat: StatType,
    delta: i8,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    execute_command(
        BattleCommand::ChangeStatStage { side, stat, delta },
        battle,
        bus,
        env.hooks,
    )
}

/// Inflict a non-volatile status if nothing prevents it. Returns true on success.
pub fn try_inflict_status(
    side: usize,
    status: StatusType,
    from_opponent: bool,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<bool, BattleStateError> {
    let Some(target) = battle.active(side) else {
        return Ok(false);
    };
    if target.is_fainted() || target.status.is_some() {
        return Ok(false);
    }
    let immune_by_type = match status {
        StatusType::Burn => target.has_type(PokemonType::Fire),
        StatusType::Paralysis => target.has_type(PokemonType::Electric),
        StatusType::Poison | StatusType::BadlyPoisoned => {
            target.has_type(PokemonType::Poison) || target.has_type(PokemonType::Steel)
        }
        StatusType::Freeze => target.has_type(PokemonType::Ice),
        StatusType::Sleep => false,
    };
    let safeguarded = from_opponent && battle.sides[side].has_screen(Screen::Safeguard);
    let grounded = is_grounded(target, &battle.field, env.catalog);
    let terrain_blocks = grounded
        && match battle.field.terrain {
            Some(Terrain::Misty) => true,
            Some(Terrain::Electric) => status == StatusType::Sleep,
            _ => false,
        };
    if immune_by_type || safeguarded || terrain_blocks {
        debug!(side, %status, immune_by_type, safeguarded, terrain_blocks, "status prevented");
        return Ok(false);
    }

    let sleep_turns = if status == StatusType::Sleep {
        rng.next_range(1, 3, "sleep turns") as u8
    } else {
        0
    };
    execute_command(
        BattleCommand::SetStatus {
            side,
            status: Some(StatusCondition::from_type(status, sleep_turns)),
        },
        battle,
        bus,
        env.hooks,
    )?;
    Ok(true)
}

fn protect(
    user: usize,
    kind: ProtectionKind,
    remaining: &ActionStack,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<bool, BattleStateError> {
    let streak = battle.active(user).map_or(0, |c| c.consecutive_protects);
    let chance = if env.rules.protect_decay_enabled {
        (100u32 / 3u32.pow(streak.min(5) as u32)) as u8
    } else {
        100
    };
    let opponent_pending = remaining.has_action_for(1 - user);

    if !opponent_pending || !rng.chance(chance, "protect") {
        if let Some(combatant) = battle.active_mut(user) {
            combatant.consecutive_protects = 0;
        }
        fail(user, battle, bus, ActionFailureReason::Generic);
        return Ok(false);
    }

    if let Some(combatant) = battle.active_mut(user) {
        combatant.consecutive_protects = combatant.consecutive_protects.saturating_add(1);
    }
    execute_command_batch(
        vec![
            BattleCommand::AddVolatile {
                side: user,
                condition: VolatileCondition::Protected { kind },
            },
            BattleCommand::EmitEvent(BattleEvent::ProtectedItself {
                side: user,
                name: battle.active_name(user),
            }),
        ],
        battle,
        bus,
        env.hooks,
    )?;
    Ok(true)
}

fn set_weather(
    user: usize,
    weather: Weather,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> bool {
    let extended = battle
        .active(user)
        .is_some_and(|c| env.catalog.held_item_effect(c, &battle.field) == ItemEffect::ExtendsWeather);
    let turns = if extended {
        env.rules.extended_weather_turns
    } else {
        env.rules.weather_turns
    };
    match battle.field.set_weather(weather, turns) {
        FieldChange::Started => {
            bus.push(BattleEvent::WeatherStarted { weather });
            true
        }
        FieldChange::AlreadyActive => {
            fail(user, battle, bus, ActionFailureReason::AlreadyActive);
            false
        }
        FieldChange::BlockedByPersistent | FieldChange::Ended => {
            fail(user, battle, bus, ActionFailureReason::Generic);
            false
        }
    }
}

fn set_terrain(
    user: usize,
    terrain: Terrain,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> bool {
    match battle.field.set_terrain(terrain, env.rules.terrain_turns) {
        FieldChange::Started => {
            bus.push(BattleEvent::TerrainStarted { terrain });
            true
        }
        _ => {
            fail(user, battle, bus, ActionFailureReason::AlreadyActive);
            false
        }
    }
}

fn set_hazard(
    user: usize,
    target: usize,
    hazard: Hazard,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> bool {
    let max_layers = match hazard {
        Hazard::Spikes => env.rules.max_spikes_layers,
        Hazard::ToxicSpikes => env.rules.max_toxic_spikes_layers,
        Hazard::StealthRock | Hazard::StickyWeb => 1,
    };
    match battle.sides[target].add_hazard(hazard, max_layers) {
        HazardChange::Added { layers } => {
            bus.push(BattleEvent::HazardSet {
                side: target,
                hazard,
                layers,
            });
            true
        }
        HazardChange::AtMaxLayers => {
            fail(user, battle, bus, ActionFailureReason::AlreadyActive);
            false
        }
    }
}

fn set_screen(
    user: usize,
    screen: Screen,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> bool {
    if screen == Screen::AuroraVeil && battle.field.weather != Some(Weather::Snow) {
        fail(user, battle, bus, ActionFailureReason::Generic);
        return false;
    }
    let extended = battle
        .active(user)
        .is_some_and(|c| env.catalog.held_item_effect(c, &battle.field) == ItemEffect::ExtendsScreens);
    let turns = match screen {
        Screen::Tailwind => env.rules.tailwind_turns,
        _ if extended => env.rules.extended_screen_turns,
        _ => env.rules.screen_turns,
    };
    if battle.sides[user].set_screen(screen, turns) {
        bus.push(BattleEvent::ScreenSet { side: user, screen });
        true
    } else {
        fail(user, battle, bus, ActionFailureReason::AlreadyActive);
        false
    }
}

fn set_global(
    user: usize,
    effect: GlobalEffect,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> bool {
    let turns = match effect {
        GlobalEffect::TrickRoom => env.rules.trick_room_turns,
        GlobalEffect::Gravity => env.rules.gravity_turns,
        GlobalEffect::MagicRoom => env.rules.magic_room_turns,
        GlobalEffect::Stasis => env.rules.stasis_turns,
    };
    match battle.field.set_global(effect, turns) {
        FieldChange::Started => {
            bus.push(BattleEvent::GlobalEffectStarted { effect });
            true
        }
        FieldChange::Ended => {
            bus.push(BattleEvent::GlobalEffectEnded { effect });
            true
        }
        FieldChange::AlreadyActive | FieldChange::BlockedByPersistent => {
            fail(user, battle, bus, ActionFailureReason::AlreadyActive);
            false
        }
    }
}

fn clear_user_hazards(user: usize, battle: &mut Battle, bus: &mut EventBus) {
    let hazards = battle.sides[user].clear_hazards();
    bus.push(BattleEvent::HazardsCleared {
        side: user,
        hazards,
    });
}

fn make_wish(user: usize, battle: &mut Battle, env: &BattleEnv, bus: &mut EventBus) -> bool {
    if battle.sides[user].wish.is_some() {
        fail(user, battle, bus, ActionFailureReason::Generic);
        return false;
    }
    let Some(combatant) = battle.active(user) else {
        return false;
    };
    let name = combatant.name().to_string();
    let heal_amount = combatant.fraction_of_max_hp(2);
    battle.sides[user].wish = Some(PendingWish {
        user_name: name.clone(),
        heal_amount,
        turns_remaining: env.rules.wish_turns,
    });
    bus.push(BattleEvent::WishMade { side: user, name });
    true
}

fn make_substitute(
    user: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<bool, BattleStateError> {
    let Some(combatant) = battle.active(user) else {
        return Ok(false);
    };
    if combatant.has_volatile(VolatileKind::Substitute) {
        fail(user, battle, bus, ActionFailureReason::AlreadyActive);
        return Ok(false);
    }
    let cost = combatant.fraction_of_max_hp(4);
    if combatant.current_hp() <= cost {
        fail(user, battle, bus, ActionFailureReason::SubstituteTooWeak);
        return Ok(false);
    }
    execute_command_batch(
        vec![
            BattleCommand::DealDamage {
                side: user,
                amount: cost,
                source: Some(ResidualSource::Substitute),
            },
            BattleCommand::AddVolatile {
                side: user,
                condition: VolatileCondition::Substitute { hp: cost },
            },
        ],
        battle,
        bus,
        env.hooks,
    )?;
    Ok(true)
}

fn seed(
    user: usize,
    target: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<bool, BattleStateError> {
    let Some(defender) = battle.active(target) else {
        return Ok(false);
    };
    if defender.has_type(PokemonType::Grass) {
        bus.push(BattleEvent::NoEffect {
            target_name: defender.name().to_string(),
        });
        return Ok(false);
    }
    let already = defender.has_volatile(VolatileKind::Seeded);
    add_volatile_or_fail(
        user,
        target,
        already,
        VolatileCondition::Seeded { source: user },
        battle,
        env,
        bus,
    )
}

fn add_volatile_or_fail(
    user: usize,
    target: usize,
    already: bool,
    condition: VolatileCondition,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<bool, BattleStateError> {
    if already {
        fail(user, battle, bus, ActionFailureReason::Generic);
        return Ok(false);
    }
    execute_command(
        BattleCommand::AddVolatile {
            side: target,
            condition,
        },
        battle,
        bus,
        env.hooks,
    )?;
    Ok(true)
}

/// Delayed attacks compute their damage now and land on the target side later.
fn register_delayed_attack(
    user: usize,
    descriptor: &MoveDescriptor,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<(), BattleStateError> {
    let target = 1 - user;
    if !battle.sides[target].delayed_attacks.is_empty() {
        fail(user, battle, bus, ActionFailureReason::AlreadyActive);
        return Ok(());
    }
    let (Some(attacker), Some(defender)) = (battle.active(user), battle.active(target)) else {
        return Ok(());
    };
    let ctx = DamageContext {
        attacker,
        defender,
        descriptor,
        defender_side: &battle.sides[target],
        field: &battle.field,
        catalog: env.catalog,
        self_inflicted: false,
    };
    let damage = match env.damage.calculate(&ctx, rng) {
        Ok(outcome) => outcome.damage,
        Err(err) => {
            warn!(side = user, error = %err, "delayed attack damage failed; skipped");
            return Ok(());
        }
    };
    let user_name = attacker.name().to_string();
    battle.sides[target].delayed_attacks.push(PendingDelayedAttack {
        move_name: descriptor.name.clone(),
        user_name: user_name.clone(),
        damage,
        turns_remaining: env.rules.delayed_attack_turns,
    });
    bus.push(BattleEvent::DelayedAttackRegistered {
        side: user,
        name: user_name,
        move_name: descriptor.name.clone(),
    });
    Ok(())
}
