//! Battle orchestrator. Composes normalisation, ordering, switching,
//! transformations, move execution and the end-of-turn pass into one
//! resolution per turn. A pivot suspends the pass and hands back a
//! [`Continuation`]; the caller owns waiting for the switch choice.
use crate::battle::action_stack::{ActionStack, BattleAction, SwitchCause};
use crate::battle::commands::{check_win_conditions, execute_command_batch, BattleCommand};
use crate::battle::damage::{DamageCalculator, StandardDamageCalculator};
use crate::battle::end_of_turn::process_end_of_turn;
use crate::battle::hooks::HookRegistry;
use crate::battle::move_executor::{execute_move, PostActionEffect};
use crate::battle::normalizer::{normalize_actions, Adjustment};
use crate::battle::state::{
    ActionFailureReason, Battle, BattleEvent, EventBus, GameState, TurnAction, TurnRng,
};
use crate::battle::stats::effective_speed;
use crate::battle::switching::{apply_entry_abilities, perform_switch};
use crate::battle::transform::{apply_pending_transformations, EquipmentGate, TransformationGate};
use crate::battle::turn_order::determine_action_order;
use crate::catalog::CatalogView;
use crate::config::RulesConfig;
use crate::errors::{BattleEngineError, BattleStateError};
use schema::ItemEffect;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Borrowed collaborators for one resolution pass.
#[derive(Clone, Copy)]
pub struct BattleEnv<'a> {
    pub catalog: &'a CatalogView,
    pub damage: &'a dyn DamageCalculator,
    pub hooks: &'a HookRegistry,
    pub rules: &'a RulesConfig,
    pub gate: &'a dyn TransformationGate,
}

/// Owned collaborators shared by every battle in a process.
#[derive(Clone)]
pub struct BattleServices {
    pub catalog: CatalogView,
    pub damage: Arc<dyn DamageCalculator>,
    pub hooks: HookRegistry,
    pub rules: RulesConfig,
    pub gate: Arc<dyn TransformationGate>,
}

impl BattleServices {
    pub fn new(catalog: CatalogView, rules: RulesConfig) -> Self {
        Self {
            catalog,
            damage: Arc::new(StandardDamageCalculator),
            hooks: HookRegistry::new(),
            rules,
            gate: Arc::new(EquipmentGate),
        }
    }

    pub fn with_damage(mut self, damage: Arc<dyn DamageCalculator>) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn TransformationGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn env(&self) -> BattleEnv<'_> {
        BattleEnv {
            catalog: &self.catalog,
            damage: self.damage.as_ref(),
            hooks: &self.hooks,
            rules: &self.rules,
            gate: self.gate.as_ref(),
        }
    }
}

/// Everything a finished pass produced.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub events: Vec<BattleEvent>,
    /// Plain log lines, silent events left out.
    pub lines: Vec<String>,
    pub game_state: GameState,
}

/// A pass suspended for a mid-turn switch choice.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Continuation {
    /// Side that must pick the incoming combatant.
    pub side: usize,
    pub transfer_volatiles: bool,
    /// Actions not yet executed this turn.
    pub remaining: ActionStack,
    /// Events logged before the suspension.
    pub log: Vec<BattleEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(TurnReport),
    AwaitingSwitch(Continuation),
}

impl TurnOutcome {
    pub fn report(&self) -> Option<&TurnReport> {
        match self {
            TurnOutcome::Completed(report) => Some(report),
            TurnOutcome::AwaitingSwitch(_) => None,
        }
    }
}

fn report(battle: &Battle, bus: EventBus) -> TurnReport {
    let lines = bus.lines(battle);
    TurnReport {
        events: bus.into_events(),
        lines,
        game_state: battle.game_state,
    }
}

/// Send out both leads and fire their entry abilities, faster side first.
pub fn start_battle(battle: &mut Battle, env: &BattleEnv) -> Result<TurnReport, BattleEngineError> {
    let mut bus = EventBus::new();
    info!(
        battle_id = %battle.battle_id,
        side_one = %battle.trainer_name(0),
        side_two = %battle.trainer_name(1),
        "battle started"
    );
    for side in 0..2 {
        bus.push(BattleEvent::CombatantSentOut {
            side,
            name: battle.active_name(side),
        });
    }

    let speeds = [0, 1].map(|side| {
        battle
            .active(side)
            .map_or(0, |c| effective_speed(c, &battle.sides[side], &battle.field, env.catalog))
    });
    let order = if speeds[1] > speeds[0] { [1, 0] } else { [0, 1] };
    for side in order {
        if battle.active(side).is_some_and(|c| c.is_alive()) {
            apply_entry_abilities(side, battle, env, &mut bus)?;
        }
    }
    Ok(report(battle, bus))
}

/// Resolve one turn from the queued actions. Replacement phases are routed
/// to [`resolve_replacements`].
pub fn resolve_turn(
    battle: &mut Battle,
    env: &BattleEnv,
    rng: &mut TurnRng,
) -> Result<TurnOutcome, BattleEngineError> {
    if battle.is_over() {
        return Err(BattleStateError::BattleOver.into());
    }
    if let GameState::AwaitingPivotSwitch { side } = battle.game_state {
        return Err(BattleStateError::UnexpectedContinuation(side).into());
    }
    if battle.game_state.is_replacement_phase() {
        return resolve_replacements(battle, env).map(TurnOutcome::Completed);
    }

    let mut bus = EventBus::new();
    initialize_turn(battle, env, &mut bus)?;

    let normalized = normalize_actions(battle, env.catalog);
    let forced = [0, 1].map(|side| normalized[side].adjustment == Some(Adjustment::ForcedMove));
    let actions = normalized.map(|n| n.action);
    let order = determine_action_order(battle, &actions, env.catalog, rng);
    debug!(
        battle_id = %battle.battle_id,
        turn = battle.turn_number,
        first = %actions[order[0]],
        second = %actions[order[1]],
        "actions ordered"
    );

    let mut stack = ActionStack::new();
    for side in order {
        stack.push_back(to_battle_action(side, &actions[side], forced[side]));
    }
    let pending = [Some(actions[0].clone()), Some(actions[1].clone())];
    run_actions(battle, stack, bus, Some(pending), env, rng)
}

/// Continue a suspended pass with the side's choice. An unusable slot falls
/// back to the first healthy bench member; a forfeit ends the battle there.
pub fn resume_turn(
    battle: &mut Battle,
    continuation: Continuation,
    choice: TurnAction,
    env: &BattleEnv,
    rng: &mut TurnRng,
) -> Result<TurnOutcome, BattleEngineError> {
    let side = continuation.side;
    if choice == TurnAction::Forfeit {
        return forfeit_suspended_turn(battle, continuation, side, env);
    }
    match battle.game_state {
        GameState::AwaitingPivotSwitch { side: waiting } if waiting == side => {}
        _ => return Err(BattleStateError::NoPendingContinuation.into()),
    }

    let mut bus = EventBus::new();
    for event in continuation.log {
        bus.push(event);
    }
    battle.game_state = GameState::TurnInProgress;

    let roster = &battle.rosters[side];
    let requested = match choice {
        TurnAction::Switch { slot } => Some(slot),
        _ => None,
    };
    let target = requested
        .filter(|slot| roster.is_valid_switch_target(*slot))
        .or_else(|| roster.bench_slots().next());
    if let Some(target) = target {
        perform_switch(
            side,
            target,
            SwitchCause::Pivot {
                transfer: continuation.transfer_volatiles,
            },
            battle,
            env,
            &mut bus,
        )?;
    }
    run_actions(battle, continuation.remaining, bus, None, env, rng)
}

/// End a suspended pass because `side` forfeited while the pivot choice was
/// outstanding. The queued remainder of the turn is dropped.
pub fn forfeit_suspended_turn(
    battle: &mut Battle,
    continuation: Continuation,
    side: usize,
    env: &BattleEnv,
) -> Result<TurnOutcome, BattleEngineError> {
    if side > 1 {
        return Err(BattleStateError::InvalidSide(side).into());
    }
    match battle.game_state {
        GameState::AwaitingPivotSwitch { side: waiting } if waiting == continuation.side => {}
        _ => return Err(BattleStateError::NoPendingContinuation.into()),
    }

    let mut bus = EventBus::new();
    for event in continuation.log {
        bus.push(event);
    }
    battle.game_state = GameState::TurnInProgress;
    execute_forfeit(side, battle, env, &mut bus)?;
    finalize_turn(battle, env, &mut bus)?;
    Ok(TurnOutcome::Completed(report(battle, bus)))
}

/// Send in replacements for fainted actives. Does not advance the turn.
pub fn resolve_replacements(
    battle: &mut Battle,
    env: &BattleEnv,
) -> Result<TurnReport, BattleEngineError> {
    let mut bus = EventBus::new();
    let forfeiting = (0..2).find(|side| battle.action_queue[*side] == Some(TurnAction::Forfeit));
    if let Some(side) = forfeiting {
        execute_forfeit(side, battle, env, &mut bus)?;
        execute_command_batch(vec![BattleCommand::ClearActionQueue], battle, &mut bus, env.hooks)?;
        return Ok(report(battle, bus));
    }

    for side in battle.game_state.sides_needing_replacement() {
        let chosen = match battle.action_queue[side] {
            Some(TurnAction::Switch { slot }) if battle.rosters[side].is_valid_switch_target(slot) => {
                Some(slot)
            }
            _ => battle.rosters[side].bench_slots().next(),
        };
        let Some(slot) = chosen else {
            continue;
        };
        perform_switch(side, slot, SwitchCause::Replacement, battle, env, &mut bus)?;
        if battle.is_over() {
            break;
        }
    }

    check_win_conditions(battle, &mut bus);
    if !battle.is_over() {
        execute_command_batch(
            vec![BattleCommand::SetGameState(GameState::WaitingForActions)],
            battle,
            &mut bus,
            env.hooks,
        )?;
        check_for_pending_replacements(battle);
    }
    execute_command_batch(vec![BattleCommand::ClearActionQueue], battle, &mut bus, env.hooks)?;
    Ok(report(battle, bus))
}

fn initialize_turn(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    execute_command_batch(
        vec![BattleCommand::SetGameState(GameState::TurnInProgress)],
        battle,
        bus,
        env.hooks,
    )?;
    for side in battle.sides.iter_mut() {
        side.reset_turn_flags();
    }
    bus.push(BattleEvent::TurnStarted {
        turn_number: battle.turn_number,
    });
    Ok(())
}

/// `forced` marks locked continuations (rampage turns, the firing turn of a
/// charge move, recharging), which spend no PP.
fn to_battle_action(side: usize, action: &TurnAction, forced: bool) -> BattleAction {
    match action {
        TurnAction::Forfeit => BattleAction::Forfeit { side },
        TurnAction::Switch { slot } => BattleAction::Switch {
            side,
            slot: *slot,
            cause: SwitchCause::Voluntary,
        },
        TurnAction::UseItem { item, target_slot } => BattleAction::UseItem {
            side,
            item: item.clone(),
            target_slot: *target_slot,
        },
        TurnAction::UseMove { move_name } => BattleAction::Move {
            side,
            move_name: move_name.clone(),
            forced,
        },
    }
}

/// Pop and execute actions until the stack is empty, the battle ends, or a
/// pivot suspends the pass. `transformations` holds this turn's normalised
/// actions until transformations have been committed.
fn run_actions(
    battle: &mut Battle,
    mut stack: ActionStack,
    mut bus: EventBus,
    mut transformations: Option<[Option<TurnAction>; 2]>,
    env: &BattleEnv,
    rng: &mut TurnRng,
) -> Result<TurnOutcome, BattleEngineError> {
    while let Some(action) = stack.pop_front() {
        let reaches_moves = matches!(
            action,
            BattleAction::Move { .. } | BattleAction::UseItem { .. }
        );
        if reaches_moves {
            if let Some(actions) = transformations.take() {
                apply_pending_transformations(battle, &actions, env, &mut bus);
            }
        }

        let effects = execute_battle_action(action, battle, &stack, env, &mut bus, rng)?;
        if battle.game_state != GameState::TurnInProgress {
            break;
        }

        for effect in effects {
            match effect {
                PostActionEffect::ForcedSwitch { side } => {
                    if force_switch(side, battle, env, &mut bus, rng)? {
                        stack.remove_side(side);
                    }
                }
                PostActionEffect::PivotSwitch { side, transfer } => {
                    let can_switch = battle.active(side).is_some_and(|c| c.is_alive())
                        && battle.rosters[side].has_alive_bench();
                    if !can_switch {
                        continue;
                    }
                    battle.game_state = GameState::AwaitingPivotSwitch { side };
                    debug!(
                        battle_id = %battle.battle_id,
                        side,
                        remaining = stack.len(),
                        "turn suspended for pivot switch"
                    );
                    return Ok(TurnOutcome::AwaitingSwitch(Continuation {
                        side,
                        transfer_volatiles: transfer,
                        remaining: stack,
                        log: bus.into_events(),
                    }));
                }
            }
            if battle.game_state != GameState::TurnInProgress {
                break;
            }
        }
        if battle.game_state != GameState::TurnInProgress {
            break;
        }
    }

    // Nobody reached a move: pending requests are rolled back, or simply
    // dropped if a forfeit already ended the battle.
    if let Some(actions) = transformations.take() {
        if battle.is_over() {
            battle.pending_transformations = [None, None];
        } else {
            apply_pending_transformations(battle, &actions, env, &mut bus);
        }
    }

    if battle.game_state == GameState::TurnInProgress {
        process_end_of_turn(battle, env, &mut bus)?;
    }
    finalize_turn(battle, env, &mut bus)?;
    Ok(TurnOutcome::Completed(report(battle, bus)))
}

fn execute_battle_action(
    action: BattleAction,
    battle: &mut Battle,
    remaining: &ActionStack,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<Vec<PostActionEffect>, BattleStateError> {
    match action {
        BattleAction::Forfeit { side } => {
            execute_forfeit(side, battle, env, bus)?;
            Ok(Vec::new())
        }
        BattleAction::Switch { side, slot, cause } => {
            if battle.rosters[side].is_valid_switch_target(slot) {
                perform_switch(side, slot, cause, battle, env, bus)?;
            } else {
                debug!(side, slot, "queued switch target no longer valid");
            }
            Ok(Vec::new())
        }
        BattleAction::UseItem {
            side,
            item,
            target_slot,
        } => {
            use_item(side, &item, target_slot, battle, env, bus);
            Ok(Vec::new())
        }
        BattleAction::Move {
            side,
            move_name,
            forced,
        } => execute_move(side, &move_name, forced, remaining, battle, env, bus, rng),
    }
}

fn execute_forfeit(
    side: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    let winner = 1 - side;
    let state = if winner == 0 {
        GameState::Player1Win
    } else {
        GameState::Player2Win
    };
    battle.forfeited_by = Some(side);
    info!(battle_id = %battle.battle_id, side, "side forfeited");
    execute_command_batch(
        vec![
            BattleCommand::SetGameState(state),
            BattleCommand::EmitEvent(BattleEvent::PlayerForfeited { side }),
            BattleCommand::EmitEvent(BattleEvent::BattleEnded {
                winner: Some(winner),
            }),
        ],
        battle,
        bus,
        env.hooks,
    )
}

/// Medicine from the bag on one roster slot. Anything else, or a fainted
/// target, fails without effect.
fn use_item(
    side: usize,
    item: &str,
    target_slot: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) {
    let descriptor = env.catalog.item(item);
    let ItemEffect::Medicine { heal, cures_status } = descriptor.effect else {
        fail_item(side, battle, bus);
        return;
    };
    let Some(target) = battle.rosters[side].member_mut(target_slot) else {
        fail_item(side, battle, bus);
        return;
    };
    if target.is_fainted() {
        fail_item(side, battle, bus);
        return;
    }

    let name = target.name().to_string();
    bus.push(BattleEvent::ItemUsed {
        side,
        item: descriptor.name.clone(),
        target_name: name.clone(),
    });
    if heal > 0 {
        let amount = target.heal(heal);
        if amount > 0 {
            bus.push(BattleEvent::CombatantHealed {
                side,
                name: name.clone(),
                amount,
                new_hp: target.current_hp(),
            });
        }
    }
    if cures_status {
        if let Some(status) = target.status.take() {
            bus.push(BattleEvent::StatusRemoved { side, name, status });
        }
    }
}

fn fail_item(side: usize, battle: &Battle, bus: &mut EventBus) {
    bus.push(BattleEvent::ActionFailed {
        side,
        name: battle.active_name(side),
        reason: ActionFailureReason::Generic,
    });
}

/// Drag `side` out for a random healthy bench member. Returns true if a
/// switch happened.
fn force_switch(
    side: usize,
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
    rng: &mut TurnRng,
) -> Result<bool, BattleStateError> {
    let bench: Vec<usize> = battle.rosters[side].bench_slots().collect();
    if bench.is_empty() || battle.active(side).map_or(true, |c| c.is_fainted()) {
        return Ok(false);
    }
    let pick = rng.next_range(0, bench.len() as u32 - 1, "forced switch target") as usize;
    let Some(&slot) = bench.get(pick).or(bench.first()) else {
        return Ok(false);
    };
    perform_switch(side, slot, SwitchCause::ForcedOut, battle, env, bus)?;
    Ok(true)
}

fn finalize_turn(
    battle: &mut Battle,
    env: &BattleEnv,
    bus: &mut EventBus,
) -> Result<(), BattleStateError> {
    check_win_conditions(battle, bus);

    // The turn counts even when it ended the battle.
    let mut commands = vec![BattleCommand::IncrementTurnNumber];
    if battle.game_state == GameState::TurnInProgress {
        commands.push(BattleCommand::SetGameState(GameState::WaitingForActions));
    }
    execute_command_batch(commands, battle, bus, env.hooks)?;

    check_for_pending_replacements(battle);

    execute_command_batch(
        vec![
            BattleCommand::ClearActionQueue,
            BattleCommand::EmitEvent(BattleEvent::TurnEnded),
        ],
        battle,
        bus,
        env.hooks,
    )?;
    debug!(
        battle_id = %battle.battle_id,
        turn = battle.turn_number,
        state = ?battle.game_state,
        "turn finalised"
    );
    Ok(())
}

/// Switch to a replacement phase if an active combatant is down and its side
/// still has someone to send in.
fn check_for_pending_replacements(battle: &mut Battle) {
    if battle.is_over() {
        return;
    }
    let needs = [0, 1].map(|side| {
        battle.rosters[side].active_is_fainted() && battle.rosters[side].has_alive_bench()
    });
    let state = match needs {
        [true, true] => GameState::WaitingForBothReplacements,
        [true, false] => GameState::WaitingForPlayer1Replacement,
        [false, true] => GameState::WaitingForPlayer2Replacement,
        [false, false] => return,
    };
    battle.game_state = state;
}
