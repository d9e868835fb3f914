use crate::battle::conditions::VolatileKind;
use crate::battle::engine::{resolve_turn, TurnOutcome, TurnReport};
use crate::battle::state::{
    ActionFailureReason, Battle, BattleEvent, ResidualSource, TurnAction,
};
use crate::battle::tests::common::{
    create_test_battle, create_test_battle_with_rosters, predictable_rng, test_services,
    TestCombatantBuilder,
};
use crate::combatant::StatusCondition;
use pretty_assertions::assert_eq;
use schema::PokemonType;

fn play(battle: &mut Battle, first: &str, second: &str) -> TurnReport {
    let services = test_services();
    let env = services.env();
    battle
        .submit_action(0, TurnAction::use_move(first))
        .expect("side 0 submits");
    battle
        .submit_action(1, TurnAction::use_move(second))
        .expect("side 1 submits");
    match resolve_turn(battle, &env, &mut predictable_rng()).expect("turn") {
        TurnOutcome::Completed(report) => report,
        TurnOutcome::AwaitingSwitch(_) => panic!("unexpected pivot"),
    }
}

fn pp(battle: &Battle, side: usize, move_index: usize) -> Option<u8> {
    let slot = battle.active_slot(side);
    battle.pp.entry(side, slot, move_index).map(|e| e.current)
}

#[test]
fn test_extra_pp_cost_ability_doubles_the_cost() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu").build(),
        TestCombatantBuilder::new("dusclops")
            .with_ability("pressure")
            .build(),
    );

    play(&mut battle, "tackle", "tackle");

    assert_eq!(pp(&battle, 0, 0), Some(33));
    assert_eq!(pp(&battle, 1, 0), Some(34));
}

#[test]
fn test_choice_item_locks_the_first_move() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu")
            .with_item("choice-scarf")
            .with_moves(&["tackle", "quick-attack"])
            .build(),
        TestCombatantBuilder::new("snorlax").build(),
    );

    play(&mut battle, "tackle", "tackle");
    assert_eq!(
        battle.active(0).and_then(|c| c.choice_locked_move()),
        Some("tackle")
    );

    let report = play(&mut battle, "quick-attack", "tackle");
    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::MoveUsed { side: 0, move_name, .. } if move_name == "tackle"
    )));
    assert_eq!(pp(&battle, 0, 0), Some(33));
    assert_eq!(pp(&battle, 0, 1), Some(30));
}

#[test]
fn test_protect_blocks_then_decays() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu")
            .with_moves(&["protect", "tackle"])
            .build(),
        TestCombatantBuilder::new("snorlax").build(),
    );

    let report = play(&mut battle, "protect", "tackle");
    assert_eq!(battle.active(0).map(|c| c.current_hp()), Some(155));
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::ProtectionBlocked { side: 0, .. })));
    assert!(!battle
        .active(0)
        .is_some_and(|c| c.has_volatile(VolatileKind::Protected)));

    // Second use in a row succeeds a third of the time; the scripted 50 misses.
    let report = play(&mut battle, "protect", "tackle");
    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::ActionFailed {
            side: 0,
            reason: ActionFailureReason::Generic,
            ..
        }
    )));
    assert_eq!(battle.active(0).map(|c| c.current_hp()), Some(128));
}

#[test]
fn test_protect_fails_when_opponent_already_moved() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu")
            .with_moves(&["protect"])
            .build(),
        TestCombatantBuilder::new("jolteon")
            .with_speed(300)
            .with_moves(&["protect"])
            .build(),
    );

    let report = play(&mut battle, "protect", "protect");

    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::ProtectedItself { side: 1, .. })));
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::ActionFailed { side: 0, .. })));
    assert_eq!(battle.active(0).map(|c| c.consecutive_protects), Some(0));
}

#[test]
fn test_taunt_stops_status_moves() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu")
            .with_moves(&["thunder-wave"])
            .build(),
        TestCombatantBuilder::new("sableye")
            .with_speed(200)
            .with_moves(&["taunt"])
            .build(),
    );

    let report = play(&mut battle, "thunder-wave", "taunt");

    assert!(battle
        .active(0)
        .is_some_and(|c| c.has_volatile(VolatileKind::Taunted)));
    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::ActionFailed {
            side: 0,
            reason: ActionFailureReason::IsTaunted,
            ..
        }
    )));
    assert_eq!(battle.active(1).and_then(|c| c.status), None);
}

#[test]
fn test_leech_seed_drains_at_end_of_turn() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("bulbasaur")
            .with_speed(200)
            .with_moves(&["leech-seed"])
            .build(),
        TestCombatantBuilder::new("snorlax").build(),
    );

    let report = play(&mut battle, "leech-seed", "tackle");

    assert_eq!(battle.active(1).map(|c| c.current_hp()), Some(155 - 19));
    assert_eq!(battle.active(0).map(|c| c.current_hp()), Some(128 + 19));
    let drains = report
        .events
        .iter()
        .filter(|e| {
            matches!(
                e,
                BattleEvent::ResidualDamage {
                    side: 1,
                    source: ResidualSource::LeechSeed,
                    ..
                }
            )
        })
        .count();
    assert_eq!(drains, 1);
}

#[test]
fn test_magic_bounce_reflects_status_moves() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu")
            .with_moves(&["thunder-wave"])
            .build(),
        TestCombatantBuilder::new("espeon")
            .with_ability("magic-bounce")
            .build(),
    );

    let report = play(&mut battle, "thunder-wave", "tackle");

    assert_eq!(
        battle.active(0).and_then(|c| c.status),
        Some(StatusCondition::Paralysis)
    );
    assert_eq!(battle.active(1).and_then(|c| c.status), None);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::MoveReflected { side: 1, .. })));
}

#[test]
fn test_roar_drags_out_the_target() {
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("pikachu").build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("arcanine")
            .with_moves(&["roar"])
            .build()],
    );

    let report = play(&mut battle, "tackle", "roar");

    assert_eq!(battle.rosters[0].active, 1);
    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::CombatantSwitched { side: 0, new_name, .. } if new_name == "raichu"
    )));
}

#[test]
fn test_roar_fails_without_a_bench() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu").build(),
        TestCombatantBuilder::new("arcanine")
            .with_moves(&["roar"])
            .build(),
    );

    let report = play(&mut battle, "tackle", "roar");

    assert_eq!(battle.rosters[0].active, 0);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::ActionFailed { side: 1, .. })));
}

#[test]
fn test_immune_target_takes_no_damage() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("snorlax").build(),
        TestCombatantBuilder::new("gengar")
            .with_types(vec![PokemonType::Ghost])
            .build(),
    );

    let report = play(&mut battle, "tackle", "tackle");

    assert_eq!(battle.active(1).map(|c| c.current_hp()), Some(155));
    assert!(battle.active(0).is_some_and(|c| c.current_hp() < 155));
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::NoEffect { target_name } if target_name == "gengar")));
}
