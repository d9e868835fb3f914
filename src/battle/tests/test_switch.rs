use crate::battle::conditions::{VolatileCondition, VolatileKind};
use crate::battle::engine::{resolve_turn, resume_turn, TurnOutcome, TurnReport};
use crate::battle::state::{Battle, BattleEvent, ResidualSource, TurnAction};
use crate::battle::tests::common::{
    create_test_battle_with_rosters, predictable_rng, test_services, TestCombatantBuilder,
};
use pretty_assertions::assert_eq;
use schema::Hazard;

fn two_on_two() -> Battle {
    create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("pikachu").build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![
            TestCombatantBuilder::new("gengar")
                .with_ability("shadow-tag")
                .build(),
            TestCombatantBuilder::new("haunter").build(),
        ],
    )
}

fn resolve(battle: &mut Battle, first: TurnAction, second: TurnAction) -> TurnReport {
    let services = test_services();
    let env = services.env();
    battle.submit_action(0, first).expect("side 0 submits");
    battle.submit_action(1, second).expect("side 1 submits");
    match resolve_turn(battle, &env, &mut predictable_rng()).expect("turn") {
        TurnOutcome::Completed(report) => report,
        TurnOutcome::AwaitingSwitch(_) => panic!("unexpected pivot"),
    }
}

fn leech_seed_drains(report: &TurnReport, side: usize) -> usize {
    report
        .events
        .iter()
        .filter(|e| {
            matches!(
                e,
                BattleEvent::ResidualDamage {
                    side: s,
                    source: ResidualSource::LeechSeed,
                    ..
                } if *s == side
            )
        })
        .count()
}

#[test]
fn test_switch_resolves_before_the_opposing_move() {
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("pikachu").build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("eevee")
            .with_speed(300)
            .with_moves(&["quick-attack"])
            .build()],
    );

    let report = resolve(
        &mut battle,
        TurnAction::Switch { slot: 1 },
        TurnAction::use_move("quick-attack"),
    );

    assert_eq!(battle.rosters[0].active, 1);
    assert_eq!(battle.rosters[0].members[0].current_hp(), 155);
    assert!(battle.rosters[0].members[1].current_hp() < 155);
    let switched = report
        .events
        .iter()
        .position(|e| matches!(e, BattleEvent::CombatantSwitched { side: 0, .. }));
    let attacked = report
        .events
        .iter()
        .position(|e| matches!(e, BattleEvent::MoveUsed { side: 1, .. }));
    assert!(switched.expect("switch logged") < attacked.expect("attack logged"));
}

#[test]
fn test_choice_lock_ends_when_the_holder_switches_out() {
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("pikachu")
                .with_item("choice-scarf")
                .with_moves(&["tackle", "quick-attack"])
                .build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    );

    resolve(&mut battle, TurnAction::use_move("tackle"), TurnAction::use_move("tackle"));
    assert_eq!(
        battle.rosters[0].members[0].choice_locked_move(),
        Some("tackle")
    );

    resolve(&mut battle, TurnAction::Switch { slot: 1 }, TurnAction::use_move("tackle"));
    assert!(!battle.rosters[0].members[0].has_volatile(VolatileKind::ChoiceLocked));
    resolve(&mut battle, TurnAction::Switch { slot: 0 }, TurnAction::use_move("tackle"));
    assert_eq!(battle.rosters[0].active, 0);

    let report = resolve(
        &mut battle,
        TurnAction::use_move("quick-attack"),
        TurnAction::use_move("tackle"),
    );

    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::MoveUsed { side: 0, move_name, .. } if move_name == "quick-attack"
    )));
    assert_eq!(
        battle.rosters[0].members[0].choice_locked_move(),
        Some("quick-attack")
    );
}

#[test]
fn test_trapping_ability_is_bypassed_by_simultaneous_switch() {
    let mut battle = two_on_two();

    resolve(
        &mut battle,
        TurnAction::Switch { slot: 1 },
        TurnAction::Switch { slot: 1 },
    );

    assert_eq!(battle.rosters[0].active, 1);
    assert_eq!(battle.rosters[1].active, 1);
}

#[test]
fn test_trapping_ability_blocks_a_lone_switch() {
    let mut battle = two_on_two();

    let report = resolve(
        &mut battle,
        TurnAction::Switch { slot: 1 },
        TurnAction::use_move("tackle"),
    );

    assert_eq!(battle.rosters[0].active, 0);
    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::MoveUsed { side: 0, move_name, .. } if move_name == "tackle"
    )));
}

#[test]
fn test_move_trap_blocks_switch_even_if_opponent_switches() {
    let mut battle = two_on_two();
    battle.rosters[0].members[0].add_volatile(VolatileCondition::Trapped { source: 1 });

    resolve(
        &mut battle,
        TurnAction::Switch { slot: 1 },
        TurnAction::Switch { slot: 1 },
    );

    assert_eq!(battle.rosters[0].active, 0);
    assert_eq!(battle.rosters[1].active, 1);
    // The trapper left, so the trap went with it.
    assert!(!battle.rosters[0].members[0].has_volatile(VolatileKind::Trapped));
}

#[test]
fn test_seeded_combatant_is_drained_once_when_switching_out() {
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("pikachu").build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("bulbasaur")
            .with_moves(&["protect"])
            .build()],
    );
    battle.rosters[0].members[0].add_volatile(VolatileCondition::Seeded { source: 1 });

    let report = resolve(
        &mut battle,
        TurnAction::Switch { slot: 1 },
        TurnAction::use_move("protect"),
    );

    assert_eq!(leech_seed_drains(&report, 0), 1);
    assert_eq!(battle.rosters[0].members[0].current_hp(), 155 - 19);
    assert!(!battle.rosters[0].members[0].has_volatile(VolatileKind::Seeded));
    assert_eq!(battle.rosters[0].members[1].current_hp(), 155);
}

#[test]
fn test_entry_hazards_hit_the_incoming_combatant() {
    let mut battle = two_on_two();
    battle.rosters[1].members[0].ability = "inner-focus".to_string();
    battle.sides[0].add_hazard(Hazard::StealthRock, 1);

    resolve(
        &mut battle,
        TurnAction::Switch { slot: 1 },
        TurnAction::use_move("tackle"),
    );

    // Stealth Rock takes an eighth, then the tackle lands.
    let incoming = &battle.rosters[0].members[1];
    assert_eq!(incoming.current_hp(), 155 - 19 - 27);
}

#[test]
fn test_baton_pass_hands_over_substitute_and_stages() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("ninjask")
                .with_speed(300)
                .with_moves(&["baton-pass"])
                .build(),
            TestCombatantBuilder::new("snorlax").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    );
    let passer = &mut battle.rosters[0].members[0];
    passer.add_volatile(VolatileCondition::Substitute { hp: 38 });
    passer.set_stat_stage(schema::StatType::Attack, 2);
    battle
        .submit_action(0, TurnAction::use_move("baton-pass"))
        .expect("side 0 submits");
    battle
        .submit_action(1, TurnAction::use_move("tackle"))
        .expect("side 1 submits");
    let mut rng = predictable_rng();

    let TurnOutcome::AwaitingSwitch(continuation) =
        resolve_turn(&mut battle, &env, &mut rng).expect("turn")
    else {
        panic!("baton pass should suspend the turn");
    };
    assert!(continuation.transfer_volatiles);
    resume_turn(&mut battle, continuation, TurnAction::Switch { slot: 1 }, &env, &mut rng)
        .expect("resume");

    let receiver = &battle.rosters[0].members[1];
    assert_eq!(receiver.stat_stage(schema::StatType::Attack), 2);
    // Eevee's tackle went into the inherited substitute.
    assert_eq!(receiver.current_hp(), 155);
    assert!(receiver.has_volatile(VolatileKind::Substitute));
    assert!(battle.rosters[0].members[0].volatiles.is_empty());
}
