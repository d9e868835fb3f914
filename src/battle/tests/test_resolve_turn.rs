use crate::battle::engine::{
    forfeit_suspended_turn, resolve_turn, resume_turn, start_battle, TurnOutcome, TurnReport,
};
use crate::battle::state::{Battle, BattleEvent, GameState, TurnAction, TurnRng};
use crate::battle::tests::common::{
    create_test_battle, create_test_battle_with_rosters, predictable_rng, test_services,
    TestCombatantBuilder,
};
use crate::errors::{BattleEngineError, BattleStateError};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn submit_both(battle: &mut Battle, first: TurnAction, second: TurnAction) {
    battle.submit_action(0, first).expect("side 0 submits");
    battle.submit_action(1, second).expect("side 1 submits");
}

fn switch_to(slot: usize) -> TurnAction {
    TurnAction::Switch { slot }
}

fn completed(outcome: TurnOutcome) -> TurnReport {
    match outcome {
        TurnOutcome::Completed(report) => report,
        TurnOutcome::AwaitingSwitch(continuation) => {
            panic!("turn suspended for side {}", continuation.side)
        }
    }
}

fn move_users(report: &TurnReport) -> Vec<(usize, String)> {
    report
        .events
        .iter()
        .filter_map(|event| match event {
            BattleEvent::MoveUsed {
                side, move_name, ..
            } => Some((*side, move_name.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn test_basic_tackle_exchange() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu").build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    submit_both(&mut battle, TurnAction::use_move("tackle"), TurnAction::use_move("tackle"));

    let report = completed(resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("turn"));

    assert_eq!(battle.active(0).map(|c| c.current_hp()), Some(128));
    assert_eq!(battle.active(1).map(|c| c.current_hp()), Some(128));
    assert_eq!(battle.turn_number, 2);
    assert_eq!(battle.game_state, GameState::WaitingForActions);
    assert_eq!(battle.action_queue, [None, None]);
    assert_eq!(report.game_state, GameState::WaitingForActions);
    assert!(matches!(report.events.first(), Some(BattleEvent::TurnStarted { turn_number: 1 })));
    assert!(matches!(report.events.last(), Some(BattleEvent::TurnEnded)));
    assert!(report
        .lines
        .iter()
        .any(|line| line == "Player 1's Pikachu used Tackle!"));
}

#[test]
fn test_hp_stays_within_bounds_over_many_turns() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("snorlax").with_moves(&["body-slam"]).build(),
        TestCombatantBuilder::new("chansey").with_moves(&["tackle"]).build(),
    );
    let mut rng = TurnRng::from_seed(7);

    for _ in 0..30 {
        if battle.is_over() {
            break;
        }
        let moves = [0, 1].map(|side| {
            battle
                .active(side)
                .map(|c| c.moves[0].clone())
                .unwrap_or_default()
        });
        submit_both(
            &mut battle,
            TurnAction::use_move(&moves[0]),
            TurnAction::use_move(&moves[1]),
        );
        resolve_turn(&mut battle, &env, &mut rng).expect("turn");
        for roster in &battle.rosters {
            for member in &roster.members {
                assert!(member.current_hp() <= member.max_hp());
            }
        }
    }
}

#[test]
fn test_knockout_ends_the_battle() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu").with_hp(10).build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    submit_both(&mut battle, TurnAction::use_move("tackle"), TurnAction::use_move("tackle"));

    let report = completed(resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("turn"));

    assert_eq!(battle.game_state, GameState::Player2Win);
    assert_eq!(battle.active(0).map(|c| c.current_hp()), Some(0));
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::CombatantFainted { side: 0, .. })));
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::BattleEnded { winner: Some(1) })));

    let outcome = battle.outcome().expect("battle is over");
    assert_eq!(outcome.winner, Some(1));
    assert_eq!(outcome.turns, 1);
    assert_eq!(outcome.forfeited_by, None);

    let err = resolve_turn(&mut battle, &env, &mut predictable_rng()).unwrap_err();
    assert!(matches!(
        err,
        BattleEngineError::BattleState(BattleStateError::BattleOver)
    ));
}

#[test]
fn test_priority_move_goes_first() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("snorlax").with_speed(200).build(),
        TestCombatantBuilder::new("rattata")
            .with_speed(50)
            .with_moves(&["quick-attack"])
            .build(),
    );
    submit_both(
        &mut battle,
        TurnAction::use_move("tackle"),
        TurnAction::use_move("quick-attack"),
    );

    let report = completed(resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("turn"));

    assert_eq!(
        move_users(&report),
        vec![(1, "quick-attack".to_string()), (0, "tackle".to_string())]
    );
}

#[test]
fn test_forfeit_happens_before_any_move() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu").with_moves(&["quick-attack"]).build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    submit_both(&mut battle, TurnAction::use_move("quick-attack"), TurnAction::Forfeit);

    let report = completed(resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("turn"));

    assert!(move_users(&report).is_empty());
    assert_eq!(battle.game_state, GameState::Player1Win);
    assert_eq!(battle.forfeited_by, Some(1));
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::PlayerForfeited { side: 1 })));
    let outcome = battle.outcome().expect("battle is over");
    assert_eq!(outcome.winner, Some(0));
    assert_eq!(outcome.turns, 1);
}

#[test]
fn test_pivot_suspends_and_resumes_the_turn() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("scizor")
                .with_speed(200)
                .with_moves(&["u-turn"])
                .build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    );
    submit_both(&mut battle, TurnAction::use_move("u-turn"), TurnAction::use_move("tackle"));
    let mut rng = predictable_rng();

    let continuation = match resolve_turn(&mut battle, &env, &mut rng).expect("turn") {
        TurnOutcome::AwaitingSwitch(continuation) => continuation,
        TurnOutcome::Completed(_) => panic!("u-turn should suspend the turn"),
    };
    assert_eq!(continuation.side, 0);
    assert!(!continuation.transfer_volatiles);
    assert_eq!(continuation.remaining.len(), 1);
    assert_eq!(battle.game_state, GameState::AwaitingPivotSwitch { side: 0 });
    assert!(continuation
        .log
        .iter()
        .any(|e| matches!(e, BattleEvent::PivotPending { side: 0, .. })));
    assert_eq!(
        battle.submit_action(1, TurnAction::use_move("tackle")),
        Err(BattleStateError::UnexpectedContinuation(0))
    );

    let report =
        completed(resume_turn(&mut battle, continuation, switch_to(1), &env, &mut rng).expect("resume"));

    assert_eq!(battle.rosters[0].active, 1);
    assert_eq!(battle.rosters[0].members[0].current_hp(), 155);
    assert_eq!(battle.rosters[0].members[1].current_hp(), 128);
    assert_eq!(battle.turn_number, 2);
    assert_eq!(battle.game_state, GameState::WaitingForActions);
    assert_eq!(
        move_users(&report),
        vec![(0, "u-turn".to_string()), (1, "tackle".to_string())]
    );
    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::CombatantSwitched { side: 0, new_name, .. } if new_name == "raichu"
    )));
}

#[test]
fn test_resume_without_pending_switch_is_rejected() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("scizor")
                .with_speed(200)
                .with_moves(&["u-turn"])
                .build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    );
    submit_both(&mut battle, TurnAction::use_move("u-turn"), TurnAction::use_move("tackle"));
    let mut rng = predictable_rng();
    let TurnOutcome::AwaitingSwitch(continuation) =
        resolve_turn(&mut battle, &env, &mut rng).expect("turn")
    else {
        panic!("u-turn should suspend the turn");
    };
    let err = resolve_turn(&mut battle, &env, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        BattleEngineError::BattleState(BattleStateError::UnexpectedContinuation(0))
    ));

    battle.game_state = GameState::WaitingForActions;
    let err = resume_turn(&mut battle, continuation, switch_to(1), &env, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        BattleEngineError::BattleState(BattleStateError::NoPendingContinuation)
    ));
}

#[test]
fn test_pivot_with_invalid_slot_uses_first_bench_member() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("scizor")
                .with_speed(200)
                .with_moves(&["u-turn"])
                .build(),
            TestCombatantBuilder::new("raichu").with_hp(0).build(),
            TestCombatantBuilder::new("jolteon").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    );
    submit_both(&mut battle, TurnAction::use_move("u-turn"), TurnAction::use_move("tackle"));
    let mut rng = predictable_rng();
    let TurnOutcome::AwaitingSwitch(continuation) =
        resolve_turn(&mut battle, &env, &mut rng).expect("turn")
    else {
        panic!("u-turn should suspend the turn");
    };

    resume_turn(&mut battle, continuation, switch_to(1), &env, &mut rng).expect("resume");

    assert_eq!(battle.rosters[0].active, 2);
}

#[test]
fn test_replacement_phase_does_not_advance_the_turn() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("pikachu").with_hp(10).build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    );
    submit_both(&mut battle, TurnAction::use_move("tackle"), TurnAction::use_move("tackle"));
    resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("turn");

    assert_eq!(battle.game_state, GameState::WaitingForPlayer1Replacement);
    assert_eq!(battle.turn_number, 2);
    assert!(!battle.ready_for_turn_resolution());

    battle
        .submit_action(0, TurnAction::Switch { slot: 1 })
        .expect("replacement choice");
    assert!(battle.ready_for_turn_resolution());
    let report = completed(resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("replace"));

    assert_eq!(battle.rosters[0].active, 1);
    assert_eq!(battle.turn_number, 2);
    assert_eq!(battle.game_state, GameState::WaitingForActions);
    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::CombatantSentOut { side: 0, name } if name == "raichu"
    )));
}

fn scizor_pivot_battle() -> Battle {
    create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("scizor")
                .with_speed(200)
                .with_moves(&["u-turn"])
                .build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    )
}

#[rstest]
#[case::replacing_side(0, GameState::Player2Win)]
#[case::waiting_side(1, GameState::Player1Win)]
fn test_forfeit_during_replacement_phase_ends_the_battle(
    #[case] forfeiting: usize,
    #[case] expected: GameState,
) {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("pikachu").with_hp(10).build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    );
    submit_both(&mut battle, TurnAction::use_move("tackle"), TurnAction::use_move("tackle"));
    resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("turn");
    assert_eq!(battle.game_state, GameState::WaitingForPlayer1Replacement);

    battle
        .submit_action(forfeiting, TurnAction::Forfeit)
        .expect("forfeit is accepted");
    assert!(battle.ready_for_turn_resolution());
    let report = completed(resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("forfeit"));

    assert_eq!(battle.game_state, expected);
    assert_eq!(battle.forfeited_by, Some(forfeiting));
    assert_eq!(battle.rosters[0].active, 0);
    assert_eq!(battle.action_queue, [None, None]);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::PlayerForfeited { side } if *side == forfeiting)));
    assert!(!report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::CombatantSentOut { .. })));
}

#[test]
fn test_forfeit_instead_of_pivot_switch_drops_the_rest_of_the_turn() {
    let services = test_services();
    let env = services.env();
    let mut battle = scizor_pivot_battle();
    submit_both(&mut battle, TurnAction::use_move("u-turn"), TurnAction::use_move("tackle"));
    let mut rng = predictable_rng();
    let TurnOutcome::AwaitingSwitch(continuation) =
        resolve_turn(&mut battle, &env, &mut rng).expect("turn")
    else {
        panic!("u-turn should suspend the turn");
    };

    let report = completed(
        resume_turn(&mut battle, continuation, TurnAction::Forfeit, &env, &mut rng).expect("resume"),
    );

    assert_eq!(battle.game_state, GameState::Player2Win);
    assert_eq!(battle.forfeited_by, Some(0));
    assert_eq!(battle.rosters[0].active, 0);
    assert_eq!(battle.rosters[0].members[0].current_hp(), 155);
    assert_eq!(move_users(&report), vec![(0, "u-turn".to_string())]);
    let outcome = battle.outcome().expect("battle is over");
    assert_eq!(outcome.winner, Some(1));
    assert_eq!(outcome.turns, 1);
}

#[test]
fn test_opponent_forfeit_while_pivot_pending() {
    let services = test_services();
    let env = services.env();
    let mut battle = scizor_pivot_battle();
    submit_both(&mut battle, TurnAction::use_move("u-turn"), TurnAction::use_move("tackle"));
    let TurnOutcome::AwaitingSwitch(continuation) =
        resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("turn")
    else {
        panic!("u-turn should suspend the turn");
    };

    completed(forfeit_suspended_turn(&mut battle, continuation, 1, &env).expect("forfeit"));

    assert_eq!(battle.game_state, GameState::Player1Win);
    assert_eq!(battle.forfeited_by, Some(1));
    assert_eq!(battle.rosters[0].active, 0);
}

#[test]
fn test_medicine_heals_before_moves() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("pikachu").with_hp(100).build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    submit_both(
        &mut battle,
        TurnAction::UseItem {
            item: "potion".to_string(),
            target_slot: 0,
        },
        TurnAction::use_move("tackle"),
    );

    let report = completed(resolve_turn(&mut battle, &env, &mut predictable_rng()).expect("turn"));

    assert_eq!(battle.active(0).map(|c| c.current_hp()), Some(93));
    let healed = report.events.iter().position(|e| {
        matches!(
            e,
            BattleEvent::CombatantHealed {
                side: 0,
                amount: 20,
                new_hp: 120,
                ..
            }
        )
    });
    let attacked = report
        .events
        .iter()
        .position(|e| matches!(e, BattleEvent::MoveUsed { side: 1, .. }));
    assert!(healed.expect("potion healed") < attacked.expect("eevee attacked"));
}

#[test]
fn test_start_battle_sends_out_both_leads() {
    let services = test_services();
    let env = services.env();
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("gyarados")
            .with_ability("intimidate")
            .build(),
        TestCombatantBuilder::new("eevee").build(),
    );

    let report = start_battle(&mut battle, &env).expect("start");

    assert!(matches!(
        &report.events[..2],
        [
            BattleEvent::CombatantSentOut { side: 0, .. },
            BattleEvent::CombatantSentOut { side: 1, .. }
        ]
    ));
    assert_eq!(
        battle
            .active(1)
            .map(|c| c.stat_stage(schema::StatType::Attack)),
        Some(-1)
    );
    assert_eq!(battle.turn_number, 1);
}
