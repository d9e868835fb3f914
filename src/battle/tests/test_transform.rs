use crate::battle::conditions::VolatileKind;
use crate::battle::engine::{resolve_turn, TurnOutcome, TurnReport};
use crate::battle::state::{Battle, BattleEvent, TurnAction};
use crate::battle::tests::common::{
    create_test_battle, create_test_battle_with_rosters, predictable_rng, test_services,
    TestCombatantBuilder,
};
use crate::battle::transform::TransformationKind;
use pretty_assertions::assert_eq;
use schema::{BaseStats, PokemonType, StatType};

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

fn tera_battle() -> Battle {
    create_test_battle_with_rosters(
        vec![
            TestCombatantBuilder::new("pikachu")
                .with_tera(PokemonType::Fire)
                .build(),
            TestCombatantBuilder::new("raichu").build(),
        ],
        vec![TestCombatantBuilder::new("eevee").build()],
    )
}

#[test]
fn test_terastallize_before_the_first_move() {
    let mut battle = tera_battle();
    battle
        .request_transformation(0, TransformationKind::Terastallize)
        .expect("request");

    let report = resolve(
        &mut battle,
        TurnAction::use_move("tackle"),
        TurnAction::use_move("tackle"),
    );

    let pikachu = &battle.rosters[0].members[0];
    assert!(pikachu.terastallized);
    assert_eq!(pikachu.types, vec![PokemonType::Fire]);
    assert_eq!(
        battle.sides[0].transformation_used,
        Some(TransformationKind::Terastallize)
    );
    let transformed = report.events.iter().position(|e| {
        matches!(
            e,
            BattleEvent::Transformed {
                side: 0,
                kind: TransformationKind::Terastallize,
                ..
            }
        )
    });
    let first_move = report
        .events
        .iter()
        .position(|e| matches!(e, BattleEvent::MoveUsed { .. }));
    assert!(transformed.expect("transformed") < first_move.expect("moves used"));
    assert_eq!(battle.pending_transformations, [None, None]);
}

#[test]
fn test_transformation_is_cancelled_by_switching() {
    let mut battle = tera_battle();
    battle
        .request_transformation(0, TransformationKind::Terastallize)
        .expect("request");

    let report = resolve(
        &mut battle,
        TurnAction::Switch { slot: 1 },
        TurnAction::use_move("tackle"),
    );

    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::TransformationCancelled {
            side: 0,
            kind: TransformationKind::Terastallize
        }
    )));
    assert_eq!(battle.sides[0].transformation_used, None);
    assert!(!battle.rosters[0].members[0].terastallized);
    assert_eq!(battle.pending_transformations, [None, None]);
}

#[test]
fn test_only_one_transformation_per_battle() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("snorlax")
            .with_tera(PokemonType::Ghost)
            .build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    battle
        .request_transformation(0, TransformationKind::Dynamax)
        .expect("request");
    resolve(
        &mut battle,
        TurnAction::use_move("tackle"),
        TurnAction::use_move("tackle"),
    );
    assert_eq!(battle.sides[0].transformation_used, Some(TransformationKind::Dynamax));

    battle
        .request_transformation(0, TransformationKind::Terastallize)
        .expect("request");
    let report = resolve(
        &mut battle,
        TurnAction::use_move("tackle"),
        TurnAction::use_move("tackle"),
    );

    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::TransformationCancelled { side: 0, .. })));
    assert!(!battle.rosters[0].members[0].terastallized);
}

#[test]
fn test_dynamax_doubles_hp() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("snorlax").build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    battle
        .request_transformation(0, TransformationKind::Dynamax)
        .expect("request");

    resolve(
        &mut battle,
        TurnAction::use_move("tackle"),
        TurnAction::use_move("tackle"),
    );

    let snorlax = &battle.rosters[0].members[0];
    assert!(snorlax.has_volatile(VolatileKind::Dynamaxed));
    assert_eq!(snorlax.max_hp(), 310);
    assert_eq!(snorlax.current_hp(), 310 - 27);
}

#[test]
fn test_mega_evolution_changes_typing_for_the_turn() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("gengar")
            .with_item("gengarite")
            .build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    battle
        .request_transformation(0, TransformationKind::Mega)
        .expect("request");

    let report = resolve(
        &mut battle,
        TurnAction::use_move("tackle"),
        TurnAction::use_move("tackle"),
    );

    let gengar = &battle.rosters[0].members[0];
    assert!(gengar.mega_evolved);
    assert_eq!(gengar.ability, "shadow-tag");
    assert_eq!(gengar.types, vec![PokemonType::Ghost, PokemonType::Poison]);
    // Already a ghost when Eevee's tackle arrives.
    assert_eq!(gengar.current_hp(), gengar.max_hp());
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, BattleEvent::NoEffect { .. })));
}

fn move_names(report: &TurnReport, side: usize) -> Vec<String> {
    report
        .events
        .iter()
        .filter_map(|e| match e {
            BattleEvent::MoveUsed {
                side: user,
                move_name,
                ..
            } if *user == side => Some(move_name.clone()),
            _ => None,
        })
        .collect()
}

fn z_crystal_battle() -> Battle {
    create_test_battle(
        TestCombatantBuilder::new("pikachu")
            .with_types(vec![PokemonType::Electric])
            .with_item("electrium-z")
            .with_moves(&["thunderbolt", "tackle"])
            .build(),
        TestCombatantBuilder::new("snorlax")
            .with_base_stats(BaseStats {
                hp: 255,
                attack: 80,
                defense: 80,
                sp_attack: 80,
                sp_defense: 80,
                speed: 80,
            })
            .build(),
    )
}

#[test]
fn test_z_power_is_spent_on_one_move() {
    let mut control = z_crystal_battle();
    resolve(
        &mut control,
        TurnAction::use_move("thunderbolt"),
        TurnAction::use_move("tackle"),
    );
    let defender = &control.rosters[1].members[0];
    let plain_damage = defender.max_hp() - defender.current_hp();

    let mut battle = z_crystal_battle();
    battle
        .request_transformation(0, TransformationKind::ZMove)
        .expect("request");
    let report = resolve(
        &mut battle,
        TurnAction::use_move("thunderbolt"),
        TurnAction::use_move("tackle"),
    );

    assert_eq!(move_names(&report, 0), vec!["Gigavolt Havoc".to_string()]);
    assert_eq!(battle.sides[0].transformation_used, Some(TransformationKind::ZMove));
    assert!(!battle.rosters[0].members[0].has_volatile(VolatileKind::ZPowered));
    let defender = &battle.rosters[1].members[0];
    let after_z = defender.current_hp();
    assert!(defender.max_hp() - after_z > plain_damage);

    let report = resolve(
        &mut battle,
        TurnAction::use_move("thunderbolt"),
        TurnAction::use_move("tackle"),
    );

    assert_eq!(move_names(&report, 0), vec!["thunderbolt".to_string()]);
    assert_eq!(after_z - battle.rosters[1].members[0].current_hp(), plain_damage);
}

#[test]
fn test_z_request_with_off_type_move_is_cancelled() {
    let mut battle = z_crystal_battle();
    battle
        .request_transformation(0, TransformationKind::ZMove)
        .expect("request");

    let report = resolve(
        &mut battle,
        TurnAction::use_move("tackle"),
        TurnAction::use_move("tackle"),
    );

    assert!(report.events.iter().any(|e| matches!(
        e,
        BattleEvent::TransformationCancelled {
            side: 0,
            kind: TransformationKind::ZMove
        }
    )));
    assert_eq!(move_names(&report, 0), vec!["tackle".to_string()]);
    assert_eq!(battle.sides[0].transformation_used, None);
    assert!(!battle.rosters[0].members[0].has_volatile(VolatileKind::ZPowered));
}

#[test]
fn test_dynamaxed_attacks_become_max_moves() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("snorlax").build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    battle
        .request_transformation(0, TransformationKind::Dynamax)
        .expect("request");

    let report = resolve(
        &mut battle,
        TurnAction::use_move("tackle"),
        TurnAction::use_move("tackle"),
    );

    assert_eq!(move_names(&report, 0), vec!["Max Strike".to_string()]);
    assert_eq!(move_names(&report, 1), vec!["tackle".to_string()]);
    assert_eq!(battle.rosters[1].members[0].stat_stage(StatType::Speed), -1);
    let tackle = battle.pp.entry(0, 0, 0).expect("tackle pp");
    assert_eq!(tackle.current, tackle.max - 1);
}

#[test]
fn test_dynamaxed_status_move_becomes_max_guard() {
    let mut battle = create_test_battle(
        TestCombatantBuilder::new("snorlax")
            .with_moves(&["protect", "tackle"])
            .build(),
        TestCombatantBuilder::new("eevee").build(),
    );
    battle
        .request_transformation(0, TransformationKind::Dynamax)
        .expect("request");

    let report = resolve(
        &mut battle,
        TurnAction::use_move("protect"),
        TurnAction::use_move("tackle"),
    );

    assert_eq!(move_names(&report, 0), vec!["Max Guard".to_string()]);
    assert_eq!(battle.rosters[0].members[0].current_hp(), 310);
}

#[test]
fn test_forfeit_drops_opponent_transformation_request() {
    let mut battle = tera_battle();
    battle
        .request_transformation(1, TransformationKind::Dynamax)
        .expect("request");

    let report = resolve(&mut battle, TurnAction::Forfeit, TurnAction::use_move("tackle"));

    assert!(battle.is_over());
    assert_eq!(battle.sides[1].transformation_used, None);
    assert_eq!(battle.pending_transformations, [None, None]);
    assert_eq!(battle.rosters[1].members[0].max_hp(), 155);
    assert!(!report.events.iter().any(|e| matches!(
        e,
        BattleEvent::Transformed { .. } | BattleEvent::TransformationCancelled { .. }
    )));
}
