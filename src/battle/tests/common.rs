use crate::battle::engine::BattleServices;
use crate::battle::state::{Battle, TurnRng};
use crate::catalog::{CatalogView, StaticCatalog};
use crate::combatant::{Combatant, CombatantTemplate, Nature, StatusCondition};
use crate::config::RulesConfig;
use crate::roster::Roster;
use schema::{BaseStats, PokemonType, StatType};
use std::sync::Arc;

/// A builder for test combatants with common defaults: level 50, base 80 in
/// every stat (155 max HP), Normal type, a no-op ability and Tackle.
///
/// # Example
/// ```ignore
/// let combatant = TestCombatantBuilder::new("pikachu")
///     .with_types(vec![PokemonType::Electric])
///     .with_moves(&["thunderbolt"])
///     .with_status(StatusCondition::Paralysis)
///     .build();
/// ```
pub struct TestCombatantBuilder {
    template: CombatantTemplate,
    current_hp: Option<u16>,
    status: Option<StatusCondition>,
    speed: Option<u16>,
}

impl TestCombatantBuilder {
    pub fn new(species: &str) -> Self {
        Self {
            template: CombatantTemplate {
                species: species.to_string(),
                nickname: None,
                level: 50,
                base_stats: BaseStats {
                    hp: 80,
                    attack: 80,
                    defense: 80,
                    sp_attack: 80,
                    sp_defense: 80,
                    speed: 80,
                },
                types: vec![PokemonType::Normal],
                ability: "inner-focus".to_string(),
                item: None,
                moves: vec!["tackle".to_string()],
                nature: Nature::Hardy,
                ivs: [31; 6],
                evs: [0; 6],
                tera_type: None,
            },
            current_hp: None,
            status: None,
            speed: None,
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.template.level = level;
        self
    }

    pub fn with_base_stats(mut self, base_stats: BaseStats) -> Self {
        self.template.base_stats = base_stats;
        self
    }

    pub fn with_types(mut self, types: impl Into<Vec<PokemonType>>) -> Self {
        self.template.types = types.into();
        self
    }

    pub fn with_ability(mut self, ability: &str) -> Self {
        self.template.ability = ability.to_string();
        self
    }

    pub fn with_item(mut self, item: &str) -> Self {
        self.template.item = Some(item.to_string());
        self
    }

    pub fn with_moves(mut self, moves: &[&str]) -> Self {
        self.template.moves = moves.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Sets the current HP. If not set, HP will be max.
    pub fn with_hp(mut self, hp: u16) -> Self {
        self.current_hp = Some(hp);
        self
    }

    pub fn with_status(mut self, status: StatusCondition) -> Self {
        self.status = Some(status);
        self
    }

    /// Overrides the calculated speed stat.
    pub fn with_speed(mut self, speed: u16) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_tera(mut self, tera_type: PokemonType) -> Self {
        self.template.tera_type = Some(tera_type);
        self
    }

    pub fn build(self) -> Combatant {
        let mut combatant = Combatant::from_template(&self.template);
        if let (Some(speed), Some(index)) = (self.speed, StatType::Speed.index()) {
            combatant.stats[index] = speed;
        }
        combatant.status = self.status;
        if let Some(hp) = self.current_hp {
            combatant.set_hp(hp);
        }
        combatant
    }
}

pub fn create_test_roster(id: &str, members: Vec<Combatant>) -> Roster {
    let trainer_name = match id {
        "p1" => "Player 1",
        "p2" => "Player 2",
        other => other,
    };
    Roster::new(id.to_string(), trainer_name.to_string(), members)
}

/// A battle between two full rosters, PP ledger included.
pub fn create_test_battle_with_rosters(
    side_one: Vec<Combatant>,
    side_two: Vec<Combatant>,
) -> Battle {
    match Battle::new(
        "test_battle".to_string(),
        create_test_roster("p1", side_one),
        create_test_roster("p2", side_two),
        &test_catalog(),
    ) {
        Ok(battle) => battle,
        Err(err) => panic!("Failed to create test battle: {}", err),
    }
}

/// Creates a standard 1v1 battle for testing.
pub fn create_test_battle(side_one: Combatant, side_two: Combatant) -> Battle {
    create_test_battle_with_rosters(vec![side_one], vec![side_two])
}

/// Creates a `TurnRng` with a long list of middle values (50).
pub fn predictable_rng() -> TurnRng {
    TurnRng::new_for_test(vec![50; 100])
}

pub fn test_catalog() -> CatalogView {
    match StaticCatalog::builtin() {
        Ok(catalog) => CatalogView::new(Arc::new(catalog)),
        Err(err) => panic!("Built-in catalog failed to load: {}", err),
    }
}

pub fn test_services() -> BattleServices {
    BattleServices::new(test_catalog(), RulesConfig::default())
}
