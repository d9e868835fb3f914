//! PvP Battle Engine
//!
//! Turn resolution for two-sided creature battles: action normalisation,
//! ordering, move execution, switching, transformations and the end-of-turn
//! pass, plus an async runner that gathers choices from humans or AI.

// --- MODULE DECLARATIONS ---
pub mod battle;
pub mod catalog;
pub mod combatant;
pub mod config;
pub mod errors;
pub mod persistence;
pub mod roster;

// --- PUBLIC API RE-EXPORTS ---

// --- From the `schema` crate ---
pub use schema::{
    AbilityEffect, BaseStats, ItemEffect, MoveCategory, MoveClass, MoveDescriptor, MoveTarget,
    PokemonType, StatType, StatusType, Terrain, Weather, UNIVERSAL_MOVE,
};

// --- From this crate's modules (`src/`) ---

// Core battle engine functions and state.
pub use battle::engine::{
    forfeit_suspended_turn, resolve_replacements, resolve_turn, resume_turn, start_battle,
    BattleEnv, BattleServices, Continuation, TurnOutcome, TurnReport,
};
pub use battle::state::{Battle, BattleEvent, BattleOutcome, GameState, TurnAction, TurnRng};

// Orchestration and decision making.
pub use battle::ai::{Behavior, HeuristicAI, ScoringAI};
pub use battle::runner::{BattleManager, BattleRunner, ChoiceSource, DecisionProvider};

// Runtime types for a battle.
pub use catalog::{CachedCatalog, CatalogView, RulesCatalog, StaticCatalog};
pub use combatant::{Combatant, CombatantTemplate, StatusCondition};
pub use config::BattleConfig;
pub use roster::{Roster, RosterTemplate};

// Crate-specific error and result types.
pub use errors::{
    BattleEngineError, BattleResult, BattleStateError, CatalogError, CatalogResult,
    ConfigError, DecisionError, PersistenceError,
};
