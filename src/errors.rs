//! Error types for the battle engine.
//!
//! Most failures inside a turn are recovered locally (illegal choices are
//! normalised, catalog misses become inert moves, decision timeouts fall back
//! to the heuristic AI). What remains here is what the orchestration layer
//! surfaces to its caller.
use thiserror::Error;

/// Main error type for the battle engine
#[derive(Debug, Error)]
pub enum BattleEngineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("battle state error: {0}")]
    BattleState(#[from] BattleStateError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("decision error: {0}")]
    Decision(#[from] DecisionError),

    #[error("damage calculation error: {0}")]
    Damage(#[from] DamageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to rules-catalog lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown move: {0}")]
    UnknownMove(String),

    #[error("unknown ability: {0}")]
    UnknownAbility(String),

    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("malformed catalog data: {0}")]
    Malformed(String),
}

/// Errors related to battle state validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleStateError {
    #[error("no active combatant for side {0}")]
    NoActiveCombatant(usize),

    #[error("invalid side index: {0}")]
    InvalidSide(usize),

    #[error("invalid roster slot {slot} for side {side}")]
    InvalidSlot { side: usize, slot: usize },

    #[error("battle is already over")]
    BattleOver,

    #[error("no continuation is pending")]
    NoPendingContinuation,

    #[error("battle is waiting on a mid-turn switch for side {0}")]
    UnexpectedContinuation(usize),

    #[error("roster for side {side} has {count} members; 1 to 6 are allowed")]
    InvalidRosterSize { side: usize, count: usize },

    #[error("no battle with id {0}")]
    UnknownBattle(String),

    #[error("battle {0} already exists")]
    DuplicateBattle(String),
}

/// Errors raised by the persistence collaborator
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no stored record for {0}")]
    NotFound(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<postcard::Error> for PersistenceError {
    fn from(err: postcard::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Errors raised while obtaining a side's choice
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("decision for side {0} exceeded its time budget")]
    Timeout(usize),

    #[error("decision provider failed: {0}")]
    Internal(String),

    #[error("choice channel for side {0} closed")]
    ChannelClosed(usize),
}

/// Errors raised by the damage collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DamageError {
    #[error("damage collaborator failed: {0}")]
    Collaborator(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Type alias for Results using BattleEngineError
pub type BattleResult<T> = Result<T, BattleEngineError>;

/// Type alias for Results using CatalogError
pub type CatalogResult<T> = Result<T, CatalogError>;
