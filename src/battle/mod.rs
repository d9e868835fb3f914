pub mod action_stack;
pub mod ai;
pub mod commands;
pub mod conditions;
pub mod damage;
pub mod end_of_turn;
pub mod engine;
pub mod field;
pub mod hooks;
pub mod move_executor;
pub mod normalizer;
pub mod power_moves;
pub mod pp_ledger;
pub mod runner;
pub mod side;
pub mod state;
pub mod stats;
pub mod switching;
pub mod transform;
pub mod turn_order;

#[cfg(test)]
pub(crate) mod tests;
