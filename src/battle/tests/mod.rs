pub mod common;

mod test_move_executor;
mod test_resolve_turn;
mod test_switch;
mod test_transform;
