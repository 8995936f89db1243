//! Process-wide state adapters

mod json_state;

pub use json_state::JsonStateStore;
