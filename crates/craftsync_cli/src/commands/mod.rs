//! CLI command implementations.

pub mod inspect;
pub mod queue;
pub mod verify;
