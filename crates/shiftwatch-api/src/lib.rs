//! Shared shift types for shiftwatch
//!
//! This crate defines the vocabulary every other crate speaks:
//! - Shift events as they are appended to a user's log
//! - Commands a user can issue against their shift
//! - Pure interpretation of a log: derived status and active duration
//! - Aggregate rows exchanged with the store (totals, flight tallies, purges)

mod commands;
mod events;
mod log;
mod types;

pub use commands::*;
pub use events::*;
pub use log::*;
pub use types::*;
