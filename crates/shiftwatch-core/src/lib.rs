//! Core shift engine for shiftwatch
//!
//! This crate is the heart of shiftwatch, containing:
//! - Transition validation (NoShift -> Active <-> Paused -> Ended)
//! - The shift engine, serializing commands per (guild, user)
//! - Auto-end scheduling for shifts that exceed the guild's limit
//! - Rollups of per-user totals at guild and global scope
//! - A single-flight TTL cache and the leaderboards built on it
//! - Pagination of ranked listings

mod cache;
mod engine;
mod error;
mod events;
mod leaderboards;
mod locks;
mod pagination;
mod rollup;
mod scheduler;
mod transition;

pub use cache::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use leaderboards::*;
pub use locks::*;
pub use pagination::*;
pub use rollup::*;
pub use scheduler::*;
pub use transition::*;
