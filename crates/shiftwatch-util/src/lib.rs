//! Shared utilities for shiftwatch
//!
//! This crate provides:
//! - ID types (GuildId, UserId, ShiftId)
//! - Wall-clock time with a debug-only mock override
//! - Duration helpers and `HH:MM:SS` formatting
//! - Default paths for config and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
