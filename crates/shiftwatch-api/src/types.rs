//! Aggregate rows exchanged between the store and the core

use serde::{Deserialize, Serialize};
use shiftwatch_util::{GuildId, UserId};
use std::time::Duration;

/// Accumulated shift time for one user in one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTotal {
    pub user_id: UserId,
    pub total: Duration,
}

impl UserTotal {
    pub fn new(user_id: UserId, total: Duration) -> Self {
        Self { user_id, total }
    }
}

/// Flight log tally for one pilot in one guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightTally {
    pub user_id: UserId,
    /// Points awarded for logged flights; this is what the global ranking sums
    pub total_points: u64,
    /// Number of flight records the pilot has in this guild
    pub flights_logged: u64,
}

/// Result of an administrative purge of one shift
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeOutcome {
    pub deleted_event_count: usize,
    pub affected_user_count: usize,
}

impl PurgeOutcome {
    pub fn is_noop(&self) -> bool {
        self.deleted_event_count == 0
    }
}

/// A guild-scoped aggregate that could not be computed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedScope {
    pub guild_id: GuildId,
    pub reason: String,
}
