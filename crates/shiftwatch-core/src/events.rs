//! Core events emitted by the engine

use chrono::{DateTime, Utc};
use shiftwatch_api::PurgeOutcome;
use shiftwatch_util::{GuildId, ShiftId, UserId};
use std::time::Duration;

/// Events emitted by the shift engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Shift started; `auto_end_at` is set when the guild has a limit
    ShiftStarted {
        guild_id: GuildId,
        user_id: UserId,
        shift_id: ShiftId,
        started_at: DateTime<Utc>,
        auto_end_at: Option<DateTime<Utc>>,
    },

    ShiftPaused {
        guild_id: GuildId,
        user_id: UserId,
        shift_id: ShiftId,
        at: DateTime<Utc>,
    },

    ShiftResumed {
        guild_id: GuildId,
        user_id: UserId,
        shift_id: ShiftId,
        at: DateTime<Utc>,
    },

    /// Shift ended, by command or by the auto-end scheduler
    ShiftEnded {
        guild_id: GuildId,
        user_id: UserId,
        shift_id: ShiftId,
        ended_at: DateTime<Utc>,
        auto_ended: bool,
        duration: Duration,
    },

    /// Administrative deletion of a shift's events
    ShiftPurged {
        guild_id: GuildId,
        shift_id: ShiftId,
        outcome: PurgeOutcome,
    },
}

impl CoreEvent {
    pub fn guild_id(&self) -> &GuildId {
        match self {
            CoreEvent::ShiftStarted { guild_id, .. }
            | CoreEvent::ShiftPaused { guild_id, .. }
            | CoreEvent::ShiftResumed { guild_id, .. }
            | CoreEvent::ShiftEnded { guild_id, .. }
            | CoreEvent::ShiftPurged { guild_id, .. } => guild_id,
        }
    }

    pub fn shift_id(&self) -> &ShiftId {
        match self {
            CoreEvent::ShiftStarted { shift_id, .. }
            | CoreEvent::ShiftPaused { shift_id, .. }
            | CoreEvent::ShiftResumed { shift_id, .. }
            | CoreEvent::ShiftEnded { shift_id, .. }
            | CoreEvent::ShiftPurged { shift_id, .. } => shift_id,
        }
    }
}
