//! Shift events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shiftwatch_util::ShiftId;
use std::fmt;

/// What happened to a shift.
///
/// `auto_ended` only exists on `End`, so a paused or resumed event can never
/// claim to have been produced by the auto-end scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShiftEventKind {
    Start,
    Pause,
    Resume,
    End {
        #[serde(rename = "autoEnded", default)]
        auto_ended: bool,
    },
}

impl ShiftEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftEventKind::Start => "start",
            ShiftEventKind::Pause => "pause",
            ShiftEventKind::Resume => "resume",
            ShiftEventKind::End { .. } => "end",
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, ShiftEventKind::End { .. })
    }
}

impl fmt::Display for ShiftEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable record in a user's shift log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftEvent {
    #[serde(rename = "id")]
    pub shift_id: ShiftId,

    #[serde(flatten)]
    pub kind: ShiftEventKind,

    pub timestamp: DateTime<Utc>,
}

impl ShiftEvent {
    pub fn new(shift_id: ShiftId, kind: ShiftEventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            shift_id,
            kind,
            timestamp,
        }
    }

    pub fn start(shift_id: ShiftId, timestamp: DateTime<Utc>) -> Self {
        Self::new(shift_id, ShiftEventKind::Start, timestamp)
    }

    pub fn pause(shift_id: ShiftId, timestamp: DateTime<Utc>) -> Self {
        Self::new(shift_id, ShiftEventKind::Pause, timestamp)
    }

    pub fn resume(shift_id: ShiftId, timestamp: DateTime<Utc>) -> Self {
        Self::new(shift_id, ShiftEventKind::Resume, timestamp)
    }

    pub fn end(shift_id: ShiftId, timestamp: DateTime<Utc>, auto_ended: bool) -> Self {
        Self::new(shift_id, ShiftEventKind::End { auto_ended }, timestamp)
    }
}
