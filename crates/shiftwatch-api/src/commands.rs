//! Commands a member can issue against their own shift

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ShiftEventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftCommand {
    Start,
    Pause,
    Resume,
    End,
}

impl ShiftCommand {
    /// Event kind appended when the command is accepted
    pub fn event_kind(self, auto_ended: bool) -> ShiftEventKind {
        match self {
            ShiftCommand::Start => ShiftEventKind::Start,
            ShiftCommand::Pause => ShiftEventKind::Pause,
            ShiftCommand::Resume => ShiftEventKind::Resume,
            ShiftCommand::End => ShiftEventKind::End { auto_ended },
        }
    }
}

impl fmt::Display for ShiftCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShiftCommand::Start => "start",
            ShiftCommand::Pause => "pause",
            ShiftCommand::Resume => "resume",
            ShiftCommand::End => "end",
        };
        f.write_str(s)
    }
}
