//! Shift transition rules
//!
//! ```text
//! NoShift --Start--> Active --Pause--> Paused --Resume--> Active
//!                      |                  |
//!                      +------End---------+--> Ended --Start--> Active
//! ```

use shiftwatch_api::{ShiftCommand, UserShiftLog};
use shiftwatch_util::ShiftId;

use crate::TransitionRejection;

/// Decide which shift a command applies to, or why it is refused.
///
/// Start yields a freshly generated id. Every other command targets the
/// current shift, which is the earliest-started shift without an End.
pub fn plan_transition(
    log: &UserShiftLog,
    command: ShiftCommand,
) -> Result<ShiftId, TransitionRejection> {
    let current = log.current_shift();

    match command {
        ShiftCommand::Start => match current {
            Some(_) => Err(TransitionRejection::AlreadyActive),
            None => Ok(ShiftId::generate()),
        },
        ShiftCommand::Pause => match current {
            None => Err(TransitionRejection::NoActiveShift),
            Some(shift) if shift.is_paused() => Err(TransitionRejection::AlreadyPaused),
            Some(shift) => Ok(shift.shift_id),
        },
        ShiftCommand::Resume => match current {
            Some(shift) if shift.is_paused() => Ok(shift.shift_id),
            _ => Err(TransitionRejection::NotPaused),
        },
        ShiftCommand::End => match current {
            Some(shift) => Ok(shift.shift_id),
            None if log.timelines().iter().any(|t| t.is_completed()) => {
                Err(TransitionRejection::AlreadyEnded)
            }
            None => Err(TransitionRejection::NoActiveShift),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use shiftwatch_api::ShiftEvent;
    use shiftwatch_util::{GuildId, UserId};
    use std::time::Duration;

    fn at(m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap() + chrono::Duration::minutes(m)
    }

    fn log(events: Vec<ShiftEvent>) -> UserShiftLog {
        UserShiftLog::new(GuildId::new("g"), UserId::new("u"), events, Duration::ZERO)
    }

    #[test]
    fn test_empty_log() {
        let empty = log(vec![]);
        assert!(plan_transition(&empty, ShiftCommand::Start).is_ok());
        assert_eq!(
            plan_transition(&empty, ShiftCommand::Pause),
            Err(TransitionRejection::NoActiveShift)
        );
        assert_eq!(
            plan_transition(&empty, ShiftCommand::Resume),
            Err(TransitionRejection::NotPaused)
        );
        assert_eq!(
            plan_transition(&empty, ShiftCommand::End),
            Err(TransitionRejection::NoActiveShift)
        );
    }

    #[test]
    fn test_active_shift() {
        let id = ShiftId::new("s");
        let active = log(vec![ShiftEvent::start(id.clone(), at(0))]);

        assert_eq!(
            plan_transition(&active, ShiftCommand::Start),
            Err(TransitionRejection::AlreadyActive)
        );
        assert_eq!(plan_transition(&active, ShiftCommand::Pause), Ok(id.clone()));
        assert_eq!(
            plan_transition(&active, ShiftCommand::Resume),
            Err(TransitionRejection::NotPaused)
        );
        assert_eq!(plan_transition(&active, ShiftCommand::End), Ok(id));
    }

    #[test]
    fn test_paused_shift() {
        let id = ShiftId::new("s");
        let paused = log(vec![
            ShiftEvent::start(id.clone(), at(0)),
            ShiftEvent::pause(id.clone(), at(5)),
        ]);

        assert_eq!(
            plan_transition(&paused, ShiftCommand::Start),
            Err(TransitionRejection::AlreadyActive)
        );
        assert_eq!(
            plan_transition(&paused, ShiftCommand::Pause),
            Err(TransitionRejection::AlreadyPaused)
        );
        assert_eq!(plan_transition(&paused, ShiftCommand::Resume), Ok(id.clone()));
        assert_eq!(plan_transition(&paused, ShiftCommand::End), Ok(id));
    }

    #[test]
    fn test_ended_shift() {
        let id = ShiftId::new("s");
        let ended = log(vec![
            ShiftEvent::start(id.clone(), at(0)),
            ShiftEvent::end(id.clone(), at(30), false),
        ]);

        let next = plan_transition(&ended, ShiftCommand::Start).unwrap();
        assert_ne!(next, id);
        assert_eq!(
            plan_transition(&ended, ShiftCommand::End),
            Err(TransitionRejection::AlreadyEnded)
        );
        assert_eq!(
            plan_transition(&ended, ShiftCommand::Pause),
            Err(TransitionRejection::NoActiveShift)
        );
    }

    #[test]
    fn test_legacy_double_start_drains_oldest_first() {
        let older = ShiftId::new("older");
        let newer = ShiftId::new("newer");
        let mut events = vec![
            ShiftEvent::start(older.clone(), at(0)),
            ShiftEvent::start(newer.clone(), at(1)),
        ];

        assert_eq!(plan_transition(&log(events.clone()), ShiftCommand::End), Ok(older.clone()));

        events.push(ShiftEvent::end(older, at(10), false));
        assert_eq!(plan_transition(&log(events), ShiftCommand::End), Ok(newer));
    }
}
