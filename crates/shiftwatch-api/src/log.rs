//! Interpretation of a user's shift log
//!
//! Everything here is a pure function of the events and a reference time
//! `now`. Status and durations are never stored; they are re-derived from the
//! full log on every read, so asking twice gives the same answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shiftwatch_util::{elapsed_between, GuildId, ShiftId, UserId};
use std::time::Duration;

use crate::{ShiftEvent, ShiftEventKind};

/// Derived status of a user's shifts within one guild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ShiftStatus {
    /// The user has no shift events at all
    Unknown,

    Active {
        shift_id: ShiftId,
        started_at: DateTime<Utc>,
    },

    Paused {
        shift_id: ShiftId,
        started_at: DateTime<Utc>,
        paused_at: DateTime<Utc>,
    },

    /// No open shift; carries the most recently started shift that ended
    Ended {
        shift_id: ShiftId,
        ended_at: DateTime<Utc>,
        auto_ended: bool,
    },
}

impl ShiftStatus {
    pub fn shift_id(&self) -> Option<&ShiftId> {
        match self {
            ShiftStatus::Unknown => None,
            ShiftStatus::Active { shift_id, .. }
            | ShiftStatus::Paused { shift_id, .. }
            | ShiftStatus::Ended { shift_id, .. } => Some(shift_id),
        }
    }

    /// Whether a shift is currently running or paused
    pub fn is_open(&self) -> bool {
        matches!(self, ShiftStatus::Active { .. } | ShiftStatus::Paused { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShiftStatus::Unknown => "none",
            ShiftStatus::Active { .. } => "active",
            ShiftStatus::Paused { .. } => "paused",
            ShiftStatus::Ended { .. } => "ended",
        }
    }
}

/// One shift reconstructed from its events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftTimeline {
    pub shift_id: ShiftId,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub auto_ended: bool,
    /// Sum of closed Pause -> Resume intervals
    pub paused: Duration,
    /// Start of a Pause that has no later Resume
    pub open_pause: Option<DateTime<Utc>>,
    pub event_count: usize,
}

impl ShiftTimeline {
    /// Walk the events of `shift_id` once, in timestamp order.
    ///
    /// Events sharing a timestamp keep their append order. Events before the
    /// first Start and after the first End are ignored; a second Pause without
    /// a Resume restarts the open pause.
    pub fn from_events<'a>(
        shift_id: &ShiftId,
        events: impl IntoIterator<Item = &'a ShiftEvent>,
    ) -> Self {
        let mut sorted: Vec<&ShiftEvent> = events
            .into_iter()
            .filter(|e| &e.shift_id == shift_id)
            .collect();
        sorted.sort_by_key(|e| e.timestamp);

        let mut timeline = Self {
            shift_id: shift_id.clone(),
            started_at: None,
            ended_at: None,
            auto_ended: false,
            paused: Duration::ZERO,
            open_pause: None,
            event_count: sorted.len(),
        };

        for event in sorted {
            let ts = event.timestamp;
            match event.kind {
                ShiftEventKind::Start => {
                    if timeline.started_at.is_none() {
                        timeline.started_at = Some(ts);
                    }
                }
                _ if timeline.started_at.is_none() || timeline.ended_at.is_some() => {}
                ShiftEventKind::Pause => {
                    timeline.open_pause = Some(ts);
                }
                ShiftEventKind::Resume => {
                    if let Some(pause_start) = timeline.open_pause.take() {
                        timeline.paused += elapsed_between(pause_start, ts);
                    }
                }
                ShiftEventKind::End { auto_ended } => {
                    timeline.ended_at = Some(ts);
                    timeline.auto_ended = auto_ended;
                }
            }
        }

        timeline
    }

    /// Started and not yet ended
    pub fn is_open(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.is_open() && self.open_pause.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_some()
    }

    /// Wall-clock time from Start to End (or `now` while open)
    pub fn wall_clock_span(&self, now: DateTime<Utc>) -> Duration {
        match self.started_at {
            Some(start) => elapsed_between(start, self.ended_at.unwrap_or(now)),
            None => Duration::ZERO,
        }
    }

    /// Time the shift was not paused.
    ///
    /// An open pause is charged up to the End when there is one, otherwise up
    /// to `now`, so a finished shift's duration does not depend on `now`.
    pub fn active_duration(&self, now: DateTime<Utc>) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        let reference = self.ended_at.unwrap_or(now);
        let span = elapsed_between(start, reference);
        let open = self
            .open_pause
            .map(|pause_start| elapsed_between(pause_start, reference))
            .unwrap_or(Duration::ZERO);

        span.saturating_sub(self.paused.saturating_add(open))
    }
}

/// Ordered event log of one user within one guild, as held by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserShiftLog {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub events: Vec<ShiftEvent>,
    /// Pre-aggregated total of completed shifts as maintained by the store
    pub cached_total: Duration,
}

impl UserShiftLog {
    pub fn new(
        guild_id: GuildId,
        user_id: UserId,
        events: Vec<ShiftEvent>,
        cached_total: Duration,
    ) -> Self {
        Self {
            guild_id,
            user_id,
            events,
            cached_total,
        }
    }

    pub fn empty(guild_id: GuildId, user_id: UserId) -> Self {
        Self::new(guild_id, user_id, Vec::new(), Duration::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct shift ids in order of first appearance
    pub fn shift_ids(&self) -> Vec<ShiftId> {
        let mut ids: Vec<ShiftId> = Vec::new();
        for event in &self.events {
            if !ids.contains(&event.shift_id) {
                ids.push(event.shift_id.clone());
            }
        }
        ids
    }

    /// Every shift in the log, ordered by start time; shifts with no Start go last
    pub fn timelines(&self) -> Vec<ShiftTimeline> {
        let mut timelines: Vec<ShiftTimeline> = self
            .shift_ids()
            .iter()
            .map(|id| ShiftTimeline::from_events(id, &self.events))
            .collect();
        timelines.sort_by_key(|t| (t.started_at.is_none(), t.started_at));
        timelines
    }

    pub fn timeline(&self, shift_id: &ShiftId) -> Option<ShiftTimeline> {
        if self.events.iter().any(|e| &e.shift_id == shift_id) {
            Some(ShiftTimeline::from_events(shift_id, &self.events))
        } else {
            None
        }
    }

    /// All started shifts without an End
    pub fn open_shifts(&self) -> Vec<ShiftTimeline> {
        self.timelines().into_iter().filter(|t| t.is_open()).collect()
    }

    pub fn completed_shifts(&self) -> Vec<ShiftTimeline> {
        self.timelines()
            .into_iter()
            .filter(|t| t.is_completed())
            .collect()
    }

    /// The shift commands act on: the earliest-started open shift.
    ///
    /// A log should hold at most one open shift, but legacy data may hold
    /// several; ending them one at a time drains them oldest first.
    pub fn current_shift(&self) -> Option<ShiftTimeline> {
        self.timelines().into_iter().find(|t| t.is_open())
    }

    pub fn status(&self) -> ShiftStatus {
        let timelines = self.timelines();

        if let Some(open) = timelines.iter().find(|t| t.is_open()) {
            let started_at = open.started_at.unwrap_or_default();
            return match open.open_pause {
                Some(paused_at) => ShiftStatus::Paused {
                    shift_id: open.shift_id.clone(),
                    started_at,
                    paused_at,
                },
                None => ShiftStatus::Active {
                    shift_id: open.shift_id.clone(),
                    started_at,
                },
            };
        }

        timelines
            .iter()
            .rev()
            .find(|t| t.is_completed())
            .and_then(|t| {
                t.ended_at.map(|ended_at| ShiftStatus::Ended {
                    shift_id: t.shift_id.clone(),
                    ended_at,
                    auto_ended: t.auto_ended,
                })
            })
            .unwrap_or(ShiftStatus::Unknown)
    }

    /// Active duration of one shift; zero when the id is not in this log
    pub fn active_duration(&self, shift_id: &ShiftId, now: DateTime<Utc>) -> Duration {
        self.timeline(shift_id)
            .map(|t| t.active_duration(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Sum of active durations of completed shifts, plus open ones if requested
    pub fn total_active(&self, now: DateTime<Utc>, include_in_progress: bool) -> Duration {
        self.timelines()
            .iter()
            .filter(|t| t.is_completed() || (include_in_progress && t.is_open()))
            .map(|t| t.active_duration(now))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
    }

    fn mins(m: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::minutes(m)
    }

    fn log(events: Vec<ShiftEvent>) -> UserShiftLog {
        UserShiftLog::new(
            GuildId::new("guild"),
            UserId::new("user"),
            events,
            Duration::ZERO,
        )
    }

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn pause_and_resume_are_excluded() {
        let id = ShiftId::new("s1");
        let log = log(vec![
            ShiftEvent::start(id.clone(), mins(0)),
            ShiftEvent::pause(id.clone(), mins(10)),
            ShiftEvent::resume(id.clone(), mins(15)),
            ShiftEvent::end(id.clone(), mins(60), false),
        ]);

        assert_eq!(log.active_duration(&id, mins(500)), minutes(55));
    }

    #[test]
    fn plain_shift_without_pauses() {
        let id = ShiftId::new("s1");
        let log = log(vec![
            ShiftEvent::start(id.clone(), mins(0)),
            ShiftEvent::end(id.clone(), mins(30), false),
        ]);

        assert_eq!(log.active_duration(&id, mins(45)), minutes(30));
    }

    #[test]
    fn open_pause_is_excluded_up_to_now() {
        let id = ShiftId::new("s1");
        let log = log(vec![
            ShiftEvent::start(id.clone(), mins(0)),
            ShiftEvent::pause(id.clone(), mins(5)),
        ]);

        assert_eq!(log.active_duration(&id, mins(20)), minutes(5));
        assert!(matches!(log.status(), ShiftStatus::Paused { .. }));
    }

    #[test]
    fn ended_while_paused_is_stable_over_time() {
        let id = ShiftId::new("s1");
        let log = log(vec![
            ShiftEvent::start(id.clone(), mins(0)),
            ShiftEvent::pause(id.clone(), mins(20)),
            ShiftEvent::end(id.clone(), mins(30), true),
        ]);

        assert_eq!(log.active_duration(&id, mins(31)), minutes(20));
        assert_eq!(log.active_duration(&id, mins(600)), minutes(20));
    }

    #[test]
    fn out_of_order_append_is_sorted_by_timestamp() {
        let id = ShiftId::new("s1");
        let log = log(vec![
            ShiftEvent::start(id.clone(), mins(0)),
            ShiftEvent::resume(id.clone(), mins(15)),
            ShiftEvent::end(id.clone(), mins(60), false),
            ShiftEvent::pause(id.clone(), mins(10)),
        ]);

        assert_eq!(log.active_duration(&id, mins(60)), minutes(55));
    }

    #[test]
    fn duration_is_bounded_and_pure() {
        let id = ShiftId::new("s1");
        let log = log(vec![
            ShiftEvent::start(id.clone(), mins(0)),
            ShiftEvent::pause(id.clone(), mins(3)),
            ShiftEvent::resume(id.clone(), mins(4)),
            ShiftEvent::pause(id.clone(), mins(9)),
            ShiftEvent::resume(id.clone(), mins(27)),
            ShiftEvent::pause(id.clone(), mins(40)),
        ]);

        for now in [mins(0), mins(3), mins(10), mins(41), mins(1000)] {
            let timeline = log.timeline(&id).unwrap();
            let d = timeline.active_duration(now);
            assert!(d <= timeline.wall_clock_span(now));
            assert_eq!(d, log.active_duration(&id, now));
        }
    }

    #[test]
    fn query_before_start_is_zero() {
        let id = ShiftId::new("s1");
        let log = log(vec![ShiftEvent::start(id.clone(), mins(10))]);
        assert_eq!(log.active_duration(&id, mins(0)), Duration::ZERO);
    }

    #[test]
    fn shift_without_start_counts_nothing() {
        let id = ShiftId::new("orphan");
        let log = log(vec![
            ShiftEvent::pause(id.clone(), mins(1)),
            ShiftEvent::end(id.clone(), mins(9), false),
        ]);

        assert_eq!(log.active_duration(&id, mins(10)), Duration::ZERO);
        assert_eq!(log.status(), ShiftStatus::Unknown);
    }

    #[test]
    fn status_of_empty_log_is_unknown() {
        assert_eq!(log(vec![]).status(), ShiftStatus::Unknown);
    }

    #[test]
    fn status_tracks_latest_completed_shift() {
        let a = ShiftId::new("a");
        let b = ShiftId::new("b");
        let log = log(vec![
            ShiftEvent::start(a.clone(), mins(0)),
            ShiftEvent::end(a.clone(), mins(10), false),
            ShiftEvent::start(b.clone(), mins(20)),
            ShiftEvent::end(b.clone(), mins(25), true),
        ]);

        assert_eq!(
            log.status(),
            ShiftStatus::Ended {
                shift_id: b,
                ended_at: mins(25),
                auto_ended: true,
            }
        );
    }

    #[test]
    fn current_shift_is_earliest_open_one() {
        let a = ShiftId::new("a");
        let b = ShiftId::new("b");
        let log = log(vec![
            ShiftEvent::start(b.clone(), mins(5)),
            ShiftEvent::start(a.clone(), mins(0)),
        ]);

        assert_eq!(log.current_shift().unwrap().shift_id, a);
        assert_eq!(log.open_shifts().len(), 2);
    }

    #[test]
    fn totals_separate_completed_and_in_progress() {
        let a = ShiftId::new("a");
        let b = ShiftId::new("b");
        let log = log(vec![
            ShiftEvent::start(a.clone(), mins(0)),
            ShiftEvent::end(a.clone(), mins(30), false),
            ShiftEvent::start(b.clone(), mins(40)),
        ]);

        assert_eq!(log.total_active(mins(50), false), minutes(30));
        assert_eq!(log.total_active(mins(50), true), minutes(40));
        assert_eq!(log.completed_shifts().len(), 1);
    }
}
