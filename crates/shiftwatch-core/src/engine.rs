//! Shift engine
//!
//! Every command runs load -> validate -> append under the (guild, user)
//! scope lock, so a command appends exactly one event or nothing. Accepted
//! Starts arm an auto-end timer when the guild has a shift limit; manual Ends
//! and purges cancel it.

use chrono::{DateTime, Utc};
use shiftwatch_api::{PurgeOutcome, ShiftCommand, ShiftEvent, ShiftStatus, UserShiftLog};
use shiftwatch_config::Settings;
use shiftwatch_store::ShiftStore;
use shiftwatch_util::{add_duration, elapsed_between, GuildId, ShiftId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{plan_transition, AutoEndScheduler, CoreEvent, Leaderboards, ScopeLocks, ShiftResult};

/// Capacity of the core event channel; slow subscribers see `Lagged`
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of an accepted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftOutcome {
    pub shift_id: ShiftId,
    pub event: ShiftEvent,
    pub status: ShiftStatus,
    /// Active duration of the shift as of the command
    pub active_duration: Duration,
    /// Set on Start when the guild auto-ends shifts
    pub auto_end_at: Option<DateTime<Utc>>,
}

/// A user's shift status as of a given time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftReport {
    pub status: ShiftStatus,
    /// Active duration of the current shift, zero when there is none
    pub current_duration: Duration,
    /// Sum over completed shifts
    pub completed_total: Duration,
}

/// The shift engine
pub struct ShiftEngine {
    settings: Arc<Settings>,
    store: Arc<dyn ShiftStore>,
    locks: Arc<ScopeLocks>,
    scheduler: AutoEndScheduler,
    leaderboards: Arc<Leaderboards>,
    events: broadcast::Sender<CoreEvent>,
}

impl ShiftEngine {
    /// Create a new shift engine
    pub fn new(settings: Settings, store: Arc<dyn ShiftStore>) -> Self {
        let settings = Arc::new(settings);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            guild_count = settings.guilds.len(),
            rollup_source = ?settings.rollup.source,
            "Shift engine initialized"
        );

        Self {
            leaderboards: Arc::new(Leaderboards::new(Arc::clone(&settings), Arc::clone(&store))),
            settings,
            store,
            locks: Arc::new(ScopeLocks::new()),
            scheduler: AutoEndScheduler::new(),
            events,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn leaderboards(&self) -> &Arc<Leaderboards> {
        &self.leaderboards
    }

    pub fn scheduler(&self) -> &AutoEndScheduler {
        &self.scheduler
    }

    /// Subscribe to core events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub async fn start_shift(
        &self,
        guild: &GuildId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> ShiftResult<ShiftOutcome> {
        self.apply(guild, user, ShiftCommand::Start, now).await
    }

    pub async fn pause_shift(
        &self,
        guild: &GuildId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> ShiftResult<ShiftOutcome> {
        self.apply(guild, user, ShiftCommand::Pause, now).await
    }

    pub async fn resume_shift(
        &self,
        guild: &GuildId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> ShiftResult<ShiftOutcome> {
        self.apply(guild, user, ShiftCommand::Resume, now).await
    }

    pub async fn end_shift(
        &self,
        guild: &GuildId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> ShiftResult<ShiftOutcome> {
        self.apply(guild, user, ShiftCommand::End, now).await
    }

    /// Validate and apply one command
    pub async fn apply(
        &self,
        guild: &GuildId,
        user: &UserId,
        command: ShiftCommand,
        now: DateTime<Utc>,
    ) -> ShiftResult<ShiftOutcome> {
        let _scope = self.locks.lock(guild, user).await;

        let mut log = self.store.load_shift_log(guild, user).await?;
        let shift_id = plan_transition(&log, command).map_err(|rejection| {
            debug!(
                guild_id = %guild,
                user_id = %user,
                command = %command,
                reason = %rejection,
                "Shift command rejected"
            );
            rejection
        })?;

        let event = ShiftEvent::new(shift_id.clone(), command.event_kind(false), now);
        self.store.append_shift_event(guild, user, &event).await?;
        log.events.push(event.clone());

        let active_duration = log.active_duration(&shift_id, now);
        let status = log.status();
        let mut auto_end_at = None;

        let core_event = match command {
            ShiftCommand::Start => {
                auto_end_at = self.arm_auto_end(guild, user, &shift_id, now, now);
                info!(
                    guild_id = %guild,
                    user_id = %user,
                    shift_id = %shift_id,
                    auto_end_at = ?auto_end_at,
                    "Shift started"
                );
                CoreEvent::ShiftStarted {
                    guild_id: guild.clone(),
                    user_id: user.clone(),
                    shift_id: shift_id.clone(),
                    started_at: now,
                    auto_end_at,
                }
            }
            ShiftCommand::Pause => {
                info!(guild_id = %guild, user_id = %user, shift_id = %shift_id, "Shift paused");
                CoreEvent::ShiftPaused {
                    guild_id: guild.clone(),
                    user_id: user.clone(),
                    shift_id: shift_id.clone(),
                    at: now,
                }
            }
            ShiftCommand::Resume => {
                info!(guild_id = %guild, user_id = %user, shift_id = %shift_id, "Shift resumed");
                CoreEvent::ShiftResumed {
                    guild_id: guild.clone(),
                    user_id: user.clone(),
                    shift_id: shift_id.clone(),
                    at: now,
                }
            }
            ShiftCommand::End => {
                self.scheduler.cancel(&shift_id);
                info!(
                    guild_id = %guild,
                    user_id = %user,
                    shift_id = %shift_id,
                    duration_secs = active_duration.as_secs(),
                    "Shift ended"
                );
                CoreEvent::ShiftEnded {
                    guild_id: guild.clone(),
                    user_id: user.clone(),
                    shift_id: shift_id.clone(),
                    ended_at: now,
                    auto_ended: false,
                    duration: active_duration,
                }
            }
        };
        let _ = self.events.send(core_event);

        Ok(ShiftOutcome {
            shift_id,
            event,
            status,
            active_duration,
            auto_end_at,
        })
    }

    /// Current status and durations for a user
    pub async fn status(
        &self,
        guild: &GuildId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> ShiftResult<ShiftReport> {
        let log = self.store.load_shift_log(guild, user).await?;
        Ok(report(&log, now))
    }

    /// Administratively delete one shift's events.
    ///
    /// Runs under the owner's scope lock so it cannot interleave with a
    /// command or auto-end that already loaded the shift.
    pub async fn purge_shift(
        &self,
        guild: &GuildId,
        shift_id: &ShiftId,
    ) -> ShiftResult<PurgeOutcome> {
        let _scope = match self.store.shift_owner(guild, shift_id).await? {
            Some(owner) => Some(self.locks.lock(guild, &owner).await),
            None => None,
        };

        self.scheduler.cancel(shift_id);
        let outcome = self.leaderboards.purge_shift(guild, shift_id).await?;

        let _ = self.events.send(CoreEvent::ShiftPurged {
            guild_id: guild.clone(),
            shift_id: shift_id.clone(),
            outcome,
        });
        Ok(outcome)
    }

    /// Arm auto-end timers for open shifts in every known guild that do not
    /// have one yet.
    ///
    /// Called at startup and on every rescan, so shifts started by another
    /// process sharing the store are picked up. Overdue shifts are ended
    /// right away, stamped at their deadline. Returns the number of timers
    /// newly armed.
    pub async fn recover_auto_ends(&self, now: DateTime<Utc>) -> ShiftResult<usize> {
        let guilds = self.store.list_known_guilds().await?;
        let mut armed = 0;

        for guild in &guilds {
            if self.settings.max_shift_length(guild).is_none() {
                continue;
            }

            let members = match self.store.list_guild_members(guild).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(guild_id = %guild, error = %e, "Cannot recover auto-ends for guild");
                    continue;
                }
            };

            for user in &members {
                let log = match self.store.load_shift_log(guild, user).await {
                    Ok(log) => log,
                    Err(e) => {
                        warn!(guild_id = %guild, user_id = %user, error = %e, "Cannot recover auto-ends for user");
                        continue;
                    }
                };

                for shift in log.open_shifts() {
                    if self.scheduler.is_armed(&shift.shift_id) {
                        continue;
                    }
                    if let Some(started_at) = shift.started_at
                        && self
                            .arm_auto_end(guild, user, &shift.shift_id, started_at, now)
                            .is_some()
                    {
                        armed += 1;
                    }
                }
            }
        }

        debug!(armed, guilds = guilds.len(), "Auto-end timers recovered");
        Ok(armed)
    }

    fn arm_auto_end(
        &self,
        guild: &GuildId,
        user: &UserId,
        shift_id: &ShiftId,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let max_length = self.settings.max_shift_length(guild)?;
        let deadline = add_duration(started_at, max_length);

        let job = AutoEndJob {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            events: self.events.clone(),
            guild: guild.clone(),
            user: user.clone(),
            shift_id: shift_id.clone(),
            deadline,
            armed_wall: now,
            armed_at: Instant::now(),
        };
        self.scheduler
            .arm(shift_id.clone(), elapsed_between(now, deadline), job.run());

        Some(deadline)
    }
}

impl Drop for ShiftEngine {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
    }
}

fn report(log: &UserShiftLog, now: DateTime<Utc>) -> ShiftReport {
    ShiftReport {
        status: log.status(),
        current_duration: log
            .current_shift()
            .map(|t| t.active_duration(now))
            .unwrap_or(Duration::ZERO),
        completed_total: log.total_active(now, false),
    }
}

/// Work done when an auto-end timer fires
struct AutoEndJob {
    store: Arc<dyn ShiftStore>,
    locks: Arc<ScopeLocks>,
    events: broadcast::Sender<CoreEvent>,
    guild: GuildId,
    user: UserId,
    shift_id: ShiftId,
    deadline: DateTime<Utc>,
    /// Wall-clock and monotonic time when the timer was armed
    armed_wall: DateTime<Utc>,
    armed_at: Instant,
}

impl AutoEndJob {
    async fn run(self) {
        if let Err(e) = self.fire().await {
            warn!(
                guild_id = %self.guild,
                user_id = %self.user,
                shift_id = %self.shift_id,
                error = %e,
                "Auto-end failed"
            );
        }
    }

    async fn fire(&self) -> ShiftResult<()> {
        let _scope = self.locks.lock(&self.guild, &self.user).await;

        let mut log = self.store.load_shift_log(&self.guild, &self.user).await?;
        if !log.timeline(&self.shift_id).is_some_and(|t| t.is_open()) {
            debug!(shift_id = %self.shift_id, "Shift no longer open, auto-end skipped");
            return Ok(());
        }

        // Stamp at the deadline when the timer fires late
        let fired_at = add_duration(self.armed_wall, self.armed_at.elapsed());
        let ended_at = fired_at.min(self.deadline);

        let event = ShiftEvent::end(self.shift_id.clone(), ended_at, true);
        self.store
            .append_shift_event(&self.guild, &self.user, &event)
            .await?;
        log.events.push(event);

        let duration = log.active_duration(&self.shift_id, ended_at);
        info!(
            guild_id = %self.guild,
            user_id = %self.user,
            shift_id = %self.shift_id,
            duration_secs = duration.as_secs(),
            "Shift auto-ended"
        );

        let _ = self.events.send(CoreEvent::ShiftEnded {
            guild_id: self.guild.clone(),
            user_id: self.user.clone(),
            shift_id: self.shift_id.clone(),
            ended_at,
            auto_ended: true,
            duration,
        });
        Ok(())
    }
}
