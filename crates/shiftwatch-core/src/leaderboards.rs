//! Cached leaderboards and per-user shift statistics
//!
//! Four caches sit in front of the rollup builder: the per-guild shift
//! leaderboard, the global shift leaderboard, the global pilot board and the
//! server directory. Each has its own TTL from configuration and is only
//! invalidated here, explicitly.

use chrono::{DateTime, Utc};
use shiftwatch_api::{PurgeOutcome, ShiftStatus};
use shiftwatch_config::{RollupSource, Settings};
use shiftwatch_store::{ShiftStore, StoreResult};
use shiftwatch_util::{GuildId, ShiftId, UserId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    GlobalRollup, GuildRollup, PilotBoard, PilotGlobalStats, RollupBuilder, RollupError,
    RollupResult, TtlCache,
};

/// Scope an aggregate is cached under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    Guild(GuildId),
    Global,
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Guild(id) => write!(f, "guild:{}", id),
            ScopeKey::Global => f.write_str("global"),
        }
    }
}

/// One row of the server directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDirectoryEntry {
    pub guild_id: GuildId,
    pub name: String,
    pub member_count: usize,
}

/// Shift currently open for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentShift {
    pub shift_id: ShiftId,
    pub status: ShiftStatus,
    pub started_at: DateTime<Utc>,
    pub active_duration: Duration,
}

/// A user's shift statistics within one guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserShiftSummary {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub completed_shifts: usize,
    pub total_time: Duration,
    pub average_time: Duration,
    pub longest: Option<(ShiftId, Duration)>,
    pub shortest: Option<(ShiftId, Duration)>,
    pub most_recent: Option<ShiftId>,
    pub current: Option<CurrentShift>,
    /// Position on the guild leaderboard and the number of ranked users
    pub rank: Option<(usize, usize)>,
}

/// An unterminated shift in a guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveShiftRow {
    pub user_id: UserId,
    pub shift_id: ShiftId,
    pub started_at: DateTime<Utc>,
    pub paused: bool,
    pub active_duration: Duration,
}

/// The leaderboard service
pub struct Leaderboards {
    settings: Arc<Settings>,
    store: Arc<dyn ShiftStore>,
    builder: RollupBuilder,
    guild_boards: TtlCache<ScopeKey, GuildRollup>,
    global_board: TtlCache<ScopeKey, GlobalRollup>,
    pilot_board: TtlCache<ScopeKey, PilotBoard>,
    server_directory: TtlCache<ScopeKey, Vec<ServerDirectoryEntry>>,
}

impl Leaderboards {
    pub fn new(settings: Arc<Settings>, store: Arc<dyn ShiftStore>) -> Self {
        let ttl = settings.cache;
        Self {
            builder: RollupBuilder::new(Arc::clone(&store)),
            guild_boards: TtlCache::new("guild_leaderboard", ttl.guild_leaderboard_ttl),
            global_board: TtlCache::new("global_leaderboard", ttl.global_leaderboard_ttl),
            pilot_board: TtlCache::new("pilot_stats", ttl.pilot_stats_ttl),
            server_directory: TtlCache::new("server_directory", ttl.server_directory_ttl),
            settings,
            store,
        }
    }

    pub fn builder(&self) -> &RollupBuilder {
        &self.builder
    }

    /// Ranked shift totals for one guild
    pub async fn guild_leaderboard(
        &self,
        guild: &GuildId,
        now: DateTime<Utc>,
    ) -> RollupResult<Arc<GuildRollup>> {
        let rollup = self.settings.rollup;
        self.guild_boards
            .get(&ScopeKey::Guild(guild.clone()), || async move {
                match rollup.source {
                    RollupSource::Replay => {
                        self.builder
                            .guild_rollup(guild, rollup.include_active, now)
                            .await
                    }
                    RollupSource::StoredTotals => self.builder.guild_totals(guild).await,
                }
            })
            .await
    }

    /// Ranked shift totals across all guilds
    pub async fn global_leaderboard(&self, now: DateTime<Utc>) -> RollupResult<Arc<GlobalRollup>> {
        let rollup = self.settings.rollup;
        self.global_board
            .get(&ScopeKey::Global, || {
                self.builder.global_rollup(rollup.source, false, now)
            })
            .await
    }

    /// Ranked flight counts across all guilds
    pub async fn pilot_stats(&self) -> RollupResult<Arc<PilotBoard>> {
        self.pilot_board
            .get(&ScopeKey::Global, || self.builder.pilot_rollup())
            .await
    }

    /// One pilot's global statistics, if they have logged any flights
    pub async fn pilot(&self, user: &UserId) -> RollupResult<Option<PilotGlobalStats>> {
        Ok(self.pilot_stats().await?.pilot(user).cloned())
    }

    /// Known guilds by member count, largest first
    pub async fn server_directory(&self) -> RollupResult<Arc<Vec<ServerDirectoryEntry>>> {
        self.server_directory
            .get(&ScopeKey::Global, || self.build_server_directory())
            .await
    }

    async fn build_server_directory(&self) -> RollupResult<Vec<ServerDirectoryEntry>> {
        let mut guilds: Vec<GuildId> = self.settings.guilds.iter().map(|g| g.id.clone()).collect();
        for guild in self
            .store
            .list_known_guilds()
            .await
            .map_err(|e| RollupError::GuildEnumeration(e.to_string()))?
        {
            if !guilds.contains(&guild) {
                guilds.push(guild);
            }
        }

        let mut entries = Vec::with_capacity(guilds.len());
        for guild in guilds {
            match self.store.list_guild_members(&guild).await {
                Ok(members) => entries.push(ServerDirectoryEntry {
                    name: self.settings.display_name(&guild),
                    member_count: members.len(),
                    guild_id: guild,
                }),
                Err(e) => {
                    warn!(guild_id = %guild, error = %e, "Leaving guild out of server directory");
                }
            }
        }

        entries.sort_by(|a, b| b.member_count.cmp(&a.member_count));
        Ok(entries)
    }

    /// Shift statistics for one user, with their rank on the cached guild board
    pub async fn user_shift_summary(
        &self,
        guild: &GuildId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> RollupResult<UserShiftSummary> {
        let log = self.store.load_shift_log(guild, user).await?;

        let completed: Vec<(ShiftId, Duration)> = log
            .completed_shifts()
            .into_iter()
            .map(|t| {
                let duration = t.active_duration(now);
                (t.shift_id, duration)
            })
            .collect();

        let total_time: Duration = completed.iter().map(|(_, d)| *d).sum();
        let average_time = u32::try_from(completed.len())
            .ok()
            .filter(|n| *n > 0)
            .map(|n| total_time / n)
            .unwrap_or(Duration::ZERO);

        // Ties resolve to the earliest shift
        let longest = completed
            .iter()
            .rev()
            .max_by_key(|(_, d)| *d)
            .cloned();
        let shortest = completed.iter().min_by_key(|(_, d)| *d).cloned();
        let most_recent = completed.last().map(|(id, _)| id.clone());

        let status = log.status();
        let current = log.current_shift().and_then(|t| {
            t.started_at.map(|started_at| CurrentShift {
                shift_id: t.shift_id.clone(),
                status: status.clone(),
                started_at,
                active_duration: t.active_duration(now),
            })
        });

        let rank = match self.guild_leaderboard(guild, now).await {
            Ok(board) => board.rank_of(user).map(|r| (r, board.entries.len())),
            Err(e) => {
                warn!(guild_id = %guild, error = %e, "Guild leaderboard unavailable for summary");
                None
            }
        };

        Ok(UserShiftSummary {
            guild_id: guild.clone(),
            user_id: user.clone(),
            completed_shifts: completed.len(),
            total_time,
            average_time,
            longest,
            shortest,
            most_recent,
            current,
            rank,
        })
    }

    /// Every unterminated shift in a guild, longest running first
    pub async fn active_shifts(
        &self,
        guild: &GuildId,
        now: DateTime<Utc>,
    ) -> RollupResult<Vec<ActiveShiftRow>> {
        let members = self.store.list_guild_members(guild).await.map_err(|e| {
            RollupError::MemberEnumeration {
                guild_id: guild.clone(),
                message: e.to_string(),
            }
        })?;

        let mut rows = Vec::new();
        for user in members {
            let log = match self.store.load_shift_log(guild, &user).await {
                Ok(log) => log,
                Err(e) => {
                    warn!(guild_id = %guild, user_id = %user, error = %e, "Skipping user in active shift listing");
                    continue;
                }
            };
            for shift in log.open_shifts() {
                let Some(started_at) = shift.started_at else {
                    continue;
                };
                rows.push(ActiveShiftRow {
                    user_id: user.clone(),
                    paused: shift.is_paused(),
                    active_duration: shift.active_duration(now),
                    shift_id: shift.shift_id,
                    started_at,
                });
            }
        }

        rows.sort_by(|a, b| b.active_duration.cmp(&a.active_duration));
        Ok(rows)
    }

    /// Purge a shift and drop the aggregates that may include it
    pub async fn purge_shift(&self, guild: &GuildId, shift_id: &ShiftId) -> StoreResult<PurgeOutcome> {
        let outcome = self.store.purge_shift(guild, shift_id).await?;
        self.invalidate_guild(guild);
        self.global_board.invalidate(&ScopeKey::Global);
        Ok(outcome)
    }

    pub fn invalidate_guild(&self, guild: &GuildId) {
        self.guild_boards.invalidate(&ScopeKey::Guild(guild.clone()));
        debug!(guild_id = %guild, "Guild leaderboard invalidated");
    }

    /// Drop every cached aggregate
    pub fn invalidate_all(&self) {
        self.guild_boards.invalidate_all();
        self.global_board.invalidate_all();
        self.pilot_board.invalidate_all();
        self.server_directory.invalidate_all();
    }
}
