//! Rollups of shift and flight totals
//!
//! All folds are pure functions of the store contents and the reference time
//! passed in. Partial failures are recorded in the result; only failing to
//! enumerate what should be aggregated is an error.

use chrono::{DateTime, Utc};
use shiftwatch_api::{SkippedScope, UserTotal};
use shiftwatch_config::RollupSource;
use shiftwatch_store::ShiftStore;
use shiftwatch_util::{GuildId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{RollupError, RollupResult};

/// Per-user totals for one guild, ranked by total descending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRollup {
    pub guild_id: GuildId,
    pub entries: Vec<UserTotal>,
    /// Users whose log could not be loaded; they appear in `entries` with zero
    pub failed_users: Vec<UserId>,
}

impl GuildRollup {
    /// 1-based position of a user in the ranking
    pub fn rank_of(&self, user: &UserId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| &e.user_id == user)
            .map(|i| i + 1)
    }

    pub fn total_of(&self, user: &UserId) -> Duration {
        self.entries
            .iter()
            .find(|e| &e.user_id == user)
            .map(|e| e.total)
            .unwrap_or(Duration::ZERO)
    }
}

/// How many guilds fed into a cross-guild aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    pub attempted: usize,
    pub contributed: usize,
    pub skipped: Vec<SkippedScope>,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, guild_id: &GuildId, reason: impl ToString) {
        self.skipped.push(SkippedScope {
            guild_id: guild_id.clone(),
            reason: reason.to_string(),
        });
    }
}

/// Per-user sums across every known guild, ranked by total descending
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalRollup {
    pub entries: Vec<UserTotal>,
    pub coverage: Coverage,
}

impl GlobalRollup {
    pub fn rank_of(&self, user: &UserId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| &e.user_id == user)
            .map(|i| i + 1)
    }
}

/// Cross-guild flight statistics for one pilot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PilotGlobalStats {
    pub user_id: UserId,
    pub total_flights: u64,
    pub global_rank: usize,
    pub total_pilots: usize,
    pub per_guild_flight_counts: Vec<(GuildId, u64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PilotBoard {
    /// Ordered by `global_rank`
    pub pilots: Vec<PilotGlobalStats>,
    pub coverage: Coverage,
}

impl PilotBoard {
    pub fn pilot(&self, user: &UserId) -> Option<&PilotGlobalStats> {
        self.pilots.iter().find(|p| &p.user_id == user)
    }
}

/// Builds rollups from a store
#[derive(Clone)]
pub struct RollupBuilder {
    store: Arc<dyn ShiftStore>,
}

impl RollupBuilder {
    pub fn new(store: Arc<dyn ShiftStore>) -> Self {
        Self { store }
    }

    /// Replay every member's log and sum active durations
    pub async fn guild_rollup(
        &self,
        guild: &GuildId,
        include_active: bool,
        now: DateTime<Utc>,
    ) -> RollupResult<GuildRollup> {
        let members = self.store.list_guild_members(guild).await.map_err(|e| {
            RollupError::MemberEnumeration {
                guild_id: guild.clone(),
                message: e.to_string(),
            }
        })?;

        let mut entries = Vec::with_capacity(members.len());
        let mut failed_users = Vec::new();

        for user in members {
            let total = match self.store.load_shift_log(guild, &user).await {
                Ok(log) => log.total_active(now, include_active),
                Err(e) => {
                    warn!(guild_id = %guild, user_id = %user, error = %e, "Shift log unavailable, counting as zero");
                    failed_users.push(user.clone());
                    Duration::ZERO
                }
            };
            entries.push(UserTotal::new(user, total));
        }

        rank_by_total(&mut entries);
        debug!(
            guild_id = %guild,
            users = entries.len(),
            failed = failed_users.len(),
            "Guild rollup built from logs"
        );

        Ok(GuildRollup {
            guild_id: guild.clone(),
            entries,
            failed_users,
        })
    }

    /// Use the store's pre-aggregated totals instead of replaying logs
    pub async fn guild_totals(&self, guild: &GuildId) -> RollupResult<GuildRollup> {
        let mut entries = self.store.load_guild_shift_totals(guild).await.map_err(|e| {
            RollupError::MemberEnumeration {
                guild_id: guild.clone(),
                message: e.to_string(),
            }
        })?;
        rank_by_total(&mut entries);

        Ok(GuildRollup {
            guild_id: guild.clone(),
            entries,
            failed_users: Vec::new(),
        })
    }

    /// Fold guild totals from every known guild by addition
    pub async fn global_rollup(
        &self,
        source: RollupSource,
        include_active: bool,
        now: DateTime<Utc>,
    ) -> RollupResult<GlobalRollup> {
        let guilds = self
            .store
            .list_known_guilds()
            .await
            .map_err(|e| RollupError::GuildEnumeration(e.to_string()))?;

        let mut coverage = Coverage {
            attempted: guilds.len(),
            ..Default::default()
        };
        let mut entries: Vec<UserTotal> = Vec::new();
        let mut index: HashMap<UserId, usize> = HashMap::new();

        for guild in &guilds {
            let rollup = match source {
                RollupSource::Replay => self.guild_rollup(guild, include_active, now).await,
                RollupSource::StoredTotals => self.guild_totals(guild).await,
            };

            match rollup {
                Ok(rollup) => {
                    coverage.contributed += 1;
                    // First-seen order decides ties in the final ranking
                    for entry in rollup.entries {
                        match index.get(&entry.user_id) {
                            Some(&i) => entries[i].total += entry.total,
                            None => {
                                index.insert(entry.user_id.clone(), entries.len());
                                entries.push(entry);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(guild_id = %guild, error = %e, "Skipping guild in global rollup");
                    coverage.skip(guild, e);
                }
            }
        }

        rank_by_total(&mut entries);
        debug!(
            users = entries.len(),
            attempted = coverage.attempted,
            contributed = coverage.contributed,
            "Global rollup built"
        );

        Ok(GlobalRollup { entries, coverage })
    }

    /// Fold flight tallies across guilds into ranked pilot statistics
    pub async fn pilot_rollup(&self) -> RollupResult<PilotBoard> {
        let guilds = self
            .store
            .list_known_guilds()
            .await
            .map_err(|e| RollupError::GuildEnumeration(e.to_string()))?;

        let mut coverage = Coverage {
            attempted: guilds.len(),
            ..Default::default()
        };
        let mut pilots: Vec<PilotGlobalStats> = Vec::new();
        let mut index: HashMap<UserId, usize> = HashMap::new();

        for guild in &guilds {
            let tallies = match self.store.load_guild_flights(guild).await {
                Ok(tallies) => tallies,
                Err(e) => {
                    warn!(guild_id = %guild, error = %e, "Skipping guild in pilot rollup");
                    coverage.skip(guild, e);
                    continue;
                }
            };
            coverage.contributed += 1;

            for tally in tallies {
                let slot = match index.get(&tally.user_id) {
                    Some(&i) => i,
                    None => {
                        index.insert(tally.user_id.clone(), pilots.len());
                        pilots.push(PilotGlobalStats {
                            user_id: tally.user_id.clone(),
                            total_flights: 0,
                            global_rank: 0,
                            total_pilots: 0,
                            per_guild_flight_counts: Vec::new(),
                        });
                        pilots.len() - 1
                    }
                };
                let pilot = &mut pilots[slot];
                pilot.total_flights += tally.total_points;
                pilot
                    .per_guild_flight_counts
                    .push((guild.clone(), tally.flights_logged));
            }
        }

        pilots.sort_by(|a, b| b.total_flights.cmp(&a.total_flights));
        let total_pilots = pilots.len();
        for (i, pilot) in pilots.iter_mut().enumerate() {
            pilot.global_rank = i + 1;
            pilot.total_pilots = total_pilots;
        }

        Ok(PilotBoard { pilots, coverage })
    }
}

/// Stable sort by total descending; ties keep their existing order
pub fn rank_by_total(entries: &mut [UserTotal]) {
    entries.sort_by(|a, b| b.total.cmp(&a.total));
}
