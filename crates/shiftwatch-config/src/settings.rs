//! Validated settings structures

use crate::schema::{RawCacheConfig, RawConfig, RawDisplayConfig, RawGuild, RawServiceConfig};
use crate::validation::parse_rollup_source;
use serde::{Deserialize, Serialize};
use shiftwatch_util::{default_data_dir, GuildId, DATABASE_FILENAME};
use std::path::PathBuf;
use std::time::Duration;

/// Default lifetime of the per-guild and global shift leaderboards and pilot stats
pub const DEFAULT_LEADERBOARD_TTL: Duration = Duration::from_secs(60 * 60);

/// Default lifetime of the server directory
pub const DEFAULT_SERVER_DIRECTORY_TTL: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Validated settings ready for use by the core engine
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceConfig,
    pub cache: CacheSettings,
    pub display: DisplaySettings,
    pub rollup: RollupSettings,
    pub guilds: Vec<GuildSettings>,

    /// Auto-end limit for guilds without their own. None disables auto-end.
    pub default_max_shift_length: Option<Duration>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let default_max_shift_length = raw
            .service
            .default_max_shift_hours
            .and_then(hours_to_duration_or_unlimited);

        let source = raw
            .rollup
            .source
            .as_deref()
            .and_then(parse_rollup_source)
            .unwrap_or_default();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            cache: CacheSettings::from_raw(raw.cache),
            display: DisplaySettings::from_raw(raw.display),
            rollup: RollupSettings {
                source,
                include_active: raw.rollup.include_active.unwrap_or(false),
            },
            guilds: raw.guilds.into_iter().map(GuildSettings::from_raw).collect(),
            default_max_shift_length,
        }
    }

    /// Get guild settings by ID
    pub fn guild(&self, id: &GuildId) -> Option<&GuildSettings> {
        self.guilds.iter().find(|g| &g.id == id)
    }

    /// Effective auto-end limit for a guild
    pub fn max_shift_length(&self, id: &GuildId) -> Option<Duration> {
        match self.guild(id) {
            Some(guild) => guild.max_shift_length,
            None => self.default_max_shift_length,
        }
    }

    /// Display name for a guild, falling back to its ID
    pub fn display_name(&self, id: &GuildId) -> String {
        self.guild(id)
            .and_then(|g| g.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            cache: CacheSettings::default(),
            display: DisplaySettings::default(),
            rollup: RollupSettings::default(),
            guilds: Vec::new(),
            default_max_shift_length: None,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILENAME)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Cache lifetimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub guild_leaderboard_ttl: Duration,
    pub global_leaderboard_ttl: Duration,
    pub pilot_stats_ttl: Duration,
    pub server_directory_ttl: Duration,
}

impl CacheSettings {
    fn from_raw(raw: RawCacheConfig) -> Self {
        let defaults = Self::default();
        Self {
            guild_leaderboard_ttl: raw
                .guild_leaderboard_ttl_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.guild_leaderboard_ttl),
            global_leaderboard_ttl: raw
                .global_leaderboard_ttl_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.global_leaderboard_ttl),
            pilot_stats_ttl: raw
                .pilot_stats_ttl_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.pilot_stats_ttl),
            server_directory_ttl: raw
                .server_directory_ttl_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.server_directory_ttl),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            guild_leaderboard_ttl: DEFAULT_LEADERBOARD_TTL,
            global_leaderboard_ttl: DEFAULT_LEADERBOARD_TTL,
            pilot_stats_ttl: DEFAULT_LEADERBOARD_TTL,
            server_directory_ttl: DEFAULT_SERVER_DIRECTORY_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    pub leaderboard_page_size: usize,
    pub pilot_page_size: usize,
    pub server_page_size: usize,
}

impl DisplaySettings {
    fn from_raw(raw: RawDisplayConfig) -> Self {
        Self {
            leaderboard_page_size: raw.leaderboard_page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            pilot_page_size: raw.pilot_page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            server_page_size: raw.server_page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            leaderboard_page_size: DEFAULT_PAGE_SIZE,
            pilot_page_size: DEFAULT_PAGE_SIZE,
            server_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Where per-guild totals come from when folding the global leaderboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupSource {
    /// Replay every member's event log
    #[default]
    Replay,
    /// Use the store's pre-aggregated per-user totals
    StoredTotals,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollupSettings {
    pub source: RollupSource,
    pub include_active: bool,
}

/// Validated guild settings
#[derive(Debug, Clone, PartialEq)]
pub struct GuildSettings {
    pub id: GuildId,
    pub name: Option<String>,
    /// None means shifts in this guild are never auto-ended
    pub max_shift_length: Option<Duration>,
}

impl GuildSettings {
    fn from_raw(raw: RawGuild) -> Self {
        Self {
            id: GuildId::new(raw.id),
            name: raw.name,
            max_shift_length: raw.max_shift_hours.and_then(hours_to_duration_or_unlimited),
        }
    }
}

/// Convert hours to Duration, treating 0 as "no limit"
fn hours_to_duration_or_unlimited(hours: f64) -> Option<Duration> {
    if hours <= 0.0 {
        None
    } else {
        Duration::try_from_secs_f64(hours * 3600.0).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_conversion() {
        assert_eq!(hours_to_duration_or_unlimited(0.0), None);
        assert_eq!(
            hours_to_duration_or_unlimited(1.5),
            Some(Duration::from_secs(5400))
        );
    }

    #[test]
    fn test_guild_limit_overrides_default() {
        let settings = Settings {
            guilds: vec![
                GuildSettings {
                    id: GuildId::new("a"),
                    name: Some("Alpha Wing".into()),
                    max_shift_length: Some(Duration::from_secs(3600)),
                },
                GuildSettings {
                    id: GuildId::new("b"),
                    name: None,
                    max_shift_length: None,
                },
            ],
            default_max_shift_length: Some(Duration::from_secs(7200)),
            ..Default::default()
        };

        assert_eq!(
            settings.max_shift_length(&GuildId::new("a")),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(settings.max_shift_length(&GuildId::new("b")), None);
        assert_eq!(
            settings.max_shift_length(&GuildId::new("c")),
            Some(Duration::from_secs(7200))
        );
        assert_eq!(settings.display_name(&GuildId::new("a")), "Alpha Wing");
        assert_eq!(settings.display_name(&GuildId::new("c")), "c");
    }
}
