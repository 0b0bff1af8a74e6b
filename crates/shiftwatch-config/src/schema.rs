//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: RawCacheConfig,

    /// Page sizes for listings
    #[serde(default)]
    pub display: RawDisplayConfig,

    /// How aggregates are built
    #[serde(default)]
    pub rollup: RawRollupConfig,

    /// Per-guild settings
    #[serde(default)]
    pub guilds: Vec<RawGuild>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the SQLite store
    pub data_dir: Option<PathBuf>,

    /// Maximum shift length applied to guilds that do not set their own
    pub default_max_shift_hours: Option<f64>,
}

/// Cache time-to-live settings, in seconds
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCacheConfig {
    pub guild_leaderboard_ttl_seconds: Option<u64>,
    pub global_leaderboard_ttl_seconds: Option<u64>,
    pub pilot_stats_ttl_seconds: Option<u64>,
    pub server_directory_ttl_seconds: Option<u64>,
}

/// Listing page sizes
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDisplayConfig {
    pub leaderboard_page_size: Option<usize>,
    pub pilot_page_size: Option<usize>,
    pub server_page_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRollupConfig {
    /// "replay" (recompute from event logs) or "totals" (stored per-user totals)
    pub source: Option<String>,

    /// Count in-progress shifts in guild leaderboards
    pub include_active: Option<bool>,
}

/// Raw guild definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawGuild {
    /// Platform guild ID
    pub id: String,

    /// Display name for the server directory
    pub name: Option<String>,

    /// Shifts are auto-ended after this many hours. 0 disables auto-end.
    pub max_shift_hours: Option<f64>,
}
