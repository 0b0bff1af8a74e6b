//! Configuration validation

use crate::schema::{RawConfig, RawGuild};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Guild '{guild_id}': {message}")]
    GuildError { guild_id: String, message: String },

    #[error("Duplicate guild ID: {0}")]
    DuplicateGuildId(String),

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("Unknown rollup source '{0}' (expected \"replay\" or \"totals\")")]
    UnknownRollupSource(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen_ids = HashSet::new();
    for guild in &config.guilds {
        if !seen_ids.insert(&guild.id) {
            errors.push(ValidationError::DuplicateGuildId(guild.id.clone()));
        }
    }

    for guild in &config.guilds {
        errors.extend(validate_guild(guild));
    }

    if let Some(hours) = config.service.default_max_shift_hours
        && let Err(message) = check_hours(hours)
    {
        errors.push(ValidationError::GlobalError(format!(
            "default_max_shift_hours {}",
            message
        )));
    }

    let cache = &config.cache;
    for (field, value) in [
        ("cache.guild_leaderboard_ttl_seconds", cache.guild_leaderboard_ttl_seconds),
        ("cache.global_leaderboard_ttl_seconds", cache.global_leaderboard_ttl_seconds),
        ("cache.pilot_stats_ttl_seconds", cache.pilot_stats_ttl_seconds),
        ("cache.server_directory_ttl_seconds", cache.server_directory_ttl_seconds),
    ] {
        if value == Some(0) {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    let display = &config.display;
    for (field, value) in [
        ("display.leaderboard_page_size", display.leaderboard_page_size),
        ("display.pilot_page_size", display.pilot_page_size),
        ("display.server_page_size", display.server_page_size),
    ] {
        if value == Some(0) {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    if let Some(source) = &config.rollup.source
        && parse_rollup_source(source).is_none()
    {
        errors.push(ValidationError::UnknownRollupSource(source.clone()));
    }

    errors
}

fn validate_guild(guild: &RawGuild) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if guild.id.trim().is_empty() {
        errors.push(ValidationError::GuildError {
            guild_id: guild.id.clone(),
            message: "id cannot be empty".into(),
        });
    }

    if let Some(name) = &guild.name
        && name.trim().is_empty()
    {
        errors.push(ValidationError::GuildError {
            guild_id: guild.id.clone(),
            message: "name cannot be blank".into(),
        });
    }

    if let Some(hours) = guild.max_shift_hours
        && let Err(message) = check_hours(hours)
    {
        errors.push(ValidationError::GuildError {
            guild_id: guild.id.clone(),
            message: format!("max_shift_hours {}", message),
        });
    }

    errors
}

fn check_hours(hours: f64) -> Result<(), String> {
    if !hours.is_finite() {
        return Err("must be a finite number".into());
    }
    if hours < 0.0 {
        return Err(format!("cannot be negative (got {})", hours));
    }
    Ok(())
}

/// Parse a rollup source name
pub fn parse_rollup_source(s: &str) -> Option<crate::RollupSource> {
    match s.trim().to_lowercase().as_str() {
        "replay" => Some(crate::RollupSource::Replay),
        "totals" | "stored" => Some(crate::RollupSource::StoredTotals),
        _ => None,
    }
}
