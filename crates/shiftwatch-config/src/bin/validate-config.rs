//! Config validation CLI tool
//!
//! Validates a shiftwatch configuration file and reports any errors.

use shiftwatch_util::{default_config_path, format_hms, format_hours};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a shiftwatch configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config ./shiftwatch.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match shiftwatch_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", shiftwatch_config::CURRENT_CONFIG_VERSION);
            println!("  Database: {}", settings.service.database_path().display());
            println!("  Rollup source: {:?}", settings.rollup.source);
            println!(
                "  Cache TTLs: guild {}, global {}, pilots {}, servers {}",
                format_hms(settings.cache.guild_leaderboard_ttl),
                format_hms(settings.cache.global_leaderboard_ttl),
                format_hms(settings.cache.pilot_stats_ttl),
                format_hms(settings.cache.server_directory_ttl),
            );
            println!("  Guilds: {}", settings.guilds.len());

            if !settings.guilds.is_empty() {
                println!();
                println!("Guilds:");
                for guild in &settings.guilds {
                    let limit = match guild.max_shift_length {
                        Some(max) => format!("auto-end after {} h", format_hours(max)),
                        None => "no auto-end".to_string(),
                    };
                    println!(
                        "  - {} [{}]: {}",
                        guild.id,
                        limit,
                        guild.name.as_deref().unwrap_or("(unnamed)")
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                shiftwatch_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                shiftwatch_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                shiftwatch_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                shiftwatch_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        shiftwatch_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
