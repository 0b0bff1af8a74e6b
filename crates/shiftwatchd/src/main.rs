//! shiftwatchd - The shiftwatch command-line front end
//!
//! Every invocation wires together:
//! - Configuration loading
//! - Store initialization
//! - The shift engine and its leaderboards
//!
//! One-shot subcommands apply a single shift command or render a listing.
//! Their timers and cached leaderboards end with the process, so each read
//! is computed fresh from the store. `watch` stays in the foreground, owns
//! the auto-end timers and rescans the store for open shifts started by
//! other invocations.

mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shiftwatch_api::ShiftCommand;
use shiftwatch_config::{load_config, Settings};
use shiftwatch_core::{paginate, CoreEvent, ShiftEngine, ShiftError};
use shiftwatch_store::{ShiftStore, SqliteStore};
use shiftwatch_util::{default_config_path, is_mock_time_active, now, GuildId, ShiftId, UserId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// How often `watch` looks for open shifts without an auto-end timer
const AUTO_END_RESCAN_INTERVAL: Duration = Duration::from_secs(30);

/// shiftwatchd - Duty shift tracking for guild members
#[derive(Parser, Debug)]
#[command(name = "shiftwatchd")]
#[command(about = "Duty shift tracking for guild members", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/shiftwatch/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set SHIFTWATCH_DATA_DIR env var)
    #[arg(short, long, env = "SHIFTWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a shift
    Start {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
    },
    /// Pause the current shift
    Pause {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
    },
    /// Resume a paused shift
    Resume {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
    },
    /// End the current shift
    End {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
    },
    /// Show a member's current shift status
    Status {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
    },
    /// Delete every event of one shift
    Purge {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        shift: String,
    },
    /// Shift leaderboard for one server
    Leaderboard {
        #[arg(long)]
        guild: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Shift leaderboard across every server
    Global {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Flight leaderboard across every server
    Pilots {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// One pilot's flight statistics
    Pilot {
        #[arg(long)]
        user: String,
    },
    /// Known servers by member count
    Servers {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Open shifts in one server
    Active {
        #[arg(long)]
        guild: String,
    },
    /// A member's shift statistics
    Me {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
    },
    /// Record a logged flight
    LogFlight {
        #[arg(long)]
        guild: String,
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 1)]
        points: u64,
    },
    /// Run auto-end timers in the foreground, rescanning for new shifts, until signalled
    Watch,
}

/// Main service state
struct Service {
    engine: ShiftEngine,
    store: Arc<SqliteStore>,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let mut settings = if args.config.exists() {
            let settings = load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?;
            info!(
                config_path = %args.config.display(),
                guild_count = settings.guilds.len(),
                "Configuration loaded"
            );
            settings
        } else {
            warn!(config_path = %args.config.display(), "Config file not found, using defaults");
            Settings::default()
        };

        if let Some(data_dir) = &args.data_dir {
            settings.service.data_dir = data_dir.clone();
        }

        let db_path = settings.service.database_path();
        let store = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        info!(db_path = %db_path.display(), "Store initialized");

        let shared: Arc<dyn ShiftStore> = store.clone();
        let engine = ShiftEngine::new(settings, shared);

        Ok(Self { engine, store })
    }

    async fn run(self, command: Command) -> Result<()> {
        match command {
            Command::Start { guild, user } => self.shift(guild, user, ShiftCommand::Start).await,
            Command::Pause { guild, user } => self.shift(guild, user, ShiftCommand::Pause).await,
            Command::Resume { guild, user } => self.shift(guild, user, ShiftCommand::Resume).await,
            Command::End { guild, user } => self.shift(guild, user, ShiftCommand::End).await,
            Command::Status { guild, user } => {
                let report = self
                    .engine
                    .status(&GuildId::new(guild), &UserId::new(user), now())
                    .await?;
                println!("{}", render::report(&report));
                Ok(())
            }
            Command::Purge { guild, shift } => {
                let outcome = self
                    .engine
                    .purge_shift(&GuildId::new(guild), &ShiftId::new(shift.clone()))
                    .await?;
                if outcome.is_noop() {
                    println!("No events found for shift {}", shift);
                } else {
                    println!(
                        "Purged {} events of shift {}",
                        outcome.deleted_event_count, shift
                    );
                }
                Ok(())
            }
            Command::Leaderboard { guild, page } => {
                let guild = GuildId::new(guild);
                let board = self.engine.leaderboards().guild_leaderboard(&guild, now()).await?;
                let size = self.engine.settings().display.leaderboard_page_size;
                let title = format!("{} shift leaderboard", self.engine.settings().display_name(&guild));
                println!("{}", render::shift_leaderboard(&title, &paginate(&board.entries, size, page)));
                Ok(())
            }
            Command::Global { page } => {
                let board = self.engine.leaderboards().global_leaderboard(now()).await?;
                let size = self.engine.settings().display.leaderboard_page_size;
                println!(
                    "{}",
                    render::shift_leaderboard("Global shift leaderboard", &paginate(&board.entries, size, page))
                );
                if let Some(note) = render::coverage_note(&board.coverage) {
                    println!("{}", note);
                }
                Ok(())
            }
            Command::Pilots { page } => {
                let board = self.engine.leaderboards().pilot_stats().await?;
                let size = self.engine.settings().display.pilot_page_size;
                println!("{}", render::pilot_board(&paginate(&board.pilots, size, page)));
                if let Some(note) = render::coverage_note(&board.coverage) {
                    println!("{}", note);
                }
                Ok(())
            }
            Command::Pilot { user } => {
                let user = UserId::new(user);
                match self.engine.leaderboards().pilot(&user).await? {
                    Some(stats) => println!("{}", render::pilot(&stats)),
                    None => println!("No flight data found for {}.", user),
                }
                Ok(())
            }
            Command::Servers { page } => {
                let servers = self.engine.leaderboards().server_directory().await?;
                let size = self.engine.settings().display.server_page_size;
                println!("{}", render::servers(&paginate(servers.as_slice(), size, page)));
                Ok(())
            }
            Command::Active { guild } => {
                let at = now();
                let rows = self
                    .engine
                    .leaderboards()
                    .active_shifts(&GuildId::new(guild), at)
                    .await?;
                println!("{}", render::active_shifts(&rows, at));
                Ok(())
            }
            Command::Me { guild, user } => {
                let summary = self
                    .engine
                    .leaderboards()
                    .user_shift_summary(&GuildId::new(guild), &UserId::new(user), now())
                    .await?;
                println!("{}", render::summary(&summary));
                Ok(())
            }
            Command::LogFlight { guild, user, points } => {
                let guild = GuildId::new(guild);
                self.store
                    .record_flight(&guild, &UserId::new(user.clone()), points, now())
                    .context("Failed to record flight")?;
                println!("Logged flight for {} ({} points)", user, points);
                Ok(())
            }
            Command::Watch => self.watch().await,
        }
    }

    async fn shift(&self, guild: String, user: String, command: ShiftCommand) -> Result<()> {
        let guild = GuildId::new(guild);
        let user = UserId::new(user);

        match self.engine.apply(&guild, &user, command, now()).await {
            Ok(outcome) => {
                println!("{}", render::outcome(command, &outcome));
                Ok(())
            }
            Err(ShiftError::InvalidTransition(rejection)) => {
                debug!(guild_id = %guild, user_id = %user, %command, ?rejection, "Command refused");
                println!("{}", render::rejection_message(rejection));
                Ok(())
            }
            Err(e) => Err(e).context("Shift command failed"),
        }
    }

    async fn watch(self) -> Result<()> {
        let mut events = self.engine.subscribe();

        let armed = self
            .engine
            .recover_auto_ends(now())
            .await
            .context("Failed to recover auto-end timers")?;
        info!(armed, "Watching for auto-ends");

        // Set up signal handlers
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        let mut rescan = interval_at(
            Instant::now() + AUTO_END_RESCAN_INTERVAL,
            AUTO_END_RESCAN_INTERVAL,
        );
        rescan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, rescanning open shifts");
                    self.rescan_auto_ends().await;
                }
                _ = rescan.tick() => {
                    self.rescan_auto_ends().await;
                }
                event = events.recv() => match event {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!(pending = self.engine.scheduler().armed_count(), "Shutdown complete");
        Ok(())
    }

    async fn rescan_auto_ends(&self) {
        match self.engine.recover_auto_ends(now()).await {
            Ok(0) => {}
            Ok(armed) => info!(armed, "Armed auto-ends for new shifts"),
            Err(e) => warn!(error = %e, "Auto-end rescan failed"),
        }
    }
}

fn log_event(event: &CoreEvent) {
    match event {
        CoreEvent::ShiftStarted { guild_id, user_id, shift_id, auto_end_at, .. } => {
            info!(%guild_id, %user_id, %shift_id, ?auto_end_at, "Shift started");
        }
        CoreEvent::ShiftPaused { guild_id, user_id, shift_id, .. } => {
            info!(%guild_id, %user_id, %shift_id, "Shift paused");
        }
        CoreEvent::ShiftResumed { guild_id, user_id, shift_id, .. } => {
            info!(%guild_id, %user_id, %shift_id, "Shift resumed");
        }
        CoreEvent::ShiftEnded { guild_id, user_id, shift_id, auto_ended, duration, .. } => {
            info!(
                %guild_id,
                %user_id,
                %shift_id,
                auto_ended,
                duration_secs = duration.as_secs(),
                "Shift ended"
            );
        }
        CoreEvent::ShiftPurged { guild_id, shift_id, outcome } => {
            info!(
                %guild_id,
                %shift_id,
                deleted = outcome.deleted_event_count,
                "Shift purged"
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let logger = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        logger.json().init();
    } else {
        logger.init();
    }

    debug!(version = env!("CARGO_PKG_VERSION"), "shiftwatchd starting");
    if is_mock_time_active() {
        warn!(now = %now(), "Mock time is active");
    }

    let service = Service::new(&args)?;
    service.run(args.command).await
}
