//! Integration tests for shiftwatchd
//!
//! These tests drive the engine against a real SQLite store end to end.

use chrono::{DateTime, TimeZone, Utc};
use shiftwatch_api::{ShiftEventKind, ShiftStatus};
use shiftwatch_config::{parse_config, GuildSettings, RollupSource, Settings};
use shiftwatch_core::{paginate, CoreEvent, ShiftEngine, TransitionRejection};
use shiftwatch_store::{ShiftStore, SqliteStore};
use shiftwatch_util::{GuildId, UserId};
use std::sync::Arc;
use std::time::Duration;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
}

fn at(m: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::minutes(m)
}

fn mins(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

fn make_settings() -> Settings {
    Settings {
        guilds: vec![GuildSettings {
            id: GuildId::new("alpha"),
            name: Some("Alpha Squadron".into()),
            max_shift_length: Some(Duration::from_secs(2 * 3600)),
        }],
        ..Default::default()
    }
}

fn make_engine(settings: Settings) -> (ShiftEngine, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = ShiftEngine::new(settings, store.clone());
    (engine, store)
}

#[test]
fn test_config_loading() {
    let settings = parse_config(
        r#"
config_version = 1

[rollup]
source = "totals"

[[guilds]]
id = "alpha"
name = "Alpha Squadron"
max_shift_hours = 2.0
"#,
    )
    .unwrap();

    assert_eq!(settings.rollup.source, RollupSource::StoredTotals);
    assert_eq!(
        settings.max_shift_length(&GuildId::new("alpha")),
        Some(Duration::from_secs(7200))
    );
    assert_eq!(settings.display_name(&GuildId::new("alpha")), "Alpha Squadron");
}

#[tokio::test]
async fn test_shift_lifecycle_persists() {
    let (engine, store) = make_engine(Settings::default());
    let guild = GuildId::new("alpha");
    let user = UserId::new("maverick");

    let started = engine.start_shift(&guild, &user, at(0)).await.unwrap();
    engine.pause_shift(&guild, &user, at(20)).await.unwrap();
    engine.resume_shift(&guild, &user, at(30)).await.unwrap();
    let ended = engine.end_shift(&guild, &user, at(90)).await.unwrap();

    assert_eq!(ended.shift_id, started.shift_id);
    assert_eq!(ended.active_duration, mins(80));

    let log = store.load_shift_log(&guild, &user).await.unwrap();
    assert_eq!(log.events.len(), 4);
    assert!(matches!(log.status(), ShiftStatus::Ended { auto_ended: false, .. }));

    let totals = store.load_guild_shift_totals(&guild).await.unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].total, mins(80));
}

#[tokio::test]
async fn test_invalid_commands_are_refused() {
    let (engine, store) = make_engine(Settings::default());
    let guild = GuildId::new("alpha");
    let user = UserId::new("goose");

    let err = engine.pause_shift(&guild, &user, at(0)).await.unwrap_err();
    assert_eq!(err.rejection(), Some(TransitionRejection::NoActiveShift));

    engine.start_shift(&guild, &user, at(0)).await.unwrap();
    let err = engine.start_shift(&guild, &user, at(1)).await.unwrap_err();
    assert_eq!(err.rejection(), Some(TransitionRejection::AlreadyActive));

    let err = engine.resume_shift(&guild, &user, at(2)).await.unwrap_err();
    assert_eq!(err.rejection(), Some(TransitionRejection::NotPaused));

    let log = store.load_shift_log(&guild, &user).await.unwrap();
    assert_eq!(log.events.len(), 1);
}

#[tokio::test]
async fn test_leaderboard_ranks_and_paginates() {
    let (engine, _store) = make_engine(Settings::default());
    let guild = GuildId::new("alpha");

    for i in 0..12u64 {
        let user = UserId::new(format!("pilot{:02}", i));
        engine.start_shift(&guild, &user, at(0)).await.unwrap();
        engine
            .end_shift(&guild, &user, at(10 * (i as i64 + 1)))
            .await
            .unwrap();
    }

    let board = engine
        .leaderboards()
        .guild_leaderboard(&guild, at(200))
        .await
        .unwrap();
    assert_eq!(board.entries.len(), 12);
    assert_eq!(board.entries[0].user_id, UserId::new("pilot11"));
    assert_eq!(board.entries[0].total, mins(120));

    let page = paginate(&board.entries, 10, 2);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.footer(), "Page 2/2");
    let ranks: Vec<usize> = page.ranked().map(|(rank, _)| rank).collect();
    assert_eq!(ranks, vec![11, 12]);
}

#[tokio::test]
async fn test_global_leaderboard_sums_across_guilds() {
    let (engine, _store) = make_engine(Settings::default());
    let alpha = GuildId::new("alpha");
    let bravo = GuildId::new("bravo");
    let user = UserId::new("iceman");

    engine.start_shift(&alpha, &user, at(0)).await.unwrap();
    engine.end_shift(&alpha, &user, at(30)).await.unwrap();
    engine.start_shift(&bravo, &user, at(40)).await.unwrap();
    engine.end_shift(&bravo, &user, at(85)).await.unwrap();

    let board = engine.leaderboards().global_leaderboard(at(100)).await.unwrap();
    assert_eq!(board.entries.len(), 1);
    assert_eq!(board.entries[0].total, mins(75));
    assert_eq!(board.coverage.attempted, 2);
    assert!(board.coverage.is_complete());
}

#[tokio::test]
async fn test_purge_removes_shift_from_leaderboard() {
    let (engine, store) = make_engine(Settings::default());
    let guild = GuildId::new("alpha");
    let user = UserId::new("viper");

    let first = engine.start_shift(&guild, &user, at(0)).await.unwrap();
    engine.end_shift(&guild, &user, at(60)).await.unwrap();
    engine.start_shift(&guild, &user, at(70)).await.unwrap();
    engine.end_shift(&guild, &user, at(100)).await.unwrap();

    let board = engine
        .leaderboards()
        .guild_leaderboard(&guild, at(120))
        .await
        .unwrap();
    assert_eq!(board.total_of(&user), mins(90));

    let outcome = engine.purge_shift(&guild, &first.shift_id).await.unwrap();
    assert_eq!(outcome.deleted_event_count, 2);
    assert_eq!(outcome.affected_user_count, 1);

    let board = engine
        .leaderboards()
        .guild_leaderboard(&guild, at(120))
        .await
        .unwrap();
    assert_eq!(board.total_of(&user), mins(30));

    let log = store.load_shift_log(&guild, &user).await.unwrap();
    assert_eq!(log.events.len(), 2);
}

#[tokio::test]
async fn test_pilot_stats_and_server_directory() {
    let (engine, store) = make_engine(make_settings());
    let alpha = GuildId::new("alpha");
    let bravo = GuildId::new("bravo");

    store.record_flight(&alpha, &UserId::new("rooster"), 3, at(0)).unwrap();
    store.record_flight(&bravo, &UserId::new("rooster"), 2, at(5)).unwrap();
    store.record_flight(&bravo, &UserId::new("hangman"), 4, at(6)).unwrap();
    store.add_member(&bravo, &UserId::new("phoenix")).unwrap();

    let rooster = engine
        .leaderboards()
        .pilot(&UserId::new("rooster"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rooster.total_flights, 5);
    assert_eq!(rooster.global_rank, 1);
    assert_eq!(rooster.total_pilots, 2);

    let servers = engine.leaderboards().server_directory().await.unwrap();
    assert_eq!(servers[0].guild_id, bravo);
    assert_eq!(servers[0].member_count, 3);
    assert_eq!(servers[1].name, "Alpha Squadron");
}

#[tokio::test(start_paused = true)]
async fn test_auto_end_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("shiftwatch.db")).unwrap());
    let engine = ShiftEngine::new(make_settings(), store.clone());
    let mut events = engine.subscribe();

    let guild = GuildId::new("alpha");
    let user = UserId::new("bob");

    let started = engine.start_shift(&guild, &user, t0()).await.unwrap();
    assert_eq!(started.auto_end_at, Some(at(120)));

    tokio::time::sleep(mins(121)).await;

    let log = store.load_shift_log(&guild, &user).await.unwrap();
    let last = log.events.last().unwrap();
    assert_eq!(last.kind, ShiftEventKind::End { auto_ended: true });
    assert_eq!(last.timestamp, at(120));

    assert!(matches!(events.recv().await, Ok(CoreEvent::ShiftStarted { .. })));
    assert!(matches!(
        events.recv().await,
        Ok(CoreEvent::ShiftEnded { auto_ended: true, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_restart_recovers_open_shifts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shiftwatch.db");
    let guild = GuildId::new("alpha");
    let user = UserId::new("payback");

    let shift_id = {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let engine = ShiftEngine::new(make_settings(), store);
        engine.start_shift(&guild, &user, t0()).await.unwrap().shift_id
    };

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let engine = ShiftEngine::new(make_settings(), store.clone());
    assert_eq!(engine.recover_auto_ends(at(30)).await.unwrap(), 1);
    assert!(engine.scheduler().is_armed(&shift_id));

    tokio::time::sleep(mins(91)).await;

    let log = store.load_shift_log(&guild, &user).await.unwrap();
    assert!(matches!(log.status(), ShiftStatus::Ended { auto_ended: true, .. }));
    assert_eq!(log.active_duration(&shift_id, at(500)), mins(120));
}

#[tokio::test(start_paused = true)]
async fn test_watcher_picks_up_shift_started_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shiftwatch.db");
    let guild = GuildId::new("alpha");
    let user = UserId::new("hondo");

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let watcher = ShiftEngine::new(make_settings(), store.clone());
    let mut events = watcher.subscribe();
    assert_eq!(watcher.recover_auto_ends(t0()).await.unwrap(), 0);

    // A one-shot invocation starts the shift and exits
    let shift_id = {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let engine = ShiftEngine::new(make_settings(), store);
        engine.start_shift(&guild, &user, t0()).await.unwrap().shift_id
    };
    assert!(!watcher.scheduler().is_armed(&shift_id));

    assert_eq!(watcher.recover_auto_ends(at(1)).await.unwrap(), 1);
    assert_eq!(watcher.recover_auto_ends(at(2)).await.unwrap(), 0);

    tokio::time::sleep(mins(120)).await;

    let log = store.load_shift_log(&guild, &user).await.unwrap();
    let last = log.events.last().unwrap();
    assert_eq!(last.kind, ShiftEventKind::End { auto_ended: true });
    assert_eq!(last.timestamp, at(120));
    assert!(matches!(
        events.recv().await,
        Ok(CoreEvent::ShiftEnded { auto_ended: true, .. })
    ));
}

#[tokio::test]
async fn test_leaderboard_is_cached_until_invalidated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shiftwatch.db");
    let guild = GuildId::new("alpha");

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let reader = ShiftEngine::new(Settings::default(), store);
    let writer = ShiftEngine::new(
        Settings::default(),
        Arc::new(SqliteStore::open(&path).unwrap()),
    );

    let user = UserId::new("fanboy");
    writer.start_shift(&guild, &user, at(0)).await.unwrap();
    writer.end_shift(&guild, &user, at(45)).await.unwrap();

    let first = reader.leaderboards().guild_leaderboard(&guild, at(60)).await.unwrap();
    assert_eq!(first.total_of(&user), mins(45));

    writer.start_shift(&guild, &user, at(70)).await.unwrap();
    writer.end_shift(&guild, &user, at(80)).await.unwrap();

    let cached = reader.leaderboards().guild_leaderboard(&guild, at(90)).await.unwrap();
    assert!(Arc::ptr_eq(&first, &cached));
    assert_eq!(cached.total_of(&user), mins(45));

    reader.leaderboards().invalidate_guild(&guild);
    let fresh = reader.leaderboards().guild_leaderboard(&guild, at(90)).await.unwrap();
    assert_eq!(fresh.total_of(&user), mins(55));
}
