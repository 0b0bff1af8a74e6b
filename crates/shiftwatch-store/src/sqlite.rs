//! SQLite-based store implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use shiftwatch_api::{
    FlightTally, PurgeOutcome, ShiftEvent, ShiftTimeline, UserShiftLog, UserTotal,
};
use shiftwatch_util::{GuildId, ShiftId, UserId};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::{ShiftStore, StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Shift events (append-only apart from purges)
            CREATE TABLE IF NOT EXISTS shift_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                shift_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Total active time of completed shifts
            CREATE TABLE IF NOT EXISTS shift_totals (
                guild_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                total_ms INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (guild_id, user_id)
            );

            -- Guild membership, in first-seen order
            CREATE TABLE IF NOT EXISTS guild_members (
                guild_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                PRIMARY KEY (guild_id, user_id)
            );

            -- Logged flights
            CREATE TABLE IF NOT EXISTS flights (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                points INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_events_user ON shift_events(guild_id, user_id);
            CREATE INDEX IF NOT EXISTS idx_events_shift ON shift_events(guild_id, shift_id);
            CREATE INDEX IF NOT EXISTS idx_flights_guild ON flights(guild_id);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    /// Register a guild member without any shift or flight activity
    pub fn add_member(&self, guild: &GuildId, user: &UserId) -> StoreResult<()> {
        let conn = self.conn()?;
        insert_member(&conn, guild, user)?;
        Ok(())
    }

    /// Record one logged flight worth `points`
    pub fn record_flight(
        &self,
        guild: &GuildId,
        user: &UserId,
        points: u64,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO flights (guild_id, user_id, points, recorded_at) VALUES (?, ?, ?, ?)",
            params![guild.as_str(), user.as_str(), to_sql_int(points), at.to_rfc3339()],
        )?;
        insert_member(&tx, guild, user)?;
        tx.commit()?;

        debug!(guild_id = %guild, user_id = %user, points, "Flight recorded");
        Ok(())
    }
}

#[async_trait]
impl ShiftStore for SqliteStore {
    async fn load_shift_log(&self, guild: &GuildId, user: &UserId) -> StoreResult<UserShiftLog> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT event_json FROM shift_events WHERE guild_id = ? AND user_id = ? ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![guild.as_str(), user.as_str()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(serde_json::from_str(&row?)?);
        }

        let total_ms: Option<i64> = conn
            .query_row(
                "SELECT total_ms FROM shift_totals WHERE guild_id = ? AND user_id = ?",
                params![guild.as_str(), user.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(UserShiftLog::new(
            guild.clone(),
            user.clone(),
            events,
            from_millis(total_ms.unwrap_or(0)),
        ))
    }

    async fn append_shift_event(
        &self,
        guild: &GuildId,
        user: &UserId,
        event: &ShiftEvent,
    ) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut shift_events = load_shift_events(&tx, guild, Some(user), &event.shift_id)?;
        let was_completed =
            ShiftTimeline::from_events(&event.shift_id, &shift_events).is_completed();

        tx.execute(
            "INSERT INTO shift_events (guild_id, user_id, shift_id, timestamp, event_json) VALUES (?, ?, ?, ?, ?)",
            params![
                guild.as_str(),
                user.as_str(),
                event.shift_id.as_str(),
                event.timestamp.to_rfc3339(),
                serde_json::to_string(event)?,
            ],
        )?;
        insert_member(&tx, guild, user)?;

        if event.kind.is_end() && !was_completed {
            shift_events.push(event.clone());
            let timeline = ShiftTimeline::from_events(&event.shift_id, &shift_events);
            if timeline.is_completed() {
                let duration = timeline.active_duration(event.timestamp);
                tx.execute(
                    "INSERT INTO shift_totals (guild_id, user_id, total_ms) VALUES (?, ?, ?)
                     ON CONFLICT(guild_id, user_id) DO UPDATE SET total_ms = total_ms + excluded.total_ms",
                    params![guild.as_str(), user.as_str(), to_millis(duration)],
                )?;
            }
        }

        tx.commit()?;

        debug!(
            guild_id = %guild,
            user_id = %user,
            shift_id = %event.shift_id,
            kind = %event.kind,
            "Shift event appended"
        );
        Ok(())
    }

    async fn load_guild_shift_totals(&self, guild: &GuildId) -> StoreResult<Vec<UserTotal>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT user_id, total_ms FROM shift_totals WHERE guild_id = ? ORDER BY total_ms DESC, user_id",
        )?;
        let rows = stmt.query_map([guild.as_str()], |row| {
            let user_id: String = row.get(0)?;
            let total_ms: i64 = row.get(1)?;
            Ok((user_id, total_ms))
        })?;

        let mut totals = Vec::new();
        for row in rows {
            let (user_id, total_ms) = row?;
            totals.push(UserTotal::new(UserId::new(user_id), from_millis(total_ms)));
        }
        Ok(totals)
    }

    async fn shift_owner(&self, guild: &GuildId, shift_id: &ShiftId) -> StoreResult<Option<UserId>> {
        let conn = self.conn()?;

        let owner = conn
            .query_row(
                "SELECT user_id FROM shift_events WHERE guild_id = ? AND shift_id = ? ORDER BY seq LIMIT 1",
                params![guild.as_str(), shift_id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(owner.map(UserId::new))
    }

    async fn purge_shift(&self, guild: &GuildId, shift_id: &ShiftId) -> StoreResult<PurgeOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut stmt = tx.prepare(
            "SELECT user_id, event_json FROM shift_events WHERE guild_id = ? AND shift_id = ? ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![guild.as_str(), shift_id.as_str()], |row| {
            let user_id: String = row.get(0)?;
            let event_json: String = row.get(1)?;
            Ok((user_id, event_json))
        })?;

        let mut by_user: BTreeMap<String, Vec<ShiftEvent>> = BTreeMap::new();
        for row in rows {
            let (user_id, event_json) = row?;
            by_user
                .entry(user_id)
                .or_default()
                .push(serde_json::from_str(&event_json)?);
        }
        drop(stmt);

        for (user_id, events) in &by_user {
            let timeline = ShiftTimeline::from_events(shift_id, events);
            if let Some(ended_at) = timeline.ended_at {
                tx.execute(
                    "UPDATE shift_totals SET total_ms = MAX(total_ms - ?, 0) WHERE guild_id = ? AND user_id = ?",
                    params![
                        to_millis(timeline.active_duration(ended_at)),
                        guild.as_str(),
                        user_id
                    ],
                )?;
            }
        }

        let deleted = tx.execute(
            "DELETE FROM shift_events WHERE guild_id = ? AND shift_id = ?",
            params![guild.as_str(), shift_id.as_str()],
        )?;
        tx.commit()?;

        let outcome = PurgeOutcome {
            deleted_event_count: deleted,
            affected_user_count: by_user.len(),
        };
        info!(
            guild_id = %guild,
            shift_id = %shift_id,
            deleted = outcome.deleted_event_count,
            users = outcome.affected_user_count,
            "Shift purged"
        );
        Ok(outcome)
    }

    async fn list_known_guilds(&self) -> StoreResult<Vec<GuildId>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT DISTINCT guild_id FROM guild_members ORDER BY guild_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut guilds = Vec::new();
        for row in rows {
            guilds.push(GuildId::new(row?));
        }
        Ok(guilds)
    }

    async fn list_guild_members(&self, guild: &GuildId) -> StoreResult<Vec<UserId>> {
        let conn = self.conn()?;

        let mut stmt =
            conn.prepare("SELECT user_id FROM guild_members WHERE guild_id = ? ORDER BY rowid")?;
        let rows = stmt.query_map([guild.as_str()], |row| row.get::<_, String>(0))?;

        let mut members = Vec::new();
        for row in rows {
            members.push(UserId::new(row?));
        }
        Ok(members)
    }

    async fn load_guild_flights(&self, guild: &GuildId) -> StoreResult<Vec<FlightTally>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT user_id, SUM(points), COUNT(*) FROM flights WHERE guild_id = ?
             GROUP BY user_id ORDER BY MIN(id)",
        )?;
        let rows = stmt.query_map([guild.as_str()], |row| {
            let user_id: String = row.get(0)?;
            let points: i64 = row.get(1)?;
            let count: i64 = row.get(2)?;
            Ok((user_id, points, count))
        })?;

        let mut tallies = Vec::new();
        for row in rows {
            let (user_id, points, count) = row?;
            tallies.push(FlightTally {
                user_id: UserId::new(user_id),
                total_points: u64::try_from(points).unwrap_or(0),
                flights_logged: u64::try_from(count).unwrap_or(0),
            });
        }
        Ok(tallies)
    }

    async fn is_healthy(&self) -> bool {
        match self.conn() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => false,
        }
    }
}

fn insert_member(conn: &Connection, guild: &GuildId, user: &UserId) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO guild_members (guild_id, user_id, first_seen) VALUES (?, ?, ?)",
        params![guild.as_str(), user.as_str(), shiftwatch_util::now().to_rfc3339()],
    )?;
    Ok(())
}

fn load_shift_events(
    tx: &Transaction<'_>,
    guild: &GuildId,
    user: Option<&UserId>,
    shift_id: &ShiftId,
) -> StoreResult<Vec<ShiftEvent>> {
    let mut stmt = tx.prepare(
        "SELECT event_json FROM shift_events
         WHERE guild_id = ?1 AND shift_id = ?2 AND (?3 IS NULL OR user_id = ?3)
         ORDER BY seq",
    )?;
    let rows = stmt.query_map(
        params![guild.as_str(), shift_id.as_str(), user.map(|u| u.as_str())],
        |row| row.get::<_, String>(0),
    )?;

    let mut events = Vec::new();
    for row in rows {
        events.push(serde_json::from_str(&row?)?);
    }
    Ok(events)
}

fn to_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn from_millis(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
