//! In-memory store for testing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shiftwatch_api::{
    FlightTally, PurgeOutcome, ShiftEvent, ShiftTimeline, UserShiftLog, UserTotal,
};
use shiftwatch_util::{GuildId, ShiftId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::{ShiftStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct GuildData {
    members: Vec<UserId>,
    logs: HashMap<UserId, Vec<ShiftEvent>>,
    totals: HashMap<UserId, Duration>,
    flights: Vec<(UserId, u64, DateTime<Utc>)>,
}

impl GuildData {
    fn touch_member(&mut self, user: &UserId) {
        if !self.members.contains(user) {
            self.members.push(user.clone());
        }
    }
}

/// In-memory store for unit/integration testing.
///
/// Faults and latency are configured through the public fields and apply to
/// every subsequent call.
pub struct MemoryStore {
    guilds: Mutex<HashMap<GuildId, GuildData>>,
    load_calls: AtomicU64,

    /// Guilds whose member, flight and totals queries fail
    pub fail_guilds: Arc<Mutex<HashSet<GuildId>>>,

    /// Users whose log loads fail
    pub fail_users: Arc<Mutex<HashSet<UserId>>>,

    /// Make `list_known_guilds` fail
    pub fail_enumeration: Arc<Mutex<bool>>,

    /// Make every write fail
    pub fail_writes: Arc<Mutex<bool>>,

    /// Delay applied before every read, simulating a remote store
    pub latency: Arc<Mutex<Option<Duration>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            guilds: Mutex::new(HashMap::new()),
            load_calls: AtomicU64::new(0),
            fail_guilds: Arc::new(Mutex::new(HashSet::new())),
            fail_users: Arc::new(Mutex::new(HashSet::new())),
            fail_enumeration: Arc::new(Mutex::new(false)),
            fail_writes: Arc::new(Mutex::new(false)),
            latency: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        set(&self.latency, Some(latency));
        self
    }

    /// Register a guild member without any activity
    pub fn add_member(&self, guild: &GuildId, user: &UserId) {
        if let Ok(mut guilds) = self.guilds.lock() {
            guilds.entry(guild.clone()).or_default().touch_member(user);
        }
    }

    /// Record one logged flight worth `points`
    pub fn record_flight(&self, guild: &GuildId, user: &UserId, points: u64, at: DateTime<Utc>) {
        if let Ok(mut guilds) = self.guilds.lock() {
            let data = guilds.entry(guild.clone()).or_default();
            data.touch_member(user);
            data.flights.push((user.clone(), points, at));
        }
    }

    pub fn fail_guild(&self, guild: &GuildId) {
        if let Ok(mut set) = self.fail_guilds.lock() {
            set.insert(guild.clone());
        }
    }

    pub fn fail_user(&self, user: &UserId) {
        if let Ok(mut set) = self.fail_users.lock() {
            set.insert(user.clone());
        }
    }

    /// Remove every injected fault
    pub fn heal(&self) {
        if let Ok(mut set) = self.fail_guilds.lock() {
            set.clear();
        }
        if let Ok(mut set) = self.fail_users.lock() {
            set.clear();
        }
        set(&self.fail_enumeration, false);
        set(&self.fail_writes, false);
    }

    /// Number of read calls served so far (guild totals, flights, logs, members)
    pub fn load_calls(&self) -> u64 {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Number of events stored for a user
    pub fn event_count(&self, guild: &GuildId, user: &UserId) -> usize {
        self.guilds
            .lock()
            .ok()
            .and_then(|g| g.get(guild).and_then(|d| d.logs.get(user).map(Vec::len)))
            .unwrap_or(0)
    }

    fn data(&self) -> StoreResult<MutexGuard<'_, HashMap<GuildId, GuildData>>> {
        self.guilds
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    async fn read_delay(&self) {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency.lock().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_guild(&self, guild: &GuildId) -> StoreResult<()> {
        if contains(&self.fail_guilds, guild) {
            return Err(StoreError::Unavailable(format!("guild {} unreachable", guild)));
        }
        Ok(())
    }

    fn check_writes(&self) -> StoreResult<()> {
        if get(&self.fail_writes) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShiftStore for MemoryStore {
    async fn load_shift_log(&self, guild: &GuildId, user: &UserId) -> StoreResult<UserShiftLog> {
        self.read_delay().await;
        if contains(&self.fail_users, user) {
            return Err(StoreError::Unavailable(format!("log of {} unreachable", user)));
        }
        self.check_guild(guild)?;

        let guilds = self.data()?;
        let Some(data) = guilds.get(guild) else {
            return Ok(UserShiftLog::empty(guild.clone(), user.clone()));
        };
        Ok(UserShiftLog::new(
            guild.clone(),
            user.clone(),
            data.logs.get(user).cloned().unwrap_or_default(),
            data.totals.get(user).copied().unwrap_or_default(),
        ))
    }

    async fn append_shift_event(
        &self,
        guild: &GuildId,
        user: &UserId,
        event: &ShiftEvent,
    ) -> StoreResult<()> {
        self.check_writes()?;

        let mut guilds = self.data()?;
        let data = guilds.entry(guild.clone()).or_default();
        data.touch_member(user);

        let log = data.logs.entry(user.clone()).or_default();
        let was_completed = ShiftTimeline::from_events(&event.shift_id, log.iter()).is_completed();
        log.push(event.clone());

        if event.kind.is_end() && !was_completed {
            let timeline = ShiftTimeline::from_events(&event.shift_id, log.iter());
            if timeline.is_completed() {
                *data.totals.entry(user.clone()).or_default() +=
                    timeline.active_duration(event.timestamp);
            }
        }
        Ok(())
    }

    async fn load_guild_shift_totals(&self, guild: &GuildId) -> StoreResult<Vec<UserTotal>> {
        self.read_delay().await;
        self.check_guild(guild)?;

        let guilds = self.data()?;
        let Some(data) = guilds.get(guild) else {
            return Ok(Vec::new());
        };
        Ok(data
            .members
            .iter()
            .filter_map(|u| data.totals.get(u).map(|t| UserTotal::new(u.clone(), *t)))
            .collect())
    }

    async fn shift_owner(&self, guild: &GuildId, shift_id: &ShiftId) -> StoreResult<Option<UserId>> {
        self.read_delay().await;
        self.check_guild(guild)?;

        let guilds = self.data()?;
        Ok(guilds.get(guild).and_then(|data| {
            data.members
                .iter()
                .find(|user| {
                    data.logs
                        .get(*user)
                        .is_some_and(|log| log.iter().any(|e| &e.shift_id == shift_id))
                })
                .cloned()
        }))
    }

    async fn purge_shift(&self, guild: &GuildId, shift_id: &ShiftId) -> StoreResult<PurgeOutcome> {
        self.check_writes()?;

        let mut guilds = self.data()?;
        let Some(data) = guilds.get_mut(guild) else {
            return Ok(PurgeOutcome::default());
        };

        let mut outcome = PurgeOutcome::default();
        for (user, log) in data.logs.iter_mut() {
            let timeline = ShiftTimeline::from_events(shift_id, log.iter());
            if timeline.event_count == 0 {
                continue;
            }
            if let Some(ended_at) = timeline.ended_at {
                let total = data.totals.entry(user.clone()).or_default();
                *total = total.saturating_sub(timeline.active_duration(ended_at));
            }
            log.retain(|e| &e.shift_id != shift_id);
            outcome.deleted_event_count += timeline.event_count;
            outcome.affected_user_count += 1;
        }
        Ok(outcome)
    }

    async fn list_known_guilds(&self) -> StoreResult<Vec<GuildId>> {
        self.read_delay().await;
        if get(&self.fail_enumeration) {
            return Err(StoreError::Unavailable("guild list unreachable".into()));
        }

        let mut ids: Vec<GuildId> = self.data()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn list_guild_members(&self, guild: &GuildId) -> StoreResult<Vec<UserId>> {
        self.read_delay().await;
        self.check_guild(guild)?;

        Ok(self
            .data()?
            .get(guild)
            .map(|d| d.members.clone())
            .unwrap_or_default())
    }

    async fn load_guild_flights(&self, guild: &GuildId) -> StoreResult<Vec<FlightTally>> {
        self.read_delay().await;
        self.check_guild(guild)?;

        let guilds = self.data()?;
        let Some(data) = guilds.get(guild) else {
            return Ok(Vec::new());
        };

        let mut tallies: Vec<FlightTally> = Vec::new();
        for (user, points, _) in &data.flights {
            match tallies.iter_mut().find(|t| &t.user_id == user) {
                Some(tally) => {
                    tally.total_points += points;
                    tally.flights_logged += 1;
                }
                None => tallies.push(FlightTally {
                    user_id: user.clone(),
                    total_points: *points,
                    flights_logged: 1,
                }),
            }
        }
        Ok(tallies)
    }

    async fn is_healthy(&self) -> bool {
        self.guilds.lock().is_ok() && !get(&self.fail_enumeration)
    }
}

fn get(flag: &Arc<Mutex<bool>>) -> bool {
    flag.lock().map(|f| *f).unwrap_or(false)
}

fn set<T>(slot: &Arc<Mutex<T>>, value: T) {
    if let Ok(mut guard) = slot.lock() {
        *guard = value;
    }
}

fn contains<T: Eq + std::hash::Hash>(set: &Arc<Mutex<HashSet<T>>>, value: &T) -> bool {
    set.lock().map(|s| s.contains(value)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap() + chrono::Duration::minutes(m)
    }

    #[tokio::test]
    async fn test_totals_follow_end_and_purge() {
        let store = MemoryStore::new();
        let guild = GuildId::new("g");
        let user = UserId::new("u");
        let shift = ShiftId::new("s");

        store
            .append_shift_event(&guild, &user, &ShiftEvent::start(shift.clone(), at(0)))
            .await
            .unwrap();
        store
            .append_shift_event(&guild, &user, &ShiftEvent::end(shift.clone(), at(30), false))
            .await
            .unwrap();

        let totals = store.load_guild_shift_totals(&guild).await.unwrap();
        assert_eq!(totals[0].total, Duration::from_secs(1800));

        assert_eq!(store.shift_owner(&guild, &shift).await.unwrap(), Some(user.clone()));

        let outcome = store.purge_shift(&guild, &shift).await.unwrap();
        assert_eq!(outcome.deleted_event_count, 2);
        assert_eq!(outcome.affected_user_count, 1);
        assert!(store.purge_shift(&guild, &shift).await.unwrap().is_noop());
        assert_eq!(store.shift_owner(&guild, &shift).await.unwrap(), None);

        let log = store.load_shift_log(&guild, &user).await.unwrap();
        assert!(log.is_empty());
        assert_eq!(log.cached_total, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        let guild = GuildId::new("g");
        let user = UserId::new("u");
        store.add_member(&guild, &user);

        store.fail_guild(&guild);
        assert!(store.list_guild_members(&guild).await.is_err());

        store.fail_user(&user);
        assert!(store.load_shift_log(&guild, &user).await.is_err());

        store.heal();
        assert_eq!(store.list_guild_members(&guild).await.unwrap(), vec![user]);
        assert!(store.load_calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let store = MemoryStore::new().with_latency(Duration::from_secs(2));
        let before = tokio::time::Instant::now();
        store.list_known_guilds().await.unwrap();
        assert!(before.elapsed() >= Duration::from_secs(2));
    }
}
