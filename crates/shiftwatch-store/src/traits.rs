//! Store trait definitions

use async_trait::async_trait;
use shiftwatch_api::{FlightTally, PurgeOutcome, ShiftEvent, UserShiftLog, UserTotal};
use shiftwatch_util::{GuildId, ShiftId, UserId};

use crate::StoreResult;

/// Event log store shared by the engine and the rollup builder.
///
/// Implementations own persistence only. They never validate transitions;
/// an appended event is stored as given.
#[async_trait]
pub trait ShiftStore: Send + Sync {
    // Shift logs

    /// Full event log of one user in one guild, plus the stored total
    async fn load_shift_log(&self, guild: &GuildId, user: &UserId) -> StoreResult<UserShiftLog>;

    /// Append one event to a user's log
    async fn append_shift_event(
        &self,
        guild: &GuildId,
        user: &UserId,
        event: &ShiftEvent,
    ) -> StoreResult<()>;

    /// Pre-aggregated totals of completed shifts for every user in a guild
    async fn load_guild_shift_totals(&self, guild: &GuildId) -> StoreResult<Vec<UserTotal>>;

    /// User whose log holds events of `shift_id`, if any
    async fn shift_owner(&self, guild: &GuildId, shift_id: &ShiftId) -> StoreResult<Option<UserId>>;

    /// Delete every event of one shift and adjust the owner's stored total
    async fn purge_shift(&self, guild: &GuildId, shift_id: &ShiftId) -> StoreResult<PurgeOutcome>;

    // Enumeration

    /// Every guild the store holds data for
    async fn list_known_guilds(&self) -> StoreResult<Vec<GuildId>>;

    /// Members of a guild in the order they were first seen
    async fn list_guild_members(&self, guild: &GuildId) -> StoreResult<Vec<UserId>>;

    // Flights

    /// Per-pilot flight tallies for a guild
    async fn load_guild_flights(&self, guild: &GuildId) -> StoreResult<Vec<FlightTally>>;

    // Health

    /// Check if store is healthy
    async fn is_healthy(&self) -> bool;
}
