//! Core error types

use shiftwatch_store::StoreError;
use shiftwatch_util::GuildId;
use thiserror::Error;

/// Why a shift command was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionRejection {
    #[error("a shift is already in progress")]
    AlreadyActive,

    #[error("the shift is already paused")]
    AlreadyPaused,

    #[error("the shift is not paused")]
    NotPaused,

    #[error("the shift has already ended")]
    AlreadyEnded,

    #[error("there is no active shift")]
    NoActiveShift,
}

/// Errors from shift commands
#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] TransitionRejection),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ShiftError {
    /// The rejection reason, if the command was refused rather than failed
    pub fn rejection(&self) -> Option<TransitionRejection> {
        match self {
            ShiftError::InvalidTransition(r) => Some(*r),
            ShiftError::StoreUnavailable(_) => None,
        }
    }
}

impl From<StoreError> for ShiftError {
    fn from(e: StoreError) -> Self {
        ShiftError::StoreUnavailable(e.to_string())
    }
}

pub type ShiftResult<T> = Result<T, ShiftError>;

/// Errors from building aggregates.
///
/// Failures of individual users or guilds are reported inside the aggregate;
/// only failures that leave nothing to aggregate end up here.
#[derive(Debug, Clone, Error)]
pub enum RollupError {
    #[error("Could not enumerate guilds: {0}")]
    GuildEnumeration(String),

    #[error("Could not list members of guild {guild_id}: {message}")]
    MemberEnumeration { guild_id: GuildId, message: String },

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for RollupError {
    fn from(e: StoreError) -> Self {
        RollupError::Store(e.to_string())
    }
}

pub type RollupResult<T> = Result<T, RollupError>;
