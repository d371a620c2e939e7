//! Floor operation error types.
//!
//! Every failure a component can report is a variant of [`FloorError`]. Each
//! variant carries a machine-readable [`ErrorCode`] and belongs to exactly one
//! [`ErrorCategory`], which the HTTP layer maps to a status code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;
use crate::venue::Feature;

/// Machine-readable error code returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    VenueDisabled,
    TableUnavailable,
    InvalidTransition,
    GameClosed,
    SeatOccupied,
    SeatEmpty,
    AlreadyLinked,
    Incompatible,
    ChainError,
    NotLinked,
    EmptyQueue,
    NotCalled,
    CallWindowOpen,
    EntryClosed,
    RegistrationClosed,
    AlreadyRegistered,
    TournamentFull,
    TournamentStarted,
    NotRegistered,
    RebuyNotAllowed,
    AddonNotAllowed,
    SelfExcluded,
    LimitExceeded,
    InsufficientBalance,
    BalanceFrozen,
    InsufficientRole,
    Unauthenticated,
    InternalError,
}

/// Error taxonomy; decides how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    StateConflict,
    Authorization,
    Compliance,
    Resource,
    Internal,
}

/// Floor operation errors
#[derive(Debug, Error)]
pub enum FloorError {
    /// Missing or malformed input; nothing was written.
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Venue {venue_id} has not enabled {feature}")]
    VenueDisabled { venue_id: i64, feature: Feature },

    #[error("Table {table_id} is already in use")]
    TableUnavailable { table_id: i64 },

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Game {game_id} is closed")]
    GameClosed { game_id: i64 },

    #[error("Seat {seat_number} in game {game_id} is occupied")]
    SeatOccupied { game_id: i64, seat_number: i32 },

    #[error("Seat {seat_number} in game {game_id} is empty")]
    SeatEmpty { game_id: i64, seat_number: i32 },

    #[error("Game {game_id} already must-moves to game {target}")]
    AlreadyLinked { game_id: i64, target: i64 },

    #[error("Games cannot be linked: {0}")]
    Incompatible(String),

    #[error("Linking game {game_id} would chain must-move games")]
    ChainError { game_id: i64 },

    #[error("Game {game_id} has no must-move link")]
    NotLinked { game_id: i64 },

    #[error("No players waiting for {game_type} {stakes}")]
    EmptyQueue { game_type: String, stakes: String },

    #[error("Waitlist entry {entry_id} has not been called")]
    NotCalled { entry_id: i64 },

    #[error("Waitlist entry {entry_id} is still inside its call window ({remaining_secs}s left)")]
    CallWindowOpen { entry_id: i64, remaining_secs: i64 },

    #[error("Waitlist entry {entry_id} is {status}")]
    EntryClosed { entry_id: i64, status: String },

    #[error("Registration is closed for tournament {tournament_id} ({status})")]
    RegistrationClosed { tournament_id: i64, status: String },

    #[error("Player {player_id} is already registered")]
    AlreadyRegistered { player_id: i64 },

    #[error("Tournament is full ({max_entries} entries)")]
    TournamentFull { max_entries: i32 },

    #[error("Tournament {tournament_id} has already started")]
    TournamentStarted { tournament_id: i64 },

    #[error("Player {player_id} is not registered")]
    NotRegistered { player_id: i64 },

    #[error("Rebuy not allowed: {0}")]
    RebuyNotAllowed(String),

    #[error("Add-on not allowed: {0}")]
    AddonNotAllowed(String),

    #[error("Player is self-excluded ({exclusion_type}, {})", describe_expiry(.expires_at))]
    SelfExcluded {
        exclusion_type: String,
        expires_at: Option<DateTime<Utc>>,
    },

    #[error(
        "Daily spending limit exceeded: spent {current_spend}, requested {requested}, limit {limit}"
    )]
    LimitExceeded {
        current_spend: i64,
        requested: i64,
        limit: i64,
    },

    #[error("Insufficient comp balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("Comp balance is frozen")]
    BalanceFrozen,

    #[error("Requires role {required}, caller is {actual}")]
    InsufficientRole { required: Role, actual: Role },

    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_expiry(expires_at: &Option<DateTime<Utc>>) -> String {
    match expires_at {
        Some(at) => format!("until {}", at.to_rfc3339()),
        None => "no expiry".to_string(),
    }
}

impl FloorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FloorError::Validation(_) => ErrorCode::ValidationError,
            FloorError::NotFound { .. } => ErrorCode::NotFound,
            FloorError::VenueDisabled { .. } => ErrorCode::VenueDisabled,
            FloorError::TableUnavailable { .. } => ErrorCode::TableUnavailable,
            FloorError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            FloorError::GameClosed { .. } => ErrorCode::GameClosed,
            FloorError::SeatOccupied { .. } => ErrorCode::SeatOccupied,
            FloorError::SeatEmpty { .. } => ErrorCode::SeatEmpty,
            FloorError::AlreadyLinked { .. } => ErrorCode::AlreadyLinked,
            FloorError::Incompatible(_) => ErrorCode::Incompatible,
            FloorError::ChainError { .. } => ErrorCode::ChainError,
            FloorError::NotLinked { .. } => ErrorCode::NotLinked,
            FloorError::EmptyQueue { .. } => ErrorCode::EmptyQueue,
            FloorError::NotCalled { .. } => ErrorCode::NotCalled,
            FloorError::CallWindowOpen { .. } => ErrorCode::CallWindowOpen,
            FloorError::EntryClosed { .. } => ErrorCode::EntryClosed,
            FloorError::RegistrationClosed { .. } => ErrorCode::RegistrationClosed,
            FloorError::AlreadyRegistered { .. } => ErrorCode::AlreadyRegistered,
            FloorError::TournamentFull { .. } => ErrorCode::TournamentFull,
            FloorError::TournamentStarted { .. } => ErrorCode::TournamentStarted,
            FloorError::NotRegistered { .. } => ErrorCode::NotRegistered,
            FloorError::RebuyNotAllowed(_) => ErrorCode::RebuyNotAllowed,
            FloorError::AddonNotAllowed(_) => ErrorCode::AddonNotAllowed,
            FloorError::SelfExcluded { .. } => ErrorCode::SelfExcluded,
            FloorError::LimitExceeded { .. } => ErrorCode::LimitExceeded,
            FloorError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            FloorError::BalanceFrozen => ErrorCode::BalanceFrozen,
            FloorError::InsufficientRole { .. } => ErrorCode::InsufficientRole,
            FloorError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            FloorError::Database(_) | FloorError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            ErrorCode::ValidationError => ErrorCategory::Validation,
            ErrorCode::NotFound => ErrorCategory::Resource,
            ErrorCode::InsufficientRole | ErrorCode::Unauthenticated => {
                ErrorCategory::Authorization
            }
            ErrorCode::SelfExcluded | ErrorCode::LimitExceeded => ErrorCategory::Compliance,
            ErrorCode::InternalError => ErrorCategory::Internal,
            _ => ErrorCategory::StateConflict,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Store failures are reduced to a generic message; everything else,
    /// including compliance policy detail, is safe to show.
    pub fn client_message(&self) -> String {
        match self {
            FloorError::Database(_) | FloorError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        FloorError::NotFound { entity, id }
    }

    /// A sum of cents left the `i64` range
    pub(crate) fn amount_overflow(what: &str) -> Self {
        FloorError::Validation(format!("{what} is out of range"))
    }
}

/// Result type for floor operations
pub type FloorResult<T> = Result<T, FloorError>;
