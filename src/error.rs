//! Error types for the draft-room service
//!
//! Every failure an actor can trigger is a [`MatchError`] variant. Operations
//! return the crate-wide anyhow [`Result`], so callers that need to present a
//! message to the originating actor downcast back to [`MatchError`].

use chrono::{DateTime, Utc};

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Player {player_id} is not registered")]
    NotRegistered { player_id: i64 },

    #[error("Player {player_id} is banned until {until}")]
    Banned {
        player_id: i64,
        until: DateTime<Utc>,
    },

    #[error("Player {player_id} is muted until {until}")]
    Muted {
        player_id: i64,
        until: DateTime<Utc>,
    },

    #[error("Player {player_id} is already in the {mode} queue")]
    AlreadyQueued { player_id: i64, mode: String },

    #[error("Player {player_id} is already queued for {other_mode}")]
    CrossModeConflict { player_id: i64, other_mode: String },

    #[error("Player {player_id} is not in the {mode} queue")]
    NotInQueue { player_id: i64, mode: String },

    #[error("Match not found: {match_id}")]
    SessionNotFound { match_id: String },

    #[error("Not your turn, it is {whose}'s turn")]
    InvalidTurn { whose: String },

    #[error("Invalid choice: {reason}")]
    InvalidChoice { reason: String },

    #[error("Pick time expired for match {match_id}, the match was cancelled")]
    Timeout { match_id: String },

    #[error("Validation failed: {reason}")]
    ValidationError { reason: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            MatchError::PermissionDenied { .. } => "permission_denied",
            MatchError::NotRegistered { .. } => "not_registered",
            MatchError::Banned { .. } => "banned",
            MatchError::Muted { .. } => "muted",
            MatchError::AlreadyQueued { .. } => "already_queued",
            MatchError::CrossModeConflict { .. } => "cross_mode_conflict",
            MatchError::NotInQueue { .. } => "not_in_queue",
            MatchError::SessionNotFound { .. } => "session_not_found",
            MatchError::InvalidTurn { .. } => "invalid_turn",
            MatchError::InvalidChoice { .. } => "invalid_choice",
            MatchError::Timeout { .. } => "timeout",
            MatchError::ValidationError { .. } => "validation",
            MatchError::Persistence { .. } => "persistence",
            MatchError::ConfigurationError { .. } => "configuration",
            MatchError::InternalError { .. } => "internal",
        }
    }

    /// Poisoned-lock error for the named aggregate
    pub(crate) fn lock(what: &str) -> Self {
        MatchError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}

/// Find the [`MatchError`] carried by an anyhow error, if any
pub fn match_error(err: &anyhow::Error) -> Option<&MatchError> {
    err.downcast_ref::<MatchError>()
}
