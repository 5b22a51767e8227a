//! Core error types for focusroom-core.
//!
//! Domain failures (`Unauthorized`, `NotFound`, `Conflict`, `InvalidState`,
//! `ClockAnomaly`) always reach the caller with their kind and message.
//! Infrastructure failures are wrapped in their own enums and classify as
//! [`ErrorKind::Internal`].

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification a transport layer maps 1:1 onto its own codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    Conflict,
    InvalidState,
    ClockAnomaly,
    Internal,
}

/// Core error type for focusroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No user identity was supplied
    #[error("Unauthorized: a user identity is required")]
    Unauthorized,

    /// Session or task is absent, or not owned by the caller
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The user already has a session open
    #[error("A focus session is already active: {active_session_id}")]
    Conflict { active_session_id: String },

    /// Operation not valid for the session's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Time went backwards between two observations
    #[error("Clock anomaly: {0}")]
    ClockAnomaly(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Notifier errors. Never escape a lifecycle operation.
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Unauthorized => ErrorKind::Unauthorized,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::InvalidState(_) => ErrorKind::InvalidState,
            CoreError::ClockAnomaly(_) => ErrorKind::ClockAnomaly,
            CoreError::Database(_) | CoreError::Config(_) | CoreError::Notify(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn session_not_found(id: &str) -> Self {
        CoreError::NotFound {
            entity: "Session",
            id: id.to_string(),
        }
    }

    pub(crate) fn task_not_found(id: &str) -> Self {
        CoreError::NotFound {
            entity: "Task",
            id: id.to_string(),
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked by another writer past the busy timeout
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Notifier errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {status}")]
    Status { status: u16 },

    #[error("Webhook did not answer within {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Failed to start notifier runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg)
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
