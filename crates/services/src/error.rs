//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by a `StatsGateway`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("network request failed: {0}")]
    Transport(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("stats service returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("unreadable stats response: {0}")]
    Decode(String),
}

/// Errors raised inside a stats refresh.
///
/// These never cross the public API; they are rendered into the published
/// snapshot's error status.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ScoreReconciler`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("no auth token available for score submission")]
    MissingToken,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SubmissionError {
    /// True when the caller should refresh the token or re-authenticate.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            SubmissionError::MissingToken | SubmissionError::Gateway(GatewayError::Auth(_))
        )
    }
}

/// Errors emitted by assessment sessions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("assessment already finished")]
    Finished,
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid stats service URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid timeout value: {0}")]
    InvalidTimeout(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
