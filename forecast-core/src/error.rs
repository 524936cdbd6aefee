use std::path::PathBuf;
use thiserror::Error;

use crate::selector::FallbackReason;

/// Why a single forecast call did not produce a document.
///
/// All variants are recoverable: the selector answers them by falling back
/// to the newest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Connection error: {detail}")]
    Network { detail: String },

    #[error("The parameter '{parameter}' is not recognized by the API")]
    InvalidParameter {
        parameter: String,
        /// Query key the server complained about, when it named one.
        query_key: Option<String>,
    },

    #[error("Server response: {reason}")]
    Api { reason: String },
}

impl FetchError {
    pub fn network(detail: impl Into<String>) -> Self {
        FetchError::Network { detail: detail.into() }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No backups available in '{0}'")]
    NotFound(PathBuf),

    #[error("Backup '{path}' could not be read")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup '{path}' is not a valid forecast document")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create backup directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to write backup '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode forecast for backup")]
    Encode(#[source] serde_json::Error),
}

/// Errors that end the run with a non-zero status.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timezone '{0}' not found or incorrect in config")]
    Timezone(String),

    #[error("No hourly data: {0}. Try checking spelling and names in the config")]
    MissingData(String),

    /// Fallback was needed and the store had nothing usable. `reason` keeps
    /// the fetch failure so it survives into the final message.
    #[error("{}. No usable backup: {source}", .reason.summary())]
    NoBackup {
        reason: FallbackReason,
        #[source]
        source: StoreError,
    },
}
