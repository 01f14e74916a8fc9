use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::CourseId;

/// Caller-facing classification of every failure the store can raise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    SyncUnavailable,
    ServerUnauthorised,
    ServerUnavailable,
    ServerUnauthorisedSavedLocally,
    ServerUnavailableSavedLocally,
    CannotSyncLocalStorage,
    MustGrantNetworkPermission,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::SyncUnavailable,
        ErrorKind::ServerUnauthorised,
        ErrorKind::ServerUnavailable,
        ErrorKind::ServerUnauthorisedSavedLocally,
        ErrorKind::ServerUnavailableSavedLocally,
        ErrorKind::CannotSyncLocalStorage,
        ErrorKind::MustGrantNetworkPermission,
        ErrorKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SyncUnavailable => "sync-unavailable",
            ErrorKind::ServerUnauthorised => "server-unauthorised",
            ErrorKind::ServerUnavailable => "server-unavailable",
            ErrorKind::ServerUnauthorisedSavedLocally => "server-unauthorised-saved-locally",
            ErrorKind::ServerUnavailableSavedLocally => "server-unavailable-saved-locally",
            ErrorKind::CannotSyncLocalStorage => "cannot-sync-local-storage",
            ErrorKind::MustGrantNetworkPermission => "must-grant-network-permission",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Kind raised after a failed remote write has been preserved locally.
    /// Only the two explicit server kinds have a saved-locally variant.
    pub fn saved_locally(&self) -> ErrorKind {
        match self {
            ErrorKind::ServerUnavailable => ErrorKind::ServerUnavailableSavedLocally,
            ErrorKind::ServerUnauthorised => ErrorKind::ServerUnauthorisedSavedLocally,
            _ => ErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = KarmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| KarmaError::Invalid(format!("unrecognized error kind `{s}`")))
    }
}

#[derive(Debug, Error)]
pub enum KarmaError {
    #[error("sync storage unavailable: {0}")]
    Sync(String),
    #[error("karma server rejected the API key")]
    ServerUnauthorised,
    #[error("karma server unavailable: {0}")]
    ServerUnavailable(String),
    #[error("karma server rejected the API key; scores were saved locally")]
    ServerUnauthorisedSavedLocally,
    #[error("karma server unavailable; scores were saved locally")]
    ServerUnavailableSavedLocally,
    #[error("course {0} stores scores locally; nothing to sync")]
    CannotSyncLocalStorage(CourseId),
    #[error("network permission has not been granted")]
    MustGrantNetworkPermission,
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl KarmaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KarmaError::Sync(_) => ErrorKind::SyncUnavailable,
            KarmaError::ServerUnauthorised => ErrorKind::ServerUnauthorised,
            KarmaError::ServerUnavailable(_) => ErrorKind::ServerUnavailable,
            KarmaError::ServerUnauthorisedSavedLocally => ErrorKind::ServerUnauthorisedSavedLocally,
            KarmaError::ServerUnavailableSavedLocally => ErrorKind::ServerUnavailableSavedLocally,
            KarmaError::CannotSyncLocalStorage(_) => ErrorKind::CannotSyncLocalStorage,
            KarmaError::MustGrantNetworkPermission => ErrorKind::MustGrantNetworkPermission,
            KarmaError::Invalid(_) | KarmaError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn sync(detail: impl fmt::Display) -> Self {
        KarmaError::Sync(detail.to_string())
    }

    pub fn unknown(detail: impl fmt::Display) -> Self {
        KarmaError::Unknown(detail.to_string())
    }

    /// Converts a failed remote write into the error returned once the same
    /// entries have landed in local storage.
    pub fn into_saved_locally(self) -> Self {
        match self.kind().saved_locally() {
            ErrorKind::ServerUnavailableSavedLocally => KarmaError::ServerUnavailableSavedLocally,
            ErrorKind::ServerUnauthorisedSavedLocally => KarmaError::ServerUnauthorisedSavedLocally,
            _ => KarmaError::Unknown(format!("{self}; scores were saved locally")),
        }
    }
}
