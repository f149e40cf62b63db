use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DisplayId, WorkoutId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    StoreUnavailable,
    OwnershipConflict,
    Takeover,
    MalformedDiscovery,
    WorkoutPersist,
    InvalidTransition,
    NotConnected,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("session store read failed for display {display_id}: {source}")]
    StoreRead {
        display_id: DisplayId,
        #[source]
        source: anyhow::Error,
    },
    #[error("session store write failed for display {display_id}: {source}")]
    StoreWrite {
        display_id: DisplayId,
        #[source]
        source: anyhow::Error,
    },
    #[error("{current_controller} is already connected to display {display_id}")]
    OwnershipConflict {
        display_id: DisplayId,
        current_controller: String,
    },
    #[error("{by} has taken over control of display {display_id}")]
    Takeover { display_id: DisplayId, by: String },
    #[error("malformed discovery payload: {0}")]
    MalformedDiscovery(String),
    #[error("failed to persist workout {workout_id}: {source}")]
    WorkoutPersist {
        workout_id: WorkoutId,
        #[source]
        source: anyhow::Error,
    },
    #[error("cannot {action} while in {state}")]
    InvalidTransition { action: &'static str, state: String },
    #[error("not connected to a display")]
    NotConnected,
}

impl SyncError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SyncError::StoreRead { .. } | SyncError::StoreWrite { .. } => {
                ErrorCode::StoreUnavailable
            }
            SyncError::OwnershipConflict { .. } => ErrorCode::OwnershipConflict,
            SyncError::Takeover { .. } => ErrorCode::Takeover,
            SyncError::MalformedDiscovery(_) => ErrorCode::MalformedDiscovery,
            SyncError::WorkoutPersist { .. } => ErrorCode::WorkoutPersist,
            SyncError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            SyncError::NotConnected => ErrorCode::NotConnected,
        }
    }
}

/// Serializable form of a [`SyncError`] handed to UI layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&SyncError> for ErrorReport {
    fn from(value: &SyncError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
