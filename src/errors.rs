use axum::http::StatusCode;
use thiserror::Error;

use crate::models::HabitId;

/// Failures raised by registry, ledger, profile and backup operations.
///
/// Every operation that returns one of these leaves the data graph exactly
/// as it was before the call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("{0}")]
    Validation(String),

    #[error("day {day} is locked for habit {habit}")]
    LockedDay { habit: HabitId, day: u32 },

    #[error("{0} not found")]
    NotFound(String),

    #[error("backup is not usable: {0}")]
    MalformedBackup(String),

    #[error("incorrect password")]
    Unauthorized,

    #[error("no active profile")]
    NoSession,

    #[error("stored data is unreadable: {0}")]
    Storage(String),
}

impl TrackerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn habit_not_found(id: &HabitId) -> Self {
        Self::NotFound(format!("habit {id}"))
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        let status = match &err {
            TrackerError::Validation(_) | TrackerError::MalformedBackup(_) => {
                StatusCode::BAD_REQUEST
            }
            TrackerError::LockedDay { .. } => StatusCode::CONFLICT,
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::Unauthorized | TrackerError::NoSession => StatusCode::UNAUTHORIZED,
            TrackerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
