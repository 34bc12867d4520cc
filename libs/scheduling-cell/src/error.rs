use chrono::{NaiveTime, Weekday};
use thiserror::Error;

use shared_models::error::AppError;

/// Rejected weekly template definitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Class window on {weekday} starts at {start} but ends at {end}")]
    InvertedWindow { weekday: Weekday, start: NaiveTime, end: NaiveTime },

    #[error("Class windows on {weekday} overlap at {start}")]
    OverlappingWindows { weekday: Weekday, start: NaiveTime },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Request(#[from] anyhow::Error),

    #[error("Malformed storage row: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::UnknownService(_) | SchedulingError::InvalidDate(_) => {
                AppError::BadRequest(err.to_string())
            }
            SchedulingError::Store(StoreError::Decode(e)) => AppError::Database(e.to_string()),
            SchedulingError::Store(e) => AppError::ExternalService(e.to_string()),
        }
    }
}
