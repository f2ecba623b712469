//! Errors raised by the tracking core

use thiserror::Error;

/// Everything that can go wrong while storing or querying positions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    /// No record was ever stored for this vehicle
    #[error("Vehicle `{0}` not found")]
    VehicleNotFound(String),
    /// Failure reported by the underlying store, passed through as is
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Invalid position record: {0}")]
    InvalidRecord(String),
    /// The geodesy layer gave back something that is not a distance
    #[error("Invalid geodesic distance: {0}")]
    InvalidDistance(f64),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
