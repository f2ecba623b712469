//! fleet-tracker - vehicle positions store with derived speeds

mod error;
mod tracking;
pub mod sources;
pub mod stores;

pub use error::{Result, TrackerError};
pub use tracking::position::{chronological, sort_chronologically, PositionRecord};
pub use tracking::speed::{derive_speed_mph, ellipsoidal_distance, MPS_TO_MPH_FACTOR};
pub use tracking::tracker::PositionTracker;
