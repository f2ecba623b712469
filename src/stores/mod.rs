//! Position stores API

use serde::Deserialize;
use time::OffsetDateTime;

use crate::{PositionRecord, Result};

/// Append only store of position reports
pub trait PositionStore {
    /// Append one record, no dedup of any kind
    fn insert(&self, record: PositionRecord) -> Result<()>;

    /// Chronologically last record of the vehicle. On equal timestamps the
    /// last inserted wins
    fn find_latest_for(&self, vehicle_name: &str) -> Result<PositionRecord>;

    /// Latest record of every vehicle reported after `since`, one per vehicle
    fn find_all_since(&self, since: OffsetDateTime) -> Result<Vec<PositionRecord>>;

    /// Whole history of the vehicle, oldest first
    fn find_history_for(&self, vehicle_name: &str) -> Result<Vec<PositionRecord>>;

    /// History of the vehicle after `since`, oldest first. May be empty
    fn find_history_for_since(
        &self,
        vehicle_name: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<PositionRecord>>;
}

/// Names of the fields holding each part of a report
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FieldsConfiguration {
    #[serde(default = "FieldsConfiguration::default_name")]
    pub name: String,
    #[serde(default = "FieldsConfiguration::default_latitude")]
    pub latitude: String,
    #[serde(default = "FieldsConfiguration::default_longitude")]
    pub longitude: String,
    #[serde(default = "FieldsConfiguration::default_timestamp")]
    pub timestamp: String,
    #[serde(default = "FieldsConfiguration::default_speed")]
    pub speed: String,
}

impl FieldsConfiguration {
    fn default_name() -> String {
        "name".to_string()
    }

    fn default_latitude() -> String {
        "lat".to_string()
    }

    fn default_longitude() -> String {
        "longitude".to_string()
    }

    fn default_timestamp() -> String {
        "timestamp".to_string()
    }

    fn default_speed() -> String {
        "speed".to_string()
    }
}

impl Default for FieldsConfiguration {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            latitude: Self::default_latitude(),
            longitude: Self::default_longitude(),
            timestamp: Self::default_timestamp(),
            speed: Self::default_speed(),
        }
    }
}

mod memory;

pub use memory::MemoryStore;

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "mongo")]
pub use mongo::MongoDbStore;
