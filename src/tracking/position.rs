//! Position definition

use std::cmp::Ordering;

use geo::geometry::Point;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Result, TrackerError};

/// One timestamped report of a vehicle, optionally enriched with its speed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub vehicle_name: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Derived on ingest, zero until then
    #[serde(default)]
    pub speed_mph: Decimal,
}

impl PositionRecord {
    /// Report as received from a vehicle, without any speed
    pub fn basic(
        vehicle_name: String,
        latitude: Decimal,
        longitude: Decimal,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            vehicle_name,
            latitude,
            longitude,
            timestamp: truncate_to_millis(timestamp),
            speed_mph: Decimal::ZERO,
        }
    }

    /// Copy of this report carrying the given speed
    pub fn with_speed(&self, speed_mph: Decimal) -> Self {
        Self {
            speed_mph,
            ..self.clone()
        }
    }

    /// Coordinates as a geo point, x is the longitude
    pub fn point(&self) -> Result<Point> {
        let lat = self.latitude.to_f64().ok_or_else(|| {
            TrackerError::InvalidRecord(format!("Latitude {} out of range", self.latitude))
        })?;
        let lng = self.longitude.to_f64().ok_or_else(|| {
            TrackerError::InvalidRecord(format!("Longitude {} out of range", self.longitude))
        })?;

        Ok(Point::new(lng, lat))
    }
}

/// Compare two records by their timestamps only
pub fn chronological(a: &PositionRecord, b: &PositionRecord) -> Ordering {
    a.timestamp.cmp(&b.timestamp)
}

/// Sort the records by time. Stable, so ties keep the order they came in
pub fn sort_chronologically(records: &mut [PositionRecord]) {
    records.sort_by(chronological);
}

/// Drop everything below the millisecond, the resolution we keep
pub(crate) fn truncate_to_millis(time: OffsetDateTime) -> OffsetDateTime {
    time - Duration::nanoseconds((time.nanosecond() % 1_000_000) as i64)
}
