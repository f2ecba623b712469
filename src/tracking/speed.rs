//! Speed derivation from two consecutive reports

use std::str::FromStr;

use geo::geometry::Point;
use geo::GeodesicDistance;
use rust_decimal::{Decimal, RoundingStrategy};

use super::position::PositionRecord;
use crate::{Result, TrackerError};

/// Meters per second to miles per hour
pub const MPS_TO_MPH_FACTOR: Decimal = Decimal::from_parts(2_236_936, 0, 0, false, 6);

/// Surface distance in meters between two points on the WGS84 ellipsoid
pub fn ellipsoidal_distance(a: Point, b: Point) -> f64 {
    a.geodesic_distance(&b)
}

/// Speed of the vehicle when it reported `incoming`, in miles per hour.
///
/// Without a prior report, or when both reports share the same instant,
/// the speed is zero. An incoming report older than the prior one gives
/// a negative speed.
pub fn derive_speed_mph(prior: Option<&PositionRecord>, incoming: &PositionRecord) -> Result<Decimal> {
    let prior = match prior {
        Some(p) => p,
        None => return Ok(Decimal::ZERO),
    };

    let elapsed = (incoming.timestamp - prior.timestamp).whole_milliseconds();
    if elapsed == 0 {
        return Ok(Decimal::ZERO);
    }
    let elapsed = i64::try_from(elapsed).map_err(|_| {
        TrackerError::InvalidRecord(format!("Elapsed time of {}ms out of range", elapsed))
    })?;

    let distance = ellipsoidal_distance(prior.point()?, incoming.point()?);

    speed_from(to_fixed_point(distance)?, elapsed)
}

/// Switch the raw geodesic distance to fixed point before any arithmetic
fn to_fixed_point(distance: f64) -> Result<Decimal> {
    if !distance.is_finite() {
        return Err(TrackerError::InvalidDistance(distance));
    }

    Decimal::from_str(&distance.to_string()).map_err(|_| TrackerError::InvalidDistance(distance))
}

/// mph from meters over milliseconds. The m/s quotient is rounded half-up
/// to the scale of the distance
fn speed_from(meters: Decimal, elapsed_millis: i64) -> Result<Decimal> {
    let seconds = Decimal::new(elapsed_millis, 3);

    let mps = meters
        .checked_div(seconds)
        .ok_or_else(|| TrackerError::InvalidRecord("Speed out of range".to_string()))?
        .round_dp_with_strategy(meters.scale(), RoundingStrategy::MidpointAwayFromZero);

    mps.checked_mul(MPS_TO_MPH_FACTOR)
        .ok_or_else(|| TrackerError::InvalidRecord("Speed out of range".to_string()))
}
