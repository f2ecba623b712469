//! Position tracker API

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use time::OffsetDateTime;

use super::position::{truncate_to_millis, PositionRecord};
use super::speed::derive_speed_mph;
use crate::stores::PositionStore;
use crate::{Result, TrackerError};

/// One lock per vehicle name, so two reports of the same vehicle
/// are never enriched at the same time
#[derive(Default)]
struct VehicleLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VehicleLocks {
    fn of(&self, vehicle_name: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| TrackerError::Storage(format!("Failed on lock the vehicles: {}", e)))?;

        Ok(locks
            .entry(vehicle_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
}

/// Ingest and query of the vehicle positions kept in a store
pub struct PositionTracker<S>
where
    S: PositionStore,
{
    store: S,
    locks: VehicleLocks,
}

impl<S> PositionTracker<S>
where
    S: PositionStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: VehicleLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store the report with the speed derived from the previous one
    pub fn update_position(&self, mut position: PositionRecord) -> Result<()> {
        if position.vehicle_name.trim().is_empty() {
            return Err(TrackerError::InvalidRecord(
                "Vehicle name must not be empty".to_string(),
            ));
        }

        position.timestamp = truncate_to_millis(position.timestamp);

        let lock = self.locks.of(&position.vehicle_name)?;
        let _guard = lock
            .lock()
            .map_err(|e| TrackerError::Storage(format!("Failed on lock the vehicle: {}", e)))?;

        let prior = match self.store.find_latest_for(&position.vehicle_name) {
            Ok(p) => Some(p),
            Err(TrackerError::VehicleNotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let speed = derive_speed_mph(prior.as_ref(), &position)?;
        debug!(
            "`{}` at {} moving at {} mph",
            position.vehicle_name, position.timestamp, speed
        );

        self.store.insert(position.with_speed(speed))
    }

    /// Ingest every report in order. Stops on the first failure, the
    /// reports before it stay stored
    pub fn add_all_reports(&self, reports: Vec<PositionRecord>) -> Result<()> {
        let total = reports.len();

        for next in reports {
            self.update_position(next)?;
        }

        info!("{} reports ingested", total);

        Ok(())
    }

    pub fn get_latest_position_for(&self, vehicle_name: &str) -> Result<PositionRecord> {
        self.store.find_latest_for(vehicle_name)
    }

    /// Current state of the fleet: the latest report of every vehicle
    /// updated after `since`
    pub fn get_latest_positions_of_all_vehicles_updated_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<PositionRecord>> {
        self.store.find_all_since(since)
    }

    /// An empty window is not an unknown vehicle, so no `VehicleNotFound` here
    pub fn get_all_reports_for_vehicle_since(
        &self,
        vehicle_name: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<PositionRecord>> {
        self.store.find_history_for_since(vehicle_name, since)
    }

    pub fn get_history_for(&self, vehicle_name: &str) -> Result<Vec<PositionRecord>> {
        self.store.find_history_for(vehicle_name)
    }
}
