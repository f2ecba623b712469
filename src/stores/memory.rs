//! In memory store

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

use time::OffsetDateTime;

use super::PositionStore;
use crate::{sort_chronologically, PositionRecord, Result, TrackerError};

/// Keeps every record in insertion order. Sorting happens on each query
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<PositionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Every record in the order it was inserted
    pub fn records(&self) -> Result<Vec<PositionRecord>> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<PositionRecord>>> {
        self.records
            .read()
            .map_err(|e| TrackerError::Storage(format!("Failed on read the records: {}", e)))
    }

    /// Records of the vehicle matching the filter, oldest first
    fn history<F>(&self, vehicle_name: &str, filter: F) -> Result<Vec<PositionRecord>>
    where
        F: Fn(&PositionRecord) -> bool,
    {
        let mut found: Vec<PositionRecord> = self
            .read()?
            .iter()
            .filter(|r| r.vehicle_name == vehicle_name && filter(*r))
            .cloned()
            .collect();

        sort_chronologically(&mut found);

        Ok(found)
    }
}

impl PositionStore for MemoryStore {
    fn insert(&self, record: PositionRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| TrackerError::Storage(format!("Failed on write the record: {}", e)))?;

        records.push(record);

        Ok(())
    }

    fn find_latest_for(&self, vehicle_name: &str) -> Result<PositionRecord> {
        // stable sort, so the last one is also the last inserted among ties
        self.history(vehicle_name, |_| true)?
            .pop()
            .ok_or_else(|| TrackerError::VehicleNotFound(vehicle_name.to_string()))
    }

    fn find_all_since(&self, since: OffsetDateTime) -> Result<Vec<PositionRecord>> {
        let mut recent = self
            .read()?
            .iter()
            .filter(|r| r.timestamp > since)
            .cloned()
            .collect::<Vec<PositionRecord>>();
        sort_chronologically(&mut recent);

        let mut latest: BTreeMap<String, PositionRecord> = BTreeMap::new();
        for pos in recent {
            latest.insert(pos.vehicle_name.clone(), pos);
        }

        let mut latest: Vec<PositionRecord> = latest.into_values().collect();
        sort_chronologically(&mut latest);

        Ok(latest)
    }

    fn find_history_for(&self, vehicle_name: &str) -> Result<Vec<PositionRecord>> {
        let history = self.history(vehicle_name, |_| true)?;

        if history.is_empty() {
            return Err(TrackerError::VehicleNotFound(vehicle_name.to_string()));
        }

        Ok(history)
    }

    fn find_history_for_since(
        &self,
        vehicle_name: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<PositionRecord>> {
        self.history(vehicle_name, |r| r.timestamp > since)
    }
}
