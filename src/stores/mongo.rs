//! Mongodb store integration

use std::str::FromStr;

use bson::{doc, Bson, DateTime, Document};
use log::debug;
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::sync::{Collection, Cursor};
use rust_decimal::Decimal;
use time::format_description::well_known;
use time::OffsetDateTime;

use super::{FieldsConfiguration, PositionStore};
use crate::{PositionRecord, Result, TrackerError};

/// MongoDB positions store
pub struct MongoDbStore {
    collection: Collection<Document>,
    fields: FieldsConfiguration,
}

impl MongoDbStore {
    pub fn new(collection: Collection<Document>, fields: Option<FieldsConfiguration>) -> Self {
        Self {
            collection,
            fields: match fields {
                Some(f) => f,
                None => FieldsConfiguration::default(),
            },
        }
    }

    /// Oldest first, `_id` breaks the ties in insertion order
    fn chronological_sort(&self, direction: i32) -> Document {
        doc! {
            self.fields.timestamp.clone(): direction,
            "_id": direction
        }
    }

    fn find_sorted(&self, filter: Document) -> Result<Vec<PositionRecord>> {
        let options = FindOptions::builder()
            .sort(self.chronological_sort(1))
            .build();

        let cursor = self
            .collection
            .find(filter, options)
            .map_err(|e| TrackerError::Storage(format!("Failed on fetch the docs: {}", e)))?;

        self.read_all(cursor)
    }

    fn read_all(&self, cursor: Cursor<Document>) -> Result<Vec<PositionRecord>> {
        let mut pos = vec![];

        for rdoc in cursor {
            let doc = rdoc
                .map_err(|e| TrackerError::Storage(format!("Failed on read some doc: {}", e)))?;

            pos.push(self.parse(&doc)?);
        }

        Ok(pos)
    }

    fn parse(&self, doc: &Document) -> Result<PositionRecord> {
        parse_doc(&self.fields, doc).map_err(|e| match doc.get_object_id("_id") {
            Ok(id) => TrackerError::InvalidRecord(format!("Error with doc {0}: {1}", id, e)),
            Err(_) => TrackerError::InvalidRecord(e),
        })
    }
}

impl PositionStore for MongoDbStore {
    fn insert(&self, record: PositionRecord) -> Result<()> {
        let mut doc = Document::new();
        doc.insert(self.fields.name.clone(), record.vehicle_name.clone());
        doc.insert(self.fields.latitude.clone(), record.latitude.to_string());
        doc.insert(self.fields.longitude.clone(), record.longitude.to_string());
        doc.insert(
            self.fields.timestamp.clone(),
            DateTime::from_time_0_3(record.timestamp),
        );
        doc.insert(self.fields.speed.clone(), record.speed_mph.to_string());

        let res = self
            .collection
            .insert_one(doc, None)
            .map_err(|e| TrackerError::Storage(format!("Failed on insert the doc: {}", e)))?;
        debug!("Stored position of `{}` as {}", record.vehicle_name, res.inserted_id);

        Ok(())
    }

    fn find_latest_for(&self, vehicle_name: &str) -> Result<PositionRecord> {
        let filter = doc! { self.fields.name.clone(): vehicle_name };
        let options = FindOneOptions::builder()
            .sort(self.chronological_sort(-1))
            .build();

        let found = self
            .collection
            .find_one(filter, options)
            .map_err(|e| TrackerError::Storage(format!("Failed on fetch the doc: {}", e)))?;

        match found {
            Some(doc) => self.parse(&doc),
            None => Err(TrackerError::VehicleNotFound(vehicle_name.to_string())),
        }
    }

    fn find_all_since(&self, since: OffsetDateTime) -> Result<Vec<PositionRecord>> {
        let pipeline = vec![
            doc! {
                "$match": {
                    self.fields.timestamp.clone(): { "$gt": DateTime::from_time_0_3(since) }
                }
            },
            doc! { "$sort": self.chronological_sort(1) },
            doc! {
                "$group": {
                    "_id": format!("${}", self.fields.name),
                    "latest": { "$last": "$$ROOT" }
                }
            },
            doc! { "$replaceRoot": { "newRoot": "$latest" } },
            doc! { "$sort": self.chronological_sort(1) },
        ];

        let cursor = self
            .collection
            .aggregate(pipeline, None)
            .map_err(|e| TrackerError::Storage(format!("Failed on aggregate the docs: {}", e)))?;

        self.read_all(cursor)
    }

    fn find_history_for(&self, vehicle_name: &str) -> Result<Vec<PositionRecord>> {
        let history = self.find_sorted(doc! { self.fields.name.clone(): vehicle_name })?;

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
        let filter = doc! {
            self.fields.name.clone(): vehicle_name,
            self.fields.timestamp.clone(): { "$gt": DateTime::from_time_0_3(since) }
        };

        self.find_sorted(filter)
    }
}

fn parse_doc(fields: &FieldsConfiguration, doc: &Document) -> std::result::Result<PositionRecord, String> {
    let name = match doc.get(&fields.name) {
        Some(Bson::String(n)) => Ok(n.clone()),
        Some(Bson::Int32(n)) => Ok(n.to_string()),
        Some(Bson::Int64(n)) => Ok(n.to_string()),
        Some(_) => Err("Name field type not supported".to_string()),
        None => Err("Name field not found".to_string()),
    }?;

    let lat = parse_decimal(doc.get(&fields.latitude))
        .map_err(|e| format!("Invalid latitude: {}", e))?
        .ok_or("Latitude field not found")?;
    let lng = parse_decimal(doc.get(&fields.longitude))
        .map_err(|e| format!("Invalid longitude: {}", e))?
        .ok_or("Longitude field not found")?;

    let time = match doc.get(&fields.timestamp) {
        Some(Bson::DateTime(tm)) => Ok(tm.to_time_0_3()),
        Some(Bson::String(tm)) => OffsetDateTime::parse(tm, &well_known::Rfc3339)
            .map_err(|e| format!("Failed on parse the time: {}", e)),
        Some(_) => Err("Time field type not supported".to_string()),
        None => Err("Time field not found".to_string()),
    }?;

    let speed = parse_decimal(doc.get(&fields.speed))
        .map_err(|e| format!("Invalid speed: {}", e))?
        .unwrap_or(Decimal::ZERO);

    Ok(PositionRecord::basic(name, lat, lng, time).with_speed(speed))
}

fn parse_decimal(value: Option<&Bson>) -> std::result::Result<Option<Decimal>, String> {
    match value {
        Some(Bson::String(d)) => Decimal::from_str(d).map(Some).map_err(|e| e.to_string()),
        Some(Bson::Double(d)) => Decimal::from_str(&d.to_string())
            .map(Some)
            .map_err(|e| e.to_string()),
        Some(Bson::Int32(d)) => Ok(Some(Decimal::from(*d))),
        Some(Bson::Int64(d)) => Ok(Some(Decimal::from(*d))),
        Some(Bson::Null) | None => Ok(None),
        Some(_) => Err("type not supported".to_string()),
    }
}

#[cfg(test)]
pub mod tests {
    use bson::{doc, Document};
    use mongodb::sync::Client;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    use super::{parse_doc, MongoDbStore};
    use crate::stores::{FieldsConfiguration, PositionStore};
    use crate::{PositionRecord, PositionTracker, TrackerError};

    fn store(collection: &str) -> Result<MongoDbStore, String> {
        let client =
            Client::with_uri_str("mongodb://localhost:27017").map_err(|e| e.to_string())?;
        let db = client.database("fleet_tracker_tests");
        let collection = db.collection::<Document>(collection);
        collection.drop(None).map_err(|e| e.to_string())?;

        Ok(MongoDbStore::new(collection, None))
    }

    #[test]
    fn parse_other_fields_types() -> Result<(), String> {
        let fields = FieldsConfiguration::default();
        let doc = doc! {
            "name": 251,
            "lat": 51.5,
            "longitude": "-0.12",
            "timestamp": "2023-01-10T10:00:00Z",
        };

        let pos = parse_doc(&fields, &doc)?;
        assert_eq!("251", pos.vehicle_name);
        assert_eq!(dec!(51.5), pos.latitude);
        assert_eq!(dec!(-0.12), pos.longitude);
        assert_eq!(datetime!(2023-01-10 10:00 UTC), pos.timestamp);
        assert_eq!(dec!(0), pos.speed_mph);

        let doc = doc! { "name": "A", "lat": true, "longitude": 1, "timestamp": "2023-01-10T10:00:00Z" };
        assert!(parse_doc(&fields, &doc).is_err());

        Ok(())
    }

    #[test]
    #[ignore = "needs a mongod on localhost:27017"]
    fn mongo_queries() -> Result<(), String> {
        let store = store("positions_queries")?;

        for (name, lat, time) in [
            ("A", dec!(51.5), datetime!(2023-01-10 10:10 UTC)),
            ("A", dec!(51.6), datetime!(2023-01-10 10:00 UTC)),
            ("A", dec!(51.7), datetime!(2023-01-10 10:10 UTC)),
            ("B", dec!(40.1), datetime!(2023-01-10 10:05 UTC)),
        ] {
            let pos = PositionRecord::basic(name.to_string(), lat, dec!(-0.12), time);
            store.insert(pos).map_err(|e| e.to_string())?;
        }

        let latest = store.find_latest_for("A").map_err(|e| e.to_string())?;
        assert_eq!(dec!(51.7), latest.latitude);

        assert_eq!(
            Err(TrackerError::VehicleNotFound("C".to_string())),
            store.find_history_for("C")
        );

        let history = store.find_history_for("A").map_err(|e| e.to_string())?;
        assert_eq!(3, history.len());
        assert_eq!(dec!(51.6), history[0].latitude);

        let fleet = store
            .find_all_since(datetime!(2023-01-10 10:01 UTC))
            .map_err(|e| e.to_string())?;
        assert_eq!(2, fleet.len());
        assert_eq!("B", fleet[0].vehicle_name);
        assert_eq!(dec!(51.7), fleet[1].latitude);

        let since = store
            .find_history_for_since("B", datetime!(2023-01-10 10:05 UTC))
            .map_err(|e| e.to_string())?;
        assert!(since.is_empty());

        Ok(())
    }

    #[test]
    #[ignore = "needs a mongod on localhost:27017"]
    fn mongo_speeds() -> Result<(), String> {
        let tracker = PositionTracker::new(store("positions_speeds")?);

        tracker
            .update_position(PositionRecord::basic(
                "A".to_string(),
                dec!(51.5),
                dec!(-0.12),
                datetime!(2023-01-10 10:00 UTC),
            ))
            .map_err(|e| e.to_string())?;
        tracker
            .update_position(PositionRecord::basic(
                "A".to_string(),
                dec!(51.51),
                dec!(-0.12),
                datetime!(2023-01-10 10:01 UTC),
            ))
            .map_err(|e| e.to_string())?;

        let history = tracker.get_history_for("A").map_err(|e| e.to_string())?;
        assert_eq!(2, history.len());
        assert_eq!(dec!(0), history[0].speed_mph);
        assert!(history[1].speed_mph > dec!(41));

        Ok(())
    }
}
