//! CSV file source integration

use std::io::Read;
use std::str::FromStr;

use csv::{Reader, StringRecord};
use log::warn;
use rust_decimal::Decimal;
use time::format_description::well_known;
use time::OffsetDateTime;

use super::ReportsSource;
use crate::stores::FieldsConfiguration;
use crate::{PositionRecord, Result, TrackerError};

/// CSV reports source
pub struct CsvSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: FieldsConfiguration,
}

impl<T> CsvSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<FieldsConfiguration>) -> Self {
        Self {
            rdr,
            fields: match fields {
                Some(f) => f,
                None => FieldsConfiguration::default(),
            },
        }
    }
}

impl<T> ReportsSource for CsvSource<T>
where
    T: Read,
{
    fn fetch(&mut self) -> Result<Vec<PositionRecord>> {
        let mut pos = vec![];

        let mut header = self
            .rdr
            .headers()
            .map_err(|e| TrackerError::InvalidRecord(format!("Failed on read the header: {}", e)))?
            .clone();
        let header_idx = parse_header(&self.fields, &mut header)
            .map_err(TrackerError::InvalidRecord)?;

        for row in self.rdr.records() {
            let mut rec = row
                .map_err(|e| TrackerError::InvalidRecord(format!("Failed on read some row: {}", e)))?;

            if rec.len() < 4 {
                warn!("Skipping row with missing columns: {:?}", rec);
                continue;
            }

            match parse_row(&header_idx, &mut rec) {
                Ok(Some(p)) => pos.push(p),
                Ok(None) => warn!("Skipping row without coordinates: {:?}", rec),
                Err(e) => {
                    return Err(TrackerError::InvalidRecord(format!(
                        "Error with row {:?}: {}",
                        rec, e
                    )))
                }
            }
        }

        Ok(pos)
    }
}

/// Field to index map
#[derive(Debug)]
struct FieldsIndex {
    name: usize,
    latitude: usize,
    longitude: usize,
    timestamp: usize,
}

fn parse_header(
    fields: &FieldsConfiguration,
    header: &mut StringRecord,
) -> std::result::Result<FieldsIndex, String> {
    header.trim();

    let find = |field: &str, label: &str| {
        header
            .iter()
            .position(|h| h.to_lowercase() == field.to_lowercase())
            .ok_or(format!("{} header not found", label))
    };

    Ok(FieldsIndex {
        name: find(&fields.name, "Name")?,
        latitude: find(&fields.latitude, "Latitude")?,
        longitude: find(&fields.longitude, "Longitude")?,
        timestamp: find(&fields.timestamp, "Timestamp")?,
    })
}

fn parse_row(
    header: &FieldsIndex,
    row: &mut StringRecord,
) -> std::result::Result<Option<PositionRecord>, String> {
    row.trim();

    let name = match row.get(header.name) {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err("Name field not found"),
    }?;

    let (raw_lat, raw_lng) = match (row.get(header.latitude), row.get(header.longitude)) {
        (Some(lat), Some(lng)) if !lat.is_empty() && !lng.is_empty() => (lat, lng),
        _ => return Ok(None),
    };

    let lat = Decimal::from_str(raw_lat)
        .map_err(|e| format!("Invalid latitude format: {}", e))?;
    let lng = Decimal::from_str(raw_lng)
        .map_err(|e| format!("Invalid longitude format: {}", e))?;

    let time = match row.get(header.timestamp) {
        Some(d) if d.chars().all(|c| c.is_ascii_digit()) && !d.is_empty() => {
            let millis = i128::from_str(d)
                .map_err(|e| format!("Failed on parse the timestamp: {}", e))?;
            let nanos = millis
                .checked_mul(1_000_000)
                .ok_or("Timestamp out of range")?;
            OffsetDateTime::from_unix_timestamp_nanos(nanos)
                .map_err(|e| format!("Failed on parse the timestamp: {}", e))
        }
        Some(d) => OffsetDateTime::parse(d, &well_known::Rfc3339)
            .map_err(|e| format!("Failed on parse the time: {}", e)),
        None => Err("Time field not found".to_string()),
    }?;

    Ok(Some(PositionRecord::basic(name, lat, lng, time)))
}

#[cfg(test)]
pub mod tests {
    use csv::ReaderBuilder;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    use super::CsvSource;
    use crate::sources::ReportsSource;
    use crate::stores::{FieldsConfiguration, MemoryStore};
    use crate::{PositionTracker, TrackerError};

    #[test]
    fn reports() -> Result<(), String> {
        let data = "\n
            name,lat,longitude,timestamp\n
            AA251,51.5,-0.12,\"2019-10-01T00:01:00.000+00:00\"\n
            AA251,51.51,-0.12,1569888120000\n
            BB100,-26.31832,-48.8702222,\"2019-10-01T00:03:00.000+00:00\"\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvSource::new(rdr, None);
        let reports = source.fetch().map_err(|e| e.to_string())?;

        assert_eq!(3, reports.len());
        assert_eq!("AA251", reports[0].vehicle_name);
        assert_eq!(dec!(51.5), reports[0].latitude);
        assert_eq!(datetime!(2019-10-01 0:01 UTC), reports[0].timestamp);
        assert_eq!(datetime!(2019-10-01 0:02 UTC), reports[1].timestamp);
        assert_eq!(dec!(-48.8702222), reports[2].longitude);

        let tracker = PositionTracker::new(MemoryStore::new());
        tracker.add_all_reports(reports).map_err(|e| e.to_string())?;
        let latest = tracker
            .get_latest_position_for("AA251")
            .map_err(|e| e.to_string())?;
        assert!(latest.speed_mph > dec!(41) && latest.speed_mph < dec!(42));

        Ok(())
    }

    #[test]
    fn skip_rows_without_coordinates() -> Result<(), String> {
        let data = "\n
            name,lat,longitude,timestamp\n
            AA251,51.5,-0.12,\"2019-10-01T00:01:00.000+00:00\"\n
            AA251,,-0.12,\"2019-10-01T00:02:00.000+00:00\"\n
            AA251, , ,\"2019-10-01T00:03:00.000+00:00\"\n
            AA251,51.5,-0.12\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvSource::new(rdr, None);
        let reports = source.fetch().map_err(|e| e.to_string())?;
        assert_eq!(1, reports.len());

        Ok(())
    }

    #[test]
    fn invalid_values() {
        let data = "\n
            name,lat,longitude,timestamp\n
            AA251,north,-0.12,\"2019-10-01T00:01:00.000+00:00\"\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvSource::new(rdr, None);
        assert!(source.fetch().is_err());
    }

    #[test]
    fn huge_epoch_timestamp() {
        let data = "\n
            name,lat,longitude,timestamp\n
            AA251,51.5,-0.12,99999999999999999999999999999999999\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvSource::new(rdr, None);
        match source.fetch() {
            Err(TrackerError::InvalidRecord(e)) => assert!(e.contains("Timestamp out of range")),
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn custom_headers() -> Result<(), String> {
        let data = "\n
            Vehicle,Y,X,When\n
            AA251,51.5,-0.12,\"2019-10-01T00:01:00.000+00:00\"\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let fields = FieldsConfiguration {
            name: "vehicle".to_string(),
            latitude: "y".to_string(),
            longitude: "x".to_string(),
            timestamp: "when".to_string(),
            ..FieldsConfiguration::default()
        };
        let mut source = CsvSource::new(rdr, Some(fields));
        let reports = source.fetch().map_err(|e| e.to_string())?;
        assert_eq!(1, reports.len());
        assert_eq!(dec!(-0.12), reports[0].longitude);

        Ok(())
    }
}
