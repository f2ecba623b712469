//! fleet-tracker cli - ingest and query vehicle positions

use std::fs::{self, File};

use argopt::{cmd_group, subcmd};
use bson::Document;
use csv::Reader;
use log::info;
use mongodb::sync::Client;
use serde::{Deserialize, Serialize};
use time::format_description::well_known;
use time::OffsetDateTime;

use fleet_tracker::sources::{CsvSource, ReportsSource};
use fleet_tracker::stores::{FieldsConfiguration, MongoDbStore};
use fleet_tracker::PositionTracker;

/// CLI of fleet-tracker - Store vehicle positions and query their history
#[cmd_group(commands = [ingest, latest, history, fleet])]
fn main() -> Result<(), String> {}

/// Ingest every report of a CSV file, deriving the speeds
#[subcmd]
fn ingest(
    /// CSV file source
    csv_path: String,
    /// Mongo and fields configuration. Default: .fleet-tracker.yaml, ~/.fleet-tracker.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let (tracker, fields) = open_tracker(config)?;

    let csv = File::open(&csv_path)
        .map_err(|e| format!("Failed on open the CSV file: {}", e))?;
    let mut source = CsvSource::new(Reader::from_reader(csv), Some(fields));

    let reports = source.fetch().map_err(|e| e.to_string())?;
    info!("{} reports read from {}", reports.len(), csv_path);

    tracker.add_all_reports(reports).map_err(|e| e.to_string())
}

/// Latest known position of a vehicle
#[subcmd]
fn latest(
    /// Vehicle name
    name: String,
    /// Mongo and fields configuration. Default: .fleet-tracker.yaml, ~/.fleet-tracker.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let (tracker, _) = open_tracker(config)?;

    let pos = tracker
        .get_latest_position_for(&name)
        .map_err(|e| e.to_string())?;

    print_yaml(&pos)
}

/// Every position of a vehicle, oldest first
#[subcmd]
fn history(
    /// Vehicle name
    name: String,
    /// Only positions after this time, RFC3339 format
    #[opt(long)]
    since: Option<String>,
    /// Mongo and fields configuration. Default: .fleet-tracker.yaml, ~/.fleet-tracker.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let (tracker, _) = open_tracker(config)?;

    let positions = match since {
        Some(since) => tracker.get_all_reports_for_vehicle_since(&name, parse_time(&since)?),
        None => tracker.get_history_for(&name),
    }
    .map_err(|e| e.to_string())?;

    print_yaml(&positions)
}

/// Latest position of every vehicle updated since the given time
#[subcmd]
fn fleet(
    /// Start time, RFC3339 format
    since: String,
    /// Mongo and fields configuration. Default: .fleet-tracker.yaml, ~/.fleet-tracker.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let (tracker, _) = open_tracker(config)?;

    let positions = tracker
        .get_latest_positions_of_all_vehicles_updated_since(parse_time(&since)?)
        .map_err(|e| e.to_string())?;

    print_yaml(&positions)
}

fn parse_time(time: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(time, &well_known::Rfc3339)
        .map_err(|e| format!("Failed on parse the time `{}`: {}", time, e))
}

fn print_yaml<T: Serialize>(value: &T) -> Result<(), String> {
    let yaml = serde_yaml::to_string(value).map_err(|e| e.to_string())?;
    print!("{}", yaml);

    Ok(())
}

/// Log at info unless RUST_LOG says otherwise
fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");

    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        eprintln!("Failed on start the logger: {}", e);
    }
}

/// Connect to the configured collection
fn open_tracker(
    config: Option<String>,
) -> Result<(PositionTracker<MongoDbStore>, FieldsConfiguration), String> {
    let conf = load_configs(config);

    let client = Client::with_uri_str(&conf.mongo.uri)
        .map_err(|e| format!("Failed on connect: {0}", e))?;
    let db = client
        .default_database()
        .ok_or("Default database not provided")?;
    let collection = db.collection::<Document>(&conf.mongo.collection);

    let store = MongoDbStore::new(collection, Some(conf.fields.clone()));

    Ok((PositionTracker::new(store), conf.fields))
}

/// Load the current config
fn load_configs(provided: Option<String>) -> Configs {
    let mut options = vec![];

    if let Some(sprovided) = provided {
        options.push(sprovided);
    }

    options.push(".fleet-tracker.yaml".to_string());

    if let Some(home) = dirs::home_dir() {
        if let Some(shome) = home.to_str() {
            options.push(format!("{}/.fleet-tracker.yaml", shome));
        }
    }

    let mut yaml: Option<String> = None;
    for fi in options {
        if let Ok(s) = fs::read_to_string(fi) {
            yaml = Some(s);
            break;
        }
    }

    if let Some(s) = yaml {
        match serde_yaml::from_str::<Configs>(&s) {
            Ok(conf) => return conf,
            Err(e) => log::warn!("Ignoring invalid config: {}", e),
        }
    }

    Configs::default()
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct Configs {
    #[serde(default)]
    pub mongo: MongoConfiguration,
    #[serde(default)]
    pub fields: FieldsConfiguration,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct MongoConfiguration {
    /// Connection string, must name the database
    #[serde(default = "MongoConfiguration::default_uri")]
    pub uri: String,
    #[serde(default = "MongoConfiguration::default_collection")]
    pub collection: String,
}

impl MongoConfiguration {
    fn default_uri() -> String {
        "mongodb://localhost:27017/fleet".to_string()
    }

    fn default_collection() -> String {
        "positions".to_string()
    }
}

impl Default for MongoConfiguration {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            collection: Self::default_collection(),
        }
    }
}

#[test]
fn parse_configs() -> Result<(), String> {
    let yaml = "\nmongo:\n  collection: trucks";

    let conf: Configs = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;

    assert_eq!(
        Configs {
            mongo: MongoConfiguration {
                uri: "mongodb://localhost:27017/fleet".to_string(),
                collection: "trucks".to_string(),
            },
            fields: FieldsConfiguration::default(),
        },
        conf
    );

    let yaml = "\nmongo:\n  uri: mongodb://db:27017/tracker\nfields:\n  name: vehicle\n  timestamp: time";

    let conf: Configs = serde_yaml::from_str(&yaml).map_err(|e| e.to_string())?;

    assert_eq!(
        Configs {
            mongo: MongoConfiguration {
                uri: "mongodb://db:27017/tracker".to_string(),
                collection: "positions".to_string(),
            },
            fields: FieldsConfiguration {
                name: "vehicle".to_string(),
                latitude: "lat".to_string(),
                longitude: "longitude".to_string(),
                timestamp: "time".to_string(),
                speed: "speed".to_string(),
            },
        },
        conf
    );

    Ok(())
}

#[test]
fn parse_times() {
    assert_eq!(
        Ok(time::macros::datetime!(2023-01-10 10:00 UTC)),
        parse_time("2023-01-10T10:00:00Z")
    );
    assert!(parse_time("yesterday").is_err());
}

#[test]
fn logging_starts_once() {
    init_logging();
    init_logging();

    log::info!("logger ready");
}
