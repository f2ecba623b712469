//! Reports sources API

use crate::{PositionRecord, Result};

/// Source of raw reports to be ingested in bulk
pub trait ReportsSource {
    /// Fetch every report, in the order they were written
    fn fetch(&mut self) -> Result<Vec<PositionRecord>>;
}

#[cfg(feature = "csv")]
mod csv_file;

#[cfg(feature = "csv")]
pub use csv_file::CsvSource;
