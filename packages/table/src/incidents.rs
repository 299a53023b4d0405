//! Reader for cleaned incident files.
//!
//! The upstream cleaning stage produces a tabular file with the columns
//! `Latitude`, `Longitude`, `IncidentDate`, `Time_Period`, and an optional
//! `Crime_Category`. Validation failures abort the build for that file,
//! naming the missing or invalid field so the caller can fix the input
//! rather than receive a plausible-looking table built from defaults.

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use patrol_risk_models::{IncidentRecord, TimePeriod};

use crate::TableError;

/// Required latitude column of a cleaned incident file.
pub const COL_LATITUDE: &str = "Latitude";
/// Required longitude column of a cleaned incident file.
pub const COL_LONGITUDE: &str = "Longitude";
/// Required incident-date column of a cleaned incident file.
pub const COL_INCIDENT_DATE: &str = "IncidentDate";
/// Required time-period column of a cleaned incident file.
pub const COL_TIME_PERIOD: &str = "Time_Period";
/// Optional crime-category column of a cleaned incident file.
pub const COL_CRIME_CATEGORY: &str = "Crime_Category";

/// Reads cleaned incident records from a CSV file.
///
/// Dates must be ISO `YYYY-MM-DD` (a leading timestamp portion is
/// tolerated and truncated). Every row must carry a parseable coordinate
/// pair and a known time-period label.
///
/// # Errors
///
/// Returns [`TableError::MissingColumn`] if a required column is absent
/// and [`TableError::InvalidField`] naming the field and row for any value
/// that fails to parse.
pub fn read_incidents(path: &Path) -> Result<Vec<IncidentRecord>, TableError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let col = |column: &'static str| -> Result<usize, TableError> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or(TableError::MissingColumn { column })
    };

    let lat_idx = col(COL_LATITUDE)?;
    let lng_idx = col(COL_LONGITUDE)?;
    let date_idx = col(COL_INCIDENT_DATE)?;
    let period_idx = col(COL_TIME_PERIOD)?;
    let category_idx = headers.iter().position(|h| h == COL_CRIME_CATEGORY);

    let mut records = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;

        let field = |idx: usize| record.get(idx).unwrap_or_default();

        let latitude = parse_f64(row, COL_LATITUDE, field(lat_idx))?;
        let longitude = parse_f64(row, COL_LONGITUDE, field(lng_idx))?;
        let incident_date = parse_date(row, field(date_idx))?;

        let time_period = TimePeriod::from_str(field(period_idx)).map_err(|_| {
            TableError::InvalidField {
                row,
                field: "Time_Period",
                value: field(period_idx).to_owned(),
            }
        })?;

        let crime_category = category_idx
            .map(field)
            .filter(|v| !v.is_empty())
            .map(str::to_owned);

        records.push(IncidentRecord {
            latitude,
            longitude,
            incident_date,
            time_period,
            crime_category,
        });
    }

    log::info!("Read {} incidents from {}", records.len(), path.display());
    Ok(records)
}

fn parse_f64(row: usize, field: &'static str, value: &str) -> Result<f64, TableError> {
    value.parse().map_err(|_| TableError::InvalidField {
        row,
        field,
        value: value.to_owned(),
    })
}

fn parse_date(row: usize, value: &str) -> Result<NaiveDate, TableError> {
    // Cleaned exports carry either a bare date or a full timestamp; the
    // date portion is all the pipeline needs.
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| TableError::InvalidField {
        row,
        field: "IncidentDate",
        value: value.to_owned(),
    })
}
