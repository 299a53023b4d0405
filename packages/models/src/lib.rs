#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared domain types for the patrol risk pipeline.
//!
//! Defines the incident record contract owned by the upstream cleaning
//! stage, the risk-table row that every pipeline stage exchanges, and the
//! prediction/residual result types consumed by downstream plotting and
//! reporting collaborators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Time-of-day bucket assigned to every incident by the cleaning stage.
///
/// The string forms match the cleaned dataset's labels exactly
/// (`Late_Night`, not `LateNight`), so parsing and serialization round-trip
/// against both the incident files and the risk-table CSV artifact.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum TimePeriod {
    /// 06:00 - 12:00
    Morning,
    /// 12:00 - 18:00
    Afternoon,
    /// 18:00 - 00:00
    Evening,
    /// 00:00 - 06:00
    #[serde(rename = "Late_Night")]
    #[strum(serialize = "Late_Night")]
    LateNight,
}

/// Day-name table used by recommendation queries.
///
/// Day numbering follows the risk-table convention: Monday=0 .. Sunday=6.
pub const DAY_NAMES: &[(&str, u8)] = &[
    ("Monday", 0),
    ("Tuesday", 1),
    ("Wednesday", 2),
    ("Thursday", 3),
    ("Friday", 4),
    ("Saturday", 5),
    ("Sunday", 6),
];

/// Resolves an English day name to its 0-6 day number (Monday=0).
///
/// Matching is case-insensitive. An unknown name is an error, never a
/// silent default to 0.
///
/// # Errors
///
/// Returns [`UnknownDayError`] if the name is not one of the seven
/// English day names.
pub fn day_number(name: &str) -> Result<u8, UnknownDayError> {
    DAY_NAMES
        .iter()
        .find(|(day, _)| day.eq_ignore_ascii_case(name))
        .map(|&(_, num)| num)
        .ok_or_else(|| UnknownDayError {
            name: name.to_owned(),
        })
}

/// Error returned when a day name does not resolve to a day number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDayError {
    /// The name that failed to resolve.
    pub name: String,
}

impl std::fmt::Display for UnknownDayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown day name '{}': expected Monday-Sunday", self.name)
    }
}

impl std::error::Error for UnknownDayError {}

/// One cleaned incident as produced by the external cleaning stage.
///
/// Latitude/longitude are WGS84 degrees; validating that contract is the
/// risk-table builder's job, not this type's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// Calendar date the incident occurred.
    pub incident_date: NaiveDate,
    /// Time-of-day bucket assigned upstream.
    pub time_period: TimePeriod,
    /// Optional crime category label (e.g. `Violent_Crime`).
    pub crime_category: Option<String>,
}

/// One aggregation bucket of a risk table.
///
/// The field order matches the risk-table CSV column contract:
/// `cell_id, day_of_week, time_period, latitude, longitude, incident_count`.
/// At most one row exists per (`cell_id`, `day_of_week`, `time_period`)
/// within a table; latitude/longitude are the grid cell's centroid, not an
/// observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRow {
    /// Opaque H3 cell identifier (hex string form).
    pub cell_id: String,
    /// Day of week, Monday=0 .. Sunday=6.
    pub day_of_week: u8,
    /// Time-of-day bucket.
    pub time_period: TimePeriod,
    /// Cell centroid latitude.
    pub latitude: f64,
    /// Cell centroid longitude.
    pub longitude: f64,
    /// Number of incidents aggregated into this bucket (group cardinality,
    /// never summed weights).
    pub incident_count: u64,
}

/// Predicted risk for one grid cell at a queried (day, time-period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRisk {
    /// Opaque H3 cell identifier.
    pub cell_id: String,
    /// Cell centroid latitude.
    pub latitude: f64,
    /// Cell centroid longitude.
    pub longitude: f64,
    /// Predicted incident volume for the queried slot.
    pub predicted_risk: f64,
}

/// Result of a recommendation query: every known zone scored, plus the
/// top-K subset ordered by predicted risk descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    /// Every known cell with its predicted risk, in input cell order.
    pub all: Vec<ZoneRisk>,
    /// The `top_k` highest-risk zones, descending; ties preserve input
    /// cell order (stable sort).
    pub top: Vec<ZoneRisk>,
}

/// Mean prediction residual for one spatial cell, collapsed across
/// day/time.
///
/// Sign convention: positive means the model under-predicts at this
/// location (actual exceeded predicted); negative means over-prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualRecord {
    /// Cell centroid latitude.
    pub latitude: f64,
    /// Cell centroid longitude.
    pub longitude: f64,
    /// Mean of (actual - predicted) across all rows at this location.
    pub mean_residual: f64,
}

/// Axis-aligned geographic bounding box in WGS84 degrees.
///
/// Used only by downstream visualization to frame maps; the core pipeline
/// never filters by it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl BoundingBox {
    /// Returns whether a point falls inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Las Vegas valley framing box used by the deployment-plan maps.
pub const VEGAS_VALLEY: BoundingBox = BoundingBox {
    min_lat: 35.95,
    min_lon: -115.35,
    max_lat: 36.30,
    max_lon: -114.95,
};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn resolves_day_names() {
        assert_eq!(day_number("Monday").unwrap(), 0);
        assert_eq!(day_number("Saturday").unwrap(), 5);
        assert_eq!(day_number("sunday").unwrap(), 6);
    }

    #[test]
    fn rejects_unknown_day_name() {
        let err = day_number("Someday").unwrap_err();
        assert_eq!(err.name, "Someday");
    }

    #[test]
    fn time_period_uses_dataset_spelling() {
        assert_eq!(TimePeriod::LateNight.to_string(), "Late_Night");
        assert_eq!(
            TimePeriod::from_str("Late_Night").unwrap(),
            TimePeriod::LateNight
        );
        assert_eq!(TimePeriod::from_str("Morning").unwrap(), TimePeriod::Morning);
    }

    #[test]
    fn rejects_unknown_time_period_label() {
        assert!(TimePeriod::from_str("Midnight").is_err());
    }

    #[test]
    fn bounding_box_contains_vegas_strip() {
        assert!(VEGAS_VALLEY.contains(36.11, -115.17));
        assert!(!VEGAS_VALLEY.contains(41.88, -87.63));
    }
}
