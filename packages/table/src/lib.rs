#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk table construction and persistence.
//!
//! Turns cleaned incident records into a risk table: one row per
//! (grid cell, day-of-week, time-period) with the incident count for that
//! bucket and the cell's centroid. The table is the sole artifact exchanged
//! between build time and train/eval time, persisted as a flat CSV with the
//! exact columns `cell_id, day_of_week, time_period, latitude, longitude,
//! incident_count`.
//!
//! Aggregation only materializes combinations that appear in the data.
//! Buckets with zero observed incidents in the window do NOT become rows;
//! consumers must tolerate that sparsity.

pub mod incidents;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use patrol_risk_grid::GridIndexer;
use patrol_risk_models::{IncidentRecord, RiskRow, TimePeriod};

/// Exact column contract of the persisted risk-table CSV.
pub const RISK_TABLE_COLUMNS: &[&str] = &[
    "cell_id",
    "day_of_week",
    "time_period",
    "latitude",
    "longitude",
    "incident_count",
];

/// Errors from building, reading, or writing risk tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Grid configuration or cell assignment failed.
    #[error(transparent)]
    Grid(#[from] patrol_risk_grid::GridError),

    /// A record field is missing or failed to parse.
    #[error("row {row}: invalid value '{value}' for field '{field}'")]
    InvalidField {
        /// 1-based data row number (excluding the header).
        row: usize,
        /// Name of the offending field.
        field: &'static str,
        /// The raw value that failed validation.
        value: String,
    },

    /// An expected column is absent from the file header.
    #[error("missing expected column '{column}'")]
    MissingColumn {
        /// Name of the absent column.
        column: &'static str,
    },

    /// Two rows share the same (cell, day, time-period) bucket.
    #[error("duplicate bucket ({cell_id}, day {day_of_week}, {time_period})")]
    DuplicateBucket {
        /// Cell id of the duplicated bucket.
        cell_id: String,
        /// Day of week of the duplicated bucket.
        day_of_week: u8,
        /// Time period of the duplicated bucket.
        time_period: TimePeriod,
    },
}

/// An immutable risk table: the aggregated (cell, day, time-period)
/// buckets of one observation window.
///
/// Built once by [`build`] or loaded by [`RiskTable::read_csv`]; rows are
/// unique per bucket and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskTable {
    rows: Vec<RiskRow>,
}

impl RiskTable {
    /// Builds a table from already-aggregated rows, validating the
    /// bucket-uniqueness invariant.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateBucket`] if two rows share a
    /// (cell, day, time-period) bucket.
    pub fn from_rows(rows: Vec<RiskRow>) -> Result<Self, TableError> {
        let mut seen = BTreeSet::new();
        for row in &rows {
            if !seen.insert((row.cell_id.clone(), row.day_of_week, row.time_period)) {
                return Err(TableError::DuplicateBucket {
                    cell_id: row.cell_id.clone(),
                    day_of_week: row.day_of_week,
                    time_period: row.time_period,
                });
            }
        }
        Ok(Self { rows })
    }

    /// Returns the table rows.
    #[must_use]
    pub fn rows(&self) -> &[RiskRow] {
        &self.rows
    }

    /// Returns the number of buckets in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns every distinct cell as (`cell_id`, centroid latitude,
    /// centroid longitude), in first-seen row order.
    ///
    /// This is the known-cell set the recommendation ranker scores.
    #[must_use]
    pub fn known_cells(&self) -> Vec<(String, f64, f64)> {
        let mut seen = BTreeSet::new();
        let mut cells = Vec::new();
        for row in &self.rows {
            if seen.insert(row.cell_id.clone()) {
                cells.push((row.cell_id.clone(), row.latitude, row.longitude));
            }
        }
        cells
    }

    /// Writes the table to `path` with the exact risk-table column
    /// contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or a row fails to
    /// serialize.
    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        log::info!("Wrote {} risk rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Reads a persisted risk table, validating the column contract and
    /// the bucket-uniqueness invariant.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumn`] if a contract column is
    /// absent, [`TableError::InvalidField`] if a value fails to parse, and
    /// [`TableError::DuplicateBucket`] if two rows share a bucket.
    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let col = |column: &'static str| -> Result<usize, TableError> {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or(TableError::MissingColumn { column })
        };

        let cell_idx = col("cell_id")?;
        let day_idx = col("day_of_week")?;
        let period_idx = col("time_period")?;
        let lat_idx = col("latitude")?;
        let lng_idx = col("longitude")?;
        let count_idx = col("incident_count")?;

        let mut rows = Vec::new();
        let mut seen = BTreeSet::new();

        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row_num = i + 1;

            let field = |idx: usize| record.get(idx).unwrap_or_default();

            let cell_id = field(cell_idx).to_owned();
            if cell_id.is_empty() {
                return Err(TableError::InvalidField {
                    row: row_num,
                    field: "cell_id",
                    value: cell_id,
                });
            }

            let day_of_week = parse_field::<u8>(row_num, "day_of_week", field(day_idx))?;
            if day_of_week > 6 {
                return Err(TableError::InvalidField {
                    row: row_num,
                    field: "day_of_week",
                    value: field(day_idx).to_owned(),
                });
            }

            let time_period = TimePeriod::from_str(field(period_idx)).map_err(|_| {
                TableError::InvalidField {
                    row: row_num,
                    field: "time_period",
                    value: field(period_idx).to_owned(),
                }
            })?;

            let latitude = parse_field::<f64>(row_num, "latitude", field(lat_idx))?;
            let longitude = parse_field::<f64>(row_num, "longitude", field(lng_idx))?;
            let incident_count = parse_field::<u64>(row_num, "incident_count", field(count_idx))?;

            if !seen.insert((cell_id.clone(), day_of_week, time_period)) {
                return Err(TableError::DuplicateBucket {
                    cell_id,
                    day_of_week,
                    time_period,
                });
            }

            rows.push(RiskRow {
                cell_id,
                day_of_week,
                time_period,
                latitude,
                longitude,
                incident_count,
            });
        }

        log::info!("Read {} risk rows from {}", rows.len(), path.display());
        Ok(Self { rows })
    }
}

fn parse_field<T: FromStr>(
    row: usize,
    field: &'static str,
    value: &str,
) -> Result<T, TableError> {
    value.parse().map_err(|_| TableError::InvalidField {
        row,
        field,
        value: value.to_owned(),
    })
}

/// Builds a risk table from cleaned incident records.
///
/// Every record is assigned a grid cell, its day-of-week is derived from
/// the incident date (Monday=0), and records are grouped by
/// (cell, day, time-period) with group cardinality as the count. Each
/// bucket's centroid is recovered by reverse-mapping its cell id.
///
/// # Errors
///
/// Returns [`TableError::InvalidField`] (via the grid) if a record's
/// coordinates fall outside the valid WGS84 range.
pub fn build(records: &[IncidentRecord], indexer: &GridIndexer) -> Result<RiskTable, TableError> {
    use chrono::Datelike;

    let mut buckets: BTreeMap<(h3o::CellIndex, u8, TimePeriod), u64> = BTreeMap::new();

    for record in records {
        let cell = indexer.to_cell(record.latitude, record.longitude)?;
        #[allow(clippy::cast_possible_truncation)]
        let day = record.incident_date.weekday().num_days_from_monday() as u8;
        *buckets.entry((cell, day, record.time_period)).or_insert(0) += 1;
    }

    let rows = buckets
        .into_iter()
        .map(|((cell, day_of_week, time_period), incident_count)| {
            let (latitude, longitude) = GridIndexer::to_centroid(cell);
            RiskRow {
                cell_id: cell.to_string(),
                day_of_week,
                time_period,
                latitude,
                longitude,
                incident_count,
            }
        })
        .collect::<Vec<_>>();

    log::info!(
        "Aggregated {} incidents into {} risk buckets",
        records.len(),
        rows.len()
    );
    Ok(RiskTable { rows })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use patrol_risk_models::IncidentRecord;

    use super::*;

    fn incident(lat: f64, lng: f64, date: &str, period: TimePeriod) -> IncidentRecord {
        IncidentRecord {
            latitude: lat,
            longitude: lng,
            incident_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time_period: period,
            crime_category: None,
        }
    }

    #[test]
    fn counts_group_cardinality() {
        let indexer = GridIndexer::new(8).unwrap();
        // Three incidents in the same cell on the same Saturday night.
        let records = vec![
            incident(36.10, -115.15, "2023-01-07", TimePeriod::LateNight),
            incident(36.1001, -115.1501, "2023-01-07", TimePeriod::LateNight),
            incident(36.1002, -115.1502, "2023-01-07", TimePeriod::LateNight),
        ];

        let table = build(&records, &indexer).unwrap();
        assert_eq!(table.len(), 1);
        let row = &table.rows()[0];
        assert_eq!(row.incident_count, 3);
        // 2023-01-07 was a Saturday.
        assert_eq!(row.day_of_week, 5);
        assert_eq!(row.time_period, TimePeriod::LateNight);
    }

    #[test]
    fn buckets_are_unique() {
        let indexer = GridIndexer::new(8).unwrap();
        let records = vec![
            incident(36.10, -115.15, "2023-01-07", TimePeriod::LateNight),
            incident(36.10, -115.15, "2023-01-07", TimePeriod::Morning),
            incident(36.10, -115.15, "2023-01-02", TimePeriod::LateNight),
            incident(36.20, -115.25, "2023-01-07", TimePeriod::LateNight),
        ];

        let table = build(&records, &indexer).unwrap();
        assert_eq!(table.len(), 4);

        let mut keys = BTreeSet::new();
        for row in table.rows() {
            assert!(keys.insert((row.cell_id.clone(), row.day_of_week, row.time_period)));
        }
    }

    #[test]
    fn zero_count_buckets_are_not_materialized() {
        let indexer = GridIndexer::new(8).unwrap();
        let records = vec![incident(36.10, -115.15, "2023-01-07", TimePeriod::LateNight)];

        let table = build(&records, &indexer).unwrap();
        // Only the realized combination exists; the other 27 (day, period)
        // combinations for this cell are implicit zeros.
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn centroid_is_attached_from_cell_id() {
        let indexer = GridIndexer::new(8).unwrap();
        let records = vec![incident(36.10, -115.15, "2023-01-07", TimePeriod::Evening)];

        let table = build(&records, &indexer).unwrap();
        let row = &table.rows()[0];
        assert!((row.latitude - 36.10).abs() < 0.01);
        assert!((row.longitude - -115.15).abs() < 0.01);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let indexer = GridIndexer::new(8).unwrap();
        let records = vec![incident(99.0, -115.15, "2023-01-07", TimePeriod::Evening)];
        assert!(matches!(
            build(&records, &indexer),
            Err(TableError::Grid(_))
        ));
    }

    #[test]
    fn known_cells_are_deduplicated_in_first_seen_order() {
        let indexer = GridIndexer::new(8).unwrap();
        let records = vec![
            incident(36.10, -115.15, "2023-01-07", TimePeriod::LateNight),
            incident(36.10, -115.15, "2023-01-02", TimePeriod::Morning),
            incident(36.20, -115.25, "2023-01-07", TimePeriod::LateNight),
        ];

        let table = build(&records, &indexer).unwrap();
        let cells = table.known_cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].0, table.rows()[0].cell_id);
    }

    #[test]
    fn csv_round_trip_preserves_rows() {
        let indexer = GridIndexer::new(8).unwrap();
        let records = vec![
            incident(36.10, -115.15, "2023-01-07", TimePeriod::LateNight),
            incident(36.20, -115.25, "2023-01-02", TimePeriod::Morning),
        ];
        let table = build(&records, &indexer).unwrap();

        let dir = std::env::temp_dir().join("patrol_risk_table_round_trip");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("train.csv");
        table.write_csv(&path).unwrap();

        let loaded = RiskTable::read_csv(&path).unwrap();
        assert_eq!(loaded, table);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn read_rejects_missing_column() {
        let dir = std::env::temp_dir().join("patrol_risk_table_missing_col");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.csv");
        std::fs::write(
            &path,
            "cell_id,day_of_week,time_period,latitude,longitude\n\
             8829a1d4d7fffff,5,Late_Night,36.1,-115.15\n",
        )
        .unwrap();

        let err = RiskTable::read_csv(&path).unwrap_err();
        assert!(matches!(
            err,
            TableError::MissingColumn {
                column: "incident_count"
            }
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn read_rejects_duplicate_bucket() {
        let dir = std::env::temp_dir().join("patrol_risk_table_dup_bucket");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dup.csv");
        std::fs::write(
            &path,
            "cell_id,day_of_week,time_period,latitude,longitude,incident_count\n\
             8829a1d4d7fffff,5,Late_Night,36.1,-115.15,3\n\
             8829a1d4d7fffff,5,Late_Night,36.1,-115.15,4\n",
        )
        .unwrap();

        assert!(matches!(
            RiskTable::read_csv(&path).unwrap_err(),
            TableError::DuplicateBucket { .. }
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn read_rejects_out_of_range_day() {
        let dir = std::env::temp_dir().join("patrol_risk_table_bad_day");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad_day.csv");
        std::fs::write(
            &path,
            "cell_id,day_of_week,time_period,latitude,longitude,incident_count\n\
             8829a1d4d7fffff,7,Late_Night,36.1,-115.15,3\n",
        )
        .unwrap();

        let err = RiskTable::read_csv(&path).unwrap_err();
        assert!(matches!(
            err,
            TableError::InvalidField {
                field: "day_of_week",
                ..
            }
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
