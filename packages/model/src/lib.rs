#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk regression model training and inference.
//!
//! Fits a bagged regression-tree ensemble on a risk table: one training
//! row per table row, with the feature vector
//! `[centroid latitude, centroid longitude, day-of-week, time-code]` and
//! the incident count as a continuous regression target.
//!
//! The time-period code mapping is derived once from the training table
//! and captured inside the trained model; every later prediction or
//! evaluation call encodes labels through that same mapping. A label the
//! mapping has never seen is an inference-time error, never a silently
//! assigned new code.
//!
//! A trained model is immutable. Retraining produces a new independent
//! instance, so in-flight queries against an existing model are never
//! affected.

pub mod forest;
pub mod metrics;

use patrol_risk_models::{RiskRow, TimePeriod};
use patrol_risk_table::RiskTable;

pub use forest::{ForestConfig, RandomForest, Regressor};

/// Width of the model's feature vector:
/// latitude, longitude, day-of-week, time-code.
pub const NUM_FEATURES: usize = 4;

/// One encoded feature vector.
pub type FeatureRow = [f64; NUM_FEATURES];

/// Errors from model training and inference.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The training table has no rows.
    #[error("cannot train on an empty risk table")]
    EmptyTrainingTable,

    /// A time-period label is absent from the trained code mapping.
    #[error("time period '{0}' was not seen during training and cannot be encoded")]
    UnknownTimePeriod(TimePeriod),
}

/// Bijection between time-period labels and small integer codes.
///
/// Derived once from the training table's observed labels in
/// first-appearance order, and reused verbatim for every subsequent
/// encoding on the same model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeCodeMap {
    labels: Vec<TimePeriod>,
}

impl TimeCodeMap {
    /// Derives the mapping from a training table, enumerating labels in
    /// first-appearance order.
    #[must_use]
    pub fn from_table(table: &RiskTable) -> Self {
        let mut labels = Vec::new();
        for row in table.rows() {
            if !labels.contains(&row.time_period) {
                labels.push(row.time_period);
            }
        }
        Self { labels }
    }

    /// Encodes a label to its integer code.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTimePeriod`] if the label was not in
    /// the training table. Failing here is deliberate: defaulting to code
    /// 0 would silently score the query as a different time of day.
    pub fn encode(&self, period: TimePeriod) -> Result<usize, ModelError> {
        self.labels
            .iter()
            .position(|&label| label == period)
            .ok_or(ModelError::UnknownTimePeriod(period))
    }

    /// Decodes an integer code back to its label.
    #[must_use]
    pub fn decode(&self, code: usize) -> Option<TimePeriod> {
        self.labels.get(code).copied()
    }

    /// Returns the number of distinct labels in the mapping.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Training configuration: ensemble size and random seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Random seed fixing bootstrap resamples and split feature subsets.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
        }
    }
}

/// A trained risk model: the fitted forest plus the time-code mapping
/// captured at fit time.
///
/// Never mutated after [`TrainedRiskModel::fit`]; consumers hold it
/// read-only.
#[derive(Debug, Clone)]
pub struct TrainedRiskModel {
    forest: RandomForest,
    time_codes: TimeCodeMap,
    config: ModelConfig,
}

impl TrainedRiskModel {
    /// Trains a model on a risk table.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTrainingTable`] if the table has no
    /// rows.
    pub fn fit(table: &RiskTable, config: ModelConfig) -> Result<Self, ModelError> {
        if table.is_empty() {
            return Err(ModelError::EmptyTrainingTable);
        }

        let time_codes = TimeCodeMap::from_table(table);

        let mut rows = Vec::with_capacity(table.len());
        let mut targets = Vec::with_capacity(table.len());
        for row in table.rows() {
            rows.push(encode_features(row, &time_codes)?);
            #[allow(clippy::cast_precision_loss)]
            targets.push(row.incident_count as f64);
        }

        log::info!(
            "Training {}-tree forest on {} risk rows (seed {})",
            config.n_trees,
            rows.len(),
            config.seed
        );

        let forest_config = ForestConfig {
            n_trees: config.n_trees,
            seed: config.seed,
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&rows, &targets, &forest_config);

        Ok(Self {
            forest,
            time_codes,
            config,
        })
    }

    /// Returns the time-code mapping captured at fit time.
    #[must_use]
    pub const fn time_codes(&self) -> &TimeCodeMap {
        &self.time_codes
    }

    /// Returns the configuration the model was trained with.
    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Builds the feature vector for a query against this model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTimePeriod`] if `period` is absent
    /// from the trained mapping.
    pub fn query_features(
        &self,
        latitude: f64,
        longitude: f64,
        day_of_week: u8,
        period: TimePeriod,
    ) -> Result<FeatureRow, ModelError> {
        let code = self.time_codes.encode(period)?;
        #[allow(clippy::cast_precision_loss)]
        let code = code as f64;
        Ok([latitude, longitude, f64::from(day_of_week), code])
    }

    /// Predicts incident counts for a batch of feature rows.
    #[must_use]
    pub fn predict_batch(&self, rows: &[FeatureRow]) -> Vec<f64> {
        self.forest.predict_batch(rows)
    }

    /// Runs batch inference over every row of a risk table using the
    /// training feature contract.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTimePeriod`] if any row carries a
    /// label outside the trained mapping; the whole call fails rather than
    /// skipping the row.
    pub fn predict_table(&self, table: &RiskTable) -> Result<Vec<f64>, ModelError> {
        let rows = table
            .rows()
            .iter()
            .map(|row| encode_features(row, &self.time_codes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.forest.predict_batch(&rows))
    }
}

/// Encodes one risk-table row into the model feature vector.
fn encode_features(row: &RiskRow, time_codes: &TimeCodeMap) -> Result<FeatureRow, ModelError> {
    let code = time_codes.encode(row.time_period)?;
    #[allow(clippy::cast_precision_loss)]
    let code = code as f64;
    Ok([row.latitude, row.longitude, f64::from(row.day_of_week), code])
}

#[cfg(test)]
mod tests {
    use patrol_risk_models::RiskRow;

    use super::*;

    fn row(cell: &str, day: u8, period: TimePeriod, lat: f64, lng: f64, count: u64) -> RiskRow {
        RiskRow {
            cell_id: cell.to_owned(),
            day_of_week: day,
            time_period: period,
            latitude: lat,
            longitude: lng,
            incident_count: count,
        }
    }

    fn table(rows: Vec<RiskRow>) -> RiskTable {
        RiskTable::from_rows(rows).unwrap()
    }

    #[test]
    fn time_codes_follow_first_appearance_order() {
        let table = table(vec![
            row("a", 5, TimePeriod::LateNight, 36.1, -115.1, 12),
            row("a", 1, TimePeriod::Morning, 36.1, -115.1, 2),
            row("b", 5, TimePeriod::LateNight, 36.2, -115.2, 4),
        ]);

        let codes = TimeCodeMap::from_table(&table);
        assert_eq!(codes.len(), 2);
        assert_eq!(codes.encode(TimePeriod::LateNight).unwrap(), 0);
        assert_eq!(codes.encode(TimePeriod::Morning).unwrap(), 1);
    }

    #[test]
    fn time_code_round_trip() {
        let table = table(vec![
            row("a", 0, TimePeriod::Morning, 36.1, -115.1, 1),
            row("a", 0, TimePeriod::Evening, 36.1, -115.1, 2),
        ]);
        let codes = TimeCodeMap::from_table(&table);

        for &period in &[TimePeriod::Morning, TimePeriod::Evening] {
            let code = codes.encode(period).unwrap();
            assert_eq!(codes.decode(code), Some(period));
        }
    }

    #[test]
    fn unseen_label_cannot_be_encoded() {
        let table = table(vec![row("a", 0, TimePeriod::Morning, 36.1, -115.1, 1)]);
        let codes = TimeCodeMap::from_table(&table);

        assert!(matches!(
            codes.encode(TimePeriod::LateNight),
            Err(ModelError::UnknownTimePeriod(TimePeriod::LateNight))
        ));
    }

    #[test]
    fn refuses_empty_training_table() {
        let empty = RiskTable::from_rows(Vec::new()).unwrap();
        assert!(matches!(
            TrainedRiskModel::fit(&empty, ModelConfig::default()),
            Err(ModelError::EmptyTrainingTable)
        ));
    }

    #[test]
    fn predicts_higher_risk_where_counts_were_higher() {
        let mut rows = Vec::new();
        // Hot cell: 12 incidents every Saturday late night.
        for day in 0..7 {
            rows.push(row("hot", day, TimePeriod::LateNight, 36.10, -115.15, 12));
            rows.push(row("cold", day, TimePeriod::LateNight, 36.25, -115.30, 1));
        }
        let table = table(rows);
        let model = TrainedRiskModel::fit(
            &table,
            ModelConfig {
                n_trees: 25,
                seed: 42,
            },
        )
        .unwrap();

        let hot = model
            .query_features(36.10, -115.15, 5, TimePeriod::LateNight)
            .unwrap();
        let cold = model
            .query_features(36.25, -115.30, 5, TimePeriod::LateNight)
            .unwrap();
        let predictions = model.predict_batch(&[hot, cold]);
        assert!(predictions[0] > predictions[1]);
    }

    #[test]
    fn predict_table_fails_on_unseen_label() {
        let train = table(vec![
            row("a", 0, TimePeriod::Morning, 36.1, -115.1, 3),
            row("a", 1, TimePeriod::Morning, 36.1, -115.1, 5),
        ]);
        let model = TrainedRiskModel::fit(
            &train,
            ModelConfig {
                n_trees: 5,
                seed: 42,
            },
        )
        .unwrap();

        let eval = table(vec![row("a", 0, TimePeriod::LateNight, 36.1, -115.1, 2)]);
        assert!(matches!(
            model.predict_table(&eval),
            Err(ModelError::UnknownTimePeriod(TimePeriod::LateNight))
        ));
    }
}
