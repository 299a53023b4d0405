#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Residual analysis of trained risk models.
//!
//! Runs a trained model over a held-out period's risk table, computes the
//! per-row residual (actual minus predicted), and aggregates mean
//! residuals per spatial cell, collapsing across day and time. Collapsing
//! is deliberate: the goal is to surface geographically persistent blind
//! spots independent of temporal pattern.
//!
//! Sign convention: a positive mean residual means the model
//! under-predicts at that location; negative means over-prediction.

use std::collections::BTreeMap;

use patrol_risk_model::{ModelError, TrainedRiskModel};
use patrol_risk_models::ResidualRecord;
use patrol_risk_table::RiskTable;

/// Errors from residual analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Inference over the evaluation table failed.
    ///
    /// An evaluation label absent from the training mapping lands here:
    /// the row cannot be encoded and the analysis fails as a whole rather
    /// than skipping it.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Computes per-cell mean residuals of `model` over `evaluation_table`.
///
/// Encoding uses the *training* model's time-code mapping; the evaluation
/// table never introduces new codes. Output records are keyed by cell
/// centroid, in first-seen row order of the evaluation table.
///
/// # Errors
///
/// Returns [`AnalysisError::Model`] if any evaluation row carries a
/// time-period label the model was not trained with.
pub fn analyze(
    model: &TrainedRiskModel,
    evaluation_table: &RiskTable,
) -> Result<Vec<ResidualRecord>, AnalysisError> {
    let predictions = model.predict_table(evaluation_table)?;

    // (sum of residuals, row count) per cell, plus first-seen order.
    let mut sums: BTreeMap<&str, (f64, u64, f64, f64)> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (row, predicted) in evaluation_table.rows().iter().zip(predictions) {
        #[allow(clippy::cast_precision_loss)]
        let residual = row.incident_count as f64 - predicted;

        let entry = sums
            .entry(row.cell_id.as_str())
            .or_insert_with(|| {
                order.push(row.cell_id.as_str());
                (0.0, 0, row.latitude, row.longitude)
            });
        entry.0 += residual;
        entry.1 += 1;
    }

    let records = order
        .into_iter()
        .filter_map(|cell_id| sums.get(cell_id))
        .map(|&(sum, count, latitude, longitude)| {
            #[allow(clippy::cast_precision_loss)]
            let mean_residual = sum / count as f64;
            ResidualRecord {
                latitude,
                longitude,
                mean_residual,
            }
        })
        .collect::<Vec<_>>();

    log::info!(
        "Computed mean residuals for {} cells over {} evaluation rows",
        records.len(),
        evaluation_table.len()
    );
    Ok(records)
}
