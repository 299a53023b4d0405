//! Regression evaluation metrics for held-out risk tables.

use crate::{ModelError, TrainedRiskModel};
use patrol_risk_table::RiskTable;

/// Evaluation summary of a model over a held-out risk table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Mean absolute error: average |actual - predicted| per bucket.
    pub mae: f64,
    /// Coefficient of determination.
    pub r2: f64,
    /// Number of evaluated rows.
    pub rows: usize,
}

/// Evaluates a trained model against a held-out risk table.
///
/// # Errors
///
/// Returns [`ModelError::UnknownTimePeriod`] if the evaluation table
/// carries a label outside the model's trained mapping.
pub fn evaluate(model: &TrainedRiskModel, table: &RiskTable) -> Result<Evaluation, ModelError> {
    let predicted = model.predict_table(table)?;
    #[allow(clippy::cast_precision_loss)]
    let actual: Vec<f64> = table
        .rows()
        .iter()
        .map(|row| row.incident_count as f64)
        .collect();

    Ok(Evaluation {
        mae: mean_absolute_error(&actual, &predicted),
        r2: r2_score(&actual, &predicted),
        rows: actual.len(),
    })
}

/// Mean absolute error over paired slices.
///
/// Returns `NaN` for empty input.
#[must_use]
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let n = actual.len() as f64;
    sum / n
}

/// Coefficient of determination (R squared) over paired slices.
///
/// Returns `NaN` for empty input or when the actual values are constant
/// (zero total variance).
#[must_use]
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let n = actual.len() as f64;
    let mean = actual.iter().sum::<f64>() / n;

    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();

    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mae_of_constant_offset() {
        let actual = vec![10.0, 20.0, 30.0];
        let predicted = vec![12.0, 18.0, 32.0];
        assert!((mean_absolute_error(&actual, &predicted) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn perfect_predictions_score_r2_of_one() {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        assert!((r2_score(&actual, &actual) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mean_predictor_scores_r2_of_zero() {
        let actual = vec![1.0, 2.0, 3.0];
        let predicted = vec![2.0, 2.0, 2.0];
        assert!(r2_score(&actual, &predicted).abs() < 1e-12);
    }
}
