#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Patrol zone ranking from a trained risk model.
//!
//! Given a trained model and the set of known grid cells, scores every
//! cell for a requested (day, time-period) slot and returns the full
//! ranked surface plus the top-K patrol targets. Queries are pure reads:
//! neither the model nor the known-cell set is mutated, so concurrent
//! queries against one model are safe.

use patrol_risk_model::{ModelError, TrainedRiskModel};
use patrol_risk_models::{day_number, Recommendations, TimePeriod, UnknownDayError, ZoneRisk};

/// Default number of top patrol targets returned to callers.
pub const DEFAULT_TOP_K: usize = 10;

/// Errors from recommendation queries.
///
/// All of these fail the query and leave prior state untouched; none
/// silently defaults to a different slot.
#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    /// The day name does not resolve via the documented day table.
    #[error(transparent)]
    UnknownDay(#[from] UnknownDayError),

    /// The time-period label is not one of the fixed label set.
    #[error("unknown time period label '{0}'")]
    UnknownTimePeriodLabel(String),

    /// The label parsed but is absent from the model's trained mapping.
    #[error(transparent)]
    Encoding(#[from] ModelError),
}

/// Ranks every known cell for the requested (day, time-period) slot.
///
/// One query row is built per known cell with the slot's day number and
/// time code; batch inference scores them all, and a stable descending
/// sort ranks them (ties preserve input cell order). `all` keeps the
/// input cell order; `top` holds the `top_k` highest-risk zones.
///
/// # Errors
///
/// Returns [`RecommendError::UnknownDay`] or
/// [`RecommendError::UnknownTimePeriodLabel`] for an invalid query, and
/// [`RecommendError::Encoding`] if the label was never seen during
/// training.
pub fn recommend(
    model: &TrainedRiskModel,
    known_cells: &[(String, f64, f64)],
    day_name: &str,
    time_period_label: &str,
    top_k: usize,
) -> Result<Recommendations, RecommendError> {
    let day = day_number(day_name)?;
    let period: TimePeriod = time_period_label
        .parse()
        .map_err(|_| RecommendError::UnknownTimePeriodLabel(time_period_label.to_owned()))?;

    let features = known_cells
        .iter()
        .map(|&(_, lat, lng)| model.query_features(lat, lng, day, period))
        .collect::<Result<Vec<_>, _>>()?;

    let predictions = model.predict_batch(&features);

    let all: Vec<ZoneRisk> = known_cells
        .iter()
        .zip(predictions)
        .map(|((cell_id, latitude, longitude), predicted_risk)| ZoneRisk {
            cell_id: cell_id.clone(),
            latitude: *latitude,
            longitude: *longitude,
            predicted_risk,
        })
        .collect();

    let mut ranked = all.clone();
    ranked.sort_by(|a, b| {
        b.predicted_risk
            .partial_cmp(&a.predicted_risk)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_k);

    log::info!(
        "Ranked {} zones for {day_name} {time_period_label}; returning top {}",
        all.len(),
        ranked.len()
    );

    Ok(Recommendations { all, top: ranked })
}
