//! Bagged regression-tree ensemble.
//!
//! Each tree is trained on a bootstrap resample of the training rows and
//! considers a random subset of features at every split, so the trees are
//! decorrelated; predictions average across the ensemble. Training is
//! deterministic for a fixed `(n_trees, seed)` pair: every tree derives its
//! own RNG stream from the master seed, so members could be fit in any
//! order (or in parallel) without changing the result.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{FeatureRow, NUM_FEATURES};

/// A fitted regression function over feature rows.
///
/// The pipeline only needs `fit(features, target) -> predict(features)`,
/// so any sufficiently expressive tabular regressor satisfies this
/// interface; [`RandomForest`] is the implementation the pipeline ships.
pub trait Regressor {
    /// Predicts the target for one feature row.
    fn predict_row(&self, row: &FeatureRow) -> f64;

    /// Predicts targets for a batch of feature rows.
    ///
    /// Rows are independent; the default implementation maps
    /// [`Regressor::predict_row`] over the batch.
    fn predict_batch(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// Hyperparameters for [`RandomForest::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestConfig {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Master random seed; fixes bootstrap resamples and per-split feature
    /// subsets.
    pub seed: u64,
    /// Number of features considered at each split.
    pub max_features: usize,
    /// Minimum number of samples a node must hold to be split further.
    pub min_samples_split: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            max_features: (NUM_FEATURES + 2) / 3,
            min_samples_split: 2,
        }
    }
}

/// One node of a fitted regression tree.
#[derive(Debug, Clone)]
enum Node {
    /// Terminal node: predicts the mean target of its training samples.
    Leaf(f64),
    /// Internal node: routes rows on `feature <= threshold`.
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A single variance-reduction regression tree.
#[derive(Debug, Clone)]
struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// Fits a tree on the rows selected by `indices` (a bootstrap sample,
    /// so indices may repeat).
    fn fit(
        rows: &[FeatureRow],
        targets: &[f64],
        indices: Vec<usize>,
        config: &ForestConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let root = grow(rows, targets, indices, config, rng);
        Self { root }
    }

    fn predict(&self, row: &FeatureRow) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Recursively grows a tree over the given sample indices.
fn grow(
    rows: &[FeatureRow],
    targets: &[f64],
    indices: Vec<usize>,
    config: &ForestConfig,
    rng: &mut ChaCha8Rng,
) -> Node {
    let mean = mean_of(targets, &indices);

    if indices.len() < config.min_samples_split || is_pure(targets, &indices) {
        return Node::Leaf(mean);
    }

    let Some(split) = best_split(rows, targets, &indices, config, rng) else {
        return Node::Leaf(mean);
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| rows[i][split.feature] <= split.threshold);

    // A valid split always separates at least one sample to each side, but
    // guard against float edge cases rather than recurse forever.
    if left_idx.is_empty() || right_idx.is_empty() {
        return Node::Leaf(mean);
    }

    let left = grow(rows, targets, left_idx, config, rng);
    let right = grow(rows, targets, right_idx, config, rng);

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
}

/// Finds the sum-of-squared-error minimizing split over a random feature
/// subset, or `None` if every candidate feature is constant across the
/// node's samples.
fn best_split(
    rows: &[FeatureRow],
    targets: &[f64],
    indices: &[usize],
    config: &ForestConfig,
    rng: &mut ChaCha8Rng,
) -> Option<SplitCandidate> {
    let mut features: Vec<usize> = (0..NUM_FEATURES).collect();
    features.shuffle(rng);
    features.truncate(config.max_features.clamp(1, NUM_FEATURES));

    let mut best: Option<(f64, SplitCandidate)> = None;

    for feature in features {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            rows[a][feature]
                .partial_cmp(&rows[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Prefix sums let each candidate threshold be scored in O(1).
        let n = sorted.len();
        let total: f64 = sorted.iter().map(|&i| targets[i]).sum();
        let total_sq: f64 = sorted.iter().map(|&i| targets[i] * targets[i]).sum();

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;

        for (k, &i) in sorted.iter().enumerate().take(n - 1) {
            left_sum += targets[i];
            left_sq += targets[i] * targets[i];

            let here = rows[i][feature];
            let next = rows[sorted[k + 1]][feature];
            if here >= next {
                // Can't split between identical feature values.
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            let (n_left, n_right) = ((k + 1) as f64, (n - k - 1) as f64);
            let right_sum = total - left_sum;
            let right_sq = total_sq - left_sq;

            let sse = (left_sq - left_sum * left_sum / n_left)
                + (right_sq - right_sum * right_sum / n_right);

            let threshold = f64::midpoint(here, next);
            let candidate = SplitCandidate { feature, threshold };

            match &best {
                Some((best_sse, _)) if sse >= *best_sse => {}
                _ => best = Some((sse, candidate)),
            }
        }
    }

    best.map(|(_, candidate)| candidate)
}

fn mean_of(targets: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    #[allow(clippy::cast_precision_loss)]
    let n = indices.len() as f64;
    sum / n
}

fn is_pure(targets: &[f64], indices: &[usize]) -> bool {
    indices
        .windows(2)
        .all(|pair| (targets[pair[0]] - targets[pair[1]]).abs() < f64::EPSILON)
}

/// A fitted bagged regression-tree ensemble.
///
/// Immutable once fit; prediction reads shared state only, so a fitted
/// forest can serve concurrent queries.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Fits the ensemble on feature rows and their targets.
    ///
    /// `rows` and `targets` must be the same length and non-empty; the
    /// caller ([`crate::TrainedRiskModel::fit`]) validates that before
    /// encoding features.
    #[must_use]
    pub fn fit(rows: &[FeatureRow], targets: &[f64], config: &ForestConfig) -> Self {
        let n = rows.len();
        let trees = (0..config.n_trees)
            .map(|tree_index| {
                // Independent, reproducible RNG stream per tree.
                let mut rng =
                    ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(tree_index as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(rows, targets, bootstrap, config, &mut rng)
            })
            .collect();
        Self { trees }
    }
}

impl Regressor for RandomForest {
    fn predict_row(&self, row: &FeatureRow) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        #[allow(clippy::cast_precision_loss)]
        let n = self.trees.len() as f64;
        sum / n
    }
}
