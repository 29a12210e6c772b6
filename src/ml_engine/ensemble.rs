//! Isolation Ensemble
//!
//! T isolation trees, each grown on a random subsample (without replacement)
//! of the equipment's baseline corpus. Scoring averages the per-tree path
//! length and normalizes it against `c(subsample)`:
//!
//! ```text
//! score = 2^(−avg_path / c(ψ))
//! ```
//!
//! Scores near 1 are anomalies, around 0.5 or below are normal. The ensemble
//! is immutable once fitted.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::isolation_tree::{average_path_length, IsolationTree};
use super::ScorerError;
use crate::config::EnsembleConfig;

#[derive(Debug, Clone)]
pub struct IsolationEnsemble {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
    dimension: usize,
    seed: u64,
}

impl IsolationEnsemble {
    /// Fit the ensemble on `baseline`.
    ///
    /// Fails with `InsufficientBaseline` below `config.min_baseline`, and
    /// rejects ragged or non-finite corpora.
    pub fn fit(baseline: &[Vec<f64>], config: &EnsembleConfig) -> Result<Self, ScorerError> {
        if baseline.len() < config.min_baseline.max(2) {
            return Err(ScorerError::InsufficientBaseline {
                have: baseline.len(),
                need: config.min_baseline.max(2),
            });
        }

        let dimension = baseline[0].len();
        if dimension == 0 {
            return Err(ScorerError::EmptyVector);
        }
        for row in baseline {
            if row.len() != dimension {
                return Err(ScorerError::DimensionMismatch {
                    expected: dimension,
                    got: row.len(),
                });
            }
            if let Some(index) = row.iter().position(|v| !v.is_finite()) {
                return Err(ScorerError::NonFiniteFeature { index });
            }
        }

        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);

        let subsample_size = config.subsample_size.clamp(2, baseline.len());
        let max_depth = (subsample_size as f64).log2().ceil() as usize;

        let trees: Vec<IsolationTree> = (0..config.trees.max(1))
            .map(|_| {
                let mut indices = index::sample(&mut rng, baseline.len(), subsample_size).into_vec();
                IsolationTree::build(baseline, &mut indices, max_depth, &mut rng)
            })
            .collect();

        debug!(
            trees = trees.len(),
            subsample_size,
            max_depth,
            dimension,
            seed,
            "Isolation ensemble fitted"
        );

        Ok(Self {
            trees,
            subsample_size,
            dimension,
            seed,
        })
    }

    /// Anomaly score in (0, 1].
    pub fn score(&self, vector: &[f64]) -> Result<f64, ScorerError> {
        if vector.len() != self.dimension {
            return Err(ScorerError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
            return Err(ScorerError::NonFiniteFeature { index });
        }

        let total: f64 = self.trees.iter().map(|t| t.path_length(vector)).sum();
        let avg_path = total / self.trees.len() as f64;
        let normalizer = average_path_length(self.subsample_size);
        if normalizer <= 0.0 {
            return Ok(0.5);
        }
        Ok(2f64.powf(-avg_path / normalizer))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn subsample_size(&self) -> usize {
        self.subsample_size
    }

    /// Seed the trees were grown with; recorded so a fit can be reproduced.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
