//! Baseline statistics over a slice of window counts.

use crate::error::{DetectError, Result};

/// A fixed set of past window counts used as the reference for a new count.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    values: Vec<f64>,
}

impl Baseline {
    /// Builds a baseline from raw window counts.
    #[must_use]
    pub fn new(samples: &[u64]) -> Self {
        Self {
            values: samples.iter().map(|&v| v as f64).collect(),
        }
    }

    /// Builds a baseline, requiring at least `needed` samples.
    pub fn require(samples: &[u64], needed: usize) -> Result<Self> {
        if samples.len() < needed || samples.is_empty() {
            return Err(DetectError::InsufficientBaseline {
                needed: needed.max(1),
                have: samples.len(),
            });
        }
        Ok(Self::new(samples))
    }

    /// Number of samples in the baseline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the baseline holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Arithmetic mean, zero for an empty baseline.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population variance.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq_diff: f64 = self.values.iter().map(|&x| (x - mean).powi(2)).sum();
        sum_sq_diff / self.values.len() as f64
    }

    /// Population standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Z-score of `value`, or `None` when the baseline is constant.
    #[must_use]
    pub fn z_score(&self, value: f64) -> Option<f64> {
        let std = self.std_dev();
        if std == 0.0 {
            return None;
        }
        Some((value - self.mean()) / std)
    }
}
