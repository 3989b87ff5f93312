//! Discrete probability distributions over ordered values.
//!
//! Backed by a `BTreeMap` so iteration order, and therefore every sum and
//! every hash over a distribution, is deterministic.

use std::collections::BTreeMap;

/// Tolerance used when checking that probabilities sum to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistributionError {
    #[error("distribution has no outcomes")]
    Empty,
    #[error("weight {0} is negative or not finite")]
    InvalidWeight(f64),
    #[error("total probability mass is zero")]
    ZeroMass,
}

/// A normalized discrete distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution<T: Ord> {
    weights: BTreeMap<T, f64>,
}

impl<T: Ord + Clone> Distribution<T> {
    /// All mass on one value.
    pub fn point(value: T) -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(value, 1.0);
        Self { weights }
    }

    /// Equal mass on every distinct value. Fails on an empty input.
    pub fn uniform(values: impl IntoIterator<Item = T>) -> Result<Self, DistributionError> {
        Self::from_weights(values.into_iter().map(|v| (v, 1.0)))
    }

    /// Normalize arbitrary non-negative weights. Repeated values accumulate.
    pub fn from_weights(
        weights: impl IntoIterator<Item = (T, f64)>,
    ) -> Result<Self, DistributionError> {
        let mut acc: BTreeMap<T, f64> = BTreeMap::new();
        for (value, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(DistributionError::InvalidWeight(w));
            }
            *acc.entry(value).or_insert(0.0) += w;
        }
        if acc.is_empty() {
            return Err(DistributionError::Empty);
        }
        let total: f64 = acc.values().sum();
        if total <= 0.0 {
            return Err(DistributionError::ZeroMass);
        }
        for w in acc.values_mut() {
            *w /= total;
        }
        Ok(Self { weights: acc })
    }

    /// Probability of `value`; zero for values outside the support.
    pub fn probability(&self, value: &T) -> f64 {
        self.weights.get(value).copied().unwrap_or(0.0)
    }

    /// Sum of all probabilities. One, up to rounding.
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn is_normalized(&self, tolerance: f64) -> bool {
        (self.total() - 1.0).abs() <= tolerance
    }

    /// Iterate `(value, probability)` in value order, including zero entries.
    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> {
        self.weights.iter().map(|(v, p)| (v, *p))
    }

    /// Values with non-zero probability.
    pub fn support(&self) -> impl Iterator<Item = &T> {
        self.weights
            .iter()
            .filter(|(_, p)| **p > 0.0)
            .map(|(v, _)| v)
    }

    /// Whether all mass sits on one value.
    pub fn is_certain(&self) -> bool {
        self.support().count() == 1
    }

    /// The most probable value. Ties go to the smallest value.
    pub fn most_likely(&self) -> Option<(&T, f64)> {
        let mut best: Option<(&T, f64)> = None;
        for (v, p) in self.iter() {
            match best {
                Some((_, bp)) if bp >= p => {}
                _ => best = Some((v, p)),
            }
        }
        best
    }

    /// Number of stored outcomes.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Pointwise product with a likelihood, renormalized (Bayes' rule).
    ///
    /// Values outside the current support stay at zero, so conditioning can
    /// only narrow or reweight a distribution.
    pub fn condition<F>(&self, likelihood: F) -> Result<Self, DistributionError>
    where
        F: Fn(&T) -> f64,
    {
        Self::from_weights(
            self.weights
                .iter()
                .map(|(v, p)| (v.clone(), p * likelihood(v))),
        )
    }

    /// Push the distribution through a stochastic map:
    /// `out(u) = sum over t of self(t) * f(t)(u)`.
    pub fn push_forward<U, F>(&self, f: F) -> Result<Distribution<U>, DistributionError>
    where
        U: Ord + Clone,
        F: Fn(&T) -> Distribution<U>,
    {
        let mut out: Vec<(U, f64)> = Vec::new();
        for (t, p) in self.iter() {
            if p <= 0.0 {
                continue;
            }
            for (u, q) in f(t).iter() {
                out.push((u.clone(), p * q));
            }
        }
        Distribution::from_weights(out)
    }
}
