//! # Sampling Strategies
//!
//! A [`SamplingStrategy`] decides how a single scalar is drawn from a value with a
//! standard deviation during a bootstrap iteration. The strategy is handed to every
//! draw explicitly; there is no process-wide mode, so two analyses running at the
//! same time can use different noise models.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::value::{UncertaintyError, ValueWithError};

/// Parametric noise models that can be selected from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingMode {
    /// Normal distribution with the value as mean and the sd as standard deviation.
    #[default]
    Gaussian,

    /// Uniform distribution of the same standard deviation, bounded at `value ± √3·sd`.
    BoundedUniform,

    /// No noise; every draw returns the value itself.
    Exact,
}

/// A pool of already-observed deviations (typically fit residuals) to resample from.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalPool {
    deviations: Arc<[f64]>,
}

impl EmpiricalPool {
    /// Build a pool from observed deviations. Non-finite entries are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`UncertaintyError::EmptySamples`] if no finite deviation remains.
    pub fn new(deviations: &[f64]) -> Result<Self, UncertaintyError> {
        let finite: Vec<f64> = deviations.iter().copied().filter(|d| d.is_finite()).collect();
        if finite.is_empty() {
            return Err(UncertaintyError::EmptySamples);
        }
        Ok(Self {
            deviations: finite.into(),
        })
    }

    /// Number of deviations in the pool.
    pub fn len(&self) -> usize {
        self.deviations.len()
    }

    /// Whether the pool is empty. Always false for a constructed pool.
    pub fn is_empty(&self) -> bool {
        self.deviations.is_empty()
    }

    /// The stored deviations.
    pub fn deviations(&self) -> &[f64] {
        &self.deviations
    }

    fn draw(&self, rng: &mut impl Rng) -> f64 {
        self.deviations[rng.gen_range(0..self.deviations.len())]
    }
}

/// How a bootstrap iteration perturbs an uncertain input.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SamplingStrategy {
    /// Draw from `N(value, sd)`.
    #[default]
    Gaussian,

    /// Draw from `U(value - √3·sd, value + √3·sd)`.
    BoundedUniform,

    /// Return the value unchanged.
    Exact,

    /// Add a deviation drawn with replacement from an observed pool.
    Empirical(EmpiricalPool),
}

impl From<SamplingMode> for SamplingStrategy {
    fn from(mode: SamplingMode) -> Self {
        match mode {
            SamplingMode::Gaussian => SamplingStrategy::Gaussian,
            SamplingMode::BoundedUniform => SamplingStrategy::BoundedUniform,
            SamplingMode::Exact => SamplingStrategy::Exact,
        }
    }
}

impl SamplingStrategy {
    /// Draw one value around `value` with standard deviation `sd`.
    ///
    /// The empirical strategy ignores `sd`: the spread comes from the pool.
    pub fn draw(&self, value: f64, sd: f64, rng: &mut impl Rng) -> f64 {
        match self {
            SamplingStrategy::Exact => value,
            SamplingStrategy::Empirical(pool) => value + pool.draw(rng),
            _ if !(sd.is_finite() && sd > 0.0) => value,
            SamplingStrategy::Gaussian => {
                let z: f64 = rng.sample(StandardNormal);
                value + sd * z
            }
            SamplingStrategy::BoundedUniform => {
                let half_width = 3f64.sqrt() * sd;
                rng.gen_range((value - half_width)..=(value + half_width))
            }
        }
    }

    /// Whether draws are deterministic.
    pub fn is_exact(&self) -> bool {
        matches!(self, SamplingStrategy::Exact)
    }
}

/// A seeded random number generator paired with a sampling strategy.
///
/// One sampler belongs to one bootstrap run; it is never shared between threads
/// while the run is in flight.
#[derive(Debug, Clone)]
pub struct Sampler {
    rng: StdRng,
    strategy: SamplingStrategy,
}

impl Sampler {
    /// Create a sampler. Without a seed the generator is seeded from the OS.
    pub fn new(strategy: SamplingStrategy, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, strategy }
    }

    /// The active strategy.
    pub fn strategy(&self) -> &SamplingStrategy {
        &self.strategy
    }

    /// Draw one value from `value` under the active strategy.
    pub fn sample(&mut self, value: &ValueWithError) -> f64 {
        self.strategy.draw(value.value(), value.sd(), &mut self.rng)
    }

    /// Draw one value from an explicit pool instead of the active strategy.
    pub fn sample_from_pool(&mut self, center: f64, pool: &EmpiricalPool) -> f64 {
        center + pool.draw(&mut self.rng)
    }

    /// Access the underlying generator for callers that need extra randomness
    /// (for example shuffling data points).
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
