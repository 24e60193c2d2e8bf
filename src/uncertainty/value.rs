//! Value-with-uncertainty arithmetic.
//!
//! [`ValueWithError`] is a scalar with a standard deviation. Additive operators
//! combine absolute standard deviations in quadrature; multiplicative operators
//! combine fractional ones. Values built from a bootstrap sample additionally keep
//! the sorted sample so that confidence intervals can be read from percentiles
//! instead of a normal approximation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;
use thiserror::Error;

use super::confidence::{percentile_interval, probability_to_sigma, ConfidenceInterval};
use super::sampling::SamplingStrategy;
use crate::constants::{FRACTIONAL_ERROR_EPSILON, ZERO_TOLERANCE};

/// Errors that can occur when building a value with error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UncertaintyError {
    #[error("Cannot build a value from an empty sample")]
    EmptySamples,

    #[error("Standard deviation must be a non-negative number, got {0}")]
    InvalidStandardDeviation(f64),
}

/// Sorted bootstrap sample retained by a [`ValueWithError`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalDistribution {
    sorted: Vec<f64>,
    interval_95: ConfidenceInterval,
    interval_100: ConfidenceInterval,
}

impl EmpiricalDistribution {
    fn from_sorted(sorted: Vec<f64>) -> Option<Self> {
        let interval_95 = percentile_interval(&sorted, 0.95)?;
        let interval_100 = percentile_interval(&sorted, 1.0)?;
        Some(Self {
            sorted,
            interval_95,
            interval_100,
        })
    }

    /// The ascending sample.
    pub fn sorted(&self) -> &[f64] {
        &self.sorted
    }

    /// Central 95% interval of the sample.
    pub fn interval_95(&self) -> ConfidenceInterval {
        self.interval_95
    }

    /// Minimum to maximum of the sample.
    pub fn interval_100(&self) -> ConfidenceInterval {
        self.interval_100
    }

    /// Interval at an arbitrary probability level.
    pub fn interval(&self, probability: f64) -> Option<ConfidenceInterval> {
        if probability == 0.95 {
            Some(self.interval_95)
        } else if probability >= 1.0 {
            Some(self.interval_100)
        } else {
            percentile_interval(&self.sorted, probability)
        }
    }
}

/// A scalar with a standard deviation.
///
/// `sd` is always stored as an absolute value. Instances are immutable: every
/// operator returns a new value, and derived values never carry the empirical
/// distribution of their operands.
///
/// Serialized as `{"value": .., "sd": ..}`; the distribution is not persisted and a
/// negative `sd` is rejected on input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ValueRecord", into = "ValueRecord")]
pub struct ValueWithError {
    value: f64,
    sd: f64,
    distribution: Option<Arc<EmpiricalDistribution>>,
}

#[derive(Serialize, Deserialize)]
struct ValueRecord {
    value: f64,
    sd: f64,
}

impl From<ValueWithError> for ValueRecord {
    fn from(v: ValueWithError) -> Self {
        Self {
            value: v.value,
            sd: v.sd,
        }
    }
}

impl TryFrom<ValueRecord> for ValueWithError {
    type Error = UncertaintyError;

    fn try_from(record: ValueRecord) -> Result<Self, Self::Error> {
        if !(record.sd >= 0.0) {
            return Err(UncertaintyError::InvalidStandardDeviation(record.sd));
        }
        Ok(Self {
            value: record.value,
            sd: record.sd,
            distribution: None,
        })
    }
}

impl PartialEq for ValueWithError {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.sd == other.sd
    }
}

impl Default for ValueWithError {
    fn default() -> Self {
        Self::exact(0.0)
    }
}

impl ValueWithError {
    /// Create a value with the given standard deviation.
    ///
    /// # Examples
    ///
    /// ```
    /// use itcfit_rs::uncertainty::ValueWithError;
    ///
    /// let v = ValueWithError::new(10.0, -0.5);
    /// assert_eq!(v.value(), 10.0);
    /// assert_eq!(v.sd(), 0.5);
    /// ```
    pub fn new(value: f64, sd: f64) -> Self {
        Self {
            value,
            sd: sd.abs(),
            distribution: None,
        }
    }

    /// Create a value without uncertainty.
    pub fn exact(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    /// Build a value from a sample: mean and unbiased (`n - 1`) standard deviation.
    ///
    /// Non-finite samples are ignored. A single sample yields a zero standard
    /// deviation.
    ///
    /// # Errors
    ///
    /// Returns [`UncertaintyError::EmptySamples`] if no finite sample remains.
    ///
    /// # Examples
    ///
    /// ```
    /// use itcfit_rs::uncertainty::ValueWithError;
    ///
    /// let v = ValueWithError::from_samples(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    /// assert_eq!(v.value(), 3.0);
    /// assert!((v.sd() - 2.5f64.sqrt()).abs() < 1e-12);
    /// ```
    pub fn from_samples(samples: &[f64]) -> Result<Self, UncertaintyError> {
        let (mean, sd, sorted) = sample_statistics(samples).ok_or(UncertaintyError::EmptySamples)?;
        Ok(Self {
            value: mean,
            sd,
            distribution: EmpiricalDistribution::from_sorted(sorted).map(Arc::new),
        })
    }

    /// Build a value centered on an exact result with the spread of a sample.
    ///
    /// This is the bootstrap idiom: the noiseless computation gives the center,
    /// the resampled ensemble gives the standard deviation and percentiles. An
    /// empty (or all non-finite) sample falls back to `exact(exact_mean)`.
    pub fn from_samples_with_mean(samples: &[f64], exact_mean: f64) -> Self {
        match sample_statistics(samples) {
            Some((_, sd, sorted)) => Self {
                value: exact_mean,
                sd,
                distribution: EmpiricalDistribution::from_sorted(sorted).map(Arc::new),
            },
            None => Self::exact(exact_mean),
        }
    }

    /// Average of several values; the standard deviation propagates as for a sum
    /// scaled by `1/n`.
    ///
    /// # Errors
    ///
    /// Returns [`UncertaintyError::EmptySamples`] for an empty slice.
    pub fn mean_of(values: &[ValueWithError]) -> Result<Self, UncertaintyError> {
        if values.is_empty() {
            return Err(UncertaintyError::EmptySamples);
        }
        let total = values
            .iter()
            .fold(ValueWithError::exact(0.0), |acc, v| acc + v);
        Ok(total / values.len() as f64)
    }

    /// The central value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The standard deviation.
    pub fn sd(&self) -> f64 {
        self.sd
    }

    /// `|sd / value|`, or 0 when the value is effectively zero.
    pub fn fractional_sd(&self) -> f64 {
        if self.value.abs() < ZERO_TOLERANCE {
            0.0
        } else {
            (self.sd / self.value).abs()
        }
    }

    /// Whether the value carries a meaningful uncertainty.
    pub fn has_error(&self) -> bool {
        if self.value.abs() < ZERO_TOLERANCE {
            self.sd > 0.0
        } else {
            self.fractional_sd() > FRACTIONAL_ERROR_EPSILON
        }
    }

    /// The retained bootstrap distribution, if any.
    pub fn distribution(&self) -> Option<&EmpiricalDistribution> {
        self.distribution.as_deref()
    }

    /// Confidence interval at `probability`.
    ///
    /// Read from the percentiles of the retained sample when there is one,
    /// otherwise `value ± z·sd` with `z` from the normal distribution.
    pub fn confidence_interval(&self, probability: f64) -> ConfidenceInterval {
        if let Some(interval) = self.distribution().and_then(|d| d.interval(probability)) {
            return interval;
        }
        let half_width = probability_to_sigma(probability) * self.sd;
        ConfidenceInterval {
            probability,
            lower: self.value - half_width,
            upper: self.value + half_width,
        }
    }

    /// Draw one value under `strategy`.
    pub fn sample(&self, rng: &mut impl Rng, strategy: &SamplingStrategy) -> f64 {
        strategy.draw(self.value, self.sd, rng)
    }

    /// Natural logarithm with first-order error propagation.
    pub fn ln(&self) -> Self {
        Self::new(self.value.ln(), self.fractional_sd())
    }

    /// Exponential with first-order error propagation.
    pub fn exp(&self) -> Self {
        let value = self.value.exp();
        Self::new(value, value * self.sd)
    }

    /// Integer power with first-order error propagation.
    pub fn powi(&self, n: i32) -> Self {
        let value = self.value.powi(n);
        let derivative = n as f64 * self.value.powi(n - 1);
        Self::new(value, derivative * self.sd)
    }

    /// Square root with first-order error propagation.
    pub fn sqrt(&self) -> Self {
        let value = self.value.sqrt();
        Self::new(value, self.sd / (2.0 * value))
    }
}

/// Mean, unbiased standard deviation and the ascending finite sample.
fn sample_statistics(samples: &[f64]) -> Option<(f64, f64, Vec<f64>)> {
    let mut sorted: Vec<f64> = samples.iter().copied().filter(|x| x.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let sd = if sorted.len() > 1 {
        let var = sorted.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    } else {
        0.0
    };
    Some((mean, sd, sorted))
}

impl fmt::Display for ValueWithError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*} ± {:.*}", p, self.value, p, self.sd),
            None => write!(f, "{} ± {}", self.value, self.sd),
        }
    }
}

impl Add for ValueWithError {
    type Output = ValueWithError;

    fn add(self, rhs: ValueWithError) -> ValueWithError {
        &self + &rhs
    }
}

impl Add for &ValueWithError {
    type Output = ValueWithError;

    fn add(self, rhs: &ValueWithError) -> ValueWithError {
        ValueWithError::new(self.value + rhs.value, self.sd.hypot(rhs.sd))
    }
}

impl Sub for ValueWithError {
    type Output = ValueWithError;

    fn sub(self, rhs: ValueWithError) -> ValueWithError {
        &self - &rhs
    }
}

impl Sub for &ValueWithError {
    type Output = ValueWithError;

    fn sub(self, rhs: &ValueWithError) -> ValueWithError {
        ValueWithError::new(self.value - rhs.value, self.sd.hypot(rhs.sd))
    }
}

impl Mul for ValueWithError {
    type Output = ValueWithError;

    fn mul(self, rhs: ValueWithError) -> ValueWithError {
        &self * &rhs
    }
}

impl Mul for &ValueWithError {
    type Output = ValueWithError;

    fn mul(self, rhs: &ValueWithError) -> ValueWithError {
        let value = self.value * rhs.value;
        let sd = if self.sd == 0.0 {
            self.value.abs() * rhs.sd
        } else if rhs.sd == 0.0 {
            rhs.value.abs() * self.sd
        } else {
            value.abs() * self.fractional_sd().hypot(rhs.fractional_sd())
        };
        ValueWithError::new(value, sd)
    }
}

impl Div for ValueWithError {
    type Output = ValueWithError;

    fn div(self, rhs: ValueWithError) -> ValueWithError {
        &self / &rhs
    }
}

impl Div for &ValueWithError {
    type Output = ValueWithError;

    fn div(self, rhs: &ValueWithError) -> ValueWithError {
        let value = self.value / rhs.value;
        let sd = if rhs.sd == 0.0 {
            self.sd / rhs.value.abs()
        } else if self.sd == 0.0 {
            value.abs() * rhs.fractional_sd()
        } else {
            value.abs() * self.fractional_sd().hypot(rhs.fractional_sd())
        };
        ValueWithError::new(value, sd)
    }
}

impl Add<&ValueWithError> for ValueWithError {
    type Output = ValueWithError;

    fn add(self, rhs: &ValueWithError) -> ValueWithError {
        &self + rhs
    }
}

impl Neg for ValueWithError {
    type Output = ValueWithError;

    fn neg(self) -> ValueWithError {
        ValueWithError::new(-self.value, self.sd)
    }
}

impl Neg for &ValueWithError {
    type Output = ValueWithError;

    fn neg(self) -> ValueWithError {
        ValueWithError::new(-self.value, self.sd)
    }
}

// Constants carry no uncertainty: shifts keep the sd, scalings scale it.

impl Add<f64> for ValueWithError {
    type Output = ValueWithError;

    fn add(self, rhs: f64) -> ValueWithError {
        ValueWithError::new(self.value + rhs, self.sd)
    }
}

impl Sub<f64> for ValueWithError {
    type Output = ValueWithError;

    fn sub(self, rhs: f64) -> ValueWithError {
        ValueWithError::new(self.value - rhs, self.sd)
    }
}

impl Mul<f64> for ValueWithError {
    type Output = ValueWithError;

    fn mul(self, rhs: f64) -> ValueWithError {
        ValueWithError::new(self.value * rhs, self.sd * rhs)
    }
}

impl Div<f64> for ValueWithError {
    type Output = ValueWithError;

    fn div(self, rhs: f64) -> ValueWithError {
        ValueWithError::new(self.value / rhs, self.sd / rhs)
    }
}

impl Mul<ValueWithError> for f64 {
    type Output = ValueWithError;

    fn mul(self, rhs: ValueWithError) -> ValueWithError {
        rhs * self
    }
}

impl From<f64> for ValueWithError {
    fn from(value: f64) -> Self {
        Self::exact(value)
    }
}
