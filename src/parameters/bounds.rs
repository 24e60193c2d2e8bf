//! Closed value limits of a fitting parameter.
//!
//! A value outside the limits is always rejected, never clamped silently, and the
//! same holds in every build profile. Clamping is available explicitly through
//! [`Bounds::clamp`] for callers that seed parameters from external guesses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by limit construction and value checks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid limits: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Value {value} lies outside [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Non-finite values are not accepted")]
    NonFiniteValue,
}

/// `[min, max]` limits of a parameter.
///
/// Serialized as `{"min": .., "max": ..}` with infinite ends written as `null`,
/// since JSON has no infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LimitsRecord", into = "LimitsRecord")]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Serialize, Deserialize)]
struct LimitsRecord {
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

impl From<Bounds> for LimitsRecord {
    fn from(bounds: Bounds) -> Self {
        Self {
            min: bounds.min.is_finite().then_some(bounds.min),
            max: bounds.max.is_finite().then_some(bounds.max),
        }
    }
}

impl TryFrom<LimitsRecord> for Bounds {
    type Error = BoundsError;

    fn try_from(record: LimitsRecord) -> Result<Self, Self::Error> {
        Bounds::new(
            record.min.unwrap_or(f64::NEG_INFINITY),
            record.max.unwrap_or(f64::INFINITY),
        )
    }
}

impl Bounds {
    /// Limits `[min, max]`; fails when either end is NaN or `min > max`.
    ///
    /// ```
    /// use itcfit_rs::parameters::Bounds;
    ///
    /// let limits = Bounds::new(0.1, 10.0).unwrap();
    /// assert!(limits.check(12.0).is_err());
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    /// The whole real line.
    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Accept a finite value inside the limits and hand it back.
    pub fn check(&self, value: f64) -> Result<f64, BoundsError> {
        match value {
            v if !v.is_finite() => Err(BoundsError::NonFiniteValue),
            v if self.contains(v) => Ok(v),
            v => Err(BoundsError::ValueOutsideBounds {
                value: v,
                min: self.min,
                max: self.max,
            }),
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// `(min, max)`, the form bounded solvers take.
    pub fn as_pair(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}
