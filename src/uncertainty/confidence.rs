//! # Confidence Interval Calculations
//!
//! Helpers for turning a spread into a confidence interval, either from the
//! normal approximation or from the percentiles of a sorted sample.

use serde::{Deserialize, Serialize};

/// Represents a confidence interval value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// The probability level (e.g., 0.95 for 95%)
    pub probability: f64,
    /// The lower bound of the confidence interval
    pub lower: f64,
    /// The upper bound of the confidence interval
    pub upper: f64,
}

impl ConfidenceInterval {
    /// Width of the interval.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Whether `value` lies inside the closed interval.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Convert a sigma level to the two-sided probability it covers.
///
/// For a normal distribution, `p = erf(sigma / sqrt(2))`, so 1 sigma maps to
/// roughly 68.27%.
pub fn sigma_to_probability(sigma: f64) -> f64 {
    approximate_erf(sigma.abs() / std::f64::consts::SQRT_2)
}

/// Convert a two-sided probability to the matching sigma level.
///
/// The inverse of [`sigma_to_probability`]: 0.95 maps to about 1.96.
/// Probabilities outside `(0, 1)` return `0.0` and `f64::INFINITY` at the edges.
pub fn probability_to_sigma(probability: f64) -> f64 {
    if probability <= 0.0 {
        return 0.0;
    }
    if probability >= 1.0 {
        return f64::INFINITY;
    }
    normal_quantile(0.5 + probability / 2.0)
}

/// Percentile interval at `probability` from an ascending sample.
///
/// The quantile `q` is read at index `round((n - 1) * q)`, so the two tails
/// `q = (1 - p) / 2` and `1 - q` sit the same number of elements from either end.
pub fn percentile_interval(sorted: &[f64], probability: f64) -> Option<ConfidenceInterval> {
    if sorted.is_empty() {
        return None;
    }

    let last = sorted.len() - 1;
    let tail = (1.0 - probability.clamp(0.0, 1.0)) / 2.0;
    let index = |q: f64| ((last as f64) * q).round() as usize;

    Some(ConfidenceInterval {
        probability,
        lower: sorted[index(tail).min(last)],
        upper: sorted[index(1.0 - tail).min(last)],
    })
}

/// Approximate error function (erf).
///
/// From Abramowitz and Stegun, formula 7.1.26.
fn approximate_erf(x: f64) -> f64 {
    let x_abs = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x_abs);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let result = 1.0 - poly * (-x_abs * x_abs).exp();

    if x < 0.0 {
        -result
    } else {
        result
    }
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
