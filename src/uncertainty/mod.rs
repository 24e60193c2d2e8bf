//! # Uncertainty Calculation
//!
//! This module provides the uncertainty primitives used by every analysis:
//!
//! - [`ValueWithError`]: a scalar with a standard deviation and propagation-correct
//!   arithmetic
//! - [`SamplingStrategy`] and [`Sampler`]: how uncertain inputs are perturbed
//! - The bootstrap framework: exact pass, resampled passes, reduction to
//!   [`ValueWithError`]
//! - Confidence intervals from percentiles or the normal approximation

pub mod bootstrap;
pub mod confidence;
pub mod sampling;
pub mod value;

pub use bootstrap::{
    from_fn, run_bootstrap, BootstrapAnalysis, BootstrapConfig, BootstrapError, BootstrapRun,
    BootstrapRunner, BootstrapState, CancellationHandle, ComputeMode, FnAnalysis, Progress,
    ProgressCallback, RunContext,
};

pub use confidence::{
    percentile_interval, probability_to_sigma, sigma_to_probability, ConfidenceInterval,
};

pub use sampling::{EmpiricalPool, Sampler, SamplingMode, SamplingStrategy};

pub use value::{EmpiricalDistribution, UncertaintyError, ValueWithError};
