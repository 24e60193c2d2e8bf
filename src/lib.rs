//! # itcfit-rs
//!
//! `itcfit-rs` is the statistical core of isothermal titration calorimetry (ITC)
//! fitting: value-with-uncertainty arithmetic, bootstrap uncertainty estimation,
//! and the global/local parameter model used when several datasets are fitted
//! jointly by an external nonlinear solver.
//!
//! The library provides:
//! - [`ValueWithError`] with propagation-correct arithmetic and percentile
//!   confidence intervals
//! - A bootstrap framework with explicit sampling strategies, progress reporting
//!   and cooperative cancellation
//! - [`GlobalParameterSet`] with shared and temperature-dependent constraints
//! - A codec for the compact solver vector, and the persisted text encoding
//!
//! ## Basic Usage
//!
//! ```
//! use itcfit_rs::uncertainty::{from_fn, run_bootstrap, BootstrapConfig, ComputeMode, RunContext};
//! use itcfit_rs::ValueWithError;
//!
//! let concentration = ValueWithError::new(10.0, 0.5);
//! let volume = ValueWithError::new(2.0, 0.05);
//!
//! let mut analysis = from_fn(|mut mode: ComputeMode<'_>| {
//!     Ok(mode.draw(&concentration) * mode.draw(&volume))
//! });
//! let config = BootstrapConfig::default().with_iterations(500).with_seed(7);
//! let run = run_bootstrap(&mut analysis, config, &mut RunContext::new()).unwrap();
//!
//! let amount = run.reduce(|x| *x).unwrap();
//! assert_eq!(amount.value(), 20.0);
//! assert!(amount.sd() > 0.0);
//! ```

pub mod analysis;
pub mod codec;
pub mod config;
pub mod constants;
pub mod convergence;
pub mod encoding;
pub mod error;
pub mod parameters;
pub mod problem;
pub mod uncertainty;

// Re-exports for convenience
pub use analysis::{perform_analysis, AnalysisEvent, AnalysisHandle, AnalysisOutcome};
pub use codec::{SolverParameterBlock, SolverParameterLayout, VariableStyle};
pub use config::FitSettings;
pub use convergence::SolverConvergence;
pub use error::{ItcFitError, Result};
pub use parameters::{ConstraintMode, GlobalParameterSet, Parameter, ParameterKind, ParameterTable};
pub use problem::{GlobalFitProblem, Problem, Solver};
pub use uncertainty::{BootstrapConfig, RunContext, Sampler, SamplingStrategy, ValueWithError};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
