//! Convergence metadata reported by external solvers.
//!
//! This module defines how the outcome of a solver call is described: the
//! termination status, and the record stored alongside a fitted solution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::error::{ItcFitError, Result};

/// Possible termination states of a solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The solver is still running.
    Running,

    /// The solver has converged due to a small parameter change.
    ParameterConvergence,

    /// The solver has converged due to a small function value change.
    FunctionValueConvergence,

    /// The solver has converged due to a small gradient.
    GradientConvergence,

    /// The solver stopped at its iteration limit.
    MaxIterationsReached,

    /// The solver stopped on a numerical error.
    NumericalError,

    /// The run was cancelled before the solver finished.
    Cancelled,
}

impl ConvergenceStatus {
    /// Returns true if the solver has stopped, converged or not.
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the solver has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
        )
    }

    /// Returns a description of the status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small function value change",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::NumericalError => "Terminated: numerical error",
            ConvergenceStatus::Cancelled => "Terminated: cancelled",
        }
    }
}

/// Identifier of the solver algorithm that produced a solution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverAlgorithm {
    LevenbergMarquardt,
    NelderMead,
    /// Any other solver, by name.
    Other(String),
}

impl fmt::Display for SolverAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverAlgorithm::LevenbergMarquardt => f.write_str("LevenbergMarquardt"),
            SolverAlgorithm::NelderMead => f.write_str("NelderMead"),
            SolverAlgorithm::Other(name) => f.write_str(name),
        }
    }
}

/// Error returned for an empty algorithm identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Solver algorithm identifier is empty")]
pub struct EmptyAlgorithmName;

impl FromStr for SolverAlgorithm {
    type Err = EmptyAlgorithmName;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" => Err(EmptyAlgorithmName),
            "LevenbergMarquardt" => Ok(SolverAlgorithm::LevenbergMarquardt),
            "NelderMead" => Ok(SolverAlgorithm::NelderMead),
            other => Ok(SolverAlgorithm::Other(other.to_string())),
        }
    }
}

/// Convergence record of a fit, persisted with the solution.
///
/// Times are stored in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConvergence {
    pub iterations: usize,
    pub loss: f64,
    pub time: f64,
    pub bootstrap_time: f64,
    pub algorithm: SolverAlgorithm,
    pub message: String,
    pub failed: bool,
}

impl SolverConvergence {
    /// Record of a finished solver run.
    pub fn new(
        status: ConvergenceStatus,
        algorithm: SolverAlgorithm,
        iterations: usize,
        loss: f64,
        time: Duration,
    ) -> Self {
        Self {
            iterations,
            loss,
            time: time.as_secs_f64(),
            bootstrap_time: 0.0,
            algorithm,
            message: status.description().to_string(),
            failed: !status.is_converged() || !loss.is_finite(),
        }
    }

    /// Attach the time spent on the bootstrap that followed the fit.
    pub fn with_bootstrap_time(mut self, elapsed: Duration) -> Self {
        self.bootstrap_time = elapsed.as_secs_f64();
        self
    }

    /// Turn a failed record into a `ConvergenceFailure` error.
    pub fn into_result(self) -> Result<Self> {
        if self.failed {
            Err(ItcFitError::ConvergenceFailure(format!(
                "{} after {} iterations (loss {})",
                self.message, self.iterations, self.loss
            )))
        } else {
            Ok(self)
        }
    }
}
