//! Problem definition traits and the global-fit adapter.
//!
//! The nonlinear solver itself lives outside this crate. This module defines the
//! boundary it is driven through:
//!
//! - [`Problem`]: a least-squares problem over a plain parameter vector
//! - [`Solver`]: anything that minimizes a [`Problem`] from a [`SolverStart`]
//! - [`GlobalModel`]: the per-dataset residual functions of a binding model
//! - [`GlobalFitProblem`]: joins a model and a [`GlobalParameterSet`] into a
//!   [`Problem`], unflattening and propagating before every evaluation
//! - [`GlobalFitAnalysis`]: repeats the fit against resampled data as a
//!   [`BootstrapAnalysis`]

use log::debug;
use ndarray::Array1;
use std::time::Instant;

use crate::convergence::SolverConvergence;
use crate::error::{ItcFitError, Result};
use crate::parameters::{GlobalParameterSet, ParameterTable};
use crate::uncertainty::{BootstrapAnalysis, ComputeMode, Sampler};

/// A trait representing a nonlinear least squares problem.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of residuals, or an error if the evaluation fails
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

/// Everything a solver needs to start: initial vector, step sizes and limits, all
/// in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverStart {
    pub initial: Array1<f64>,
    pub step_sizes: Vec<f64>,
    pub limits: Vec<(f64, f64)>,
}

/// What a solver hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub params: Array1<f64>,
    pub convergence: SolverConvergence,
}

/// An external nonlinear minimizer (Levenberg-Marquardt, Nelder-Mead, ...).
pub trait Solver {
    /// Minimize the problem's cost starting from `start`.
    fn minimize(&mut self, problem: &dyn Problem, start: &SolverStart) -> Result<SolverOutcome>;
}

/// Residual functions of a model fitted jointly over several datasets.
pub trait GlobalModel {
    /// Number of datasets the model describes.
    fn dataset_count(&self) -> usize;

    /// Number of residuals of one dataset.
    fn dataset_residual_count(&self, dataset: usize) -> usize;

    /// Residuals of one dataset given its (propagated) parameter table.
    fn dataset_residuals(&self, dataset: usize, params: &ParameterTable) -> Result<Array1<f64>>;
}

/// A model whose data can be perturbed for a bootstrap pass.
pub trait ResampleModel: GlobalModel + Sized {
    /// A copy of the model with every uncertain input drawn from `sampler`.
    fn perturbed(&self, sampler: &mut Sampler) -> Result<Self>;
}

/// A global fit expressed as a [`Problem`].
#[derive(Debug, Clone)]
pub struct GlobalFitProblem<M> {
    model: M,
    parameters: GlobalParameterSet,
}

impl<M: GlobalModel> GlobalFitProblem<M> {
    /// Join a model with the parameter set governing its datasets.
    ///
    /// # Returns
    ///
    /// A `DimensionMismatch` error if the model and set disagree on the number of datasets
    pub fn new(model: M, parameters: GlobalParameterSet) -> Result<Self> {
        if model.dataset_count() != parameters.dataset_count() {
            return Err(ItcFitError::DimensionMismatch(format!(
                "Model has {} datasets, parameter set governs {}",
                model.dataset_count(),
                parameters.dataset_count()
            )));
        }
        Ok(Self { model, parameters })
    }

    /// The current parameter set.
    pub fn parameters(&self) -> &GlobalParameterSet {
        &self.parameters
    }

    /// The model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Split into model and parameter set.
    pub fn into_parts(self) -> (M, GlobalParameterSet) {
        (self.model, self.parameters)
    }

    /// Initial vector, step sizes and limits of the current parameter set.
    pub fn start(&self) -> SolverStart {
        SolverStart {
            initial: Array1::from_vec(self.parameters.to_vector()),
            step_sizes: self.parameters.step_sizes(),
            limits: self.parameters.limits(),
        }
    }

    /// Residuals of every dataset, concatenated in dataset order.
    pub fn residuals_of(&self, parameters: &GlobalParameterSet) -> Result<Array1<f64>> {
        let mut residuals = Vec::with_capacity(self.residual_count());
        for (index, table) in parameters.datasets().iter().enumerate() {
            let part = self.model.dataset_residuals(index, table)?;
            if part.len() != self.model.dataset_residual_count(index) {
                return Err(ItcFitError::DimensionMismatch(format!(
                    "Dataset {} returned {} residuals, expected {}",
                    index,
                    part.len(),
                    self.model.dataset_residual_count(index)
                )));
            }
            residuals.extend(part.iter().copied());
        }
        Ok(Array1::from_vec(residuals))
    }

    /// Run the solver and adopt its solution.
    ///
    /// # Returns
    ///
    /// The convergence record, or a `ConvergenceFailure` error if the solver did
    /// not converge. The parameter set is only updated on success.
    pub fn fit(&mut self, solver: &mut dyn Solver) -> Result<SolverConvergence> {
        let start = self.start();
        let clock = Instant::now();
        let outcome = solver.minimize(&*self, &start)?;
        let convergence = outcome.convergence.into_result()?;

        self.parameters.apply_vector(&outcome.params.to_vec())?;
        debug!(
            "Global fit converged in {} iterations, loss {:.6e}, {:?}",
            convergence.iterations,
            convergence.loss,
            clock.elapsed()
        );
        Ok(convergence)
    }
}

impl<M: GlobalModel> Problem for GlobalFitProblem<M> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let mut trial = self.parameters.clone();
        trial.apply_vector(&params.to_vec())?;
        self.residuals_of(&trial)
    }

    fn parameter_count(&self) -> usize {
        self.parameters.fitting_parameter_count()
    }

    fn residual_count(&self) -> usize {
        (0..self.model.dataset_count())
            .map(|dataset| self.model.dataset_residual_count(dataset))
            .sum()
    }
}

/// One fitted solution of a bootstrap pass.
#[derive(Debug, Clone)]
pub struct FitSample {
    pub parameters: GlobalParameterSet,
    pub convergence: SolverConvergence,
}

/// Bootstrap analysis that refits a global model against resampled data.
///
/// Sampled passes start from the exact solution.
pub struct GlobalFitAnalysis<M, S> {
    model: M,
    start: GlobalParameterSet,
    solver: S,
}

impl<M, S> GlobalFitAnalysis<M, S>
where
    M: ResampleModel + Clone,
    S: Solver,
{
    pub fn new(model: M, start: GlobalParameterSet, solver: S) -> Self {
        Self { model, start, solver }
    }

    fn fit(&mut self, model: M) -> Result<FitSample> {
        let mut problem = GlobalFitProblem::new(model, self.start.clone())?;
        let convergence = problem.fit(&mut self.solver)?;
        let (_, parameters) = problem.into_parts();
        Ok(FitSample {
            parameters,
            convergence,
        })
    }
}

impl<M, S> BootstrapAnalysis for GlobalFitAnalysis<M, S>
where
    M: ResampleModel + Clone,
    S: Solver,
{
    type Output = FitSample;

    fn compute(&mut self, mode: ComputeMode<'_>) -> Result<FitSample> {
        match mode {
            ComputeMode::Exact => {
                let sample = self.fit(self.model.clone())?;
                self.start = sample.parameters.clone();
                Ok(sample)
            }
            ComputeMode::Sampled(sampler) => {
                let model = self.model.perturbed(sampler)?;
                self.fit(model)
            }
        }
    }
}
