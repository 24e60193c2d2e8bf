//! Test fixtures: a derivative-free solver and a linear global model.

#![allow(dead_code)]

use itcfit_rs::convergence::{ConvergenceStatus, SolverAlgorithm, SolverConvergence};
use itcfit_rs::parameters::{ConstraintMode, GlobalParameterSet, ParameterKind, ParameterTable};
use itcfit_rs::problem::{GlobalModel, Problem, ResampleModel, Solver, SolverOutcome, SolverStart};
use itcfit_rs::uncertainty::Sampler;
use itcfit_rs::{Result, ValueWithError};
use ndarray::Array1;
use std::collections::BTreeMap;
use std::time::Instant;

/// Compass search: try ± one step per coordinate, halve the step when neither helps.
pub struct CompassSearch {
    pub max_sweeps: usize,
    pub tolerance: f64,
}

impl Default for CompassSearch {
    fn default() -> Self {
        Self {
            max_sweeps: 20_000,
            tolerance: 1e-10,
        }
    }
}

impl Solver for CompassSearch {
    fn minimize(&mut self, problem: &dyn Problem, start: &SolverStart) -> Result<SolverOutcome> {
        let clock = Instant::now();
        let mut x = start.initial.clone();
        let mut steps = start.step_sizes.clone();
        let mut cost = problem.eval_cost(&x)?;
        let mut sweeps = 0;

        let converged = |steps: &[f64]| {
            steps
                .iter()
                .zip(&start.step_sizes)
                .all(|(step, initial)| *step <= self.tolerance * initial)
        };

        while sweeps < self.max_sweeps && !converged(&steps) {
            sweeps += 1;
            for i in 0..x.len() {
                let (lo, hi) = start.limits[i];
                let mut improved = false;
                for direction in [1.0, -1.0] {
                    let mut trial = x.clone();
                    trial[i] = (x[i] + direction * steps[i]).clamp(lo, hi);
                    if let Ok(trial_cost) = problem.eval_cost(&trial) {
                        if trial_cost < cost {
                            x = trial;
                            cost = trial_cost;
                            improved = true;
                            break;
                        }
                    }
                }
                if !improved {
                    steps[i] *= 0.5;
                }
            }
        }

        let status = if converged(&steps) {
            ConvergenceStatus::ParameterConvergence
        } else {
            ConvergenceStatus::MaxIterationsReached
        };
        Ok(SolverOutcome {
            params: x,
            convergence: SolverConvergence::new(
                status,
                SolverAlgorithm::Other("CompassSearch".to_string()),
                sweeps,
                cost,
                clock.elapsed(),
            ),
        })
    }
}

/// `y = offset + n·x` for every dataset, with uncertain observations.
#[derive(Debug, Clone)]
pub struct LineModel {
    pub x: Vec<f64>,
    pub y: Vec<Vec<ValueWithError>>,
}

impl LineModel {
    /// Exact data for the given per-dataset `(n, offset)` with a common noise sd.
    pub fn generate(truth: &[(f64, f64)], x: &[f64], sd: f64) -> Self {
        let y = truth
            .iter()
            .map(|&(n, offset)| {
                x.iter()
                    .map(|&x| ValueWithError::new(offset + n * x, sd))
                    .collect()
            })
            .collect();
        Self { x: x.to_vec(), y }
    }
}

impl GlobalModel for LineModel {
    fn dataset_count(&self) -> usize {
        self.y.len()
    }

    fn dataset_residual_count(&self, _dataset: usize) -> usize {
        self.x.len()
    }

    fn dataset_residuals(&self, dataset: usize, params: &ParameterTable) -> Result<Array1<f64>> {
        let n = params.require(ParameterKind::Nvalue1)?.value();
        let offset = params.require(ParameterKind::Offset)?.value();
        Ok(self
            .x
            .iter()
            .zip(&self.y[dataset])
            .map(|(x, y)| offset + n * x - y.value())
            .collect())
    }
}

impl ResampleModel for LineModel {
    fn perturbed(&self, sampler: &mut Sampler) -> Result<Self> {
        let y = self
            .y
            .iter()
            .map(|dataset| {
                dataset
                    .iter()
                    .map(|y| ValueWithError::new(sampler.sample(y), y.sd()))
                    .collect()
            })
            .collect();
        Ok(Self {
            x: self.x.clone(),
            y,
        })
    }
}

/// Tables of `[Nvalue1, Offset]` at the given temperatures, N shared across all.
pub fn shared_n_set(temperatures: &[f64]) -> GlobalParameterSet {
    let kinds = [ParameterKind::Nvalue1, ParameterKind::Offset];
    let datasets = temperatures
        .iter()
        .map(|&t| ParameterTable::with_kinds(t, &kinds, false).unwrap())
        .collect();
    let constraints = BTreeMap::from([(ParameterKind::Nvalue1, ConstraintMode::SharedAcrossAll)]);
    GlobalParameterSet::new(constraints, datasets, false).unwrap()
}

/// The four kinds of a single-site binding model.
pub const SINGLE_SITE: [ParameterKind; 4] = [
    ParameterKind::Nvalue1,
    ParameterKind::Enthalpy1,
    ParameterKind::Affinity1,
    ParameterKind::Offset,
];

/// Single-site tables at the given temperatures.
pub fn single_site_tables(temperatures: &[f64]) -> Vec<ParameterTable> {
    temperatures
        .iter()
        .map(|&t| ParameterTable::with_kinds(t, &SINGLE_SITE, false).unwrap())
        .collect()
}
