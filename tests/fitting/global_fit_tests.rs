use approx::assert_relative_eq;
use itcfit_rs::parameters::ParameterKind;
use itcfit_rs::problem::{GlobalFitAnalysis, GlobalFitProblem, Problem};
use itcfit_rs::uncertainty::{run_bootstrap, BootstrapConfig, RunContext};
use itcfit_rs::ItcFitError;
use ndarray::Array1;

use crate::support::{shared_n_set, CompassSearch, LineModel};

const X: [f64; 5] = [-2.0, -1.0, 0.0, 1.0, 2.0];

#[test]
fn test_shared_n_recovered_from_two_datasets() {
    let model = LineModel::generate(&[(2.0, 1.0), (2.0, -1.0)], &X, 0.05);
    let mut problem = GlobalFitProblem::new(model, shared_n_set(&[20.0, 30.0])).unwrap();
    assert_eq!(problem.parameter_count(), 3);
    assert_eq!(problem.residual_count(), 10);

    let convergence = problem.fit(&mut CompassSearch::default()).unwrap();
    assert!(!convergence.failed);
    assert!(convergence.loss < 1e-12);

    let set = problem.parameters();
    assert_relative_eq!(set.global().value(ParameterKind::Nvalue1).unwrap(), 2.0, epsilon = 1e-6);
    assert_relative_eq!(set.datasets()[0].value(ParameterKind::Offset).unwrap(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(set.datasets()[1].value(ParameterKind::Offset).unwrap(), -1.0, epsilon = 1e-6);
    for table in set.datasets() {
        assert!(table.require(ParameterKind::Nvalue1).unwrap().is_derived());
        assert_relative_eq!(table.value(ParameterKind::Nvalue1).unwrap(), 2.0, epsilon = 1e-6);
    }
}

#[test]
fn test_failed_solver_leaves_parameters() {
    let model = LineModel::generate(&[(2.0, 1.0), (2.0, -1.0)], &X, 0.05);
    let start = shared_n_set(&[20.0, 30.0]);
    let mut problem = GlobalFitProblem::new(model, start.clone()).unwrap();

    let mut solver = CompassSearch {
        max_sweeps: 1,
        tolerance: 1e-10,
    };
    let err = problem.fit(&mut solver).unwrap_err();
    assert!(matches!(err, ItcFitError::ConvergenceFailure(_)));
    assert_eq!(problem.parameters(), &start);
}

#[test]
fn test_eval_rejects_wrong_vector_length() {
    let model = LineModel::generate(&[(1.0, 0.0)], &X, 0.1);
    let problem = GlobalFitProblem::new(model, shared_n_set(&[25.0])).unwrap();
    assert!(problem.eval(&Array1::from(vec![1.0])).is_err());
    assert_eq!(problem.eval(&Array1::from(vec![1.0, 0.0])).unwrap().len(), X.len());
}

#[test]
fn test_dataset_count_must_match_model() {
    let model = LineModel::generate(&[(1.0, 0.0)], &X, 0.1);
    assert!(GlobalFitProblem::new(model, shared_n_set(&[20.0, 30.0])).is_err());
}

#[test]
fn test_bootstrap_of_global_fit() {
    let model = LineModel::generate(&[(2.0, 1.0), (2.0, -1.0)], &X, 0.05);
    let mut analysis = GlobalFitAnalysis::new(model, shared_n_set(&[20.0, 30.0]), CompassSearch::default());
    let config = BootstrapConfig::default().with_iterations(50).with_seed(31);

    let run = run_bootstrap(&mut analysis, config, &mut RunContext::new()).unwrap();
    assert_eq!(run.completed_iterations(), 50);

    let n = run
        .reduce(|sample| sample.parameters.global().value(ParameterKind::Nvalue1).unwrap_or(f64::NAN))
        .unwrap();
    assert_relative_eq!(n.value(), 2.0, epsilon = 1e-6);
    assert!(n.sd() > 0.0);
    assert!(n.sd() < 0.1);

    let ci = n.confidence_interval(0.95);
    assert!(ci.lower < ci.upper);
    assert!(run.samples().iter().all(|sample| !sample.convergence.failed));
}
