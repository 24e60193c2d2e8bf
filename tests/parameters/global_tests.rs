use approx::assert_relative_eq;
use itcfit_rs::config::FitSettings;
use itcfit_rs::parameters::{
    ConstraintMode, GlobalParameterError, GlobalParameterSet, ParameterKind, ParameterState,
};
use itcfit_rs::ItcFitError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use crate::support::{shared_n_set, single_site_tables};

fn set_with(constraints: &[(ParameterKind, ConstraintMode)], temperatures: &[f64]) -> GlobalParameterSet {
    GlobalParameterSet::new(
        constraints.iter().copied().collect::<BTreeMap<_, _>>(),
        single_site_tables(temperatures),
        false,
    )
    .unwrap()
}

#[test]
fn test_shared_n_across_three_datasets() {
    let mut set = set_with(
        &[(ParameterKind::Nvalue1, ConstraintMode::SharedAcrossAll)],
        &[10.0, 25.0, 40.0],
    );
    assert_eq!(set.fitting_parameter_count(), 1 + 3 * 3);

    set.global_mut().require_mut(ParameterKind::Nvalue1).unwrap().set_value(1.7).unwrap();
    set.propagate_global_to_local().unwrap();

    for table in set.datasets() {
        let n = table.require(ParameterKind::Nvalue1).unwrap();
        assert_eq!(n.value(), 1.7);
        assert_eq!(
            n.state(),
            ParameterState::LockedDerived {
                value: 1.7,
                source: ParameterKind::Nvalue1
            }
        );
    }
}

#[test]
fn test_temperature_dependent_enthalpy_scenario() {
    let mut set = set_with(
        &[(ParameterKind::Enthalpy1, ConstraintMode::TemperatureDependent)],
        &[15.0, 35.0],
    );
    assert_eq!(set.reference_temperature().unwrap(), 25.0);

    let global = set.global_mut();
    global.require_mut(ParameterKind::Enthalpy1).unwrap().set_value(-20000.0).unwrap();
    global.require_mut(ParameterKind::HeatCapacity1).unwrap().set_value(-100.0).unwrap();
    set.propagate_global_to_local().unwrap();

    assert_relative_eq!(set.datasets()[0].value(ParameterKind::Enthalpy1).unwrap(), -19000.0);
    assert_relative_eq!(set.datasets()[1].value(ParameterKind::Enthalpy1).unwrap(), -21000.0);
}

#[test]
fn test_temperature_dependent_affinity_scenario() {
    let mut set = set_with(
        &[(ParameterKind::Affinity1, ConstraintMode::TemperatureDependent)],
        &[25.0],
    );
    assert!(set.global().contains(ParameterKind::Gibbs1));
    assert!(!set.global().contains(ParameterKind::Affinity1));

    set.global_mut().require_mut(ParameterKind::Gibbs1).unwrap().set_value(-30000.0).unwrap();
    set.propagate_global_to_local().unwrap();

    let affinity = set.datasets()[0].require(ParameterKind::Affinity1).unwrap();
    assert_relative_eq!(affinity.value(), (30000.0f64 / (8.3145 * 298.15)).exp(), max_relative = 1e-12);
    assert_relative_eq!(affinity.value(), 1.80e5, max_relative = 0.01);
    assert!(matches!(
        affinity.state(),
        ParameterState::LockedDerived {
            source: ParameterKind::Gibbs1,
            ..
        }
    ));
}

#[test]
fn test_affinity_follows_dataset_temperature() {
    let mut set = set_with(
        &[(ParameterKind::Affinity1, ConstraintMode::TemperatureDependent)],
        &[10.0, 40.0],
    );
    set.global_mut().require_mut(ParameterKind::Gibbs1).unwrap().set_value(-30000.0).unwrap();
    set.propagate_global_to_local().unwrap();

    let cold = set.datasets()[0].value(ParameterKind::Affinity1).unwrap();
    let warm = set.datasets()[1].value(ParameterKind::Affinity1).unwrap();
    assert!(cold > warm);
}

#[test]
fn test_gas_constant_override() {
    let set = set_with(
        &[(ParameterKind::Affinity1, ConstraintMode::TemperatureDependent)],
        &[25.0],
    );
    let gibbs = set.global().value(ParameterKind::Gibbs1).unwrap();

    let set = set.with_gas_constant(8.314462618).unwrap();
    let expected = (-gibbs / (8.314462618 * 298.15)).exp();
    assert_relative_eq!(
        set.datasets()[0].value(ParameterKind::Affinity1).unwrap(),
        expected,
        max_relative = 1e-12
    );

    assert!(matches!(
        set.with_gas_constant(-1.0),
        Err(ItcFitError::GlobalParameter(GlobalParameterError::InvalidGasConstant(_)))
    ));
}

#[test]
fn test_random_vector_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let mut set = set_with(
        &[
            (ParameterKind::Nvalue1, ConstraintMode::SharedAcrossAll),
            (ParameterKind::Enthalpy1, ConstraintMode::TemperatureDependent),
        ],
        &[15.0, 25.0, 35.0],
    );

    for _ in 0..50 {
        let vector: Vec<f64> = set
            .limits()
            .iter()
            .map(|&(lo, hi)| {
                let (lo, hi) = (lo.max(-1.0e4), hi.min(1.0e4));
                rng.gen_range(lo..hi)
            })
            .collect();
        set.from_vector(&vector).unwrap();
        assert_eq!(set.to_vector(), vector);
    }
}

#[test]
fn test_apply_vector_is_idempotent_under_repropagation() {
    let mut set = shared_n_set(&[20.0, 30.0]);
    set.apply_vector(&[2.0, 1.0, -1.0]).unwrap();
    let before = set.clone();

    set.propagate_global_to_local().unwrap();
    assert_eq!(set, before);
    assert_eq!(set.to_vector(), vec![2.0, 1.0, -1.0]);
}

#[test]
fn test_rejected_vector_leaves_set_untouched() {
    let mut set = shared_n_set(&[20.0, 30.0]);
    set.apply_vector(&[2.0, 1.0, -1.0]).unwrap();
    let before = set.clone();

    assert!(matches!(
        set.from_vector(&[2.0, 1.0]),
        Err(ItcFitError::DimensionMismatch(_))
    ));
    assert!(set.from_vector(&[2.0, 1.0, 1.0e9]).is_err());
    assert_eq!(set, before);
}

#[test]
fn test_temperature_dependence_requires_datasets() {
    let constraints = BTreeMap::from([(ParameterKind::Enthalpy1, ConstraintMode::TemperatureDependent)]);
    let err = GlobalParameterSet::new(constraints, Vec::new(), false).unwrap_err();
    assert!(matches!(
        err,
        ItcFitError::GlobalParameter(GlobalParameterError::UndefinedReferenceTemperature {
            kind: ParameterKind::Enthalpy1
        })
    ));
}

#[test]
fn test_unsupported_modes_rejected() {
    for (kind, mode) in [
        (ParameterKind::Nvalue1, ConstraintMode::TemperatureDependent),
        (ParameterKind::Offset, ConstraintMode::TemperatureDependent),
        (ParameterKind::Gibbs1, ConstraintMode::SharedAcrossAll),
    ] {
        let result = GlobalParameterSet::new(BTreeMap::from([(kind, mode)]), single_site_tables(&[25.0]), false);
        assert!(matches!(
            result,
            Err(ItcFitError::GlobalParameter(GlobalParameterError::UnsupportedConstraint { .. }))
        ));
    }
}

#[test]
fn test_unconstrained_tables_keep_local_freedom() {
    let set = set_with(&[], &[20.0, 30.0]);
    assert!(set.global().is_empty());
    assert_eq!(set.fitting_parameter_count(), 8);
    assert_eq!(set.constraint(ParameterKind::Enthalpy1), ConstraintMode::None);
}

fn global_index(set: &GlobalParameterSet, kind: ParameterKind) -> usize {
    set.global().kinds().iter().position(|&k| k == kind).unwrap()
}

#[test]
fn test_extreme_gibbs_values_stay_inside_affinity_limits() {
    let mut set = set_with(
        &[
            (ParameterKind::Nvalue1, ConstraintMode::SharedAcrossAll),
            (ParameterKind::Affinity1, ConstraintMode::TemperatureDependent),
        ],
        &[15.0, 35.0],
    );
    let n = global_index(&set, ParameterKind::Nvalue1);
    let g = global_index(&set, ParameterKind::Gibbs1);
    let (g_min, g_max) = set.limits()[g];
    assert!(g_min > -100_000.0 && g_max < 0.0);

    for gibbs in [g_min, g_max] {
        let mut vector = set.to_vector();
        vector[n] = 2.0;
        vector[g] = gibbs;
        set.apply_vector(&vector).unwrap();

        for table in set.datasets() {
            let affinity = table.require(ParameterKind::Affinity1).unwrap();
            assert!(affinity.limits().contains(affinity.value()));
            assert_eq!(table.value(ParameterKind::Nvalue1), Some(2.0));
        }
    }

    // ΔG = -80 kJ/mol would give K ≈ 3e14 at 15 °C; the solver is never offered it
    let mut vector = set.to_vector();
    vector[g] = -80_000.0;
    assert!(set.apply_vector(&vector).is_err());
}

#[test]
fn test_failed_propagation_leaves_set_untouched() {
    let mut set = set_with(
        &[
            (ParameterKind::Nvalue1, ConstraintMode::SharedAcrossAll),
            (ParameterKind::Enthalpy1, ConstraintMode::TemperatureDependent),
        ],
        &[15.0, 35.0],
    );
    let before = set.clone();

    // ΔH at 35 °C would be -500 kJ/mol + 10 K × -10 kJ/(mol·K), below the enthalpy limit
    let mut vector = set.to_vector();
    vector[global_index(&set, ParameterKind::Nvalue1)] = 2.0;
    vector[global_index(&set, ParameterKind::Enthalpy1)] = -500_000.0;
    vector[global_index(&set, ParameterKind::HeatCapacity1)] = -10_000.0;

    assert!(matches!(set.apply_vector(&vector), Err(ItcFitError::Parameter(_))));
    assert_eq!(set, before);
    for table in set.datasets() {
        assert_eq!(table.value(ParameterKind::Nvalue1), before.global().value(ParameterKind::Nvalue1));
    }
}

#[test]
fn test_from_settings_applies_limits_and_gas_constant() {
    let settings = FitSettings {
        extended_limits: true,
        gas_constant: 8.314462618,
        ..FitSettings::default()
    };
    let constraints = BTreeMap::from([
        (ParameterKind::Nvalue1, ConstraintMode::SharedAcrossAll),
        (ParameterKind::Affinity1, ConstraintMode::TemperatureDependent),
    ]);
    let set = GlobalParameterSet::from_settings(constraints.clone(), single_site_tables(&[25.0]), &settings).unwrap();

    assert!(set.extended_limits());
    assert_eq!(set.gas_constant(), 8.314462618);

    let gibbs = set.global().value(ParameterKind::Gibbs1).unwrap();
    assert_relative_eq!(
        set.datasets()[0].value(ParameterKind::Affinity1).unwrap(),
        (-gibbs / (8.314462618 * 298.15)).exp(),
        max_relative = 1e-12
    );

    // Global Gibbs limits take the extended kind limits as their outer bound
    let narrow = GlobalParameterSet::new(constraints, single_site_tables(&[25.0]), false).unwrap();
    let g = global_index(&set, ParameterKind::Gibbs1);
    assert!(!narrow.extended_limits());
    assert!(set.limits()[g].1 >= narrow.limits()[g].1);

    let invalid = FitSettings {
        gas_constant: 0.0,
        ..FitSettings::default()
    };
    assert!(GlobalParameterSet::from_settings(BTreeMap::new(), single_site_tables(&[25.0]), &invalid).is_err());
}
