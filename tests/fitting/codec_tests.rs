use approx::assert_relative_eq;
use itcfit_rs::codec::{CodecError, SolverParameterBlock, SolverParameterLayout, VariableStyle};
use itcfit_rs::parameters::{ConstraintMode, GlobalParameterSet, ParameterKind};
use std::collections::BTreeMap;

use crate::support::single_site_tables;

const TEMPERATURES: [f64; 2] = [15.0, 35.0];

fn constrained_set() -> GlobalParameterSet {
    let constraints = BTreeMap::from([
        (ParameterKind::Nvalue1, ConstraintMode::SharedAcrossAll),
        (ParameterKind::Enthalpy1, ConstraintMode::TemperatureDependent),
        (ParameterKind::Affinity1, ConstraintMode::TemperatureDependent),
    ]);
    let mut set = GlobalParameterSet::new(constraints, single_site_tables(&TEMPERATURES), false).unwrap();
    let global = set.global_mut();
    global.require_mut(ParameterKind::Nvalue1).unwrap().set_value(1.5).unwrap();
    global.require_mut(ParameterKind::Enthalpy1).unwrap().set_value(-20000.0).unwrap();
    global.require_mut(ParameterKind::HeatCapacity1).unwrap().set_value(-100.0).unwrap();
    global.require_mut(ParameterKind::Gibbs1).unwrap().set_value(-30000.0).unwrap();
    set.propagate_global_to_local().unwrap();
    set
}

#[test]
fn test_layout_mirrors_global_constraints() {
    let set = constrained_set();
    let layout = SolverParameterLayout::from_global(&set).unwrap();

    assert_eq!(layout.enthalpy, VariableStyle::TemperatureDependent);
    assert_eq!(layout.affinity, VariableStyle::TemperatureDependent);
    assert_eq!(layout.n_value, VariableStyle::SameForAll);
    // ΔH_ref, ΔCp, ΔG, N, two offsets
    assert_eq!(layout.parameter_count(), 6);
}

#[test]
fn test_codec_agrees_with_propagation() {
    let set = constrained_set();
    let layout = SolverParameterLayout::from_global(&set).unwrap();
    let block = SolverParameterBlock::decode(layout, &[-20000.0, -100.0, -30000.0, 1.5, 0.0, 0.0]).unwrap();

    for (d, table) in set.datasets().iter().enumerate() {
        assert_relative_eq!(
            block.get_enthalpy(d, &TEMPERATURES).unwrap(),
            table.value(ParameterKind::Enthalpy1).unwrap(),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            block.get_affinity_constant(d, &TEMPERATURES).unwrap(),
            table.value(ParameterKind::Affinity1).unwrap(),
            max_relative = 1e-12
        );
        assert_eq!(block.get_n(d).unwrap(), table.value(ParameterKind::Nvalue1).unwrap());
    }
}

#[test]
fn test_free_layout_one_slot_per_dataset() {
    let layout = SolverParameterLayout::new(VariableStyle::Free, VariableStyle::Free, VariableStyle::Free, 3).unwrap();
    assert_eq!(layout.parameter_count(), 12);

    let guesses = [
        (-10000.0, 1.0e5, 1.0, 0.1),
        (-12000.0, 2.0e5, 1.1, 0.2),
        (-14000.0, 3.0e5, 1.2, 0.3),
    ];
    let temperatures = [20.0, 25.0, 30.0];
    let block = SolverParameterBlock::initial(layout, &guesses, &temperatures).unwrap();

    for (d, guess) in guesses.iter().enumerate() {
        let physical = block.dataset_parameters(d, &temperatures).unwrap();
        assert_eq!(physical.enthalpy, guess.0);
        assert_relative_eq!(physical.affinity, guess.1, max_relative = 1e-9);
        assert_eq!(physical.n_value, guess.2);
        assert_eq!(physical.offset, guess.3);
        assert_eq!(physical.heat_capacity, None);
        assert_relative_eq!(physical.entropy_term, physical.gibbs - physical.enthalpy);
    }
}

#[test]
fn test_shared_affinity_uses_reference_temperature() {
    let layout = SolverParameterLayout::new(VariableStyle::Free, VariableStyle::SameForAll, VariableStyle::Free, 2)
        .unwrap()
        .with_reference_temperature(30.0);
    let temperatures = [10.0, 50.0];
    let block = SolverParameterBlock::decode(layout, &[-1.0, -2.0, -30000.0, 1.0, 1.0, 0.0, 0.0]).unwrap();

    let k0 = block.get_affinity_constant(0, &temperatures).unwrap();
    let k1 = block.get_affinity_constant(1, &temperatures).unwrap();
    assert_eq!(k0, k1);
    assert_relative_eq!(k0, (30000.0f64 / (8.3145 * 303.15)).exp(), max_relative = 1e-12);
}

#[test]
fn test_codec_errors() {
    let layout = SolverParameterLayout::new(VariableStyle::SameForAll, VariableStyle::SameForAll, VariableStyle::SameForAll, 2)
        .unwrap();
    assert_eq!(layout.parameter_count(), 5);

    assert_eq!(
        SolverParameterBlock::decode(layout, &[0.0; 4]).unwrap_err(),
        CodecError::LengthMismatch { expected: 5, actual: 4 }
    );

    let block = SolverParameterBlock::decode(layout, &[0.0, -30000.0, 1.0, 0.0, 0.0]).unwrap();
    assert_eq!(
        block.get_offset(2).unwrap_err(),
        CodecError::DatasetOutOfRange { index: 2, count: 2 }
    );
    assert_eq!(
        block.get_enthalpy(0, &[25.0]).unwrap_err(),
        CodecError::TemperatureCountMismatch { expected: 2, actual: 1 }
    );

    assert_eq!(
        SolverParameterLayout::new(VariableStyle::Free, VariableStyle::Free, VariableStyle::Free, 0).unwrap_err(),
        CodecError::NoDatasets
    );
    assert!(matches!(
        SolverParameterLayout::new(VariableStyle::Free, VariableStyle::Free, VariableStyle::TemperatureDependent, 1),
        Err(CodecError::UnsupportedStyle { .. })
    ));
}
