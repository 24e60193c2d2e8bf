use itcfit_rs::parameters::{Parameter, ParameterKind, ParameterState, ParameterTable};
use itcfit_rs::ItcFitError;

use crate::support::SINGLE_SITE;

#[test]
fn test_free_parameters_flatten_in_insertion_order() {
    let mut table = ParameterTable::new(25.0);
    table.add(Parameter::with_value(ParameterKind::Offset, -2.0, false).unwrap()).unwrap();
    table.add(Parameter::with_value(ParameterKind::Nvalue1, 1.5, false).unwrap()).unwrap();
    table.add(Parameter::with_value(ParameterKind::Enthalpy1, -8000.0, false).unwrap()).unwrap();

    assert_eq!(table.kinds(), vec![ParameterKind::Offset, ParameterKind::Nvalue1, ParameterKind::Enthalpy1]);
    assert_eq!(table.to_vector(), vec![-2.0, 1.5, -8000.0]);
    assert_eq!(table.step_sizes(), vec![1.0, 0.1, 1000.0]);
}

#[test]
fn test_user_lock_removes_from_vector() {
    let mut table = ParameterTable::with_kinds(20.0, &SINGLE_SITE, false).unwrap();
    table.require_mut(ParameterKind::Nvalue1).unwrap().user_set_value(0.9).unwrap();
    table.require_mut(ParameterKind::Nvalue1).unwrap().user_lock();

    let n = table.require(ParameterKind::Nvalue1).unwrap();
    assert!(n.was_user_edited());
    assert_eq!(n.state(), ParameterState::Locked(0.9));
    assert_eq!(table.fitting_parameter_count(), 3);

    table.from_vector(&[-5000.0, 2.0e5, 0.5]).unwrap();
    assert_eq!(table.value(ParameterKind::Nvalue1), Some(0.9));
    assert_eq!(table.value(ParameterKind::Enthalpy1), Some(-5000.0));
    assert_eq!(table.value(ParameterKind::Offset), Some(0.5));
}

#[test]
fn test_out_of_limits_value_rejected() {
    let mut table = ParameterTable::with_kinds(20.0, &[ParameterKind::Nvalue1], false).unwrap();
    let err = table.from_vector(&[50.0]).unwrap_err();
    assert!(matches!(err, ItcFitError::Parameter(_)));
    assert_eq!(table.value(ParameterKind::Nvalue1), Some(1.0));

    let mut extended = ParameterTable::with_kinds(20.0, &[ParameterKind::Nvalue1], true).unwrap();
    extended.from_vector(&[50.0]).unwrap();
    assert_eq!(extended.value(ParameterKind::Nvalue1), Some(50.0));
}

#[test]
fn test_vector_length_mismatch() {
    let mut table = ParameterTable::with_kinds(20.0, &SINGLE_SITE, false).unwrap();
    assert!(matches!(
        table.from_vector(&[1.0, 2.0]),
        Err(ItcFitError::DimensionMismatch(_))
    ));
}

#[test]
fn test_inspect_reports_every_parameter() {
    let mut table = ParameterTable::with_kinds(30.0, &SINGLE_SITE, false).unwrap();
    table.require_mut(ParameterKind::Offset).unwrap().user_lock();

    let infos = table.inspect();
    assert_eq!(infos.len(), 4);
    assert!(infos.iter().any(|info| info.kind == ParameterKind::Offset && info.is_locked));
    assert_eq!(infos.iter().filter(|info| !info.is_locked).count(), 3);
}

#[test]
fn test_remove_and_missing_kind() {
    let mut table = ParameterTable::with_kinds(30.0, &SINGLE_SITE, false).unwrap();
    assert!(table.remove(ParameterKind::Offset).is_some());
    assert!(!table.contains(ParameterKind::Offset));
    assert!(table.require(ParameterKind::Offset).is_err());
    assert_eq!(table.len(), 3);
}

#[test]
fn test_table_json_round_trip() {
    let mut table = ParameterTable::with_kinds(12.5, &SINGLE_SITE, false).unwrap();
    table.require_mut(ParameterKind::Affinity1).unwrap().lock_derived(3.0e4, ParameterKind::Gibbs1).unwrap();

    let json = serde_json::to_string(&table).unwrap();
    let restored: ParameterTable = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, table);
    assert!(restored.require(ParameterKind::Affinity1).unwrap().is_derived());
}
