//! Global parameter sets for multi-dataset fitting
//!
//! A [`GlobalParameterSet`] governs the parameter tables of several datasets that
//! are fitted jointly. Each parameter kind carries a [`ConstraintMode`]:
//!
//! - `None`: the kind is fitted independently in every dataset.
//! - `SharedAcrossAll`: one global value is copied into every dataset and locked there.
//! - `TemperatureDependent`: enthalpies follow `ΔH_ref + (T − T_ref)·ΔCp` and
//!   affinities follow the van't Hoff relation `K = exp(−ΔG/(R·T))`, both driven by
//!   global parameters.
//!
//! The flattened vector handed to a solver holds the free global parameters first,
//! then the free parameters of each dataset in order. [`GlobalParameterSet::apply_vector`]
//! performs the canonical update: global unflatten, per-dataset unflatten, then
//! [`GlobalParameterSet::propagate_global_to_local`].
//!
//! The limits of a global Gibbs energy are narrowed so that every value the solver
//! may propose maps to an affinity inside the limits of each governed dataset.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::kind::{ParameterFamily, ParameterKind};
use super::parameter::{Parameter, ParameterState};
use super::table::ParameterTable;
use crate::config::FitSettings;
use crate::constants::{affinity_from_gibbs, celsius_to_kelvin, gibbs_from_affinity, GAS_CONSTANT};
use crate::error::{ItcFitError, Result};

/// Errors raised by global parameter sets
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlobalParameterError {
    #[error("Reference temperature for '{kind}' is undefined: no datasets are governed")]
    UndefinedReferenceTemperature { kind: ParameterKind },

    #[error("Constraint mode '{mode}' is not supported for parameter '{kind}'")]
    UnsupportedConstraint {
        kind: ParameterKind,
        mode: ConstraintMode,
    },

    #[error("Global parameter '{kind}' is missing")]
    MissingGlobalParameter { kind: ParameterKind },

    #[error("Invalid gas constant {0}")]
    InvalidGasConstant(f64),
}

/// How a parameter kind is tied across datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConstraintMode {
    #[default]
    None,
    SharedAcrossAll,
    TemperatureDependent,
}

impl ConstraintMode {
    /// Stable identifier used in the persisted text format
    pub const fn as_str(self) -> &'static str {
        match self {
            ConstraintMode::None => "None",
            ConstraintMode::SharedAcrossAll => "SharedAcrossAll",
            ConstraintMode::TemperatureDependent => "TemperatureDependent",
        }
    }

    /// Whether the mode ties the kind to a global value
    pub fn is_constrained(self) -> bool {
        self != ConstraintMode::None
    }
}

impl fmt::Display for ConstraintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a constraint mode identifier is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown constraint mode '{0}'")]
pub struct UnknownConstraintMode(pub String);

impl FromStr for ConstraintMode {
    type Err = UnknownConstraintMode;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "None" => Ok(ConstraintMode::None),
            "SharedAcrossAll" => Ok(ConstraintMode::SharedAcrossAll),
            "TemperatureDependent" => Ok(ConstraintMode::TemperatureDependent),
            other => Err(UnknownConstraintMode(other.to_string())),
        }
    }
}

/// Relative inset applied to derived Gibbs limits so that rounding in the
/// van't Hoff conversion cannot push an affinity past its own limit
const GIBBS_LIMIT_INSET: f64 = 1e-9;

/// Shared parameters and constraints of a joint fit over several datasets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalParameterSet {
    constraints: BTreeMap<ParameterKind, ConstraintMode>,
    global: ParameterTable,
    datasets: Vec<ParameterTable>,
    gas_constant: f64,
    #[serde(default)]
    extended_limits: bool,
}

impl GlobalParameterSet {
    /// Create a set governing `datasets` under the given constraints
    ///
    /// Builds the global table (one entry per shared kind, enthalpy plus heat
    /// capacity for a temperature-dependent enthalpy, Gibbs energy for a
    /// temperature-dependent affinity) seeded from the first dataset, then
    /// propagates once so every constrained dataset entry is locked before the
    /// first flatten.
    ///
    /// # Returns
    ///
    /// An error if a mode is unsupported for its kind, or if a temperature
    /// dependence is requested without any dataset to define the reference
    /// temperature
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use itcfit_rs::parameters::{ConstraintMode, GlobalParameterSet, ParameterKind, ParameterTable};
    ///
    /// let kinds = [ParameterKind::Nvalue1, ParameterKind::Enthalpy1, ParameterKind::Affinity1];
    /// let datasets = vec![
    ///     ParameterTable::with_kinds(15.0, &kinds, false).unwrap(),
    ///     ParameterTable::with_kinds(35.0, &kinds, false).unwrap(),
    /// ];
    /// let mut constraints = BTreeMap::new();
    /// constraints.insert(ParameterKind::Nvalue1, ConstraintMode::SharedAcrossAll);
    ///
    /// let set = GlobalParameterSet::new(constraints, datasets, false).unwrap();
    /// // one shared N plus (ΔH, K) for each dataset
    /// assert_eq!(set.fitting_parameter_count(), 5);
    /// ```
    pub fn new(
        constraints: BTreeMap<ParameterKind, ConstraintMode>,
        datasets: Vec<ParameterTable>,
        extended_limits: bool,
    ) -> Result<Self> {
        let mut global = ParameterTable::new(mean_temperature(&datasets).unwrap_or_default());

        for (&kind, &mode) in &constraints {
            validate_mode(kind, mode)?;
            if mode == ConstraintMode::TemperatureDependent && datasets.is_empty() {
                return Err(GlobalParameterError::UndefinedReferenceTemperature { kind }.into());
            }

            let seed = datasets.first().and_then(|table| table.get(kind));
            match mode {
                ConstraintMode::None => {}
                ConstraintMode::SharedAcrossAll => {
                    global.add(seeded(kind, seed, extended_limits))?;
                }
                ConstraintMode::TemperatureDependent => {
                    if let Some(cp_kind) = kind.heat_capacity_kind() {
                        global.add(seeded(kind, seed, extended_limits))?;
                        global.add(Parameter::new(cp_kind, extended_limits))?;
                    } else if let Some(gibbs_kind) = kind.gibbs_kind() {
                        let mut gibbs = Parameter::new(gibbs_kind, extended_limits);
                        if let (Some(affinity), Some(first)) = (seed, datasets.first()) {
                            let value = gibbs_from_affinity(affinity.value(), first.temperature(), GAS_CONSTANT);
                            if value.is_finite() {
                                gibbs.set_value(gibbs.limits().clamp(value))?;
                            }
                        }
                        global.add(gibbs)?;
                    }
                }
            }
        }

        let mut set = Self {
            constraints,
            global,
            datasets,
            gas_constant: GAS_CONSTANT,
            extended_limits,
        };
        set.fit_gibbs_limits()?;
        set.propagate_global_to_local()?;
        Ok(set)
    }

    /// Create a set using the limit widening and gas constant of `settings`
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use itcfit_rs::config::FitSettings;
    /// use itcfit_rs::parameters::{GlobalParameterSet, ParameterKind, ParameterTable};
    ///
    /// let settings = FitSettings { extended_limits: true, gas_constant: 8.314, ..FitSettings::default() };
    /// let datasets = vec![ParameterTable::with_kinds(25.0, &[ParameterKind::Nvalue1], true).unwrap()];
    ///
    /// let set = GlobalParameterSet::from_settings(BTreeMap::new(), datasets, &settings).unwrap();
    /// assert!(set.extended_limits());
    /// assert_eq!(set.gas_constant(), 8.314);
    /// ```
    pub fn from_settings(
        constraints: BTreeMap<ParameterKind, ConstraintMode>,
        datasets: Vec<ParameterTable>,
        settings: &FitSettings,
    ) -> Result<Self> {
        Self::new(constraints, datasets, settings.extended_limits)?.with_gas_constant(settings.gas_constant)
    }

    /// Use a different gas constant for van't Hoff conversions and re-propagate
    ///
    /// Gibbs limits are re-derived for the new constant; a Gibbs value outside
    /// them is clamped.
    pub fn with_gas_constant(mut self, gas_constant: f64) -> Result<Self> {
        if !(gas_constant.is_finite() && gas_constant > 0.0) {
            return Err(GlobalParameterError::InvalidGasConstant(gas_constant).into());
        }
        self.gas_constant = gas_constant;
        self.fit_gibbs_limits()?;
        self.propagate_global_to_local()?;
        Ok(self)
    }

    /// Whether global parameters were created with the extended limits
    pub fn extended_limits(&self) -> bool {
        self.extended_limits
    }

    /// The gas constant used for van't Hoff conversions
    pub fn gas_constant(&self) -> f64 {
        self.gas_constant
    }

    /// The constraint mode of a kind; `None` when not listed
    pub fn constraint(&self, kind: ParameterKind) -> ConstraintMode {
        self.constraints.get(&kind).copied().unwrap_or_default()
    }

    /// All listed constraints in kind order
    pub fn constraints(&self) -> &BTreeMap<ParameterKind, ConstraintMode> {
        &self.constraints
    }

    /// The global table
    pub fn global(&self) -> &ParameterTable {
        &self.global
    }

    /// Mutable access to the global table, for user edits before a fit
    pub fn global_mut(&mut self) -> &mut ParameterTable {
        &mut self.global
    }

    /// The governed dataset tables in order
    pub fn datasets(&self) -> &[ParameterTable] {
        &self.datasets
    }

    /// One dataset table
    pub fn dataset(&self, index: usize) -> Option<&ParameterTable> {
        self.datasets.get(index)
    }

    /// Mutable access to one dataset table
    pub fn dataset_mut(&mut self, index: usize) -> Option<&mut ParameterTable> {
        self.datasets.get_mut(index)
    }

    /// Number of governed datasets
    pub fn dataset_count(&self) -> usize {
        self.datasets.len()
    }

    /// Hand the dataset tables back to their owners
    pub fn into_datasets(self) -> Vec<ParameterTable> {
        self.datasets
    }

    /// Mean temperature (°C) of the governed datasets
    ///
    /// # Returns
    ///
    /// An error when there are no datasets
    pub fn reference_temperature(&self) -> Result<f64> {
        mean_temperature(&self.datasets).ok_or_else(|| {
            let kind = self
                .constraints
                .iter()
                .find(|(_, mode)| **mode == ConstraintMode::TemperatureDependent)
                .map(|(&kind, _)| kind)
                .unwrap_or(ParameterKind::Enthalpy1);
            GlobalParameterError::UndefinedReferenceTemperature { kind }.into()
        })
    }

    /// Push global values into every dataset table according to the constraints
    ///
    /// Constrained entries are overwritten and locked, so the next
    /// [`to_vector`](Self::to_vector) omits them. Calling this twice without an
    /// intervening vector update leaves the tables unchanged. If any derived value
    /// is rejected by its dataset's limits, no dataset is modified.
    pub fn propagate_global_to_local(&mut self) -> Result<()> {
        let datasets = self.propagated(&self.global, self.datasets.clone())?;
        self.datasets = datasets;
        Ok(())
    }

    /// Number of free parameters across the global table and every dataset
    pub fn fitting_parameter_count(&self) -> usize {
        self.global.fitting_parameter_count()
            + self
                .datasets
                .iter()
                .map(ParameterTable::fitting_parameter_count)
                .sum::<usize>()
    }

    /// Flatten the free parameters: global first, then each dataset in order
    pub fn to_vector(&self) -> Vec<f64> {
        self.tables().flat_map(ParameterTable::to_vector).collect()
    }

    /// Initial step sizes, in the order of [`to_vector`](Self::to_vector)
    pub fn step_sizes(&self) -> Vec<f64> {
        self.tables().flat_map(ParameterTable::step_sizes).collect()
    }

    /// `(min, max)` limits, in the order of [`to_vector`](Self::to_vector)
    pub fn limits(&self) -> Vec<(f64, f64)> {
        self.tables().flat_map(ParameterTable::limits).collect()
    }

    /// Unflatten a solver vector into the global and dataset tables
    ///
    /// Nothing is modified unless the whole vector is accepted.
    ///
    /// # Returns
    ///
    /// A `DimensionMismatch` error if the length differs from
    /// [`fitting_parameter_count`](Self::fitting_parameter_count), or a bounds error
    pub fn from_vector(&mut self, values: &[f64]) -> Result<()> {
        let (global, datasets) = self.unflattened(values)?;
        self.global = global;
        self.datasets = datasets;
        Ok(())
    }

    /// Unflatten then propagate: the update to run before every residual evaluation
    ///
    /// Both steps run on copies; the set is only modified when both succeed.
    pub fn apply_vector(&mut self, values: &[f64]) -> Result<()> {
        let (global, datasets) = self.unflattened(values)?;
        let datasets = self.propagated(&global, datasets)?;
        self.global = global;
        self.datasets = datasets;
        Ok(())
    }

    fn unflattened(&self, values: &[f64]) -> Result<(ParameterTable, Vec<ParameterTable>)> {
        let expected = self.fitting_parameter_count();
        if values.len() != expected {
            return Err(ItcFitError::DimensionMismatch(format!(
                "Expected {} values for the global fit, got {}",
                expected,
                values.len()
            )));
        }

        let mut global = self.global.clone();
        let mut datasets = self.datasets.clone();
        let mut rest = global.consume(values)?;
        for table in &mut datasets {
            rest = table.consume(rest)?;
        }
        Ok((global, datasets))
    }

    /// `datasets` with the values of `global` propagated into them
    fn propagated(&self, global: &ParameterTable, mut datasets: Vec<ParameterTable>) -> Result<Vec<ParameterTable>> {
        let reference = if self.has_temperature_dependence() {
            Some(self.reference_temperature()?)
        } else {
            None
        };

        for (index, table) in datasets.iter_mut().enumerate() {
            let temperature = table.temperature();
            for param in table.iter_mut() {
                let kind = param.kind();
                let mode = self.constraint(kind);
                if let Some(state) = derived_state(global, kind, mode, temperature, reference, self.gas_constant)? {
                    param.set_state(state)?;
                }
            }
            debug!("Propagated global parameters into dataset {} at {} °C", index, temperature);
        }
        Ok(datasets)
    }

    /// Narrow each global Gibbs energy to the values whose affinities every
    /// governed dataset accepts
    fn fit_gibbs_limits(&mut self) -> Result<()> {
        let pairs: Vec<(ParameterKind, ParameterKind)> = self
            .constraints
            .iter()
            .filter(|(_, mode)| **mode == ConstraintMode::TemperatureDependent)
            .filter_map(|(&kind, _)| kind.gibbs_kind().map(|gibbs| (kind, gibbs)))
            .collect();

        for (affinity_kind, gibbs_kind) in pairs {
            let (min, max) = gibbs_limits(
                gibbs_kind,
                affinity_kind,
                &self.datasets,
                self.gas_constant,
                self.extended_limits,
            );
            if let Some(gibbs) = self.global.get_mut(gibbs_kind) {
                gibbs.set_limits(min, max)?;
            }
        }
        Ok(())
    }

    fn has_temperature_dependence(&self) -> bool {
        self.constraints
            .values()
            .any(|&mode| mode == ConstraintMode::TemperatureDependent)
    }

    fn tables(&self) -> impl Iterator<Item = &ParameterTable> {
        std::iter::once(&self.global).chain(self.datasets.iter())
    }
}

fn mean_temperature(datasets: &[ParameterTable]) -> Option<f64> {
    if datasets.is_empty() {
        return None;
    }
    let sum: f64 = datasets.iter().map(ParameterTable::temperature).sum();
    Some(sum / datasets.len() as f64)
}

/// Gibbs limits `(min, max)` for `gibbs_kind` such that `K = exp(−ΔG/(R·T))`
/// stays inside the affinity limits at every dataset temperature
///
/// `K ≤ K_max` requires `ΔG ≥ −R·T·ln K_max` and `K ≥ K_min` requires
/// `ΔG ≤ −R·T·ln K_min`; the result is the intersection over datasets and the
/// kind's own limits, inset slightly at derived ends.
fn gibbs_limits(
    gibbs_kind: ParameterKind,
    affinity_kind: ParameterKind,
    datasets: &[ParameterTable],
    gas_constant: f64,
    extended_limits: bool,
) -> (f64, f64) {
    let (mut min, mut max) = gibbs_kind.limits(extended_limits).as_pair();
    for table in datasets {
        let Some(affinity) = table.get(affinity_kind) else {
            continue;
        };
        let rt = gas_constant * celsius_to_kelvin(table.temperature());
        let lower = -rt * affinity.max().ln();
        let upper = -rt * affinity.min().ln();
        if lower > min {
            min = lower + lower.abs() * GIBBS_LIMIT_INSET;
        }
        if upper < max {
            max = upper - upper.abs() * GIBBS_LIMIT_INSET;
        }
    }
    (min, max)
}

fn validate_mode(kind: ParameterKind, mode: ConstraintMode) -> Result<()> {
    let supported = match (kind.family(), mode) {
        (_, ConstraintMode::None) => true,
        (
            ParameterFamily::Stoichiometry
            | ParameterFamily::Enthalpy
            | ParameterFamily::Affinity
            | ParameterFamily::Offset,
            ConstraintMode::SharedAcrossAll,
        ) => true,
        (ParameterFamily::Enthalpy | ParameterFamily::Affinity, ConstraintMode::TemperatureDependent) => true,
        _ => false,
    };
    if supported {
        Ok(())
    } else {
        Err(GlobalParameterError::UnsupportedConstraint { kind, mode }.into())
    }
}

/// A free global parameter starting from the dataset's value when there is one
fn seeded(kind: ParameterKind, seed: Option<&Parameter>, extended_limits: bool) -> Parameter {
    let mut param = seed.cloned().unwrap_or_else(|| Parameter::new(kind, extended_limits));
    param.unlock();
    param
}

fn global_value(global: &ParameterTable, kind: ParameterKind) -> Result<f64> {
    global
        .value(kind)
        .ok_or_else(|| GlobalParameterError::MissingGlobalParameter { kind }.into())
}

/// The state a dataset entry of `kind` takes after propagation, or `None` to leave it alone
fn derived_state(
    global: &ParameterTable,
    kind: ParameterKind,
    mode: ConstraintMode,
    temperature: f64,
    reference: Option<f64>,
    gas_constant: f64,
) -> Result<Option<ParameterState>> {
    let shared = |kind| -> Result<Option<ParameterState>> {
        Ok(Some(ParameterState::LockedDerived {
            value: global_value(global, kind)?,
            source: kind,
        }))
    };

    match (kind.family(), mode) {
        (ParameterFamily::Gibbs | ParameterFamily::HeatCapacity, _) => Ok(None),
        (_, ConstraintMode::SharedAcrossAll) => shared(kind),
        (ParameterFamily::Enthalpy, ConstraintMode::TemperatureDependent) => {
            let cp_kind = kind
                .heat_capacity_kind()
                .ok_or(GlobalParameterError::UnsupportedConstraint { kind, mode })?;
            let reference =
                reference.ok_or(GlobalParameterError::UndefinedReferenceTemperature { kind })?;
            let value = global_value(global, kind)? + (temperature - reference) * global_value(global, cp_kind)?;
            Ok(Some(ParameterState::LockedDerived { value, source: kind }))
        }
        (ParameterFamily::Affinity, ConstraintMode::TemperatureDependent) => {
            let gibbs_kind = kind
                .gibbs_kind()
                .ok_or(GlobalParameterError::UnsupportedConstraint { kind, mode })?;
            let value = affinity_from_gibbs(global_value(global, gibbs_kind)?, temperature, gas_constant);
            Ok(Some(ParameterState::LockedDerived {
                value,
                source: gibbs_kind,
            }))
        }
        (ParameterFamily::Enthalpy, ConstraintMode::None) => match global.get(kind) {
            Some(param) if param.value().is_nan() => {
                warn!("Global '{}' holds NaN; dataset values left untouched", kind);
                Ok(None)
            }
            Some(param) => Ok(Some(match param.state() {
                ParameterState::Free(value) => ParameterState::Free(value),
                ParameterState::Locked(value) | ParameterState::LockedDerived { value, .. } => {
                    ParameterState::Locked(value)
                }
            })),
            None => Ok(None),
        },
        (_, mode) if mode.is_constrained() => {
            Err(GlobalParameterError::UnsupportedConstraint { kind, mode }.into())
        }
        _ => Ok(None),
    }
}
