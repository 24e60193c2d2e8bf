//! Per-dataset parameter tables
//!
//! A [`ParameterTable`] holds the parameters of one dataset's model in
//! insertion order. That order is the fitting order: [`ParameterTable::to_vector`]
//! and [`ParameterTable::from_vector`] both walk the free parameters in it, so a
//! vector produced by one is always consumed correctly by the other.

use serde::{Deserialize, Serialize};

use super::kind::ParameterKind;
use super::parameter::{Parameter, ParameterError, ParameterInfo};
use crate::error::{ItcFitError, Result};

/// Ordered parameters of one dataset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterTable {
    params: Vec<Parameter>,
    temperature: f64,
}

impl ParameterTable {
    /// Create an empty table for a dataset measured at `temperature` (°C)
    pub fn new(temperature: f64) -> Self {
        Self {
            params: Vec::new(),
            temperature,
        }
    }

    /// Create a table with default parameters of the given kinds
    ///
    /// # Examples
    ///
    /// ```
    /// use itcfit_rs::parameters::{ParameterKind, ParameterTable};
    ///
    /// let table = ParameterTable::with_kinds(
    ///     25.0,
    ///     &[ParameterKind::Nvalue1, ParameterKind::Enthalpy1, ParameterKind::Affinity1],
    ///     false,
    /// )
    /// .unwrap();
    /// assert_eq!(table.fitting_parameter_count(), 3);
    /// ```
    pub fn with_kinds(temperature: f64, kinds: &[ParameterKind], extended_limits: bool) -> Result<Self> {
        let mut table = Self::new(temperature);
        for &kind in kinds {
            table.add(Parameter::new(kind, extended_limits))?;
        }
        Ok(table)
    }

    /// Measurement temperature of the dataset (°C)
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Change the measurement temperature (°C)
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    /// Append a parameter
    ///
    /// # Returns
    ///
    /// An error if a parameter of the same kind is already present
    pub fn add(&mut self, param: Parameter) -> Result<()> {
        if self.contains(param.kind()) {
            return Err(ParameterError::DuplicateParameter { kind: param.kind() }.into());
        }
        self.params.push(param);
        Ok(())
    }

    /// Remove the parameter of the given kind
    pub fn remove(&mut self, kind: ParameterKind) -> Option<Parameter> {
        let index = self.params.iter().position(|p| p.kind() == kind)?;
        Some(self.params.remove(index))
    }

    /// Get a parameter by kind
    pub fn get(&self, kind: ParameterKind) -> Option<&Parameter> {
        self.params.iter().find(|p| p.kind() == kind)
    }

    /// Get a mutable reference to a parameter by kind
    pub fn get_mut(&mut self, kind: ParameterKind) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.kind() == kind)
    }

    /// Get a parameter by kind, failing if it is absent
    pub fn require(&self, kind: ParameterKind) -> Result<&Parameter> {
        self.get(kind)
            .ok_or_else(|| ParameterError::ParameterNotFound { kind }.into())
    }

    /// Get a mutable parameter by kind, failing if it is absent
    pub fn require_mut(&mut self, kind: ParameterKind) -> Result<&mut Parameter> {
        self.get_mut(kind)
            .ok_or_else(|| ParameterError::ParameterNotFound { kind }.into())
    }

    /// The value of a parameter, if present
    pub fn value(&self, kind: ParameterKind) -> Option<f64> {
        self.get(kind).map(Parameter::value)
    }

    /// Whether a parameter of the kind is present
    pub fn contains(&self, kind: ParameterKind) -> bool {
        self.get(kind).is_some()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate parameters in fitting order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Iterate parameters mutably in fitting order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.params.iter_mut()
    }

    /// Kinds in fitting order
    pub fn kinds(&self) -> Vec<ParameterKind> {
        self.params.iter().map(Parameter::kind).collect()
    }

    /// Free (unlocked) parameters in fitting order
    pub fn free(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.is_locked())
    }

    /// Number of free parameters; the length of [`to_vector`](Self::to_vector)
    pub fn fitting_parameter_count(&self) -> usize {
        self.free().count()
    }

    /// Values of the free parameters in fitting order
    pub fn to_vector(&self) -> Vec<f64> {
        self.free().map(Parameter::value).collect()
    }

    /// Initial step sizes of the free parameters in fitting order
    pub fn step_sizes(&self) -> Vec<f64> {
        self.free().map(Parameter::step_size).collect()
    }

    /// `(min, max)` limits of the free parameters in fitting order
    pub fn limits(&self) -> Vec<(f64, f64)> {
        self.free().map(|p| p.limits().as_pair()).collect()
    }

    /// Set the free parameters from a vector of exactly
    /// [`fitting_parameter_count`](Self::fitting_parameter_count) values
    ///
    /// # Returns
    ///
    /// A `DimensionMismatch` error if the length is wrong, or a bounds error if a
    /// value is outside its parameter's limits. The table is unchanged on error.
    pub fn from_vector(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.fitting_parameter_count();
        if values.len() != expected {
            return Err(ItcFitError::DimensionMismatch(format!(
                "Expected {} values for free parameters, got {}",
                expected,
                values.len()
            )));
        }
        let mut staged = self.clone();
        staged.consume(values)?;
        *self = staged;
        Ok(())
    }

    /// Set the free parameters from the front of `values`, returning the rest
    pub(crate) fn consume<'a>(&mut self, values: &'a [f64]) -> Result<&'a [f64]> {
        let mut rest = values;
        for param in self.params.iter_mut().filter(|p| !p.is_locked()) {
            let (&value, tail) = rest.split_first().ok_or_else(|| {
                ItcFitError::DimensionMismatch("parameter vector is too short".to_string())
            })?;
            param.set_value(value)?;
            rest = tail;
        }
        Ok(rest)
    }

    /// Snapshot of every parameter for inspection surfaces
    pub fn inspect(&self) -> Vec<ParameterInfo> {
        self.params.iter().map(Parameter::info).collect()
    }
}
