//! Parameter definition and implementation
//!
//! A [`Parameter`] is one bounded scalar of a dataset's model. Whether the
//! optimizer may move it is encoded in its [`ParameterState`]: free parameters are
//! fitted, locked ones keep a value set by the user, and derived ones hold a value
//! written by global constraint propagation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bounds::{Bounds, BoundsError};
use super::kind::ParameterKind;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter '{kind}': {source}")]
    Bounds {
        kind: ParameterKind,
        #[source]
        source: BoundsError,
    },

    #[error("Parameter '{kind}' not found")]
    ParameterNotFound { kind: ParameterKind },

    #[error("Parameter '{kind}' is already present")]
    DuplicateParameter { kind: ParameterKind },

    #[error("Invalid step size {step} for parameter '{kind}'")]
    InvalidStepSize { kind: ParameterKind, step: f64 },
}

/// Fitting state of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParameterState {
    /// Fitted by the optimizer.
    Free(f64),

    /// Held at a value chosen by the user.
    Locked(f64),

    /// Held at a value computed from the global parameter of `source`.
    LockedDerived { value: f64, source: ParameterKind },
}

impl ParameterState {
    /// The value carried by the state.
    pub fn value(&self) -> f64 {
        match *self {
            ParameterState::Free(value)
            | ParameterState::Locked(value)
            | ParameterState::LockedDerived { value, .. } => value,
        }
    }

    /// Whether the optimizer must leave the parameter alone.
    pub fn is_locked(&self) -> bool {
        !matches!(self, ParameterState::Free(_))
    }
}

/// A bounded fitting parameter
///
/// Deserialization applies the same checks as the setters: the value must lie
/// inside the limits and the step size must be positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterRecord", into = "ParameterRecord")]
pub struct Parameter {
    kind: ParameterKind,
    state: ParameterState,
    limits: Bounds,
    step_size: f64,
    was_user_edited: bool,
}

#[derive(Serialize, Deserialize)]
struct ParameterRecord {
    kind: ParameterKind,
    state: ParameterState,
    limits: Bounds,
    step_size: f64,
    #[serde(default)]
    was_user_edited: bool,
}

impl From<Parameter> for ParameterRecord {
    fn from(param: Parameter) -> Self {
        Self {
            kind: param.kind,
            state: param.state,
            limits: param.limits,
            step_size: param.step_size,
            was_user_edited: param.was_user_edited,
        }
    }
}

impl TryFrom<ParameterRecord> for Parameter {
    type Error = ParameterError;

    fn try_from(record: ParameterRecord) -> Result<Self, Self::Error> {
        let mut param = Parameter::new(record.kind, false);
        param.limits = record.limits;
        param.set_step_size(record.step_size)?;
        param.set_state(record.state)?;
        param.was_user_edited = record.was_user_edited;
        Ok(param)
    }
}

/// Snapshot of a parameter for inspection and editing surfaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterInfo {
    pub kind: ParameterKind,
    pub value: f64,
    pub is_locked: bool,
    pub limits: (f64, f64),
    pub step_size: f64,
    pub was_user_edited: bool,
}

impl Parameter {
    /// Create a free parameter at the kind's default value
    ///
    /// # Arguments
    ///
    /// * `kind` - The parameter kind
    /// * `extended_limits` - Whether to use the kind's extended limits
    ///
    /// # Examples
    ///
    /// ```
    /// use itcfit_rs::parameters::{Parameter, ParameterKind};
    ///
    /// let param = Parameter::new(ParameterKind::Nvalue1, false);
    /// assert_eq!(param.value(), 1.0);
    /// assert!(!param.is_locked());
    /// ```
    pub fn new(kind: ParameterKind, extended_limits: bool) -> Self {
        let info = kind.info();
        Self {
            kind,
            state: ParameterState::Free(info.default_value),
            limits: kind.limits(extended_limits),
            step_size: info.default_step,
            was_user_edited: false,
        }
    }

    /// Create a free parameter with a starting value
    ///
    /// # Returns
    ///
    /// The parameter, or an error if `value` is outside the kind's limits
    pub fn with_value(kind: ParameterKind, value: f64, extended_limits: bool) -> Result<Self, ParameterError> {
        let mut param = Self::new(kind, extended_limits);
        param.set_value(value)?;
        Ok(param)
    }

    /// The parameter kind
    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    /// The current value
    pub fn value(&self) -> f64 {
        self.state.value()
    }

    /// The fitting state
    pub fn state(&self) -> ParameterState {
        self.state
    }

    /// Whether the optimizer must leave the parameter alone
    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    /// Whether the value was written by constraint propagation
    pub fn is_derived(&self) -> bool {
        matches!(self.state, ParameterState::LockedDerived { .. })
    }

    /// The limits of the parameter
    pub fn limits(&self) -> Bounds {
        self.limits
    }

    /// Minimum allowed value
    pub fn min(&self) -> f64 {
        self.limits.min
    }

    /// Maximum allowed value
    pub fn max(&self) -> f64 {
        self.limits.max
    }

    /// Initial step size for gradient-free solvers
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Whether the user changed the value or lock state
    pub fn was_user_edited(&self) -> bool {
        self.was_user_edited
    }

    /// Set the value, keeping the current fitting state
    ///
    /// # Returns
    ///
    /// `Ok(())` if the value was set, or an error if it is non-finite or outside the limits.
    /// The parameter is unchanged on error.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        let value = self.check(value)?;
        self.state = match self.state {
            ParameterState::Free(_) => ParameterState::Free(value),
            ParameterState::Locked(_) => ParameterState::Locked(value),
            ParameterState::LockedDerived { source, .. } => {
                ParameterState::LockedDerived { value, source }
            }
        };
        Ok(())
    }

    /// Set the value and lock the parameter so it is excluded from fitting
    pub fn lock_to_value(&mut self, value: f64) -> Result<(), ParameterError> {
        let value = self.check(value)?;
        self.state = ParameterState::Locked(value);
        Ok(())
    }

    /// Write a value derived from the global parameter `source` and lock it
    pub fn lock_derived(&mut self, value: f64, source: ParameterKind) -> Result<(), ParameterError> {
        let value = self.check(value)?;
        self.state = ParameterState::LockedDerived { value, source };
        Ok(())
    }

    /// Release the parameter for fitting at its current value
    pub fn unlock(&mut self) {
        self.state = ParameterState::Free(self.value());
    }

    /// Replace the whole state, validating its value
    pub fn set_state(&mut self, state: ParameterState) -> Result<(), ParameterError> {
        self.check(state.value())?;
        self.state = state;
        Ok(())
    }

    /// User override of the starting value
    pub fn user_set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        self.set_value(value)?;
        self.was_user_edited = true;
        Ok(())
    }

    /// User lock at the current value
    pub fn user_lock(&mut self) {
        self.state = ParameterState::Locked(self.value());
        self.was_user_edited = true;
    }

    /// User unlock
    pub fn user_unlock(&mut self) {
        self.unlock();
        self.was_user_edited = true;
    }

    /// Set the limits; the current value is clamped into them
    pub fn set_limits(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let limits = Bounds::new(min, max).map_err(|source| ParameterError::Bounds {
            kind: self.kind,
            source,
        })?;
        self.limits = limits;
        let clamped = limits.clamp(self.value());
        self.set_value(clamped)
    }

    /// Restore the kind's default or extended limits
    pub fn reset_limits(&mut self, extended_limits: bool) -> Result<(), ParameterError> {
        let limits = self.kind.limits(extended_limits);
        self.set_limits(limits.min, limits.max)
    }

    /// Set the initial step size
    pub fn set_step_size(&mut self, step: f64) -> Result<(), ParameterError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ParameterError::InvalidStepSize {
                kind: self.kind,
                step,
            });
        }
        self.step_size = step;
        Ok(())
    }

    /// Snapshot for inspection surfaces
    pub fn info(&self) -> ParameterInfo {
        ParameterInfo {
            kind: self.kind,
            value: self.value(),
            is_locked: self.is_locked(),
            limits: self.limits.as_pair(),
            step_size: self.step_size,
            was_user_edited: self.was_user_edited,
        }
    }

    fn check(&self, value: f64) -> Result<f64, ParameterError> {
        self.limits.check(value).map_err(|source| ParameterError::Bounds {
            kind: self.kind,
            source,
        })
    }
}
