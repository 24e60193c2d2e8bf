//! # Parameter System
//!
//! Bounded fitting parameters for single- and multi-dataset ITC fits.
//!
//! ## Core Components
//!
//! - [`ParameterKind`]: the parameter kinds a binding model can declare, with
//!   default values, limits and step sizes resolved from a static table
//! - [`Parameter`]: one bounded scalar whose [`ParameterState`] says whether the
//!   optimizer may move it
//! - [`ParameterTable`]: the ordered parameters of one dataset, flattenable to and
//!   from the vector an external solver works on
//! - [`GlobalParameterSet`]: shared parameters, per-kind [`ConstraintMode`]s and the
//!   dataset tables they govern
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use itcfit_rs::parameters::{ConstraintMode, GlobalParameterSet, ParameterKind, ParameterTable};
//!
//! let kinds = [ParameterKind::Nvalue1, ParameterKind::Enthalpy1, ParameterKind::Affinity1];
//! let datasets = vec![
//!     ParameterTable::with_kinds(15.0, &kinds, false).unwrap(),
//!     ParameterTable::with_kinds(35.0, &kinds, false).unwrap(),
//! ];
//!
//! let mut constraints = BTreeMap::new();
//! constraints.insert(ParameterKind::Enthalpy1, ConstraintMode::TemperatureDependent);
//! let mut set = GlobalParameterSet::new(constraints, datasets, false).unwrap();
//!
//! // Vector for the solver: [ΔH_ref, ΔCp, N₁, K₁, N₂, K₂]
//! let mut v = set.to_vector();
//! v[0] = -20_000.0;
//! v[1] = -100.0;
//! set.apply_vector(&v).unwrap();
//!
//! let dh = set.dataset(0).unwrap().value(ParameterKind::Enthalpy1).unwrap();
//! assert!((dh - (-19_000.0)).abs() < 1e-9);
//! ```

pub mod bounds;
pub mod global;
pub mod kind;
pub mod parameter;
pub mod table;

pub use bounds::{Bounds, BoundsError};
pub use global::{ConstraintMode, GlobalParameterError, GlobalParameterSet, UnknownConstraintMode};
pub use kind::{KindInfo, ParameterFamily, ParameterKind, UnknownKind};
pub use parameter::{Parameter, ParameterError, ParameterInfo, ParameterState};
pub use table::ParameterTable;
