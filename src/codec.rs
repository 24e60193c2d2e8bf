//! Solver parameter codec.
//!
//! Global ITC fits hand the external solver a compact vector whose shape depends
//! on how enthalpy, affinity and stoichiometry are tied across datasets. The
//! vector is laid out in blocks:
//!
//! | Block | Width |
//! |---|---|
//! | enthalpy | 1, or one per dataset when free; plus one heat-capacity slot when temperature dependent |
//! | Gibbs energy | 1, or one per dataset when free |
//! | N-value | 1, or one per dataset when free |
//! | offset | one per dataset |
//!
//! Affinities travel as Gibbs energies and are converted back with the van't Hoff
//! relation when a dataset's physical parameters are requested.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::{affinity_from_gibbs, gibbs_from_affinity, GAS_CONSTANT, STANDARD_TEMPERATURE};
use crate::parameters::{ConstraintMode, GlobalParameterSet, ParameterKind};

/// Errors raised while decoding or querying a solver vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Solver vector has {actual} values, layout expects {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Dataset {index} is out of range for {count} datasets")]
    DatasetOutOfRange { index: usize, count: usize },

    #[error("Got {actual} dataset temperatures, layout has {expected} datasets")]
    TemperatureCountMismatch { expected: usize, actual: usize },

    #[error("{quantity} cannot be {style}")]
    UnsupportedStyle {
        quantity: &'static str,
        style: VariableStyle,
    },

    #[error("Layout must describe at least one dataset")]
    NoDatasets,
}

type Result<T> = std::result::Result<T, CodecError>;

/// How one physical quantity varies across datasets in the solver vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VariableStyle {
    /// One value per dataset.
    #[default]
    Free,
    /// One value for every dataset.
    SameForAll,
    /// One value at the reference temperature plus a temperature coefficient.
    TemperatureDependent,
}

impl fmt::Display for VariableStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableStyle::Free => "free",
            VariableStyle::SameForAll => "the same for all datasets",
            VariableStyle::TemperatureDependent => "temperature dependent",
        };
        f.write_str(name)
    }
}

impl From<ConstraintMode> for VariableStyle {
    fn from(mode: ConstraintMode) -> Self {
        match mode {
            ConstraintMode::None => VariableStyle::Free,
            ConstraintMode::SharedAcrossAll => VariableStyle::SameForAll,
            ConstraintMode::TemperatureDependent => VariableStyle::TemperatureDependent,
        }
    }
}

impl VariableStyle {
    fn width(self, dataset_count: usize) -> usize {
        match self {
            VariableStyle::Free => dataset_count,
            VariableStyle::SameForAll | VariableStyle::TemperatureDependent => 1,
        }
    }

    fn index(self, dataset: usize) -> usize {
        match self {
            VariableStyle::Free => dataset,
            VariableStyle::SameForAll | VariableStyle::TemperatureDependent => 0,
        }
    }
}

/// Shape of a solver vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverParameterLayout {
    pub enthalpy: VariableStyle,
    pub affinity: VariableStyle,
    pub n_value: VariableStyle,
    pub dataset_count: usize,
    /// Temperature (°C) at which a shared affinity is evaluated.
    pub reference_temperature: f64,
    pub gas_constant: f64,
}

impl SolverParameterLayout {
    /// Create a layout
    ///
    /// # Returns
    ///
    /// An error if there are no datasets or the N-value is temperature dependent
    pub fn new(
        enthalpy: VariableStyle,
        affinity: VariableStyle,
        n_value: VariableStyle,
        dataset_count: usize,
    ) -> Result<Self> {
        if dataset_count == 0 {
            return Err(CodecError::NoDatasets);
        }
        if n_value == VariableStyle::TemperatureDependent {
            return Err(CodecError::UnsupportedStyle {
                quantity: "N-value",
                style: n_value,
            });
        }
        Ok(Self {
            enthalpy,
            affinity,
            n_value,
            dataset_count,
            reference_temperature: STANDARD_TEMPERATURE,
            gas_constant: GAS_CONSTANT,
        })
    }

    /// Layout matching the first-site constraints of a global parameter set
    pub fn from_global(set: &GlobalParameterSet) -> Result<Self> {
        Self::new(
            set.constraint(ParameterKind::Enthalpy1).into(),
            set.constraint(ParameterKind::Affinity1).into(),
            set.constraint(ParameterKind::Nvalue1).into(),
            set.dataset_count(),
        )
        .map(|layout| layout.with_gas_constant(set.gas_constant()))
    }

    /// Evaluate shared affinities at `celsius` instead of 25 °C
    pub fn with_reference_temperature(mut self, celsius: f64) -> Self {
        self.reference_temperature = celsius;
        self
    }

    /// Use a different gas constant
    pub fn with_gas_constant(mut self, gas_constant: f64) -> Self {
        self.gas_constant = gas_constant;
        self
    }

    fn enthalpy_width(&self) -> usize {
        self.enthalpy.width(self.dataset_count)
    }

    fn has_heat_capacity(&self) -> bool {
        self.enthalpy == VariableStyle::TemperatureDependent
    }

    /// Length of a solver vector with this layout
    pub fn parameter_count(&self) -> usize {
        self.enthalpy_width()
            + usize::from(self.has_heat_capacity())
            + self.affinity.width(self.dataset_count)
            + self.n_value.width(self.dataset_count)
            + self.dataset_count
    }
}

/// Physical parameters of one dataset reconstructed from a solver vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetThermodynamics {
    /// ΔH at the dataset temperature (J/mol).
    pub enthalpy: f64,
    /// ΔCp when the enthalpy is temperature dependent (J/(mol·K)).
    pub heat_capacity: Option<f64>,
    /// ΔG at the dataset temperature (J/mol).
    pub gibbs: f64,
    /// Association constant (1/M).
    pub affinity: f64,
    pub n_value: f64,
    pub offset: f64,
    /// `−TΔS = ΔG − ΔH` (J/mol).
    pub entropy_term: f64,
}

/// Typed view of a solver vector
///
/// Block widths always match the layout; the blocks are read-only outside
/// [`decode`](Self::decode) and [`initial`](Self::initial).
#[derive(Debug, Clone, PartialEq)]
pub struct SolverParameterBlock {
    layout: SolverParameterLayout,
    enthalpies: Vec<f64>,
    heat_capacity: f64,
    gibbs_energies: Vec<f64>,
    n_values: Vec<f64>,
    offsets: Vec<f64>,
}

impl SolverParameterBlock {
    /// Split a solver vector into its blocks
    ///
    /// # Examples
    ///
    /// ```
    /// use itcfit_rs::codec::{SolverParameterBlock, SolverParameterLayout, VariableStyle};
    ///
    /// let layout = SolverParameterLayout::new(
    ///     VariableStyle::TemperatureDependent,
    ///     VariableStyle::Free,
    ///     VariableStyle::SameForAll,
    ///     2,
    /// )
    /// .unwrap();
    /// // [ΔH_ref, ΔCp, ΔG₁, ΔG₂, N, offset₁, offset₂]
    /// let v = [-20_000.0, -100.0, -30_000.0, -31_000.0, 1.0, 0.0, 0.5];
    /// let block = SolverParameterBlock::decode(layout, &v).unwrap();
    /// assert_eq!(block.heat_capacity(), -100.0);
    /// assert_eq!(block.encode(), v.to_vec());
    /// ```
    pub fn decode(layout: SolverParameterLayout, values: &[f64]) -> Result<Self> {
        let expected = layout.parameter_count();
        if values.len() != expected {
            return Err(CodecError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }

        let n = layout.dataset_count;
        let (enthalpies, rest) = values.split_at(layout.enthalpy_width());
        let (heat_capacity, rest) = if layout.has_heat_capacity() {
            (rest[0], &rest[1..])
        } else {
            (0.0, rest)
        };
        let (gibbs_energies, rest) = rest.split_at(layout.affinity.width(n));
        let (n_values, offsets) = rest.split_at(layout.n_value.width(n));

        Ok(Self {
            layout,
            enthalpies: enthalpies.to_vec(),
            heat_capacity,
            gibbs_energies: gibbs_energies.to_vec(),
            n_values: n_values.to_vec(),
            offsets: offsets.to_vec(),
        })
    }

    /// Flatten back into a solver vector
    pub fn encode(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.layout.parameter_count());
        values.extend_from_slice(&self.enthalpies);
        if self.layout.has_heat_capacity() {
            values.push(self.heat_capacity);
        }
        values.extend_from_slice(&self.gibbs_energies);
        values.extend_from_slice(&self.n_values);
        values.extend_from_slice(&self.offsets);
        values
    }

    /// Starting vector for a layout from per-dataset (ΔH, K, N, offset) guesses at
    /// the given temperatures; shared blocks take the first dataset's value
    pub fn initial(
        layout: SolverParameterLayout,
        guesses: &[(f64, f64, f64, f64)],
        temperatures: &[f64],
    ) -> Result<Self> {
        check_temperatures(&layout, temperatures)?;
        if guesses.len() != layout.dataset_count {
            return Err(CodecError::LengthMismatch {
                expected: layout.dataset_count,
                actual: guesses.len(),
            });
        }

        let n = layout.dataset_count;
        let take = |style: VariableStyle, f: &dyn Fn(usize) -> f64| -> Vec<f64> {
            (0..style.width(n)).map(f).collect()
        };

        Ok(Self {
            layout,
            enthalpies: take(layout.enthalpy, &|i: usize| guesses[i].0),
            heat_capacity: 0.0,
            gibbs_energies: take(layout.affinity, &|i: usize| {
                let celsius = match layout.affinity {
                    VariableStyle::SameForAll => layout.reference_temperature,
                    _ => temperatures[i],
                };
                gibbs_from_affinity(guesses[i].1, celsius, layout.gas_constant)
            }),
            n_values: take(layout.n_value, &|i: usize| guesses[i].2),
            offsets: guesses.iter().map(|g| g.3).collect(),
        })
    }

    /// The layout the block was decoded with
    pub fn layout(&self) -> &SolverParameterLayout {
        &self.layout
    }

    /// Number of values in the solver vector
    pub fn parameter_count(&self) -> usize {
        self.layout.parameter_count()
    }

    /// Enthalpy block: ΔH per dataset, one shared ΔH, or ΔH at the reference temperature
    pub fn enthalpies(&self) -> &[f64] {
        &self.enthalpies
    }

    /// ΔCp; zero unless the enthalpy is temperature dependent
    pub fn heat_capacity(&self) -> f64 {
        self.heat_capacity
    }

    pub fn gibbs_energies(&self) -> &[f64] {
        &self.gibbs_energies
    }

    pub fn n_values(&self) -> &[f64] {
        &self.n_values
    }

    /// One heat offset per dataset
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    fn check_dataset(&self, dataset: usize) -> Result<()> {
        if dataset >= self.layout.dataset_count {
            return Err(CodecError::DatasetOutOfRange {
                index: dataset,
                count: self.layout.dataset_count,
            });
        }
        Ok(())
    }

    /// ΔH of a dataset, corrected to its temperature when temperature dependent
    pub fn get_enthalpy(&self, dataset: usize, temperatures: &[f64]) -> Result<f64> {
        self.check_dataset(dataset)?;
        check_temperatures(&self.layout, temperatures)?;

        let base = self.enthalpies[self.layout.enthalpy.index(dataset)];
        if self.layout.has_heat_capacity() {
            let reference = temperatures.iter().sum::<f64>() / temperatures.len() as f64;
            Ok(base + (temperatures[dataset] - reference) * self.heat_capacity)
        } else {
            Ok(base)
        }
    }

    /// The raw Gibbs-energy slot that governs a dataset
    pub fn get_gibbs(&self, dataset: usize) -> Result<f64> {
        self.check_dataset(dataset)?;
        Ok(self.gibbs_energies[self.layout.affinity.index(dataset)])
    }

    /// Association constant of a dataset
    ///
    /// A shared affinity is evaluated at the layout's reference temperature; a
    /// free or temperature-dependent one at the dataset's own temperature.
    pub fn get_affinity_constant(&self, dataset: usize, temperatures: &[f64]) -> Result<f64> {
        check_temperatures(&self.layout, temperatures)?;
        let gibbs = self.get_gibbs(dataset)?;
        let celsius = match self.layout.affinity {
            VariableStyle::SameForAll => self.layout.reference_temperature,
            VariableStyle::Free | VariableStyle::TemperatureDependent => temperatures[dataset],
        };
        Ok(affinity_from_gibbs(gibbs, celsius, self.layout.gas_constant))
    }

    /// Stoichiometry of a dataset
    pub fn get_n(&self, dataset: usize) -> Result<f64> {
        self.check_dataset(dataset)?;
        Ok(self.n_values[self.layout.n_value.index(dataset)])
    }

    /// Heat offset of a dataset
    pub fn get_offset(&self, dataset: usize) -> Result<f64> {
        self.check_dataset(dataset)?;
        Ok(self.offsets[dataset])
    }

    /// Every physical parameter of a dataset at its temperature
    pub fn dataset_parameters(&self, dataset: usize, temperatures: &[f64]) -> Result<DatasetThermodynamics> {
        let enthalpy = self.get_enthalpy(dataset, temperatures)?;
        let affinity = self.get_affinity_constant(dataset, temperatures)?;
        let gibbs = gibbs_from_affinity(affinity, temperatures[dataset], self.layout.gas_constant);

        Ok(DatasetThermodynamics {
            enthalpy,
            heat_capacity: self.layout.has_heat_capacity().then_some(self.heat_capacity),
            gibbs,
            affinity,
            n_value: self.get_n(dataset)?,
            offset: self.get_offset(dataset)?,
            entropy_term: gibbs - enthalpy,
        })
    }
}

fn check_temperatures(layout: &SolverParameterLayout, temperatures: &[f64]) -> Result<()> {
    if temperatures.len() != layout.dataset_count {
        return Err(CodecError::TemperatureCountMismatch {
            expected: layout.dataset_count,
            actual: temperatures.len(),
        });
    }
    Ok(())
}
