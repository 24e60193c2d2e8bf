//! Configuration options for fitting and uncertainty estimation.
//!
//! [`FitSettings`] collects the knobs that the surrounding application exposes in
//! its preferences: parameter limit widening, bootstrap size and noise model. The
//! settings are plain data and can be stored as JSON.

use serde::{Deserialize, Serialize};

use crate::constants::GAS_CONSTANT;
use crate::error::{ItcFitError, Result};
use crate::uncertainty::SamplingMode;

/// Settings shared by parameter construction and bootstrap runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    /// Use the wide parameter limits instead of the default ones. Default: false
    pub extended_limits: bool,

    /// Number of resampled bootstrap iterations. Default: 1000
    pub bootstrap_iterations: usize,

    /// Noise model for resampling. Default: Gaussian
    pub sampling: SamplingMode,

    /// Seed for reproducible bootstrap runs. Default: None
    pub seed: Option<u64>,

    /// Gas constant in J/(mol·K) used for van't Hoff conversions. Default: 8.3145
    pub gas_constant: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            extended_limits: false,
            bootstrap_iterations: 1000,
            sampling: SamplingMode::default(),
            seed: None,
            gas_constant: GAS_CONSTANT,
        }
    }
}

impl FitSettings {
    /// Parse settings from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: FitSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_iterations == 0 {
            return Err(ItcFitError::InvalidInput(
                "bootstrap_iterations must be positive".to_string(),
            ));
        }
        if !(self.gas_constant.is_finite() && self.gas_constant > 0.0) {
            return Err(ItcFitError::InvalidInput(format!(
                "gas_constant must be positive, got {}",
                self.gas_constant
            )));
        }
        Ok(())
    }
}
