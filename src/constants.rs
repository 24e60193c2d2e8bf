//! Physical constants used by the thermodynamic conversions.

/// Molar gas constant in J/(mol·K).
pub const GAS_CONSTANT: f64 = 8.3145;

/// Offset between the Celsius and Kelvin scales.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Temperature (°C) at which a shared affinity is reported.
pub const STANDARD_TEMPERATURE: f64 = 25.0;

/// Values with an absolute magnitude below this are treated as zero when
/// computing fractional errors.
pub const ZERO_TOLERANCE: f64 = 1e-300;

/// Fractional standard deviation above which a value is considered uncertain.
pub const FRACTIONAL_ERROR_EPSILON: f64 = 1e-9;

/// Convert a temperature in °C to K.
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

/// Affinity constant from a Gibbs free energy (J/mol) at the given temperature (°C),
/// `K = exp(-ΔG / (R·T))`.
pub fn affinity_from_gibbs(gibbs: f64, celsius: f64, gas_constant: f64) -> f64 {
    (-gibbs / (gas_constant * celsius_to_kelvin(celsius))).exp()
}

/// Gibbs free energy (J/mol) from an affinity constant at the given temperature (°C).
pub fn gibbs_from_affinity(affinity: f64, celsius: f64, gas_constant: f64) -> f64 {
    -gas_constant * celsius_to_kelvin(celsius) * affinity.ln()
}
