//! Parameter kinds and their static metadata.
//!
//! Each [`ParameterKind`] resolves at compile time to a [`KindInfo`] holding its
//! family, default value, default and extended limits, and initial step size.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::bounds::Bounds;

/// The physical quantity a parameter kind represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterFamily {
    /// Binding stoichiometry.
    Stoichiometry,
    /// Binding enthalpy (J/mol).
    Enthalpy,
    /// Association constant (1/M).
    Affinity,
    /// Gibbs free energy of binding (J/mol).
    Gibbs,
    /// Heat capacity change (J/(mol·K)).
    HeatCapacity,
    /// Constant heat offset per injection.
    Offset,
}

/// A fitting parameter kind. The order of the variants is the canonical order
/// used when a model declares its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterKind {
    Nvalue1,
    Enthalpy1,
    Affinity1,
    Nvalue2,
    Enthalpy2,
    Affinity2,
    Offset,
    Gibbs1,
    Gibbs2,
    HeatCapacity1,
    HeatCapacity2,
}

/// Static metadata of a parameter kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindInfo {
    pub family: ParameterFamily,
    pub default_value: f64,
    pub default_limits: (f64, f64),
    pub extended_limits: (f64, f64),
    pub default_step: f64,
}

const STOICHIOMETRY: KindInfo = KindInfo {
    family: ParameterFamily::Stoichiometry,
    default_value: 1.0,
    default_limits: (0.1, 10.0),
    extended_limits: (0.001, 100.0),
    default_step: 0.1,
};

const ENTHALPY: KindInfo = KindInfo {
    family: ParameterFamily::Enthalpy,
    default_value: -40_000.0,
    default_limits: (-500_000.0, 500_000.0),
    extended_limits: (-2_000_000.0, 2_000_000.0),
    default_step: 1_000.0,
};

const AFFINITY: KindInfo = KindInfo {
    family: ParameterFamily::Affinity,
    default_value: 1.0e6,
    default_limits: (10.0, 1.0e12),
    extended_limits: (1.0, 1.0e15),
    default_step: 1.0e5,
};

const GIBBS: KindInfo = KindInfo {
    family: ParameterFamily::Gibbs,
    default_value: -35_000.0,
    default_limits: (-100_000.0, 0.0),
    extended_limits: (-200_000.0, 50_000.0),
    default_step: 500.0,
};

const HEAT_CAPACITY: KindInfo = KindInfo {
    family: ParameterFamily::HeatCapacity,
    default_value: 0.0,
    default_limits: (-10_000.0, 10_000.0),
    extended_limits: (-50_000.0, 50_000.0),
    default_step: 50.0,
};

const OFFSET: KindInfo = KindInfo {
    family: ParameterFamily::Offset,
    default_value: 0.0,
    default_limits: (-10_000.0, 10_000.0),
    extended_limits: (-1.0e6, 1.0e6),
    default_step: 1.0,
};

impl ParameterKind {
    /// Every kind, in canonical order.
    pub const ALL: [ParameterKind; 11] = [
        ParameterKind::Nvalue1,
        ParameterKind::Enthalpy1,
        ParameterKind::Affinity1,
        ParameterKind::Nvalue2,
        ParameterKind::Enthalpy2,
        ParameterKind::Affinity2,
        ParameterKind::Offset,
        ParameterKind::Gibbs1,
        ParameterKind::Gibbs2,
        ParameterKind::HeatCapacity1,
        ParameterKind::HeatCapacity2,
    ];

    /// Static metadata for this kind.
    pub const fn info(self) -> KindInfo {
        match self {
            ParameterKind::Nvalue1 | ParameterKind::Nvalue2 => STOICHIOMETRY,
            ParameterKind::Enthalpy1 | ParameterKind::Enthalpy2 => ENTHALPY,
            ParameterKind::Affinity1 | ParameterKind::Affinity2 => AFFINITY,
            ParameterKind::Gibbs1 | ParameterKind::Gibbs2 => GIBBS,
            ParameterKind::HeatCapacity1 | ParameterKind::HeatCapacity2 => HEAT_CAPACITY,
            ParameterKind::Offset => OFFSET,
        }
    }

    /// The family this kind belongs to.
    pub const fn family(self) -> ParameterFamily {
        self.info().family
    }

    /// Limits for this kind, widened when `extended` is set.
    pub fn limits(self, extended: bool) -> Bounds {
        let (min, max) = if extended {
            self.info().extended_limits
        } else {
            self.info().default_limits
        };
        Bounds { min, max }
    }

    /// The heat-capacity kind paired with an enthalpy kind.
    pub const fn heat_capacity_kind(self) -> Option<ParameterKind> {
        match self {
            ParameterKind::Enthalpy1 => Some(ParameterKind::HeatCapacity1),
            ParameterKind::Enthalpy2 => Some(ParameterKind::HeatCapacity2),
            _ => None,
        }
    }

    /// The Gibbs-energy kind paired with an affinity kind.
    pub const fn gibbs_kind(self) -> Option<ParameterKind> {
        match self {
            ParameterKind::Affinity1 => Some(ParameterKind::Gibbs1),
            ParameterKind::Affinity2 => Some(ParameterKind::Gibbs2),
            _ => None,
        }
    }

    /// Stable identifier used in the persisted text format.
    pub const fn as_str(self) -> &'static str {
        match self {
            ParameterKind::Nvalue1 => "Nvalue1",
            ParameterKind::Enthalpy1 => "Enthalpy1",
            ParameterKind::Affinity1 => "Affinity1",
            ParameterKind::Nvalue2 => "Nvalue2",
            ParameterKind::Enthalpy2 => "Enthalpy2",
            ParameterKind::Affinity2 => "Affinity2",
            ParameterKind::Offset => "Offset",
            ParameterKind::Gibbs1 => "Gibbs1",
            ParameterKind::Gibbs2 => "Gibbs2",
            ParameterKind::HeatCapacity1 => "HeatCapacity1",
            ParameterKind::HeatCapacity2 => "HeatCapacity2",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a kind identifier is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown parameter kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for ParameterKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParameterKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}
