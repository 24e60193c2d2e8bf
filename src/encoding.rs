//! Persisted-state text encoding
//!
//! Fitted state is stored by an external reader/writer as plain key-value text:
//!
//! ```text
//! Enthalpy1:-40000
//! GLOBAL_PARAMETERS:LIST[Nvalue1:0.95,Enthalpy1:-20000,HeatCapacity1:-100]
//! GLOBAL_CONSTRAINTS:LIST[Nvalue1:SharedAcrossAll,Enthalpy1:TemperatureDependent]
//! iterations:42;loss:0.0125;time:1.5;bootstrap_time:30.25;algorithm:LevenbergMarquardt;message:Converged: small gradient;failed:false
//! ```
//!
//! Numbers are written with Rust's shortest round-trip formatting, so every field
//! survives a write/parse cycle unchanged. In convergence records `\` and `;`
//! inside values are escaped with a backslash.

use log::debug;
use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{alphanumeric1, char, multispace1},
    multi::{separated_list0, separated_list1},
    number::complete::double,
    sequence::{delimited, separated_pair},
    IResult, Parser,
};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::convergence::SolverConvergence;
use crate::error::Result;
use crate::parameters::{
    ConstraintMode, GlobalParameterSet, Parameter, ParameterKind, UnknownConstraintMode, UnknownKind,
};

/// Key of the global parameter list.
pub const GLOBAL_PARAMETERS: &str = "GLOBAL_PARAMETERS";

/// Key of the global constraint list.
pub const GLOBAL_CONSTRAINTS: &str = "GLOBAL_CONSTRAINTS";

/// Errors raised while reading persisted text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Syntax error: {message}")]
    Syntax { message: String },

    #[error("Unexpected trailing characters: '{0}'")]
    TrailingInput(String),

    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),

    #[error(transparent)]
    UnknownConstraintMode(#[from] UnknownConstraintMode),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid value '{value}' for field '{key}'")]
    InvalidField { key: String, value: String },
}

/// Global table and constraints of a fitted solution
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSolution {
    pub parameters: Vec<(ParameterKind, f64)>,
    pub constraints: Vec<(ParameterKind, ConstraintMode)>,
}

impl GlobalSolution {
    /// Snapshot of a set's global table and constraints
    pub fn from_set(set: &GlobalParameterSet) -> Self {
        Self {
            parameters: set.global().iter().map(|p| (p.kind(), p.value())).collect(),
            constraints: set
                .constraints()
                .iter()
                .map(|(&kind, &mode)| (kind, mode))
                .collect(),
        }
    }

    /// The constraints as a map, ready for [`GlobalParameterSet::new`]
    pub fn constraint_map(&self) -> BTreeMap<ParameterKind, ConstraintMode> {
        self.constraints.iter().copied().collect()
    }

    /// Write the stored global values into a set and propagate them
    pub fn apply_to(&self, set: &mut GlobalParameterSet) -> Result<()> {
        for &(kind, value) in &self.parameters {
            set.global_mut().require_mut(kind)?.set_value(value)?;
        }
        set.propagate_global_to_local()
    }
}

/// `kind:value`
pub fn encode_parameter(param: &Parameter) -> String {
    format!("{}:{}", param.kind(), param.value())
}

/// Parse a `kind:value` entry
pub fn parse_parameter(input: &str) -> std::result::Result<(ParameterKind, f64), EncodingError> {
    let (kind, value) = complete(kind_value, input.trim())?;
    Ok((kind.parse()?, value))
}

/// The two-line `GLOBAL_PARAMETERS` / `GLOBAL_CONSTRAINTS` record of a set
pub fn encode_global_solution(set: &GlobalParameterSet) -> String {
    let solution = GlobalSolution::from_set(set);
    let parameters: Vec<String> = solution
        .parameters
        .iter()
        .map(|(kind, value)| format!("{}:{}", kind, value))
        .collect();
    let constraints: Vec<String> = solution
        .constraints
        .iter()
        .map(|(kind, mode)| format!("{}:{}", kind, mode))
        .collect();
    format!(
        "{}:LIST[{}]\n{}:LIST[{}]",
        GLOBAL_PARAMETERS,
        parameters.join(","),
        GLOBAL_CONSTRAINTS,
        constraints.join(",")
    )
}

/// Parse a record written by [`encode_global_solution`]
pub fn parse_global_solution(input: &str) -> std::result::Result<GlobalSolution, EncodingError> {
    let (parameters, constraints) = complete(global_record, input.trim())?;
    Ok(GlobalSolution {
        parameters: parameters
            .into_iter()
            .map(|(kind, value)| -> std::result::Result<_, EncodingError> {
                Ok((kind.parse::<ParameterKind>()?, value))
            })
            .collect::<std::result::Result<Vec<_>, EncodingError>>()?,
        constraints: constraints
            .into_iter()
            .map(|(kind, mode)| -> std::result::Result<_, EncodingError> {
                Ok((kind.parse::<ParameterKind>()?, mode.parse::<ConstraintMode>()?))
            })
            .collect::<std::result::Result<Vec<_>, EncodingError>>()?,
    })
}

/// The `;`-delimited convergence record
pub fn encode_convergence(convergence: &SolverConvergence) -> String {
    [
        format!("iterations:{}", convergence.iterations),
        format!("loss:{}", convergence.loss),
        format!("time:{}", convergence.time),
        format!("bootstrap_time:{}", convergence.bootstrap_time),
        format!("algorithm:{}", escape(&convergence.algorithm.to_string())),
        format!("message:{}", escape(&convergence.message)),
        format!("failed:{}", convergence.failed),
    ]
    .join(";")
}

/// Parse a record written by [`encode_convergence`]; fields may come in any order
pub fn parse_convergence(input: &str) -> std::result::Result<SolverConvergence, EncodingError> {
    let fields: BTreeMap<&str, String> = complete(record, input.trim())?.into_iter().collect();

    let field = |key: &'static str| fields.get(key).ok_or(EncodingError::MissingField(key));
    fn typed<T: std::str::FromStr>(key: &str, value: &str) -> std::result::Result<T, EncodingError> {
        value.parse().map_err(|_| EncodingError::InvalidField {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    for key in fields.keys() {
        if !CONVERGENCE_KEYS.contains(key) {
            debug!("Ignoring unknown convergence field '{}'", key);
        }
    }

    Ok(SolverConvergence {
        iterations: typed("iterations", field("iterations")?)?,
        loss: typed("loss", field("loss")?)?,
        time: typed("time", field("time")?)?,
        bootstrap_time: typed("bootstrap_time", field("bootstrap_time")?)?,
        algorithm: typed("algorithm", field("algorithm")?)?,
        message: field("message")?.clone(),
        failed: typed("failed", field("failed")?)?,
    })
}

const CONVERGENCE_KEYS: [&str; 7] = [
    "iterations",
    "loss",
    "time",
    "bootstrap_time",
    "algorithm",
    "message",
    "failed",
];

/// Run a parser over the whole input
fn complete<'a, O>(
    parser: fn(&'a str) -> IResult<&'a str, O>,
    input: &'a str,
) -> std::result::Result<O, EncodingError> {
    match parser(input) {
        Ok(("", output)) => Ok(output),
        Ok((rest, _)) => Err(EncodingError::TrailingInput(rest.to_string())),
        Err(e) => Err(EncodingError::Syntax {
            message: format!("{:?}", e),
        }),
    }
}

fn kind_value(input: &str) -> IResult<&str, (&str, f64)> {
    separated_pair(alphanumeric1, char(':'), double).parse(input)
}

fn kind_mode(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(alphanumeric1, char(':'), alphanumeric1).parse(input)
}

fn parameter_list(input: &str) -> IResult<&str, Vec<(&str, f64)>> {
    delimited(
        (tag(GLOBAL_PARAMETERS), char(':'), tag("LIST[")),
        separated_list0(char(','), kind_value),
        char(']'),
    )
    .parse(input)
}

fn constraint_list(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    delimited(
        (tag(GLOBAL_CONSTRAINTS), char(':'), tag("LIST[")),
        separated_list0(char(','), kind_mode),
        char(']'),
    )
    .parse(input)
}

#[allow(clippy::type_complexity)]
fn global_record(input: &str) -> IResult<&str, (Vec<(&str, f64)>, Vec<(&str, &str)>)> {
    separated_pair(parameter_list, multispace1, constraint_list).parse(input)
}

fn field_key(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_').parse(input)
}

/// A value up to the next unescaped `;`
fn escaped_value(input: &str) -> IResult<&str, String> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            ';' => return Ok((&input[index..], value)),
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        &input[index..],
                        nom::error::ErrorKind::Escaped,
                    )))
                }
            },
            _ => value.push(c),
        }
    }
    Ok(("", value))
}

fn record(input: &str) -> IResult<&str, Vec<(&str, String)>> {
    separated_list1(char(';'), separated_pair(field_key, char(':'), escaped_value)).parse(input)
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == ';' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
