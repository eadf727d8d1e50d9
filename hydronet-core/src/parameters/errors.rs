use crate::parameters::ParameterIndex;
use thiserror::Error;

/// Errors returned by parameter calculations.
#[derive(Error, Debug, PartialEq)]
pub enum ParameterCalculationError {
    #[error("Scenario position {position} not found in scenario indices {indices:?}")]
    ScenarioPositionNotFound { position: usize, indices: Vec<usize> },
    #[error("Out of bounds error at index {index} for array of length {length}")]
    OutOfBoundsError { index: usize, length: usize },
}

/// Errors from the parameter collection.
#[derive(Error, Debug, PartialEq)]
pub enum ParameterError {
    #[error("Parameter name `{0}` already exists")]
    NameAlreadyExists(String),
    #[error("Parameter index `{0}` not found")]
    IndexNotFound(ParameterIndex),
    #[error("Error calculating parameter `{name}`: {source}")]
    Calculation {
        name: String,
        #[source]
        source: ParameterCalculationError,
    },
}
