use hydronet_core::network::NetworkError;
use hydronet_core::scenario::ScenarioError;
use hydronet_core::timestep::TimestepError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors loading a single component of a model into a network.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Node with name `{name}` not found in the model")]
    NodeNotFound { name: String },
    #[error("Node with name `{name}` and sub-name `{}` has not been added to the network", .sub_name.as_deref().unwrap_or("None"))]
    CoreNodeNotFound { name: String, sub_name: Option<String> },
    #[error("Parameter `{0}` not found")]
    ParameterNotFound(String),
    #[error("Invalid time-step of {0} day(s)")]
    InvalidTimestep(i64),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("Timestep error: {0}")]
    Timestep(#[from] TimestepError),
}

/// Error type for reading a [`crate::ModelSchema`] from a file or string.
#[derive(Error, Debug)]
pub enum ModelSchemaReadError {
    #[error("IO error on path `{path}`: {error}")]
    IO { path: PathBuf, error: std::io::Error },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error type for building a [`crate::Model`] from a [`crate::ModelSchema`].
#[derive(Error, Debug)]
pub enum ModelSchemaBuildError {
    #[error("Failed to build the time domain: {0}")]
    TimeDomain(#[source] SchemaError),
    #[error("Failed to build the scenarios: {0}")]
    Scenarios(#[source] SchemaError),
    #[error("Circular node reference(s) found. Unable to add the following nodes: {0:?}")]
    CircularNodeReference(Vec<String>),
    #[error("Failed to add node `{name}` to the network: {source}")]
    AddNodeError {
        name: String,
        #[source]
        source: Box<SchemaError>,
    },
    #[error("Failed to set constraints for node `{name}`: {source}")]
    SetNodeConstraintsError {
        name: String,
        #[source]
        source: Box<SchemaError>,
    },
    #[error("Failed to add edge from `{from_node}` to `{to_node}`: {source}")]
    AddEdgeError {
        from_node: String,
        to_node: String,
        #[source]
        source: Box<SchemaError>,
    },
    #[error("Failed to add parameter `{name}` to the network: {source}")]
    AddParameterError {
        name: String,
        #[source]
        source: Box<SchemaError>,
    },
}
