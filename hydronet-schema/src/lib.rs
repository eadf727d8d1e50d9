//! Schema for a hydronet model.
//!
//! A model document describes the time domain, the scenarios and the network (parameters, nodes
//! and edges). Serializing and deserializing is accomplished using [`serde`]; building turns a
//! document into a [`hydronet_core::network::Network`].
//!
pub mod edge;
mod error;
pub mod metric;
pub mod model;
pub mod network;
pub mod nodes;
pub mod parameters;
pub mod scenarios;

pub use error::{ModelSchemaBuildError, ModelSchemaReadError, SchemaError};
pub use model::{Model, ModelSchema};
