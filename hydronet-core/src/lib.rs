//! Per-scenario state engine for water resource networks.
//!
//! A [`network::Network`] owns a graph of nodes and tracks each node's flow (and, for storage,
//! volume) for every scenario combination. A solver drives it one time-step at a time through
//! [`network::Network::before`], [`network::Network::commit`] and [`network::Network::after`].

pub mod aggregated_node;
mod aggregated_storage_node;
pub mod edge;
pub mod network;
pub mod node;
pub mod parameters;
pub mod recorders;
pub mod scenario;
pub mod state;
pub mod storage;
pub mod test_utils;
pub mod timestep;
pub mod virtual_storage;

pub use aggregated_storage_node::AggregatedStorageNode;
pub use network::{Network, NetworkError, NetworkPhase};
pub use node::{ConstraintValue, NodeIndex, NodeType};
pub use storage::StorageInitialVolume;
