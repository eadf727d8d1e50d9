use crate::error::SchemaError;
use crate::metric::Metric;
use crate::nodes::core::load_volume_bounds;
use crate::nodes::{core_node_index, core_node_indices, set_node_meta, StorageInitialVolume};
use hydronet_core::network::Network;
use hydronet_core::node::NodeIndex;
use serde::{Deserialize, Serialize};

/// A node whose flow is the total flow of other nodes.
///
/// The optional `factors` (one per node) give the proportion of the total each node should
/// carry. Flow bounds apply to the total and default to unbounded.
#[derive(Deserialize, Serialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct AggregatedNode {
    pub name: String,
    pub comment: Option<String>,
    pub nodes: Vec<String>,
    pub factors: Option<Vec<f64>>,
    pub max_flow: Option<Metric>,
    pub min_flow: Option<Metric>,
}

impl AggregatedNode {
    pub fn add_to_model(&self, network: &mut Network) -> Result<NodeIndex, SchemaError> {
        let nodes = core_node_indices(network, &self.nodes)?;
        let idx = network.add_aggregated_node(&self.name, None, &nodes, self.factors.clone())?;
        set_node_meta(network, idx, self.comment.as_deref(), None)?;
        Ok(idx)
    }

    pub fn set_constraints(&self, network: &mut Network) -> Result<(), SchemaError> {
        let idx = core_node_index(network, &self.name, None)?;

        if let Some(max_flow) = &self.max_flow {
            let value = max_flow.load(network)?;
            network.set_node_max_flow(idx, value)?;
        }

        if let Some(min_flow) = &self.min_flow {
            let value = min_flow.load(network)?;
            network.set_node_min_flow(idx, value)?;
        }

        Ok(())
    }
}

/// A node whose volume is the total volume of several storage nodes.
#[derive(Deserialize, Serialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct AggregatedStorageNode {
    pub name: String,
    pub comment: Option<String>,
    pub storage_nodes: Vec<String>,
}

impl AggregatedStorageNode {
    pub fn add_to_model(&self, network: &mut Network) -> Result<NodeIndex, SchemaError> {
        let nodes = core_node_indices(network, &self.storage_nodes)?;
        let idx = network.add_aggregated_storage_node(&self.name, None, &nodes)?;
        set_node_meta(network, idx, self.comment.as_deref(), None)?;
        Ok(idx)
    }
}

/// A storage with no physical connections, drawn down by the flow through other nodes.
///
/// Each time-step the volume changes by `-Σ factor * flow` over `nodes`; factors default to one.
#[derive(Deserialize, Serialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct VirtualStorageNode {
    pub name: String,
    pub comment: Option<String>,
    pub nodes: Vec<String>,
    pub factors: Option<Vec<f64>>,
    pub max_volume: Option<Metric>,
    pub min_volume: Option<Metric>,
    pub cost: Option<Metric>,
    #[serde(default)]
    pub initial_volume: StorageInitialVolume,
}

impl VirtualStorageNode {
    pub fn add_to_model(&self, network: &mut Network) -> Result<NodeIndex, SchemaError> {
        let nodes = core_node_indices(network, &self.nodes)?;
        let (min_volume, max_volume) =
            load_volume_bounds(network, self.min_volume.as_ref(), self.max_volume.as_ref())?;

        let idx = network.add_virtual_storage_node(
            &self.name,
            None,
            &nodes,
            self.factors.clone(),
            self.initial_volume.into(),
            min_volume,
            max_volume,
        )?;
        set_node_meta(network, idx, self.comment.as_deref(), None)?;
        Ok(idx)
    }

    pub fn set_constraints(&self, network: &mut Network) -> Result<(), SchemaError> {
        if let Some(cost) = &self.cost {
            let idx = core_node_index(network, &self.name, None)?;
            let value = cost.load(network)?;
            network.set_node_cost(idx, value)?;
        }
        Ok(())
    }
}
