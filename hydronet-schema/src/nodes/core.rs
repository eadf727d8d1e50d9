use crate::error::SchemaError;
use crate::metric::Metric;
use crate::nodes::{core_node_index, set_node_meta};
use hydronet_core::network::Network;
use hydronet_core::node::{ConstraintValue, NodeIndex};
use hydronet_core::storage::StorageInitialVolume as CoreStorageInitialVolume;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Set the flow constraints, cost and conversion factor shared by input, link and output nodes.
fn set_flow_constraints(
    network: &mut Network,
    name: &str,
    min_flow: Option<&Metric>,
    max_flow: Option<&Metric>,
    cost: Option<&Metric>,
    conversion_factor: Option<&Metric>,
) -> Result<(), SchemaError> {
    let idx = core_node_index(network, name, None)?;

    if let Some(cost) = cost {
        let value = cost.load(network)?;
        network.set_node_cost(idx, value)?;
    }

    if let Some(max_flow) = max_flow {
        let value = max_flow.load(network)?;
        network.set_node_max_flow(idx, value)?;
    }

    if let Some(min_flow) = min_flow {
        let value = min_flow.load(network)?;
        network.set_node_min_flow(idx, value)?;
    }

    if let Some(conversion_factor) = conversion_factor {
        let value = conversion_factor.load(network)?;
        network.set_node_conversion_factor(idx, value)?;
    }

    Ok(())
}

/// A node that supplies flow to the network, such as a river inflow.
///
/// If `max_flow` is not specified the flow is unconstrained. If `min_flow` is not specified it
/// defaults to 0.
#[derive(Deserialize, Serialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct InputNode {
    pub name: String,
    pub comment: Option<String>,
    pub domain: Option<String>,
    pub max_flow: Option<Metric>,
    pub min_flow: Option<Metric>,
    pub cost: Option<Metric>,
    pub conversion_factor: Option<Metric>,
}

impl InputNode {
    pub fn add_to_model(&self, network: &mut Network) -> Result<NodeIndex, SchemaError> {
        let idx = network.add_input_node(&self.name, None)?;
        set_node_meta(network, idx, self.comment.as_deref(), self.domain.as_deref())?;
        Ok(idx)
    }

    pub fn set_constraints(&self, network: &mut Network) -> Result<(), SchemaError> {
        set_flow_constraints(
            network,
            &self.name,
            self.min_flow.as_ref(),
            self.max_flow.as_ref(),
            self.cost.as_ref(),
            self.conversion_factor.as_ref(),
        )
    }
}

/// A node that passes flow through, such as a river reach or a junction.
#[derive(Deserialize, Serialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct LinkNode {
    pub name: String,
    pub comment: Option<String>,
    pub domain: Option<String>,
    pub max_flow: Option<Metric>,
    pub min_flow: Option<Metric>,
    pub cost: Option<Metric>,
    pub conversion_factor: Option<Metric>,
}

impl LinkNode {
    pub fn add_to_model(&self, network: &mut Network) -> Result<NodeIndex, SchemaError> {
        let idx = network.add_link_node(&self.name, None)?;
        set_node_meta(network, idx, self.comment.as_deref(), self.domain.as_deref())?;
        Ok(idx)
    }

    pub fn set_constraints(&self, network: &mut Network) -> Result<(), SchemaError> {
        set_flow_constraints(
            network,
            &self.name,
            self.min_flow.as_ref(),
            self.max_flow.as_ref(),
            self.cost.as_ref(),
            self.conversion_factor.as_ref(),
        )
    }
}

/// A node that removes flow from the network, such as a demand centre.
#[derive(Deserialize, Serialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct OutputNode {
    pub name: String,
    pub comment: Option<String>,
    pub domain: Option<String>,
    pub max_flow: Option<Metric>,
    pub min_flow: Option<Metric>,
    pub cost: Option<Metric>,
    pub conversion_factor: Option<Metric>,
}

impl OutputNode {
    pub fn add_to_model(&self, network: &mut Network) -> Result<NodeIndex, SchemaError> {
        let idx = network.add_output_node(&self.name, None)?;
        set_node_meta(network, idx, self.comment.as_deref(), self.domain.as_deref())?;
        Ok(idx)
    }

    pub fn set_constraints(&self, network: &mut Network) -> Result<(), SchemaError> {
        set_flow_constraints(
            network,
            &self.name,
            self.min_flow.as_ref(),
            self.max_flow.as_ref(),
            self.cost.as_ref(),
            self.conversion_factor.as_ref(),
        )
    }
}

#[derive(Deserialize, Serialize, Clone, PartialEq, Copy, Debug, Display)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum StorageInitialVolume {
    Absolute { volume: f64 },
    Proportional { proportion: f64 },
}

impl Default for StorageInitialVolume {
    fn default() -> Self {
        StorageInitialVolume::Proportional { proportion: 1.0 }
    }
}

impl From<StorageInitialVolume> for CoreStorageInitialVolume {
    fn from(v: StorageInitialVolume) -> Self {
        match v {
            StorageInitialVolume::Absolute { volume } => CoreStorageInitialVolume::Absolute(volume.into()),
            StorageInitialVolume::Proportional { proportion } => CoreStorageInitialVolume::Proportional(proportion),
        }
    }
}

/// Load optional min and max volumes; the minimum defaults to zero and the maximum to infinity.
pub(crate) fn load_volume_bounds(
    network: &Network,
    min_volume: Option<&Metric>,
    max_volume: Option<&Metric>,
) -> Result<(ConstraintValue, ConstraintValue), SchemaError> {
    let min_volume = match min_volume {
        Some(m) => m.load(network)?,
        None => ConstraintValue::Constant(0.0),
    };
    let max_volume = match max_volume {
        Some(m) => m.load(network)?,
        None => ConstraintValue::Constant(f64::INFINITY),
    };
    Ok((min_volume, max_volume))
}

/// A node that holds volume between time-steps, such as a reservoir.
///
/// Flow enters through the node's `output` and leaves through its `input`; edges to and from a
/// storage are connected to those automatically.
#[derive(Deserialize, Serialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct StorageNode {
    pub name: String,
    pub comment: Option<String>,
    pub domain: Option<String>,
    pub max_volume: Option<Metric>,
    pub min_volume: Option<Metric>,
    pub cost: Option<Metric>,
    pub level: Option<Metric>,
    #[serde(default)]
    pub initial_volume: StorageInitialVolume,
}

impl StorageNode {
    pub fn add_to_model(&self, network: &mut Network) -> Result<NodeIndex, SchemaError> {
        let (min_volume, max_volume) =
            load_volume_bounds(network, self.min_volume.as_ref(), self.max_volume.as_ref())?;

        let idx = network.add_storage_node(&self.name, self.initial_volume.into(), min_volume, max_volume)?;
        set_node_meta(network, idx, self.comment.as_deref(), self.domain.as_deref())?;
        Ok(idx)
    }

    pub fn set_constraints(&self, network: &mut Network) -> Result<(), SchemaError> {
        let idx = core_node_index(network, &self.name, None)?;

        if let Some(cost) = &self.cost {
            let value = cost.load(network)?;
            network.set_node_cost(idx, value)?;
        }

        if let Some(level) = &self.level {
            let value = level.load(network)?;
            network.set_node_level(idx, value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{StorageInitialVolume, StorageNode};

    #[test]
    fn test_storage_defaults() {
        let data = r#"{"name": "reservoir", "max_volume": {"type": "Literal", "value": 100.0}}"#;
        let node: StorageNode = serde_json::from_str(data).unwrap();
        assert_eq!(
            node.initial_volume,
            StorageInitialVolume::Proportional { proportion: 1.0 }
        );
        assert!(node.min_volume.is_none());
    }
}
