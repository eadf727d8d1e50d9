mod core;
mod virtual_nodes;

use crate::error::SchemaError;
use crate::network::NetworkSchema;
pub use core::{InputNode, LinkNode, OutputNode, StorageInitialVolume, StorageNode};
use hydronet_core::network::Network;
use hydronet_core::node::NodeIndex;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
pub use virtual_nodes::{AggregatedNode, AggregatedStorageNode, VirtualStorageNode};

#[derive(Deserialize, Serialize, Clone, Debug, Display)]
#[serde(tag = "type")]
pub enum Node {
    Input(InputNode),
    Link(LinkNode),
    Output(OutputNode),
    Storage(StorageNode),
    Aggregated(AggregatedNode),
    AggregatedStorage(AggregatedStorageNode),
    VirtualStorage(VirtualStorageNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Self::Input(n) => &n.name,
            Self::Link(n) => &n.name,
            Self::Output(n) => &n.name,
            Self::Storage(n) => &n.name,
            Self::Aggregated(n) => &n.name,
            Self::AggregatedStorage(n) => &n.name,
            Self::VirtualStorage(n) => &n.name,
        }
    }

    /// The names of the other nodes this node refers to.
    pub fn references(&self) -> &[String] {
        match self {
            Self::Aggregated(n) => &n.nodes,
            Self::AggregatedStorage(n) => &n.storage_nodes,
            Self::VirtualStorage(n) => &n.nodes,
            _ => &[],
        }
    }

    /// Add the node to `network`.
    ///
    /// Returns [`SchemaError::CoreNodeNotFound`] if a node this one refers to has not been
    /// added yet; the caller may try again later.
    pub fn add_to_model(&self, network: &mut Network, schema: &NetworkSchema) -> Result<NodeIndex, SchemaError> {
        for name in self.references() {
            if schema.get_node_by_name(name).is_none() {
                return Err(SchemaError::NodeNotFound { name: name.clone() });
            }
        }

        match self {
            Self::Input(n) => n.add_to_model(network),
            Self::Link(n) => n.add_to_model(network),
            Self::Output(n) => n.add_to_model(network),
            Self::Storage(n) => n.add_to_model(network),
            Self::Aggregated(n) => n.add_to_model(network),
            Self::AggregatedStorage(n) => n.add_to_model(network),
            Self::VirtualStorage(n) => n.add_to_model(network),
        }
    }

    pub fn set_constraints(&self, network: &mut Network) -> Result<(), SchemaError> {
        match self {
            Self::Input(n) => n.set_constraints(network),
            Self::Link(n) => n.set_constraints(network),
            Self::Output(n) => n.set_constraints(network),
            Self::Storage(n) => n.set_constraints(network),
            Self::Aggregated(n) => n.set_constraints(network),
            Self::AggregatedStorage(_) => Ok(()),
            Self::VirtualStorage(n) => n.set_constraints(network),
        }
    }
}

/// Find a node that has already been added to the network.
pub(crate) fn core_node_index(network: &Network, name: &str, sub_name: Option<&str>) -> Result<NodeIndex, SchemaError> {
    network
        .get_node_index_by_name(name, sub_name)
        .ok_or_else(|| SchemaError::CoreNodeNotFound {
            name: name.to_string(),
            sub_name: sub_name.map(|s| s.to_string()),
        })
}

pub(crate) fn core_node_indices(network: &Network, names: &[String]) -> Result<Vec<NodeIndex>, SchemaError> {
    names.iter().map(|name| core_node_index(network, name, None)).collect()
}

/// Apply the optional comment and domain common to every node.
pub(crate) fn set_node_meta(
    network: &mut Network,
    index: NodeIndex,
    comment: Option<&str>,
    domain: Option<&str>,
) -> Result<(), SchemaError> {
    if let Some(comment) = comment {
        network.set_node_comment(index, comment)?;
    }
    if domain.is_some() {
        network.set_node_domain(index, domain)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Node;

    #[test]
    fn test_node_type_tag() {
        let data = r#"{"type": "Link", "name": "river", "max_flow": {"type": "Literal", "value": 5.0}}"#;
        let node: Node = serde_json::from_str(data).unwrap();
        assert_eq!(node.name(), "river");
        assert_eq!(node.to_string(), "Link");
        assert!(node.references().is_empty());
    }
}
