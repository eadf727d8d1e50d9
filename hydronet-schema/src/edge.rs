use crate::error::SchemaError;
use crate::network::NetworkSchema;
use crate::nodes::core_node_index;
use hydronet_core::edge::EdgeIndex;
use hydronet_core::network::Network;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Edge {
    pub from_node: String,
    pub to_node: String,
}

const EDGE_SYMBOL: &str = "->";

impl Display for Edge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.from_node, EDGE_SYMBOL, self.to_node)
    }
}

impl Edge {
    /// Connect the two nodes in `network`. Both nodes must be defined in `schema`.
    pub fn add_to_model(&self, network: &mut Network, schema: &NetworkSchema) -> Result<EdgeIndex, SchemaError> {
        for name in [&self.from_node, &self.to_node] {
            if schema.get_node_by_name(name).is_none() {
                return Err(SchemaError::NodeNotFound { name: name.clone() });
            }
        }

        let from_node = core_node_index(network, &self.from_node, None)?;
        let to_node = core_node_index(network, &self.to_node, None)?;
        Ok(network.connect_nodes(from_node, to_node)?)
    }
}
