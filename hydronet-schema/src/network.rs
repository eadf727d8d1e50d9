use crate::edge::Edge;
use crate::error::{ModelSchemaBuildError, SchemaError};
use crate::nodes::Node;
use crate::parameters::Parameter;
use hydronet_core::network::Network;
use hydronet_core::scenario::ScenarioCollection;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Deserialize, Serialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct NetworkSchema {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub parameters: Option<Vec<Parameter>>,
}

impl NetworkSchema {
    pub fn get_node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn get_parameter_by_name(&self, name: &str) -> Option<&Parameter> {
        self.parameters.as_ref().and_then(|p| p.iter().find(|p| p.name() == name))
    }

    /// Build a network over `scenarios`.
    ///
    /// Parameters are added first, then nodes (in an order that satisfies references between
    /// them), then edges and finally each node's constraints.
    pub fn build_network(&self, scenarios: ScenarioCollection) -> Result<Network, ModelSchemaBuildError> {
        let mut network = Network::new(scenarios);

        for parameter in self.parameters.as_deref().unwrap_or_default() {
            parameter
                .add_to_model(&mut network)
                .map_err(|source| ModelSchemaBuildError::AddParameterError {
                    name: parameter.name().to_string(),
                    source: Box::new(source),
                })?;
        }

        let mut remaining_nodes: Vec<&Node> = self.nodes.iter().collect();
        while !remaining_nodes.is_empty() {
            let mut failed_nodes: Vec<&Node> = Vec::new();
            let n = remaining_nodes.len();
            for node in remaining_nodes.into_iter() {
                if let Err(e) = node.add_to_model(&mut network, self) {
                    match e {
                        // A node it refers to has not been added yet; try again on the next pass.
                        SchemaError::CoreNodeNotFound { .. } => failed_nodes.push(node),
                        _ => {
                            return Err(ModelSchemaBuildError::AddNodeError {
                                name: node.name().to_string(),
                                source: Box::new(e),
                            })
                        }
                    }
                }
            }

            if failed_nodes.len() == n {
                let failed_names = failed_nodes.iter().map(|n| n.name().to_string()).collect();
                return Err(ModelSchemaBuildError::CircularNodeReference(failed_names));
            }

            remaining_nodes = failed_nodes;
        }

        for edge in &self.edges {
            edge.add_to_model(&mut network, self)
                .map_err(|source| ModelSchemaBuildError::AddEdgeError {
                    from_node: edge.from_node.clone(),
                    to_node: edge.to_node.clone(),
                    source: Box::new(source),
                })?;
        }

        for node in &self.nodes {
            node.set_constraints(&mut network)
                .map_err(|source| ModelSchemaBuildError::SetNodeConstraintsError {
                    name: node.name().to_string(),
                    source: Box::new(source),
                })?;
        }

        debug!(
            "Built network with {} node(s), {} edge(s) and {} parameter(s)",
            network.nodes().len(),
            network.edges().len(),
            network.parameters().len()
        );

        Ok(network)
    }
}
