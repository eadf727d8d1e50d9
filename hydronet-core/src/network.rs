use crate::aggregated_node::AggregatedNode;
use crate::aggregated_storage_node::AggregatedStorageNode;
use crate::edge::{EdgeIndex, EdgeVec};
use crate::node::{ConstraintValue, Node, NodeError, NodeIndex, NodeKind, NodeType, NodeVec};
use crate::parameters::{Parameter, ParameterCollection, ParameterError, ParameterIndex};
use crate::recorders::{Recorder, RecorderError, RecorderIndex};
use crate::scenario::{ScenarioCollection, ScenarioError, ScenarioIndex};
use crate::state::FlowState;
use crate::storage::{StorageInitialVolume, StorageNode};
use crate::timestep::Timestep;
use crate::virtual_storage::VirtualStorageNode;
use ndarray::Array1;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::fmt;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Node with index `{index}` not found")]
    NodeIndexNotFound { index: NodeIndex },
    #[error("Node with name `{name}` and sub-name `{}` already exists", .sub_name.as_deref().unwrap_or("None"))]
    NodeAlreadyExists { name: String, sub_name: Option<String> },
    #[error("Error setting attribute `{attribute}` for node `{name}` and sub-name `{}`: {source}", .sub_name.as_deref().unwrap_or("None"))]
    NodeSetAttributeError {
        name: String,
        sub_name: Option<String>,
        attribute: String,
        #[source]
        source: Box<NodeError>,
    },
    #[error("Error on node `{name}` and sub-name `{}`: {source}", .sub_name.as_deref().unwrap_or("None"))]
    NodeError {
        name: String,
        sub_name: Option<String>,
        #[source]
        source: Box<NodeError>,
    },
    #[error("Cannot connect a node to itself: `{name}`")]
    NodeConnectToSelf { name: String, sub_name: Option<String> },
    #[error("Node `{name}` is not connected to any other node")]
    IsolatedNode { name: String, sub_name: Option<String> },
    #[error("Initial volume {initial_volume} of node `{name}` is outside of its bounds [{min_volume}, {max_volume}]")]
    InitialVolumeOutOfBounds {
        name: String,
        initial_volume: f64,
        min_volume: f64,
        max_volume: f64,
    },
    #[error("Circular dependency between nodes: {}", .0.join(", "))]
    CircularDependency(Vec<String>),
    #[error("`{operation}` can not be called while the network is in the `{phase}` phase")]
    InvalidPhase {
        operation: &'static str,
        phase: NetworkPhase,
    },
    #[error("The network has changed since it was set up; `setup` must be called again")]
    NetworkIsDirty,
    #[error("Recorder name `{0}` already exists")]
    RecorderNameAlreadyExists(String),
    #[error("Error in recorder `{name}`: {source}")]
    RecorderError {
        name: String,
        #[source]
        source: RecorderError,
    },
    #[error("Scenario error: {0}")]
    ScenarioError(#[from] ScenarioError),
    #[error("Parameter error: {0}")]
    ParameterError(#[from] ParameterError),
}

/// Where the network is in its lifecycle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum NetworkPhase {
    #[default]
    Unconfigured,
    Setup,
    Ready,
    Before,
    Committed,
    After,
    Finished,
}

impl Display for NetworkPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Setup => "setup",
            Self::Ready => "ready",
            Self::Before => "before",
            Self::Committed => "committed",
            Self::After => "after",
            Self::Finished => "finished",
        };
        write!(f, "{name}")
    }
}

fn node_error(node: &Node, source: impl Into<NodeError>) -> NetworkError {
    NetworkError::NodeError {
        name: node.name().to_string(),
        sub_name: node.sub_name().map(|s| s.to_string()),
        source: Box::new(source.into()),
    }
}

/// A network of nodes and the state of every node for every scenario combination.
///
/// The network drives the per time-step lifecycle of its nodes:
///
/// 1. [`Network::setup`] sizes every node's state to the number of scenario combinations.
/// 2. [`Network::reset`] restores the initial state.
/// 3. For each time-step: [`Network::before`], any number of [`Network::commit`] calls from a
///    solver, then [`Network::after`].
/// 4. [`Network::finish`].
///
/// Calls out of this order return [`NetworkError::InvalidPhase`]. Any structural change made after
/// `setup` marks the network dirty until `setup` is called again.
#[derive(Default)]
pub struct Network {
    scenarios: ScenarioCollection,
    nodes: NodeVec,
    edges: EdgeVec,
    parameters: ParameterCollection,
    recorders: Vec<Box<dyn Recorder>>,
    resolve_order: Vec<NodeIndex>,
    phase: NetworkPhase,
    generation: u64,
    setup_generation: Option<u64>,
}

impl Network {
    pub fn new(scenarios: ScenarioCollection) -> Self {
        Self {
            scenarios,
            ..Default::default()
        }
    }

    pub fn scenarios(&self) -> &ScenarioCollection {
        &self.scenarios
    }

    /// Changes to the scenarios mark the network dirty.
    pub fn scenarios_mut(&mut self) -> &mut ScenarioCollection {
        &mut self.scenarios
    }

    pub fn nodes(&self) -> &NodeVec {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeVec {
        &self.edges
    }

    pub fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }

    pub fn phase(&self) -> NetworkPhase {
        self.phase
    }

    /// The order in which node state is updated during [`Network::after`].
    pub fn resolve_order(&self) -> &[NodeIndex] {
        &self.resolve_order
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if the network or its scenarios changed since the last [`Network::setup`].
    pub fn is_dirty(&self) -> bool {
        self.setup_generation != Some(self.generation) || self.scenarios.is_dirty()
    }

    fn bump_generation(&mut self) {
        self.generation += 1;
    }

    fn ensure_phase(&self, allowed: &[NetworkPhase], operation: &'static str) -> Result<(), NetworkError> {
        if !allowed.contains(&self.phase) {
            return Err(NetworkError::InvalidPhase {
                operation,
                phase: self.phase,
            });
        }
        if self.is_dirty() {
            return Err(NetworkError::NetworkIsDirty);
        }
        Ok(())
    }

    /// Get a Node from a node's index
    pub fn get_node(&self, index: &NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    fn node(&self, index: &NodeIndex) -> Result<&Node, NetworkError> {
        self.nodes
            .get(index)
            .ok_or(NetworkError::NodeIndexNotFound { index: *index })
    }

    fn node_mut(&mut self, index: &NodeIndex) -> Result<&mut Node, NetworkError> {
        self.nodes
            .get_mut(index)
            .ok_or(NetworkError::NodeIndexNotFound { index: *index })
    }

    fn node_error_at(&self, index: NodeIndex, source: impl Into<NodeError>) -> NetworkError {
        match self.nodes.get(&index) {
            Some(node) => node_error(node, source),
            None => NetworkError::NodeIndexNotFound { index },
        }
    }

    /// Get a Node from a node's name
    pub fn get_node_by_name(&self, name: &str, sub_name: Option<&str>) -> Option<&Node> {
        self.nodes.iter().find(|&n| n.full_name() == (name, sub_name))
    }

    /// Get a NodeIndex from a node's name
    pub fn get_node_index_by_name(&self, name: &str, sub_name: Option<&str>) -> Option<NodeIndex> {
        self.get_node_by_name(name, sub_name).map(|n| n.index())
    }

    fn check_name_available(&self, name: &str, sub_name: Option<&str>) -> Result<(), NetworkError> {
        if self.get_node_by_name(name, sub_name).is_some() {
            return Err(NetworkError::NodeAlreadyExists {
                name: name.to_string(),
                sub_name: sub_name.map(|s| s.to_string()),
            });
        }
        Ok(())
    }

    /// Add a new input node to the network.
    pub fn add_input_node(&mut self, name: &str, sub_name: Option<&str>) -> Result<NodeIndex, NetworkError> {
        self.check_name_available(name, sub_name)?;
        let node_index = self.nodes.push_new_input(name, sub_name);
        self.bump_generation();
        Ok(node_index)
    }

    /// Add a new link node to the network.
    pub fn add_link_node(&mut self, name: &str, sub_name: Option<&str>) -> Result<NodeIndex, NetworkError> {
        self.check_name_available(name, sub_name)?;
        let node_index = self.nodes.push_new_link(name, sub_name);
        self.bump_generation();
        Ok(node_index)
    }

    /// Add a new output node to the network.
    pub fn add_output_node(&mut self, name: &str, sub_name: Option<&str>) -> Result<NodeIndex, NetworkError> {
        self.check_name_available(name, sub_name)?;
        let node_index = self.nodes.push_new_output(name, sub_name);
        self.bump_generation();
        Ok(node_index)
    }

    /// Add a new storage node to the network.
    ///
    /// The storage's `input` and `output` satellite nodes are added alongside it with the same
    /// name and the sub-names "input" and "output".
    pub fn add_storage_node(
        &mut self,
        name: &str,
        initial_volume: StorageInitialVolume,
        min_volume: ConstraintValue,
        max_volume: ConstraintValue,
    ) -> Result<NodeIndex, NetworkError> {
        for sub_name in [None, Some("input"), Some("output")] {
            self.check_name_available(name, sub_name)?;
        }

        let storage = StorageNode::new(initial_volume, min_volume, max_volume);
        let node_index = self.nodes.push_new_storage(name, storage);
        self.bump_generation();
        Ok(node_index)
    }

    /// Add a new aggregated node to the network.
    pub fn add_aggregated_node(
        &mut self,
        name: &str,
        sub_name: Option<&str>,
        nodes: &[NodeIndex],
        factors: Option<Vec<f64>>,
    ) -> Result<NodeIndex, NetworkError> {
        self.check_name_available(name, sub_name)?;
        for idx in nodes {
            self.node(idx)?;
        }

        let node = AggregatedNode::new(nodes, factors).map_err(|source| NetworkError::NodeError {
            name: name.to_string(),
            sub_name: sub_name.map(|s| s.to_string()),
            source: Box::new(source),
        })?;
        let node_index = self.nodes.push_new_aggregated(name, sub_name, node);
        self.bump_generation();
        Ok(node_index)
    }

    /// Add a new aggregated storage node to the network.
    pub fn add_aggregated_storage_node(
        &mut self,
        name: &str,
        sub_name: Option<&str>,
        nodes: &[NodeIndex],
    ) -> Result<NodeIndex, NetworkError> {
        self.check_name_available(name, sub_name)?;

        let node = AggregatedStorageNode::new(nodes, &self.nodes).map_err(|source| NetworkError::NodeError {
            name: name.to_string(),
            sub_name: sub_name.map(|s| s.to_string()),
            source: Box::new(source),
        })?;
        let node_index = self.nodes.push_new_aggregated_storage(name, sub_name, node);
        self.bump_generation();
        Ok(node_index)
    }

    /// Add a new virtual storage node to the network.
    #[allow(clippy::too_many_arguments)]
    pub fn add_virtual_storage_node(
        &mut self,
        name: &str,
        sub_name: Option<&str>,
        nodes: &[NodeIndex],
        factors: Option<Vec<f64>>,
        initial_volume: StorageInitialVolume,
        min_volume: ConstraintValue,
        max_volume: ConstraintValue,
    ) -> Result<NodeIndex, NetworkError> {
        self.check_name_available(name, sub_name)?;
        for idx in nodes {
            self.node(idx)?;
        }

        let storage = StorageNode::new(initial_volume, min_volume, max_volume);
        let node = VirtualStorageNode::new(storage, nodes, factors).map_err(|source| NetworkError::NodeError {
            name: name.to_string(),
            sub_name: sub_name.map(|s| s.to_string()),
            source: Box::new(source),
        })?;
        let node_index = self.nodes.push_new_virtual_storage(name, sub_name, node);
        self.bump_generation();
        Ok(node_index)
    }

    /// Replace the constituents of an aggregated or aggregated storage node.
    ///
    /// Aggregated node factors are cleared.
    pub fn set_aggregated_node_nodes(&mut self, index: NodeIndex, nodes: &[NodeIndex]) -> Result<(), NetworkError> {
        for idx in nodes {
            self.node(idx)?;
        }

        let node = self.node(&index)?;
        let replacement = match node.kind() {
            NodeKind::Aggregated(_) => None,
            NodeKind::AggregatedStorage(_) => {
                Some(AggregatedStorageNode::new(nodes, &self.nodes).map_err(|e| node_error(node, e))?)
            }
            _ => return Err(node_error(node, NodeError::NotAggregated)),
        };

        let node = self.node_mut(&index)?;
        match (&mut node.kind, replacement) {
            (NodeKind::AggregatedStorage(n), Some(replacement)) => *n = replacement,
            (NodeKind::Aggregated(n), _) => n.set_nodes(nodes),
            _ => {}
        }
        self.bump_generation();
        Ok(())
    }

    /// Rename a node. The name must not be used by any other node.
    ///
    /// Renaming a storage also renames its input and output nodes. On error the existing names
    /// are kept.
    pub fn set_node_name(&mut self, index: NodeIndex, name: &str, sub_name: Option<&str>) -> Result<(), NetworkError> {
        let node = self.node(&index)?;

        let mut renames = vec![(index, sub_name)];
        if let Some(satellites) = node.storage_node().and_then(|s| s.satellites()) {
            renames.push((satellites.input, Some("input")));
            renames.push((satellites.output, Some("output")));
        }

        for (idx, sub_name) in &renames {
            if let Some(existing) = self.get_node_by_name(name, *sub_name) {
                if existing.index() != *idx {
                    return Err(NetworkError::NodeAlreadyExists {
                        name: name.to_string(),
                        sub_name: sub_name.map(|s| s.to_string()),
                    });
                }
            }
        }

        for (idx, sub_name) in renames {
            self.node_mut(&idx)?.set_full_name(name, sub_name);
        }
        Ok(())
    }

    fn set_node_attribute<F>(&mut self, index: NodeIndex, attribute: &str, f: F) -> Result<(), NetworkError>
    where
        F: FnOnce(&mut Node) -> Result<(), NodeError>,
    {
        let node = self.node_mut(&index)?;
        f(node).map_err(|source| NetworkError::NodeSetAttributeError {
            name: node.name().to_string(),
            sub_name: node.sub_name().map(|s| s.to_string()),
            attribute: attribute.to_string(),
            source: Box::new(source),
        })
    }

    pub fn set_node_cost(&mut self, index: NodeIndex, value: ConstraintValue) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "cost", |n| n.set_cost(value))
    }

    pub fn set_node_min_flow(&mut self, index: NodeIndex, value: ConstraintValue) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "min_flow", |n| n.set_min_flow(value))
    }

    pub fn set_node_max_flow(&mut self, index: NodeIndex, value: ConstraintValue) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "max_flow", |n| n.set_max_flow(value))
    }

    pub fn set_node_conversion_factor(&mut self, index: NodeIndex, value: ConstraintValue) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "conversion_factor", |n| n.set_conversion_factor(value))
    }

    pub fn set_node_min_volume(&mut self, index: NodeIndex, value: ConstraintValue) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "min_volume", |n| n.set_min_volume(value))
    }

    pub fn set_node_max_volume(&mut self, index: NodeIndex, value: ConstraintValue) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "max_volume", |n| n.set_max_volume(value))
    }

    pub fn set_node_initial_volume(
        &mut self,
        index: NodeIndex,
        value: StorageInitialVolume,
    ) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "initial_volume", |n| n.set_initial_volume(value))
    }

    pub fn set_node_level(&mut self, index: NodeIndex, value: ConstraintValue) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "level", |n| n.set_level(value))
    }

    pub fn set_node_factors(&mut self, index: NodeIndex, factors: Option<Vec<f64>>) -> Result<(), NetworkError> {
        self.set_node_attribute(index, "factors", |n| match &mut n.kind {
            NodeKind::Aggregated(agg) => agg.set_factors(factors),
            _ => Err(NodeError::NotAggregated),
        })?;
        self.bump_generation();
        Ok(())
    }

    pub fn set_node_comment(&mut self, index: NodeIndex, comment: &str) -> Result<(), NetworkError> {
        self.node_mut(&index)?.set_comment(comment);
        Ok(())
    }

    pub fn set_node_domain(&mut self, index: NodeIndex, domain: Option<&str>) -> Result<(), NetworkError> {
        self.node_mut(&index)?.set_domain(domain);
        Ok(())
    }

    pub fn set_node_allow_isolated(&mut self, index: NodeIndex, allow_isolated: bool) -> Result<(), NetworkError> {
        self.node_mut(&index)?.set_allow_isolated(allow_isolated);
        Ok(())
    }

    /// The domain of a node, inherited from its nearest ancestor when it has none of its own.
    pub fn node_domain(&self, index: NodeIndex) -> Result<Option<&str>, NetworkError> {
        let mut node = self.node(&index)?;
        // A parent chain can never be longer than the number of nodes.
        for _ in 0..self.nodes.len() {
            if let Some(domain) = node.domain() {
                return Ok(Some(domain));
            }
            match node.parent() {
                Some(parent) => node = self.node(&parent)?,
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Connect two nodes with a new edge.
    ///
    /// Connections to or from a storage node are made through its output or input node
    /// respectively.
    pub fn connect_nodes(&mut self, from_node_index: NodeIndex, to_node_index: NodeIndex) -> Result<EdgeIndex, NetworkError> {
        let from_node = self.node(&from_node_index)?;
        self.node(&to_node_index)?;

        // Self connections are not allowed.
        if from_node_index == to_node_index {
            return Err(NetworkError::NodeConnectToSelf {
                name: from_node.name().to_string(),
                sub_name: from_node.sub_name().map(|s| s.to_string()),
            });
        }

        let from_node_index = self.storage_satellite(from_node_index, true)?;
        let to_node_index = self.storage_satellite(to_node_index, false)?;

        // Validate both ends first so a failure can not leave a half-connected edge.
        let from_node = self.node(&from_node_index)?;
        from_node.can_connect(true).map_err(|e| node_error(from_node, e))?;
        let to_node = self.node(&to_node_index)?;
        to_node.can_connect(false).map_err(|e| node_error(to_node, e))?;

        let edge_index = self.edges.push(from_node_index, to_node_index);

        let from_node = self.node_mut(&from_node_index)?;
        from_node
            .add_outgoing_edge(edge_index)
            .map_err(|e| node_error(from_node, e))?;
        let to_node = self.node_mut(&to_node_index)?;
        to_node
            .add_incoming_edge(edge_index)
            .map_err(|e| node_error(to_node, e))?;

        self.bump_generation();
        Ok(edge_index)
    }

    /// Route a connection to a storage node through its satellites.
    fn storage_satellite(&self, index: NodeIndex, outgoing: bool) -> Result<NodeIndex, NetworkError> {
        let node = self.node(&index)?;
        match node.kind() {
            NodeKind::Storage(storage) => match storage.satellites() {
                Some(satellites) if outgoing => Ok(satellites.input),
                Some(satellites) => Ok(satellites.output),
                None => Err(node_error(node, NodeError::InvalidConnectionToStorage)),
            },
            _ => Ok(index),
        }
    }

    /// Add a parameter to the network.
    pub fn add_parameter(&mut self, parameter: Box<dyn Parameter>) -> Result<ParameterIndex, NetworkError> {
        let index = self.parameters.add(parameter)?;
        self.bump_generation();
        Ok(index)
    }

    pub fn get_parameter_index_by_name(&self, name: &str) -> Option<ParameterIndex> {
        self.parameters.get_index_by_name(name)
    }

    /// The parameters that are decision variables.
    pub fn variables(&self) -> Vec<ParameterIndex> {
        self.parameters.variables()
    }

    /// Add a recorder, attaching it to the node it observes.
    pub fn add_recorder(&mut self, recorder: Box<dyn Recorder>) -> Result<RecorderIndex, NetworkError> {
        if self.get_recorder_by_name(recorder.name()).is_some() {
            return Err(NetworkError::RecorderNameAlreadyExists(recorder.name().to_string()));
        }

        let recorder_index = RecorderIndex::new(self.recorders.len());
        if let Some(node_index) = recorder.node() {
            self.node_mut(&node_index)?.add_recorder(recorder_index);
        }
        self.recorders.push(recorder);
        self.bump_generation();
        Ok(recorder_index)
    }

    pub fn get_recorder(&self, index: RecorderIndex) -> Option<&dyn Recorder> {
        self.recorders.get(*index).map(|r| r.as_ref())
    }

    pub fn get_recorder_by_name(&self, name: &str) -> Option<&dyn Recorder> {
        self.recorders.iter().find(|r| r.name() == name).map(|r| r.as_ref())
    }

    /// Apply `f` to every recorder while the network is borrowed immutably.
    fn with_recorders<F>(&mut self, mut f: F) -> Result<(), NetworkError>
    where
        F: FnMut(&mut dyn Recorder, &Network) -> Result<(), RecorderError>,
    {
        let mut recorders = std::mem::take(&mut self.recorders);
        let result = recorders.iter_mut().try_for_each(|r| {
            f(r.as_mut(), self).map_err(|source| NetworkError::RecorderError {
                name: r.name().to_string(),
                source,
            })
        });
        self.recorders = recorders;
        result
    }

    /// Order the nodes so that every node comes after the nodes its state is derived from.
    fn compute_resolve_order(&self) -> Result<Vec<NodeIndex>, NetworkError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for node in self.nodes.iter() {
            for dependency in node.dependencies() {
                self.node(dependency)?;
                in_degree[*node.index()] += 1;
                dependents[**dependency].push(*node.index());
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|i| in_degree[*i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(self.nodes[i].index());
            for d in &dependents[i] {
                in_degree[*d] -= 1;
                if in_degree[*d] == 0 {
                    queue.push_back(*d);
                }
            }
        }

        if order.len() != n {
            let names = self
                .nodes
                .iter()
                .filter(|node| in_degree[*node.index()] > 0)
                .map(|node| node.name().to_string())
                .collect();
            return Err(NetworkError::CircularDependency(names));
        }

        Ok(order)
    }

    /// Prepare the network for a simulation.
    ///
    /// Caches the scenario combinations, computes the resolve order and sizes every node's state.
    pub fn setup(&mut self) -> Result<(), NetworkError> {
        self.scenarios.setup()?;
        let size = self.scenarios.combinations().len();

        self.resolve_order = self.compute_resolve_order()?;
        debug!("Resolve order: {:?}", self.resolve_order);

        self.nodes.iter_mut().for_each(|n| n.setup(size));
        self.parameters.clear_cache();

        self.setup_generation = Some(self.generation);
        self.phase = NetworkPhase::Setup;

        info!(
            "Network setup with {} node(s), {} edge(s) and {} scenario combination(s).",
            self.nodes.len(),
            self.edges.len(),
            size
        );
        Ok(())
    }

    /// Restore the initial state. `timestep` is the first time-step of the simulation.
    pub fn reset(&mut self, timestep: &Timestep) -> Result<(), NetworkError> {
        use NetworkPhase::*;
        self.ensure_phase(&[Setup, Ready, Before, Committed, After, Finished], "reset")?;

        self.parameters.clear_cache();
        self.nodes.as_mut_slice().par_iter_mut().for_each(|n| n.flow.reset());

        for idx in self.resolve_order.clone() {
            self.reset_node_volume(idx, timestep)?;
        }

        self.with_recorders(|r, network| r.setup(network))?;

        self.phase = Ready;
        debug!("Network reset at time-step {}", timestep.index);
        Ok(())
    }

    fn reset_node_volume(&mut self, index: NodeIndex, timestep: &Timestep) -> Result<(), NetworkError> {
        let combinations = self.scenarios.combinations();
        let node = self.node(&index)?;

        match node.kind() {
            NodeKind::AggregatedStorage(agg) => {
                let volume = agg
                    .aggregate_volume(&self.nodes, combinations.len())
                    .map_err(|e| node_error(node, e))?;
                let max_volume = agg
                    .aggregate_max_volume(&self.nodes, timestep, combinations, &self.parameters)
                    .map_err(|e| node_error(node, e))?;

                if let Some(NodeKind::AggregatedStorage(agg)) = self.nodes.get_mut(&index).map(|n| &mut n.kind) {
                    agg.reset(&volume, &max_volume)
                        .map_err(|e| self.node_error_at(index, e))?;
                }
            }
            NodeKind::Storage(_) | NodeKind::VirtualStorage(_) => {
                let storage = match self.nodes.get_mut(&index).map(|n| &mut n.kind) {
                    Some(NodeKind::Storage(s)) => s,
                    Some(NodeKind::VirtualStorage(vs)) => vs.storage_mut(),
                    _ => return Err(NetworkError::NodeIndexNotFound { index }),
                };
                storage
                    .reset(timestep, combinations, &self.parameters)
                    .map_err(|e| self.node_error_at(index, e))?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Start a time-step: zero every node's flow and evaluate the parameters.
    ///
    /// Calling this again before [`Network::after`] has no further effect on the state.
    pub fn before(&mut self, timestep: &Timestep) -> Result<(), NetworkError> {
        use NetworkPhase::*;
        self.ensure_phase(&[Ready, Before, After], "before")?;

        self.nodes.as_mut_slice().par_iter_mut().for_each(|n| n.flow.zero());
        self.set_parameters(timestep)?;

        self.phase = Before;
        Ok(())
    }

    /// Evaluate and cache every parameter for `timestep`.
    pub fn set_parameters(&mut self, timestep: &Timestep) -> Result<(), NetworkError> {
        self.parameters
            .set_values(timestep, self.scenarios.combinations())?;
        Ok(())
    }

    /// Add `value` to the flow of a node for the combination `global_id`.
    ///
    /// Commits to a storage's input node are mirrored onto the storage with the opposite sign;
    /// commits to its output node are mirrored as-is.
    pub fn commit(&mut self, index: NodeIndex, global_id: usize, value: f64) -> Result<(), NetworkError> {
        use NetworkPhase::*;
        self.ensure_phase(&[Before, Committed], "commit")?;

        let node = self.node_mut(&index)?;
        let mirror = mirror_target(node).map_err(|e| node_error(node, e))?;
        node.flow.add(global_id, value).map_err(|e| node_error(node, e))?;

        if let Some((parent, sign)) = mirror {
            let parent = self.node_mut(&parent)?;
            parent
                .flow
                .add(global_id, sign * value)
                .map_err(|e| node_error(parent, e))?;
        }

        self.phase = Committed;
        Ok(())
    }

    /// Add one value per combination to the flow of a node.
    pub fn commit_all(&mut self, index: NodeIndex, values: &[f64]) -> Result<(), NetworkError> {
        use NetworkPhase::*;
        self.ensure_phase(&[Before, Committed], "commit_all")?;

        let node = self.node_mut(&index)?;
        let mirror = mirror_target(node).map_err(|e| node_error(node, e))?;
        node.flow.add_all(values).map_err(|e| node_error(node, e))?;

        if let Some((parent, sign)) = mirror {
            let mirrored: Vec<f64> = values.iter().map(|v| sign * v).collect();
            let parent = self.node_mut(&parent)?;
            parent.flow.add_all(&mirrored).map_err(|e| node_error(parent, e))?;
        }

        self.phase = Committed;
        Ok(())
    }

    /// Finish a time-step.
    ///
    /// Every node snapshots its flow; storage volumes are integrated and derived nodes are
    /// recomputed in resolve order.
    pub fn after(&mut self, timestep: &Timestep) -> Result<(), NetworkError> {
        use NetworkPhase::*;
        self.ensure_phase(&[Before, Committed], "after")?;

        for idx in self.resolve_order.clone() {
            self.after_node(idx, timestep)?;
        }

        self.phase = After;
        Ok(())
    }

    fn after_node(&mut self, index: NodeIndex, timestep: &Timestep) -> Result<(), NetworkError> {
        let combinations = self.scenarios.combinations();
        let size = combinations.len();
        let node = self.node(&index)?;

        // Derived nodes compute their new flow from their (already updated) constituents.
        let (derived_flow, aggregated_max_volume) = match node.kind() {
            NodeKind::Aggregated(agg) => (
                Some(agg.aggregate_flow(&self.nodes, size).map_err(|e| node_error(node, e))?),
                None,
            ),
            NodeKind::AggregatedStorage(agg) => (
                Some(agg.aggregate_flow(&self.nodes, size).map_err(|e| node_error(node, e))?),
                Some(
                    agg.aggregate_max_volume(&self.nodes, timestep, combinations, &self.parameters)
                        .map_err(|e| node_error(node, e))?,
                ),
            ),
            NodeKind::VirtualStorage(vs) => (
                Some(vs.virtual_flow(&self.nodes, size).map_err(|e| node_error(node, e))?),
                None,
            ),
            _ => (None, None),
        };

        let Node { flow, kind, .. } = self
            .nodes
            .get_mut(&index)
            .ok_or(NetworkError::NodeIndexNotFound { index })?;

        update_node_state(
            flow,
            kind,
            derived_flow.as_ref(),
            aggregated_max_volume.as_ref(),
            timestep,
            combinations,
            &self.parameters,
        )
        .map_err(|e| self.node_error_at(index, e))
    }

    /// Pass the current state to every recorder. Valid only after [`Network::after`].
    pub fn save_recorders(&mut self, timestep: &Timestep) -> Result<(), NetworkError> {
        self.ensure_phase(&[NetworkPhase::After], "save_recorders")?;
        self.with_recorders(|r, network| r.save(timestep, network))
    }

    /// End the simulation.
    pub fn finish(&mut self) -> Result<(), NetworkError> {
        use NetworkPhase::*;
        self.ensure_phase(&[Ready, Before, Committed, After], "finish")?;
        self.with_recorders(|r, _| r.finish())?;
        self.phase = Finished;
        debug!("Network finished");
        Ok(())
    }

    /// Validate the structure of the network.
    ///
    /// Every node that does not allow isolation must be connected to another node. Storage
    /// initial volumes given as constants must lie within constant volume bounds.
    pub fn check(&self) -> Result<(), NetworkError> {
        for node in self.nodes.iter() {
            if !node.allow_isolated() && self.is_isolated(node)? {
                return Err(NetworkError::IsolatedNode {
                    name: node.name().to_string(),
                    sub_name: node.sub_name().map(|s| s.to_string()),
                });
            }

            if let Some((initial_volume, min_volume, max_volume)) =
                node.storage_node().and_then(|s| s.constant_bounds())
            {
                if initial_volume < min_volume || initial_volume > max_volume {
                    return Err(NetworkError::InitialVolumeOutOfBounds {
                        name: node.name().to_string(),
                        initial_volume,
                        min_volume,
                        max_volume,
                    });
                }
            }
        }
        Ok(())
    }

    fn is_isolated(&self, node: &Node) -> Result<bool, NetworkError> {
        let has_edges = |n: &Node| !n.incoming_edges().is_empty() || !n.outgoing_edges().is_empty();

        if has_edges(node) {
            return Ok(false);
        }

        if let Some(satellites) = node.storage_node().and_then(|s| s.satellites()) {
            let input = self.node(&satellites.input)?;
            let output = self.node(&satellites.output)?;
            return Ok(!has_edges(input) && !has_edges(output));
        }

        Ok(true)
    }

    pub fn get_node_cost(
        &self,
        index: NodeIndex,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
    ) -> Result<f64, NetworkError> {
        let node = self.node(&index)?;
        let cost = match node.kind() {
            NodeKind::Input(n) | NodeKind::Output(n) | NodeKind::Link(n) => n.cost(),
            NodeKind::Storage(s) => s.cost,
            NodeKind::VirtualStorage(vs) => vs.storage().cost,
            NodeKind::StorageInput(s) => {
                return Ok(-self.get_node_cost(s.parent(), timestep, scenario_index)?);
            }
            NodeKind::StorageOutput(s) => {
                return self.get_node_cost(s.parent(), timestep, scenario_index);
            }
            NodeKind::Aggregated(_) | NodeKind::AggregatedStorage(_) => {
                return Err(node_error(node, NodeError::CostUndefined));
            }
        };
        self.evaluate(node, &cost, timestep, scenario_index)
    }

    pub fn get_node_min_flow(
        &self,
        index: NodeIndex,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
    ) -> Result<f64, NetworkError> {
        let node = self.node(&index)?;
        let constraints = node
            .flow_constraints()
            .ok_or_else(|| node_error(node, NodeError::FlowConstraintsUndefined))?;
        self.evaluate(node, &constraints.min_flow, timestep, scenario_index)
    }

    pub fn get_node_max_flow(
        &self,
        index: NodeIndex,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
    ) -> Result<f64, NetworkError> {
        let node = self.node(&index)?;
        let constraints = node
            .flow_constraints()
            .ok_or_else(|| node_error(node, NodeError::FlowConstraintsUndefined))?;
        self.evaluate(node, &constraints.max_flow, timestep, scenario_index)
    }

    pub fn get_node_conversion_factor(&self, index: NodeIndex) -> Result<f64, NetworkError> {
        let node = self.node(&index)?;
        match node.kind() {
            NodeKind::Input(n) | NodeKind::Output(n) | NodeKind::Link(n) => Ok(n.conversion_factor()),
            _ => Err(node_error(node, NodeError::ConversionFactorUndefined)),
        }
    }

    /// The minimum volume; for aggregated storage the total of its constituents.
    pub fn get_node_min_volume(
        &self,
        index: NodeIndex,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
    ) -> Result<f64, NetworkError> {
        let node = self.node(&index)?;
        match node.kind() {
            NodeKind::AggregatedStorage(agg) => agg
                .nodes()
                .iter()
                .map(|idx| self.get_node_min_volume(*idx, timestep, scenario_index))
                .sum(),
            _ => {
                let storage = node
                    .storage_node()
                    .ok_or_else(|| node_error(node, NodeError::StorageConstraintsUndefined))?;
                self.evaluate(node, &storage.constraints().min_volume, timestep, scenario_index)
            }
        }
    }

    /// The maximum volume; for aggregated storage the total of its constituents.
    pub fn get_node_max_volume(
        &self,
        index: NodeIndex,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
    ) -> Result<f64, NetworkError> {
        let node = self.node(&index)?;
        match node.kind() {
            NodeKind::AggregatedStorage(agg) => agg
                .nodes()
                .iter()
                .map(|idx| self.get_node_max_volume(*idx, timestep, scenario_index))
                .sum(),
            _ => {
                let storage = node
                    .storage_node()
                    .ok_or_else(|| node_error(node, NodeError::StorageConstraintsUndefined))?;
                self.evaluate(node, &storage.constraints().max_volume, timestep, scenario_index)
            }
        }
    }

    pub fn get_node_level(
        &self,
        index: NodeIndex,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
    ) -> Result<f64, NetworkError> {
        let node = self.node(&index)?;
        let storage = node
            .storage_node()
            .ok_or_else(|| node_error(node, NodeError::LevelUndefined))?;
        self.evaluate(node, &storage.level, timestep, scenario_index)
    }

    fn evaluate(
        &self,
        node: &Node,
        value: &ConstraintValue,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
    ) -> Result<f64, NetworkError> {
        value
            .get(timestep, scenario_index, &self.parameters)
            .map_err(|e| node_error(node, e))
    }

    /// The number of nodes of each type, in first-seen order.
    pub fn node_type_counts(&self) -> Vec<(NodeType, usize)> {
        let mut counts: Vec<(NodeType, usize)> = Vec::new();
        for node in self.nodes.iter() {
            let node_type = node.node_type();
            match counts.iter_mut().find(|(t, _)| *t == node_type) {
                Some((_, count)) => *count += 1,
                None => counts.push((node_type, 1)),
            }
        }
        counts
    }
}

/// Snapshot a node's flow and integrate any volume it holds.
///
/// `derived_flow` replaces the current flow first when the node's flow is derived from other nodes.
fn update_node_state(
    flow: &mut FlowState,
    kind: &mut NodeKind,
    derived_flow: Option<&Array1<f64>>,
    aggregated_max_volume: Option<&Array1<f64>>,
    timestep: &Timestep,
    combinations: &[ScenarioIndex],
    parameters: &ParameterCollection,
) -> Result<(), NodeError> {
    if let Some(derived_flow) = derived_flow {
        flow.set(derived_flow)?;
    }
    flow.snapshot();

    match kind {
        NodeKind::Storage(storage) => storage.integrate(flow.flow(), timestep, combinations, parameters),
        NodeKind::VirtualStorage(vs) => vs
            .storage_mut()
            .integrate(flow.flow(), timestep, combinations, parameters),
        NodeKind::AggregatedStorage(agg) => match aggregated_max_volume {
            Some(max_volume) => agg.integrate(flow.flow(), timestep, max_volume),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

/// The parent a commit must be mirrored onto, and the sign to apply.
fn mirror_target(node: &Node) -> Result<Option<(NodeIndex, f64)>, NodeError> {
    match node.kind() {
        NodeKind::StorageInput(s) => Ok(Some((s.parent(), -1.0))),
        NodeKind::StorageOutput(s) => Ok(Some((s.parent(), 1.0))),
        NodeKind::Aggregated(_) | NodeKind::AggregatedStorage(_) | NodeKind::VirtualStorage(_) => {
            Err(NodeError::CommitToDerivedNode)
        }
        _ => Ok(None),
    }
}
