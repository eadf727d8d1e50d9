use crate::aggregated_node::AggregatedNode;
use crate::aggregated_storage_node::AggregatedStorageNode;
use crate::edge::EdgeIndex;
use crate::parameters::{ParameterCollection, ParameterError, ParameterIndex};
use crate::recorders::RecorderIndex;
use crate::scenario::ScenarioIndex;
use crate::state::{FlowState, StateError, StorageState};
use crate::storage::{StorageInitialVolume, StorageNode, StorageSatellite};
use crate::timestep::Timestep;
use crate::virtual_storage::VirtualStorageNode;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use thiserror::Error;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct NodeIndex(usize);

impl Deref for NodeIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for NodeIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum NodeError {
    #[error("Node does not have flow constraints")]
    FlowConstraintsUndefined,
    #[error("Node does not have storage constraints")]
    StorageConstraintsUndefined,
    #[error("Node does not have a cost")]
    CostUndefined,
    #[error("Node does not have a conversion factor")]
    ConversionFactorUndefined,
    #[error("Conversion factor must be a constant value")]
    ConversionFactorNotConstant,
    #[error("Node does not have a level")]
    LevelUndefined,
    #[error("Input nodes can not receive flow")]
    InvalidConnectionToInput,
    #[error("Output nodes can not send flow")]
    InvalidConnectionFromOutput,
    #[error("Virtual nodes can not be connected")]
    InvalidConnectionToVirtual,
    #[error("Storage nodes must be connected through their input and output nodes")]
    InvalidConnectionToStorage,
    #[error("Node is not an aggregated node")]
    NotAggregated,
    #[error("Flow can not be committed to a derived node")]
    CommitToDerivedNode,
    #[error("Expected {expected} factors (one per node); found {found}")]
    FactorCountMismatch { found: usize, expected: usize },
    #[error("Constituent node index `{0}` not found")]
    ConstituentNotFound(NodeIndex),
    #[error("Node index `{0}` is not a storage node")]
    ConstituentNotStorage(NodeIndex),
    #[error("State error: {0}")]
    State(#[from] StateError),
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),
}

/// A value that is either fixed or read from a parameter each time-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintValue {
    Constant(f64),
    Parameter(ParameterIndex),
}

impl ConstraintValue {
    pub fn get(
        &self,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
        parameters: &ParameterCollection,
    ) -> Result<f64, ParameterError> {
        match self {
            Self::Constant(v) => Ok(*v),
            Self::Parameter(idx) => parameters.get_value(*idx, timestep, scenario_index),
        }
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Self::Constant(v) => Some(*v),
            Self::Parameter(_) => None,
        }
    }
}

impl From<f64> for ConstraintValue {
    fn from(v: f64) -> Self {
        Self::Constant(v)
    }
}

impl From<ParameterIndex> for ConstraintValue {
    fn from(idx: ParameterIndex) -> Self {
        Self::Parameter(idx)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct FlowConstraints {
    pub min_flow: ConstraintValue,
    pub max_flow: ConstraintValue,
}

impl Default for FlowConstraints {
    fn default() -> Self {
        Self {
            min_flow: ConstraintValue::Constant(0.0),
            max_flow: ConstraintValue::Constant(f64::INFINITY),
        }
    }
}

impl FlowConstraints {
    /// Constraints that allow any flow, in either direction.
    pub fn unbounded() -> Self {
        Self {
            min_flow: ConstraintValue::Constant(f64::NEG_INFINITY),
            max_flow: ConstraintValue::Constant(f64::INFINITY),
        }
    }
}

/// Data common to every node.
#[derive(Debug)]
pub struct NodeMeta {
    index: NodeIndex,
    name: String,
    sub_name: Option<String>,
    comment: String,
    parent: Option<NodeIndex>,
    domain: Option<String>,
    recorders: Vec<RecorderIndex>,
    allow_isolated: bool,
    is_virtual: bool,
    incoming_edges: Vec<EdgeIndex>,
    outgoing_edges: Vec<EdgeIndex>,
}

impl NodeMeta {
    fn new(index: NodeIndex, name: &str, sub_name: Option<&str>) -> Self {
        Self {
            index,
            name: name.to_string(),
            sub_name: sub_name.map(|s| s.to_string()),
            comment: "".to_string(),
            parent: None,
            domain: None,
            recorders: Vec::new(),
            allow_isolated: false,
            is_virtual: false,
            incoming_edges: Vec::new(),
            outgoing_edges: Vec::new(),
        }
    }

    fn with_parent(mut self, parent: NodeIndex) -> Self {
        self.parent = Some(parent);
        self.allow_isolated = true;
        self
    }

    fn as_virtual(mut self) -> Self {
        self.is_virtual = true;
        self.allow_isolated = true;
        self
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
    pub fn sub_name(&self) -> Option<&str> {
        self.sub_name.as_deref()
    }
    pub fn full_name(&self) -> (&str, Option<&str>) {
        (self.name(), self.sub_name())
    }
}

/// An input, output or link node.
#[derive(Debug)]
pub struct FlowNode {
    pub(crate) flow_constraints: FlowConstraints,
    pub(crate) cost: ConstraintValue,
    pub(crate) conversion_factor: f64,
}

impl Default for FlowNode {
    fn default() -> Self {
        Self {
            flow_constraints: FlowConstraints::default(),
            cost: ConstraintValue::Constant(0.0),
            conversion_factor: 1.0,
        }
    }
}

impl FlowNode {
    pub fn flow_constraints(&self) -> &FlowConstraints {
        &self.flow_constraints
    }

    pub fn cost(&self) -> ConstraintValue {
        self.cost
    }

    pub fn conversion_factor(&self) -> f64 {
        self.conversion_factor
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Input(FlowNode),
    Output(FlowNode),
    Link(FlowNode),
    Storage(StorageNode),
    StorageInput(StorageSatellite),
    StorageOutput(StorageSatellite),
    Aggregated(AggregatedNode),
    AggregatedStorage(AggregatedStorageNode),
    VirtualStorage(VirtualStorageNode),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NodeType {
    Input,
    Output,
    Link,
    Storage,
    StorageInput,
    StorageOutput,
    Aggregated,
    AggregatedStorage,
    VirtualStorage,
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::Link => "Link",
            Self::Storage => "Storage",
            Self::StorageInput => "StorageInput",
            Self::StorageOutput => "StorageOutput",
            Self::Aggregated => "Aggregated",
            Self::AggregatedStorage => "AggregatedStorage",
            Self::VirtualStorage => "VirtualStorage",
        };
        write!(f, "{name}")
    }
}

/// A node in the network.
///
/// Every node carries its per-combination flow; storage-like kinds additionally carry a volume
/// in their [`StorageState`].
#[derive(Debug)]
pub struct Node {
    pub(crate) meta: NodeMeta,
    pub(crate) flow: FlowState,
    pub(crate) kind: NodeKind,
}

impl Node {
    fn new(meta: NodeMeta, kind: NodeKind) -> Self {
        Self {
            meta,
            flow: FlowState::default(),
            kind,
        }
    }

    pub fn index(&self) -> NodeIndex {
        self.meta.index
    }

    pub fn name(&self) -> &str {
        self.meta.name()
    }

    pub fn sub_name(&self) -> Option<&str> {
        self.meta.sub_name()
    }

    pub fn full_name(&self) -> (&str, Option<&str>) {
        self.meta.full_name()
    }

    pub(crate) fn set_full_name(&mut self, name: &str, sub_name: Option<&str>) {
        self.meta.name = name.to_string();
        self.meta.sub_name = sub_name.map(|s| s.to_string());
    }

    pub fn comment(&self) -> &str {
        &self.meta.comment
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.meta.comment = comment.to_string();
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.meta.parent
    }

    /// The node's own domain, ignoring any inherited from its parent.
    pub fn domain(&self) -> Option<&str> {
        self.meta.domain.as_deref()
    }

    pub fn set_domain(&mut self, domain: Option<&str>) {
        self.meta.domain = domain.map(|d| d.to_string());
    }

    pub fn recorders(&self) -> &[RecorderIndex] {
        &self.meta.recorders
    }

    pub(crate) fn add_recorder(&mut self, recorder: RecorderIndex) {
        self.meta.recorders.push(recorder);
    }

    pub fn allow_isolated(&self) -> bool {
        self.meta.allow_isolated
    }

    pub fn set_allow_isolated(&mut self, allow_isolated: bool) {
        self.meta.allow_isolated = allow_isolated;
    }

    pub fn is_virtual(&self) -> bool {
        self.meta.is_virtual
    }

    pub fn incoming_edges(&self) -> &[EdgeIndex] {
        &self.meta.incoming_edges
    }

    pub fn outgoing_edges(&self) -> &[EdgeIndex] {
        &self.meta.outgoing_edges
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            NodeKind::Input(_) => NodeType::Input,
            NodeKind::Output(_) => NodeType::Output,
            NodeKind::Link(_) => NodeType::Link,
            NodeKind::Storage(_) => NodeType::Storage,
            NodeKind::StorageInput(_) => NodeType::StorageInput,
            NodeKind::StorageOutput(_) => NodeType::StorageOutput,
            NodeKind::Aggregated(_) => NodeType::Aggregated,
            NodeKind::AggregatedStorage(_) => NodeType::AggregatedStorage,
            NodeKind::VirtualStorage(_) => NodeType::VirtualStorage,
        }
    }

    pub fn flow_state(&self) -> &FlowState {
        &self.flow
    }

    pub fn storage_state(&self) -> Option<&StorageState> {
        match &self.kind {
            NodeKind::Storage(n) => Some(n.state()),
            NodeKind::VirtualStorage(n) => Some(n.storage().state()),
            NodeKind::AggregatedStorage(n) => Some(n.state()),
            _ => None,
        }
    }

    /// Nodes whose state must be final before this node's state can be derived.
    pub fn dependencies(&self) -> &[NodeIndex] {
        match &self.kind {
            NodeKind::Aggregated(n) => n.nodes(),
            NodeKind::AggregatedStorage(n) => n.nodes(),
            NodeKind::VirtualStorage(n) => n.nodes(),
            _ => &[],
        }
    }

    pub(crate) fn add_incoming_edge(&mut self, edge: EdgeIndex) -> Result<(), NodeError> {
        match &self.kind {
            NodeKind::Input(_) | NodeKind::StorageInput(_) => Err(NodeError::InvalidConnectionToInput),
            NodeKind::Storage(_) => Err(NodeError::InvalidConnectionToStorage),
            NodeKind::Aggregated(_) | NodeKind::AggregatedStorage(_) | NodeKind::VirtualStorage(_) => {
                Err(NodeError::InvalidConnectionToVirtual)
            }
            NodeKind::Output(_) | NodeKind::Link(_) | NodeKind::StorageOutput(_) => {
                self.meta.incoming_edges.push(edge);
                Ok(())
            }
        }
    }

    pub(crate) fn add_outgoing_edge(&mut self, edge: EdgeIndex) -> Result<(), NodeError> {
        match &self.kind {
            NodeKind::Output(_) | NodeKind::StorageOutput(_) => Err(NodeError::InvalidConnectionFromOutput),
            NodeKind::Storage(_) => Err(NodeError::InvalidConnectionToStorage),
            NodeKind::Aggregated(_) | NodeKind::AggregatedStorage(_) | NodeKind::VirtualStorage(_) => {
                Err(NodeError::InvalidConnectionToVirtual)
            }
            NodeKind::Input(_) | NodeKind::Link(_) | NodeKind::StorageInput(_) => {
                self.meta.outgoing_edges.push(edge);
                Ok(())
            }
        }
    }

    /// Check whether an edge could be added in each direction without adding it.
    pub(crate) fn can_connect(&self, outgoing: bool) -> Result<(), NodeError> {
        match (&self.kind, outgoing) {
            (NodeKind::Input(_) | NodeKind::StorageInput(_), false) => Err(NodeError::InvalidConnectionToInput),
            (NodeKind::Output(_) | NodeKind::StorageOutput(_), true) => Err(NodeError::InvalidConnectionFromOutput),
            (NodeKind::Storage(_), _) => Err(NodeError::InvalidConnectionToStorage),
            (NodeKind::Aggregated(_) | NodeKind::AggregatedStorage(_) | NodeKind::VirtualStorage(_), _) => {
                Err(NodeError::InvalidConnectionToVirtual)
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn setup(&mut self, size: usize) {
        self.flow.setup(size);
        match &mut self.kind {
            NodeKind::Storage(n) => n.setup(size),
            NodeKind::VirtualStorage(n) => n.storage_mut().setup(size),
            NodeKind::AggregatedStorage(n) => n.setup(size),
            _ => {}
        }
    }

    pub fn flow_constraints(&self) -> Option<&FlowConstraints> {
        match &self.kind {
            NodeKind::Input(n) | NodeKind::Output(n) | NodeKind::Link(n) => Some(n.flow_constraints()),
            NodeKind::StorageInput(n) | NodeKind::StorageOutput(n) => Some(n.flow_constraints()),
            NodeKind::Aggregated(n) => Some(n.flow_constraints()),
            _ => None,
        }
    }

    fn flow_constraints_mut(&mut self) -> Result<&mut FlowConstraints, NodeError> {
        match &mut self.kind {
            NodeKind::Input(n) | NodeKind::Output(n) | NodeKind::Link(n) => Ok(&mut n.flow_constraints),
            NodeKind::StorageInput(n) | NodeKind::StorageOutput(n) => Ok(&mut n.flow_constraints),
            NodeKind::Aggregated(n) => Ok(&mut n.flow_constraints),
            _ => Err(NodeError::FlowConstraintsUndefined),
        }
    }

    /// The storage data of a storage or virtual storage node.
    pub fn storage_node(&self) -> Option<&StorageNode> {
        match &self.kind {
            NodeKind::Storage(n) => Some(n),
            NodeKind::VirtualStorage(n) => Some(n.storage()),
            _ => None,
        }
    }

    fn storage_node_mut(&mut self) -> Result<&mut StorageNode, NodeError> {
        match &mut self.kind {
            NodeKind::Storage(n) => Ok(n),
            NodeKind::VirtualStorage(n) => Ok(n.storage_mut()),
            _ => Err(NodeError::StorageConstraintsUndefined),
        }
    }

    pub fn set_min_flow(&mut self, value: ConstraintValue) -> Result<(), NodeError> {
        self.flow_constraints_mut()?.min_flow = value;
        Ok(())
    }

    pub fn set_max_flow(&mut self, value: ConstraintValue) -> Result<(), NodeError> {
        self.flow_constraints_mut()?.max_flow = value;
        Ok(())
    }

    pub fn set_cost(&mut self, value: ConstraintValue) -> Result<(), NodeError> {
        match &mut self.kind {
            NodeKind::Input(n) | NodeKind::Output(n) | NodeKind::Link(n) => n.cost = value,
            NodeKind::Storage(n) => n.cost = value,
            NodeKind::VirtualStorage(n) => n.storage_mut().cost = value,
            _ => return Err(NodeError::CostUndefined),
        }
        Ok(())
    }

    /// Only constant conversion factors are supported.
    pub fn set_conversion_factor(&mut self, value: ConstraintValue) -> Result<(), NodeError> {
        let value = value.as_constant().ok_or(NodeError::ConversionFactorNotConstant)?;
        match &mut self.kind {
            NodeKind::Input(n) | NodeKind::Output(n) | NodeKind::Link(n) => {
                n.conversion_factor = value;
                Ok(())
            }
            _ => Err(NodeError::ConversionFactorUndefined),
        }
    }

    pub fn set_min_volume(&mut self, value: ConstraintValue) -> Result<(), NodeError> {
        self.storage_node_mut()?.constraints.min_volume = value;
        Ok(())
    }

    pub fn set_max_volume(&mut self, value: ConstraintValue) -> Result<(), NodeError> {
        self.storage_node_mut()?.constraints.max_volume = value;
        Ok(())
    }

    pub fn set_initial_volume(&mut self, value: StorageInitialVolume) -> Result<(), NodeError> {
        self.storage_node_mut()?.initial_volume = value;
        Ok(())
    }

    pub fn set_level(&mut self, value: ConstraintValue) -> Result<(), NodeError> {
        self.storage_node_mut()
            .map_err(|_| NodeError::LevelUndefined)?
            .level = value;
        Ok(())
    }
}

#[derive(Default, Debug)]
pub struct NodeVec {
    nodes: Vec<Node>,
}

impl Deref for NodeVec {
    type Target = Vec<Node>;

    fn deref(&self) -> &Self::Target {
        &self.nodes
    }
}

impl NodeVec {
    pub fn get(&self, index: &NodeIndex) -> Option<&Node> {
        self.nodes.get(index.0)
    }

    pub fn get_mut(&mut self, index: &NodeIndex) -> Option<&mut Node> {
        self.nodes.get_mut(index.0)
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Node> {
        self.nodes.iter_mut()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    fn next_index(&self) -> NodeIndex {
        NodeIndex(self.nodes.len())
    }

    fn push(&mut self, meta: NodeMeta, kind: NodeKind) -> NodeIndex {
        let index = meta.index;
        self.nodes.push(Node::new(meta, kind));
        index
    }

    pub(crate) fn push_new_input(&mut self, name: &str, sub_name: Option<&str>) -> NodeIndex {
        let meta = NodeMeta::new(self.next_index(), name, sub_name);
        self.push(meta, NodeKind::Input(FlowNode::default()))
    }

    pub(crate) fn push_new_output(&mut self, name: &str, sub_name: Option<&str>) -> NodeIndex {
        let meta = NodeMeta::new(self.next_index(), name, sub_name);
        self.push(meta, NodeKind::Output(FlowNode::default()))
    }

    pub(crate) fn push_new_link(&mut self, name: &str, sub_name: Option<&str>) -> NodeIndex {
        let meta = NodeMeta::new(self.next_index(), name, sub_name);
        self.push(meta, NodeKind::Link(FlowNode::default()))
    }

    /// Push a storage node followed by its input and output satellites.
    pub(crate) fn push_new_storage(&mut self, name: &str, storage: StorageNode) -> NodeIndex {
        let storage_index = self.next_index();
        let input_index = NodeIndex(storage_index.0 + 1);
        let output_index = NodeIndex(storage_index.0 + 2);

        let mut storage = storage;
        storage.satellites = Some(crate::storage::StorageSatellites {
            input: input_index,
            output: output_index,
        });

        self.push(NodeMeta::new(storage_index, name, None), NodeKind::Storage(storage));
        self.push(
            NodeMeta::new(input_index, name, Some("input")).with_parent(storage_index),
            NodeKind::StorageInput(StorageSatellite::new(storage_index)),
        );
        self.push(
            NodeMeta::new(output_index, name, Some("output")).with_parent(storage_index),
            NodeKind::StorageOutput(StorageSatellite::new(storage_index)),
        );
        storage_index
    }

    pub(crate) fn push_new_aggregated(&mut self, name: &str, sub_name: Option<&str>, node: AggregatedNode) -> NodeIndex {
        let meta = NodeMeta::new(self.next_index(), name, sub_name).as_virtual();
        self.push(meta, NodeKind::Aggregated(node))
    }

    pub(crate) fn push_new_aggregated_storage(
        &mut self,
        name: &str,
        sub_name: Option<&str>,
        node: AggregatedStorageNode,
    ) -> NodeIndex {
        let meta = NodeMeta::new(self.next_index(), name, sub_name).as_virtual();
        self.push(meta, NodeKind::AggregatedStorage(node))
    }

    pub(crate) fn push_new_virtual_storage(
        &mut self,
        name: &str,
        sub_name: Option<&str>,
        node: VirtualStorageNode,
    ) -> NodeIndex {
        let meta = NodeMeta::new(self.next_index(), name, sub_name).as_virtual();
        self.push(meta, NodeKind::VirtualStorage(node))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConstraintValue, NodeError, NodeType, NodeVec};
    use crate::parameters::ParameterIndex;
    use crate::storage::{StorageInitialVolume, StorageNode};

    #[test]
    fn test_flow_node_defaults() {
        let mut nodes = NodeVec::default();
        let idx = nodes.push_new_link("link", None);
        let node = nodes.get(&idx).unwrap();

        let constraints = node.flow_constraints().unwrap();
        assert_eq!(constraints.min_flow, ConstraintValue::Constant(0.0));
        assert_eq!(constraints.max_flow, ConstraintValue::Constant(f64::INFINITY));
        assert!(!node.allow_isolated());
        assert!(!node.is_virtual());
    }

    #[test]
    fn test_conversion_factor_must_be_constant() {
        let mut nodes = NodeVec::default();
        let idx = nodes.push_new_input("input", None);
        let node = nodes.get_mut(&idx).unwrap();

        assert_eq!(
            node.set_conversion_factor(ConstraintValue::Parameter(ParameterIndex::new(0))),
            Err(NodeError::ConversionFactorNotConstant)
        );
        node.set_conversion_factor(0.5.into()).unwrap();
    }

    #[test]
    fn test_storage_satellites() {
        let mut nodes = NodeVec::default();
        let storage = StorageNode::new(
            StorageInitialVolume::Absolute(50.0.into()),
            0.0.into(),
            100.0.into(),
        );
        let idx = nodes.push_new_storage("reservoir", storage);
        assert_eq!(nodes.len(), 3);

        let satellites = *nodes.get(&idx).unwrap().storage_node().unwrap().satellites().unwrap();
        let input = nodes.get(&satellites.input).unwrap();
        assert_eq!(input.full_name(), ("reservoir", Some("input")));
        assert_eq!(input.node_type(), NodeType::StorageInput);
        assert_eq!(input.parent(), Some(idx));

        let output = nodes.get(&satellites.output).unwrap();
        assert_eq!(output.full_name(), ("reservoir", Some("output")));
        assert_eq!(output.node_type(), NodeType::StorageOutput);
    }

    #[test]
    fn test_setters_by_kind() {
        let mut nodes = NodeVec::default();
        let idx = nodes.push_new_output("output", None);
        let node = nodes.get_mut(&idx).unwrap();

        assert_eq!(
            node.set_max_volume(10.0.into()),
            Err(NodeError::StorageConstraintsUndefined)
        );
        assert_eq!(node.set_level(1.0.into()), Err(NodeError::LevelUndefined));
        node.set_max_flow(10.0.into()).unwrap();
        assert_eq!(
            node.flow_constraints().unwrap().max_flow,
            ConstraintValue::Constant(10.0)
        );
    }
}
