use crate::node::NodeIndex;
use std::ops::Deref;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct EdgeIndex(usize);

impl Deref for EdgeIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A directed connection between two nodes.
#[derive(Debug, PartialEq, Eq)]
pub struct Edge {
    index: EdgeIndex,
    from_node_index: NodeIndex,
    to_node_index: NodeIndex,
}

impl Edge {
    pub(crate) fn new(index: EdgeIndex, from_node_index: NodeIndex, to_node_index: NodeIndex) -> Self {
        Self {
            index,
            from_node_index,
            to_node_index,
        }
    }

    pub fn index(&self) -> EdgeIndex {
        self.index
    }

    pub fn from_node_index(&self) -> NodeIndex {
        self.from_node_index
    }

    pub fn to_node_index(&self) -> NodeIndex {
        self.to_node_index
    }
}

#[derive(Default)]
pub struct EdgeVec {
    edges: Vec<Edge>,
}

impl Deref for EdgeVec {
    type Target = Vec<Edge>;

    fn deref(&self) -> &Self::Target {
        &self.edges
    }
}

impl EdgeVec {
    pub fn get(&self, index: &EdgeIndex) -> Option<&Edge> {
        self.edges.get(index.0)
    }

    pub(crate) fn push(&mut self, from_node_index: NodeIndex, to_node_index: NodeIndex) -> EdgeIndex {
        let index = EdgeIndex(self.edges.len());
        self.edges.push(Edge::new(index, from_node_index, to_node_index));
        index
    }
}
