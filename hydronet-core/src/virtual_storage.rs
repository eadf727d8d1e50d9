use crate::aggregated_node::weighted_flow_sum;
use crate::node::{NodeError, NodeIndex, NodeVec};
use crate::storage::StorageNode;
use ndarray::Array1;

/// A storage with no physical connections whose volume is drawn down by the flow of other nodes.
///
/// Each time-step its flow is `-Σ factor[j] * flow[j]` over the constituent nodes, after which the
/// volume is integrated the same way as a [`crate::node::NodeKind::Storage`].
#[derive(Debug)]
pub struct VirtualStorageNode {
    storage: StorageNode,
    nodes: Vec<NodeIndex>,
    factors: Vec<f64>,
}

impl VirtualStorageNode {
    /// Factors default to one for every constituent.
    pub fn new(storage: StorageNode, nodes: &[NodeIndex], factors: Option<Vec<f64>>) -> Result<Self, NodeError> {
        let factors = match factors {
            Some(factors) if factors.len() != nodes.len() => {
                return Err(NodeError::FactorCountMismatch {
                    found: factors.len(),
                    expected: nodes.len(),
                })
            }
            Some(factors) => factors,
            None => vec![1.0; nodes.len()],
        };

        Ok(Self {
            storage,
            nodes: nodes.to_vec(),
            factors,
        })
    }

    pub fn storage(&self) -> &StorageNode {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut StorageNode {
        &mut self.storage
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    pub(crate) fn virtual_flow(&self, nodes: &NodeVec, size: usize) -> Result<Array1<f64>, NodeError> {
        let total = weighted_flow_sum(&self.nodes, Some(&self.factors), nodes, size)?;
        Ok(-total)
    }
}

#[cfg(test)]
mod tests {
    use super::VirtualStorageNode;
    use crate::node::{NodeError, NodeVec};
    use crate::storage::{StorageInitialVolume, StorageNode};

    fn storage() -> StorageNode {
        StorageNode::new(StorageInitialVolume::Proportional(1.0), 0.0.into(), 100.0.into())
    }

    #[test]
    fn test_default_factors() {
        let mut nodes = NodeVec::default();
        let a = nodes.push_new_link("a", None);
        let b = nodes.push_new_link("b", None);

        let vs = VirtualStorageNode::new(storage(), &[a, b], None).unwrap();
        assert_eq!(vs.factors(), &[1.0, 1.0]);

        assert!(matches!(
            VirtualStorageNode::new(storage(), &[a, b], Some(vec![0.5])),
            Err(NodeError::FactorCountMismatch { found: 1, expected: 2 })
        ));
    }
}
