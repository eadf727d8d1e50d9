use crate::node::{FlowConstraints, NodeError, NodeIndex, NodeVec};
use crate::state::StateError;
use ndarray::Array1;
use tracing::warn;

/// Factors smaller than this are likely to cause numerical problems in a solver.
const MIN_FACTOR: f64 = 1e-6;

/// A virtual node whose flow is the total flow of its constituent nodes.
///
/// The optional `factors` describe the proportion of flow each constituent should carry. They are
/// passed on to a solver and do not alter the aggregated flow.
#[derive(Debug, PartialEq)]
pub struct AggregatedNode {
    pub(crate) flow_constraints: FlowConstraints,
    nodes: Vec<NodeIndex>,
    factors: Option<Vec<f64>>,
}

impl AggregatedNode {
    pub fn new(nodes: &[NodeIndex], factors: Option<Vec<f64>>) -> Result<Self, NodeError> {
        let mut node = Self {
            flow_constraints: FlowConstraints::unbounded(),
            nodes: nodes.to_vec(),
            factors: None,
        };
        node.set_factors(factors)?;
        Ok(node)
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn factors(&self) -> Option<&[f64]> {
        self.factors.as_deref()
    }

    pub fn flow_constraints(&self) -> &FlowConstraints {
        &self.flow_constraints
    }

    /// Replace the constituent nodes. Any factors are cleared.
    pub(crate) fn set_nodes(&mut self, nodes: &[NodeIndex]) {
        self.nodes = nodes.to_vec();
        self.factors = None;
    }

    pub fn set_factors(&mut self, factors: Option<Vec<f64>>) -> Result<(), NodeError> {
        if let Some(factors) = &factors {
            if factors.len() != self.nodes.len() {
                return Err(NodeError::FactorCountMismatch {
                    found: factors.len(),
                    expected: self.nodes.len(),
                });
            }

            if factors.iter().any(|f| *f < MIN_FACTOR) {
                warn!("Aggregated node factors contain values below {MIN_FACTOR}; this may cause numerical issues.");
            }
        }
        self.factors = factors;
        Ok(())
    }

    /// The total current flow of the constituent nodes.
    pub(crate) fn aggregate_flow(&self, nodes: &NodeVec, size: usize) -> Result<Array1<f64>, NodeError> {
        weighted_flow_sum(&self.nodes, None, nodes, size)
    }
}

/// Sum the current flow of `constituents`, each multiplied by its factor when given.
pub(crate) fn weighted_flow_sum(
    constituents: &[NodeIndex],
    factors: Option<&[f64]>,
    nodes: &NodeVec,
    size: usize,
) -> Result<Array1<f64>, NodeError> {
    let mut total = Array1::<f64>::zeros(size);
    for (i, idx) in constituents.iter().enumerate() {
        let flow = nodes
            .get(idx)
            .ok_or(NodeError::ConstituentNotFound(*idx))?
            .flow_state()
            .flow();
        if flow.len() != size {
            return Err(StateError::LengthMismatch {
                found: flow.len(),
                expected: size,
            }
            .into());
        }
        match factors.and_then(|f| f.get(i)) {
            Some(factor) => total.scaled_add(*factor, flow),
            None => total += flow,
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::AggregatedNode;
    use crate::node::{ConstraintValue, NodeError, NodeVec};

    #[test]
    fn test_factor_count() {
        let mut nodes = NodeVec::default();
        let a = nodes.push_new_link("a", None);
        let b = nodes.push_new_link("b", None);

        assert_eq!(
            AggregatedNode::new(&[a, b], Some(vec![1.0])),
            Err(NodeError::FactorCountMismatch { found: 1, expected: 2 })
        );

        // Small factors only warn.
        let node = AggregatedNode::new(&[a, b], Some(vec![1.0, 1e-9])).unwrap();
        assert_eq!(node.factors(), Some([1.0, 1e-9].as_slice()));
    }

    #[test]
    fn test_unbounded_by_default() {
        let node = AggregatedNode::new(&[], None).unwrap();
        assert_eq!(
            node.flow_constraints().min_flow,
            ConstraintValue::Constant(f64::NEG_INFINITY)
        );
        assert_eq!(node.flow_constraints().max_flow, ConstraintValue::Constant(f64::INFINITY));
    }
}
