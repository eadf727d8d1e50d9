use crate::aggregated_node::weighted_flow_sum;
use crate::node::{NodeError, NodeIndex, NodeKind, NodeVec};
use crate::parameters::ParameterCollection;
use crate::scenario::ScenarioIndex;
use crate::state::{StateError, StorageState};
use crate::storage::StorageNode;
use crate::timestep::Timestep;
use ndarray::Array1;

/// A virtual storage representing the combined volume of several storage nodes.
#[derive(Debug)]
pub struct AggregatedStorageNode {
    nodes: Vec<NodeIndex>,
    state: StorageState,
}

impl AggregatedStorageNode {
    /// Create a new node; every constituent must be a storage or virtual storage in `all_nodes`.
    pub fn new(nodes: &[NodeIndex], all_nodes: &NodeVec) -> Result<Self, NodeError> {
        validate_constituents(nodes, all_nodes)?;
        Ok(Self {
            nodes: nodes.to_vec(),
            state: StorageState::default(),
        })
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn state(&self) -> &StorageState {
        &self.state
    }

    pub(crate) fn setup(&mut self, size: usize) {
        self.state.setup(size);
    }

    pub(crate) fn aggregate_flow(&self, nodes: &NodeVec, size: usize) -> Result<Array1<f64>, NodeError> {
        weighted_flow_sum(&self.nodes, None, nodes, size)
    }

    /// The per-combination total of the constituents' current volume.
    pub(crate) fn aggregate_volume(&self, nodes: &NodeVec, size: usize) -> Result<Array1<f64>, NodeError> {
        let mut total = Array1::<f64>::zeros(size);
        for idx in &self.nodes {
            let state = constituent(nodes, idx)?.state();
            if state.len() != size {
                return Err(StateError::LengthMismatch {
                    found: state.len(),
                    expected: size,
                }
                .into());
            }
            total += state.volume();
        }
        Ok(total)
    }

    /// The per-combination total of the constituents' max volume at `timestep`.
    pub(crate) fn aggregate_max_volume(
        &self,
        nodes: &NodeVec,
        timestep: &Timestep,
        combinations: &[ScenarioIndex],
        parameters: &ParameterCollection,
    ) -> Result<Array1<f64>, NodeError> {
        let mut total = Array1::<f64>::zeros(combinations.len());
        for idx in &self.nodes {
            let storage = constituent(nodes, idx)?;
            for (scenario_index, total) in combinations.iter().zip(total.iter_mut()) {
                *total += storage.get_max_volume(timestep, scenario_index, parameters)?;
            }
        }
        Ok(total)
    }

    pub(crate) fn reset(&mut self, volume: &Array1<f64>, max_volume: &Array1<f64>) -> Result<(), NodeError> {
        for (i, (volume, max_volume)) in volume.iter().zip(max_volume).enumerate() {
            self.state.set_volume(i, *volume, *max_volume)?;
        }
        Ok(())
    }

    pub(crate) fn integrate(
        &mut self,
        flow: &Array1<f64>,
        timestep: &Timestep,
        max_volume: &Array1<f64>,
    ) -> Result<(), NodeError> {
        for (i, (flow, max_volume)) in flow.iter().zip(max_volume).enumerate() {
            self.state.integrate(i, *flow, timestep, *max_volume)?;
        }
        Ok(())
    }
}

fn constituent<'a>(nodes: &'a NodeVec, idx: &NodeIndex) -> Result<&'a StorageNode, NodeError> {
    nodes
        .get(idx)
        .ok_or(NodeError::ConstituentNotFound(*idx))?
        .storage_node()
        .ok_or(NodeError::ConstituentNotStorage(*idx))
}

fn validate_constituents(nodes: &[NodeIndex], all_nodes: &NodeVec) -> Result<(), NodeError> {
    for idx in nodes {
        let node = all_nodes.get(idx).ok_or(NodeError::ConstituentNotFound(*idx))?;
        match node.kind() {
            NodeKind::Storage(_) | NodeKind::VirtualStorage(_) => {}
            _ => return Err(NodeError::ConstituentNotStorage(*idx)),
        }
    }
    Ok(())
}
