use crate::network::Network;
use crate::node::NodeIndex;
use crate::recorders::{Recorder, RecorderError, RecorderMeta};
use crate::timestep::{Timestep, TimestepIndex};
use ndarray::{Array1, Array2};
use std::any::Any;

/// The node value captured by a [`MemoryRecorder`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeMetric {
    Flow,
    PrevFlow,
    Volume,
    ProportionalVolume,
}

/// Records a node metric for every combination at every time-step.
pub struct MemoryRecorder {
    meta: RecorderMeta,
    node: NodeIndex,
    metric: NodeMetric,
    timesteps: Vec<TimestepIndex>,
    rows: Vec<Array1<f64>>,
}

impl MemoryRecorder {
    pub fn new(name: &str, node: NodeIndex, metric: NodeMetric) -> Self {
        Self {
            meta: RecorderMeta::new(name),
            node,
            metric,
            timesteps: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn metric(&self) -> NodeMetric {
        self.metric
    }

    /// The indices of the recorded time-steps, in the order they were saved.
    pub fn timesteps(&self) -> &[TimestepIndex] {
        &self.timesteps
    }

    /// The recorded values with shape (time-steps, combinations).
    pub fn values(&self) -> Array2<f64> {
        let n_combinations = self.rows.first().map(|r| r.len()).unwrap_or_default();
        let mut values = Array2::zeros((self.rows.len(), n_combinations));
        for (mut row, saved) in values.rows_mut().into_iter().zip(&self.rows) {
            row.assign(saved);
        }
        values
    }
}

impl Recorder for MemoryRecorder {
    fn meta(&self) -> &RecorderMeta {
        &self.meta
    }

    fn node(&self) -> Option<NodeIndex> {
        Some(self.node)
    }

    fn setup(&mut self, network: &Network) -> Result<(), RecorderError> {
        network
            .get_node(&self.node)
            .ok_or(RecorderError::NodeIndexNotFound(self.node))?;
        self.timesteps.clear();
        self.rows.clear();
        Ok(())
    }

    fn save(&mut self, timestep: &Timestep, network: &Network) -> Result<(), RecorderError> {
        let node = network
            .get_node(&self.node)
            .ok_or(RecorderError::NodeIndexNotFound(self.node))?;

        let row = match self.metric {
            NodeMetric::Flow => node.flow_state().flow().clone(),
            NodeMetric::PrevFlow => node.flow_state().prev_flow().clone(),
            NodeMetric::Volume | NodeMetric::ProportionalVolume => {
                let state = node.storage_state().ok_or_else(|| RecorderError::NodeHasNoVolume {
                    name: node.name().to_string(),
                })?;
                if self.metric == NodeMetric::Volume {
                    state.volume().clone()
                } else {
                    state.current_pc().clone()
                }
            }
        };

        self.timesteps.push(timestep.index);
        self.rows.push(row);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
