use crate::state::StateError;
use ndarray::Array1;

/// The flow through a node for every scenario combination.
///
/// `flow` accumulates the commits of the current time-step; `prev_flow` holds the committed flow
/// of the last completed time-step.
#[derive(Clone, Debug, Default)]
pub struct FlowState {
    flow: Array1<f64>,
    prev_flow: Array1<f64>,
}

impl FlowState {
    pub fn new(size: usize) -> Self {
        Self {
            flow: Array1::zeros(size),
            prev_flow: Array1::zeros(size),
        }
    }

    /// Resize the arrays to `size`, reusing the existing allocation when the size is unchanged.
    pub fn setup(&mut self, size: usize) {
        if self.flow.len() != size {
            *self = Self::new(size);
        } else {
            self.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.flow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flow.is_empty()
    }

    pub fn flow(&self) -> &Array1<f64> {
        &self.flow
    }

    pub fn prev_flow(&self) -> &Array1<f64> {
        &self.prev_flow
    }

    /// Zero both the current and previous flow.
    pub fn reset(&mut self) {
        self.flow.fill(0.0);
        self.prev_flow.fill(0.0);
    }

    /// Zero the current flow only.
    pub fn zero(&mut self) {
        self.flow.fill(0.0);
    }

    pub fn add(&mut self, global_id: usize, value: f64) -> Result<(), StateError> {
        let len = self.flow.len();
        let flow = self
            .flow
            .get_mut(global_id)
            .ok_or(StateError::IndexOutOfRange { index: global_id, len })?;
        *flow += value;
        Ok(())
    }

    pub fn add_all(&mut self, values: &[f64]) -> Result<(), StateError> {
        if values.len() != self.flow.len() {
            return Err(StateError::LengthMismatch {
                found: values.len(),
                expected: self.flow.len(),
            });
        }
        self.flow
            .iter_mut()
            .zip(values)
            .for_each(|(flow, value)| *flow += *value);
        Ok(())
    }

    /// Replace the current flow of every combination.
    pub fn set(&mut self, flow: &Array1<f64>) -> Result<(), StateError> {
        if flow.len() != self.flow.len() {
            return Err(StateError::LengthMismatch {
                found: flow.len(),
                expected: self.flow.len(),
            });
        }
        self.flow.assign(flow);
        Ok(())
    }

    /// Copy the current flow into `prev_flow`.
    pub fn snapshot(&mut self) {
        self.prev_flow.assign(&self.flow);
    }
}
