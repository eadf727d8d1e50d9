mod memory;

use crate::network::Network;
use crate::node::NodeIndex;
use crate::timestep::Timestep;
pub use memory::{MemoryRecorder, NodeMetric};
use std::any::Any;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecorderIndex(usize);

impl RecorderIndex {
    pub fn new(idx: usize) -> Self {
        Self(idx)
    }
}

impl Deref for RecorderIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for RecorderIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Node index `{0}` not found")]
    NodeIndexNotFound(NodeIndex),
    #[error("Node `{name}` has no volume")]
    NodeHasNoVolume { name: String },
}

#[derive(Clone, Debug)]
pub struct RecorderMeta {
    pub name: String,
}

impl RecorderMeta {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

/// A passive observer of network state.
///
/// Recorders never modify the network. They are polled once per time-step through
/// [`Network::save_recorders`], after [`Network::after`] has completed.
pub trait Recorder: Send + Sync + Any {
    fn meta(&self) -> &RecorderMeta;

    fn name(&self) -> &str {
        self.meta().name.as_str()
    }

    /// The node this recorder observes, if any.
    fn node(&self) -> Option<NodeIndex> {
        None
    }

    /// Prepare the recorder for a new simulation.
    fn setup(&mut self, _network: &Network) -> Result<(), RecorderError> {
        Ok(())
    }

    fn save(&mut self, timestep: &Timestep, network: &Network) -> Result<(), RecorderError>;

    fn finish(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}
