use crate::node::{ConstraintValue, FlowConstraints, NodeError, NodeIndex};
use crate::parameters::ParameterCollection;
use crate::scenario::ScenarioIndex;
use crate::state::StorageState;
use crate::timestep::Timestep;
use ndarray::Array1;

/// The volume a storage starts each simulation with.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum StorageInitialVolume {
    Absolute(ConstraintValue),
    /// A proportion of the max volume.
    Proportional(f64),
}

impl Default for StorageInitialVolume {
    fn default() -> Self {
        Self::Absolute(ConstraintValue::Constant(0.0))
    }
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct StorageConstraints {
    pub min_volume: ConstraintValue,
    pub max_volume: ConstraintValue,
}

impl StorageConstraints {
    pub fn new(min_volume: ConstraintValue, max_volume: ConstraintValue) -> Self {
        Self { min_volume, max_volume }
    }
}

/// The pair of pseudo-nodes that connect a storage to the rest of the network.
///
/// Flow leaves the storage through `input` (which supplies the network) and arrives through
/// `output` (which drains the network into the storage).
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct StorageSatellites {
    pub input: NodeIndex,
    pub output: NodeIndex,
}

/// The storage specific data shared by [`crate::node::NodeKind::Storage`] and virtual storage.
#[derive(Debug)]
pub struct StorageNode {
    pub(crate) initial_volume: StorageInitialVolume,
    pub(crate) constraints: StorageConstraints,
    pub(crate) cost: ConstraintValue,
    pub(crate) level: ConstraintValue,
    pub(crate) satellites: Option<StorageSatellites>,
    pub(crate) state: StorageState,
}

impl StorageNode {
    pub fn new(initial_volume: StorageInitialVolume, min_volume: ConstraintValue, max_volume: ConstraintValue) -> Self {
        Self {
            initial_volume,
            constraints: StorageConstraints::new(min_volume, max_volume),
            cost: ConstraintValue::Constant(0.0),
            level: ConstraintValue::Constant(0.0),
            satellites: None,
            state: StorageState::default(),
        }
    }

    pub fn initial_volume(&self) -> StorageInitialVolume {
        self.initial_volume
    }

    pub fn constraints(&self) -> &StorageConstraints {
        &self.constraints
    }

    pub fn satellites(&self) -> Option<&StorageSatellites> {
        self.satellites.as_ref()
    }

    pub fn state(&self) -> &StorageState {
        &self.state
    }

    pub fn get_min_volume(
        &self,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
        parameters: &ParameterCollection,
    ) -> Result<f64, NodeError> {
        Ok(self.constraints.min_volume.get(timestep, scenario_index, parameters)?)
    }

    pub fn get_max_volume(
        &self,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
        parameters: &ParameterCollection,
    ) -> Result<f64, NodeError> {
        Ok(self.constraints.max_volume.get(timestep, scenario_index, parameters)?)
    }

    pub fn get_initial_volume(
        &self,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
        parameters: &ParameterCollection,
    ) -> Result<f64, NodeError> {
        match &self.initial_volume {
            StorageInitialVolume::Absolute(v) => Ok(v.get(timestep, scenario_index, parameters)?),
            StorageInitialVolume::Proportional(pc) => {
                Ok(pc * self.get_max_volume(timestep, scenario_index, parameters)?)
            }
        }
    }

    /// The initial volume and bounds when all of them are constant.
    pub(crate) fn constant_bounds(&self) -> Option<(f64, f64, f64)> {
        let min_volume = self.constraints.min_volume.as_constant()?;
        let max_volume = self.constraints.max_volume.as_constant()?;
        let initial_volume = match &self.initial_volume {
            StorageInitialVolume::Absolute(v) => v.as_constant()?,
            StorageInitialVolume::Proportional(pc) => pc * max_volume,
        };
        Some((initial_volume, min_volume, max_volume))
    }

    pub(crate) fn setup(&mut self, size: usize) {
        self.state.setup(size);
    }

    pub(crate) fn reset(
        &mut self,
        timestep: &Timestep,
        combinations: &[ScenarioIndex],
        parameters: &ParameterCollection,
    ) -> Result<(), NodeError> {
        for scenario_index in combinations {
            let max_volume = self.get_max_volume(timestep, scenario_index, parameters)?;
            let volume = self.get_initial_volume(timestep, scenario_index, parameters)?;
            self.state.set_volume(scenario_index.global_id(), volume, max_volume)?;
        }
        Ok(())
    }

    /// Integrate `flow` over the time-step for every combination.
    pub(crate) fn integrate(
        &mut self,
        flow: &Array1<f64>,
        timestep: &Timestep,
        combinations: &[ScenarioIndex],
        parameters: &ParameterCollection,
    ) -> Result<(), NodeError> {
        for (scenario_index, flow) in combinations.iter().zip(flow) {
            let max_volume = self.get_max_volume(timestep, scenario_index, parameters)?;
            self.state
                .integrate(scenario_index.global_id(), *flow, timestep, max_volume)?;
        }
        Ok(())
    }
}

/// A pseudo-node bound to a parent storage.
#[derive(Debug)]
pub struct StorageSatellite {
    pub(crate) parent: NodeIndex,
    pub(crate) flow_constraints: FlowConstraints,
}

impl StorageSatellite {
    pub(crate) fn new(parent: NodeIndex) -> Self {
        Self {
            parent,
            flow_constraints: FlowConstraints::default(),
        }
    }

    pub fn parent(&self) -> NodeIndex {
        self.parent
    }

    pub fn flow_constraints(&self) -> &FlowConstraints {
        &self.flow_constraints
    }
}

#[cfg(test)]
mod tests {
    use super::{StorageInitialVolume, StorageNode};
    use crate::node::ConstraintValue;
    use crate::parameters::{ConstantScenarioParameter, ParameterCollection};
    use crate::scenario::ScenarioIndex;
    use crate::test_utils::default_time_domain;
    use float_cmp::assert_approx_eq;
    use ndarray::Array1;

    #[test]
    fn test_proportional_initial_volume() {
        let mut parameters = ParameterCollection::default();
        let max_volume = parameters
            .add(Box::new(ConstantScenarioParameter::new("max-volume", vec![100.0, 0.0], 0)))
            .unwrap();
        let combinations = vec![ScenarioIndex::new(0, vec![0]), ScenarioIndex::new(1, vec![1])];
        let domain = default_time_domain();
        let ts = &domain.timesteps()[0];

        let mut storage = StorageNode::new(
            StorageInitialVolume::Proportional(0.5),
            ConstraintValue::Constant(0.0),
            ConstraintValue::Parameter(max_volume),
        );
        storage.setup(combinations.len());
        storage.reset(ts, &combinations, &parameters).unwrap();

        assert_approx_eq!(f64, storage.state().volume()[0], 50.0);
        assert_approx_eq!(f64, storage.state().current_pc()[0], 0.5);
        assert_approx_eq!(f64, storage.state().volume()[1], 0.0);
        assert!(storage.state().current_pc()[1].is_nan());

        storage
            .integrate(&Array1::from_vec(vec![10.0, 5.0]), ts, &combinations, &parameters)
            .unwrap();
        assert_approx_eq!(f64, storage.state().volume()[0], 60.0);
        assert_approx_eq!(f64, storage.state().current_pc()[0], 0.6);
        assert_approx_eq!(f64, storage.state().volume()[1], 5.0);
        assert!(storage.state().current_pc()[1].is_nan());
    }

    #[test]
    fn test_constant_bounds() {
        let storage = StorageNode::new(
            StorageInitialVolume::Proportional(0.25),
            ConstraintValue::Constant(10.0),
            ConstraintValue::Constant(200.0),
        );
        assert_eq!(storage.constant_bounds(), Some((50.0, 10.0, 200.0)));
    }
}
