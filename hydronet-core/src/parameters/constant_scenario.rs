use crate::parameters::{Parameter, ParameterCalculationError, ParameterMeta};
use crate::scenario::ScenarioIndex;
use crate::timestep::Timestep;

/// A constant value for each ensemble member of one scenario.
pub struct ConstantScenarioParameter {
    meta: ParameterMeta,
    values: Vec<f64>,
    scenario_position: usize,
}

impl ConstantScenarioParameter {
    /// `scenario_position` is the registration position of the scenario the values vary over.
    pub fn new(name: &str, values: Vec<f64>, scenario_position: usize) -> Self {
        Self {
            meta: ParameterMeta::new(name),
            values,
            scenario_position,
        }
    }
}

impl Parameter for ConstantScenarioParameter {
    fn meta(&self) -> &ParameterMeta {
        &self.meta
    }

    fn compute(&self, _timestep: &Timestep, scenario_index: &ScenarioIndex) -> Result<f64, ParameterCalculationError> {
        let idx = scenario_index.index_for_scenario(self.scenario_position).ok_or_else(|| {
            ParameterCalculationError::ScenarioPositionNotFound {
                position: self.scenario_position,
                indices: scenario_index.indices().to_vec(),
            }
        })?;

        self.values
            .get(idx)
            .copied()
            .ok_or(ParameterCalculationError::OutOfBoundsError {
                index: idx,
                length: self.values.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::parameters::constant_scenario::ConstantScenarioParameter;
    use crate::parameters::{Parameter, ParameterCalculationError};
    use crate::scenario::{ScenarioBuilder, ScenarioCollection, ScenarioIndex};
    use crate::test_utils::default_time_domain;
    use float_cmp::assert_approx_eq;

    #[test]
    /// Test `ConstantScenarioParameter` returns the correct values.
    fn test_constant_scenario_parameter() {
        let mut scenarios = ScenarioCollection::default();
        scenarios
            .add_scenario(ScenarioBuilder::new("group1", 3).build().unwrap())
            .unwrap();
        scenarios
            .add_scenario(ScenarioBuilder::new("group2", 2).build().unwrap())
            .unwrap();
        let domain = default_time_domain();
        let ts = &domain.timesteps()[0];

        let p = ConstantScenarioParameter::new("my-parameter", vec![3.0, 2.0, 1.0], 0);

        let expected = [3.0, 3.0, 2.0, 2.0, 1.0, 1.0];
        for (si, expected) in scenarios.get_combinations().unwrap().iter().zip(expected) {
            assert_approx_eq!(f64, p.compute(ts, si).unwrap(), expected);
        }
    }

    #[test]
    fn test_constant_scenario_parameter_with_slice() {
        let mut scenarios = ScenarioCollection::default();
        scenarios
            .add_scenario(ScenarioBuilder::new("group1", 5).with_slice(3, 5).build().unwrap())
            .unwrap();
        let domain = default_time_domain();
        let ts = &domain.timesteps()[0];

        let p = ConstantScenarioParameter::new("my-parameter", vec![1.0, 2.0, 3.0, 4.0, 5.0], 0);

        let values: Vec<f64> = scenarios
            .get_combinations()
            .unwrap()
            .iter()
            .map(|si| p.compute(ts, si).unwrap())
            .collect();
        assert_eq!(values, vec![4.0, 5.0]);
    }

    #[test]
    fn test_constant_scenario_parameter_errors() {
        let domain = default_time_domain();
        let ts = &domain.timesteps()[0];
        let p = ConstantScenarioParameter::new("my-parameter", vec![1.0, 2.0], 1);

        assert!(matches!(
            p.compute(ts, &ScenarioIndex::new(0, vec![0])),
            Err(ParameterCalculationError::ScenarioPositionNotFound { position: 1, .. })
        ));
        assert!(matches!(
            p.compute(ts, &ScenarioIndex::new(0, vec![0, 2])),
            Err(ParameterCalculationError::OutOfBoundsError { index: 2, length: 2 })
        ));
    }
}
