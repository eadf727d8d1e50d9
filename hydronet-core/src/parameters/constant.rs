use crate::parameters::{Parameter, ParameterCalculationError, ParameterMeta};
use crate::scenario::ScenarioIndex;
use crate::timestep::Timestep;

pub struct ConstantParameter {
    meta: ParameterMeta,
    value: f64,
    variable: bool,
}

impl ConstantParameter {
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            meta: ParameterMeta::new(name),
            value,
            variable: false,
        }
    }

    /// Mark the parameter as a decision variable.
    pub fn as_variable(mut self) -> Self {
        self.variable = true;
        self
    }
}

impl Parameter for ConstantParameter {
    fn meta(&self) -> &ParameterMeta {
        &self.meta
    }

    fn compute(&self, _timestep: &Timestep, _scenario_index: &ScenarioIndex) -> Result<f64, ParameterCalculationError> {
        Ok(self.value)
    }

    fn is_variable(&self) -> bool {
        self.variable
    }
}
