mod constant;
mod constant_scenario;
mod errors;
mod profiles;

use crate::scenario::ScenarioIndex;
use crate::timestep::{Timestep, TimestepIndex};
pub use constant::ConstantParameter;
pub use constant_scenario::ConstantScenarioParameter;
pub use errors::{ParameterCalculationError, ParameterError};
use ndarray::Array2;
pub use profiles::{MonthlyInterpDay, MonthlyProfileParameter};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::Deref;

/// Index of a parameter in a [`ParameterCollection`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterIndex(usize);

impl ParameterIndex {
    pub fn new(idx: usize) -> Self {
        Self(idx)
    }
}

impl Deref for ParameterIndex {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ParameterIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Meta data common to all parameters.
#[derive(Debug)]
pub struct ParameterMeta {
    pub name: String,
    pub comment: String,
}

impl ParameterMeta {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            comment: "".to_string(),
        }
    }
}

/// A component that produces a value for each time-step and scenario combination.
///
/// Parameters are evaluated by the network whenever a node attribute refers to one. They are
/// expected to be pure functions of their inputs; the network may cache their values for the
/// duration of a time-step.
pub trait Parameter: Send + Sync {
    fn meta(&self) -> &ParameterMeta;

    fn name(&self) -> &str {
        self.meta().name.as_str()
    }

    fn compute(&self, timestep: &Timestep, scenario_index: &ScenarioIndex) -> Result<f64, ParameterCalculationError>;

    /// Whether this parameter is a decision variable for an external optimiser.
    fn is_variable(&self) -> bool {
        false
    }
}

/// Values of every parameter for every combination at a single time-step.
struct ParameterValueCache {
    timestep: Option<TimestepIndex>,
    values: Array2<f64>,
}

impl ParameterValueCache {
    fn get(&self, index: ParameterIndex, timestep: &Timestep, scenario_index: &ScenarioIndex) -> Option<f64> {
        if self.timestep != Some(timestep.index) {
            return None;
        }
        self.values.get((*index, scenario_index.global_id())).copied()
    }
}

/// The parameters of a network.
#[derive(Default)]
pub struct ParameterCollection {
    parameters: Vec<Box<dyn Parameter>>,
    cache: Option<ParameterValueCache>,
}

impl ParameterCollection {
    pub fn add(&mut self, parameter: Box<dyn Parameter>) -> Result<ParameterIndex, ParameterError> {
        if self.get_index_by_name(parameter.name()).is_some() {
            return Err(ParameterError::NameAlreadyExists(parameter.name().to_string()));
        }

        let index = ParameterIndex::new(self.parameters.len());
        self.parameters.push(parameter);
        // Any cached values no longer cover every parameter.
        self.cache = None;
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get(&self, index: ParameterIndex) -> Option<&dyn Parameter> {
        self.parameters.get(*index).map(|p| p.as_ref())
    }

    pub fn get_index_by_name(&self, name: &str) -> Option<ParameterIndex> {
        self.parameters
            .iter()
            .position(|p| p.name() == name)
            .map(ParameterIndex::new)
    }

    /// Indices of the parameters that are decision variables.
    pub fn variables(&self) -> Vec<ParameterIndex> {
        self.parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_variable())
            .map(|(idx, _)| ParameterIndex::new(idx))
            .collect()
    }

    /// Return a parameter's value, reading the per-time-step cache when it is populated.
    pub fn get_value(
        &self,
        index: ParameterIndex,
        timestep: &Timestep,
        scenario_index: &ScenarioIndex,
    ) -> Result<f64, ParameterError> {
        if let Some(value) = self
            .cache
            .as_ref()
            .and_then(|c| c.get(index, timestep, scenario_index))
        {
            return Ok(value);
        }

        let parameter = self.get(index).ok_or(ParameterError::IndexNotFound(index))?;
        parameter
            .compute(timestep, scenario_index)
            .map_err(|source| ParameterError::Calculation {
                name: parameter.name().to_string(),
                source,
            })
    }

    /// Evaluate every parameter for every combination and cache the results for `timestep`.
    pub fn set_values(&mut self, timestep: &Timestep, combinations: &[ScenarioIndex]) -> Result<(), ParameterError> {
        let shape = (self.parameters.len(), combinations.len());
        let mut cache = match self.cache.take() {
            Some(cache) if cache.values.dim() == shape => cache,
            _ => ParameterValueCache {
                timestep: None,
                values: Array2::zeros(shape),
            },
        };

        for (parameter, mut row) in self.parameters.iter().zip(cache.values.rows_mut()) {
            for (scenario_index, value) in combinations.iter().zip(row.iter_mut()) {
                *value = parameter
                    .compute(timestep, scenario_index)
                    .map_err(|source| ParameterError::Calculation {
                        name: parameter.name().to_string(),
                        source,
                    })?;
            }
        }

        cache.timestep = Some(timestep.index);
        self.cache = Some(cache);
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.timestep = None;
        }
    }
}
