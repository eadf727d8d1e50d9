use ndarray::Array2;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Scenario name `{0}` already exists")]
    DuplicateName(String),
    #[error("Scenario name `{0}` not found")]
    NameNotFound(String),
    #[error("Scenario `{name}` must have a size of at least 1; found {size}")]
    InvalidSize { name: String, size: usize },
    #[error("Incorrect number of ensemble names for scenario `{name}`; found {found}, expected {expected}")]
    IncorrectNumberOfEnsembleNames {
        name: String,
        found: usize,
        expected: usize,
    },
    #[error("Invalid slice ({start}, {end}, step {step}) for scenario `{name}` with size {size}")]
    InvalidSlice {
        name: String,
        size: usize,
        start: usize,
        end: usize,
        step: usize,
    },
    #[error("Scenario combinations must be rectangular; row {row} has {found} values, expected {expected}")]
    CombinationsNotRectangular { row: usize, found: usize, expected: usize },
    #[error("Scenario combinations have {found} columns but {expected} scenarios are defined")]
    CombinationsColumnMismatch { found: usize, expected: usize },
    #[error("Scenario combination value {value} in row {row} is out of range for scenario `{name}` with size {size}")]
    CombinationOutOfRange {
        row: usize,
        name: String,
        value: i64,
        size: usize,
    },
    #[error("No scenario combinations were produced")]
    NoCombinations,
    #[error("Expected {expected} scenario indices, found {found}")]
    IndicesLengthMismatch { found: usize, expected: usize },
    #[error("Index {index} is not selected for scenario `{name}`")]
    IndexNotSelected { name: String, index: usize },
    #[error("Scenario indices {0:?} do not match any combination")]
    CombinationNotFound(Vec<usize>),
}

/// A stepped range of ensemble members to run for a single scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioSlice {
    pub start: usize,
    pub end: usize,
    pub step: usize,
}

impl ScenarioSlice {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end, step: 1 }
    }

    pub fn with_step(start: usize, end: usize, step: usize) -> Self {
        Self { start, end, step }
    }

    fn validate(&self, name: &str, size: usize) -> Result<(), ScenarioError> {
        if self.step == 0 || self.start >= self.end || self.end > size {
            return Err(ScenarioError::InvalidSlice {
                name: name.to_string(),
                size,
                start: self.start,
                end: self.end,
                step: self.step,
            });
        }
        Ok(())
    }

    fn indices(&self) -> impl Iterator<Item = usize> {
        (self.start..self.end).step_by(self.step)
    }
}

/// A named ensemble of alternative realisations.
#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    name: String,
    size: usize,
    slice: Option<ScenarioSlice>,
    ensemble_names: Vec<String>,
}

impl Scenario {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn slice(&self) -> Option<&ScenarioSlice> {
        self.slice.as_ref()
    }

    pub fn ensemble_names(&self) -> &[String] {
        &self.ensemble_names
    }

    /// The ensemble indices that will be simulated for this scenario.
    pub fn selected_indices(&self) -> Vec<usize> {
        match &self.slice {
            Some(slice) => slice.indices().collect(),
            None => (0..self.size).collect(),
        }
    }

    /// Number of ensemble members after applying any slice.
    pub fn effective_size(&self) -> usize {
        match &self.slice {
            Some(slice) => slice.indices().count(),
            None => self.size,
        }
    }

    fn position_of(&self, index: usize) -> Option<usize> {
        match &self.slice {
            Some(slice) => slice.indices().position(|i| i == index),
            None => (index < self.size).then_some(index),
        }
    }
}

/// Builder for [`Scenario`] instances.
pub struct ScenarioBuilder {
    name: String,
    size: usize,
    slice: Option<ScenarioSlice>,
    ensemble_names: Option<Vec<String>>,
}

impl ScenarioBuilder {
    pub fn new(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            size,
            slice: None,
            ensemble_names: None,
        }
    }

    /// Only run the ensemble members in `start..end`.
    pub fn with_slice(mut self, start: usize, end: usize) -> Self {
        self.slice = Some(ScenarioSlice::new(start, end));
        self
    }

    pub fn with_stepped_slice(mut self, start: usize, end: usize, step: usize) -> Self {
        self.slice = Some(ScenarioSlice::with_step(start, end, step));
        self
    }

    /// Set the labels for each ensemble member. There must be one label per member.
    pub fn with_ensemble_names<T: AsRef<str>>(mut self, names: &[T]) -> Self {
        self.ensemble_names = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Scenario, ScenarioError> {
        if self.size < 1 {
            return Err(ScenarioError::InvalidSize {
                name: self.name,
                size: self.size,
            });
        }

        if let Some(slice) = &self.slice {
            slice.validate(&self.name, self.size)?;
        }

        let ensemble_names = match self.ensemble_names {
            Some(names) => {
                if names.len() != self.size {
                    return Err(ScenarioError::IncorrectNumberOfEnsembleNames {
                        name: self.name,
                        found: names.len(),
                        expected: self.size,
                    });
                }
                names
            }
            None => (0..self.size).map(|i| i.to_string()).collect(),
        };

        Ok(Scenario {
            name: self.name,
            size: self.size,
            slice: self.slice,
            ensemble_names,
        })
    }
}

/// One concrete combination of ensemble members across all scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScenarioIndex {
    global_id: usize,
    indices: Vec<usize>,
}

impl ScenarioIndex {
    pub fn new(global_id: usize, indices: Vec<usize>) -> Self {
        Self { global_id, indices }
    }

    /// Position of this combination in the network's per-combination arrays.
    pub fn global_id(&self) -> usize {
        self.global_id
    }

    /// The ensemble member of each scenario, in scenario registration order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn index_for_scenario(&self, scenario_position: usize) -> Option<usize> {
        self.indices.get(scenario_position).copied()
    }
}

/// The registered scenarios of a network and the combinations derived from them.
///
/// Structural changes bump an internal generation counter. The combinations cached by
/// [`ScenarioCollection::setup`] are stale whenever the generation has moved on since.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCollection {
    scenarios: Vec<Scenario>,
    user_combinations: Option<Array2<usize>>,
    combinations: Vec<ScenarioIndex>,
    generation: u64,
    setup_generation: Option<u64>,
}

impl ScenarioCollection {
    pub fn add_scenario(&mut self, scenario: Scenario) -> Result<(), ScenarioError> {
        if self.scenarios.iter().any(|s| s.name == scenario.name) {
            return Err(ScenarioError::DuplicateName(scenario.name));
        }
        self.scenarios.push(scenario);
        self.generation += 1;
        Ok(())
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn get_scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Position of a scenario in registration order; this is its column in every
    /// [`ScenarioIndex`].
    pub fn scenario_position(&self, name: &str) -> Result<usize, ScenarioError> {
        self.scenarios
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| ScenarioError::NameNotFound(name.to_string()))
    }

    pub fn set_slice(&mut self, name: &str, slice: Option<ScenarioSlice>) -> Result<(), ScenarioError> {
        let position = self.scenario_position(name)?;
        let scenario = &mut self.scenarios[position];
        if let Some(slice) = &slice {
            slice.validate(&scenario.name, scenario.size)?;
        }
        scenario.slice = slice;
        self.generation += 1;
        Ok(())
    }

    pub fn set_ensemble_names<T: AsRef<str>>(&mut self, name: &str, names: &[T]) -> Result<(), ScenarioError> {
        let position = self.scenario_position(name)?;
        let scenario = &mut self.scenarios[position];
        if names.len() != scenario.size {
            return Err(ScenarioError::IncorrectNumberOfEnsembleNames {
                name: scenario.name.clone(),
                found: names.len(),
                expected: scenario.size,
            });
        }
        scenario.ensemble_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        Ok(())
    }

    /// Restrict the run to an explicit table of combinations, one row per combination and one
    /// column per scenario. This takes precedence over the full product and any slices.
    pub fn set_user_combinations<R: AsRef<[i64]>>(&mut self, table: &[R]) -> Result<(), ScenarioError> {
        let num_scenarios = self.scenarios.len();

        for (row, values) in table.iter().enumerate() {
            let values = values.as_ref();
            if let Some(first) = table.first() {
                let expected = first.as_ref().len();
                if values.len() != expected {
                    return Err(ScenarioError::CombinationsNotRectangular {
                        row,
                        found: values.len(),
                        expected,
                    });
                }
            }
            if values.len() != num_scenarios {
                return Err(ScenarioError::CombinationsColumnMismatch {
                    found: values.len(),
                    expected: num_scenarios,
                });
            }
            for (&value, scenario) in values.iter().zip(&self.scenarios) {
                if value < 0 || value as usize >= scenario.size {
                    return Err(ScenarioError::CombinationOutOfRange {
                        row,
                        name: scenario.name.clone(),
                        value,
                        size: scenario.size,
                    });
                }
            }
        }

        let combinations = Array2::from_shape_fn((table.len(), num_scenarios), |(r, c)| table[r].as_ref()[c] as usize);
        self.user_combinations = Some(combinations);
        self.generation += 1;
        Ok(())
    }

    pub fn clear_user_combinations(&mut self) {
        if self.user_combinations.take().is_some() {
            self.generation += 1;
        }
    }

    pub fn user_combinations(&self) -> Option<&Array2<usize>> {
        self.user_combinations.as_ref()
    }

    /// Compute the combinations to run from the registered scenarios.
    ///
    /// With no scenarios a single combination with no indices is returned.
    pub fn get_combinations(&self) -> Result<Vec<ScenarioIndex>, ScenarioError> {
        if self.scenarios.is_empty() {
            return Ok(vec![ScenarioIndex::default()]);
        }

        let combinations: Vec<ScenarioIndex> = match &self.user_combinations {
            Some(table) => {
                if table.ncols() != self.scenarios.len() {
                    return Err(ScenarioError::CombinationsColumnMismatch {
                        found: table.ncols(),
                        expected: self.scenarios.len(),
                    });
                }
                table
                    .rows()
                    .into_iter()
                    .enumerate()
                    .map(|(global_id, row)| ScenarioIndex::new(global_id, row.to_vec()))
                    .collect()
            }
            None => {
                let selections: Vec<Vec<usize>> = self.scenarios.iter().map(|s| s.selected_indices()).collect();
                let num: usize = selections.iter().map(|s| s.len()).product();
                let mut combinations = Vec::with_capacity(num);

                for global_id in 0..num {
                    // Row-major; the last scenario varies fastest.
                    let mut remaining = global_id;
                    let mut indices = vec![0; selections.len()];
                    for (slot, selection) in indices.iter_mut().zip(&selections).rev() {
                        *slot = selection[remaining % selection.len()];
                        remaining /= selection.len();
                    }
                    combinations.push(ScenarioIndex::new(global_id, indices));
                }
                combinations
            }
        };

        if combinations.is_empty() {
            return Err(ScenarioError::NoCombinations);
        }

        Ok(combinations)
    }

    /// Cache the combinations for the run. Must be called before any node is set up.
    pub fn setup(&mut self) -> Result<(), ScenarioError> {
        self.combinations = self.get_combinations()?;
        self.setup_generation = Some(self.generation);
        debug!(
            "Scenario setup complete with {} combination(s) over shape {:?}",
            self.combinations.len(),
            self.shape()
        );
        Ok(())
    }

    /// The combinations cached by the last call to [`ScenarioCollection::setup`].
    pub fn combinations(&self) -> &[ScenarioIndex] {
        &self.combinations
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if the scenarios have changed since the combinations were last cached.
    pub fn is_dirty(&self) -> bool {
        self.setup_generation != Some(self.generation)
    }

    /// Effective size of each scenario after slicing, or `[1]` when no scenarios are defined.
    pub fn shape(&self) -> Vec<usize> {
        if self.scenarios.is_empty() {
            return vec![1];
        }
        self.scenarios.iter().map(|s| s.effective_size()).collect()
    }

    /// Map a per-scenario index tuple to its global id.
    pub fn ravel_indices(&self, indices: &[usize]) -> Result<usize, ScenarioError> {
        if self.scenarios.is_empty() {
            return Ok(0);
        }

        if indices.len() != self.scenarios.len() {
            return Err(ScenarioError::IndicesLengthMismatch {
                found: indices.len(),
                expected: self.scenarios.len(),
            });
        }

        if let Some(table) = &self.user_combinations {
            return table
                .rows()
                .into_iter()
                .position(|row| row.iter().eq(indices.iter()))
                .ok_or_else(|| ScenarioError::CombinationNotFound(indices.to_vec()));
        }

        let mut global_id = 0;
        for (&index, scenario) in indices.iter().zip(&self.scenarios) {
            let position = scenario
                .position_of(index)
                .ok_or_else(|| ScenarioError::IndexNotSelected {
                    name: scenario.name.clone(),
                    index,
                })?;
            global_id = global_id * scenario.effective_size() + position;
        }
        Ok(global_id)
    }

    /// The ensemble names of each scenario for the given combination.
    pub fn labels(&self, scenario_index: &ScenarioIndex) -> Vec<&str> {
        self.scenarios
            .iter()
            .zip(scenario_index.indices())
            .map(|(s, &i)| s.ensemble_names.get(i).map(|n| n.as_str()).unwrap_or_default())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ScenarioBuilder, ScenarioCollection, ScenarioError, ScenarioSlice};

    fn collection(sizes: &[(&str, usize)]) -> ScenarioCollection {
        let mut scenarios = ScenarioCollection::default();
        for (name, size) in sizes {
            scenarios
                .add_scenario(ScenarioBuilder::new(name, *size).build().unwrap())
                .unwrap();
        }
        scenarios
    }

    #[test]
    fn test_builder() {
        let scenario = ScenarioBuilder::new("A", 3)
            .with_slice(0, 2)
            .with_ensemble_names(&["wet", "normal", "dry"])
            .build()
            .unwrap();

        assert_eq!(scenario.name(), "A");
        assert_eq!(scenario.size(), 3);
        assert_eq!(scenario.effective_size(), 2);
        assert_eq!(scenario.ensemble_names(), &["wet", "normal", "dry"]);
    }

    #[test]
    fn test_builder_default_ensemble_names() {
        let scenario = ScenarioBuilder::new("A", 3).build().unwrap();
        assert_eq!(scenario.ensemble_names(), &["0", "1", "2"]);
    }

    #[test]
    fn test_builder_invalid_size() {
        let result = ScenarioBuilder::new("A", 0).build();
        assert!(matches!(result, Err(ScenarioError::InvalidSize { size: 0, .. })));
    }

    #[test]
    fn test_builder_wrong_num_names() {
        let result = ScenarioBuilder::new("A", 3)
            .with_ensemble_names(&["1", "2", "3", "4"])
            .build();

        assert!(matches!(
            result,
            Err(ScenarioError::IncorrectNumberOfEnsembleNames {
                found: 4,
                expected: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_builder_invalid_slice() {
        let result = ScenarioBuilder::new("A", 3).with_slice(0, 4).build();
        assert!(matches!(result, Err(ScenarioError::InvalidSlice { end: 4, .. })));

        let result = ScenarioBuilder::new("A", 3).with_stepped_slice(0, 3, 0).build();
        assert!(matches!(result, Err(ScenarioError::InvalidSlice { step: 0, .. })));
    }

    #[test]
    /// Registering the same scenario twice leaves the collection unchanged.
    fn test_duplicate_scenario() {
        let mut scenarios = collection(&[("A", 2)]);
        let generation = scenarios.generation();

        let result = scenarios.add_scenario(ScenarioBuilder::new("A", 5).build().unwrap());
        assert_eq!(result, Err(ScenarioError::DuplicateName("A".to_string())));
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios.generation(), generation);
    }

    #[test]
    fn test_no_scenarios() {
        let mut scenarios = ScenarioCollection::default();
        scenarios.setup().unwrap();

        assert_eq!(scenarios.combinations().len(), 1);
        assert_eq!(scenarios.combinations()[0].global_id(), 0);
        assert!(scenarios.combinations()[0].indices().is_empty());
        assert_eq!(scenarios.shape(), vec![1]);
        assert_eq!(scenarios.ravel_indices(&[]), Ok(0));
    }

    #[test]
    fn test_product_combinations() {
        let scenarios = collection(&[("A", 10), ("B", 2), ("C", 5)]);
        let combinations = scenarios.get_combinations().unwrap();

        assert_eq!(combinations.len(), 100);
        for (k, si) in combinations.iter().enumerate() {
            assert_eq!(si.global_id(), k);
        }

        assert_eq!(combinations[0].indices(), &[0, 0, 0]);
        assert_eq!(combinations[1].indices(), &[0, 0, 1]);
        assert_eq!(combinations[5].indices(), &[0, 1, 0]);
        assert_eq!(combinations[10].indices(), &[1, 0, 0]);
        assert_eq!(combinations[99].indices(), &[9, 1, 4]);
    }

    #[test]
    fn test_ravel_is_left_inverse_of_product() {
        let scenarios = collection(&[("A", 3), ("B", 4), ("C", 2)]);
        assert_eq!(scenarios.shape(), vec![3, 4, 2]);

        for si in scenarios.get_combinations().unwrap() {
            assert_eq!(scenarios.ravel_indices(si.indices()), Ok(si.global_id()));
        }
    }

    #[test]
    fn test_sliced_combinations() {
        let mut scenarios = ScenarioCollection::default();
        scenarios
            .add_scenario(ScenarioBuilder::new("A", 10).with_stepped_slice(2, 8, 2).build().unwrap())
            .unwrap();
        scenarios
            .add_scenario(ScenarioBuilder::new("B", 2).build().unwrap())
            .unwrap();

        let combinations = scenarios.get_combinations().unwrap();
        assert_eq!(scenarios.shape(), vec![3, 2]);
        assert_eq!(combinations.len(), 6);
        assert_eq!(combinations[0].indices(), &[2, 0]);
        assert_eq!(combinations[3].indices(), &[4, 1]);
        assert_eq!(combinations[5].indices(), &[6, 1]);

        for si in combinations.iter() {
            assert_eq!(scenarios.ravel_indices(si.indices()), Ok(si.global_id()));
        }

        assert!(matches!(
            scenarios.ravel_indices(&[3, 0]),
            Err(ScenarioError::IndexNotSelected { index: 3, .. })
        ));
    }

    #[test]
    fn test_user_combinations() {
        let mut scenarios = collection(&[("A", 10), ("B", 2), ("C", 5)]);
        let table = vec![vec![0, 0, 0], vec![0, 1, 0], vec![0, 1, 1], vec![2, 1, 3]];
        scenarios.set_user_combinations(&table).unwrap();

        let combinations = scenarios.get_combinations().unwrap();
        assert_eq!(combinations.len(), 4);
        for (k, (si, row)) in combinations.iter().zip(&table).enumerate() {
            assert_eq!(si.global_id(), k);
            let expected: Vec<usize> = row.iter().map(|&v| v as usize).collect();
            assert_eq!(si.indices(), expected.as_slice());
        }

        assert_eq!(scenarios.ravel_indices(&[2, 1, 3]), Ok(3));
        assert!(matches!(
            scenarios.ravel_indices(&[1, 1, 1]),
            Err(ScenarioError::CombinationNotFound(_))
        ));
    }

    #[test]
    fn test_user_combinations_take_precedence_over_slices() {
        let mut scenarios = collection(&[("A", 4)]);
        scenarios.set_slice("A", Some(ScenarioSlice::new(0, 2))).unwrap();
        scenarios.set_user_combinations(&[[3_i64]]).unwrap();

        let combinations = scenarios.get_combinations().unwrap();
        assert_eq!(combinations.len(), 1);
        assert_eq!(combinations[0].indices(), &[3]);
    }

    #[test]
    fn test_invalid_user_combinations() {
        let mut scenarios = collection(&[("A", 2), ("B", 3)]);

        assert!(matches!(
            scenarios.set_user_combinations(&[vec![0, 0], vec![1]]),
            Err(ScenarioError::CombinationsNotRectangular { row: 1, .. })
        ));
        assert!(matches!(
            scenarios.set_user_combinations(&[vec![0, 0, 0]]),
            Err(ScenarioError::CombinationsColumnMismatch { found: 3, expected: 2 })
        ));
        assert!(matches!(
            scenarios.set_user_combinations(&[vec![0, 3]]),
            Err(ScenarioError::CombinationOutOfRange { value: 3, size: 3, .. })
        ));
        assert!(matches!(
            scenarios.set_user_combinations(&[vec![-1, 0]]),
            Err(ScenarioError::CombinationOutOfRange { value: -1, .. })
        ));
        assert!(scenarios.user_combinations().is_none());
    }

    #[test]
    fn test_empty_user_combinations() {
        let mut scenarios = collection(&[("A", 2)]);
        let empty: Vec<Vec<i64>> = Vec::new();
        scenarios.set_user_combinations(&empty).unwrap();

        assert_eq!(scenarios.get_combinations(), Err(ScenarioError::NoCombinations));
        assert_eq!(scenarios.setup(), Err(ScenarioError::NoCombinations));
    }

    #[test]
    fn test_generation_tracks_changes() {
        let mut scenarios = collection(&[("A", 2)]);
        assert!(scenarios.is_dirty());

        scenarios.setup().unwrap();
        assert!(!scenarios.is_dirty());

        scenarios
            .add_scenario(ScenarioBuilder::new("B", 3).build().unwrap())
            .unwrap();
        assert!(scenarios.is_dirty());

        scenarios.setup().unwrap();
        assert_eq!(scenarios.combinations().len(), 6);

        scenarios.set_slice("B", Some(ScenarioSlice::new(1, 3))).unwrap();
        assert!(scenarios.is_dirty());
    }

    #[test]
    fn test_labels() {
        let mut scenarios = ScenarioCollection::default();
        scenarios
            .add_scenario(
                ScenarioBuilder::new("climate", 2)
                    .with_ensemble_names(&["wet", "dry"])
                    .build()
                    .unwrap(),
            )
            .unwrap();
        scenarios
            .add_scenario(ScenarioBuilder::new("demand", 2).build().unwrap())
            .unwrap();

        let combinations = scenarios.get_combinations().unwrap();
        assert_eq!(scenarios.labels(&combinations[3]), vec!["dry", "1"]);

        scenarios.set_ensemble_names("demand", &["low", "high"]).unwrap();
        assert_eq!(scenarios.labels(&combinations[2]), vec!["dry", "low"]);

        assert!(matches!(
            scenarios.set_ensemble_names("demand", &["only-one"]),
            Err(ScenarioError::IncorrectNumberOfEnsembleNames { found: 1, .. })
        ));
    }
}
