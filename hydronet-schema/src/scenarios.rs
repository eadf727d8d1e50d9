use crate::error::SchemaError;
use hydronet_core::scenario::{ScenarioBuilder, ScenarioCollection};
use serde::{Deserialize, Serialize};

/// A stepped range of ensemble members to run; `step` defaults to one.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSliceSchema {
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSchema {
    pub name: String,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice: Option<ScenarioSliceSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble_names: Option<Vec<String>>,
}

/// Build the scenario collection from the scenario definitions and an optional table of
/// explicit combinations.
pub fn build_scenarios(
    scenarios: &[ScenarioSchema],
    combinations: Option<&[Vec<i64>]>,
) -> Result<ScenarioCollection, SchemaError> {
    let mut collection = ScenarioCollection::default();

    for scenario in scenarios {
        let mut builder = ScenarioBuilder::new(&scenario.name, scenario.size);
        if let Some(slice) = &scenario.slice {
            builder = builder.with_stepped_slice(slice.start, slice.end, slice.step.unwrap_or(1));
        }
        if let Some(names) = &scenario.ensemble_names {
            builder = builder.with_ensemble_names(names);
        }
        collection.add_scenario(builder.build()?)?;
    }

    if let Some(table) = combinations {
        collection.set_user_combinations(table)?;
    }

    Ok(collection)
}
