use crate::error::{ModelSchemaBuildError, ModelSchemaReadError, SchemaError};
use crate::network::NetworkSchema;
use crate::scenarios::{build_scenarios, ScenarioSchema};
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use hydronet_core::network::Network;
use hydronet_core::timestep::TimeDomain;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    pub title: String,
    pub description: Option<String>,
}

fn default_timestep() -> i64 {
    1
}

/// The simulation period; `timestep` is the length of each time-step in days.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct Timestepper {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_timestep")]
    pub timestep: i64,
}

impl Timestepper {
    pub fn build(&self) -> Result<TimeDomain, SchemaError> {
        if self.timestep < 1 {
            return Err(SchemaError::InvalidTimestep(self.timestep));
        }
        let step = TimeDelta::try_days(self.timestep).ok_or(SchemaError::InvalidTimestep(self.timestep))?;
        let timestepper = hydronet_core::timestep::Timestepper::new(
            self.start.and_time(NaiveTime::MIN),
            self.end.and_time(NaiveTime::MIN),
            step,
        );
        Ok(timestepper.try_into()?)
    }
}

/// A complete model document.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ModelSchema {
    pub metadata: Metadata,
    pub timestepper: Timestepper,
    pub scenarios: Option<Vec<ScenarioSchema>>,
    /// An explicit table of scenario combinations to run, one row per combination.
    pub scenario_combinations: Option<Vec<Vec<i64>>>,
    pub network: NetworkSchema,
}

impl FromStr for ModelSchema {
    type Err = ModelSchemaReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

impl ModelSchema {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelSchemaReadError> {
        let data = std::fs::read_to_string(&path).map_err(|error| ModelSchemaReadError::IO {
            path: path.as_ref().to_path_buf(),
            error,
        })?;
        Ok(serde_json::from_str(data.as_str())?)
    }

    pub fn build_model(&self) -> Result<Model, ModelSchemaBuildError> {
        let domain = self.timestepper.build().map_err(ModelSchemaBuildError::TimeDomain)?;

        let scenarios = build_scenarios(
            self.scenarios.as_deref().unwrap_or_default(),
            self.scenario_combinations.as_deref(),
        )
        .map_err(ModelSchemaBuildError::Scenarios)?;

        let network = self.network.build_network(scenarios)?;

        info!(
            "Built model `{}` with {} time-step(s)",
            self.metadata.title,
            domain.len()
        );

        Ok(Model { domain, network })
    }
}

/// A time domain and the network to simulate over it.
pub struct Model {
    domain: TimeDomain,
    network: Network,
}

impl Model {
    pub fn domain(&self) -> &TimeDomain {
        &self.domain
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn into_parts(self) -> (TimeDomain, Network) {
        (self.domain, self.network)
    }
}

#[cfg(test)]
mod tests {
    use super::Timestepper;
    use crate::error::SchemaError;
    use chrono::NaiveDate;

    #[test]
    fn test_timestepper() {
        let timestepper: Timestepper =
            serde_json::from_str(r#"{"start": "2020-01-01", "end": "2020-01-31", "timestep": 7}"#).unwrap();
        let domain = timestepper.build().unwrap();
        assert_eq!(domain.len(), 5);
        assert_eq!(
            domain.timesteps()[1].date.date(),
            NaiveDate::from_ymd_opt(2020, 1, 8).unwrap()
        );

        let zero = Timestepper {
            timestep: 0,
            ..timestepper.clone()
        };
        assert!(matches!(zero.build(), Err(SchemaError::InvalidTimestep(0))));

        let negative = Timestepper {
            timestep: -3,
            ..timestepper
        };
        assert!(matches!(negative.build(), Err(SchemaError::InvalidTimestep(-3))));
    }
}
