use crate::error::SchemaError;
use hydronet_core::network::Network;
use hydronet_core::parameters::{
    ConstantParameter as CoreConstantParameter, ConstantScenarioParameter as CoreConstantScenarioParameter,
    MonthlyInterpDay as CoreMonthlyInterpDay, MonthlyProfileParameter as CoreMonthlyProfileParameter, ParameterIndex,
};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// A parameter with a single value for all time-steps and scenarios.
///
/// Setting `variable` marks the parameter as a decision variable.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConstantParameter {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub variable: bool,
}

impl ConstantParameter {
    fn add_to_model(&self, network: &mut Network) -> Result<ParameterIndex, SchemaError> {
        let mut p = CoreConstantParameter::new(&self.name, self.value);
        if self.variable {
            p = p.as_variable();
        }
        Ok(network.add_parameter(Box::new(p))?)
    }
}

/// A parameter with one value per ensemble member of the named scenario.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConstantScenarioParameter {
    pub name: String,
    pub scenario: String,
    pub values: Vec<f64>,
}

impl ConstantScenarioParameter {
    fn add_to_model(&self, network: &mut Network) -> Result<ParameterIndex, SchemaError> {
        let position = network.scenarios().scenario_position(&self.scenario)?;
        let p = CoreConstantScenarioParameter::new(&self.name, self.values.clone(), position);
        Ok(network.add_parameter(Box::new(p))?)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub enum MonthlyInterpDay {
    First,
    Last,
}

impl From<MonthlyInterpDay> for CoreMonthlyInterpDay {
    fn from(value: MonthlyInterpDay) -> Self {
        match value {
            MonthlyInterpDay::First => Self::First,
            MonthlyInterpDay::Last => Self::Last,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MonthlyProfileParameter {
    pub name: String,
    pub values: [f64; 12],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interp_day: Option<MonthlyInterpDay>,
}

impl MonthlyProfileParameter {
    fn add_to_model(&self, network: &mut Network) -> Result<ParameterIndex, SchemaError> {
        let p = CoreMonthlyProfileParameter::new(&self.name, self.values, self.interp_day.map(|d| d.into()));
        Ok(network.add_parameter(Box::new(p))?)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Display, PartialEq)]
#[serde(tag = "type")]
pub enum Parameter {
    Constant(ConstantParameter),
    ConstantScenario(ConstantScenarioParameter),
    MonthlyProfile(MonthlyProfileParameter),
}

impl Parameter {
    pub fn name(&self) -> &str {
        match self {
            Self::Constant(p) => &p.name,
            Self::ConstantScenario(p) => &p.name,
            Self::MonthlyProfile(p) => &p.name,
        }
    }

    pub fn add_to_model(&self, network: &mut Network) -> Result<ParameterIndex, SchemaError> {
        match self {
            Self::Constant(p) => p.add_to_model(network),
            Self::ConstantScenario(p) => p.add_to_model(network),
            Self::MonthlyProfile(p) => p.add_to_model(network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Parameter;

    #[test]
    fn test_monthly_profile() {
        let data = r#"
            {
                "type": "MonthlyProfile",
                "name": "demand-profile",
                "values": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
                "interp_day": "First"
            }
        "#;
        let parameter: Parameter = serde_json::from_str(data).unwrap();
        assert_eq!(parameter.name(), "demand-profile");
        assert_eq!(parameter.to_string(), "MonthlyProfile");
    }

    #[test]
    fn test_unknown_field() {
        let data = r#"{"type": "Constant", "name": "c", "value": 1.0, "units": "Ml"}"#;
        assert!(serde_json::from_str::<Parameter>(data).is_err());
    }
}
