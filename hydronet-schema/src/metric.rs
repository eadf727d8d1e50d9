use crate::error::SchemaError;
use hydronet_core::network::Network;
use hydronet_core::node::ConstraintValue;
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::Display;

/// A value used to constrain a node: either a literal or a reference to a parameter.
///
/// A plain number is read as a literal, so `"max_flow": 5.0` and
/// `"max_flow": {"type": "Literal", "value": 5.0}` are equivalent.
#[derive(Serialize, Clone, Debug, Display, PartialEq)]
#[serde(tag = "type")]
pub enum Metric {
    /// A literal floating point value.
    Literal { value: f64 },
    /// A reference to a parameter by name.
    Parameter(ParameterReference),
}

#[derive(Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
enum TaggedMetric {
    Literal { value: f64 },
    Parameter(ParameterReference),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetricValue {
    Literal(f64),
    Tagged(TaggedMetric),
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match MetricValue::deserialize(deserializer)? {
            MetricValue::Literal(value) => Self::Literal { value },
            MetricValue::Tagged(TaggedMetric::Literal { value }) => Self::Literal { value },
            MetricValue::Tagged(TaggedMetric::Parameter(reference)) => Self::Parameter(reference),
        })
    }
}

impl Default for Metric {
    fn default() -> Self {
        Self::Literal { value: 0.0 }
    }
}

impl From<f64> for Metric {
    fn from(value: f64) -> Self {
        Self::Literal { value }
    }
}

impl Metric {
    /// Resolve the metric against the parameters already added to `network`.
    pub fn load(&self, network: &Network) -> Result<ConstraintValue, SchemaError> {
        match self {
            Self::Literal { value } => Ok(ConstraintValue::Constant(*value)),
            Self::Parameter(reference) => network
                .get_parameter_index_by_name(&reference.name)
                .map(ConstraintValue::Parameter)
                .ok_or_else(|| SchemaError::ParameterNotFound(reference.name.clone())),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParameterReference {
    /// The name of the parameter
    pub name: String,
}

impl ParameterReference {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::Metric;

    #[test]
    fn test_deserialize() {
        let literal: Metric = serde_json::from_str(r#"{"type": "Literal", "value": 2.5}"#).unwrap();
        assert_eq!(literal, Metric::from(2.5));

        let parameter: Metric = serde_json::from_str(r#"{"type": "Parameter", "name": "demand"}"#).unwrap();
        assert!(matches!(parameter, Metric::Parameter(r) if r.name == "demand"));

        assert!(serde_json::from_str::<Metric>(r#"{"type": "Parameter", "name": "d", "key": "x"}"#).is_err());
    }

    #[test]
    fn test_deserialize_plain_number() {
        let literal: Metric = serde_json::from_str("5.0").unwrap();
        assert_eq!(literal, Metric::from(5.0));

        let literal: Metric = serde_json::from_str("3").unwrap();
        assert_eq!(literal, Metric::from(3.0));

        assert!(serde_json::from_str::<Metric>(r#""demand""#).is_err());
    }

    #[test]
    fn test_serialize_is_tagged() {
        let data = serde_json::to_string(&Metric::from(5.0)).unwrap();
        assert_eq!(data, r#"{"type":"Literal","value":5.0}"#);
    }
}
