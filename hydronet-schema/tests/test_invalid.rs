use hydronet_schema::{ModelSchema, ModelSchemaBuildError, SchemaError};
use std::path::{Path, PathBuf};

fn invalid_model_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("invalid").join(name)
}

macro_rules! invalid_tests {
    ($($test_func:ident: $value:expr,)*) => {
    $(
        #[test]
        fn $test_func() {
            let (input, check): (&str, fn(&ModelSchemaBuildError) -> bool) = $value;
            let schema = ModelSchema::from_path(invalid_model_path(input)).unwrap();
            let err = schema.build_model().err().expect("Model should fail to build");
            assert!(check(&err), "Unexpected error for {input}: {err:?}");
        }
    )*
    }
}

invalid_tests! {
    test_agg_storage_with_flow_node: (
        "agg-storage-with-flow-node.json",
        |e| matches!(e, ModelSchemaBuildError::AddNodeError { name, .. } if name == "total")
    ),
    test_conversion_factor_parameter: (
        "conversion-factor-parameter.json",
        |e| matches!(e, ModelSchemaBuildError::SetNodeConstraintsError { name, .. } if name == "demand")
    ),
    test_missing_node_reference: (
        "missing-node-reference.json",
        |e| matches!(
            e,
            ModelSchemaBuildError::AddNodeError { source, .. }
                if matches!(source.as_ref(), SchemaError::NodeNotFound { name } if name == "nowhere")
        )
    ),
    test_circular_aggregated: (
        "circular-aggregated.json",
        |e| matches!(e, ModelSchemaBuildError::CircularNodeReference(names) if names.len() == 2)
    ),
    test_bad_combinations: (
        "bad-combinations.json",
        |e| matches!(e, ModelSchemaBuildError::Scenarios(_))
    ),
    test_edge_to_missing_node: (
        "edge-to-missing-node.json",
        |e| matches!(e, ModelSchemaBuildError::AddEdgeError { to_node, .. } if to_node == "nowhere")
    ),
    test_edge_from_output: (
        "edge-from-output.json",
        |e| matches!(
            e,
            ModelSchemaBuildError::AddEdgeError { source, .. } if matches!(source.as_ref(), SchemaError::Network(_))
        )
    ),
    test_zero_timestep: (
        "zero-timestep.json",
        |e| matches!(e, ModelSchemaBuildError::TimeDomain(SchemaError::InvalidTimestep(0)))
    ),
}

macro_rules! unreadable_tests {
    ($($test_func:ident: $value:expr,)*) => {
    $(
        #[test]
        fn $test_func() {
            let input: &str = $value;
            assert!(ModelSchema::from_path(invalid_model_path(input)).is_err());
        }
    )*
    }
}

unreadable_tests! {
    test_unknown_aggregated_key: "unknown-aggregated-key.json",
    test_unknown_node_type: "unknown-node-type.json",
}
