//! Tests for loading and building component sets from JSON
//!
//! This file tests the architecture module including:
//! - Loading valid JSON component sets
//! - Building configured components in order
//! - Handling invalid JSON and missing files
//! - Validating dimensions between adjacent components
//! - The architecture shipped under config/

use rust_nnet_components::architecture::{build_components, load_architecture, parse_architecture};
use rust_nnet_components::components::{AffineComponent, Component};
use rust_nnet_components::matrix::Matrix;
use rust_nnet_components::Error;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("failed to write temp config");
    file
}

// ============================================================================
// Valid Architecture Loading Tests
// ============================================================================

mod valid_architecture_tests {
    use super::*;

    #[test]
    fn test_load_simple_stack() {
        let config_json = r#"{
  "components": [
    { "name": "affine1", "config": "AffineComponent input-dim=8 output-dim=4 seed=3" },
    { "name": "sigmoid1", "config": "SigmoidComponent dim=4" },
    { "name": "final", "config": "LinearComponent input-dim=4 output-dim=2 seed=4" }
  ]
}"#;

        let temp_file = write_temp_config(config_json);
        let config = load_architecture(temp_file.path()).unwrap();
        assert_eq!(config.components.len(), 3);
        assert_eq!(config.components[1].name, "sigmoid1");

        let components = build_components(&config).unwrap();
        let types: Vec<_> = components.iter().map(|(_, c)| c.component_type()).collect();
        assert_eq!(types, vec!["AffineComponent", "SigmoidComponent", "LinearComponent"]);
        assert_eq!(components[0].1.input_dim(), 8);
        assert_eq!(components[2].1.output_dim(), 2);
    }

    #[test]
    fn test_single_component() {
        let config = parse_architecture(
            r#"{"components": [{"name": "only", "config": "IdentityNonlinearity dim=5"}]}"#,
        )
        .unwrap();
        let components = build_components(&config).unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].0, "only");
    }

    #[test]
    fn test_seeded_builds_are_reproducible() {
        let json = r#"{"components": [{"name": "a", "config": "AffineComponent input-dim=3 output-dim=2 seed=9"}]}"#;
        let config = parse_architecture(json).unwrap();
        let first = build_components(&config).unwrap();
        let second = build_components(&config).unwrap();
        let a = first[0].1.as_any().downcast_ref::<AffineComponent>().unwrap();
        let b = second[0].1.as_any().downcast_ref::<AffineComponent>().unwrap();
        assert_eq!(a.linear_params(), b.linear_params());
        assert_eq!(a.bias_params(), b.bias_params());
    }

    #[test]
    fn test_shipped_architecture_runs_forward() {
        let config = load_architecture("config/architectures/splice_affine_sigmoid.json").unwrap();
        let components = build_components(&config).unwrap();
        assert_eq!(components.len(), 4);

        // The splice needs its indexes precomputed; the rest are simple.
        let (_, splice) = &components[0];
        assert_eq!(splice.input_dim(), 13);
        assert_eq!(splice.output_dim(), 65);

        let mut hidden = Matrix::filled(3, 65, 0.5);
        for (_, component) in &components[1..] {
            hidden = component.propagate_to_new(None, &hidden, 3).unwrap();
        }
        assert_eq!(hidden.shape(), [3, 10]);
        assert!(hidden.data().iter().all(|v| v.is_finite()));
    }
}

// ============================================================================
// Invalid Architecture Tests
// ============================================================================

mod invalid_architecture_tests {
    use super::*;

    #[test]
    fn test_invalid_json() {
        let temp_file = write_temp_config("{ this is not json ]");
        assert!(matches!(load_architecture(temp_file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_architecture("config/architectures/does_not_exist.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_missing_config_field() {
        let json = r#"{"components": [{"name": "a"}]}"#;
        assert!(matches!(parse_architecture(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_components() {
        assert!(matches!(
            parse_architecture(r#"{"components": []}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_duplicate_names() {
        let json = r#"{"components": [
            {"name": "x", "config": "SigmoidComponent dim=2"},
            {"name": "x", "config": "SigmoidComponent dim=2"}
        ]}"#;
        assert!(matches!(parse_architecture(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_dimension_mismatch_between_components() {
        let json = r#"{"components": [
            {"name": "affine1", "config": "AffineComponent input-dim=4 output-dim=6 seed=1"},
            {"name": "sigmoid1", "config": "SigmoidComponent dim=5"}
        ]}"#;
        let config = parse_architecture(json).unwrap();
        match build_components(&config) {
            Err(Error::DimensionMismatch { context, expected, got }) => {
                assert_eq!(context, "affine1 -> sigmoid1");
                assert_eq!(expected, vec![6]);
                assert_eq!(got, vec![5]);
            }
            other => panic!("expected dimension mismatch, got {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn test_unknown_component_type() {
        let json = r#"{"components": [{"name": "a", "config": "ConvolutionComponent dim=2"}]}"#;
        let config = parse_architecture(json).unwrap();
        assert!(matches!(build_components(&config), Err(Error::UnknownType(_))));
    }
}
