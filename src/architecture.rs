//! Component-set configuration
//!
//! This module loads a sequence of named components from a JSON document, so
//! a stack of components can be described in a file instead of in code. Each
//! entry carries a config line in the same format accepted by
//! [`new_from_string`].

use crate::components::{new_from_string, Component};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One named component in a component set.
///
/// # Example
///
/// ```json
/// {
///   "name": "affine1",
///   "config": "AffineComponent input-dim=40 output-dim=128 seed=1"
/// }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ComponentEntry {
    /// Unique name of the component within the set
    pub name: String,
    /// Full config line: type name followed by `key=value` pairs
    pub config: String,
}

/// An ordered set of components; entry *i* feeds entry *i + 1*.
///
/// # Example
///
/// ```json
/// {
///   "components": [
///     { "name": "affine1", "config": "AffineComponent input-dim=40 output-dim=128" },
///     { "name": "sigmoid1", "config": "SigmoidComponent dim=128" },
///     { "name": "final", "config": "LinearComponent input-dim=128 output-dim=10" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ArchitectureConfig {
    pub components: Vec<ComponentEntry>,
}

/// Named, configured components in network order.
pub type ComponentSet = Vec<(String, Box<dyn Component>)>;

/// Loads an architecture configuration from a JSON file.
///
/// # Errors
///
/// `Io` if the file cannot be read, `Config` if the JSON is invalid or the
/// set is empty or has duplicate names.
///
/// # Examples
///
/// ```no_run
/// use rust_nnet_components::architecture::{build_components, load_architecture};
///
/// let config = load_architecture("config/architectures/splice_affine_sigmoid.json").unwrap();
/// let components = build_components(&config).unwrap();
/// assert_eq!(components.len(), config.components.len());
/// ```
pub fn load_architecture(path: impl AsRef<Path>) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_architecture(&contents)
}

/// Like [`load_architecture`] for a JSON string.
pub fn parse_architecture(json: &str) -> Result<ArchitectureConfig> {
    let config: ArchitectureConfig = serde_json::from_str(json)
        .map_err(|e| Error::config(format!("invalid architecture JSON: {}", e)))?;
    validate_architecture(&config)?;
    Ok(config)
}

/// Structural checks that do not need the components themselves.
fn validate_architecture(config: &ArchitectureConfig) -> Result<()> {
    if config.components.is_empty() {
        return Err(Error::config("architecture must have at least one component"));
    }
    let mut seen = HashSet::new();
    for (i, entry) in config.components.iter().enumerate() {
        if entry.name.trim().is_empty() {
            return Err(Error::config(format!("component {} has an empty name", i)));
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(Error::config(format!("duplicate component name '{}'", entry.name)));
        }
    }
    Ok(())
}

/// Instantiates every entry and checks that adjacent dimensions agree.
///
/// # Errors
///
/// Whatever [`new_from_string`] reports for an entry, or `DimensionMismatch`
/// when the output dimension of one component differs from the input
/// dimension of the next.
pub fn build_components(config: &ArchitectureConfig) -> Result<ComponentSet> {
    validate_architecture(config)?;
    let mut components: ComponentSet = Vec::with_capacity(config.components.len());
    for entry in &config.components {
        let component = new_from_string(&entry.config).map_err(|e| match e {
            Error::Config(reason) => Error::config(format!("{}: {}", entry.name, reason)),
            other => other,
        })?;
        if let Some((prev_name, prev)) = components.last() {
            if prev.output_dim() != component.input_dim() {
                return Err(Error::dimension(
                    format!("{} -> {}", prev_name, entry.name),
                    &[prev.output_dim()],
                    &[component.input_dim()],
                ));
            }
        }
        components.push((entry.name.clone(), component));
    }
    tracing::debug!(count = components.len(), "built component set");
    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, config: &str) -> ComponentEntry {
        ComponentEntry {
            name: name.to_string(),
            config: config.to_string(),
        }
    }

    #[test]
    fn test_validate_empty_architecture() {
        let config = ArchitectureConfig { components: vec![] };
        assert!(matches!(validate_architecture(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let config = ArchitectureConfig {
            components: vec![
                entry("a", "SigmoidComponent dim=3"),
                entry("a", "SigmoidComponent dim=3"),
            ],
        };
        assert!(validate_architecture(&config).is_err());
    }

    #[test]
    fn test_build_checks_dimension_chain() {
        let config = ArchitectureConfig {
            components: vec![
                entry("affine", "AffineComponent input-dim=4 output-dim=3 seed=1"),
                entry("sigmoid", "SigmoidComponent dim=2"),
            ],
        };
        assert!(matches!(
            build_components(&config),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_build_valid_chain() {
        let config = ArchitectureConfig {
            components: vec![
                entry("splice", "SpliceComponent input-dim=2 context=-1,0,1"),
                entry("affine", "AffineComponent input-dim=6 output-dim=3 seed=1"),
                entry("sigmoid", "SigmoidComponent dim=3"),
            ],
        };
        let components = build_components(&config).unwrap();
        let names: Vec<_> = components.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["splice", "affine", "sigmoid"]);
        assert_eq!(components[1].1.component_type(), "AffineComponent");
    }

    #[test]
    fn test_config_errors_name_the_entry() {
        let config = ArchitectureConfig {
            components: vec![entry("bad", "SigmoidComponent dim=3 colour=red")],
        };
        let err = build_components(&config).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let json = r#"{"components": [], "layers": []}"#;
        assert!(matches!(parse_architecture(json), Err(Error::Config(_))));
    }
}
