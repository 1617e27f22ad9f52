//! Name-based construction of components.
//!
//! Model files and config lines name component types as strings. The
//! registry maps each name to a constructor that returns an unconfigured
//! instance; configuration then comes from the config line or the stream.

use crate::components::affine::AffineComponent;
use crate::components::identity::IdentityNonlinearity;
use crate::components::linear::LinearComponent;
use crate::components::r#trait::Component;
use crate::components::sigmoid::SigmoidComponent;
use crate::components::splice::SpliceComponent;
use crate::config::split_type_and_args;
use crate::error::{Error, Result};
use crate::io::read_token;
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::OnceLock;

type ComponentFactory = fn() -> Box<dyn Component>;

fn construct<C: Component + Default + 'static>() -> Box<dyn Component> {
    Box::new(C::default())
}

const COMPONENT_TYPES: &[(&str, ComponentFactory)] = &[
    (IdentityNonlinearity::TYPE, construct::<IdentityNonlinearity>),
    (SigmoidComponent::TYPE, construct::<SigmoidComponent>),
    (AffineComponent::TYPE, construct::<AffineComponent>),
    (LinearComponent::TYPE, construct::<LinearComponent>),
    (SpliceComponent::TYPE, construct::<SpliceComponent>),
];

static REGISTRY: OnceLock<HashMap<&'static str, ComponentFactory>> = OnceLock::new();

fn registry() -> &'static HashMap<&'static str, ComponentFactory> {
    REGISTRY.get_or_init(|| {
        tracing::debug!(count = COMPONENT_TYPES.len(), "building component registry");
        COMPONENT_TYPES.iter().copied().collect()
    })
}

/// All registered type names, sorted.
pub fn registered_component_types() -> Vec<&'static str> {
    let mut names: Vec<_> = registry().keys().copied().collect();
    names.sort_unstable();
    names
}

/// Unconfigured instance of the named type, or `None` if the name is unknown.
pub fn new_component_of_type(component_type: &str) -> Option<Box<dyn Component>> {
    registry().get(component_type).map(|factory| factory())
}

/// Read one component whose leading `<TypeName>` token has not been consumed.
///
/// # Errors
///
/// `UnknownType` if the token does not name a registered type; `Format` if
/// it is not a `<...>` token or the body is malformed.
pub fn read_new(reader: &mut dyn BufRead, binary: bool) -> Result<Box<dyn Component>> {
    let token = read_token(reader, binary)?;
    let component_type = token
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .filter(|t| !t.is_empty() && !t.starts_with('/'))
        .ok_or_else(|| Error::format(format!("expected a component type token, got '{}'", token)))?;
    let mut component = new_component_of_type(component_type)
        .ok_or_else(|| Error::UnknownType(component_type.to_string()))?;
    tracing::trace!(component_type, binary, "reading component");
    component.read(reader, binary)?;
    Ok(component)
}

/// Build and configure a component from a full config line, e.g.
/// `"AffineComponent input-dim=40 output-dim=10"`.
///
/// # Errors
///
/// `Config` for a malformed line or bad/unknown keys, `UnknownType` for an
/// unregistered type name.
pub fn new_from_string(line: &str) -> Result<Box<dyn Component>> {
    let (component_type, args) = split_type_and_args(line)?;
    let mut component = new_component_of_type(component_type)
        .ok_or_else(|| Error::UnknownType(component_type.to_string()))?;
    component.init_from_string(args)?;
    tracing::debug!(component = %component.info(), "configured component");
    Ok(component)
}
