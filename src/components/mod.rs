//! Neural network components
//!
//! This module contains the [`Component`] trait every layer type implements,
//! the helpers shared across families of components, the concrete component
//! types, and the registry that builds them by name.

pub mod affine;
pub mod identity;
pub mod index;
pub mod linear;
pub mod nonlinear;
pub mod precomputed;
pub mod properties;
pub mod registry;
pub mod sigmoid;
pub mod splice;
pub mod updatable;

mod r#trait;

pub use affine::AffineComponent;
pub use identity::IdentityNonlinearity;
pub use index::{Index, MiscComputationInfo};
pub use linear::LinearComponent;
pub use nonlinear::NonlinearStats;
pub use precomputed::ComponentPrecomputedIndexes;
pub use properties::ComponentProperties;
pub use r#trait::Component;
pub use registry::{new_component_of_type, new_from_string, read_new, registered_component_types};
pub use sigmoid::SigmoidComponent;
pub use splice::{SpliceComponent, SpliceIndexes};
pub use updatable::{UpdatableState, DEFAULT_LEARNING_RATE};
