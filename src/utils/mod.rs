//! Shared utilities for the component implementations
//!
//! This module provides the element-wise activation kernels and the seeded
//! random number generation used for parameter initialisation.

pub mod activations;
pub mod rng;

pub use activations::{sigmoid, sigmoid_derivative};
pub use rng::{rng_from_config, rng_from_seed};
