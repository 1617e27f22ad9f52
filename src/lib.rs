//! Neural network component library
//!
//! This library provides the polymorphic component interface used to build
//! neural networks out of layer objects, a few concrete components, and a
//! sparse matrix type that can live in host or device memory.
//!
//! # Modules
//!
//! - `components`: Component trait, shared helpers, concrete types and registry
//! - `matrix`: Dense, sparse and device-resident sparse matrices
//! - `io`: Token-based binary/text stream format
//! - `config`: Config-line parsing for component initialisation
//! - `architecture`: JSON component-set configuration
//! - `error`: Error type shared by all modules
//! - `utils`: Activation kernels and seeded random number generation

pub mod architecture;
pub mod components;
pub mod config;
pub mod error;
pub mod io;
pub mod matrix;
pub mod utils;

pub use error::{Error, Result};
