//! Component trait definition for neural network layers
//!
//! This module defines the single interface every layer type implements:
//! dimension introspection, the properties bitmask, forward and backward
//! computation, index derivation, serialization, and the optional hooks for
//! trainable parameters and activation statistics.
//!
//! Behaviour shared between families of components (learning-rate storage,
//! activation statistics) lives in helper structs the concrete types embed,
//! and the hooks here expose those helpers; there is no second trait layer.

use crate::components::index::{Index, MiscComputationInfo};
use crate::components::nonlinear::NonlinearStats;
use crate::components::precomputed::ComponentPrecomputedIndexes;
use crate::components::properties::ComponentProperties;
use crate::components::updatable::UpdatableState;
use crate::config::ConfigLine;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use rand::RngCore;
use std::any::Any;
use std::fmt::Debug;
use std::io::{BufRead, Write};

/// Core trait for neural network components.
///
/// A component goes through: created (unconfigured) → configured by
/// [`init_from_string`](Component::init_from_string) or
/// [`read`](Component::read) → any number of propagate/backprop calls.
/// Numeric operations and `write` on an unconfigured component fail with a
/// state error.
///
/// Matrices are `rows × features`: each row is one [`Index`], the input has
/// [`input_dim`](Component::input_dim) columns and the output
/// [`output_dim`](Component::output_dim) columns.
///
/// # Example
///
/// ```
/// use rust_nnet_components::components::new_from_string;
/// use rust_nnet_components::matrix::Matrix;
///
/// let sigmoid = new_from_string("SigmoidComponent dim=2").unwrap();
/// let input = Matrix::new(3, 2);
/// let output = sigmoid.propagate_to_new(None, &input, 3).unwrap();
/// assert_eq!(output.get(0, 0), 0.5);
/// ```
pub trait Component: Send + Sync + Debug {
    /// Stable type name, e.g. `"SigmoidComponent"`. Used for diagnostics and
    /// as the leading token of the serialized form.
    fn component_type(&self) -> &'static str;

    /// Configure from parsed `key=value` arguments.
    ///
    /// Implementations consume the keys they understand; anything left over is
    /// rejected by [`init_from_string`](Component::init_from_string).
    fn init_from_config(&mut self, cfg: &mut ConfigLine) -> Result<()>;

    /// Configure from the argument part of a config line, e.g. `"dim=100"`.
    ///
    /// # Errors
    ///
    /// Returns a config error for malformed tokens, bad values, missing
    /// required keys or keys the component does not understand.
    fn init_from_string(&mut self, args: &str) -> Result<()> {
        let mut cfg = ConfigLine::parse(args)?;
        self.init_from_config(&mut cfg)?;
        cfg.ensure_all_used(self.component_type())
    }

    /// Number of input columns. Fixed once configured.
    fn input_dim(&self) -> usize;

    /// Number of output columns. Fixed once configured.
    fn output_dim(&self) -> usize;

    /// Capability flags. Depend only on the type, never on the instance.
    fn properties(&self) -> ComponentProperties;

    /// Forward computation.
    ///
    /// # Arguments
    ///
    /// * `indexes` - Value returned by [`precompute_indexes`](Component::precompute_indexes)
    ///   for this exact row layout; `None` for simple components
    /// * `input` - Input rows (`num_input_rows × input_dim`)
    /// * `output` - Output rows (`num_output_rows × output_dim`)
    ///
    /// # Output initialisation
    ///
    /// If [`ComponentProperties::PROPAGATE_ADDS`] is set the result is added to
    /// the existing contents of `output`, so the caller must zero it first to
    /// get a plain result; otherwise the contents are overwritten.
    /// [`propagate_to_new`](Component::propagate_to_new) takes care of this.
    ///
    /// # Errors
    ///
    /// Dimension errors for mismatched shapes; state errors when unconfigured
    /// or when `indexes` is missing or was built for a different layout.
    fn propagate(
        &self,
        indexes: Option<&dyn ComponentPrecomputedIndexes>,
        input: &Matrix,
        output: &mut Matrix,
    ) -> Result<()>;

    /// Propagate into a freshly zeroed `num_output_rows × output_dim` matrix.
    fn propagate_to_new(
        &self,
        indexes: Option<&dyn ComponentPrecomputedIndexes>,
        input: &Matrix,
        num_output_rows: usize,
    ) -> Result<Matrix> {
        let mut output = Matrix::new(num_output_rows, self.output_dim());
        self.propagate(indexes, input, &mut output)?;
        Ok(output)
    }

    /// Forward computation with input and output in the same buffer.
    ///
    /// Only available when [`ComponentProperties::PROPAGATE_IN_PLACE`] is set.
    fn propagate_in_place(
        &self,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        _data: &mut Matrix,
    ) -> Result<()> {
        Err(Error::unsupported(self.component_type(), "propagate_in_place"))
    }

    /// Backward computation.
    ///
    /// # Arguments
    ///
    /// * `debug_info` - Name or position of the component in the network, used
    ///   in error messages
    /// * `indexes` - Same value that was given to [`propagate`](Component::propagate)
    /// * `in_value` - Forward-pass input; may be empty unless
    ///   [`ComponentProperties::BACKPROP_NEEDS_INPUT`] is set
    /// * `out_value` - Forward-pass output; may be empty unless
    ///   [`ComponentProperties::BACKPROP_NEEDS_OUTPUT`] is set
    /// * `out_deriv` - Derivative of the objective w.r.t. the output
    /// * `to_update` - Component that receives the parameter update (or the
    ///   statistics), if any; may be a copy of `self`
    /// * `in_deriv` - Derivative w.r.t. the input, if wanted. Added to when
    ///   [`ComponentProperties::BACKPROP_ADDS`] is set, otherwise overwritten.
    #[allow(clippy::too_many_arguments)]
    fn backprop(
        &self,
        debug_info: &str,
        indexes: Option<&dyn ComponentPrecomputedIndexes>,
        in_value: &Matrix,
        out_value: &Matrix,
        out_deriv: &Matrix,
        to_update: Option<&mut dyn Component>,
        in_deriv: Option<&mut Matrix>,
    ) -> Result<()>;

    /// Backward computation where `deriv` holds `out_deriv` on entry and
    /// `in_deriv` on exit.
    ///
    /// Only available when [`ComponentProperties::BACKPROP_IN_PLACE`] is set.
    fn backprop_in_place(
        &self,
        _debug_info: &str,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        _in_value: &Matrix,
        _out_value: &Matrix,
        _deriv: &mut Matrix,
        _to_update: Option<&mut dyn Component>,
    ) -> Result<()> {
        Err(Error::unsupported(self.component_type(), "backprop_in_place"))
    }

    /// Input indexes needed to compute `output_index`.
    ///
    /// The default suits simple components: the output index itself.
    fn get_input_indexes(&self, _misc_info: &MiscComputationInfo, output_index: &Index) -> Vec<Index> {
        vec![*output_index]
    }

    /// Derive the row mapping metadata for one computation.
    ///
    /// Returns `None` when the component needs none (always the case for
    /// simple components). The result is only valid for these exact index
    /// lists and must be rebuilt when the layout changes.
    fn precompute_indexes(
        &self,
        _misc_info: &MiscComputationInfo,
        _input_indexes: &[Index],
        _output_indexes: &[Index],
        _need_backprop: bool,
    ) -> Result<Option<Box<dyn ComponentPrecomputedIndexes>>> {
        Ok(None)
    }

    /// Read the component body. Accepts the stream with or without the leading
    /// `<TypeName>` token, so it works after [`read_new`](crate::components::read_new)
    /// has consumed it.
    fn read(&mut self, reader: &mut dyn BufRead, binary: bool) -> Result<()>;

    /// Write `<TypeName> ... </TypeName>`.
    fn write(&self, writer: &mut dyn Write, binary: bool) -> Result<()>;

    /// Deep copy, including parameters and statistics.
    fn copy(&self) -> Box<dyn Component>;

    /// One-line human readable summary.
    fn info(&self) -> String {
        format!(
            "{}, input-dim={}, output-dim={}",
            self.component_type(),
            self.input_dim(),
            self.output_dim()
        )
    }

    /// Downcast hooks used when combining two components of the same type.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Learning-rate state, for components with parameters.
    fn updatable_state(&self) -> Option<&UpdatableState> {
        None
    }

    fn updatable_state_mut(&mut self) -> Option<&mut UpdatableState> {
        None
    }

    fn learning_rate(&self) -> Option<f32> {
        self.updatable_state().map(UpdatableState::learning_rate)
    }

    fn set_learning_rate(&mut self, learning_rate: f32) -> Result<()> {
        let ty = self.component_type();
        match self.updatable_state_mut() {
            Some(state) => {
                state.set_learning_rate(learning_rate);
                Ok(())
            }
            None => Err(Error::unsupported(ty, "set_learning_rate")),
        }
    }

    fn is_gradient(&self) -> bool {
        self.updatable_state().is_some_and(UpdatableState::is_gradient)
    }

    /// Zero all parameters. With `treat_as_gradient`, also switch to gradient
    /// mode (`is_gradient() == true`, learning rate 1).
    fn set_zero(&mut self, _treat_as_gradient: bool) -> Result<()> {
        Err(Error::unsupported(self.component_type(), "set_zero"))
    }

    /// Inner product of this component's parameters with another instance's.
    fn dot_product(&self, _other: &dyn Component) -> Result<f32> {
        Err(Error::unsupported(self.component_type(), "dot_product"))
    }

    /// Add zero-mean Gaussian noise with standard deviation `stddev` to every
    /// parameter. For testing.
    fn perturb_params(&mut self, _stddev: f32, _rng: &mut dyn RngCore) -> Result<()> {
        Err(Error::unsupported(self.component_type(), "perturb_params"))
    }

    /// Scale the parameters, or the statistics for nonlinear components.
    /// Stateless components ignore it.
    fn scale(&mut self, factor: f32) -> Result<()> {
        if let Some(stats) = self.stats_mut() {
            stats.scale(factor);
        }
        Ok(())
    }

    /// Add `alpha` times another instance's parameters (or statistics).
    /// Stateless components ignore it.
    fn add(&mut self, alpha: f32, other: &dyn Component) -> Result<()> {
        let ty = self.component_type();
        match (self.stats_mut(), other.stats()) {
            (Some(mine), Some(theirs)) => mine.add(alpha, theirs),
            (Some(_), None) => Err(Error::state(
                ty,
                format!("cannot add statistics from a {}", other.component_type()),
            )),
            (None, _) => Ok(()),
        }
    }

    /// Total number of parameters in vectorized form.
    fn parameter_dim(&self) -> Result<usize> {
        Err(Error::unsupported(self.component_type(), "parameter_dim"))
    }

    /// Copy the parameters into a host vector of length
    /// [`parameter_dim`](Component::parameter_dim).
    ///
    /// The flat form always lives on the host: callers typically pack many
    /// components into one large vector.
    fn vectorize(&self, _params: &mut [f32]) -> Result<()> {
        Err(Error::unsupported(self.component_type(), "vectorize"))
    }

    /// Inverse of [`vectorize`](Component::vectorize).
    fn unvectorize(&mut self, _params: &[f32]) -> Result<()> {
        Err(Error::unsupported(self.component_type(), "unvectorize"))
    }

    /// Activation statistics, for element-wise nonlinearities.
    fn stats(&self) -> Option<&NonlinearStats> {
        None
    }

    fn stats_mut(&mut self) -> Option<&mut NonlinearStats> {
        None
    }
}

impl Clone for Box<dyn Component> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// `<TypeName>`
pub(crate) fn opening_token(component_type: &str) -> String {
    format!("<{}>", component_type)
}

/// `</TypeName>`
pub(crate) fn closing_token(component_type: &str) -> String {
    format!("</{}>", component_type)
}

pub(crate) fn ensure_configured(component_type: &str, configured: bool) -> Result<()> {
    if configured {
        Ok(())
    } else {
        Err(Error::state(
            component_type,
            "component used before being configured by init_from_string or read",
        ))
    }
}

/// Shape checks shared by simple components: equal row counts and the
/// configured column counts.
pub(crate) fn check_simple_shapes(
    component: &dyn Component,
    input: &Matrix,
    output: &Matrix,
) -> Result<()> {
    let ty = component.component_type();
    if input.cols() != component.input_dim() {
        return Err(Error::dimension(
            format!("{} input", ty),
            &[input.rows(), component.input_dim()],
            &input.shape(),
        ));
    }
    if output.shape() != [input.rows(), component.output_dim()] {
        return Err(Error::dimension(
            format!("{} output", ty),
            &[input.rows(), component.output_dim()],
            &output.shape(),
        ));
    }
    Ok(())
}

/// Same check for backprop, labelled with the caller's debug info.
pub(crate) fn check_backprop_shape(
    debug_info: &str,
    component_type: &str,
    what: &str,
    expected: [usize; 2],
    got: &Matrix,
) -> Result<()> {
    if got.shape() != expected {
        return Err(Error::dimension(
            format!("{} ({}) {}", debug_info, component_type, what),
            &expected,
            &got.shape(),
        ));
    }
    Ok(())
}

/// View `other` as the same concrete type as the caller.
pub(crate) fn downcast_same<'a, T: 'static>(
    component_type: &str,
    other: &'a dyn Component,
) -> Result<&'a T> {
    other.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::state(
            component_type,
            format!("expected another {}, got {}", component_type, other.component_type()),
        )
    })
}

/// Mutable variant of [`downcast_same`], for the `to_update` argument of backprop.
pub(crate) fn downcast_same_mut<'a, T: 'static>(
    component_type: &str,
    other: &'a mut dyn Component,
) -> Result<&'a mut T> {
    let other_type = other.component_type();
    other.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
        Error::state(
            component_type,
            format!("expected another {} to update, got {}", component_type, other_type),
        )
    })
}
