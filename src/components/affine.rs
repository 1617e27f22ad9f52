//! Affine (fully connected) component
//!
//! This module provides the AffineComponent, which performs the transformation
//! `output = input × Wᵀ + b`, and the parameter helpers it shares with
//! [`LinearComponent`](crate::components::LinearComponent).

use crate::components::precomputed::ComponentPrecomputedIndexes;
use crate::components::properties::ComponentProperties;
use crate::components::r#trait::{
    check_backprop_shape, check_simple_shapes, closing_token, downcast_same, downcast_same_mut,
    ensure_configured, opening_token, Component,
};
use crate::components::updatable::UpdatableState;
use crate::config::ConfigLine;
use crate::error::{Error, Result};
use crate::io::{
    expect_one_or_two_tokens, expect_token, read_f32_vector, read_matrix, write_f32_vector,
    write_matrix, write_token,
};
use crate::matrix::{Matrix, MatrixTranspose};
use crate::utils::rng_from_config;
use rand::RngCore;
use std::any::Any;
use std::io::{BufRead, Write};

/// Affine component with a weight matrix and a bias vector.
///
/// Performs `y = x Wᵀ + b` where x is the input (rows × input_dim),
/// W is the weight matrix (output_dim × input_dim) and b the bias (output_dim).
///
/// # Example
///
/// ```
/// use rust_nnet_components::components::{AffineComponent, Component};
/// use rust_nnet_components::matrix::Matrix;
///
/// let weights = Matrix::from_rows(&[vec![1.0, 2.0]]).unwrap();
/// let affine = AffineComponent::from_params(weights, vec![0.5], 0.01).unwrap();
/// let input = Matrix::from_rows(&[vec![1.0, 1.0]]).unwrap();
/// let output = affine.propagate_to_new(None, &input, 1).unwrap();
/// assert_eq!(output.get(0, 0), 3.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AffineComponent {
    updatable: UpdatableState,
    linear_params: Matrix,
    bias_params: Vec<f32>,
}

impl AffineComponent {
    pub const TYPE: &'static str = "AffineComponent";

    /// Create an AffineComponent with Gaussian-initialised parameters.
    ///
    /// # Arguments
    ///
    /// * `input_dim` - Number of input features
    /// * `output_dim` - Number of output features
    /// * `param_stddev` - Standard deviation of the weights
    /// * `bias_stddev` - Standard deviation of the bias
    /// * `learning_rate` - Initial learning rate
    /// * `rng` - Random number generator for the draw
    pub fn new(
        input_dim: usize,
        output_dim: usize,
        param_stddev: f32,
        bias_stddev: f32,
        learning_rate: f32,
        rng: &mut dyn RngCore,
    ) -> Self {
        let linear_params = random_params(output_dim, input_dim, param_stddev, rng);
        let bias = random_params(1, output_dim, bias_stddev, rng);
        Self {
            updatable: UpdatableState::new(learning_rate),
            linear_params,
            bias_params: bias.data().to_vec(),
        }
    }

    /// Create from explicit parameters. `bias_params` must have one entry per
    /// row of `linear_params`.
    pub fn from_params(linear_params: Matrix, bias_params: Vec<f32>, learning_rate: f32) -> Result<Self> {
        if bias_params.len() != linear_params.rows() {
            return Err(Error::dimension(
                "AffineComponent::from_params",
                &[linear_params.rows()],
                &[bias_params.len()],
            ));
        }
        Ok(Self {
            updatable: UpdatableState::new(learning_rate),
            linear_params,
            bias_params,
        })
    }

    /// Weights, `output_dim × input_dim`.
    pub fn linear_params(&self) -> &Matrix {
        &self.linear_params
    }

    pub fn bias_params(&self) -> &[f32] {
        &self.bias_params
    }

    fn check_configured(&self) -> Result<()> {
        ensure_configured(Self::TYPE, !self.linear_params.is_empty())
    }

    /// `W += lr · out_derivᵀ · in_value`, `b += lr · colsum(out_deriv)`.
    fn update(&mut self, in_value: &Matrix, out_deriv: &Matrix) -> Result<()> {
        let lr = self.updatable.learning_rate();
        update_linear_params(&mut self.linear_params, lr, in_value, out_deriv)?;
        for (b, sum) in self.bias_params.iter_mut().zip(out_deriv.column_sums()) {
            *b += lr * sum as f32;
        }
        Ok(())
    }
}

impl Component for AffineComponent {
    fn component_type(&self) -> &'static str {
        Self::TYPE
    }

    fn init_from_config(&mut self, cfg: &mut ConfigLine) -> Result<()> {
        let input_dim = cfg.require_dim("input-dim", Self::TYPE)?;
        let output_dim = cfg.require_dim("output-dim", Self::TYPE)?;
        let param_stddev = read_stddev(cfg, "param-stddev", 1.0 / (input_dim as f32).sqrt())?;
        let bias_stddev = read_stddev(cfg, "bias-stddev", 1.0)?;
        let mut updatable = UpdatableState::default();
        updatable.init_from_config(cfg)?;
        let mut rng = rng_from_config(cfg)?;
        *self = Self::new(
            input_dim,
            output_dim,
            param_stddev,
            bias_stddev,
            updatable.learning_rate(),
            &mut rng,
        );
        Ok(())
    }

    fn input_dim(&self) -> usize {
        self.linear_params.cols()
    }

    fn output_dim(&self) -> usize {
        self.linear_params.rows()
    }

    fn properties(&self) -> ComponentProperties {
        ComponentProperties::SIMPLE_COMPONENT
            | ComponentProperties::UPDATABLE_COMPONENT
            | ComponentProperties::LINEAR_IN_PARAMETERS
            | ComponentProperties::BACKPROP_NEEDS_INPUT
            | ComponentProperties::BACKPROP_ADDS
    }

    fn propagate(
        &self,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        input: &Matrix,
        output: &mut Matrix,
    ) -> Result<()> {
        self.check_configured()?;
        check_simple_shapes(self, input, output)?;
        output.set_zero();
        output.add_vec_to_rows(1.0, &self.bias_params)?;
        output.add_mat_mat(
            1.0,
            input,
            MatrixTranspose::NoTrans,
            &self.linear_params,
            MatrixTranspose::Trans,
            1.0,
        )
    }

    fn backprop(
        &self,
        debug_info: &str,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        in_value: &Matrix,
        _out_value: &Matrix,
        out_deriv: &Matrix,
        to_update: Option<&mut dyn Component>,
        in_deriv: Option<&mut Matrix>,
    ) -> Result<()> {
        self.check_configured()?;
        let rows = out_deriv.rows();
        check_backprop_shape(debug_info, Self::TYPE, "out_deriv", [rows, self.output_dim()], out_deriv)?;
        if let Some(in_deriv) = in_deriv {
            check_backprop_shape(debug_info, Self::TYPE, "in_deriv", [rows, self.input_dim()], in_deriv)?;
            in_deriv.add_mat_mat(
                1.0,
                out_deriv,
                MatrixTranspose::NoTrans,
                &self.linear_params,
                MatrixTranspose::NoTrans,
                1.0,
            )?;
        }
        if let Some(target) = to_update {
            check_backprop_shape(debug_info, Self::TYPE, "in_value", [rows, self.input_dim()], in_value)?;
            downcast_same_mut::<AffineComponent>(Self::TYPE, target)?.update(in_value, out_deriv)?;
        }
        Ok(())
    }

    fn read(&mut self, reader: &mut dyn BufRead, binary: bool) -> Result<()> {
        expect_one_or_two_tokens(reader, binary, &opening_token(Self::TYPE), UpdatableState::FIRST_TOKEN)?;
        let updatable = UpdatableState::read_after_first_token(reader, binary)?;
        expect_token(reader, binary, "<LinearParams>")?;
        let linear_params = read_matrix(reader, binary)?;
        expect_token(reader, binary, "<BiasParams>")?;
        let bias_params = read_f32_vector(reader, binary)?;
        expect_token(reader, binary, &closing_token(Self::TYPE))?;
        if bias_params.len() != linear_params.rows() {
            return Err(Error::format(format!(
                "{}: bias has {} entries but the weights have {} rows",
                Self::TYPE,
                bias_params.len(),
                linear_params.rows()
            )));
        }
        *self = Self {
            updatable,
            linear_params,
            bias_params,
        };
        Ok(())
    }

    fn write(&self, writer: &mut dyn Write, binary: bool) -> Result<()> {
        self.check_configured()?;
        write_token(writer, binary, &opening_token(Self::TYPE))?;
        self.updatable.write(writer, binary)?;
        write_token(writer, binary, "<LinearParams>")?;
        write_matrix(writer, binary, &self.linear_params)?;
        write_token(writer, binary, "<BiasParams>")?;
        write_f32_vector(writer, binary, &self.bias_params)?;
        write_token(writer, binary, &closing_token(Self::TYPE))
    }

    fn copy(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn info(&self) -> String {
        format!(
            "{}, input-dim={}, output-dim={}, {}, linear-params-rms={:.4}, bias-rms={:.4}",
            Self::TYPE,
            self.input_dim(),
            self.output_dim(),
            self.updatable.info(),
            rms(self.linear_params.data()),
            rms(&self.bias_params)
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn updatable_state(&self) -> Option<&UpdatableState> {
        Some(&self.updatable)
    }

    fn updatable_state_mut(&mut self) -> Option<&mut UpdatableState> {
        Some(&mut self.updatable)
    }

    fn set_zero(&mut self, treat_as_gradient: bool) -> Result<()> {
        self.check_configured()?;
        if treat_as_gradient {
            self.updatable.mark_as_gradient();
        }
        self.linear_params.set_zero();
        self.bias_params.iter_mut().for_each(|b| *b = 0.0);
        Ok(())
    }

    fn dot_product(&self, other: &dyn Component) -> Result<f32> {
        self.check_configured()?;
        let other = downcast_same::<AffineComponent>(Self::TYPE, other)?;
        let weights = self.linear_params.dot(&other.linear_params)?;
        Ok((weights + slice_dot(&self.bias_params, &other.bias_params)) as f32)
    }

    fn perturb_params(&mut self, stddev: f32, rng: &mut dyn RngCore) -> Result<()> {
        self.check_configured()?;
        check_stddev(Self::TYPE, stddev)?;
        let noise = random_params(self.output_dim(), self.input_dim(), stddev, rng);
        self.linear_params.add_mat(1.0, &noise, MatrixTranspose::NoTrans)?;
        let bias_noise = random_params(1, self.output_dim(), stddev, rng);
        for (b, n) in self.bias_params.iter_mut().zip(bias_noise.data()) {
            *b += n;
        }
        Ok(())
    }

    fn scale(&mut self, factor: f32) -> Result<()> {
        self.check_configured()?;
        self.linear_params.scale(factor);
        self.bias_params.iter_mut().for_each(|b| *b *= factor);
        Ok(())
    }

    fn add(&mut self, alpha: f32, other: &dyn Component) -> Result<()> {
        self.check_configured()?;
        let other = downcast_same::<AffineComponent>(Self::TYPE, other)?;
        self.linear_params
            .add_mat(alpha, &other.linear_params, MatrixTranspose::NoTrans)?;
        for (b, o) in self.bias_params.iter_mut().zip(&other.bias_params) {
            *b += alpha * o;
        }
        Ok(())
    }

    fn parameter_dim(&self) -> Result<usize> {
        self.check_configured()?;
        Ok(self.linear_params.data().len() + self.bias_params.len())
    }

    fn vectorize(&self, params: &mut [f32]) -> Result<()> {
        let dim = self.parameter_dim()?;
        if params.len() != dim {
            return Err(Error::dimension("AffineComponent::vectorize", &[dim], &[params.len()]));
        }
        let (weights, bias) = params.split_at_mut(self.linear_params.data().len());
        weights.copy_from_slice(self.linear_params.data());
        bias.copy_from_slice(&self.bias_params);
        Ok(())
    }

    fn unvectorize(&mut self, params: &[f32]) -> Result<()> {
        let dim = self.parameter_dim()?;
        if params.len() != dim {
            return Err(Error::dimension("AffineComponent::unvectorize", &[dim], &[params.len()]));
        }
        let (weights, bias) = params.split_at(self.linear_params.data().len());
        self.linear_params.data_mut().copy_from_slice(weights);
        self.bias_params.copy_from_slice(bias);
        Ok(())
    }
}

/// `rows × cols` matrix of zero-mean Gaussian draws with the given stddev.
pub(crate) fn random_params(rows: usize, cols: usize, stddev: f32, rng: &mut dyn RngCore) -> Matrix {
    let mut params = Matrix::new(rows, cols);
    params.set_randn(rng);
    params.scale(stddev);
    params
}

/// Optional non-negative standard deviation key.
pub(crate) fn read_stddev(cfg: &mut ConfigLine, key: &str, default: f32) -> Result<f32> {
    let stddev = cfg.get_f32(key)?.unwrap_or(default);
    if !(stddev >= 0.0) || !stddev.is_finite() {
        return Err(Error::config(format!(
            "{} must be a non-negative number, got {}",
            key, stddev
        )));
    }
    Ok(stddev)
}

pub(crate) fn check_stddev(component: &str, stddev: f32) -> Result<()> {
    if stddev >= 0.0 && stddev.is_finite() {
        Ok(())
    } else {
        Err(Error::state(
            component,
            format!("perturbation stddev must be non-negative, got {}", stddev),
        ))
    }
}

/// `linear += lr · out_derivᵀ · in_value`
pub(crate) fn update_linear_params(
    linear: &mut Matrix,
    learning_rate: f32,
    in_value: &Matrix,
    out_deriv: &Matrix,
) -> Result<()> {
    linear.add_mat_mat(
        learning_rate,
        out_deriv,
        MatrixTranspose::Trans,
        in_value,
        MatrixTranspose::NoTrans,
        1.0,
    )
}

pub(crate) fn rms(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (slice_dot(values, values) / values.len() as f64).sqrt()
}

fn slice_dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}
