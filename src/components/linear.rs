//! Bias-free linear component that accumulates into its output.

use crate::components::affine::{
    check_stddev, random_params, read_stddev, rms, update_linear_params,
};
use crate::components::precomputed::ComponentPrecomputedIndexes;
use crate::components::properties::ComponentProperties;
use crate::components::r#trait::{
    check_backprop_shape, check_simple_shapes, closing_token, downcast_same, downcast_same_mut,
    ensure_configured, opening_token, Component,
};
use crate::components::updatable::UpdatableState;
use crate::config::ConfigLine;
use crate::error::{Error, Result};
use crate::io::{expect_one_or_two_tokens, expect_token, read_matrix, write_matrix, write_token};
use crate::matrix::{Matrix, MatrixTranspose};
use crate::utils::rng_from_config;
use rand::RngCore;
use std::any::Any;
use std::io::{BufRead, Write};

/// `y += x Wᵀ` with W of shape `output_dim × input_dim`.
///
/// Propagate adds to the existing output, so several linear components can
/// sum into one buffer. Zero the output first (or use
/// [`propagate_to_new`](Component::propagate_to_new)) for a plain product.
#[derive(Debug, Clone, Default)]
pub struct LinearComponent {
    updatable: UpdatableState,
    params: Matrix,
}

impl LinearComponent {
    pub const TYPE: &'static str = "LinearComponent";

    pub fn new(
        input_dim: usize,
        output_dim: usize,
        param_stddev: f32,
        learning_rate: f32,
        rng: &mut dyn RngCore,
    ) -> Self {
        Self {
            updatable: UpdatableState::new(learning_rate),
            params: random_params(output_dim, input_dim, param_stddev, rng),
        }
    }

    pub fn from_params(params: Matrix, learning_rate: f32) -> Self {
        Self {
            updatable: UpdatableState::new(learning_rate),
            params,
        }
    }

    pub fn params(&self) -> &Matrix {
        &self.params
    }

    fn check_configured(&self) -> Result<()> {
        ensure_configured(Self::TYPE, !self.params.is_empty())
    }
}

impl Component for LinearComponent {
    fn component_type(&self) -> &'static str {
        Self::TYPE
    }

    fn init_from_config(&mut self, cfg: &mut ConfigLine) -> Result<()> {
        let input_dim = cfg.require_dim("input-dim", Self::TYPE)?;
        let output_dim = cfg.require_dim("output-dim", Self::TYPE)?;
        let param_stddev = read_stddev(cfg, "param-stddev", 1.0 / (input_dim as f32).sqrt())?;
        let mut updatable = UpdatableState::default();
        updatable.init_from_config(cfg)?;
        let mut rng = rng_from_config(cfg)?;
        *self = Self::new(input_dim, output_dim, param_stddev, updatable.learning_rate(), &mut rng);
        Ok(())
    }

    fn input_dim(&self) -> usize {
        self.params.cols()
    }

    fn output_dim(&self) -> usize {
        self.params.rows()
    }

    fn properties(&self) -> ComponentProperties {
        ComponentProperties::SIMPLE_COMPONENT
            | ComponentProperties::UPDATABLE_COMPONENT
            | ComponentProperties::LINEAR_IN_INPUT
            | ComponentProperties::LINEAR_IN_PARAMETERS
            | ComponentProperties::BACKPROP_NEEDS_INPUT
            | ComponentProperties::PROPAGATE_ADDS
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
        output.add_mat_mat(
            1.0,
            input,
            MatrixTranspose::NoTrans,
            &self.params,
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
                &self.params,
                MatrixTranspose::NoTrans,
                1.0,
            )?;
        }
        if let Some(target) = to_update {
            check_backprop_shape(debug_info, Self::TYPE, "in_value", [rows, self.input_dim()], in_value)?;
            let target = downcast_same_mut::<LinearComponent>(Self::TYPE, target)?;
            let lr = target.updatable.learning_rate();
            update_linear_params(&mut target.params, lr, in_value, out_deriv)?;
        }
        Ok(())
    }

    fn read(&mut self, reader: &mut dyn BufRead, binary: bool) -> Result<()> {
        expect_one_or_two_tokens(reader, binary, &opening_token(Self::TYPE), UpdatableState::FIRST_TOKEN)?;
        let updatable = UpdatableState::read_after_first_token(reader, binary)?;
        expect_token(reader, binary, "<Params>")?;
        let params = read_matrix(reader, binary)?;
        expect_token(reader, binary, &closing_token(Self::TYPE))?;
        *self = Self { updatable, params };
        Ok(())
    }

    fn write(&self, writer: &mut dyn Write, binary: bool) -> Result<()> {
        self.check_configured()?;
        write_token(writer, binary, &opening_token(Self::TYPE))?;
        self.updatable.write(writer, binary)?;
        write_token(writer, binary, "<Params>")?;
        write_matrix(writer, binary, &self.params)?;
        write_token(writer, binary, &closing_token(Self::TYPE))
    }

    fn copy(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn info(&self) -> String {
        format!(
            "{}, input-dim={}, output-dim={}, {}, params-rms={:.4}",
            Self::TYPE,
            self.input_dim(),
            self.output_dim(),
            self.updatable.info(),
            rms(self.params.data())
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
        self.params.set_zero();
        Ok(())
    }

    fn dot_product(&self, other: &dyn Component) -> Result<f32> {
        self.check_configured()?;
        let other = downcast_same::<LinearComponent>(Self::TYPE, other)?;
        Ok(self.params.dot(&other.params)? as f32)
    }

    fn perturb_params(&mut self, stddev: f32, rng: &mut dyn RngCore) -> Result<()> {
        self.check_configured()?;
        check_stddev(Self::TYPE, stddev)?;
        let noise = random_params(self.output_dim(), self.input_dim(), stddev, rng);
        self.params.add_mat(1.0, &noise, MatrixTranspose::NoTrans)
    }

    fn scale(&mut self, factor: f32) -> Result<()> {
        self.check_configured()?;
        self.params.scale(factor);
        Ok(())
    }

    fn add(&mut self, alpha: f32, other: &dyn Component) -> Result<()> {
        self.check_configured()?;
        let other = downcast_same::<LinearComponent>(Self::TYPE, other)?;
        self.params.add_mat(alpha, &other.params, MatrixTranspose::NoTrans)
    }

    fn parameter_dim(&self) -> Result<usize> {
        self.check_configured()?;
        Ok(self.params.data().len())
    }

    fn vectorize(&self, params: &mut [f32]) -> Result<()> {
        let dim = self.parameter_dim()?;
        if params.len() != dim {
            return Err(Error::dimension("LinearComponent::vectorize", &[dim], &[params.len()]));
        }
        params.copy_from_slice(self.params.data());
        Ok(())
    }

    fn unvectorize(&mut self, params: &[f32]) -> Result<()> {
        let dim = self.parameter_dim()?;
        if params.len() != dim {
            return Err(Error::dimension("LinearComponent::unvectorize", &[dim], &[params.len()]));
        }
        self.params.data_mut().copy_from_slice(params);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> LinearComponent {
        let params = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        LinearComponent::from_params(params, 0.1)
    }

    #[test]
    fn test_propagate_accumulates() {
        let linear = two_by_two();
        let input = Matrix::from_rows(&[vec![1.0, 1.0]]).unwrap();
        let mut output = Matrix::new(1, 2);
        linear.propagate(None, &input, &mut output).unwrap();
        assert_eq!(output.row(0), &[3.0, 7.0]);
        linear.propagate(None, &input, &mut output).unwrap();
        assert_eq!(output.row(0), &[6.0, 14.0]);
    }

    #[test]
    fn test_set_zero_as_gradient() {
        let mut linear = two_by_two();
        linear.set_zero(true).unwrap();
        assert!(linear.is_gradient());
        assert_eq!(linear.learning_rate(), Some(1.0));
        assert!(linear.params().data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vectorize_layout_is_row_major() {
        let linear = two_by_two();
        let mut flat = vec![0.0; 4];
        linear.vectorize(&mut flat).unwrap();
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(linear.vectorize(&mut [0.0; 3]).is_err());
    }
}
