//! Logistic sigmoid nonlinearity.

use crate::components::nonlinear::NonlinearStats;
use crate::components::precomputed::ComponentPrecomputedIndexes;
use crate::components::properties::ComponentProperties;
use crate::components::r#trait::{
    check_backprop_shape, check_simple_shapes, closing_token, ensure_configured, opening_token,
    Component,
};
use crate::config::ConfigLine;
use crate::error::{Error, Result};
use crate::io::{expect_one_or_two_tokens, expect_token, write_token};
use crate::matrix::Matrix;
use crate::utils::activations::{sigmoid_derivative_from_output, sigmoid_inplace, sigmoid_into};
use std::any::Any;
use std::io::{BufRead, Write};

/// `y = 1 / (1 + exp(-x))`, element-wise.
///
/// Backprop only needs the forward output, since dy/dx = y(1 - y). When a
/// `to_update` component is given, its statistics receive the output and that
/// derivative.
#[derive(Debug, Clone, Default)]
pub struct SigmoidComponent {
    stats: NonlinearStats,
}

impl SigmoidComponent {
    pub const TYPE: &'static str = "SigmoidComponent";

    pub fn new(dim: usize) -> Self {
        let mut stats = NonlinearStats::default();
        stats.init(dim);
        Self { stats }
    }

    fn check_configured(&self) -> Result<()> {
        ensure_configured(Self::TYPE, self.stats.dim() > 0)
    }

    fn check_cols(&self, what: &str, matrix: &Matrix) -> Result<()> {
        if matrix.cols() != self.stats.dim() {
            return Err(Error::dimension(
                format!("{} {}", Self::TYPE, what),
                &[matrix.rows(), self.stats.dim()],
                &matrix.shape(),
            ));
        }
        Ok(())
    }

    /// y(1 - y) for every element of `out_value`.
    fn derivative(out_value: &Matrix) -> Matrix {
        let mut deriv = Matrix::new(out_value.rows(), out_value.cols());
        sigmoid_derivative_from_output(out_value.data(), deriv.data_mut());
        deriv
    }

    fn store_stats(
        debug_info: &str,
        to_update: Option<&mut dyn Component>,
        out_value: &Matrix,
        deriv: &Matrix,
    ) -> Result<()> {
        let Some(target) = to_update else {
            return Ok(());
        };
        match target.stats() {
            Some(stats) => stats.update_stats(out_value, Some(deriv)),
            None => Err(Error::state(
                debug_info,
                format!("{} cannot hold activation statistics", target.component_type()),
            )),
        }
    }
}

impl Component for SigmoidComponent {
    fn component_type(&self) -> &'static str {
        Self::TYPE
    }

    fn init_from_config(&mut self, cfg: &mut ConfigLine) -> Result<()> {
        self.stats.init_from_config(cfg, Self::TYPE)
    }

    fn input_dim(&self) -> usize {
        self.stats.dim()
    }

    fn output_dim(&self) -> usize {
        self.stats.dim()
    }

    fn properties(&self) -> ComponentProperties {
        ComponentProperties::SIMPLE_COMPONENT
            | ComponentProperties::BACKPROP_NEEDS_OUTPUT
            | ComponentProperties::PROPAGATE_IN_PLACE
            | ComponentProperties::BACKPROP_IN_PLACE
    }

    fn propagate(
        &self,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        input: &Matrix,
        output: &mut Matrix,
    ) -> Result<()> {
        self.check_configured()?;
        check_simple_shapes(self, input, output)?;
        sigmoid_into(input.data(), output.data_mut());
        Ok(())
    }

    fn propagate_in_place(
        &self,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        data: &mut Matrix,
    ) -> Result<()> {
        self.check_configured()?;
        self.check_cols("data", data)?;
        sigmoid_inplace(data.data_mut());
        Ok(())
    }

    fn backprop(
        &self,
        debug_info: &str,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        _in_value: &Matrix,
        out_value: &Matrix,
        out_deriv: &Matrix,
        to_update: Option<&mut dyn Component>,
        in_deriv: Option<&mut Matrix>,
    ) -> Result<()> {
        self.check_configured()?;
        self.check_cols("out_deriv", out_deriv)?;
        check_backprop_shape(debug_info, Self::TYPE, "out_value", out_deriv.shape(), out_value)?;

        let deriv = Self::derivative(out_value);
        if let Some(in_deriv) = in_deriv {
            check_backprop_shape(debug_info, Self::TYPE, "in_deriv", out_deriv.shape(), in_deriv)?;
            for ((dst, &g), &d) in in_deriv
                .data_mut()
                .iter_mut()
                .zip(out_deriv.data())
                .zip(deriv.data())
            {
                *dst = g * d;
            }
        }
        Self::store_stats(debug_info, to_update, out_value, &deriv)
    }

    fn backprop_in_place(
        &self,
        debug_info: &str,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        _in_value: &Matrix,
        out_value: &Matrix,
        deriv: &mut Matrix,
        to_update: Option<&mut dyn Component>,
    ) -> Result<()> {
        self.check_configured()?;
        self.check_cols("deriv", deriv)?;
        check_backprop_shape(debug_info, Self::TYPE, "out_value", deriv.shape(), out_value)?;

        let local = Self::derivative(out_value);
        for (g, &d) in deriv.data_mut().iter_mut().zip(local.data()) {
            *g *= d;
        }
        Self::store_stats(debug_info, to_update, out_value, &local)
    }

    fn read(&mut self, reader: &mut dyn BufRead, binary: bool) -> Result<()> {
        expect_one_or_two_tokens(reader, binary, &opening_token(Self::TYPE), "<Dim>")?;
        self.stats.read_after_dim_token(reader, binary)?;
        expect_token(reader, binary, &closing_token(Self::TYPE))
    }

    fn write(&self, writer: &mut dyn Write, binary: bool) -> Result<()> {
        self.check_configured()?;
        write_token(writer, binary, &opening_token(Self::TYPE))?;
        self.stats.write(writer, binary)?;
        write_token(writer, binary, &closing_token(Self::TYPE))
    }

    fn copy(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn info(&self) -> String {
        format!("{}, {}", Self::TYPE, self.stats.info())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn stats(&self) -> Option<&NonlinearStats> {
        Some(&self.stats)
    }

    fn stats_mut(&mut self) -> Option<&mut NonlinearStats> {
        Some(&mut self.stats)
    }
}
