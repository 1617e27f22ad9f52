//! Pass-through nonlinearity.
//!
//! Useful as a placeholder in a network and for collecting activation
//! statistics at a point where no real nonlinearity is wanted.

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
use std::any::Any;
use std::io::{BufRead, Write};

/// `y = x`, element-wise, with activation statistics.
#[derive(Debug, Clone, Default)]
pub struct IdentityNonlinearity {
    stats: NonlinearStats,
}

impl IdentityNonlinearity {
    pub const TYPE: &'static str = "IdentityNonlinearity";

    /// Configured instance of dimension `dim`.
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
}

impl Component for IdentityNonlinearity {
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
            | ComponentProperties::LINEAR_IN_INPUT
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
        output.copy_from(input)
    }

    fn propagate_in_place(
        &self,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        data: &mut Matrix,
    ) -> Result<()> {
        self.check_configured()?;
        self.check_cols("data", data)
    }

    fn backprop(
        &self,
        debug_info: &str,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        _in_value: &Matrix,
        _out_value: &Matrix,
        out_deriv: &Matrix,
        _to_update: Option<&mut dyn Component>,
        in_deriv: Option<&mut Matrix>,
    ) -> Result<()> {
        self.check_configured()?;
        self.check_cols("out_deriv", out_deriv)?;
        if let Some(in_deriv) = in_deriv {
            check_backprop_shape(debug_info, Self::TYPE, "in_deriv", out_deriv.shape(), in_deriv)?;
            in_deriv.copy_from(out_deriv)?;
        }
        Ok(())
    }

    fn backprop_in_place(
        &self,
        _debug_info: &str,
        _indexes: Option<&dyn ComponentPrecomputedIndexes>,
        _in_value: &Matrix,
        _out_value: &Matrix,
        deriv: &mut Matrix,
        _to_update: Option<&mut dyn Component>,
    ) -> Result<()> {
        self.check_configured()?;
        self.check_cols("deriv", deriv)
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
