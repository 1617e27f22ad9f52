//! Learning-rate and gradient-mode state shared by components with parameters.

use crate::config::ConfigLine;
use crate::error::{Error, Result};
use crate::io::{expect_token, read_bool, read_f32, write_bool, write_f32, write_token};
use std::io::{BufRead, Write};

/// Learning rate used when a config line does not give one.
pub const DEFAULT_LEARNING_RATE: f32 = 0.001;

/// State every updatable component carries next to its parameters.
///
/// When `is_gradient` is set the component holds a gradient rather than
/// parameter values, which disables any gradient preconditioning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdatableState {
    learning_rate: f32,
    is_gradient: bool,
}

impl Default for UpdatableState {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_RATE)
    }
}

impl UpdatableState {
    /// Token that starts the serialized fields.
    pub const FIRST_TOKEN: &'static str = "<LearningRate>";

    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            is_gradient: false,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    pub fn is_gradient(&self) -> bool {
        self.is_gradient
    }

    /// Switch to gradient mode: `is_gradient = true`, learning rate 1.
    pub fn mark_as_gradient(&mut self) {
        self.is_gradient = true;
        self.learning_rate = 1.0;
    }

    /// Consumes the optional `learning-rate` key.
    pub fn init_from_config(&mut self, cfg: &mut ConfigLine) -> Result<()> {
        let learning_rate = cfg.get_f32("learning-rate")?.unwrap_or(DEFAULT_LEARNING_RATE);
        if !(learning_rate >= 0.0) {
            return Err(Error::config(format!(
                "learning-rate must be non-negative, got {}",
                learning_rate
            )));
        }
        *self = Self::new(learning_rate);
        Ok(())
    }

    pub fn write<W: Write + ?Sized>(&self, writer: &mut W, binary: bool) -> Result<()> {
        write_token(writer, binary, Self::FIRST_TOKEN)?;
        write_f32(writer, binary, self.learning_rate)?;
        write_token(writer, binary, "<IsGradient>")?;
        write_bool(writer, binary, self.is_gradient)
    }

    /// Reads the fields that follow [`FIRST_TOKEN`](Self::FIRST_TOKEN), which the
    /// caller has already consumed.
    pub fn read_after_first_token<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<Self> {
        let learning_rate = read_f32(reader, binary)?;
        expect_token(reader, binary, "<IsGradient>")?;
        let is_gradient = read_bool(reader, binary)?;
        Ok(Self {
            learning_rate,
            is_gradient,
        })
    }

    pub fn info(&self) -> String {
        if self.is_gradient {
            format!("learning-rate={}, is-gradient=true", self.learning_rate)
        } else {
            format!("learning-rate={}", self.learning_rate)
        }
    }
}
