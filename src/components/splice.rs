//! Frame splicing: each output row is the concatenation of several
//! time-shifted input rows.
//!
//! This is the one component here that is not simple. The output row for
//! index `(n, t, x)` with context `[-1, 0, 1]` holds the input rows for
//! `(n, t-1, x)`, `(n, t, x)` and `(n, t+1, x)` side by side, so the
//! component has to map logical indexes to physical rows before it can
//! compute anything. That mapping is built once per layout by
//! `precompute_indexes`.

use crate::components::index::{Index, MiscComputationInfo};
use crate::components::precomputed::ComponentPrecomputedIndexes;
use crate::components::properties::ComponentProperties;
use crate::components::r#trait::{closing_token, ensure_configured, opening_token, Component};
use crate::config::ConfigLine;
use crate::error::{Error, Result};
use crate::io::{
    expect_one_or_two_tokens, expect_token, read_i32, read_usize, write_i32, write_token,
    write_usize,
};
use crate::matrix::Matrix;
use std::any::Any;
use std::collections::HashMap;
use std::io::{BufRead, Write};

/// Physical input row for every (output row, context offset) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceIndexes {
    num_input_rows: usize,
    num_output_rows: usize,
    context: Vec<i32>,
    source_rows: Vec<usize>,
}

impl SpliceIndexes {
    /// Input row copied into slot `offset_pos` of `output_row`.
    pub fn source_row(&self, output_row: usize, offset_pos: usize) -> usize {
        self.source_rows[output_row * self.context.len() + offset_pos]
    }
}

impl ComponentPrecomputedIndexes for SpliceIndexes {
    fn num_input_rows(&self) -> usize {
        self.num_input_rows
    }

    fn num_output_rows(&self) -> usize {
        self.num_output_rows
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Concatenates input frames at fixed time offsets.
///
/// Output dimension is `input_dim × context.len()`. Offsets are kept sorted
/// and must be distinct.
#[derive(Debug, Clone, Default)]
pub struct SpliceComponent {
    input_dim: usize,
    context: Vec<i32>,
}

impl SpliceComponent {
    pub const TYPE: &'static str = "SpliceComponent";

    pub fn new(input_dim: usize, context: Vec<i32>) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::config(format!("{}: input-dim must be greater than 0", Self::TYPE)));
        }
        Ok(Self {
            input_dim,
            context: normalize_context(context)?,
        })
    }

    /// Sorted time offsets.
    pub fn context(&self) -> &[i32] {
        &self.context
    }

    fn check_configured(&self) -> Result<()> {
        ensure_configured(Self::TYPE, self.input_dim > 0 && !self.context.is_empty())
    }

    /// Downcast `indexes` and check it was built for this row layout.
    fn layout<'a>(
        &self,
        indexes: Option<&'a dyn ComponentPrecomputedIndexes>,
        num_input_rows: Option<usize>,
        num_output_rows: usize,
    ) -> Result<&'a SpliceIndexes> {
        let indexes = indexes.ok_or_else(|| {
            Error::state(Self::TYPE, "precomputed indexes are required but none were given")
        })?;
        let layout = indexes.as_any().downcast_ref::<SpliceIndexes>().ok_or_else(|| {
            Error::state(Self::TYPE, "precomputed indexes belong to another component type")
        })?;
        if layout.context != self.context {
            return Err(Error::state(
                Self::TYPE,
                format!(
                    "precomputed indexes were built for context {:?}, this component has {:?}",
                    layout.context, self.context
                ),
            ));
        }
        let input_ok = num_input_rows.map_or(true, |rows| rows == layout.num_input_rows);
        if !input_ok || num_output_rows != layout.num_output_rows {
            return Err(Error::state(
                Self::TYPE,
                format!(
                    "precomputed indexes were built for {} input and {} output rows, got {:?} and {}",
                    layout.num_input_rows, layout.num_output_rows, num_input_rows, num_output_rows
                ),
            ));
        }
        Ok(layout)
    }

    fn check_cols(&self, what: &str, matrix: &Matrix, expected: usize) -> Result<()> {
        if matrix.cols() != expected {
            return Err(Error::dimension(
                format!("{} {}", Self::TYPE, what),
                &[matrix.rows(), expected],
                &matrix.shape(),
            ));
        }
        Ok(())
    }
}

fn normalize_context(mut context: Vec<i32>) -> Result<Vec<i32>> {
    if context.is_empty() {
        return Err(Error::config(format!("{}: context must not be empty", SpliceComponent::TYPE)));
    }
    context.sort_unstable();
    if let Some(pair) = context.windows(2).find(|w| w[0] == w[1]) {
        return Err(Error::config(format!(
            "{}: context offset {} appears more than once",
            SpliceComponent::TYPE,
            pair[0]
        )));
    }
    Ok(context)
}

impl Component for SpliceComponent {
    fn component_type(&self) -> &'static str {
        Self::TYPE
    }

    fn init_from_config(&mut self, cfg: &mut ConfigLine) -> Result<()> {
        let input_dim = cfg.require_dim("input-dim", Self::TYPE)?;
        let context = cfg
            .get_i32_list("context")?
            .ok_or_else(|| Error::config(format!("{}: missing required key 'context'", Self::TYPE)))?;
        *self = Self::new(input_dim, context)?;
        Ok(())
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn output_dim(&self) -> usize {
        self.input_dim * self.context.len()
    }

    fn properties(&self) -> ComponentProperties {
        ComponentProperties::LINEAR_IN_INPUT | ComponentProperties::BACKPROP_ADDS
    }

    /// Frames whose time would overflow are left out; no input can carry them.
    fn get_input_indexes(&self, _misc_info: &MiscComputationInfo, output_index: &Index) -> Vec<Index> {
        self.context
            .iter()
            .filter_map(|&offset| output_index.with_time_offset(offset))
            .collect()
    }

    fn precompute_indexes(
        &self,
        _misc_info: &MiscComputationInfo,
        input_indexes: &[Index],
        output_indexes: &[Index],
        _need_backprop: bool,
    ) -> Result<Option<Box<dyn ComponentPrecomputedIndexes>>> {
        self.check_configured()?;
        let mut row_of: HashMap<Index, usize> = HashMap::with_capacity(input_indexes.len());
        for (row, index) in input_indexes.iter().enumerate() {
            if row_of.insert(*index, row).is_some() {
                return Err(Error::state(
                    Self::TYPE,
                    format!("input index {} appears more than once", index),
                ));
            }
        }

        let mut source_rows = Vec::with_capacity(output_indexes.len() * self.context.len());
        for output_index in output_indexes {
            for &offset in &self.context {
                let needed = output_index.with_time_offset(offset).ok_or_else(|| {
                    Error::state(
                        Self::TYPE,
                        format!("time offset {} overflows output index {}", offset, output_index),
                    )
                })?;
                let row = row_of.get(&needed).copied().ok_or_else(|| {
                    Error::state(
                        Self::TYPE,
                        format!("input index {} needed for output {} is missing", needed, output_index),
                    )
                })?;
                source_rows.push(row);
            }
        }
        tracing::trace!(
            num_input_rows = input_indexes.len(),
            num_output_rows = output_indexes.len(),
            "precomputed splice indexes"
        );
        Ok(Some(Box::new(SpliceIndexes {
            num_input_rows: input_indexes.len(),
            num_output_rows: output_indexes.len(),
            context: self.context.clone(),
            source_rows,
        })))
    }

    fn propagate(
        &self,
        indexes: Option<&dyn ComponentPrecomputedIndexes>,
        input: &Matrix,
        output: &mut Matrix,
    ) -> Result<()> {
        self.check_configured()?;
        let layout = self.layout(indexes, Some(input.rows()), output.rows())?;
        self.check_cols("input", input, self.input_dim)?;
        self.check_cols("output", output, self.output_dim())?;
        let dim = self.input_dim;
        for o in 0..output.rows() {
            for (k, slot) in output.row_mut(o).chunks_exact_mut(dim).enumerate() {
                slot.copy_from_slice(input.row(layout.source_row(o, k)));
            }
        }
        Ok(())
    }

    fn backprop(
        &self,
        _debug_info: &str,
        indexes: Option<&dyn ComponentPrecomputedIndexes>,
        _in_value: &Matrix,
        _out_value: &Matrix,
        out_deriv: &Matrix,
        _to_update: Option<&mut dyn Component>,
        in_deriv: Option<&mut Matrix>,
    ) -> Result<()> {
        self.check_configured()?;
        let num_input_rows = in_deriv.as_deref().map(Matrix::rows);
        let layout = self.layout(indexes, num_input_rows, out_deriv.rows())?;
        self.check_cols("out_deriv", out_deriv, self.output_dim())?;
        let Some(in_deriv) = in_deriv else {
            return Ok(());
        };
        self.check_cols("in_deriv", in_deriv, self.input_dim)?;
        let dim = self.input_dim;
        for o in 0..out_deriv.rows() {
            for (k, slot) in out_deriv.row(o).chunks_exact(dim).enumerate() {
                let dst = in_deriv.row_mut(layout.source_row(o, k));
                for (d, &g) in dst.iter_mut().zip(slot) {
                    *d += g;
                }
            }
        }
        Ok(())
    }

    fn read(&mut self, reader: &mut dyn BufRead, binary: bool) -> Result<()> {
        expect_one_or_two_tokens(reader, binary, &opening_token(Self::TYPE), "<InputDim>")?;
        let input_dim = read_usize(reader, binary)?;
        expect_token(reader, binary, "<Context>")?;
        let len = read_usize(reader, binary)?;
        let context = (0..len)
            .map(|_| read_i32(reader, binary))
            .collect::<Result<Vec<_>>>()?;
        expect_token(reader, binary, &closing_token(Self::TYPE))?;
        *self = Self::new(input_dim, context).map_err(|e| Error::format(e.to_string()))?;
        Ok(())
    }

    fn write(&self, writer: &mut dyn Write, binary: bool) -> Result<()> {
        self.check_configured()?;
        write_token(writer, binary, &opening_token(Self::TYPE))?;
        write_token(writer, binary, "<InputDim>")?;
        write_usize(writer, binary, self.input_dim)?;
        write_token(writer, binary, "<Context>")?;
        write_usize(writer, binary, self.context.len())?;
        for &offset in &self.context {
            write_i32(writer, binary, offset)?;
        }
        write_token(writer, binary, &closing_token(Self::TYPE))
    }

    fn copy(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn info(&self) -> String {
        format!(
            "{}, input-dim={}, output-dim={}, context={:?}",
            Self::TYPE,
            self.input_dim,
            self.output_dim(),
            self.context
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(ts: std::ops::Range<i32>) -> Vec<Index> {
        ts.map(|t| Index::new(0, t, 0)).collect()
    }

    #[test]
    fn test_context_is_sorted_and_distinct() {
        let splice = SpliceComponent::new(2, vec![1, -1, 0]).unwrap();
        assert_eq!(splice.context(), &[-1, 0, 1]);
        assert_eq!(splice.output_dim(), 6);
        assert!(SpliceComponent::new(2, vec![0, 0]).is_err());
        assert!(SpliceComponent::new(2, vec![]).is_err());
    }

    #[test]
    fn test_get_input_indexes_shifts_time() {
        let splice = SpliceComponent::new(1, vec![-2, 0]).unwrap();
        let needed = splice.get_input_indexes(&MiscComputationInfo::default(), &Index::new(3, 10, 1));
        assert_eq!(needed, vec![Index::new(3, 8, 1), Index::new(3, 10, 1)]);
    }

    #[test]
    fn test_missing_input_index_is_state_error() {
        let splice = SpliceComponent::new(1, vec![-1, 0, 1]).unwrap();
        let misc = MiscComputationInfo::default();
        let result = splice.precompute_indexes(&misc, &frames(0..3), &frames(0..3), false);
        assert!(matches!(result, Err(Error::State { .. })));
    }

    #[test]
    fn test_propagate_without_indexes_is_state_error() {
        let splice = SpliceComponent::new(1, vec![0]).unwrap();
        let mut output = Matrix::new(1, 1);
        let result = splice.propagate(None, &Matrix::new(1, 1), &mut output);
        assert!(matches!(result, Err(Error::State { .. })));
    }

    #[test]
    fn test_splice_propagate_and_backprop() {
        let splice = SpliceComponent::new(1, vec![-1, 1]).unwrap();
        let misc = MiscComputationInfo::default();
        let indexes = splice
            .precompute_indexes(&misc, &frames(0..4), &frames(1..3), true)
            .unwrap()
            .unwrap();

        let input = Matrix::from_rows(&[vec![10.0], vec![11.0], vec![12.0], vec![13.0]]).unwrap();
        let mut output = Matrix::new(2, 2);
        splice.propagate(Some(indexes.as_ref()), &input, &mut output).unwrap();
        assert_eq!(output.row(0), &[10.0, 12.0]);
        assert_eq!(output.row(1), &[11.0, 13.0]);

        let out_deriv = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let mut in_deriv = Matrix::filled(4, 1, 0.5);
        splice
            .backprop(
                "splice",
                Some(indexes.as_ref()),
                &input,
                &output,
                &out_deriv,
                None,
                Some(&mut in_deriv),
            )
            .unwrap();
        assert_eq!(in_deriv.data(), &[1.5, 3.5, 2.5, 4.5]);
    }

    #[test]
    fn test_time_overflow_is_state_error() {
        let splice = SpliceComponent::new(1, vec![0, 1]).unwrap();
        let misc = MiscComputationInfo::default();
        let edge = [Index::new(0, i32::MAX, 0)];
        assert_eq!(splice.get_input_indexes(&misc, &edge[0]), edge.to_vec());
        let result = splice.precompute_indexes(&misc, &edge, &edge, false);
        assert!(matches!(result, Err(Error::State { .. })));
    }

    #[test]
    fn test_indexes_from_other_context_are_rejected() {
        let misc = MiscComputationInfo::default();
        let built_for = SpliceComponent::new(1, vec![-1, 1]).unwrap();
        let indexes = built_for
            .precompute_indexes(&misc, &frames(0..4), &frames(1..3), false)
            .unwrap()
            .unwrap();

        let other = SpliceComponent::new(1, vec![0, 2]).unwrap();
        let input = Matrix::new(4, 1);
        let mut output = Matrix::new(2, 2);
        let result = other.propagate(Some(indexes.as_ref()), &input, &mut output);
        assert!(matches!(result, Err(Error::State { .. })));

        let result = other.backprop(
            "splice",
            Some(indexes.as_ref()),
            &input,
            &output,
            &Matrix::new(2, 2),
            None,
            Some(&mut Matrix::new(4, 1)),
        );
        assert!(matches!(result, Err(Error::State { .. })));
    }

    #[test]
    fn test_stale_layout_is_state_error() {
        let splice = SpliceComponent::new(1, vec![0]).unwrap();
        let misc = MiscComputationInfo::default();
        let indexes = splice
            .precompute_indexes(&misc, &frames(0..3), &frames(0..3), false)
            .unwrap()
            .unwrap();
        let mut output = Matrix::new(2, 1);
        let result = splice.propagate(Some(indexes.as_ref()), &Matrix::new(2, 1), &mut output);
        assert!(matches!(result, Err(Error::State { .. })));
    }
}
