//! Dense row-major matrices.
//!
//! This is the rectangular-buffer collaborator the component interface is
//! written against: copy, scale, add and multiply with transpose flags. Data is
//! stored flat in row-major order, the same layout the layers use for
//! `batch_size × features` buffers.

use crate::error::{Error, Result};
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

/// Whether an operand is used as-is or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixTranspose {
    #[default]
    NoTrans,
    Trans,
}

/// Row-major `f32` matrix.
///
/// Each row is one logical sample (one `Index`), each column one feature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Create a zero-filled matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0f32; rows * cols],
        }
    }

    /// Create a matrix with every element set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Wrap row-major data, checking that it matches the shape.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(Error::dimension(
                "Matrix::from_vec",
                &[rows, cols],
                &[data.len()],
            ));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from equally sized rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(Error::dimension("Matrix::from_rows", &[cols], &[row.len()]));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `[rows, cols]`, handy for error reporting.
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f32] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, value: f32) {
        self.data[r * self.cols + c] = value;
    }

    pub fn set_zero(&mut self) {
        self.data.iter_mut().for_each(|v| *v = 0.0);
    }

    pub fn scale(&mut self, alpha: f32) {
        self.data.iter_mut().for_each(|v| *v *= alpha);
    }

    /// Fill with independent standard-normal draws.
    pub fn set_randn(&mut self, rng: &mut dyn RngCore) {
        for v in self.data.iter_mut() {
            *v = StandardNormal.sample(rng);
        }
    }

    fn check_same_shape(&self, other: &Matrix, context: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::dimension(context, &self.shape(), &other.shape()));
        }
        Ok(())
    }

    pub fn copy_from(&mut self, other: &Matrix) -> Result<()> {
        self.check_same_shape(other, "Matrix::copy_from")?;
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// `self += alpha * op(other)`.
    pub fn add_mat(&mut self, alpha: f32, other: &Matrix, trans: MatrixTranspose) -> Result<()> {
        match trans {
            MatrixTranspose::NoTrans => {
                self.check_same_shape(other, "Matrix::add_mat")?;
                for (dst, &src) in self.data.iter_mut().zip(&other.data) {
                    *dst += alpha * src;
                }
            }
            MatrixTranspose::Trans => {
                if self.shape() != [other.cols, other.rows] {
                    return Err(Error::dimension(
                        "Matrix::add_mat (transposed)",
                        &self.shape(),
                        &[other.cols, other.rows],
                    ));
                }
                for r in 0..self.rows {
                    for c in 0..self.cols {
                        self.data[r * self.cols + c] += alpha * other.get(c, r);
                    }
                }
            }
        }
        Ok(())
    }

    /// `self = beta * self + alpha * op(a) * op(b)`.
    pub fn add_mat_mat(
        &mut self,
        alpha: f32,
        a: &Matrix,
        trans_a: MatrixTranspose,
        b: &Matrix,
        trans_b: MatrixTranspose,
        beta: f32,
    ) -> Result<()> {
        let (a_rows, a_cols) = match trans_a {
            MatrixTranspose::NoTrans => (a.rows, a.cols),
            MatrixTranspose::Trans => (a.cols, a.rows),
        };
        let (b_rows, b_cols) = match trans_b {
            MatrixTranspose::NoTrans => (b.rows, b.cols),
            MatrixTranspose::Trans => (b.cols, b.rows),
        };
        if a_cols != b_rows || self.rows != a_rows || self.cols != b_cols {
            return Err(Error::dimension(
                "Matrix::add_mat_mat",
                &[self.rows, a_cols, self.cols],
                &[a_rows, b_rows, b_cols],
            ));
        }
        let a_at = |i: usize, k: usize| match trans_a {
            MatrixTranspose::NoTrans => a.get(i, k),
            MatrixTranspose::Trans => a.get(k, i),
        };
        let b_at = |k: usize, j: usize| match trans_b {
            MatrixTranspose::NoTrans => b.get(k, j),
            MatrixTranspose::Trans => b.get(j, k),
        };
        for i in 0..self.rows {
            for j in 0..self.cols {
                let mut sum = 0.0f32;
                for k in 0..a_cols {
                    sum += a_at(i, k) * b_at(k, j);
                }
                let dst = &mut self.data[i * self.cols + j];
                *dst = beta * *dst + alpha * sum;
            }
        }
        Ok(())
    }

    /// Add `alpha * vec` to every row.
    pub fn add_vec_to_rows(&mut self, alpha: f32, vec: &[f32]) -> Result<()> {
        if vec.len() != self.cols {
            return Err(Error::dimension("Matrix::add_vec_to_rows", &[self.cols], &[vec.len()]));
        }
        for row in self.data.chunks_exact_mut(self.cols.max(1)) {
            for (dst, &v) in row.iter_mut().zip(vec) {
                *dst += alpha * v;
            }
        }
        Ok(())
    }

    /// Per-column sums over all rows, accumulated in double precision.
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0f64; self.cols];
        for r in 0..self.rows {
            for (sum, &v) in sums.iter_mut().zip(self.row(r)) {
                *sum += v as f64;
            }
        }
        sums
    }

    /// Sum of element-wise products (the Frobenius inner product).
    pub fn dot(&self, other: &Matrix) -> Result<f64> {
        self.check_same_shape(other, "Matrix::dot")?;
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum())
    }
}
