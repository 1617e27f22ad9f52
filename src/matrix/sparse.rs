//! Host-resident sparse vectors and matrices.

use crate::error::{Error, Result};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

/// One non-zero of a sparse matrix in flat (coordinate) form.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MatrixElement {
    pub row: usize,
    pub column: usize,
    pub value: f32,
}

/// Sparse vector: `(column, value)` pairs in increasing, unique column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseVector {
    dim: usize,
    pairs: Vec<(usize, f32)>,
}

impl SparseVector {
    /// Empty vector of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            pairs: Vec::new(),
        }
    }

    /// Build from unordered pairs. Columns must be unique and below `dim`.
    pub fn from_pairs(dim: usize, mut pairs: Vec<(usize, f32)>) -> Result<Self> {
        pairs.sort_by_key(|&(c, _)| c);
        for window in pairs.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(Error::format(format!(
                    "duplicate column {} in sparse vector",
                    window[0].0
                )));
            }
        }
        if let Some(&(c, _)) = pairs.last() {
            if c >= dim {
                return Err(Error::dimension("SparseVector::from_pairs", &[dim], &[c + 1]));
            }
        }
        Ok(Self { dim, pairs })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_elements(&self) -> usize {
        self.pairs.len()
    }

    pub fn pairs(&self) -> &[(usize, f32)] {
        &self.pairs
    }

    /// Value at `column`, zero when not stored.
    pub fn get(&self, column: usize) -> f32 {
        self.pairs
            .binary_search_by_key(&column, |&(c, _)| c)
            .map_or(0.0, |i| self.pairs[i].1)
    }
}

/// Host sparse matrix stored as one [`SparseVector`] per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseMatrix {
    num_cols: usize,
    rows: Vec<SparseVector>,
}

impl SparseMatrix {
    /// All-zero matrix of the given shape.
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_cols,
            rows: vec![SparseVector::new(num_cols); num_rows],
        }
    }

    /// Build from rows; every row must have dimension `num_cols`.
    pub fn from_rows(num_cols: usize, rows: Vec<SparseVector>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| r.dim() != num_cols) {
            return Err(Error::dimension("SparseMatrix::from_rows", &[num_cols], &[bad.dim()]));
        }
        Ok(Self { num_cols, rows })
    }

    /// Build from `(row, column, value)` triples.
    pub fn from_triples(
        num_rows: usize,
        num_cols: usize,
        triples: &[(usize, usize, f32)],
    ) -> Result<Self> {
        let mut per_row: Vec<Vec<(usize, f32)>> = vec![Vec::new(); num_rows];
        for &(r, c, v) in triples {
            if r >= num_rows {
                return Err(Error::dimension("SparseMatrix::from_triples", &[num_rows], &[r + 1]));
            }
            per_row[r].push((c, v));
        }
        let rows = per_row
            .into_iter()
            .map(|pairs| SparseVector::from_pairs(num_cols, pairs))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { num_cols, rows })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub fn row(&self, r: usize) -> &SparseVector {
        &self.rows[r]
    }

    pub fn num_elements(&self) -> usize {
        self.rows.iter().map(SparseVector::num_elements).sum()
    }

    /// All non-zeros in row-major order.
    pub fn elements(&self) -> impl Iterator<Item = MatrixElement> + '_ {
        self.rows.iter().enumerate().flat_map(|(row, vec)| {
            vec.pairs().iter().map(move |&(column, value)| MatrixElement { row, column, value })
        })
    }

    /// Rebuild from a row-major element list (as produced by [`elements`](Self::elements)).
    pub fn from_elements(num_rows: usize, num_cols: usize, elements: &[MatrixElement]) -> Result<Self> {
        let triples: Vec<_> = elements.iter().map(|e| (e.row, e.column, e.value)).collect();
        Self::from_triples(num_rows, num_cols, &triples)
    }

    /// Keep the shape; each entry becomes zero with probability `zero_prob`,
    /// otherwise a standard-normal draw.
    pub fn set_randn(&mut self, zero_prob: f32, rng: &mut dyn RngCore) -> Result<()> {
        if !(0.0..=1.0).contains(&zero_prob) {
            return Err(Error::config(format!(
                "zero probability must be in [0, 1], got {}",
                zero_prob
            )));
        }
        for row in self.rows.iter_mut() {
            let mut pairs = Vec::new();
            for c in 0..self.num_cols {
                if !rng.random_bool(zero_prob as f64) {
                    pairs.push((c, rng.sample::<f32, _>(StandardNormal)));
                }
            }
            *row = SparseVector {
                dim: self.num_cols,
                pairs,
            };
        }
        Ok(())
    }

    pub(crate) fn swap(&mut self, other: &mut SparseMatrix) {
        std::mem::swap(self, other);
    }
}
