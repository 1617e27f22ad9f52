//! Sparse matrix that can live on the host or on the accelerator.
//!
//! On the host the data is kept as one sparse vector per row. On the device it
//! is a single flat list of `(row, column, value)` elements, which suits kernels
//! that process all non-zeros in one launch. The representation is chosen when
//! the matrix is constructed and every copy between instances is deep.

use crate::error::{Error, Result};
use crate::io::{
    expect_token, read_f32, read_usize, write_f32, write_token, write_usize, MAX_PREALLOCATED,
};
use crate::matrix::dense::{Matrix, MatrixTranspose};
use crate::matrix::device_array::DeviceArray;
use crate::matrix::sparse::{MatrixElement, SparseMatrix, SparseVector};
use rand::RngCore;
use std::io::{BufRead, Write};

/// Where a [`DeviceSparseMatrix`] keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Residency {
    /// Row lists in host memory
    #[default]
    Host,
    /// Flat element list in accelerator memory
    Device,
}

#[derive(Debug, Clone, PartialEq)]
enum SparseStorage {
    Host(SparseMatrix),
    Device {
        num_rows: usize,
        num_cols: usize,
        elements: DeviceArray<MatrixElement>,
    },
}

/// Sparse matrix with an explicit host or device representation.
///
/// # Example
///
/// ```
/// use rust_nnet_components::matrix::{DeviceSparseMatrix, Residency, SparseMatrix};
///
/// let host = SparseMatrix::from_triples(2, 3, &[(0, 0, 1.5), (1, 2, -3.0)]).unwrap();
/// let on_device = DeviceSparseMatrix::from_host(&host, Residency::Device);
/// assert_eq!(on_device.num_elements(), 2);
/// assert_eq!(on_device.to_host().unwrap(), host);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSparseMatrix {
    storage: SparseStorage,
}

impl DeviceSparseMatrix {
    /// Empty `0 × 0` matrix with the given residency.
    pub fn new(residency: Residency) -> Self {
        let storage = match residency {
            Residency::Host => SparseStorage::Host(SparseMatrix::default()),
            Residency::Device => SparseStorage::Device {
                num_rows: 0,
                num_cols: 0,
                elements: DeviceArray::new(),
            },
        };
        Self { storage }
    }

    /// Deep copy of a host matrix into the given residency.
    pub fn from_host(smat: &SparseMatrix, residency: Residency) -> Self {
        let mut out = Self::new(residency);
        out.assign_from_host(smat);
        out
    }

    /// Keep the non-zero entries of a dense matrix.
    pub fn from_dense(dense: &Matrix, residency: Residency) -> Self {
        let mut triples = Vec::new();
        for r in 0..dense.rows() {
            for (c, &v) in dense.row(r).iter().enumerate() {
                if v != 0.0 {
                    triples.push((r, c, v));
                }
            }
        }
        // Triples come from a valid dense shape, so construction cannot fail.
        let host = SparseMatrix::from_triples(dense.rows(), dense.cols(), &triples)
            .unwrap_or_else(|_| SparseMatrix::new(dense.rows(), dense.cols()));
        Self::from_host(&host, residency)
    }

    pub fn residency(&self) -> Residency {
        match self.storage {
            SparseStorage::Host(_) => Residency::Host,
            SparseStorage::Device { .. } => Residency::Device,
        }
    }

    pub fn num_rows(&self) -> usize {
        match &self.storage {
            SparseStorage::Host(m) => m.num_rows(),
            SparseStorage::Device { num_rows, .. } => *num_rows,
        }
    }

    pub fn num_cols(&self) -> usize {
        match &self.storage {
            SparseStorage::Host(m) => m.num_cols(),
            SparseStorage::Device { num_cols, .. } => *num_cols,
        }
    }

    pub fn num_elements(&self) -> usize {
        match &self.storage {
            SparseStorage::Host(m) => m.num_elements(),
            SparseStorage::Device { elements, .. } => elements.len(),
        }
    }

    /// Replace the contents with a deep copy of `smat`, flattening the rows
    /// when device-resident.
    pub fn assign_from_host(&mut self, smat: &SparseMatrix) {
        self.storage = match self.residency() {
            Residency::Host => SparseStorage::Host(smat.clone()),
            Residency::Device => SparseStorage::Device {
                num_rows: smat.num_rows(),
                num_cols: smat.num_cols(),
                elements: smat.elements().collect(),
            },
        };
    }

    /// Replace the contents with a deep copy of `other`, converted to this
    /// matrix's residency.
    pub fn assign_from_device(&mut self, other: &DeviceSparseMatrix) -> Result<()> {
        if self.residency() == other.residency() {
            self.storage = other.storage.clone();
            return Ok(());
        }
        match &other.storage {
            SparseStorage::Host(m) => self.assign_from_host(m),
            SparseStorage::Device { .. } => {
                self.storage = SparseStorage::Host(other.to_host()?);
            }
        }
        Ok(())
    }

    /// Copy back into host row-list form.
    pub fn to_host(&self) -> Result<SparseMatrix> {
        match &self.storage {
            SparseStorage::Host(m) => Ok(m.clone()),
            SparseStorage::Device {
                num_rows,
                num_cols,
                elements,
            } => SparseMatrix::from_elements(*num_rows, *num_cols, elements.as_slice()),
        }
    }

    /// Exchange contents with a host matrix. Constant time when host-resident;
    /// a device-resident matrix has to convert both sides.
    pub fn swap_with_host(&mut self, smat: &mut SparseMatrix) -> Result<()> {
        if let SparseStorage::Host(mine) = &mut self.storage {
            mine.swap(smat);
            return Ok(());
        }
        let mut mine = self.to_host()?;
        self.assign_from_host(smat);
        std::mem::swap(&mut mine, smat);
        Ok(())
    }

    /// Exchange storage with another instance in constant time. The residency
    /// travels with the storage.
    pub fn swap_with_device(&mut self, other: &mut DeviceSparseMatrix) {
        std::mem::swap(&mut self.storage, &mut other.storage);
    }

    /// Re-fill with random data for testing: each entry of the current shape
    /// is zero with probability `zero_prob`, otherwise standard normal.
    pub fn set_randn(&mut self, zero_prob: f32, rng: &mut dyn RngCore) -> Result<()> {
        let mut host = SparseMatrix::new(self.num_rows(), self.num_cols());
        host.set_randn(zero_prob, rng)?;
        self.assign_from_host(&host);
        Ok(())
    }

    /// Visit every stored element on whichever side holds the data.
    fn for_each_element(&self, mut f: impl FnMut(usize, usize, f32)) {
        match &self.storage {
            SparseStorage::Host(m) => {
                for (r, row) in m.rows().iter().enumerate() {
                    for &(c, v) in row.pairs() {
                        f(r, c, v);
                    }
                }
            }
            SparseStorage::Device { elements, .. } => {
                for e in elements.as_slice() {
                    f(e.row, e.column, e.value);
                }
            }
        }
    }

    /// `dense += alpha * op(self)`.
    pub fn add_to_dense(&self, alpha: f32, dense: &mut Matrix, trans: MatrixTranspose) -> Result<()> {
        let expected = match trans {
            MatrixTranspose::NoTrans => [self.num_rows(), self.num_cols()],
            MatrixTranspose::Trans => [self.num_cols(), self.num_rows()],
        };
        if dense.shape() != expected {
            return Err(Error::dimension(
                "DeviceSparseMatrix::add_to_dense",
                &expected,
                &dense.shape(),
            ));
        }
        self.for_each_element(|r, c, v| {
            let (dr, dc) = match trans {
                MatrixTranspose::NoTrans => (r, c),
                MatrixTranspose::Trans => (c, r),
            };
            let cur = dense.get(dr, dc);
            dense.set(dr, dc, cur + alpha * v);
        });
        Ok(())
    }

    /// Dense copy of the matrix.
    pub fn to_dense(&self) -> Result<Matrix> {
        let mut dense = Matrix::new(self.num_rows(), self.num_cols());
        self.add_to_dense(1.0, &mut dense, MatrixTranspose::NoTrans)?;
        Ok(dense)
    }

    /// Serialize in row-list form:
    /// `<SparseMatrix> <NumRows> R <NumCols> C (<Row> NNZ (col value)*)* </SparseMatrix>`.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W, binary: bool) -> Result<()> {
        let host = self.to_host()?;
        write_token(writer, binary, "<SparseMatrix>")?;
        write_token(writer, binary, "<NumRows>")?;
        write_usize(writer, binary, host.num_rows())?;
        write_token(writer, binary, "<NumCols>")?;
        write_usize(writer, binary, host.num_cols())?;
        for row in host.rows() {
            write_token(writer, binary, "<Row>")?;
            write_usize(writer, binary, row.num_elements())?;
            for &(c, v) in row.pairs() {
                write_usize(writer, binary, c)?;
                write_f32(writer, binary, v)?;
            }
            if !binary {
                writer.write_all(b"\n")?;
            }
        }
        write_token(writer, binary, "</SparseMatrix>")?;
        Ok(())
    }

    /// Replace the contents with a matrix read in the format of [`write`](Self::write).
    /// The residency of `self` is kept.
    pub fn read<R: BufRead + ?Sized>(&mut self, reader: &mut R, binary: bool) -> Result<()> {
        expect_token(reader, binary, "<SparseMatrix>")?;
        expect_token(reader, binary, "<NumRows>")?;
        let num_rows = read_usize(reader, binary)?;
        expect_token(reader, binary, "<NumCols>")?;
        let num_cols = read_usize(reader, binary)?;
        let mut rows = Vec::with_capacity(num_rows.min(MAX_PREALLOCATED));
        for _ in 0..num_rows {
            expect_token(reader, binary, "<Row>")?;
            let nnz = read_usize(reader, binary)?;
            let mut pairs = Vec::with_capacity(nnz.min(MAX_PREALLOCATED));
            for _ in 0..nnz {
                let c = read_usize(reader, binary)?;
                let v = read_f32(reader, binary)?;
                pairs.push((c, v));
            }
            let row = SparseVector::from_pairs(num_cols, pairs)
                .map_err(|e| Error::format(format!("bad sparse row: {}", e)))?;
            rows.push(row);
        }
        expect_token(reader, binary, "</SparseMatrix>")?;
        let host = SparseMatrix::from_rows(num_cols, rows)
            .map_err(|e| Error::format(format!("bad sparse matrix: {}", e)))?;
        self.assign_from_host(&host);
        Ok(())
    }
}

impl Default for DeviceSparseMatrix {
    fn default() -> Self {
        Self::new(Residency::Host)
    }
}

/// Trace of `a * op(b)` for dense `a` and sparse `b`, summed over the
/// non-zeros of `b` only.
///
/// With `NoTrans`, `a` must be `cols(b) × rows(b)`; with `Trans`, `a` must have
/// the same shape as `b`.
pub fn trace_mat_smat(a: &Matrix, b: &DeviceSparseMatrix, trans: MatrixTranspose) -> Result<f32> {
    let expected = match trans {
        MatrixTranspose::NoTrans => [b.num_cols(), b.num_rows()],
        MatrixTranspose::Trans => [b.num_rows(), b.num_cols()],
    };
    if a.shape() != expected {
        return Err(Error::dimension("trace_mat_smat", &expected, &a.shape()));
    }
    let mut sum = 0.0f64;
    b.for_each_element(|r, c, v| {
        let a_val = match trans {
            MatrixTranspose::NoTrans => a.get(c, r),
            MatrixTranspose::Trans => a.get(r, c),
        };
        sum += a_val as f64 * v as f64;
    });
    Ok(sum as f32)
}
