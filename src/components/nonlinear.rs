//! Activation statistics shared by fixed-dimension element-wise nonlinearities.
//!
//! Training code looks at the average activation and derivative per unit to
//! spot saturated or dead units. The statistics are the only state a
//! component mutates through a shared reference, so they sit behind a mutex
//! that is held just for the accumulate step, never across a whole pass.

use crate::config::ConfigLine;
use crate::error::{Error, Result};
use crate::io::{
    expect_token, read_f64, read_f64_vector, read_usize, write_f64, write_f64_vector, write_token,
    write_usize,
};
use crate::matrix::Matrix;
use parking_lot::Mutex;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Default, PartialEq)]
struct StatsAccumulator {
    value_sum: Vec<f64>,
    deriv_sum: Vec<f64>,
    count: f64,
}

impl StatsAccumulator {
    fn zeroed(dim: usize) -> Self {
        Self {
            value_sum: vec![0.0; dim],
            deriv_sum: vec![0.0; dim],
            count: 0.0,
        }
    }

    /// Statistics read from a model that never saw data are stored empty.
    fn ensure_sized(&mut self, dim: usize) {
        if self.value_sum.len() != dim {
            tracing::warn!(dim, "resizing empty activation statistics");
            self.value_sum = vec![0.0; dim];
        }
        if self.deriv_sum.len() != dim {
            self.deriv_sum = vec![0.0; dim];
        }
    }
}

/// Dimension plus running sums of activations and derivatives.
///
/// # Example
///
/// ```
/// use rust_nnet_components::components::NonlinearStats;
/// use rust_nnet_components::matrix::Matrix;
///
/// let mut stats = NonlinearStats::default();
/// stats.init(2);
/// stats.update_stats(&Matrix::filled(3, 2, 0.5), None).unwrap();
/// assert_eq!(stats.count(), 3.0);
/// assert_eq!(stats.value_sum(), vec![1.5, 1.5]);
/// ```
#[derive(Debug, Default)]
pub struct NonlinearStats {
    dim: usize,
    accum: Mutex<StatsAccumulator>,
}

impl Clone for NonlinearStats {
    fn clone(&self) -> Self {
        Self {
            dim: self.dim,
            accum: Mutex::new(self.accum.lock().clone()),
        }
    }
}

impl NonlinearStats {
    /// Fix the dimension and reset all statistics to zero.
    pub fn init(&mut self, dim: usize) {
        self.dim = dim;
        *self.accum.get_mut() = StatsAccumulator::zeroed(dim);
    }

    /// Consumes the required `dim` key.
    pub fn init_from_config(&mut self, cfg: &mut ConfigLine, component: &str) -> Result<()> {
        let dim = cfg.require_dim("dim", component)?;
        self.init(dim);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn value_sum(&self) -> Vec<f64> {
        self.accum.lock().value_sum.clone()
    }

    pub fn deriv_sum(&self) -> Vec<f64> {
        self.accum.lock().deriv_sum.clone()
    }

    pub fn count(&self) -> f64 {
        self.accum.lock().count
    }

    /// Add the column sums of `out_value` (and of `deriv`, if given) and the
    /// number of rows to the statistics.
    ///
    /// Safe to call from several threads at once. The sums are computed before
    /// the lock is taken, so the critical section is O(dim).
    pub fn update_stats(&self, out_value: &Matrix, deriv: Option<&Matrix>) -> Result<()> {
        if out_value.cols() != self.dim {
            return Err(Error::dimension(
                "NonlinearStats::update_stats",
                &[out_value.rows(), self.dim],
                &out_value.shape(),
            ));
        }
        if let Some(d) = deriv {
            if d.shape() != out_value.shape() {
                return Err(Error::dimension(
                    "NonlinearStats::update_stats (deriv)",
                    &out_value.shape(),
                    &d.shape(),
                ));
            }
        }
        let value_sums = out_value.column_sums();
        let deriv_sums = deriv.map(Matrix::column_sums);

        let mut accum = self.accum.lock();
        accum.ensure_sized(self.dim);
        for (acc, v) in accum.value_sum.iter_mut().zip(&value_sums) {
            *acc += v;
        }
        if let Some(sums) = deriv_sums {
            for (acc, v) in accum.deriv_sum.iter_mut().zip(&sums) {
                *acc += v;
            }
        }
        accum.count += out_value.rows() as f64;
        Ok(())
    }

    /// Scale every statistic, including the count. Zero clears them.
    pub fn scale(&mut self, factor: f32) {
        let factor = factor as f64;
        let accum = self.accum.get_mut();
        accum.value_sum.iter_mut().for_each(|v| *v *= factor);
        accum.deriv_sum.iter_mut().for_each(|v| *v *= factor);
        accum.count *= factor;
    }

    /// Add `alpha` times the statistics of `other`, which must have the same dimension.
    pub fn add(&mut self, alpha: f32, other: &NonlinearStats) -> Result<()> {
        if other.dim != self.dim {
            return Err(Error::dimension("NonlinearStats::add", &[self.dim], &[other.dim]));
        }
        let theirs = other.accum.lock().clone();
        let alpha = alpha as f64;
        let dim = self.dim;
        let mine = self.accum.get_mut();
        mine.ensure_sized(dim);
        for (acc, v) in mine.value_sum.iter_mut().zip(&theirs.value_sum) {
            *acc += alpha * v;
        }
        for (acc, v) in mine.deriv_sum.iter_mut().zip(&theirs.deriv_sum) {
            *acc += alpha * v;
        }
        mine.count += alpha * theirs.count;
        Ok(())
    }

    /// `<Dim> D <ValueSum> V <DerivSum> V <Count> C`
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W, binary: bool) -> Result<()> {
        let accum = self.accum.lock();
        write_token(writer, binary, "<Dim>")?;
        write_usize(writer, binary, self.dim)?;
        write_token(writer, binary, "<ValueSum>")?;
        write_f64_vector(writer, binary, &accum.value_sum)?;
        write_token(writer, binary, "<DerivSum>")?;
        write_f64_vector(writer, binary, &accum.deriv_sum)?;
        write_token(writer, binary, "<Count>")?;
        write_f64(writer, binary, accum.count)
    }

    /// Reads the fields after the `<Dim>` token, which the caller has consumed.
    pub fn read_after_dim_token<R: BufRead + ?Sized>(&mut self, reader: &mut R, binary: bool) -> Result<()> {
        let dim = read_usize(reader, binary)?;
        expect_token(reader, binary, "<ValueSum>")?;
        let value_sum = read_f64_vector(reader, binary)?;
        expect_token(reader, binary, "<DerivSum>")?;
        let deriv_sum = read_f64_vector(reader, binary)?;
        expect_token(reader, binary, "<Count>")?;
        let count = read_f64(reader, binary)?;
        for (name, len) in [("ValueSum", value_sum.len()), ("DerivSum", deriv_sum.len())] {
            if len != 0 && len != dim {
                return Err(Error::format(format!(
                    "{} has {} entries but dimension is {}",
                    name, len, dim
                )));
            }
        }
        self.dim = dim;
        *self.accum.get_mut() = StatsAccumulator {
            value_sum,
            deriv_sum,
            count,
        };
        Ok(())
    }

    /// Average activation per unit, or `None` before any data was seen.
    pub fn value_average(&self) -> Option<Vec<f64>> {
        let accum = self.accum.lock();
        if accum.count <= 0.0 {
            return None;
        }
        Some(accum.value_sum.iter().map(|v| v / accum.count).collect())
    }

    pub fn info(&self) -> String {
        match self.value_average() {
            Some(avg) => {
                let mean = avg.iter().sum::<f64>() / avg.len().max(1) as f64;
                format!("dim={}, count={}, mean-value-avg={:.4}", self.dim, self.count(), mean)
            }
            None => format!("dim={}, count=0", self.dim),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_init_presizes_and_resets() {
        let mut stats = NonlinearStats::default();
        stats.init(3);
        assert_eq!(stats.value_sum(), vec![0.0; 3]);
        assert_eq!(stats.deriv_sum(), vec![0.0; 3]);
        stats.update_stats(&Matrix::filled(2, 3, 1.0), None).unwrap();
        stats.init(3);
        assert_eq!(stats.count(), 0.0);
        assert_eq!(stats.value_sum(), vec![0.0; 3]);
    }

    #[test]
    fn test_update_stats_with_deriv() {
        let mut stats = NonlinearStats::default();
        stats.init(2);
        let out = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let deriv = Matrix::from_vec(2, 2, vec![0.5, 0.5, 0.25, 0.25]).unwrap();
        stats.update_stats(&out, Some(&deriv)).unwrap();
        assert_eq!(stats.value_sum(), vec![4.0, 6.0]);
        assert_eq!(stats.deriv_sum(), vec![0.75, 0.75]);
        assert_eq!(stats.count(), 2.0);
    }

    #[test]
    fn test_update_stats_dimension_errors() {
        let mut stats = NonlinearStats::default();
        stats.init(2);
        assert!(stats.update_stats(&Matrix::new(1, 3), None).is_err());
        assert!(stats
            .update_stats(&Matrix::new(1, 2), Some(&Matrix::new(2, 2)))
            .is_err());
    }

    #[test]
    fn test_scale_and_add() {
        let mut a = NonlinearStats::default();
        a.init(2);
        a.update_stats(&Matrix::filled(4, 2, 1.0), None).unwrap();
        let mut b = a.clone();
        b.scale(0.5);
        assert_eq!(b.count(), 2.0);
        assert_eq!(b.value_sum(), vec![2.0, 2.0]);

        b.add(2.0, &a).unwrap();
        assert_eq!(b.count(), 10.0);
        assert_eq!(b.value_sum(), vec![10.0, 10.0]);

        b.scale(0.0);
        assert_eq!(b.count(), 0.0);
        assert_eq!(b.value_sum(), vec![0.0, 0.0]);

        let mut c = NonlinearStats::default();
        c.init(3);
        assert!(c.add(1.0, &a).is_err());
    }

    #[test]
    fn test_empty_sums_are_resized_on_first_update() {
        let text = "<Dim> 2 <ValueSum> [ ] <DerivSum> [ ] <Count> 0 ";
        let mut reader = Cursor::new(text.as_bytes());
        let mut stats = NonlinearStats::default();
        expect_token(&mut reader, false, "<Dim>").unwrap();
        stats.read_after_dim_token(&mut reader, false).unwrap();
        assert!(stats.value_sum().is_empty());

        stats.update_stats(&Matrix::filled(1, 2, 3.0), None).unwrap();
        assert_eq!(stats.value_sum(), vec![3.0, 3.0]);
        assert_eq!(stats.deriv_sum(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_read_rejects_wrong_length_sums() {
        let text = "<Dim> 2 <ValueSum> [ 1 ] <DerivSum> [ ] <Count> 0 ";
        let mut reader = Cursor::new(text.as_bytes());
        let mut stats = NonlinearStats::default();
        expect_token(&mut reader, false, "<Dim>").unwrap();
        assert!(matches!(
            stats.read_after_dim_token(&mut reader, false),
            Err(Error::Format(_))
        ));
    }
}
