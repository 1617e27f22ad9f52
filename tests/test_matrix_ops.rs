//! Tests for dense matrix kernels and the stream primitives they serialize with
//!
//! This file tests:
//! - GEMM (`add_mat_mat`) for every transpose combination, with alpha and beta
//! - Row broadcasts, column sums and Frobenius products
//! - Matrix and vector round trips in binary and text mode

use approx::assert_relative_eq;
use rust_nnet_components::io::{
    read_f32_vector, read_f64_vector, read_matrix, write_f32_vector, write_f64_vector, write_matrix,
};
use rust_nnet_components::matrix::{Matrix, MatrixTranspose};
use rust_nnet_components::Error;
use std::io::Cursor;

use MatrixTranspose::{NoTrans, Trans};

fn transpose(m: &Matrix) -> Matrix {
    let mut t = Matrix::new(m.cols(), m.rows());
    for r in 0..m.rows() {
        for c in 0..m.cols() {
            t.set(c, r, m.get(r, c));
        }
    }
    t
}

// ============================================================================
// GEMM Tests
// ============================================================================

mod gemm_tests {
    use super::*;

    fn a() -> Matrix {
        Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap()
    }

    fn b() -> Matrix {
        Matrix::from_rows(&[vec![7.0, 8.0], vec![9.0, 10.0], vec![11.0, 12.0]]).unwrap()
    }

    #[test]
    fn test_plain_product() {
        let mut c = Matrix::new(2, 2);
        c.add_mat_mat(1.0, &a(), NoTrans, &b(), NoTrans, 0.0).unwrap();
        assert_eq!(c.data(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_all_transpose_combinations_agree() {
        let mut expected = Matrix::new(2, 2);
        expected.add_mat_mat(1.0, &a(), NoTrans, &b(), NoTrans, 0.0).unwrap();

        let at = transpose(&a());
        let bt = transpose(&b());
        for (lhs, ta, rhs, tb) in [
            (&at, Trans, &b(), NoTrans),
            (&a(), NoTrans, &bt, Trans),
            (&at, Trans, &bt, Trans),
        ] {
            let mut c = Matrix::new(2, 2);
            c.add_mat_mat(1.0, lhs, ta, rhs, tb, 0.0).unwrap();
            assert_eq!(c, expected);
        }
    }

    #[test]
    fn test_alpha_and_beta() {
        let mut c = Matrix::filled(2, 2, 1.0);
        c.add_mat_mat(0.5, &a(), NoTrans, &b(), NoTrans, 2.0).unwrap();
        assert_relative_eq!(c.get(0, 0), 2.0 + 29.0);
        assert_relative_eq!(c.get(1, 1), 2.0 + 77.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut c = Matrix::new(2, 2);
        assert!(matches!(
            c.add_mat_mat(1.0, &a(), NoTrans, &a(), NoTrans, 0.0),
            Err(Error::DimensionMismatch { .. })
        ));
        let mut wrong_out = Matrix::new(3, 3);
        assert!(wrong_out
            .add_mat_mat(1.0, &a(), NoTrans, &b(), NoTrans, 0.0)
            .is_err());
    }
}

// ============================================================================
// Row and Column Operation Tests
// ============================================================================

mod row_column_tests {
    use super::*;

    #[test]
    fn test_add_vec_to_rows() {
        let mut m = Matrix::new(3, 2);
        m.add_vec_to_rows(2.0, &[0.5, -1.0]).unwrap();
        for r in 0..3 {
            assert_eq!(m.row(r), &[1.0, -2.0]);
        }
        assert!(m.add_vec_to_rows(1.0, &[1.0]).is_err());
    }

    #[test]
    fn test_column_sums_and_dot() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.column_sums(), vec![4.0, 6.0]);
        assert_relative_eq!(m.dot(&m).unwrap(), 30.0);
        assert!(m.dot(&Matrix::new(1, 2)).is_err());
    }

    #[test]
    fn test_add_mat_transposed() {
        let mut m = Matrix::new(2, 3);
        let other = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        m.add_mat(1.0, &other, Trans).unwrap();
        assert_eq!(m, transpose(&other));
        assert!(m.add_mat(1.0, &other, NoTrans).is_err());
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        assert!(Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
        assert!(Matrix::from_vec(2, 2, vec![1.0; 3]).is_err());
    }
}

// ============================================================================
// Serialization Tests
// ============================================================================

mod serialization_tests {
    use super::*;

    #[test]
    fn test_matrix_round_trip_both_modes() {
        let m = Matrix::from_rows(&[vec![0.1, -2.5e-7, 3.0], vec![1e10, 0.0, -0.333]]).unwrap();
        for binary in [true, false] {
            let mut buf = Vec::new();
            write_matrix(&mut buf, binary, &m).unwrap();
            let back = read_matrix(&mut Cursor::new(buf), binary).unwrap();
            assert_eq!(back, m);
        }
    }

    #[test]
    fn test_vector_round_trip_both_modes() {
        let single = vec![1.5f32, -0.25, 7.0];
        let double = vec![0.1f64, 1e-300, -42.0];
        for binary in [true, false] {
            let mut buf = Vec::new();
            write_f32_vector(&mut buf, binary, &single).unwrap();
            write_f64_vector(&mut buf, binary, &double).unwrap();
            let mut reader = Cursor::new(buf);
            assert_eq!(read_f32_vector(&mut reader, binary).unwrap(), single);
            assert_eq!(read_f64_vector(&mut reader, binary).unwrap(), double);
        }
    }

    #[test]
    fn test_empty_vector_text_form() {
        let mut buf = Vec::new();
        write_f32_vector(&mut buf, false, &[]).unwrap();
        let back = read_f32_vector(&mut Cursor::new(buf), false).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_truncated_binary_matrix() {
        let m = Matrix::filled(4, 4, 1.0);
        let mut buf = Vec::new();
        write_matrix(&mut buf, true, &m).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(read_matrix(&mut Cursor::new(buf), true).is_err());
    }
}
