//! Matrix containers the components compute on.
//!
//! - `dense`: row-major `f32` matrices with transpose-aware kernels
//! - `device_array`: flat device-resident element arrays
//! - `sparse`: host sparse vectors and row-list sparse matrices
//! - `device_sparse`: sparse matrices with a host or device representation

pub mod dense;
pub mod device_array;
pub mod device_sparse;
pub mod sparse;

pub use dense::{Matrix, MatrixTranspose};
pub use device_array::DeviceArray;
pub use device_sparse::{trace_mat_smat, DeviceSparseMatrix, Residency};
pub use sparse::{MatrixElement, SparseMatrix, SparseVector};
