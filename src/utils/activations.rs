//! Element-wise activation kernels used by the nonlinear components.
//!
//! The functions work on flat row-major slices so they apply equally to a
//! whole matrix or a single row.

/// Sigmoid of one value: 1 / (1 + exp(-x))
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative expressed through the output y = sigmoid(x).
///
/// Returns y * (1 - y)
pub fn sigmoid_derivative(y: f32) -> f32 {
    y * (1.0 - y)
}

/// Apply sigmoid to every element of `input`, writing into `output`.
///
/// Both slices must have the same length.
pub fn sigmoid_into(input: &[f32], output: &mut [f32]) {
    debug_assert_eq!(input.len(), output.len());
    for (y, &x) in output.iter_mut().zip(input) {
        *y = sigmoid(x);
    }
}

/// Apply sigmoid in place.
pub fn sigmoid_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        *value = sigmoid(*value);
    }
}

/// Replace each output value y with the derivative y * (1 - y).
pub fn sigmoid_derivative_from_output(out_value: &[f32], deriv: &mut [f32]) {
    debug_assert_eq!(out_value.len(), deriv.len());
    for (d, &y) in deriv.iter_mut().zip(out_value) {
        *d = sigmoid_derivative(y);
    }
}
