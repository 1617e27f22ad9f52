//! Numerical gradient checks for the trainable components
//!
//! The objective throughout is `f = Σ output ⊙ G` for a fixed random `G`, so
//! `out_deriv = G`. Analytical gradients from backprop are compared with:
//! - Parameter perturbation (affine/linear are linear in their parameters)
//! - Central finite differences on the input of an affine → sigmoid chain

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_nnet_components::components::{AffineComponent, Component, LinearComponent, SigmoidComponent};
use rust_nnet_components::matrix::Matrix;

fn random_matrix(rows: usize, cols: usize, rng: &mut StdRng) -> Matrix {
    let mut m = Matrix::new(rows, cols);
    m.set_randn(rng);
    m
}

fn objective(output: &Matrix, weights: &Matrix) -> f64 {
    output.dot(weights).unwrap()
}

/// Gradient of the objective w.r.t. the parameters of `component`, collected
/// into a zeroed copy marked as a gradient.
fn parameter_gradient(component: &dyn Component, input: &Matrix, out_deriv: &Matrix) -> Box<dyn Component> {
    let mut gradient = component.copy();
    gradient.set_zero(true).unwrap();
    component
        .backprop("check", None, input, &Matrix::default(), out_deriv, Some(gradient.as_mut()), None)
        .unwrap();
    gradient
}

/// Predicted vs. measured objective change under a random parameter perturbation.
fn check_parameter_gradient(component: &dyn Component, rng: &mut StdRng) {
    let input = random_matrix(5, component.input_dim(), rng);
    let weights = random_matrix(5, component.output_dim(), rng);
    let gradient = parameter_gradient(component, &input, &weights);
    assert!(gradient.is_gradient());

    let base = objective(&component.propagate_to_new(None, &input, 5).unwrap(), &weights);
    for _ in 0..3 {
        let mut perturbed = component.copy();
        perturbed.perturb_params(0.01, rng).unwrap();
        let measured = objective(&perturbed.propagate_to_new(None, &input, 5).unwrap(), &weights) - base;
        let predicted =
            gradient.dot_product(perturbed.as_ref()).unwrap() - gradient.dot_product(component).unwrap();
        assert_relative_eq!(predicted as f64, measured, epsilon = 1e-3, max_relative = 2e-2);
    }
}

// ============================================================================
// Parameter Gradient Tests
// ============================================================================

mod parameter_tests {
    use super::*;

    #[test]
    fn test_affine_parameter_gradient() {
        let mut rng = StdRng::seed_from_u64(11);
        let affine = AffineComponent::new(4, 3, 0.5, 0.5, 0.001, &mut rng);
        check_parameter_gradient(&affine, &mut rng);
    }

    #[test]
    fn test_linear_parameter_gradient() {
        let mut rng = StdRng::seed_from_u64(12);
        let linear = LinearComponent::new(6, 2, 0.5, 0.001, &mut rng);
        check_parameter_gradient(&linear, &mut rng);
    }

    #[test]
    fn test_affine_gradient_closed_form() {
        // Gradient w.r.t. W is Gᵀ·X and w.r.t. b the column sums of G.
        let w = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let affine = AffineComponent::from_params(w, vec![0.0, 0.0], 0.1).unwrap();
        let input = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let out_deriv = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 2.0]]).unwrap();

        let gradient = parameter_gradient(&affine, &input, &out_deriv);
        let gradient = gradient.as_any().downcast_ref::<AffineComponent>().unwrap();
        assert_eq!(gradient.linear_params().row(0), &[1.0, 2.0]);
        assert_eq!(gradient.linear_params().row(1), &[6.0, 8.0]);
        assert_eq!(gradient.bias_params(), &[1.0, 2.0]);
    }

    #[test]
    fn test_update_scales_with_learning_rate() {
        let mut rng = StdRng::seed_from_u64(13);
        let affine = AffineComponent::new(3, 2, 0.5, 0.5, 0.1, &mut rng);
        let input = random_matrix(4, 3, &mut rng);
        let out_deriv = random_matrix(4, 2, &mut rng);
        let gradient = parameter_gradient(&affine, &input, &out_deriv);

        let mut updated = affine.copy();
        affine
            .backprop("update", None, &input, &Matrix::default(), &out_deriv, Some(updated.as_mut()), None)
            .unwrap();

        let dim = affine.parameter_dim().unwrap();
        let (mut before, mut after, mut grad) = (vec![0.0; dim], vec![0.0; dim], vec![0.0; dim]);
        affine.vectorize(&mut before).unwrap();
        updated.vectorize(&mut after).unwrap();
        gradient.vectorize(&mut grad).unwrap();
        for i in 0..dim {
            assert_relative_eq!(after[i] - before[i], 0.1 * grad[i], epsilon = 1e-5, max_relative = 1e-4);
        }
    }
}

// ============================================================================
// Input Derivative Tests
// ============================================================================

mod input_derivative_tests {
    use super::*;

    fn chain_forward(affine: &AffineComponent, sigmoid: &SigmoidComponent, input: &Matrix) -> (Matrix, Matrix) {
        let hidden = affine.propagate_to_new(None, input, input.rows()).unwrap();
        let output = sigmoid.propagate_to_new(None, &hidden, input.rows()).unwrap();
        (hidden, output)
    }

    #[test]
    fn test_affine_sigmoid_chain_input_derivative() {
        let mut rng = StdRng::seed_from_u64(21);
        let affine = AffineComponent::new(4, 3, 0.5, 0.2, 0.001, &mut rng);
        let sigmoid = SigmoidComponent::new(3);
        let input = random_matrix(2, 4, &mut rng);
        let weights = random_matrix(2, 3, &mut rng);

        let (hidden, output) = chain_forward(&affine, &sigmoid, &input);
        let mut hidden_deriv = Matrix::new(2, 3);
        sigmoid
            .backprop("sigmoid", None, &hidden, &output, &weights, None, Some(&mut hidden_deriv))
            .unwrap();
        let mut input_deriv = Matrix::new(2, 4);
        affine
            .backprop("affine", None, &input, &output, &hidden_deriv, None, Some(&mut input_deriv))
            .unwrap();

        let h = 1e-2f32;
        for r in 0..2 {
            for c in 0..4 {
                let mut plus = input.clone();
                plus.set(r, c, input.get(r, c) + h);
                let mut minus = input.clone();
                minus.set(r, c, input.get(r, c) - h);
                let f_plus = objective(&chain_forward(&affine, &sigmoid, &plus).1, &weights);
                let f_minus = objective(&chain_forward(&affine, &sigmoid, &minus).1, &weights);
                let numeric = (f_plus - f_minus) / (2.0 * h as f64);
                assert_relative_eq!(
                    input_deriv.get(r, c) as f64,
                    numeric,
                    epsilon = 2e-3,
                    max_relative = 2e-2
                );
            }
        }
    }

    #[test]
    fn test_in_place_backprop_matches_out_of_place() {
        let mut rng = StdRng::seed_from_u64(22);
        let sigmoid = SigmoidComponent::new(5);
        let input = random_matrix(3, 5, &mut rng);
        let output = sigmoid.propagate_to_new(None, &input, 3).unwrap();
        let out_deriv = random_matrix(3, 5, &mut rng);

        let mut in_deriv = Matrix::new(3, 5);
        sigmoid
            .backprop("s", None, &input, &output, &out_deriv, None, Some(&mut in_deriv))
            .unwrap();
        let mut deriv = out_deriv.clone();
        sigmoid
            .backprop_in_place("s", None, &input, &output, &mut deriv, None)
            .unwrap();
        assert_eq!(deriv, in_deriv);
    }
}
