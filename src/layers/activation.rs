//! Activation Functions
//!
//! ## GELU (Gaussian Error Linear Unit)
//!
//! ```text
//! GELU(x) = x × Φ(x)
//! ```
//!
//! We use the tanh approximation in both directions:
//!
//! ```text
//! GELU(x)  ≈ 0.5 × x × (1 + tanh(a × (x + 0.044715 × x³))),   a = √(2/π)
//! GELU'(x) = 0.5 × (1 + t + x × (1 - t²) × a × (1 + 3 × 0.044715 × x²))
//! ```
//!
//! where `t` is the tanh term. The derivative is the exact derivative of the
//! approximation, not of the erf-based GELU, so forward and backward stay
//! consistent under a finite-difference check.

use crate::tensor::Tensor;
use rayon::prelude::*;

const GELU_COEFF: f64 = 0.044715;

fn sqrt_2_over_pi() -> f64 {
    (2.0 / std::f64::consts::PI).sqrt()
}

/// GELU of a single value
pub fn gelu(x: f64) -> f64 {
    let inner = sqrt_2_over_pi() * (x + GELU_COEFF * x * x * x);
    0.5 * x * (1.0 + inner.tanh())
}

/// Derivative of [`gelu`] at `x`
pub fn gelu_grad(x: f64) -> f64 {
    let a = sqrt_2_over_pi();
    let t = (a * (x + GELU_COEFF * x * x * x)).tanh();
    let dt_dx = a * (1.0 + 3.0 * GELU_COEFF * x * x);
    0.5 * (1.0 + t + x * (1.0 - t * t) * dt_dx)
}

/// GELU applied element-wise (parallel)
pub fn gelu_forward(x: &Tensor) -> Tensor {
    let data = x.data.par_iter().map(|&v| gelu(v)).collect();
    Tensor::new(data, x.rows, x.cols)
}

/// Backward through GELU: `grad_x = grad_out * GELU'(x)` (parallel)
///
/// `x` is the pre-activation saved by the forward pass.
pub fn gelu_backward(grad_out: &Tensor, x: &Tensor) -> Tensor {
    assert_eq!(
        grad_out.shape(),
        x.shape(),
        "GELU: gradient shape doesn't match the pre-activation"
    );
    let data = x
        .data
        .par_iter()
        .zip(&grad_out.data)
        .map(|(&xv, &g)| g * gelu_grad(xv))
        .collect();
    Tensor::new(data, x.rows, x.cols)
}
