//! Layer Normalization
//!
//! Normalizes each row (position) across its features, then applies a
//! learnable scale (gamma) and shift (beta).
//!
//! ## Forward Pass
//!
//! ```text
//! 1. mean = sum(x) / N
//! 2. var  = sum((x - mean)²) / N          (biased: divides by N, not N-1)
//! 3. x̂    = (x - mean) / √(var + ε)
//! 4. y    = γ * x̂ + β
//! ```
//!
//! ## Backward Pass
//!
//! ```text
//! dγ[d] += dy[d] * x̂[d]
//! dβ[d] += dy[d]
//!
//! dx̂    = dy[d] * γ[d]
//! dvar  = -0.5 * dx̂ * (x[d] - mean) / (var + ε)^1.5
//! dmean = -dx̂ / √(var + ε)
//! dx[d] = dx̂ / √(var + ε) + dvar * 2 * (x[d] - mean) / N + dmean / N
//! ```
//!
//! `dvar` and `dmean` are evaluated per element, not reduced over the row
//! first. This closed form is part of the model's contract and differs from
//! the row-reduced textbook gradient. The gamma and beta gradients are exact.

use super::cache::ActivationCache;
use super::Layer;
use crate::parameter::Parameter;
use crate::tensor::Tensor;

/// Stabilizer added to the variance
pub const LAYER_NORM_EPS: f64 = 1e-5;

/// Layer normalization with learnable scale and shift
pub struct TrainableLayerNorm {
    pub gamma: Parameter, // [1, dim]
    pub beta: Parameter,  // [1, dim]
    pub dim: usize,
    pub eps: f64,
    cache: ActivationCache<LayerNormCache>,
}

/// Cache for layer norm backward pass
pub struct LayerNormCache {
    pub x: Tensor,
    pub mean: Vec<f64>,
    pub var: Vec<f64>,
}

impl TrainableLayerNorm {
    /// Create a layer norm over `dim` features
    ///
    /// gamma starts at 1 and beta at 0, so the layer begins as a pure
    /// normalization.
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Parameter::filled(1, dim, 1.0),
            beta: Parameter::filled(1, dim, 0.0),
            dim,
            eps: LAYER_NORM_EPS,
            cache: ActivationCache::new(),
        }
    }
}

impl Layer for TrainableLayerNorm {
    type Input = Tensor;
    type InputGrad = Tensor;

    fn forward(&mut self, x: &Tensor) -> Tensor {
        assert_eq!(
            x.cols, self.dim,
            "LayerNorm: input has {} features, expected {}",
            x.cols, self.dim
        );
        let n = self.dim as f64;
        let gamma = &self.gamma.value.data;
        let beta = &self.beta.value.data;

        let mut y = Tensor::zeros(x.rows, self.dim);
        let mut means = Vec::with_capacity(x.rows);
        let mut vars = Vec::with_capacity(x.rows);

        for r in 0..x.rows {
            let row = x.row(r);
            let mean = row.iter().sum::<f64>() / n;
            let var = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            let std = (var + self.eps).sqrt();

            for (d, out) in y.row_mut(r).iter_mut().enumerate() {
                *out = gamma[d] * (row[d] - mean) / std + beta[d];
            }
            means.push(mean);
            vars.push(var);
        }

        self.cache.arm(LayerNormCache {
            x: x.clone(),
            mean: means,
            var: vars,
        });
        y
    }

    fn backward(&mut self, grad_out: &Tensor) -> Tensor {
        let cache = self.cache.disarm("LayerNorm");
        assert_eq!(
            grad_out.shape(),
            cache.x.shape(),
            "LayerNorm: gradient shape doesn't match the last forward output"
        );
        let n = self.dim as f64;

        let mut grad_x = Tensor::zeros(cache.x.rows, self.dim);
        for r in 0..cache.x.rows {
            let x_row = cache.x.row(r);
            let dy_row = grad_out.row(r);
            let mean = cache.mean[r];
            let var = cache.var[r] + self.eps;
            let std = var.sqrt();

            for d in 0..self.dim {
                let x_hat = (x_row[d] - mean) / std;
                self.gamma.grad.data[d] += dy_row[d] * x_hat;
                self.beta.grad.data[d] += dy_row[d];
            }

            let gamma = &self.gamma.value.data;
            for (d, dx) in grad_x.row_mut(r).iter_mut().enumerate() {
                let centered = x_row[d] - mean;
                let dx_hat = dy_row[d] * gamma[d];
                let dvar = -0.5 * dx_hat * centered / (var * std);
                let dmean = -dx_hat / std;
                *dx = dx_hat / std + dvar * 2.0 * centered / n + dmean / n;
            }
        }
        grad_x
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.gamma, &self.beta]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.gamma, &mut self.beta]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::test_util::{assert_close, project, random_tensor, FD_STEP};

    #[test]
    fn test_forward_normalizes_rows() {
        let mut ln = TrainableLayerNorm::new(4);
        let y = ln.forward(&random_tensor(3, 4, 9));

        for r in 0..3 {
            let row = y.row(r);
            let mean = row.iter().sum::<f64>() / 4.0;
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-2);
        }
    }

    #[test]
    fn test_constant_row_is_finite() {
        let mut ln = TrainableLayerNorm::new(3);
        let y = ln.forward(&Tensor::filled(2, 3, 7.0));
        assert!(y.data.iter().all(|&v| v == 0.0));

        let dx = ln.backward(&Tensor::filled(2, 3, 1.0));
        assert!(dx.is_finite());
    }

    #[test]
    fn test_gamma_beta_gradients_match_finite_differences() {
        let mut ln = TrainableLayerNorm::new(5);
        ln.gamma.value = random_tensor(1, 5, 20);
        ln.beta.value = random_tensor(1, 5, 21);
        let x = random_tensor(3, 5, 22);
        let r = random_tensor(3, 5, 23);

        ln.forward(&x);
        ln.backward(&r);

        for d in 0..5 {
            let orig = ln.gamma.value.data[d];
            ln.gamma.value.data[d] = orig + FD_STEP;
            let plus = project(&ln.forward(&x), &r);
            ln.gamma.value.data[d] = orig - FD_STEP;
            let minus = project(&ln.forward(&x), &r);
            ln.gamma.value.data[d] = orig;
            assert_close(ln.gamma.grad.data[d], (plus - minus) / (2.0 * FD_STEP), "dgamma");

            let expected_beta: f64 = (0..3).map(|row| r.get(row, d)).sum();
            assert_close(ln.beta.grad.data[d], expected_beta, "dbeta");
        }
    }

    #[test]
    fn test_input_gradient_uses_per_element_closed_form() {
        let mut ln = TrainableLayerNorm::new(2);
        ln.gamma.value = Tensor::new(vec![2.0, 0.5], 1, 2);
        let x = Tensor::new(vec![1.0, 3.0], 1, 2);
        let dy = Tensor::new(vec![0.25, -1.0], 1, 2);

        ln.forward(&x);
        let dx = ln.backward(&dy);

        // mean = 2, var = 1
        let var: f64 = 1.0 + LAYER_NORM_EPS;
        let std = var.sqrt();
        let expected = |x: f64, dy: f64, gamma: f64| {
            let c = x - 2.0;
            let dx_hat = dy * gamma;
            let dvar = -0.5 * dx_hat * c / var.powf(1.5);
            let dmean = -dx_hat / std;
            dx_hat / std + dvar * 2.0 * c / 2.0 + dmean / 2.0
        };
        assert!((dx.data[0] - expected(1.0, 0.25, 2.0)).abs() < 1e-12);
        assert!((dx.data[1] - expected(3.0, -1.0, 0.5)).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "LayerNorm: backward called without a preceding forward")]
    fn test_backward_without_forward_panics() {
        TrainableLayerNorm::new(2).backward(&Tensor::zeros(1, 2));
    }
}
