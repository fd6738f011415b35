//! Linear Layer (Fully Connected)
//!
//! Affine transform applied to every row of the input:
//!
//! ```text
//! Input:  X [rows, in_dim]
//! Weight: W [out_dim, in_dim]
//! Bias:   b [1, out_dim]
//! Output: Y[r, o] = Σ_i X[r, i] · W[o, i] + b[o]
//! ```
//!
//! ## Backward Pass
//!
//! ```text
//! dW[o, i] += Σ_r dY[r, o] · X[r, i]
//! db[o]    += Σ_r dY[r, o]
//! dX[r, i]  = Σ_o dY[r, o] · W[o, i]
//! ```
//!
//! Parameter gradients accumulate across backward calls until `zero_grad`.
//!
//! ## Implementation Notes
//!
//! - Weights are drawn from N(0, init_std²), biases start at zero
//! - The input is cached for the weight gradient
//! - Bias addition runs in parallel across rows

use super::cache::ActivationCache;
use super::Layer;
use crate::parameter::Parameter;
use crate::tensor::Tensor;
use rand::Rng;
use rayon::prelude::*;

/// Standard deviation used for every Linear layer in the model
pub const LINEAR_INIT_STD: f64 = 0.02;

/// Linear layer: `Y = X Wᵀ + b`
pub struct TrainableLinear {
    pub weight: Parameter, // [out_dim, in_dim]
    pub bias: Parameter,   // [1, out_dim]
    pub in_dim: usize,
    pub out_dim: usize,
    cache: ActivationCache<LinearCache>,
}

/// Cache for linear layer backward pass
pub struct LinearCache {
    pub x: Tensor,
}

impl TrainableLinear {
    /// Create a linear layer with Gaussian weights and zero bias
    ///
    /// # Arguments
    ///
    /// * `in_dim` - Input features
    /// * `out_dim` - Output features
    /// * `init_std` - Standard deviation of the weight draws
    /// * `rng` - Source of the draws
    pub fn new<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, init_std: f64, rng: &mut R) -> Self {
        Self {
            weight: Parameter::randn(out_dim, in_dim, init_std, rng),
            bias: Parameter::filled(1, out_dim, 0.0),
            in_dim,
            out_dim,
            cache: ActivationCache::new(),
        }
    }
}

impl Layer for TrainableLinear {
    type Input = Tensor;
    type InputGrad = Tensor;

    fn forward(&mut self, x: &Tensor) -> Tensor {
        assert_eq!(
            x.cols, self.in_dim,
            "Linear: input has {} features, expected {}",
            x.cols, self.in_dim
        );
        let rows = x.rows;
        let w = &self.weight.value;

        let mut y = Tensor::zeros(rows, self.out_dim);
        for r in 0..rows {
            let x_row = x.row(r);
            let y_row = y.row_mut(r);
            for (o, out) in y_row.iter_mut().enumerate() {
                *out = x_row.iter().zip(w.row(o)).map(|(a, b)| a * b).sum();
            }
        }

        let bias = &self.bias.value.data;
        y.data.par_chunks_mut(self.out_dim).for_each(|row| {
            for (v, b) in row.iter_mut().zip(bias) {
                *v += b;
            }
        });

        self.cache.arm(LinearCache { x: x.clone() });
        y
    }

    fn backward(&mut self, grad_out: &Tensor) -> Tensor {
        let LinearCache { x } = self.cache.disarm("Linear");
        assert_eq!(
            grad_out.shape(),
            (x.rows, self.out_dim),
            "Linear: gradient shape doesn't match the last forward output"
        );

        let mut grad_x = Tensor::zeros(x.rows, self.in_dim);
        for r in 0..x.rows {
            let x_row = x.row(r);
            for o in 0..self.out_dim {
                let g = grad_out.get(r, o);
                self.bias.grad.data[o] += g;

                let w_row = self.weight.value.row(o);
                let dw_row = self.weight.grad.row_mut(o);
                for i in 0..self.in_dim {
                    dw_row[i] += g * x_row[i];
                }

                let dx_row = grad_x.row_mut(r);
                for i in 0..self.in_dim {
                    dx_row[i] += g * w_row[i];
                }
            }
        }
        grad_x
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight, &mut self.bias]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::test_util::{assert_close, project, random_tensor, FD_STEP};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer(in_dim: usize, out_dim: usize) -> TrainableLinear {
        TrainableLinear::new(in_dim, out_dim, 0.5, &mut StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_forward_matches_definition() {
        let mut lin = layer(2, 3);
        lin.weight.value = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);
        lin.bias.value = Tensor::new(vec![0.5, -0.5, 1.0], 1, 3);

        let y = lin.forward(&Tensor::new(vec![1.0, 1.0, 2.0, -1.0], 2, 2));
        assert_eq!(y.data, vec![3.5, 6.5, 12.0, 0.5, 1.5, 5.0]);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut lin = layer(3, 4);
        let x = random_tensor(5, 3, 1);
        let r = random_tensor(5, 4, 2);

        lin.forward(&x);
        lin.zero_grad();
        let dx = lin.backward(&r);

        for idx in [0, 5, 11] {
            let orig = lin.weight.value.data[idx];
            lin.weight.value.data[idx] = orig + FD_STEP;
            let plus = project(&lin.forward(&x), &r);
            lin.weight.value.data[idx] = orig - FD_STEP;
            let minus = project(&lin.forward(&x), &r);
            lin.weight.value.data[idx] = orig;
            let numeric = (plus - minus) / (2.0 * FD_STEP);
            assert_close(lin.weight.grad.data[idx], numeric, "dW");
        }

        // Bias gradient is the column sum of dY
        for o in 0..4 {
            let expected: f64 = (0..5).map(|row| r.get(row, o)).sum();
            assert_close(lin.bias.grad.data[o], expected, "db");
        }

        for idx in [0, 7, 14] {
            let mut xp = x.clone();
            xp.data[idx] += FD_STEP;
            let plus = project(&lin.forward(&xp), &r);
            xp.data[idx] -= 2.0 * FD_STEP;
            let minus = project(&lin.forward(&xp), &r);
            let numeric = (plus - minus) / (2.0 * FD_STEP);
            assert_close(dx.data[idx], numeric, "dX");
        }
    }

    #[test]
    fn test_gradients_accumulate_until_zero_grad() {
        let mut lin = layer(2, 2);
        let x = random_tensor(3, 2, 5);
        let g = random_tensor(3, 2, 6);

        lin.forward(&x);
        lin.backward(&g);
        let once = lin.weight.grad.clone();

        lin.forward(&x);
        lin.backward(&g);
        for (twice, single) in lin.weight.grad.data.iter().zip(&once.data) {
            assert!((twice - 2.0 * single).abs() < 1e-12);
        }

        lin.zero_grad();
        assert!(lin.weight.grad.data.iter().all(|&v| v == 0.0));
        assert!(lin.bias.grad.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    #[should_panic(expected = "Linear: backward called without a preceding forward")]
    fn test_second_backward_panics() {
        let mut lin = layer(2, 2);
        let x = random_tensor(1, 2, 0);
        lin.forward(&x);
        lin.backward(&Tensor::zeros(1, 2));
        lin.backward(&Tensor::zeros(1, 2));
    }

    #[test]
    #[should_panic(expected = "gradient shape doesn't match")]
    fn test_row_mismatch_panics() {
        let mut lin = layer(2, 2);
        lin.forward(&random_tensor(3, 2, 0));
        lin.backward(&Tensor::zeros(2, 2));
    }
}
