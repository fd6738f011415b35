//! Trainable Parameters
//!
//! A [`Parameter`] pairs a value tensor with a gradient tensor of the same
//! shape. Backward passes only ever add into `grad`; `zero_grad` resets it and
//! `step` applies plain gradient descent:
//!
//! ```text
//! value -= lr * grad
//! ```
//!
//! Calling `step` after `zero_grad` without a backward pass in between
//! subtracts zero, so it leaves `value` untouched.

use crate::tensor::Tensor;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

/// A tensor plus its gradient accumulator
#[derive(Clone, Debug)]
pub struct Parameter {
    pub value: Tensor,
    pub grad: Tensor,
}

impl Parameter {
    /// Wrap an existing tensor; the gradient starts at zero
    pub fn new(value: Tensor) -> Self {
        let grad = Tensor::zeros(value.rows, value.cols);
        Self { value, grad }
    }

    /// Parameter with every element set to `value`
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self::new(Tensor::filled(rows, cols, value))
    }

    /// Parameter drawn from N(0, std²)
    ///
    /// Each element is an independent standard-normal draw from `rng`, scaled
    /// by `std`. Passing the generator in keeps initialization reproducible
    /// from a seed.
    pub fn randn<R: Rng + ?Sized>(rows: usize, cols: usize, std: f64, rng: &mut R) -> Self {
        let data = (0..rows * cols)
            .map(|_| {
                let z: f64 = StandardNormal.sample(rng);
                z * std
            })
            .collect();
        Self::new(Tensor::new(data, rows, cols))
    }

    /// Reset the gradient to all zeros
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    /// Gradient descent update: `value -= lr * grad`
    pub fn step(&mut self, lr: f64) {
        self.value
            .data
            .par_iter_mut()
            .zip(&self.grad.data)
            .for_each(|(w, g)| *w -= lr * g);
    }

    /// Number of scalar values held
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// True when the parameter is empty
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}
