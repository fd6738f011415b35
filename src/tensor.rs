//! Tensor Buffers
//!
//! Every layer in the engine exchanges the same unit: a flat, row-major buffer
//! of `f64` values with a row and column extent. Activations are
//! `[seq_len, features]`, weights are `[out, in]`, vectors such as biases and
//! LayerNorm scales are `[1, n]`.
//!
//! ## Memory Layout
//!
//! ```text
//! rows = 2, cols = 3
//! data = [r0c0, r0c1, r0c2, r1c0, r1c1, r1c2]
//! index(r, c) = r * cols + c
//! ```
//!
//! ## Parallelism
//!
//! Elementwise operations (`add`, `add_assign`, `scale`) are distributed with
//! Rayon. They have no data dependencies between elements, so the result is
//! identical to the sequential loop. Reductions (softmax, sums) stay
//! sequential so every forward pass is bit-for-bit reproducible.
//!
//! ## Example
//!
//! ```rust
//! use minstrel::Tensor;
//!
//! let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
//! let b = Tensor::filled(2, 2, 1.0);
//! let c = a.add(&b);
//! assert_eq!(c.data, vec![2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(c.row(1), &[4.0, 5.0]);
//! ```

use rayon::prelude::*;

/// Floor applied to a softmax denominator that underflowed to zero.
pub const SOFTMAX_DENOM_FLOOR: f64 = 1e-12;

/// A two-dimensional, row-major buffer of `f64` values
///
/// Tensors never alias: each one owns its storage outright, and the layer
/// that produced it in its most recent forward call is its only owner.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage of all elements, row-major
    pub data: Vec<f64>,
    /// Number of rows (positions for activations, outputs for weights)
    pub rows: usize,
    /// Number of columns (features)
    pub cols: usize,
}

impl Tensor {
    /// Create a tensor from existing data
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != rows * cols`
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "Data length ({}) doesn't match shape [{}, {}] (expected {})",
            data.len(),
            rows,
            cols,
            rows * cols
        );
        Self { data, rows, cols }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// Create a tensor with every element set to `value`
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    /// Shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Borrow one row
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Mutably borrow one row
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }

    /// Element-wise sum of two equally shaped tensors
    ///
    /// Used for residual connections and for adding positional embeddings.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ
    pub fn add(&self, other: &Tensor) -> Tensor {
        assert_eq!(
            self.shape(),
            other.shape(),
            "Shapes must match for addition"
        );
        let data = self
            .data
            .par_iter()
            .zip(&other.data)
            .map(|(a, b)| a + b)
            .collect();
        Tensor::new(data, self.rows, self.cols)
    }

    /// In-place element-wise accumulation: `self += other`
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ
    pub fn add_assign(&mut self, other: &Tensor) {
        assert_eq!(
            self.shape(),
            other.shape(),
            "Shapes must match for accumulation"
        );
        self.data
            .par_iter_mut()
            .zip(&other.data)
            .for_each(|(a, b)| *a += b);
    }

    /// Multiply every element by `factor` in place
    pub fn scale(&mut self, factor: f64) {
        self.data.par_iter_mut().for_each(|x| *x *= factor);
    }

    /// Set every element to `value`
    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Sum of squared elements
    pub fn sum_squares(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum()
    }

    /// True when no element is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

/// Numerically stable softmax over one row, in place
///
/// ```text
/// softmax(x)[i] = exp(x[i] - max(x)) / sum_j exp(x[j] - max(x))
/// ```
///
/// A denominator that underflows to exactly zero is replaced with
/// [`SOFTMAX_DENOM_FLOOR`] instead of producing NaN.
pub fn softmax_in_place(row: &mut [f64]) {
    let max = row.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let mut sum = 0.0;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    let denom = if sum == 0.0 { SOFTMAX_DENOM_FLOOR } else { sum };
    for x in row.iter_mut() {
        *x /= denom;
    }
}
