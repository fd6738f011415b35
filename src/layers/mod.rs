//! Neural Network Layers
//!
//! Every layer of the model provides a forward pass, a hand-written backward
//! pass, and the two parameter operations training needs.
//!
//! ## Layers
//!
//! - **embedding**: token / position lookup tables
//! - **linear**: affine transform `y = x Wᵀ + b`
//! - **layer_norm**: per-row normalization with learnable scale and shift
//! - **activation**: GELU (tanh approximation) and its derivative
//! - **attention**: single-head causal self-attention
//! - **mlp**: two-layer feedforward network
//! - **block**: pre-norm transformer block with two residual connections
//!
//! ## Design Pattern
//!
//! Each layer owns its [`Parameter`]s and a single-slot
//! [`ActivationCache`]. The cache is armed by `forward` and consumed by
//! `backward`:
//!
//! ```rust,ignore
//! let y = layer.forward(&x);       // arms the cache
//! layer.zero_grad();
//! let dx = layer.backward(&dy);    // disarms it, accumulates into grads
//! layer.step(lr);                  // value -= lr * grad
//! ```
//!
//! Gradients accumulate: two backward passes without `zero_grad` in between
//! add their contributions.

pub mod activation;
pub mod attention;
pub mod block;
pub mod cache;
pub mod embedding;
pub mod layer_norm;
pub mod linear;
pub mod mlp;

pub use activation::{gelu, gelu_backward, gelu_forward, gelu_grad};
pub use attention::{AttentionCache, TrainableSingleHeadAttention, MASK_SENTINEL};
pub use block::{BlockCache, TrainableTransformerBlock};
pub use cache::ActivationCache;
pub use embedding::{EmbeddingCache, TrainableEmbedding};
pub use layer_norm::{LayerNormCache, TrainableLayerNorm, LAYER_NORM_EPS};
pub use linear::{LinearCache, TrainableLinear};
pub use mlp::{MLPCache, TrainableMLP};

use crate::parameter::Parameter;
use crate::tensor::Tensor;

/// The capability set shared by every layer variant
///
/// `Input` is what `forward` consumes (a tensor for most layers, token ids
/// for embeddings and the full model). `InputGrad` is what `backward`
/// returns: the gradient with respect to a tensor input, or `()` when the
/// input is discrete.
pub trait Layer {
    type Input: ?Sized;
    type InputGrad;

    /// Compute the output and arm the activation cache
    fn forward(&mut self, input: &Self::Input) -> Tensor;

    /// Consume the activation cache, accumulate parameter gradients, and
    /// return the gradient with respect to the input
    ///
    /// # Panics
    ///
    /// Panics if there is no outstanding forward pass, or if `grad_out` does
    /// not match the shape of the last forward output.
    fn backward(&mut self, grad_out: &Tensor) -> Self::InputGrad;

    /// All parameters, in persistence order
    fn parameters(&self) -> Vec<&Parameter>;

    /// All parameters, mutably, in persistence order
    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    /// Reset every gradient to zero
    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }

    /// Apply `value -= lr * grad` to every parameter
    fn step(&mut self, lr: f64) {
        for p in self.parameters_mut() {
            p.step(lr);
        }
    }

    /// Total number of trainable scalars
    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }
}
