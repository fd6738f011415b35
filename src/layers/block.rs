//! Transformer Block
//!
//! One pre-norm block: attention and MLP, each behind its own LayerNorm and
//! wrapped in a residual connection.
//!
//! ## Architecture
//!
//! ```text
//! x → LayerNorm1 → Attention → (+) → LayerNorm2 → MLP → (+) → output
//! │                             ↑ r1                      ↑
//! └─────────────────────────────┘                         │
//!                               └─────────────────────────┘
//! ```
//!
//! ## Backward Pass
//!
//! Each residual splits the gradient into the skip path and the sublayer
//! path; the two are summed:
//!
//! ```text
//! dr1 = dOut + LN2.backward(MLP.backward(dOut))
//! dX  = dr1  + LN1.backward(Attn.backward(dr1))
//! ```

use super::attention::TrainableSingleHeadAttention;
use super::cache::ActivationCache;
use super::layer_norm::TrainableLayerNorm;
use super::mlp::TrainableMLP;
use super::Layer;
use crate::parameter::Parameter;
use crate::tensor::Tensor;
use rand::Rng;

/// Transformer block combining attention and MLP with residuals
pub struct TrainableTransformerBlock {
    pub ln1: TrainableLayerNorm,
    pub attn: TrainableSingleHeadAttention,
    pub ln2: TrainableLayerNorm,
    pub mlp: TrainableMLP,
    cache: ActivationCache<BlockCache>,
}

/// Cache for transformer block backward pass
///
/// The sublayers keep their own activations, so the block only records the
/// extent of the last forward output.
pub struct BlockCache {
    pub rows: usize,
}

impl TrainableTransformerBlock {
    /// Create a new transformer block
    ///
    /// Attention weights are drawn before MLP weights.
    pub fn new<R: Rng + ?Sized>(dim: usize, ff_hidden: usize, rng: &mut R) -> Self {
        let attn = TrainableSingleHeadAttention::new(dim, rng);
        let mlp = TrainableMLP::new(dim, ff_hidden, rng);
        Self {
            ln1: TrainableLayerNorm::new(dim),
            attn,
            ln2: TrainableLayerNorm::new(dim),
            mlp,
            cache: ActivationCache::new(),
        }
    }
}

impl Layer for TrainableTransformerBlock {
    type Input = Tensor;
    type InputGrad = Tensor;

    fn forward(&mut self, x: &Tensor) -> Tensor {
        let h1 = self.ln1.forward(x);
        let a = self.attn.forward(&h1);
        let r1 = x.add(&a);

        let h2 = self.ln2.forward(&r1);
        let m = self.mlp.forward(&h2);
        let out = r1.add(&m);

        self.cache.arm(BlockCache { rows: x.rows });
        out
    }

    fn backward(&mut self, grad_out: &Tensor) -> Tensor {
        let BlockCache { rows } = self.cache.disarm("TransformerBlock");
        assert_eq!(
            grad_out.rows, rows,
            "TransformerBlock: gradient shape doesn't match the last forward output"
        );

        // Second residual: skip path + MLP path
        let mut grad_r1 = grad_out.clone();
        let grad_h2 = self.mlp.backward(grad_out);
        grad_r1.add_assign(&self.ln2.backward(&grad_h2));

        // First residual: skip path + attention path
        let mut grad_x = grad_r1.clone();
        let grad_h1 = self.attn.backward(&grad_r1);
        grad_x.add_assign(&self.ln1.backward(&grad_h1));
        grad_x
    }

    /// LayerNorms first, then the attention projections, then the MLP
    fn parameters(&self) -> Vec<&Parameter> {
        let mut params = self.ln1.parameters();
        params.extend(self.ln2.parameters());
        params.extend(self.attn.parameters());
        params.extend(self.mlp.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params = self.ln1.parameters_mut();
        params.extend(self.ln2.parameters_mut());
        params.extend(self.attn.parameters_mut());
        params.extend(self.mlp.parameters_mut());
        params
    }
}
