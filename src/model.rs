//! Single-Block Causal Transformer
//!
//! The full model: learned token and position embeddings, one transformer
//! block, and a linear head onto the vocabulary.
//!
//! ## Architecture Overview
//!
//! ```text
//! Input tokens [seq_len]
//!     ↓
//! Token Embedding [seq_len, n_embd]
//!     + Position Embedding [seq_len, n_embd]   (positions 0..seq_len)
//!     ↓
//! Transformer Block (LN → Attention → + → LN → MLP → +)
//!     ↓
//! Linear head → logits [seq_len, vocab_size]
//! ```
//!
//! There is no final LayerNorm before the head.
//!
//! ## Training Step
//!
//! ```rust
//! use minstrel::{cross_entropy, Layer, ModelConfig, TrainableTransformer};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let mut model = TrainableTransformer::new(&ModelConfig::tiny(5), &mut rng);
//!
//! let logits = model.forward(&[0, 1, 2]);
//! let (loss, grad) = cross_entropy(&logits, &[1, 2, 3]);
//! model.zero_grad();
//! model.backward(&grad);
//! model.step(5e-3);
//! assert!(loss > 0.0);
//! ```

use crate::config::ModelConfig;
use crate::layers::embedding::EMBEDDING_INIT_STD;
use crate::layers::linear::LINEAR_INIT_STD;
use crate::layers::{Layer, TrainableEmbedding, TrainableLinear, TrainableTransformerBlock};
use crate::parameter::Parameter;
use crate::tensor::Tensor;
use rand::Rng;
use tracing::debug;

/// Embeddings, one transformer block and a vocabulary head
pub struct TrainableTransformer {
    pub config: ModelConfig,
    pub token_emb: TrainableEmbedding,
    pub pos_emb: TrainableEmbedding,
    pub block: TrainableTransformerBlock,
    pub head: TrainableLinear,
    positions: Vec<usize>,
}

impl TrainableTransformer {
    /// Build a freshly initialized model
    ///
    /// Weights are drawn from `rng` in order: token embedding, position
    /// embedding, attention projections, MLP, head.
    pub fn new<R: Rng + ?Sized>(config: &ModelConfig, rng: &mut R) -> Self {
        let token_emb =
            TrainableEmbedding::new(config.vocab_size, config.n_embd, EMBEDDING_INIT_STD, rng);
        let pos_emb =
            TrainableEmbedding::new(config.seq_len, config.n_embd, EMBEDDING_INIT_STD, rng);
        let block = TrainableTransformerBlock::new(config.n_embd, config.ff_hidden, rng);
        let head = TrainableLinear::new(config.n_embd, config.vocab_size, LINEAR_INIT_STD, rng);

        let model = Self {
            config: config.clone(),
            token_emb,
            pos_emb,
            block,
            head,
            positions: (0..config.seq_len).collect(),
        };
        debug!(
            vocab_size = config.vocab_size,
            n_embd = config.n_embd,
            seq_len = config.seq_len,
            ff_hidden = config.ff_hidden,
            parameters = model.parameter_count(),
            "model initialized"
        );
        model
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

impl Layer for TrainableTransformer {
    type Input = [usize];
    type InputGrad = ();

    /// Tokens → logits `[seq_len, vocab_size]`
    ///
    /// # Panics
    ///
    /// Panics unless `tokens.len() == seq_len` and every id is below
    /// `vocab_size`.
    fn forward(&mut self, tokens: &[usize]) -> Tensor {
        assert_eq!(
            tokens.len(),
            self.config.seq_len,
            "Model: expected {} tokens, got {}",
            self.config.seq_len,
            tokens.len()
        );
        let x = self.token_emb.forward(tokens);
        let p = self.pos_emb.forward(&self.positions);
        let hidden = self.block.forward(&x.add(&p));
        self.head.forward(&hidden)
    }

    /// Back-propagate a logits gradient into every parameter
    ///
    /// The embedding sum feeds the block, so both tables receive the same
    /// input gradient.
    fn backward(&mut self, grad_logits: &Tensor) {
        let grad_hidden = self.head.backward(grad_logits);
        let grad_x = self.block.backward(&grad_hidden);
        self.token_emb.backward(&grad_x);
        self.pos_emb.backward(&grad_x);
    }

    /// Same order as the checkpoint layout
    fn parameters(&self) -> Vec<&Parameter> {
        let mut params = self.token_emb.parameters();
        params.extend(self.pos_emb.parameters());
        params.extend(self.block.parameters());
        params.extend(self.head.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params = self.token_emb.parameters_mut();
        params.extend(self.pos_emb.parameters_mut());
        params.extend(self.block.parameters_mut());
        params.extend(self.head.parameters_mut());
        params
    }
}
