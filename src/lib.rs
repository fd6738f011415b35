//! Minstrel: a single-block causal transformer with hand-written gradients
//!
//! A byte-level language model small enough to read end to end: token and
//! position embeddings, one pre-norm transformer block (single-head causal
//! attention plus a GELU MLP), and a linear head. Every layer implements its
//! own backward pass; there is no automatic differentiation.
//!
//! # Modules
//!
//! - [`tensor`] - Row-major `f64` buffers
//! - [`parameter`] - Weights paired with gradient accumulators
//! - [`layers`] - Embedding, Linear, LayerNorm, attention, MLP, block
//! - [`model`] - The full model
//! - [`loss`] - Softmax cross-entropy
//! - [`sampling`] - Categorical sampling and text generation
//! - [`checkpoint`] - Binary weight files
//! - [`config`] - Model and training settings
//! - [`train`] - Byte encoding, training windows, SGD loop
//! - [`gradients`] - Gradient norm and clipping
//! - [`training_logger`] - CSV metrics
//!
//! # Example
//!
//! ```rust
//! use minstrel::{
//!     cross_entropy, encode_bytes, generate, Layer, ModelConfig, TrainableTransformer,
//! };
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(1234);
//! let config = ModelConfig {
//!     vocab_size: 256,
//!     n_embd: 8,
//!     seq_len: 4,
//!     ff_hidden: 16,
//! };
//! let mut model = TrainableTransformer::new(&config, &mut rng);
//!
//! let ids = encode_bytes("Tomorrow");
//! let logits = model.forward(&ids[0..4]);
//! let (loss, grad) = cross_entropy(&logits, &ids[1..5]);
//! model.zero_grad();
//! model.backward(&grad);
//! model.step(5e-3);
//! assert!(loss.is_finite());
//!
//! let text = generate(&mut model, &ids[4..8], 10, &mut rng);
//! assert_eq!(text.len(), 10);
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod gradients;
pub mod layers;
pub mod loss;
pub mod model;
pub mod parameter;
pub mod sampling;
pub mod tensor;
pub mod train;
pub mod training_logger;

// Re-export main types for convenience
pub use config::{ModelConfig, TrainingConfig};
pub use error::{Error, Result};
pub use layers::Layer;
pub use loss::cross_entropy;
pub use model::TrainableTransformer;
pub use parameter::Parameter;
pub use sampling::{generate, initial_context, sample_from_probs, sample_next};
pub use tensor::Tensor;
pub use train::{decode_bytes, encode_bytes, train, train_step, StepMetrics, WindowSampler};
pub use training_logger::TrainingLogger;
