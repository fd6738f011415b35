//! Model and Training Configuration
//!
//! Both configs derive serde so they can be loaded from JSON alongside a
//! checkpoint:
//!
//! ```json
//! { "vocab_size": 256, "n_embd": 64, "seq_len": 64, "ff_hidden": 128 }
//! ```
//!
//! ## Parameter Count
//!
//! ```text
//! embeddings = (vocab_size + seq_len) × n_embd
//! layer norms = 4 × n_embd
//! attention  = 4 × (n_embd² + n_embd)
//! mlp        = 2 × n_embd × ff_hidden + ff_hidden + n_embd
//! head       = n_embd × vocab_size + vocab_size
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model hyperparameters
///
/// - `vocab_size`: number of token ids (256 for raw bytes)
/// - `n_embd`: width of every activation
/// - `seq_len`: exact length of every input sequence
/// - `ff_hidden`: width of the MLP's GELU layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub n_embd: usize,
    pub seq_len: usize,
    pub ff_hidden: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::poem()
    }
}

impl ModelConfig {
    /// Byte-level model used by the demo driver
    ///
    /// **~71K parameters**
    pub fn poem() -> Self {
        Self {
            vocab_size: 256, // one id per byte value
            n_embd: 64,
            seq_len: 64,
            ff_hidden: 128, // 2× expansion
        }
    }

    /// A model small enough for gradient checks
    ///
    /// # Arguments
    ///
    /// * `vocab_size` - Size of vocabulary
    pub fn tiny(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            n_embd: 4,
            seq_len: 3,
            ff_hidden: 8,
        }
    }

    /// Reject zero-sized dimensions and extents the persistence format can't
    /// store in an `i32`
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("vocab_size", self.vocab_size),
            ("n_embd", self.n_embd),
            ("seq_len", self.seq_len),
            ("ff_hidden", self.ff_hidden),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
            if value > i32::MAX as usize {
                return Err(Error::InvalidConfig(format!(
                    "{name} = {value} exceeds the checkpoint format's range"
                )));
            }
        }
        Ok(())
    }

    /// Read and validate a JSON config
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of trainable scalars a model with this config holds
    pub fn parameter_count(&self) -> usize {
        let (v, d, s, h) = (self.vocab_size, self.n_embd, self.seq_len, self.ff_hidden);
        (v + s) * d + 4 * d + 4 * (d * d + d) + (2 * d * h + h + d) + (d * v + v)
    }
}

/// Settings for the training loop
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub steps: usize,
    /// Log a metrics row every this many steps (and on the last step)
    pub log_every: usize,
    pub seed: u64,
    /// Clip the global gradient norm to this value before each update
    pub grad_clip: Option<f64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 5e-3,
            steps: 20_000,
            log_every: 100,
            seed: 1234,
            grad_clip: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.log_every == 0 {
            return Err(Error::InvalidConfig("log_every must be positive".into()));
        }
        if let Some(clip) = self.grad_clip {
            if !(clip.is_finite() && clip > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "grad_clip must be positive, got {clip}"
                )));
            }
        }
        Ok(())
    }

    /// Read and validate a JSON config; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}
