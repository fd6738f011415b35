//! Training Data and Loop
//!
//! Byte-level text encoding, random training windows, and plain SGD.
//!
//! ## How Windows Are Drawn
//!
//! Each step picks a uniformly random start in the text:
//!
//! ```text
//! Tokens: [t0, t1, t2, t3, t4, t5, t6, t7]
//! Seq length: 4, start = 2
//!
//!   Input:  [t2, t3, t4, t5]
//!   Target: [t3, t4, t5, t6]
//! ```
//!
//! The target is the input shifted by one position, teaching the model to
//! predict the next byte. Valid starts are `0..=len - seq_len - 1`.
//!
//! ## One Step
//!
//! ```text
//! logits        = model.forward(input)
//! loss, dLogits = cross_entropy(logits, target)
//! model.zero_grad(); model.backward(dLogits)
//! clip (optional); model.step(lr)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use minstrel::{train, ModelConfig, TrainableTransformer, TrainingConfig, WindowSampler};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let config = ModelConfig::poem();
//! let sampler = WindowSampler::from_file("poem.txt", config.seq_len)?;
//! let training = TrainingConfig::default();
//! let mut rng = StdRng::seed_from_u64(training.seed);
//! let mut model = TrainableTransformer::new(&config, &mut rng);
//!
//! let final_loss = train(&mut model, &sampler, &training, &mut rng, None)?;
//! # Ok::<(), minstrel::Error>(())
//! ```

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::gradients::{clip_gradients, grad_norm};
use crate::layers::Layer;
use crate::loss::cross_entropy;
use crate::model::TrainableTransformer;
use crate::training_logger::TrainingLogger;
use rand::Rng;
use std::path::Path;
use tracing::{info, warn};

/// Map text to token ids, one per byte
pub fn encode_bytes(text: &str) -> Vec<usize> {
    text.bytes().map(usize::from).collect()
}

/// Map token ids back to text
///
/// Ids above 255 are skipped; invalid UTF-8 is replaced.
pub fn decode_bytes(ids: &[usize]) -> String {
    let bytes: Vec<u8> = ids.iter().filter_map(|&id| u8::try_from(id).ok()).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Draws random `(input, target)` windows from a token stream
pub struct WindowSampler {
    tokens: Vec<usize>,
    seq_len: usize,
}

impl WindowSampler {
    /// Wrap a token stream
    ///
    /// Fails unless there are at least `seq_len + 1` tokens, the minimum for
    /// one shifted pair.
    pub fn new(tokens: Vec<usize>, seq_len: usize) -> Result<Self> {
        if seq_len == 0 || tokens.len() < seq_len + 1 {
            return Err(Error::InvalidConfig(format!(
                "training text has {} tokens, need at least {} for seq_len {}",
                tokens.len(),
                seq_len + 1,
                seq_len
            )));
        }
        Ok(Self { tokens, seq_len })
    }

    /// Read and byte-encode a text file
    pub fn from_file<P: AsRef<Path>>(path: P, seq_len: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let sampler = Self::new(encode_bytes(&text), seq_len)?;
        info!(tokens = sampler.tokens.len(), "loaded training text");
        Ok(sampler)
    }

    pub fn tokens(&self) -> &[usize] {
        &self.tokens
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Number of distinct window starts
    pub fn num_windows(&self) -> usize {
        self.tokens.len() - self.seq_len
    }

    /// The window beginning at `start`
    ///
    /// # Panics
    ///
    /// Panics if `start >= num_windows()`.
    pub fn window(&self, start: usize) -> (Vec<usize>, Vec<usize>) {
        assert!(
            start < self.num_windows(),
            "window start {} out of range ({} windows)",
            start,
            self.num_windows()
        );
        let input = self.tokens[start..start + self.seq_len].to_vec();
        let target = self.tokens[start + 1..start + self.seq_len + 1].to_vec();
        (input, target)
    }

    /// A window at a uniformly random start
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (Vec<usize>, Vec<usize>) {
        let start = rng.random_range(0..self.num_windows());
        self.window(start)
    }
}

/// Outcome of one optimization step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepMetrics {
    pub loss: f64,
    /// Gradient norm before clipping
    pub grad_norm: f64,
}

/// Run one forward/backward/SGD update on a single window
pub fn train_step(
    model: &mut TrainableTransformer,
    input: &[usize],
    target: &[usize],
    learning_rate: f64,
    grad_clip: Option<f64>,
) -> StepMetrics {
    let logits = model.forward(input);
    let (loss, grad_logits) = cross_entropy(&logits, target);

    model.zero_grad();
    model.backward(&grad_logits);

    let norm = match grad_clip {
        Some(max_norm) => clip_gradients(model, max_norm),
        None => grad_norm(model),
    };
    model.step(learning_rate);

    StepMetrics {
        loss,
        grad_norm: norm,
    }
}

/// Train for `config.steps` random windows and return the last loss
///
/// Metrics are logged every `config.log_every` steps and on the final step,
/// to `logger` when given and always as `tracing` events.
pub fn train<R: Rng + ?Sized>(
    model: &mut TrainableTransformer,
    sampler: &WindowSampler,
    config: &TrainingConfig,
    rng: &mut R,
    mut logger: Option<&mut TrainingLogger>,
) -> Result<f64> {
    config.validate()?;
    if sampler.seq_len() != model.config.seq_len {
        return Err(Error::InvalidConfig(format!(
            "sampler seq_len {} does not match model seq_len {}",
            sampler.seq_len(),
            model.config.seq_len
        )));
    }
    if let Some(&max_id) = sampler.tokens().iter().max() {
        if max_id >= model.config.vocab_size {
            return Err(Error::InvalidConfig(format!(
                "training text contains token {} but the vocabulary has {} entries",
                max_id, model.config.vocab_size
            )));
        }
    }

    info!(
        steps = config.steps,
        learning_rate = config.learning_rate,
        windows = sampler.num_windows(),
        "training started"
    );

    let mut last_loss = f64::NAN;
    for step in 0..config.steps {
        let (input, target) = sampler.sample(rng);
        let metrics = train_step(model, &input, &target, config.learning_rate, config.grad_clip);
        last_loss = metrics.loss;

        if !metrics.grad_norm.is_finite() {
            warn!(step, grad_norm = metrics.grad_norm, "non-finite gradient norm");
        }

        let is_last = step + 1 == config.steps;
        if step % config.log_every == 0 || is_last {
            match logger.as_deref_mut() {
                Some(logger) => {
                    logger.log(step, config.learning_rate, metrics.loss, metrics.grad_norm)?
                }
                None => info!(step, loss = metrics.loss, grad_norm = metrics.grad_norm, "step"),
            }
        }
    }

    Ok(last_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_byte_encoding_round_trip() {
        let text = "So that from point to point";
        let ids = encode_bytes(text);
        assert_eq!(ids[0], b'S' as usize);
        assert_eq!(decode_bytes(&ids), text);
        assert_eq!(decode_bytes(&[104, 105, 300]), "hi");
    }

    #[test]
    fn test_sampler_rejects_short_text() {
        assert!(WindowSampler::new(vec![1, 2, 3], 3).is_err());
        assert!(WindowSampler::new(vec![1, 2, 3, 4], 3).is_ok());
    }

    #[test]
    fn test_windows_are_shifted_pairs() {
        let sampler = WindowSampler::new((0..10).collect(), 4).unwrap();
        assert_eq!(sampler.num_windows(), 6);
        assert_eq!(sampler.window(5), (vec![5, 6, 7, 8], vec![6, 7, 8, 9]));

        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = [false; 6];
        for _ in 0..500 {
            let (input, target) = sampler.sample(&mut rng);
            assert_eq!(input.len(), 4);
            assert_eq!(&input[1..], &target[..3]);
            assert_eq!(target[3], input[3] + 1);
            seen[input[0]] = true;
        }
        // Both ends of the start range are reachable
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_train_step_reduces_loss_on_repeated_window() {
        let config = ModelConfig::tiny(5);
        let mut model = TrainableTransformer::new(&config, &mut StdRng::seed_from_u64(0));
        let input = [0, 1, 2];
        let target = [1, 2, 3];

        let first = train_step(&mut model, &input, &target, 0.2, None);
        let mut last = first;
        for _ in 0..50 {
            last = train_step(&mut model, &input, &target, 0.2, None);
        }
        assert!(last.loss < first.loss);
        assert!(first.grad_norm > 0.0);
    }

    #[test]
    fn test_train_is_deterministic_for_a_seed() {
        let config = ModelConfig::tiny(6);
        let tokens = encode_bytes("abcabcabc").iter().map(|b| b % 6).collect();
        let sampler = WindowSampler::new(tokens, 3).unwrap();
        let training = TrainingConfig {
            steps: 20,
            log_every: 5,
            learning_rate: 0.1,
            ..TrainingConfig::default()
        };

        let run = || {
            let mut rng = StdRng::seed_from_u64(training.seed);
            let mut model = TrainableTransformer::new(&config, &mut rng);
            train(&mut model, &sampler, &training, &mut rng, None).unwrap()
        };
        let a = run();
        assert!(a.is_finite());
        assert_eq!(a, run());
    }

    #[test]
    fn test_train_writes_csv_rows() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut logger = TrainingLogger::new(file.path()).unwrap();

        let config = ModelConfig::tiny(4);
        let sampler = WindowSampler::new(vec![0, 1, 2, 3, 0, 1, 2, 3], 3).unwrap();
        let training = TrainingConfig {
            steps: 7,
            log_every: 3,
            ..TrainingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut model = TrainableTransformer::new(&config, &mut rng);
        train(&mut model, &sampler, &training, &mut rng, Some(&mut logger)).unwrap();
        drop(logger);

        let text = std::fs::read_to_string(file.path()).unwrap();
        let steps: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(steps, vec!["0", "3", "6"]);
    }

    #[test]
    fn test_train_rejects_mismatched_seq_len() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut model = TrainableTransformer::new(&ModelConfig::tiny(4), &mut rng);
        let sampler = WindowSampler::new(vec![0; 10], 5).unwrap();
        let err = train(&mut model, &sampler, &TrainingConfig::default(), &mut rng, None);
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }
}
