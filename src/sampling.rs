//! Sampling and Text Generation
//!
//! Inverse-CDF categorical sampling over a softmax, and the sliding-window
//! generation loop built on it.
//!
//! ## Generation
//!
//! The model only accepts exactly `seq_len` tokens, so generation keeps a
//! fixed-width window:
//!
//! ```text
//! context = [c0, c1, ..., c(n-1)]
//! logits  = model.forward(context)
//! next    = sample(logits[n-1])
//! context = [c1, ..., c(n-1), next]
//! ```
//!
//! All randomness comes from the generator the caller passes in.

use crate::layers::Layer;
use crate::model::TrainableTransformer;
use crate::tensor::softmax_in_place;
use rand::Rng;

/// Byte used to pad the initial generation context
pub const CONTEXT_PAD: usize = b' ' as usize;

/// Select the first index whose cumulative probability reaches `draw`
///
/// Falls back to the last index when rounding leaves the running sum just
/// short of `draw`.
pub fn sample_from_probs(probs: &[f64], draw: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p;
        if draw <= cumulative {
            return i;
        }
    }
    probs.len().saturating_sub(1)
}

/// Sample a token id from one row of logits
pub fn sample_next<R: Rng + ?Sized>(logits_row: &[f64], rng: &mut R) -> usize {
    let mut probs = logits_row.to_vec();
    softmax_in_place(&mut probs);
    let draw: f64 = rng.random();
    sample_from_probs(&probs, draw)
}

/// Starting window for generation: padding with one random id at the end
pub fn initial_context<R: Rng + ?Sized>(seq_len: usize, vocab_size: usize, rng: &mut R) -> Vec<usize> {
    let mut context = vec![CONTEXT_PAD.min(vocab_size - 1); seq_len];
    if let Some(last) = context.last_mut() {
        *last = rng.random_range(0..vocab_size);
    }
    context
}

/// Generate `count` token ids, sliding `context` one position per sample
///
/// # Panics
///
/// Panics if `context.len()` differs from the model's `seq_len`.
pub fn generate<R: Rng + ?Sized>(
    model: &mut TrainableTransformer,
    context: &[usize],
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let seq_len = model.config.seq_len;
    assert_eq!(
        context.len(),
        seq_len,
        "Generation: context must hold exactly {} tokens, got {}",
        seq_len,
        context.len()
    );

    let mut window = context.to_vec();
    let mut generated = Vec::with_capacity(count);
    for _ in 0..count {
        let logits = model.forward(&window);
        let next = sample_next(logits.row(seq_len - 1), rng);
        generated.push(next);

        window.rotate_left(1);
        window[seq_len - 1] = next;
    }
    generated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_from_probs_inverse_cdf() {
        let probs = [0.2, 0.5, 0.3];
        assert_eq!(sample_from_probs(&probs, 0.0), 0);
        assert_eq!(sample_from_probs(&probs, 0.2), 0);
        assert_eq!(sample_from_probs(&probs, 0.2001), 1);
        assert_eq!(sample_from_probs(&probs, 0.69), 1);
        assert_eq!(sample_from_probs(&probs, 0.71), 2);
    }

    #[test]
    fn test_sample_from_probs_falls_back_to_last() {
        // Cumulative sum stops short of the draw
        assert_eq!(sample_from_probs(&[0.3, 0.3, 0.3999], 0.9999999), 2);
    }

    #[test]
    fn test_dominant_logit_always_sampled() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut row = vec![0.0; 16];
        row[11] = 100.0;
        for _ in 0..1000 {
            assert_eq!(sample_next(&row, &mut rng), 11);
        }
    }

    #[test]
    fn test_same_seed_same_samples() {
        let row = [0.1, 0.4, -0.3, 0.9];
        let draws = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50).map(|_| sample_next(&row, &mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(draws(5), draws(5));
    }

    #[test]
    fn test_initial_context_is_padded() {
        let mut rng = StdRng::seed_from_u64(0);
        let context = initial_context(8, 256, &mut rng);
        assert_eq!(context.len(), 8);
        assert!(context[..7].iter().all(|&c| c == CONTEXT_PAD));
        assert!(context[7] < 256);

        // Small vocabularies pad with their last id
        assert!(initial_context(3, 5, &mut rng)[..2].iter().all(|&c| c == 4));
    }

    #[test]
    fn test_generate_is_reproducible_and_in_range() {
        let config = ModelConfig::tiny(7);
        let mut model = TrainableTransformer::new(&config, &mut StdRng::seed_from_u64(1));

        let run = |model: &mut TrainableTransformer| {
            let mut rng = StdRng::seed_from_u64(2);
            generate(model, &[0, 1, 2], 20, &mut rng)
        };
        let a = run(&mut model);
        let b = run(&mut model);
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
        assert!(a.iter().all(|&t| t < 7));
    }

    #[test]
    #[should_panic(expected = "exactly 3 tokens")]
    fn test_generate_rejects_short_context() {
        let config = ModelConfig::tiny(7);
        let mut model = TrainableTransformer::new(&config, &mut StdRng::seed_from_u64(1));
        generate(&mut model, &[0], 1, &mut StdRng::seed_from_u64(0));
    }
}
