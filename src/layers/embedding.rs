//! Embedding Lookup
//!
//! Maps integer ids to rows of a learned table. The model uses two of these:
//! one indexed by token id (`[vocab, n_embd]`) and one indexed by absolute
//! position (`[seq_len, n_embd]`).
//!
//! ## Backward Pass
//!
//! The lookup is a gather, so the gradient is a scatter-add:
//!
//! ```text
//! dE[ids[r], d] += dX[r, d]
//! ```
//!
//! When the same id appears at several positions its contributions are
//! summed, never overwritten.

use super::cache::ActivationCache;
use super::Layer;
use crate::parameter::Parameter;
use crate::tensor::Tensor;
use rand::Rng;

/// Standard deviation for token and position tables
pub const EMBEDDING_INIT_STD: f64 = 0.1;

/// Learned lookup table
pub struct TrainableEmbedding {
    pub weight: Parameter, // [count, dim]
    pub count: usize,
    pub dim: usize,
    cache: ActivationCache<EmbeddingCache>,
}

/// Cache for embedding backward pass
pub struct EmbeddingCache {
    pub ids: Vec<usize>,
}

impl TrainableEmbedding {
    /// Create a table of `count` rows drawn from N(0, init_std²)
    pub fn new<R: Rng + ?Sized>(count: usize, dim: usize, init_std: f64, rng: &mut R) -> Self {
        Self {
            weight: Parameter::randn(count, dim, init_std, rng),
            count,
            dim,
            cache: ActivationCache::new(),
        }
    }
}

impl Layer for TrainableEmbedding {
    type Input = [usize];
    type InputGrad = ();

    /// Gather one row per id
    ///
    /// # Panics
    ///
    /// Panics if any id is `>= count`; callers validate ids first.
    fn forward(&mut self, ids: &[usize]) -> Tensor {
        let mut x = Tensor::zeros(ids.len(), self.dim);
        for (r, &id) in ids.iter().enumerate() {
            assert!(
                id < self.count,
                "Embedding: id {} out of range (table has {} rows)",
                id,
                self.count
            );
            x.row_mut(r).copy_from_slice(self.weight.value.row(id));
        }
        self.cache.arm(EmbeddingCache { ids: ids.to_vec() });
        x
    }

    fn backward(&mut self, grad_out: &Tensor) {
        let EmbeddingCache { ids } = self.cache.disarm("Embedding");
        assert_eq!(
            grad_out.shape(),
            (ids.len(), self.dim),
            "Embedding: gradient shape doesn't match the last forward output"
        );
        for (r, &id) in ids.iter().enumerate() {
            let dst = self.weight.grad.row_mut(id);
            for (d, g) in dst.iter_mut().zip(grad_out.row(r)) {
                *d += g;
            }
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table() -> TrainableEmbedding {
        let mut emb = TrainableEmbedding::new(4, 2, 0.1, &mut StdRng::seed_from_u64(0));
        emb.weight.value = Tensor::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 4, 2);
        emb
    }

    #[test]
    fn test_forward_gathers_rows() {
        let mut emb = table();
        let x = emb.forward(&[3, 0, 3]);
        assert_eq!(x.shape(), (3, 2));
        assert_eq!(x.data, vec![6.0, 7.0, 0.0, 1.0, 6.0, 7.0]);
    }

    #[test]
    fn test_backward_sums_repeated_ids() {
        let mut emb = table();
        emb.forward(&[1, 2, 1]);
        emb.backward(&Tensor::new(vec![1.0, 1.0, 0.5, 0.5, 2.0, 3.0], 3, 2));

        assert_eq!(emb.weight.grad.row(0), &[0.0, 0.0]);
        assert_eq!(emb.weight.grad.row(1), &[3.0, 4.0]);
        assert_eq!(emb.weight.grad.row(2), &[0.5, 0.5]);
        assert_eq!(emb.weight.grad.row(3), &[0.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_id_panics() {
        table().forward(&[4]);
    }

    #[test]
    #[should_panic(expected = "Embedding: backward called without a preceding forward")]
    fn test_backward_without_forward_panics() {
        table().backward(&Tensor::zeros(1, 2));
    }
}
