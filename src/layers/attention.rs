//! Self-Attention Mechanism
//!
//! A single causal attention head. Every position attends to itself and to
//! earlier positions only.
//!
//! ## Scaled Dot-Product Attention
//!
//! ```text
//! Q, K, V = q_proj(x), k_proj(x), v_proj(x)
//! S[i, j] = (Q[i] · K[j]) * scale     for j <= i,   scale = 1 / √dim
//! S[i, j] = -1e9                      for j >  i    (causal mask)
//! attn    = softmax_rows(S)
//! out     = out_proj(attn @ V)
//! ```
//!
//! The sentinel drives masked weights to exactly `0.0` after the
//! max-subtracted exponential, so causality holds exactly, not approximately.
//!
//! ## Backward Pass
//!
//! ```text
//! dOut        = out_proj.backward(dY)
//! dAttn[i, j] = dOut[i] · V[j]
//! dV[j]      += attn[i, j] * dOut[i]
//! dS[i, j]    = attn[i, j] * (dAttn[i, j] - Σ_k attn[i, k] dAttn[i, k]) * scale
//! dQ[i]      += dS[i, j] * K[j]
//! dK[j]      += dS[i, j] * Q[i]
//! dX          = q_proj.backward(dQ) + k_proj.backward(dK) + v_proj.backward(dV)
//! ```
//!
//! Q, K and V are all projections of the same input, so their input
//! gradients are summed.

use super::cache::ActivationCache;
use super::linear::{TrainableLinear, LINEAR_INIT_STD};
use super::Layer;
use crate::parameter::Parameter;
use crate::tensor::{softmax_in_place, Tensor};
use rand::Rng;

/// Score assigned to future positions before the softmax
pub const MASK_SENTINEL: f64 = -1e9;

/// Single-head causal self-attention
pub struct TrainableSingleHeadAttention {
    pub q_proj: TrainableLinear,
    pub k_proj: TrainableLinear,
    pub v_proj: TrainableLinear,
    pub out_proj: TrainableLinear,
    pub dim: usize,
    pub scale: f64,
    cache: ActivationCache<AttentionCache>,
}

/// Cache for attention backward pass
pub struct AttentionCache {
    pub q: Tensor,
    pub k: Tensor,
    pub v: Tensor,
    /// Post-softmax weights `[seq_len, seq_len]`
    pub attn: Tensor,
}

impl TrainableSingleHeadAttention {
    /// Create a new attention layer
    ///
    /// The four projections are drawn in query, key, value, output order.
    pub fn new<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Self {
        Self {
            q_proj: TrainableLinear::new(dim, dim, LINEAR_INIT_STD, rng),
            k_proj: TrainableLinear::new(dim, dim, LINEAR_INIT_STD, rng),
            v_proj: TrainableLinear::new(dim, dim, LINEAR_INIT_STD, rng),
            out_proj: TrainableLinear::new(dim, dim, LINEAR_INIT_STD, rng),
            dim,
            scale: 1.0 / (dim as f64).sqrt(),
            cache: ActivationCache::new(),
        }
    }

    /// Attention weights from the most recent forward pass
    ///
    /// Returns `None` once backward has consumed them.
    pub fn attention_weights(&self) -> Option<&Tensor> {
        self.cache.peek().map(|c| &c.attn)
    }
}

impl Layer for TrainableSingleHeadAttention {
    type Input = Tensor;
    type InputGrad = Tensor;

    fn forward(&mut self, x: &Tensor) -> Tensor {
        let seq_len = x.rows;
        let q = self.q_proj.forward(x);
        let k = self.k_proj.forward(x);
        let v = self.v_proj.forward(x);

        let mut attn = Tensor::zeros(seq_len, seq_len);
        for i in 0..seq_len {
            let q_row = q.row(i);
            let row = attn.row_mut(i);
            for (j, s) in row.iter_mut().enumerate() {
                *s = if j <= i {
                    q_row.iter().zip(k.row(j)).map(|(a, b)| a * b).sum::<f64>() * self.scale
                } else {
                    MASK_SENTINEL
                };
            }
            softmax_in_place(row);
        }

        // Weighted sum of values
        let mut mixed = Tensor::zeros(seq_len, self.dim);
        for i in 0..seq_len {
            let out = mixed.row_mut(i);
            for j in 0..=i {
                let w = attn.get(i, j);
                for (o, vv) in out.iter_mut().zip(v.row(j)) {
                    *o += w * vv;
                }
            }
        }

        let y = self.out_proj.forward(&mixed);
        self.cache.arm(AttentionCache { q, k, v, attn });
        y
    }

    fn backward(&mut self, grad_out: &Tensor) -> Tensor {
        let AttentionCache { q, k, v, attn } = self.cache.disarm("Attention");
        let seq_len = attn.rows;
        assert_eq!(
            grad_out.rows, seq_len,
            "Attention: gradient shape doesn't match the last forward output"
        );

        let d_mixed = self.out_proj.backward(grad_out);

        let mut dq = Tensor::zeros(seq_len, self.dim);
        let mut dk = Tensor::zeros(seq_len, self.dim);
        let mut dv = Tensor::zeros(seq_len, self.dim);
        let mut d_attn = vec![0.0; seq_len];

        for i in 0..seq_len {
            let d_out = d_mixed.row(i);
            let a_row = attn.row(i);

            for j in 0..seq_len {
                d_attn[j] = d_out.iter().zip(v.row(j)).map(|(a, b)| a * b).sum();
                for (g, d) in dv.row_mut(j).iter_mut().zip(d_out) {
                    *g += a_row[j] * d;
                }
            }

            let weighted: f64 = a_row.iter().zip(&d_attn).map(|(a, d)| a * d).sum();
            for j in 0..seq_len {
                let ds = a_row[j] * (d_attn[j] - weighted) * self.scale;
                for (g, kv) in dq.row_mut(i).iter_mut().zip(k.row(j)) {
                    *g += ds * kv;
                }
                for (g, qv) in dk.row_mut(j).iter_mut().zip(q.row(i)) {
                    *g += ds * qv;
                }
            }
        }

        let mut grad_x = self.q_proj.backward(&dq);
        grad_x.add_assign(&self.k_proj.backward(&dk));
        grad_x.add_assign(&self.v_proj.backward(&dv));
        grad_x
    }

    fn parameters(&self) -> Vec<&Parameter> {
        let mut params = self.q_proj.parameters();
        params.extend(self.k_proj.parameters());
        params.extend(self.v_proj.parameters());
        params.extend(self.out_proj.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params = self.q_proj.parameters_mut();
        params.extend(self.k_proj.parameters_mut());
        params.extend(self.v_proj.parameters_mut());
        params.extend(self.out_proj.parameters_mut());
        params
    }
}
