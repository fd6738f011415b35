//! Multi-Layer Perceptron (MLP)
//!
//! The feedforward half of the transformer block.
//!
//! ## Architecture
//!
//! ```text
//! x → fc1 (dim → ff_hidden) → GELU → fc2 (ff_hidden → dim) → y
//! ```
//!
//! The hidden width is a model hyperparameter (`ff_hidden`) rather than a
//! fixed multiple of `dim`.
//!
//! ## Backward Pass
//!
//! ```text
//! dH   = fc2.backward(dY)
//! dPre = dH * GELU'(pre)
//! dX   = fc1.backward(dPre)
//! ```

use super::activation::{gelu_backward, gelu_forward};
use super::cache::ActivationCache;
use super::linear::{TrainableLinear, LINEAR_INIT_STD};
use super::Layer;
use crate::parameter::Parameter;
use crate::tensor::Tensor;
use rand::Rng;

/// MLP (feedforward network) with GELU activation
pub struct TrainableMLP {
    pub fc1: TrainableLinear,
    pub fc2: TrainableLinear,
    cache: ActivationCache<MLPCache>,
}

/// Cache for MLP backward pass
pub struct MLPCache {
    /// fc1 output before GELU
    pub h: Tensor,
}

impl TrainableMLP {
    /// Create a new MLP
    ///
    /// # Arguments
    ///
    /// * `dim` - Input and output width
    /// * `hidden` - Width of the GELU layer
    /// * `rng` - Source of the weight draws (fc1 first)
    pub fn new<R: Rng + ?Sized>(dim: usize, hidden: usize, rng: &mut R) -> Self {
        Self {
            fc1: TrainableLinear::new(dim, hidden, LINEAR_INIT_STD, rng),
            fc2: TrainableLinear::new(hidden, dim, LINEAR_INIT_STD, rng),
            cache: ActivationCache::new(),
        }
    }
}

impl Layer for TrainableMLP {
    type Input = Tensor;
    type InputGrad = Tensor;

    fn forward(&mut self, x: &Tensor) -> Tensor {
        let h = self.fc1.forward(x);
        let y = self.fc2.forward(&gelu_forward(&h));
        self.cache.arm(MLPCache { h });
        y
    }

    fn backward(&mut self, grad_out: &Tensor) -> Tensor {
        let MLPCache { h } = self.cache.disarm("MLP");
        let grad_act = self.fc2.backward(grad_out);
        self.fc1.backward(&gelu_backward(&grad_act, &h))
    }

    fn parameters(&self) -> Vec<&Parameter> {
        let mut params = self.fc1.parameters();
        params.extend(self.fc2.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params = self.fc1.parameters_mut();
        params.extend(self.fc2.parameters_mut());
        params
    }
}
