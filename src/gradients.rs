//! Gradient Utilities
//!
//! Monitoring and clipping of the accumulated parameter gradients.
//!
//! ## Algorithm
//!
//! ```text
//! norm = √(Σ gradient²)               // over every parameter of the layer
//! if norm > max_norm:
//!     gradients *= (max_norm / norm)  // same factor everywhere
//! ```
//!
//! Scaling every gradient by one factor preserves the direction of the update
//! while bounding its size.
//!
//! ## Example
//!
//! ```rust
//! use minstrel::gradients::{clip_gradients, grad_norm};
//! use minstrel::{cross_entropy, Layer, ModelConfig, TrainableTransformer};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut model = TrainableTransformer::new(&ModelConfig::tiny(5), &mut StdRng::seed_from_u64(0));
//! let (_, grad) = cross_entropy(&model.forward(&[0, 1, 2]), &[1, 2, 3]);
//! model.zero_grad();
//! model.backward(&grad);
//!
//! clip_gradients(&mut model, 1e-3);
//! assert!(grad_norm(&model) <= 1e-3 + 1e-12);
//! ```

use crate::layers::Layer;

/// L2 norm of all gradients held by `layer`
///
/// Summed sequentially in parameter order, so the result is reproducible.
pub fn grad_norm<L: Layer + ?Sized>(layer: &L) -> f64 {
    layer
        .parameters()
        .iter()
        .map(|p| p.grad.sum_squares())
        .sum::<f64>()
        .sqrt()
}

/// Clip gradients to a maximum norm
///
/// Returns the norm measured before clipping. Gradients are only rescaled
/// when that norm exceeds `max_norm`; a non-finite norm leaves them as they
/// are.
pub fn clip_gradients<L: Layer + ?Sized>(layer: &mut L, max_norm: f64) -> f64 {
    let norm = grad_norm(layer);
    if norm.is_finite() && norm > max_norm {
        let scale = max_norm / norm;
        for p in layer.parameters_mut() {
            p.grad.scale(scale);
        }
    }
    norm
}
