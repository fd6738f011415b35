//! Cross-Entropy Loss
//!
//! ```text
//! p        = softmax(logits[r])                 (max-subtracted)
//! loss     = mean_r  -ln(max(p[target[r]], 1e-12))
//! dLogits  = (p - one_hot(target[r])) / rows
//! ```
//!
//! The gradient is built in the probability buffer itself: the target
//! probability is read for the loss before the one-hot subtraction.

use crate::tensor::{softmax_in_place, Tensor};

/// Smallest probability fed to `ln`
pub const PROB_FLOOR: f64 = 1e-12;

/// Mean cross-entropy over rows and its gradient with respect to the logits
///
/// # Panics
///
/// Panics if `targets.len() != logits.rows` or a target is not a valid
/// column.
pub fn cross_entropy(logits: &Tensor, targets: &[usize]) -> (f64, Tensor) {
    assert_eq!(
        targets.len(),
        logits.rows,
        "Loss: {} targets for {} rows of logits",
        targets.len(),
        logits.rows
    );
    let rows = logits.rows as f64;
    let mut grad = logits.clone();
    let mut loss = 0.0;

    for (r, &target) in targets.iter().enumerate() {
        assert!(
            target < logits.cols,
            "Loss: target {} out of range (vocab {})",
            target,
            logits.cols
        );
        let row = grad.row_mut(r);
        softmax_in_place(row);
        loss -= row[target].max(PROB_FLOOR).ln();
        row[target] -= 1.0;
    }

    grad.scale(1.0 / rows);
    (loss / rows, grad)
}
