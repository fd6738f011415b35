//! Single-Slot Activation Cache
//!
//! Each layer remembers exactly one forward pass. [`ActivationCache`] makes
//! that explicit: `arm` stores the values a forward call produced, `disarm`
//! hands them to the matching backward call and empties the slot.
//!
//! ```text
//! forward  → arm      (slot: Disarmed|Armed → Armed, old values dropped)
//! backward → disarm   (slot: Armed → Disarmed)
//! backward → disarm   (slot: Disarmed → panic)
//! ```
//!
//! A second backward without an intervening forward is a usage error, so it
//! panics instead of silently reusing stale activations.

/// Activation memory for one forward/backward pair
#[derive(Debug)]
pub struct ActivationCache<T> {
    slot: Option<T>,
}

impl<T> Default for ActivationCache<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T> ActivationCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the activations of a forward pass, replacing any previous ones
    pub fn arm(&mut self, values: T) {
        self.slot = Some(values);
    }

    /// Take the activations for a backward pass
    ///
    /// # Panics
    ///
    /// Panics if no forward pass is outstanding. `layer` names the caller in
    /// the message.
    pub fn disarm(&mut self, layer: &str) -> T {
        match self.slot.take() {
            Some(values) => values,
            None => panic!("{layer}: backward called without a preceding forward"),
        }
    }

    /// Inspect the cached activations without consuming them
    pub fn peek(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_then_disarm() {
        let mut cache = ActivationCache::new();
        assert!(!cache.is_armed());

        cache.arm(3usize);
        assert_eq!(cache.peek(), Some(&3));
        assert_eq!(cache.disarm("test"), 3);
        assert!(!cache.is_armed());
    }

    #[test]
    fn test_rearm_replaces_previous_values() {
        let mut cache = ActivationCache::new();
        cache.arm(1usize);
        cache.arm(2usize);
        assert_eq!(cache.disarm("test"), 2);
    }

    #[test]
    #[should_panic(expected = "Linear: backward called without a preceding forward")]
    fn test_double_disarm_panics() {
        let mut cache = ActivationCache::new();
        cache.arm(());
        cache.disarm("Linear");
        cache.disarm("Linear");
    }
}
