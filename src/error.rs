//! Recoverable failures
//!
//! Shape violations between layers are programming errors and panic. Anything
//! a caller can reasonably recover from (a missing checkpoint, a checkpoint
//! written for a different model, a malformed config file) is an [`Error`].

use thiserror::Error;

/// Errors from persistence, configuration and data preparation
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "checkpoint hyperparameters (vocab={stored_vocab}, dim={stored_dim}, seq_len={stored_seq_len}) \
         do not match the model (vocab={vocab}, dim={dim}, seq_len={seq_len})"
    )]
    DimensionMismatch {
        stored_vocab: i32,
        stored_dim: i32,
        stored_seq_len: i32,
        vocab: usize,
        dim: usize,
        seq_len: usize,
    },

    #[error("checkpoint tensor {name}: stored {found}, model expects {expected}")]
    ShapeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert() {
        fn open() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/definitely/not/here.bin")?)
        }
        assert!(matches!(open(), Err(Error::Io(_))));
    }

    #[test]
    fn test_dimension_mismatch_message_names_both_sides() {
        let err = Error::DimensionMismatch {
            stored_vocab: 256,
            stored_dim: 64,
            stored_seq_len: 64,
            vocab: 5,
            dim: 4,
            seq_len: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("vocab=256"));
        assert!(msg.contains("seq_len=3"));
    }
}
