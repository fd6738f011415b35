//! Training Logger
//!
//! Records training metrics as CSV rows and mirrors each row as a `tracing`
//! event.
//!
//! ## Example
//!
//! ```rust,no_run
//! use minstrel::TrainingLogger;
//!
//! let mut logger = TrainingLogger::new("training_log.csv")?;
//! logger.log(100, 5e-3, 2.5, 0.8)?;
//! # Ok::<(), minstrel::Error>(())
//! ```
//!
//! ## CSV Format
//!
//! - `step`: Training step number
//! - `elapsed_seconds`: Time since the logger was created
//! - `learning_rate`: Learning rate used for the step
//! - `loss`: Cross-entropy loss of the step's window
//! - `perplexity`: exp(loss)
//! - `grad_norm`: Global gradient norm before clipping
//!
//! ## Perplexity
//!
//! ```text
//! perplexity = exp(loss)
//! ```
//!
//! A byte-level model guessing uniformly sits at 256 (loss ≈ 5.55); a perfect
//! model reaches 1.

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::info;

pub const CSV_HEADER: &str = "step,elapsed_seconds,learning_rate,loss,perplexity,grad_norm";

/// CSV metrics log
pub struct TrainingLogger {
    out: Box<dyn Write + Send>,
    start_time: Instant,
    last_log_time: Instant,
}

impl TrainingLogger {
    /// Create a logger writing to a new CSV file at `log_path`
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self> {
        let file = File::create(log_path)?;
        Self::from_writer(BufWriter::new(file))
    }

    /// Create a logger over any writer; the header is written immediately
    pub fn from_writer<W: Write + Send + 'static>(mut out: W) -> Result<Self> {
        writeln!(out, "{CSV_HEADER}")?;
        out.flush()?;

        let now = Instant::now();
        Ok(Self {
            out: Box::new(out),
            start_time: now,
            last_log_time: now,
        })
    }

    /// Append one row and flush it
    pub fn log(&mut self, step: usize, learning_rate: f64, loss: f64, grad_norm: f64) -> Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let perplexity = loss.exp();

        writeln!(
            self.out,
            "{},{:.2},{:.6},{:.6},{:.4},{:.6}",
            step, elapsed, learning_rate, loss, perplexity, grad_norm
        )?;
        // Rows survive an interrupted run
        self.out.flush()?;

        let step_time = self.last_log_time.elapsed().as_secs_f64();
        info!(
            step,
            elapsed_seconds = elapsed,
            step_seconds = step_time,
            learning_rate,
            loss,
            perplexity,
            grad_norm,
            "metrics"
        );

        self.last_log_time = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_writes_header_and_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut logger = TrainingLogger::new(file.path()).unwrap();
            logger.log(0, 5e-3, 0.0, 1.5).unwrap();
            logger.log(100, 5e-3, 2.0, 0.25).unwrap();
        }

        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);

        let first: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(first[0], "0");
        assert_eq!(first[2], "0.005000");
        assert_eq!(first[4], "1.0000");
        assert_eq!(first[5], "1.500000");

        let second: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(second[0], "100");
        assert_eq!(second[3], "2.000000");
        assert_eq!(second[4], "7.3891");
    }
}
