//! Train a byte-level model on a poem and generate text from it
//!
//! ## Usage
//!
//! ```bash
//! # Generate from an existing checkpoint (fresh weights if it can't be loaded)
//! cargo run --release --example train -- --data poem.txt
//!
//! # Train, save, then generate
//! cargo run --release --example train -- --data poem.txt --train
//!
//! # Shorter run with a CSV metrics log and clipping
//! cargo run --release --example train -- --data poem.txt --train \
//!     --steps 2000 --log-csv training_log.csv --grad-clip 1.0
//!
//! # Custom architecture
//! cargo run --release --example train -- --data poem.txt --train --config model.json
//! ```
//!
//! Set `RUST_LOG=debug` for construction details.

use clap::Parser;
use minstrel::{
    decode_bytes, generate, initial_context, train, Layer, ModelConfig, TrainableTransformer,
    TrainingConfig, TrainingLogger, WindowSampler,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "train", about = "Train a single-block byte-level transformer")]
struct Args {
    /// Path to training text file
    #[arg(long)]
    data: String,

    /// Checkpoint to load from and save to
    #[arg(long, default_value = "poem_model.bin")]
    checkpoint: String,

    /// Run the training loop (otherwise only generate)
    #[arg(long)]
    train: bool,

    /// Training steps
    #[arg(long)]
    steps: Option<usize>,

    /// Learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Seed for initialization, window sampling and generation
    #[arg(long)]
    seed: Option<u64>,

    /// Bytes to generate
    #[arg(long, default_value = "2000")]
    generate: usize,

    /// Write training metrics to this CSV file
    #[arg(long)]
    log_csv: Option<String>,

    /// JSON model config (defaults to the poem preset)
    #[arg(long)]
    config: Option<String>,

    /// Gradient clipping max norm
    #[arg(long)]
    grad_clip: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ModelConfig::from_json_file(path)?,
        None => ModelConfig::poem(),
    };
    let defaults = TrainingConfig::default();
    let training = TrainingConfig {
        learning_rate: args.lr.unwrap_or(defaults.learning_rate),
        steps: args.steps.unwrap_or(defaults.steps),
        seed: args.seed.unwrap_or(defaults.seed),
        grad_clip: args.grad_clip,
        ..defaults
    };
    training.validate()?;

    let mut rng = StdRng::seed_from_u64(training.seed);
    let mut model = TrainableTransformer::new(&config, &mut rng);
    info!(
        parameters = model.parameter_count(),
        seq_len = config.seq_len,
        "model ready"
    );

    if let Err(e) = model.load(&args.checkpoint) {
        warn!(checkpoint = %args.checkpoint, error = %e, "could not load checkpoint, using fresh weights");
    }

    if args.train {
        let sampler = WindowSampler::from_file(&args.data, config.seq_len)?;
        let mut logger = args.log_csv.as_deref().map(TrainingLogger::new).transpose()?;

        let final_loss = train(&mut model, &sampler, &training, &mut rng, logger.as_mut())?;
        info!(final_loss, "training finished");

        if let Err(e) = model.save(&args.checkpoint) {
            warn!(checkpoint = %args.checkpoint, error = %e, "could not save checkpoint");
        }
    }

    let context = initial_context(config.seq_len, config.vocab_size, &mut rng);
    let generated = generate(&mut model, &context, args.generate, &mut rng);

    println!("\n--- Generated Poem ---");
    println!("{}", decode_bytes(&generated));
    println!("----------------------");

    Ok(())
}
