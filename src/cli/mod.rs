// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`    — trains the model on tab-separated pairs
//   2. `predict`  — loads a checkpoint and predicts one line
//   3. `gen-data` — writes the toy corpus for sanity checks

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, GenDataArgs, PredictArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "hseq2seq",
    version = "0.1.0",
    about = "Train a hierarchical seq2seq model on chunked sequences, then predict."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => Self::run_train(args),
            Commands::Predict(args) => Self::run_predict(args),
            Commands::GenData(args) => Self::run_gen_data(args),
        }
    }

    /// Handles the `train` subcommand.
    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::{TrainConfig, TrainUseCase};

        tracing::info!("Starting training on pairs in: {}", args.data_path);

        // Convert CLI args → application config (separates presentation from domain)
        let use_case = TrainUseCase::new(TrainConfig::try_from(args)?);
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    /// Handles the `predict` subcommand.
    fn run_predict(args: PredictArgs) -> Result<()> {
        use crate::application::predict_use_case::PredictUseCase;

        let use_case = PredictUseCase::new(args.checkpoint_dir.clone())?;
        let output = use_case.answer(&args.input)?;
        println!("\nOutput: {}", output);
        Ok(())
    }

    /// Handles the `gen-data` subcommand.
    fn run_gen_data(args: GenDataArgs) -> Result<()> {
        use crate::data::toy::{generate_toy_corpus, ToyCorpusConfig};

        let cfg = ToyCorpusConfig {
            max_chunk_len: args.max_chunk_len,
            max_seq_len:   args.max_seq_len,
            train_size:    args.train_size,
            dev_size:      args.dev_size,
            test_size:     args.test_size,
        };
        generate_toy_corpus(&args.dir, &cfg)?;
        println!("Toy corpus written under '{}'", args.dir);
        Ok(())
    }
}
