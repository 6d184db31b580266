// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `predict` and
// `gen-data`, and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)

use anyhow::{bail, Error};
use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::ContextMode;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the hierarchical seq2seq model on tab-separated pairs
    Train(TrainArgs),

    /// Predict the output sequence for one input line
    Predict(PredictArgs),

    /// Generate the toy reverse-first-tokens corpus
    GenData(GenDataArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Tab-separated source/target pair file to train on
    #[arg(long, default_value = "data/toy_reverse_hseq/train/data.txt")]
    pub data_path: String,

    /// Directory to save model checkpoints and vocabularies
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Character separating chunks inside a source token
    #[arg(long, default_value_t = '|')]
    pub chunk_sep: char,

    /// Number of pairs processed together in one forward pass
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// How fast the model learns — too high causes instability,
    /// too low causes slow convergence
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Embedding dimension for both vocabularies
    #[arg(long, default_value_t = 64)]
    pub embed_dim: usize,

    /// Hidden size of all three LSTMs
    #[arg(long, default_value_t = 128)]
    pub hidden_size: usize,

    /// Maximum decode steps when no target is available
    #[arg(long, default_value_t = 12)]
    pub max_decode_len: usize,

    /// Probability that a forward pass feeds ground-truth
    /// tokens instead of the model's own predictions
    #[arg(long, default_value_t = 0.5)]
    pub teacher_forcing_ratio: f64,

    /// What the decoder attends over:
    /// "token-level" or "chunk-summary"
    #[arg(long, default_value = "token-level")]
    pub context_mode: String,

    /// Disable attention (decoder sees only the final state)
    #[arg(long, default_value_t = false)]
    pub no_attention: bool,

    /// Fraction of pairs kept for training (rest is validation)
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = Error;

    fn try_from(a: TrainArgs) -> Result<Self, Error> {
        let context_mode = match a.context_mode.as_str() {
            "token-level"   => ContextMode::TokenLevel,
            "chunk-summary" => ContextMode::ChunkSummary,
            other => bail!(
                "unknown context mode '{other}' (expected 'token-level' or 'chunk-summary')"
            ),
        };

        Ok(TrainConfig {
            data_path:             a.data_path,
            checkpoint_dir:        a.checkpoint_dir,
            chunk_sep:             a.chunk_sep,
            batch_size:            a.batch_size,
            epochs:                a.epochs,
            lr:                    a.lr,
            embed_dim:             a.embed_dim,
            hidden_size:           a.hidden_size,
            max_decode_len:        a.max_decode_len,
            teacher_forcing_ratio: a.teacher_forcing_ratio,
            context_mode,
            use_attention:         !a.no_attention,
            train_fraction:        a.train_fraction,
        })
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// The input line to predict from (chunks separated by the
    /// separator used during training)
    #[arg(long)]
    pub input: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

/// All arguments for the `gen-data` command
#[derive(Args, Debug)]
pub struct GenDataArgs {
    /// Directory to write the corpus under
    #[arg(long, default_value = "data")]
    pub dir: String,

    /// Max tokens per chunk
    #[arg(long, default_value_t = 5)]
    pub max_chunk_len: usize,

    /// Max chunks per sequence
    #[arg(long, default_value_t = 10)]
    pub max_seq_len: usize,

    /// Number of training pairs
    #[arg(long, default_value_t = 10_000)]
    pub train_size: usize,

    /// Number of dev pairs
    #[arg(long, default_value_t = 1_000)]
    pub dev_size: usize,

    /// Number of test pairs
    #[arg(long, default_value_t = 1_000)]
    pub test_size: usize,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> TrainArgs {
        TrainArgs {
            data_path:             "pairs.txt".into(),
            checkpoint_dir:        "ckpt".into(),
            chunk_sep:             '|',
            batch_size:            4,
            epochs:                1,
            lr:                    1e-3,
            embed_dim:             8,
            hidden_size:           16,
            max_decode_len:        5,
            teacher_forcing_ratio: 0.5,
            context_mode:          "token-level".into(),
            no_attention:          false,
            train_fraction:        0.9,
        }
    }

    #[test]
    fn test_context_mode_parsing() {
        let cfg = TrainConfig::try_from(base_args()).unwrap();
        assert_eq!(cfg.context_mode, ContextMode::TokenLevel);

        let mut args = base_args();
        args.context_mode = "chunk-summary".into();
        let cfg = TrainConfig::try_from(args).unwrap();
        assert_eq!(cfg.context_mode, ContextMode::ChunkSummary);

        let mut args = base_args();
        args.context_mode = "sideways".into();
        assert!(TrainConfig::try_from(args).is_err());
    }

    #[test]
    fn test_no_attention_flag_inverts() {
        let mut args = base_args();
        args.no_attention = true;
        let cfg = TrainConfig::try_from(args).unwrap();
        assert!(!cfg.use_attention);
    }
}
