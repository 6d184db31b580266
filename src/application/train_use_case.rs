// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load tab-separated pairs   (Layer 4 - data)
//   Step 2: Preprocess both sides      (Layer 4 - data)
//   Step 3: Build vocabularies         (Layer 4 - data)
//   Step 4: Split train/validation     (Layer 4 - data)
//   Step 5: Build datasets             (Layer 4 - data)
//   Step 6: Save configs + vocabs      (Layer 6 - infra)
//   Step 7: Run training loop          (Layer 5 - ml)

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::PairDataset,
    field::Field,
    loader::TsvCorpusLoader,
    splitter::split_train_val,
    vocab::{EOS_TOKEN, SOS_TOKEN},
};
use crate::domain::example::PairExample;
use crate::domain::traits::CorpusSource;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::decoder::DecodeFn;
use crate::ml::model::{ContextMode, HSeq2seqConfig};
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Serialisable so it
// can be saved next to the checkpoints and inspected later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:             String,
    pub checkpoint_dir:        String,
    pub chunk_sep:             char,
    pub batch_size:            usize,
    pub epochs:                usize,
    pub lr:                    f64,
    pub embed_dim:             usize,
    pub hidden_size:           usize,
    pub max_decode_len:        usize,
    pub teacher_forcing_ratio: f64,
    pub context_mode:          ContextMode,
    pub use_attention:         bool,
    pub train_fraction:        f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:             "data/toy_reverse_hseq/train/data.txt".to_string(),
            checkpoint_dir:        "checkpoints".to_string(),
            chunk_sep:             '|',
            batch_size:            32,
            epochs:                10,
            lr:                    1e-3,
            embed_dim:             64,
            hidden_size:           128,
            max_decode_len:        12,
            teacher_forcing_ratio: 0.5,
            context_mode:          ContextMode::TokenLevel,
            use_attention:         true,
            train_fraction:        0.9,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Load source/target pairs ─────────────────────────────────
        tracing::info!("Loading pairs from '{}'", cfg.data_path);
        let loader = TsvCorpusLoader::new(&cfg.data_path);
        let raw_pairs = loader.load_all()?;
        tracing::info!("Loaded {} pairs", raw_pairs.len());

        // ── Step 2: Preprocess through the fields ─────────────────────────────
        // Source is hierarchical (split on the chunk separator),
        // target is flat with <sos>/<eos> wrapping.
        let mut src_field = Field::source(cfg.chunk_sep)?;
        let mut tgt_field = Field::target()?;

        let mut pairs: Vec<PairExample> = Vec::with_capacity(raw_pairs.len());
        for pair in &raw_pairs {
            let source = src_field
                .preprocess(&pair.source)
                .with_context(|| format!("bad source line: '{}'", pair.source))?;
            let target = tgt_field
                .preprocess(&pair.target)
                .with_context(|| format!("bad target line: '{}'", pair.target))?;
            pairs.push(PairExample { source, target });
        }

        // ── Step 3: Build vocabularies ────────────────────────────────────────
        src_field.build_vocab(pairs.iter().map(|p| &p.source))?;
        tgt_field.build_vocab(pairs.iter().map(|p| &p.target))?;
        let src_vocab = src_field.vocab()?.clone();
        let tgt_vocab = tgt_field.vocab()?.clone();
        tracing::info!(
            "Vocabularies: {} source, {} target tokens",
            src_vocab.len(),
            tgt_vocab.len()
        );

        // ── Step 4: Train / validation split ──────────────────────────────────
        let (train_pairs, val_pairs) = split_train_val(pairs, cfg.train_fraction);
        tracing::info!(
            "Split: {} train, {} validation",
            train_pairs.len(),
            val_pairs.len()
        );

        // ── Step 5: Build Burn datasets ───────────────────────────────────────
        let train_dataset = PairDataset::new(train_pairs);
        let val_dataset   = PairDataset::new(val_pairs);

        // ── Step 6: Save configs and vocabularies for inference ───────────────
        let sos_id = tgt_vocab
            .special_id(SOS_TOKEN)
            .context("target vocabulary has no <sos>")?;
        let eos_id = tgt_vocab
            .special_id(EOS_TOKEN)
            .context("target vocabulary has no <eos>")?;

        let model_cfg = HSeq2seqConfig {
            src_vocab_size: src_vocab.len(),
            tgt_vocab_size: tgt_vocab.len(),
            embed_dim:      cfg.embed_dim,
            hidden_size:    cfg.hidden_size,
            max_decode_len: cfg.max_decode_len,
            context_mode:   cfg.context_mode,
            use_attention:  cfg.use_attention,
            decode_fn:      DecodeFn::LogSoftmax,
            sos_id,
            eos_id,
        };

        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_train_config(cfg)?;
        ckpt_manager.save_model_config(&model_cfg)?;
        ckpt_manager.save_vocabs(&src_vocab, &tgt_vocab)?;

        // ── Step 7: Run training loop (Layer 5) ───────────────────────────────
        run_training(
            cfg,
            &model_cfg,
            Arc::new(src_field),
            Arc::new(tgt_field),
            train_dataset,
            val_dataset,
            ckpt_manager,
        )?;

        Ok(())
    }
}
