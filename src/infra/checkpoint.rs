// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything a later process needs to run
// the trained model, using Burn's CompactRecorder for weights.
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_2.mpk.gz   ← weights after epoch 2
//     ...
//     latest_epoch.json      ← number of the last saved epoch
//     train_config.json      ← training hyperparameters
//     model_config.json      ← model architecture
//     src_vocab.json         ← source vocabulary
//     tgt_vocab.json         ← target vocabulary
//
// The architecture config and both vocabularies are saved
// separately from the weights: loading for inference has to
// rebuild the exact same model and id mappings before the
// record can be restored into it.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}, sync::Arc};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::vocab::Vocabulary;
use crate::ml::model::{HSeq2seq, HSeq2seqConfig};

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager rooted at `dir`, creating the directory
    /// if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save model weights for a given epoch and update the
    /// latest-epoch pointer.
    pub fn save_model<B: AutodiffBackend>(
        &self,
        model: &HSeq2seq<B>,
        epoch: usize,
    ) -> Result<()> {
        // Recorder adds the extension itself.
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest saved weights into `model`. The model
    /// must have been built from the saved architecture config
    /// or the record will not fit.
    pub fn load_model<B: Backend>(
        &self,
        model:  HSeq2seq<B>,
        device: &B::Device,
    ) -> Result<HSeq2seq<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_train_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json("train_config.json", cfg)
    }

    pub fn load_train_config(&self) -> Result<TrainConfig> {
        self.read_json("train_config.json")
    }

    pub fn save_model_config(&self, cfg: &HSeq2seqConfig) -> Result<()> {
        self.write_json("model_config.json", cfg)
    }

    pub fn load_model_config(&self) -> Result<HSeq2seqConfig> {
        self.read_json("model_config.json")
    }

    pub fn save_vocabs(&self, src: &Vocabulary, tgt: &Vocabulary) -> Result<()> {
        self.write_json("src_vocab.json", src)?;
        self.write_json("tgt_vocab.json", tgt)
    }

    pub fn load_vocabs(&self) -> Result<(Vocabulary, Vocabulary)> {
        Ok((self.read_json("src_vocab.json")?, self.read_json("tgt_vocab.json")?))
    }

    /// Rebuild the whole inference bundle: architecture config,
    /// both vocabularies, and the latest weights.
    pub fn load_bundle<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(HSeq2seq<B>, Arc<Vocabulary>, Arc<Vocabulary>)> {
        let model_cfg        = self.load_model_config()?;
        let (src, tgt)       = self.load_vocabs()?;
        let model: HSeq2seq<B> = model_cfg.init(device);
        let model            = self.load_model(model, device)?;
        Ok((model, Arc::new(src), Arc::new(tgt)))
    }

    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");
        let s = fs::read_to_string(&path).with_context(|| {
            "Cannot find 'latest_epoch.json'. Have you run 'train' first?"
        })?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::vocab::{TokenCounter, PAD_TOKEN, UNK_TOKEN};

    #[test]
    fn test_vocab_round_trip() {
        let dir = std::env::temp_dir().join("hseq2seq_ckpt_vocab_test");
        let manager = CheckpointManager::new(&dir);

        let mut counter = TokenCounter::default();
        counter.add("a");
        counter.add("b");
        let vocab = Vocabulary::build(&counter, &[PAD_TOKEN.into(), UNK_TOKEN.into()]);

        manager.save_vocabs(&vocab, &vocab).unwrap();
        let (src, tgt) = manager.load_vocabs().unwrap();
        assert_eq!(src.len(), vocab.len());
        assert_eq!(tgt.id_of("a"), vocab.id_of("a"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir = std::env::temp_dir().join("hseq2seq_ckpt_missing_test");
        let manager = CheckpointManager::new(&dir);
        assert!(manager.latest_epoch().is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
