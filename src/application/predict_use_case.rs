// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Thin wrapper over the hierarchical predictor: loads the
// checkpoint bundle once, then turns raw input lines into
// predicted token strings.

use anyhow::Result;

use crate::domain::traits::SequencePredictor;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::predictor::HierPredictor;

pub struct PredictUseCase {
    predictor: HierPredictor,
}

impl PredictUseCase {
    pub fn new(checkpoint_dir: String) -> Result<Self> {
        let ckpt = CheckpointManager::new(checkpoint_dir);
        let cfg = ckpt.load_train_config()?;
        let predictor = HierPredictor::from_checkpoint(&ckpt, cfg.chunk_sep)?;
        Ok(Self { predictor })
    }

    /// Predict the output sequence for one whitespace-tokenised
    /// input line.
    pub fn answer(&self, input: &str) -> Result<String> {
        let tokens: Vec<String> = input.split_whitespace().map(str::to_string).collect();
        let predicted = self.predictor.predict(&tokens)?;
        Ok(predicted.join(" "))
    }
}
