// ============================================================
// Layer 5 — Hierarchical Predictor
// ============================================================
// Greedy inference over a trained model: tokens in, tokens out.
// The input line runs through the SAME hierarchical Field
// pipeline used during training (preprocess → pad →
// numericalize, vocabulary attached from the checkpoint), so a
// whitespace token like "1|2|3" is one chunk of three tokens
// at inference exactly as it was in every training batch. The
// model decodes without teacher forcing and special markers are
// stripped from the result.

use anyhow::Result;
use burn::prelude::*;

use crate::data::field::{Field, NumericalizedBatch};
use crate::data::vocab::{EOS_TOKEN, PAD_TOKEN, SOS_TOKEN, Vocabulary};
use crate::domain::traits::SequencePredictor;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::HSeq2seq;

use std::sync::Arc;

type InferBackend = burn::backend::Wgpu;

pub struct HierPredictor {
    model:     HSeq2seq<InferBackend>,
    src_field: Field,
    tgt_vocab: Arc<Vocabulary>,
    device:    burn::backend::wgpu::WgpuDevice,
}

/// A single example numericalized for the forward pass.
struct EncodedInput {
    /// Flattened ids, row-major over [n_chunks, chunk_width].
    ids: Vec<i32>,
    n_chunks: usize,
    chunk_width: usize,
    chunk_lengths: Vec<usize>,
}

/// Run one input line through the hierarchical field as a
/// batch of one: chunk structure, padding, and unknown-token
/// handling all match training.
fn encode_input(field: &Field, tokens: &[String]) -> Result<EncodedInput> {
    let example = field.preprocess(&tokens.join(" "))?;
    if example.outer_len() == 0 {
        anyhow::bail!("input contains no tokens");
    }

    let padded = field.pad(std::slice::from_ref(&example))?;
    let NumericalizedBatch::Chunked {
        ids,
        chunk_lengths,
        ..
    } = field.numericalize(&padded)?
    else {
        anyhow::bail!("predictor requires a hierarchical source field");
    };

    let example_ids = &ids[0];
    let n_chunks = example_ids.len();
    let chunk_width = example_ids.first().map_or(0, |c| c.len());
    Ok(EncodedInput {
        ids: example_ids.iter().flatten().copied().collect(),
        n_chunks,
        chunk_width,
        chunk_lengths,
    })
}

/// Map predicted ids back to tokens, dropping `<sos>`, `<eos>`
/// and `<pad>`.
fn strip_markers(vocab: &Vocabulary, ids: &[usize]) -> Vec<String> {
    ids.iter()
        .filter_map(|&id| vocab.token_of(id))
        .filter(|t| *t != EOS_TOKEN && *t != SOS_TOKEN && *t != PAD_TOKEN)
        .map(str::to_string)
        .collect()
}

impl HierPredictor {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, chunk_sep: char) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let (model, src_vocab, tgt_vocab) =
            ckpt_manager.load_bundle::<InferBackend>(&device)?;

        // Rebuild the source field around the persisted
        // vocabulary instead of re-deriving ids from scratch.
        let mut src_field = Field::source(chunk_sep)?;
        src_field.attach_vocab(src_vocab)?;

        tracing::info!("Model loaded from checkpoint");
        Ok(Self { model, src_field, tgt_vocab, device })
    }
}

impl SequencePredictor for HierPredictor {
    fn predict(&self, tokens: &[String]) -> Result<Vec<String>> {
        let encoded = encode_input(&self.src_field, tokens)?;

        let input =
            Tensor::<InferBackend, 1, Int>::from_ints(encoded.ids.as_slice(), &self.device)
                .reshape([1, encoded.n_chunks, encoded.chunk_width]);

        let out = self.model.forward(
            input,
            &[encoded.n_chunks],
            &encoded.chunk_lengths,
            None,
            0.0,
        )?;

        let len = out.artifacts.lengths[0];
        Ok(strip_markers(
            &self.tgt_vocab,
            &out.artifacts.sequences[0][..len],
        ))
    }
}
