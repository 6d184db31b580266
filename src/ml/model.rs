// ============================================================
// Layer 5 — Hierarchical Sequence-to-Sequence Model
// ============================================================
// Composition of the three recurrent pieces:
//
//   1. flatten the [batch, outer, chunk] id tensor into
//      batch*outer independent chunk rows
//   2. sort the rows by true chunk length (descending), run
//      the token encoder, restore original order
//   3. summarize each chunk at its true last token and run the
//      outer encoder over the chunk summaries
//   4. decode from the outer encoder's final state against a
//      context matrix whose granularity is configurable
//
// Context granularity:
//   TokenLevel   — every encoded token position, reshaped to
//                  [batch, outer*chunk, hidden] (the default;
//                  attention can look inside chunks)
//   ChunkSummary — one vector per chunk, [batch, outer, hidden]

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::ml::decoder::{DecodeFn, DecoderOutput, DecoderRnn, DecoderRnnConfig};
use crate::ml::encoder::{EncoderRnn, EncoderRnnConfig};
use crate::ml::hier_encoder::{OuterEncoder, OuterEncoderConfig};
use crate::ml::ops::{last_step_outputs, length_sort, select_rows, select_rows_int};

/// What the decoder attends over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextMode {
    TokenLevel,
    ChunkSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HSeq2seqConfig {
    pub src_vocab_size: usize,
    pub tgt_vocab_size: usize,
    pub embed_dim: usize,
    pub hidden_size: usize,
    pub max_decode_len: usize,
    pub context_mode: ContextMode,
    pub use_attention: bool,
    pub decode_fn: DecodeFn,
    pub sos_id: usize,
    pub eos_id: usize,
}

impl HSeq2seqConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> HSeq2seq<B> {
        HSeq2seq {
            encoder: EncoderRnnConfig::new(self.src_vocab_size, self.embed_dim, self.hidden_size)
                .init(device),
            outer: OuterEncoderConfig::new(self.hidden_size).init(device),
            decoder: DecoderRnnConfig {
                vocab_size: self.tgt_vocab_size,
                embed_dim: self.embed_dim,
                hidden_size: self.hidden_size,
                max_decode_len: self.max_decode_len,
                sos_id: self.sos_id,
                eos_id: self.eos_id,
                use_attention: self.use_attention,
                decode_fn: self.decode_fn,
            }
            .init(device),
            token_level_context: self.context_mode == ContextMode::TokenLevel,
        }
    }
}

#[derive(Module, Debug)]
pub struct HSeq2seq<B: Backend> {
    encoder: EncoderRnn<B>,
    outer: OuterEncoder<B>,
    decoder: DecoderRnn<B>,
    token_level_context: bool,
}

impl<B: Backend> HSeq2seq<B> {
    /// Full forward pass over one padded batch.
    ///
    /// `input_ids` is [batch, max_outer, max_chunk];
    /// `chunk_lengths` has batch * max_outer entries in row
    /// order; `outer_lengths` has one entry per example.
    pub fn forward(
        &self,
        input_ids: Tensor<B, 3, Int>,
        outer_lengths: &[usize],
        chunk_lengths: &[usize],
        targets: Option<&Tensor<B, 2, Int>>,
        teacher_forcing_ratio: f64,
    ) -> PipelineResult<DecoderOutput<B>> {
        let [batch, max_outer, max_chunk] = input_ids.dims();
        if outer_lengths.len() != batch {
            return Err(PipelineError::shape(
                "outer length count",
                batch,
                outer_lengths.len(),
            ));
        }
        if chunk_lengths.len() != batch * max_outer {
            return Err(PipelineError::shape(
                "chunk length count",
                batch * max_outer,
                chunk_lengths.len(),
            ));
        }

        // ── Step 1: flatten to independent chunk rows ──
        let flat: Tensor<B, 2, Int> = input_ids.reshape([batch * max_outer, max_chunk]);

        // ── Step 2: encode in length-sorted order, restore ──
        let (perm, inverse) = length_sort(chunk_lengths);
        let sorted = select_rows_int(flat, &perm);
        let encoded = self.encoder.forward(sorted);
        let restored = select_rows(encoded, &inverse);

        // ── Step 3: chunk summaries + outer encoding ──
        let hidden = restored.dims()[2];
        let summaries =
            last_step_outputs(restored.clone(), chunk_lengths).reshape([batch, max_outer, hidden]);
        let (outer_outputs, final_state) = self.outer.forward(summaries, outer_lengths)?;

        // ── Step 4: decode against the chosen context ──
        let context = if self.token_level_context {
            restored.reshape([batch, max_outer * max_chunk, hidden])
        } else {
            outer_outputs
        };
        self.decoder
            .forward(targets, final_state, &context, teacher_forcing_ratio)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TB = burn::backend::NdArray;

    fn model(context_mode: ContextMode) -> HSeq2seq<TB> {
        let device = burn::backend::ndarray::NdArrayDevice::default();
        HSeq2seqConfig {
            src_vocab_size: 11,
            tgt_vocab_size: 9,
            embed_dim: 6,
            hidden_size: 4,
            max_decode_len: 5,
            context_mode,
            use_attention: true,
            decode_fn: DecodeFn::LogSoftmax,
            sos_id: 2,
            eos_id: 3,
        }
        .init(&device)
    }

    fn toy_batch() -> (Tensor<TB, 3, Int>, Vec<usize>, Vec<usize>) {
        let device = burn::backend::ndarray::NdArrayDevice::default();
        // Two examples, up to three chunks of up to four tokens.
        let ids: Vec<i32> = (0..(2 * 3 * 4)).map(|i| (i % 11) as i32).collect();
        let input =
            Tensor::<TB, 1, Int>::from_ints(ids.as_slice(), &device).reshape([2, 3, 4]);
        let outer_lengths = vec![3, 2];
        let chunk_lengths = vec![4, 2, 3, 4, 1, 0];
        (input, outer_lengths, chunk_lengths)
    }

    #[test]
    fn test_forward_free_running_shapes() {
        let (input, outer_lengths, chunk_lengths) = toy_batch();
        let out = model(ContextMode::TokenLevel)
            .forward(input, &outer_lengths, &chunk_lengths, None, 0.0)
            .unwrap();

        assert_eq!(out.outputs.dims(), [2, 5, 9]);
        // Token-level context spans every padded token position.
        assert_eq!(out.artifacts.attention.unwrap().dims(), [2, 5, 12]);
    }

    #[test]
    fn test_chunk_summary_context_has_outer_granularity() {
        let (input, outer_lengths, chunk_lengths) = toy_batch();
        let out = model(ContextMode::ChunkSummary)
            .forward(input, &outer_lengths, &chunk_lengths, None, 0.0)
            .unwrap();
        assert_eq!(out.artifacts.attention.unwrap().dims(), [2, 5, 3]);
    }

    #[test]
    fn test_teacher_forced_step_count_follows_targets() {
        let device = burn::backend::ndarray::NdArrayDevice::default();
        let (input, outer_lengths, chunk_lengths) = toy_batch();
        let targets = Tensor::<TB, 1, Int>::from_ints(
            [2, 4, 5, 3, 2, 6, 7, 3].as_slice(),
            &device,
        )
        .reshape([2, 4]);

        let out = model(ContextMode::TokenLevel)
            .forward(input, &outer_lengths, &chunk_lengths, Some(&targets), 1.0)
            .unwrap();
        assert_eq!(out.outputs.dims(), [2, 3, 9]);
    }

    #[test]
    fn test_single_chunk_example_decodes_within_bounds() {
        // A batch of one example holding one chunk — the
        // smallest input the predictor ever produces.
        let device = burn::backend::ndarray::NdArrayDevice::default();
        let input =
            Tensor::<TB, 1, Int>::from_ints([5, 6, 7, 8].as_slice(), &device).reshape([1, 1, 4]);

        let out = model(ContextMode::TokenLevel)
            .forward(input, &[1], &[4], None, 0.0)
            .unwrap();

        assert_eq!(out.artifacts.sequences.len(), 1);
        assert_eq!(out.artifacts.sequences[0].len(), 5);
        let len = out.artifacts.lengths[0];
        assert!(len >= 1 && len <= 5);
        assert!(!out.artifacts.sequences[0][..len].is_empty());
    }

    #[test]
    fn test_length_metadata_mismatch_is_rejected() {
        let (input, _, chunk_lengths) = toy_batch();
        let result = model(ContextMode::TokenLevel).forward(input, &[3], &chunk_lengths, None, 0.0);
        assert!(matches!(result.err(), Some(PipelineError::Shape { .. })));
    }
}
