// ============================================================
// Layer 4 — Hierarchical Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<PairExample>
// into GPU-ready tensors.
//
// Unlike a flat batcher, padding here is DYNAMIC and
// two-level: the maxima depend on the minibatch, so the
// padding happens inside batch(), not upfront:
//
//   Input:  N PairExamples with ragged chunk structure
//   Output: HierBatch with
//     input_ids     [N, max_outer_len, max_chunk_len]   (Int)
//     targets       [N, max_target_len]                 (Int)
//     outer_lengths  N true chunk counts
//     chunk_lengths  N × max_outer_len true token counts
//     target_lengths N true target lengths
//
// The length vectors stay on the host: the orchestrator uses
// them for sorting and gather indices, never as model input.

use std::sync::Arc;

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::field::{Field, NumericalizedBatch};
use crate::domain::example::PairExample;

// ─── HierBatch ────────────────────────────────────────────────────────────────
/// A batch of hierarchical pairs ready for the forward pass.
/// All tensors are batch-first.
#[derive(Debug, Clone)]
pub struct HierBatch<B: Backend> {
    /// Chunked token ids — shape [batch, max_outer, max_chunk]
    pub input_ids: Tensor<B, 3, Int>,

    /// True chunk count per example (padding chunks excluded)
    pub outer_lengths: Vec<usize>,

    /// True token count per chunk, flattened row-major to
    /// batch × max_outer entries; 0 for padding chunks
    pub chunk_lengths: Vec<usize>,

    /// Target token ids incl. <sos>/<eos> — shape [batch, max_target]
    pub targets: Tensor<B, 2, Int>,

    /// True target length per example (markers included)
    pub target_lengths: Vec<usize>,
}

// ─── HierBatcher ──────────────────────────────────────────────────────────────
/// Holds the two fields (source: hierarchical, target: flat)
/// and the device tensors are created on. Shared via Arc so
/// the train and validation loaders reuse the same vocabularies.
#[derive(Clone)]
pub struct HierBatcher<B: Backend> {
    src_field: Arc<Field>,
    tgt_field: Arc<Field>,
    device: B::Device,
}

impl<B: Backend> HierBatcher<B> {
    pub fn new(src_field: Arc<Field>, tgt_field: Arc<Field>, device: B::Device) -> Self {
        Self {
            src_field,
            tgt_field,
            device,
        }
    }
}

impl<B: Backend> Batcher<PairExample, HierBatch<B>> for HierBatcher<B> {
    fn batch(&self, items: Vec<PairExample>) -> HierBatch<B> {
        let sources: Vec<_> = items.iter().map(|p| p.source.clone()).collect();
        let targets: Vec<_> = items.iter().map(|p| p.target.clone()).collect();

        // Dataset pairs were produced by these same fields, so a
        // structure mismatch or missing vocabulary here is a fatal
        // contract violation, not a recoverable condition.
        let padded_src = self
            .src_field
            .pad(&sources)
            .expect("source examples match the source field's structure mode");
        let padded_tgt = self
            .tgt_field
            .pad(&targets)
            .expect("target examples match the target field's structure mode");

        let src = self
            .src_field
            .numericalize(&padded_src)
            .expect("source vocabulary built before batching");
        let tgt = self
            .tgt_field
            .numericalize(&padded_tgt)
            .expect("target vocabulary built before batching");

        let NumericalizedBatch::Chunked {
            ids: src_ids,
            outer_lengths,
            chunk_lengths,
        } = src
        else {
            unreachable!("hierarchical source field produces chunked batches")
        };
        let NumericalizedBatch::Flat {
            ids: tgt_ids,
            lengths: target_lengths,
        } = tgt
        else {
            unreachable!("flat target field produces flat batches")
        };

        let batch_size = src_ids.len();
        let max_outer = src_ids.first().map_or(0, |e| e.len());
        let max_chunk = src_ids
            .first()
            .and_then(|e| e.first())
            .map_or(0, |c| c.len());
        let max_target = tgt_ids.first().map_or(0, |r| r.len());

        // Flatten → 1D tensor → reshape, same as any flat batcher.
        let src_flat: Vec<i32> = src_ids
            .iter()
            .flat_map(|e| e.iter().flat_map(|c| c.iter().copied()))
            .collect();
        let tgt_flat: Vec<i32> = tgt_ids.iter().flat_map(|r| r.iter().copied()).collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(src_flat.as_slice(), &self.device)
            .reshape([batch_size, max_outer, max_chunk]);
        let targets = Tensor::<B, 1, Int>::from_ints(tgt_flat.as_slice(), &self.device)
            .reshape([batch_size, max_target]);

        HierBatch {
            input_ids,
            outer_lengths,
            chunk_lengths,
            targets,
            target_lengths,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::PairExample;

    type TB = burn::backend::NdArray;

    fn fields() -> (Arc<Field>, Arc<Field>) {
        let mut src = Field::source('|').unwrap();
        let mut tgt = Field::target().unwrap();
        let src_examples: Vec<_> = ["1|2|3 4|5", "6|7"]
            .iter()
            .map(|r| src.preprocess(r).unwrap())
            .collect();
        let tgt_examples: Vec<_> = ["4 1", "6"]
            .iter()
            .map(|r| tgt.preprocess(r).unwrap())
            .collect();
        src.build_vocab(src_examples.iter()).unwrap();
        tgt.build_vocab(tgt_examples.iter()).unwrap();
        (Arc::new(src), Arc::new(tgt))
    }

    #[test]
    fn test_batch_shapes_and_lengths() {
        let (src_field, tgt_field) = fields();
        let pairs = vec![
            PairExample {
                source: src_field.preprocess("1|2|3 4|5").unwrap(),
                target: tgt_field.preprocess("4 1").unwrap(),
            },
            PairExample {
                source: src_field.preprocess("6|7").unwrap(),
                target: tgt_field.preprocess("6").unwrap(),
            },
        ];

        let batcher = HierBatcher::<TB>::new(
            src_field,
            tgt_field,
            burn::backend::ndarray::NdArrayDevice::default(),
        );
        let batch = batcher.batch(pairs);

        // B=2, outer max = 2 chunks, inner max = 3 tokens.
        assert_eq!(batch.input_ids.dims(), [2, 2, 3]);
        assert_eq!(batch.outer_lengths, vec![2, 1]);
        assert_eq!(batch.chunk_lengths, vec![3, 2, 2, 0]);
        // Targets: <sos> 4 1 <eos> → width 4.
        assert_eq!(batch.targets.dims(), [2, 4]);
        assert_eq!(batch.target_lengths, vec![4, 3]);
    }
}
