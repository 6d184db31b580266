// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence concerns:
//
//   checkpoint.rs — model weights (Burn CompactRecorder) plus
//                   the JSON sidecar files (architecture config,
//                   training config, both vocabularies) needed
//                   to rebuild the model for inference
//
//   metrics.rs    — epoch-level training metrics appended to a
//                   CSV file for later analysis

pub mod checkpoint;
pub mod metrics;
