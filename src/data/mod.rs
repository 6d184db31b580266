// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between raw corpus text and GPU-ready tensor
// batches, in this order:
//
//   corpus file (tab-separated pairs)
//       │
//       ▼
//   TsvCorpusLoader   → reads raw (input, output) records
//       │
//       ▼
//   Field             → preprocess (chunk-aware tokenization),
//       │               vocabulary construction
//       ▼
//   PairDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   HierBatcher       → per-minibatch two-level padding,
//       │               numericalization, tensor construction
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Each module is responsible for exactly one step.

/// Loads tab-separated corpus files
pub mod loader;

/// Token ↔ id vocabulary with reserved tokens
pub mod vocab;

/// Chunk-aware preprocessing, padding, and numericalization
pub mod field;

/// Implements Burn's Dataset trait for preprocessed pairs
pub mod dataset;

/// Implements Burn's Batcher trait for two-level dynamic padding
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;

/// Toy reverse-task corpus generator
pub mod toy;
