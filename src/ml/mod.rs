// ============================================================
// Layer 5 — Machine Learning (Burn)
// ============================================================
// Hierarchical encoder-decoder stack: chunk-level token encoder,
// outer chunk encoder, attention decoder, plus the training loop
// and greedy predictor built on top of them.

pub mod decoder;
pub mod encoder;
pub mod hier_encoder;
pub mod model;
pub mod ops;
pub mod predictor;
pub mod trainer;
