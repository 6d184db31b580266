// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// By programming against traits instead of concrete types,
// we can swap implementations without changing the code
// that uses them:
//   - TsvCorpusLoader implements CorpusSource
//   - (future) JsonlLoader could also implement CorpusSource
//   - The application layer only sees CorpusSource

use anyhow::Result;
use crate::domain::example::RawPair;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can load raw (input, output) pairs.
///
/// Implementations:
///   - TsvCorpusLoader → newline-delimited, tab-separated text
pub trait CorpusSource {
    /// Load every available pair from this source.
    fn load_all(&self) -> Result<Vec<RawPair>>;
}

// ─── SequencePredictor ────────────────────────────────────────────────────────
/// Any component that maps an input token sequence to a
/// predicted output token sequence.
///
/// Implementations:
///   - HierPredictor → hierarchical greedy decoding
pub trait SequencePredictor {
    /// Predict the output tokens for one input sequence.
    /// For hierarchical inputs each token is itself a
    /// separator-delimited chunk string (e.g. `"1|2|3"`).
    fn predict(&self, tokens: &[String]) -> Result<Vec<String>>;
}
