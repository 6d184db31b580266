// ============================================================
// Layer 3 — Example Domain Types
// ============================================================
// The data model of the hierarchical pipeline:
//
//   Chunk    — an ordered sequence of raw token strings,
//              possibly empty. The finest-grained unit
//              (e.g. a word's characters, a sub-phrase).
//   Example  — one input (or output) instance. Either a flat
//              token sequence, or an ordered sequence of
//              Chunks (the hierarchical case).
//
// The two shapes are one type with an explicit variant tag,
// not two subclasses — the Field that produced an Example
// knows its structure mode, and everything downstream can
// match on the variant instead of downcasting.

use serde::{Deserialize, Serialize};

/// An inner-level token sequence — the atomic unit the
/// hierarchical encoder consumes per step.
pub type Chunk = Vec<String>;

/// One preprocessed input or output instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Example {
    /// A plain token sequence (the classic seq2seq case).
    Flat(Vec<String>),

    /// A sequence of chunks, each itself a token sequence.
    /// Chunks within one example need not share a length
    /// before padding.
    Chunked(Vec<Chunk>),
}

impl Example {
    /// Number of top-level units: tokens for a flat example,
    /// chunks for a chunked one.
    pub fn outer_len(&self) -> usize {
        match self {
            Example::Flat(tokens) => tokens.len(),
            Example::Chunked(chunks) => chunks.len(),
        }
    }

    /// Total token count across all levels.
    pub fn token_count(&self) -> usize {
        match self {
            Example::Flat(tokens) => tokens.len(),
            Example::Chunked(chunks) => chunks.iter().map(|c| c.len()).sum(),
        }
    }
}

/// One raw (input, output) record as read from a corpus file,
/// before any tokenization. Kept for traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPair {
    pub source: String,
    pub target: String,
}

impl RawPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A fully preprocessed training pair: a chunked source example
/// and a flat target example (already wrapped with the start/end
/// markers by the target field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairExample {
    pub source: Example,
    pub target: Example,
}
