// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// A bidirectional mapping between token strings and dense
// integer ids, built exactly once per field from a frequency
// count over the training corpus and immutable thereafter.
//
// Id assignment is fully deterministic so two builds over the
// same corpus (same iteration order) produce identical
// mappings:
//   1. The reserved tokens come first, in the order given
//      (pad, unknown, then any start/end or chunk-pad markers)
//   2. Corpus tokens follow by descending frequency
//   3. Frequency ties break by first-seen order
//
// Lookups never fail: a token absent from the vocabulary maps
// to the reserved `<unk>` id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outer padding marker (also the flat pad token).
pub const PAD_TOKEN: &str = "<pad>";
/// Reserved slot every unknown token degrades to.
pub const UNK_TOKEN: &str = "<unk>";
/// Padding marker used *inside* a chunk — distinct from the
/// outer pad token used between chunks.
pub const CHUNK_PAD_TOKEN: &str = "<cpad>";
/// Start-of-sequence marker (target vocabularies).
pub const SOS_TOKEN: &str = "<sos>";
/// End-of-sequence marker (target vocabularies).
pub const EOS_TOKEN: &str = "<eos>";

// ─── Frequency counter ────────────────────────────────────────────────────────
/// Counts token occurrences while remembering first-seen order,
/// which is what makes tie-breaking deterministic.
#[derive(Debug, Default)]
pub struct TokenCounter {
    counts: HashMap<String, usize>,
    order: Vec<String>,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, token: &str) {
        match self.counts.get_mut(token) {
            Some(n) => *n += 1,
            None => {
                self.counts.insert(token.to_string(), 1);
                self.order.push(token.to_string());
            }
        }
    }

    /// Tokens by descending frequency, ties by first-seen order.
    fn ranked(&self) -> Vec<&str> {
        let first_seen: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let mut tokens: Vec<&str> = self.order.iter().map(|t| t.as_str()).collect();
        tokens.sort_by_key(|t| (std::cmp::Reverse(self.counts[*t]), first_seen[*t]));
        tokens
    }
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────
/// Immutable token ↔ id mapping. Serialisable so it travels
/// inside the checkpoint bundle next to the model weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    itos: Vec<String>,
    stoi: HashMap<String, usize>,
    unk_id: usize,
    pad_id: usize,
}

impl Vocabulary {
    /// Build a vocabulary from a frequency count.
    ///
    /// `specials` are inserted first in the given order and must
    /// contain the pad and unknown tokens; corpus tokens that
    /// collide with a special keep the special's id.
    pub fn build(counter: &TokenCounter, specials: &[&str]) -> Self {
        let mut itos: Vec<String> = Vec::with_capacity(specials.len());
        let mut stoi: HashMap<String, usize> = HashMap::new();

        for special in specials {
            if !stoi.contains_key(*special) {
                stoi.insert(special.to_string(), itos.len());
                itos.push(special.to_string());
            }
        }

        for token in counter.ranked() {
            if !stoi.contains_key(token) {
                stoi.insert(token.to_string(), itos.len());
                itos.push(token.to_string());
            }
        }

        let pad_id = stoi[PAD_TOKEN];
        let unk_id = stoi[UNK_TOKEN];
        Self { itos, stoi, unk_id, pad_id }
    }

    /// Map a token to its id. Unknown tokens degrade silently to
    /// the reserved `<unk>` slot — never an error.
    pub fn id_of(&self, token: &str) -> usize {
        self.stoi.get(token).copied().unwrap_or(self.unk_id)
    }

    /// Map an id back to its token, if the id is in range.
    pub fn token_of(&self, id: usize) -> Option<&str> {
        self.itos.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    pub fn pad_id(&self) -> usize {
        self.pad_id
    }

    pub fn unk_id(&self) -> usize {
        self.unk_id
    }

    /// Id of an arbitrary reserved token (`<sos>`, `<eos>`,
    /// `<cpad>`, ...). `None` when the vocabulary was built
    /// without it.
    pub fn special_id(&self, token: &str) -> Option<usize> {
        self.stoi.get(token).copied()
    }
}
