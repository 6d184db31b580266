// ============================================================
// Layer 4 — Field
// ============================================================
// A Field owns everything between raw corpus text and integer
// id batches: preprocessing, vocabulary construction, padding,
// and numericalization.
//
// One configurable type covers both structure modes:
//
//   Flat         — an example is a plain token sequence
//                  (classic seq2seq; used for targets)
//   Hierarchical — an example is a sequence of chunks, each
//                  chunk a token sequence, produced by
//                  splitting whitespace tokens on a chunk
//                  separator (e.g. "1|2|3 4|5" → two chunks)
//
// Padding in hierarchical mode works across BOTH levels, per
// minibatch:
//   max_outer_len — max chunk count across the minibatch
//   max_chunk_len — max token count across ALL chunks in the
//                   minibatch (flattened, not per example)
//   inner padding — `<cpad>` inside a chunk
//   outer padding — whole chunks made entirely of `<pad>`
//
// The recorded lengths (true chunk count per example, true
// token count per chunk) must travel with every padded batch:
// the encoder needs them to ignore padding.

use std::sync::Arc;

use crate::data::vocab::{
    TokenCounter, Vocabulary, CHUNK_PAD_TOKEN, EOS_TOKEN, PAD_TOKEN, SOS_TOKEN, UNK_TOKEN,
};
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::example::{Chunk, Example};

// ─── Configuration ────────────────────────────────────────────────────────────
/// Structure mode tag. Selects between the flat and the
/// two-level pipeline; there is no subclassing and no runtime
/// option-patching — an invalid configuration is rejected when
/// the field is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureMode {
    Flat,
    Hierarchical { chunk_sep: char },
}

/// Validated field configuration. Batch-first layout and
/// length reporting are not options here — every padded batch
/// is batch-first and always carries its lengths.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    pub mode: StructureMode,

    /// Optional start marker. Flat mode wraps the whole
    /// sequence during preprocessing; hierarchical mode wraps
    /// each chunk during padding.
    pub init_token: Option<String>,

    /// Optional end marker, same placement rules as above.
    pub eos_token: Option<String>,

    /// Pad on the left instead of the right. Flat mode only:
    /// hierarchical chunk summaries are read at the last real
    /// token position, which left padding would displace.
    pub pad_first: bool,

    /// Fixed outer length; batches are padded/truncated to this
    /// instead of the minibatch maximum.
    pub fix_length: Option<usize>,

    /// Lowercase all tokens during preprocessing.
    pub lower: bool,
}

impl FieldConfig {
    fn validate(&self) -> PipelineResult<()> {
        if let StructureMode::Hierarchical { chunk_sep } = self.mode {
            if chunk_sep.is_whitespace() {
                return Err(PipelineError::Format(format!(
                    "chunk separator {chunk_sep:?} is whitespace and would collide \
                     with the outer tokenizer"
                )));
            }
            if self.pad_first {
                return Err(PipelineError::Format(
                    "pad_first is not supported in hierarchical mode: the chunk \
                     summary is gathered at index length-1, which left padding \
                     would point into the pad region"
                        .into(),
                ));
            }
        }
        if self.fix_length == Some(0) {
            return Err(PipelineError::Format(
                "fix_length of 0 leaves no room for any token".into(),
            ));
        }
        Ok(())
    }
}

// ─── Padded / numericalized batches ───────────────────────────────────────────
/// A minibatch after padding, still in token-string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaddedBatch {
    Flat {
        tokens: Vec<Vec<String>>,
        lengths: Vec<usize>,
    },
    Chunked {
        /// `[batch][max_outer_len][chunk_width]` token grid.
        chunks: Vec<Vec<Chunk>>,
        /// True chunk count per example, clipped to max_outer_len.
        outer_lengths: Vec<usize>,
        /// True token count per chunk (wrap markers included),
        /// flattened to batch × max_outer_len entries. Pad
        /// chunks record 0.
        chunk_lengths: Vec<usize>,
    },
}

/// A padded minibatch mapped through the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumericalizedBatch {
    Flat {
        ids: Vec<Vec<i32>>,
        lengths: Vec<usize>,
    },
    Chunked {
        ids: Vec<Vec<Vec<i32>>>,
        outer_lengths: Vec<usize>,
        chunk_lengths: Vec<usize>,
    },
}

// ─── Field ────────────────────────────────────────────────────────────────────
#[derive(Debug)]
pub struct Field {
    config: FieldConfig,
    vocab: Option<Arc<Vocabulary>>,
}

impl Field {
    /// Build a field from a validated configuration.
    pub fn new(config: FieldConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config, vocab: None })
    }

    /// Hierarchical source field: chunks split on `chunk_sep`,
    /// no wrap markers.
    pub fn source(chunk_sep: char) -> PipelineResult<Self> {
        Self::new(FieldConfig {
            mode: StructureMode::Hierarchical { chunk_sep },
            init_token: None,
            eos_token: None,
            pad_first: false,
            fix_length: None,
            lower: false,
        })
    }

    /// Flat target field: sequences wrapped with `<sos>`/`<eos>`
    /// during preprocessing.
    pub fn target() -> PipelineResult<Self> {
        Self::new(FieldConfig {
            mode: StructureMode::Flat,
            init_token: Some(SOS_TOKEN.to_string()),
            eos_token: Some(EOS_TOKEN.to_string()),
            pad_first: false,
            fix_length: None,
            lower: false,
        })
    }

    pub fn mode(&self) -> &StructureMode {
        &self.config.mode
    }

    /// The built vocabulary, or a State error before build_vocab.
    pub fn vocab(&self) -> PipelineResult<&Arc<Vocabulary>> {
        self.vocab.as_ref().ok_or_else(|| {
            PipelineError::State("vocabulary has not been built for this field".into())
        })
    }

    /// Attach a previously persisted vocabulary (checkpoint
    /// reload path). Same once-only rule as build_vocab.
    pub fn attach_vocab(&mut self, vocab: Arc<Vocabulary>) -> PipelineResult<()> {
        if self.vocab.is_some() {
            return Err(PipelineError::State(
                "field already has a vocabulary; rebuilding requires a new field".into(),
            ));
        }
        self.vocab = Some(vocab);
        Ok(())
    }

    // ── Preprocessing ─────────────────────────────────────────────────────────
    /// Split a raw record into an Example.
    ///
    /// Hierarchical mode splits on whitespace first, then each
    /// whitespace token on the chunk separator. A non-empty raw
    /// input that produces zero chunks is a Format error.
    pub fn preprocess(&self, raw: &str) -> PipelineResult<Example> {
        let normalize = |t: &str| {
            if self.config.lower {
                t.to_lowercase()
            } else {
                t.to_string()
            }
        };

        match self.config.mode {
            StructureMode::Flat => {
                let mut tokens: Vec<String> =
                    raw.split_whitespace().map(normalize).collect();
                if let Some(init) = &self.config.init_token {
                    tokens.insert(0, init.clone());
                }
                if let Some(eos) = &self.config.eos_token {
                    tokens.push(eos.clone());
                }
                Ok(Example::Flat(tokens))
            }
            StructureMode::Hierarchical { chunk_sep } => {
                let chunks: Vec<Chunk> = raw
                    .split_whitespace()
                    .map(|word| {
                        word.split(chunk_sep)
                            .filter(|piece| !piece.is_empty())
                            .map(normalize)
                            .collect()
                    })
                    .collect();
                if chunks.is_empty() && !raw.is_empty() {
                    return Err(PipelineError::Format(format!(
                        "chunk separator {chunk_sep:?} yielded zero chunks for \
                         non-empty input {raw:?}"
                    )));
                }
                Ok(Example::Chunked(chunks))
            }
        }
    }

    // ── Vocabulary construction ───────────────────────────────────────────────
    /// Scan every token of every chunk of every example and
    /// build the vocabulary. Callable exactly once per field.
    pub fn build_vocab<'a, I>(&mut self, corpus: I) -> PipelineResult<()>
    where
        I: IntoIterator<Item = &'a Example>,
    {
        if self.vocab.is_some() {
            return Err(PipelineError::State(
                "vocabulary already built for this field".into(),
            ));
        }

        let mut counter = TokenCounter::new();
        for example in corpus {
            match example {
                Example::Flat(tokens) => {
                    for t in tokens {
                        counter.add(t);
                    }
                }
                Example::Chunked(chunks) => {
                    for chunk in chunks {
                        for t in chunk {
                            counter.add(t);
                        }
                    }
                }
            }
        }

        let mut specials: Vec<&str> = vec![PAD_TOKEN, UNK_TOKEN];
        if matches!(self.config.mode, StructureMode::Hierarchical { .. }) {
            specials.push(CHUNK_PAD_TOKEN);
        }
        if let Some(init) = &self.config.init_token {
            specials.push(init.as_str());
        }
        if let Some(eos) = &self.config.eos_token {
            specials.push(eos.as_str());
        }

        let vocab = Vocabulary::build(&counter, &specials);
        tracing::debug!("Built vocabulary with {} entries", vocab.len());
        self.vocab = Some(Arc::new(vocab));
        Ok(())
    }

    // ── Padding ───────────────────────────────────────────────────────────────
    /// Pad a minibatch to its batch-wide maxima and record the
    /// true lengths. Every example must match the field's
    /// structure mode.
    pub fn pad(&self, minibatch: &[Example]) -> PipelineResult<PaddedBatch> {
        match self.config.mode {
            StructureMode::Flat => self.pad_flat(minibatch),
            StructureMode::Hierarchical { .. } => self.pad_chunked(minibatch),
        }
    }

    fn pad_flat(&self, minibatch: &[Example]) -> PipelineResult<PaddedBatch> {
        let mut rows: Vec<&Vec<String>> = Vec::with_capacity(minibatch.len());
        for example in minibatch {
            match example {
                Example::Flat(tokens) => rows.push(tokens),
                Example::Chunked(_) => {
                    return Err(PipelineError::shape(
                        "pad (flat field)",
                        "Example::Flat",
                        "Example::Chunked",
                    ))
                }
            }
        }

        let max_len = self
            .config
            .fix_length
            .unwrap_or_else(|| rows.iter().map(|r| r.len()).max().unwrap_or(0));

        let mut tokens = Vec::with_capacity(rows.len());
        let mut lengths = Vec::with_capacity(rows.len());
        for row in rows {
            let kept = row.len().min(max_len);
            let mut padded: Vec<String> = Vec::with_capacity(max_len);
            let fill = vec![PAD_TOKEN.to_string(); max_len - kept];
            if self.config.pad_first {
                padded.extend(fill);
                padded.extend(row[..kept].iter().cloned());
            } else {
                padded.extend(row[..kept].iter().cloned());
                padded.extend(fill);
            }
            tokens.push(padded);
            lengths.push(kept);
        }

        Ok(PaddedBatch::Flat { tokens, lengths })
    }

    fn pad_chunked(&self, minibatch: &[Example]) -> PipelineResult<PaddedBatch> {
        let mut examples: Vec<&Vec<Chunk>> = Vec::with_capacity(minibatch.len());
        for example in minibatch {
            match example {
                Example::Chunked(chunks) => examples.push(chunks),
                Example::Flat(_) => {
                    return Err(PipelineError::shape(
                        "pad (hierarchical field)",
                        "Example::Chunked",
                        "Example::Flat",
                    ))
                }
            }
        }

        let max_outer = self
            .config
            .fix_length
            .unwrap_or_else(|| examples.iter().map(|e| e.len()).max().unwrap_or(0));

        // Inner max is over ALL chunks in the minibatch, not per example.
        let max_chunk = examples
            .iter()
            .flat_map(|e| e.iter())
            .map(|c| c.len())
            .max()
            .unwrap_or(0);

        let wraps =
            self.config.init_token.is_some() as usize + self.config.eos_token.is_some() as usize;
        let chunk_width = max_chunk + wraps;

        let mut padded_examples = Vec::with_capacity(examples.len());
        let mut outer_lengths = Vec::with_capacity(examples.len());
        let mut chunk_lengths = Vec::with_capacity(examples.len() * max_outer);

        for chunks in examples {
            let kept_outer = chunks.len().min(max_outer);

            let mut ready: Vec<Chunk> = Vec::with_capacity(max_outer);
            let mut lengths: Vec<usize> = Vec::with_capacity(max_outer);
            for chunk in &chunks[..kept_outer] {
                let kept = chunk.len().min(max_chunk);
                let mut wrapped: Vec<String> = Vec::with_capacity(chunk_width);
                if let Some(init) = &self.config.init_token {
                    wrapped.push(init.clone());
                }
                wrapped.extend(chunk[..kept].iter().cloned());
                if let Some(eos) = &self.config.eos_token {
                    wrapped.push(eos.clone());
                }
                let real = wrapped.len();
                // Right padding only: validate() rejects pad_first
                // for hierarchical fields.
                wrapped.extend(vec![CHUNK_PAD_TOKEN.to_string(); chunk_width - real]);
                ready.push(wrapped);
                lengths.push(real);
            }

            // Outer padding: whole chunks consisting entirely of
            // the outer pad token, recorded with length 0.
            let pad_chunk = vec![PAD_TOKEN.to_string(); chunk_width];
            let missing = max_outer - kept_outer;
            ready.extend(std::iter::repeat(pad_chunk).take(missing));
            lengths.extend(std::iter::repeat(0).take(missing));

            padded_examples.push(ready);
            outer_lengths.push(kept_outer);
            chunk_lengths.extend(lengths);
        }

        Ok(PaddedBatch::Chunked {
            chunks: padded_examples,
            outer_lengths,
            chunk_lengths,
        })
    }

    // ── Numericalization ──────────────────────────────────────────────────────
    /// Map every token of a padded batch (pad tokens included)
    /// through the vocabulary. Unknown tokens become `<unk>`;
    /// a missing vocabulary is a State error.
    pub fn numericalize(&self, batch: &PaddedBatch) -> PipelineResult<NumericalizedBatch> {
        let vocab = self.vocab()?;
        match batch {
            PaddedBatch::Flat { tokens, lengths } => {
                let ids = tokens
                    .iter()
                    .map(|row| row.iter().map(|t| vocab.id_of(t) as i32).collect())
                    .collect();
                Ok(NumericalizedBatch::Flat {
                    ids,
                    lengths: lengths.clone(),
                })
            }
            PaddedBatch::Chunked {
                chunks,
                outer_lengths,
                chunk_lengths,
            } => {
                let ids = chunks
                    .iter()
                    .map(|example| {
                        example
                            .iter()
                            .map(|chunk| chunk.iter().map(|t| vocab.id_of(t) as i32).collect())
                            .collect()
                    })
                    .collect();
                Ok(NumericalizedBatch::Chunked {
                    ids,
                    outer_lengths: outer_lengths.clone(),
                    chunk_lengths: chunk_lengths.clone(),
                })
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_preprocess_splits_chunks_on_separator() {
        let field = Field::source('|').unwrap();
        let ex = field.preprocess("1|2|3 4|5").unwrap();
        assert_eq!(
            ex,
            Example::Chunked(vec![tokens(&["1", "2", "3"]), tokens(&["4", "5"])])
        );
    }

    #[test]
    fn test_preprocess_rejects_content_free_input() {
        let field = Field::source('|').unwrap();
        let err = field.preprocess("   ").unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
        // A truly empty record is not malformed — just empty.
        assert_eq!(field.preprocess("").unwrap(), Example::Chunked(vec![]));
    }

    #[test]
    fn test_target_preprocess_wraps_with_markers() {
        let field = Field::target().unwrap();
        let ex = field.preprocess("3 5").unwrap();
        assert_eq!(ex, Example::Flat(tokens(&["<sos>", "3", "5", "<eos>"])));
    }

    #[test]
    fn test_whitespace_separator_rejected_at_construction() {
        let err = Field::source(' ').unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
    }

    #[test]
    fn test_build_vocab_twice_is_a_state_error() {
        let mut field = Field::source('|').unwrap();
        let ex = field.preprocess("1|2").unwrap();
        field.build_vocab([&ex]).unwrap();
        let err = field.build_vocab([&ex]).unwrap_err();
        assert!(matches!(err, PipelineError::State(_)));
    }

    #[test]
    fn test_numericalize_before_vocab_is_a_state_error() {
        let field = Field::source('|').unwrap();
        let ex = field.preprocess("1|2").unwrap();
        let padded = field.pad(&[ex]).unwrap();
        let err = field.numericalize(&padded).unwrap_err();
        assert!(matches!(err, PipelineError::State(_)));
    }

    #[test]
    fn test_pad_uses_batch_wide_chunk_max() {
        // Two chunks of differing token counts within one example:
        // the shorter chunk is padded to the BATCH-wide max (3),
        // not the per-example max.
        let field = Field::source('|').unwrap();
        let a = field.preprocess("1|2|3 4|5").unwrap();
        let b = field.preprocess("6|7").unwrap();
        let padded = field.pad(&[a, b]).unwrap();

        let PaddedBatch::Chunked {
            chunks,
            outer_lengths,
            chunk_lengths,
        } = padded
        else {
            panic!("expected a chunked batch");
        };

        assert_eq!(chunks[0][0], tokens(&["1", "2", "3"]));
        assert_eq!(chunks[0][1], tokens(&["4", "5", "<cpad>"]));
        // Second example: one real chunk, one whole pad chunk.
        assert_eq!(chunks[1][0], tokens(&["6", "7", "<cpad>"]));
        assert_eq!(chunks[1][1], tokens(&["<pad>", "<pad>", "<pad>"]));

        assert_eq!(outer_lengths, vec![2, 1]);
        assert_eq!(chunk_lengths, vec![3, 2, 2, 0]);
    }

    #[test]
    fn test_pad_round_trip_recovers_original_tokens() {
        let field = Field::source('|').unwrap();
        let raw = ["1|2|3 4|5", "6|7 8 9|0|1|2"];
        let examples: Vec<Example> =
            raw.iter().map(|r| field.preprocess(r).unwrap()).collect();
        let padded = field.pad(&examples).unwrap();

        let PaddedBatch::Chunked {
            chunks,
            outer_lengths,
            chunk_lengths,
        } = padded
        else {
            panic!("expected a chunked batch");
        };

        let max_outer = chunks[0].len();
        for (i, example) in examples.iter().enumerate() {
            let Example::Chunked(original) = example else { unreachable!() };
            let recovered: Vec<Chunk> = (0..outer_lengths[i])
                .map(|j| chunks[i][j][..chunk_lengths[i * max_outer + j]].to_vec())
                .collect();
            assert_eq!(&recovered, original);
        }
    }

    #[test]
    fn test_zero_chunk_example_becomes_all_pad_row() {
        let field = Field::source('|').unwrap();
        let empty = field.preprocess("").unwrap();
        let other = field.preprocess("1|2").unwrap();
        let padded = field.pad(&[empty, other]).unwrap();

        let PaddedBatch::Chunked {
            chunks,
            outer_lengths,
            chunk_lengths,
        } = padded
        else {
            panic!("expected a chunked batch");
        };
        assert_eq!(chunks[0][0], tokens(&["<pad>", "<pad>"]));
        assert_eq!(outer_lengths[0], 0);
        assert_eq!(chunk_lengths[0], 0);
    }

    #[test]
    fn test_empty_chunk_becomes_all_cpad_row() {
        // "|" is a chunk whose pieces are all empty → zero tokens.
        let field = Field::source('|').unwrap();
        let ex = field.preprocess("| 1|2").unwrap();
        let padded = field.pad(&[ex]).unwrap();

        let PaddedBatch::Chunked {
            chunks,
            chunk_lengths,
            ..
        } = padded
        else {
            panic!("expected a chunked batch");
        };
        assert_eq!(chunks[0][0], tokens(&["<cpad>", "<cpad>"]));
        assert_eq!(chunk_lengths[0], 0);
    }

    #[test]
    fn test_unknown_token_numericalizes_to_unk() {
        let mut field = Field::source('|').unwrap();
        let train = field.preprocess("1|2").unwrap();
        field.build_vocab([&train]).unwrap();

        let novel = field.preprocess("9|1").unwrap();
        let padded = field.pad(&[novel]).unwrap();
        let NumericalizedBatch::Chunked { ids, .. } =
            field.numericalize(&padded).unwrap()
        else {
            panic!("expected a chunked batch");
        };
        let vocab = field.vocab().unwrap();
        assert_eq!(ids[0][0][0] as usize, vocab.unk_id());
        assert_eq!(ids[0][0][1] as usize, vocab.id_of("1"));
    }

    #[test]
    fn test_pad_first_rejected_for_hierarchical_mode() {
        // Left-padded chunks would break the length-1 summary
        // gather, so the configuration is refused up front.
        let err = Field::new(FieldConfig {
            mode: StructureMode::Hierarchical { chunk_sep: '|' },
            init_token: None,
            eos_token: None,
            pad_first: true,
            fix_length: None,
            lower: false,
        })
        .unwrap_err();
        assert!(matches!(err, PipelineError::Format(_)));
    }

    #[test]
    fn test_pad_first_flat_pads_on_the_left() {
        let field = Field::new(FieldConfig {
            mode: StructureMode::Flat,
            init_token: None,
            eos_token: None,
            pad_first: true,
            fix_length: None,
            lower: false,
        })
        .unwrap();
        let a = field.preprocess("1 2 3").unwrap();
        let b = field.preprocess("4").unwrap();
        let padded = field.pad(&[a, b]).unwrap();

        let PaddedBatch::Flat { tokens: rows, lengths } = padded else {
            panic!("expected a flat batch");
        };
        assert_eq!(rows[1], tokens(&["<pad>", "<pad>", "4"]));
        assert_eq!(lengths, vec![3, 1]);
    }

    #[test]
    fn test_chunk_wrap_markers_count_toward_length() {
        let field = Field::new(FieldConfig {
            mode: StructureMode::Hierarchical { chunk_sep: '|' },
            init_token: Some(SOS_TOKEN.to_string()),
            eos_token: Some(EOS_TOKEN.to_string()),
            pad_first: false,
            fix_length: None,
            lower: false,
        })
        .unwrap();
        let a = field.preprocess("1|2 3").unwrap();
        let padded = field.pad(&[a]).unwrap();

        let PaddedBatch::Chunked {
            chunks,
            chunk_lengths,
            ..
        } = padded
        else {
            panic!("expected a chunked batch");
        };
        assert_eq!(chunks[0][0], tokens(&["<sos>", "1", "2", "<eos>"]));
        assert_eq!(chunks[0][1], tokens(&["<sos>", "3", "<eos>", "<cpad>"]));
        assert_eq!(chunk_lengths, vec![4, 3]);
    }
}
