// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Loads newline-delimited, tab-separated (input, output) pairs
// from a plain-text corpus file:
//
//   1|2|3 4|5<TAB>4 1
//   7|8 9|0|1<TAB>9 7
//
// The loader does no tokenization — that is the Field's job.
// Malformed lines (no tab) are logged and skipped rather than
// failing the whole run, so one bad record never blocks
// training on a large corpus.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::example::RawPair;
use crate::domain::traits::CorpusSource;

/// Loads tab-separated pairs from a single text file.
/// Implements the CorpusSource trait from Layer 3.
pub struct TsvCorpusLoader {
    path: String,
}

impl TsvCorpusLoader {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusSource for TsvCorpusLoader {
    fn load_all(&self) -> Result<Vec<RawPair>> {
        let path = Path::new(&self.path);
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read corpus file '{}'", self.path))?;

        let mut pairs = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((src, tgt)) => pairs.push(RawPair::new(src, tgt)),
                None => {
                    tracing::warn!(
                        "Skipping line {} of '{}': no tab separator",
                        lineno + 1,
                        self.path
                    );
                }
            }
        }

        tracing::info!("Loaded {} pairs from '{}'", pairs.len(), self.path);
        Ok(pairs)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loads_pairs_and_skips_bad_lines() {
        let dir = std::env::temp_dir().join("hseq2seq_loader_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data.txt");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "1|2 3|4\t3 1").unwrap();
        writeln!(f, "no-tab-here").unwrap();
        writeln!(f, "5|6\t5").unwrap();

        let loader = TsvCorpusLoader::new(path.to_str().unwrap());
        let pairs = loader.load_all().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].source, "1|2 3|4");
        assert_eq!(pairs[1].target, "5");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = TsvCorpusLoader::new("/definitely/not/here.txt");
        assert!(loader.load_all().is_err());
    }
}
