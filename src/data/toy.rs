// ============================================================
// Layer 4 — Toy Corpus Generator
// ============================================================
// Generates the toy "reverse first tokens" hierarchical task
// used to sanity-check the whole pipeline end to end:
//
//   input:  1–seq_max_len chunks of 2–max_chunk_len random
//           digits, joined with '|', chunks joined with spaces
//   output: the FIRST token of each chunk, in REVERSE chunk
//           order
//
//   "3|1|4 1|5"  →  "1 3"
//
// Writes train/dev/test subdirectories each holding a
// data.txt of tab-separated pairs, plus source/target digit
// vocab listings. Test-data generator only — nothing in the
// core depends on this format beyond the loader contract.

use anyhow::{Context, Result};
use rand::Rng;
use std::{fs, path::Path};

pub struct ToyCorpusConfig {
    /// Max tokens per chunk (min is 2).
    pub max_chunk_len: usize,
    /// Max chunks per sequence (min is 1).
    pub max_seq_len: usize,
    pub train_size: usize,
    pub dev_size: usize,
    pub test_size: usize,
}

impl Default for ToyCorpusConfig {
    fn default() -> Self {
        Self {
            max_chunk_len: 5,
            max_seq_len: 10,
            train_size: 10_000,
            dev_size: 1_000,
            test_size: 1_000,
        }
    }
}

/// Generate one (input, output) pair.
fn generate_pair(cfg: &ToyCorpusConfig, rng: &mut impl Rng) -> (String, String) {
    let seq_len = rng.gen_range(1..=cfg.max_seq_len);
    let mut chunks = Vec::with_capacity(seq_len);
    let mut firsts = Vec::with_capacity(seq_len);

    for _ in 0..seq_len {
        let chunk_len = rng.gen_range(2..=cfg.max_chunk_len);
        let chunk: Vec<String> = (0..chunk_len)
            .map(|_| rng.gen_range(0..10u32).to_string())
            .collect();
        firsts.push(chunk[0].clone());
        chunks.push(chunk.join("|"));
    }

    firsts.reverse();
    (chunks.join(" "), firsts.join(" "))
}

fn write_split(
    root: &Path,
    name: &str,
    size: usize,
    cfg: &ToyCorpusConfig,
    rng: &mut impl Rng,
) -> Result<()> {
    let dir = root.join(name);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create '{}'", dir.display()))?;

    let mut lines = String::new();
    for _ in 0..size {
        let (src, tgt) = generate_pair(cfg, rng);
        lines.push_str(&src);
        lines.push('\t');
        lines.push_str(&tgt);
        lines.push('\n');
    }

    let data_path = dir.join("data.txt");
    fs::write(&data_path, lines)
        .with_context(|| format!("Cannot write '{}'", data_path.display()))?;
    tracing::info!("Wrote {} pairs to '{}'", size, data_path.display());
    Ok(())
}

/// Generate the full toy corpus under `dir/toy_reverse_hseq`.
pub fn generate_toy_corpus(dir: &str, cfg: &ToyCorpusConfig) -> Result<()> {
    let root = Path::new(dir).join("toy_reverse_hseq");
    fs::create_dir_all(&root)
        .with_context(|| format!("Cannot create '{}'", root.display()))?;

    let mut rng = rand::thread_rng();
    write_split(&root, "train", cfg.train_size, cfg, &mut rng)?;
    write_split(&root, "dev", cfg.dev_size, cfg, &mut rng)?;
    write_split(&root, "test", cfg.test_size, cfg, &mut rng)?;

    // Digit vocab listings, one token per line — handy for
    // eyeballing, not consumed by the pipeline.
    let digits: String = (0..10).map(|i| format!("{i}\n")).collect();
    fs::write(root.join("vocab.source"), &digits)?;
    fs::write(root.join("vocab.target"), &digits)?;

    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_is_reversed_first_tokens() {
        let cfg = ToyCorpusConfig::default();
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let (src, tgt) = generate_pair(&cfg, &mut rng);
            let mut firsts: Vec<&str> = src
                .split_whitespace()
                .map(|chunk| chunk.split('|').next().unwrap())
                .collect();
            firsts.reverse();
            assert_eq!(tgt, firsts.join(" "));
        }
    }

    #[test]
    fn test_chunk_lengths_within_bounds() {
        let cfg = ToyCorpusConfig::default();
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let (src, _) = generate_pair(&cfg, &mut rng);
            let chunks: Vec<&str> = src.split_whitespace().collect();
            assert!((1..=cfg.max_seq_len).contains(&chunks.len()));
            for chunk in chunks {
                let tokens = chunk.split('|').count();
                assert!((2..=cfg.max_chunk_len).contains(&tokens));
            }
        }
    }
}
