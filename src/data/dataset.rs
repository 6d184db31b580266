use burn::data::dataset::Dataset;

use crate::domain::example::PairExample;

/// Preprocessed (source, target) pairs behind Burn's Dataset
/// trait so the DataLoader can index and shuffle them.
pub struct PairDataset {
    pairs: Vec<PairExample>,
}

impl PairDataset {
    pub fn new(pairs: Vec<PairExample>) -> Self {
        Self { pairs }
    }
}

impl Dataset<PairExample> for PairDataset {
    fn get(&self, index: usize) -> Option<PairExample> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
