use burn::data::dataset::Dataset;

use crate::domain::sentence_pair::SentencePair;

/// In-memory list of cleaned sentence pairs for one split.
pub struct PairDataset {
    pairs: Vec<SentencePair>,
}

impl PairDataset {
    pub fn new(pairs: Vec<SentencePair>) -> Self { Self { pairs } }

    /// Longest source and target sentence, in tokens.
    pub fn max_lengths(&self) -> (usize, usize) {
        self.pairs.iter().fold((0, 0), |(s, t), p| {
            (s.max(p.source_len()), t.max(p.target_len()))
        })
    }
}

impl Dataset<SentencePair> for PairDataset {
    fn get(&self, index: usize) -> Option<SentencePair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_lengths() {
        let ds = PairDataset::new(vec![
            SentencePair::new("a b c", "x"),
            SentencePair::new("a", "x y z w"),
        ]);
        assert_eq!(ds.max_lengths(), (3, 4));
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(1).unwrap().source, "a");
        assert!(ds.get(2).is_none());
    }
}
