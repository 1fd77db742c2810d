// ============================================================
// Layer 3 — SentencePair Domain Type
// ============================================================
// One training example: a source sentence and its translation.
// Both sides are cleaned, whitespace-tokenizable strings; they
// only become index sequences inside the batcher.
//
// Example:
//   source: "i am cold ."
//   target: "mir ist kalt ."

use serde::{Deserialize, Serialize};

use crate::domain::sequence::token_count;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    pub source: String,
    pub target: String,
}

impl SentencePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Source length in tokens, without SOS/EOS.
    pub fn source_len(&self) -> usize {
        token_count(&self.source)
    }

    pub fn target_len(&self) -> usize {
        token_count(&self.target)
    }

    /// Swap the two sides, turning an eng→deu pair into deu→eng.
    pub fn reversed(self) -> Self {
        Self {
            source: self.target,
            target: self.source,
        }
    }
}
