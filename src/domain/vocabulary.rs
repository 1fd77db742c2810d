// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Maps every word of one language to a dense integer index
// and back again, and counts how often each word was seen.
//
// Index layout (identical for every vocabulary):
//
//   0  <PAD>   padding placeholder inside a batch
//   1  <SOS>   start of sequence
//   2  <EOS>   end of sequence
//   3  <UNK>   any word the vocabulary does not know
//   4… user tokens, in first-seen order
//
// The reserved surface forms are part of `token_to_index`, so
// both directions always have the same number of entries.
//
// Trimming rebuilds both maps keeping only frequent words.
// It is one-shot: once trimmed, further calls do nothing.
//
// Reference: Rust Book §8 (HashMaps)

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PAD_TOKEN: &str = "<PAD>";
pub const SOS_TOKEN: &str = "<SOS>";
pub const EOS_TOKEN: &str = "<EOS>";
pub const UNK_TOKEN: &str = "<UNK>";

pub const PAD_IDX: usize = 0;
pub const SOS_IDX: usize = 1;
pub const EOS_IDX: usize = 2;
pub const UNK_IDX: usize = 3;

/// Reserved tokens in index order.
pub const RESERVED_TOKENS: [&str; 4] = [PAD_TOKEN, SOS_TOKEN, EOS_TOKEN, UNK_TOKEN];

/// Number of reserved indices; the first user token gets this index.
pub const NUM_RESERVED: usize = RESERVED_TOKENS.len();

// ─── Vocabulary ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    lang:           String,
    trimmed:        bool,
    token_to_index: HashMap<String, usize>,
    index_to_token: Vec<String>,
    token_counts:   HashMap<String, usize>,
}

/// Outcome of a trimming pass, mostly for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimReport {
    pub kept:  usize,
    pub total: usize,
}

impl TrimReport {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.kept as f64 / self.total as f64
        }
    }
}

impl Vocabulary {
    /// An empty vocabulary holding only the four reserved tokens.
    pub fn new(lang: impl Into<String>) -> Self {
        let index_to_token: Vec<String> = RESERVED_TOKENS.iter().map(|t| t.to_string()).collect();
        let token_to_index = index_to_token
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            lang: lang.into(),
            trimmed: false,
            token_to_index,
            index_to_token,
            token_counts: HashMap::new(),
        }
    }

    /// Build a vocabulary from raw sentences or pre-tokenized
    /// sequences. Token sequences are joined with spaces first,
    /// so both shapes go through the same `add_sentence` path.
    pub fn from_sentences<I, S>(sentences: I, lang: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: SentenceLike,
    {
        let mut vocab = Self::new(lang);
        for sentence in sentences {
            vocab.add_sentence(&sentence.as_sentence());
        }
        tracing::debug!("{}", vocab);
        vocab
    }

    pub fn add_sentence(&mut self, sentence: &str) {
        for token in sentence.split_whitespace() {
            self.add_token(token);
        }
    }

    /// Register one occurrence of `token`.
    /// Reserved surface forms are never counted.
    pub fn add_token(&mut self, token: &str) {
        if let Some(&index) = self.token_to_index.get(token) {
            if index >= NUM_RESERVED {
                *self.token_counts.entry(token.to_string()).or_insert(0) += 1;
            }
            return;
        }
        let index = self.index_to_token.len();
        self.token_to_index.insert(token.to_string(), index);
        self.index_to_token.push(token.to_string());
        self.token_counts.insert(token.to_string(), 1);
    }

    /// Drop every user token seen fewer than `min_count` times.
    ///
    /// Returns `None` when the vocabulary was already trimmed.
    /// Survivors are re-added in their original order, so they
    /// stay contiguous from index 4 and restart with count 1.
    pub fn trim(&mut self, min_count: usize) -> Option<TrimReport> {
        if self.trimmed {
            return None;
        }
        self.trimmed = true;

        let keep: Vec<String> = self.user_tokens()
            .filter(|t| self.count_of(t) >= min_count)
            .map(str::to_string)
            .collect();

        let report = TrimReport { kept: keep.len(), total: self.num_user_tokens() };
        tracing::info!(
            "keep_words {} / {} = {:.4}",
            report.kept,
            report.total,
            report.ratio()
        );

        let mut rebuilt = Self::new(std::mem::take(&mut self.lang));
        for token in &keep {
            rebuilt.add_token(token);
        }
        rebuilt.trimmed = true;
        *self = rebuilt;
        Some(report)
    }

    /// Index of `token`, or `UNK_IDX` when unknown.
    pub fn index_of(&self, token: &str) -> usize {
        self.token_to_index.get(token).copied().unwrap_or(UNK_IDX)
    }

    /// Surface form at `index`, or `<UNK>` when out of range.
    pub fn token_of(&self, index: usize) -> &str {
        self.index_to_token
            .get(index)
            .map(String::as_str)
            .unwrap_or(UNK_TOKEN)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_index.contains_key(token)
    }

    pub fn count_of(&self, token: &str) -> usize {
        self.token_counts.get(token).copied().unwrap_or(0)
    }

    /// Total number of indices, reserved ones included.
    /// This is the embedding table height for the language.
    pub fn len(&self) -> usize {
        self.index_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_user_tokens() == 0
    }

    pub fn num_user_tokens(&self) -> usize {
        self.index_to_token.len() - NUM_RESERVED
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn is_trimmed(&self) -> bool {
        self.trimmed
    }

    /// User tokens in index order.
    pub fn user_tokens(&self) -> impl Iterator<Item = &str> + '_ {
        self.index_to_token[NUM_RESERVED..].iter().map(String::as_str)
    }

    // ─── Persistence ──────────────────────────────────────────────────────────

    pub fn to_snapshot(&self) -> VocabularySnapshot {
        let tokens: Vec<String> = self.user_tokens().map(str::to_string).collect();
        let counts = tokens.iter().map(|t| self.count_of(t)).collect();
        VocabularySnapshot {
            lang: self.lang.clone(),
            trimmed: self.trimmed,
            tokens,
            counts,
        }
    }

    /// Rebuild a vocabulary from a saved snapshot.
    ///
    /// The snapshot is validated instead of trusted: duplicate
    /// tokens, reserved surface forms among user tokens and
    /// misaligned counts are all rejected.
    pub fn from_snapshot(snapshot: VocabularySnapshot) -> Result<Self, SnapshotError> {
        if snapshot.tokens.len() != snapshot.counts.len() {
            return Err(SnapshotError::CountMismatch {
                tokens: snapshot.tokens.len(),
                counts: snapshot.counts.len(),
            });
        }

        let mut vocab = Self::new(snapshot.lang);
        for (token, count) in snapshot.tokens.into_iter().zip(snapshot.counts) {
            if RESERVED_TOKENS.contains(&token.as_str()) {
                return Err(SnapshotError::ReservedToken(token));
            }
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                return Err(SnapshotError::InvalidToken(token));
            }
            if vocab.contains(&token) {
                return Err(SnapshotError::DuplicateToken(token));
            }
            let index = vocab.index_to_token.len();
            vocab.token_to_index.insert(token.clone(), index);
            vocab.index_to_token.push(token.clone());
            vocab.token_counts.insert(token, count);
        }
        vocab.trimmed = snapshot.trimmed;
        Ok(vocab)
    }
}

impl std::fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} with {} unique tokens", self.lang, self.len())
    }
}

// ─── VocabularySnapshot ───────────────────────────────────────────────────────
/// Serialisable form of a vocabulary. Only user tokens are
/// stored; the reserved prefix is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularySnapshot {
    pub lang:    String,
    pub trimmed: bool,
    pub tokens:  Vec<String>,
    pub counts:  Vec<usize>,
}

impl VocabularySnapshot {
    /// Size the restored vocabulary will have.
    pub fn vocab_size(&self) -> usize {
        NUM_RESERVED + self.tokens.len()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("snapshot has {tokens} tokens but {counts} counts")]
    CountMismatch { tokens: usize, counts: usize },
    #[error("reserved token '{0}' listed as a user token")]
    ReservedToken(String),
    #[error("token '{0}' appears twice")]
    DuplicateToken(String),
    #[error("invalid token {0:?}")]
    InvalidToken(String),
}

// ─── SentenceLike ─────────────────────────────────────────────────────────────
/// Anything that can be read as one space-separated sentence:
/// a raw string or an already tokenized sequence.
pub trait SentenceLike {
    fn as_sentence(&self) -> Cow<'_, str>;
}

impl SentenceLike for str {
    fn as_sentence(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl SentenceLike for String {
    fn as_sentence(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl SentenceLike for [String] {
    fn as_sentence(&self) -> Cow<'_, str> {
        Cow::Owned(self.join(" "))
    }
}

impl SentenceLike for [&str] {
    fn as_sentence(&self) -> Cow<'_, str> {
        Cow::Owned(self.join(" "))
    }
}

impl SentenceLike for Vec<String> {
    fn as_sentence(&self) -> Cow<'_, str> {
        self.as_slice().as_sentence()
    }
}

impl SentenceLike for Vec<&str> {
    fn as_sentence(&self) -> Cow<'_, str> {
        self.as_slice().as_sentence()
    }
}

impl<T: SentenceLike + ?Sized> SentenceLike for &T {
    fn as_sentence(&self) -> Cow<'_, str> {
        (**self).as_sentence()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn maps_consistent(v: &Vocabulary) -> bool {
        v.token_to_index.len() == v.len()
            && (0..v.len()).all(|i| v.index_of(v.token_of(i)) == i)
    }

    #[test]
    fn test_reserved_indices() {
        let v = Vocabulary::new("eng");
        assert_eq!(v.len(), 4);
        assert_eq!(v.index_of("<PAD>"), PAD_IDX);
        assert_eq!(v.index_of("<SOS>"), SOS_IDX);
        assert_eq!(v.index_of("<EOS>"), EOS_IDX);
        assert_eq!(v.index_of("<UNK>"), UNK_IDX);
        assert!(v.is_empty());
    }

    #[test]
    fn test_first_seen_order_and_counts() {
        let v = Vocabulary::from_sentences(["i am happy", "i am sad"], "eng");
        assert_eq!(v.index_of("i"), 4);
        assert_eq!(v.index_of("am"), 5);
        assert_eq!(v.index_of("happy"), 6);
        assert_eq!(v.index_of("sad"), 7);
        assert_eq!(v.count_of("i"), 2);
        assert_eq!(v.count_of("sad"), 1);
        assert_eq!(v.len(), 8);
        assert!(maps_consistent(&v));
    }

    #[test]
    fn test_pre_tokenized_input_matches_raw() {
        let raw = Vocabulary::from_sentences(["i am happy", "i am sad"], "eng");
        let tokenized = Vocabulary::from_sentences(
            vec![vec!["i", "am", "happy"], vec!["i", "am", "sad"]],
            "eng",
        );
        assert_eq!(raw, tokenized);
    }

    #[test]
    fn test_unknown_token_maps_to_unk() {
        let v = Vocabulary::from_sentences(["hello world"], "eng");
        assert_eq!(v.index_of("goodbye"), UNK_IDX);
        assert_eq!(v.token_of(999), UNK_TOKEN);
    }

    #[test]
    fn test_reserved_tokens_are_not_counted() {
        let mut v = Vocabulary::new("eng");
        v.add_sentence("<UNK> word <UNK>");
        assert_eq!(v.len(), 5);
        assert_eq!(v.count_of("<UNK>"), 0);
    }

    #[test]
    fn test_trim_keeps_frequent_tokens_contiguous() {
        let mut v = Vocabulary::from_sentences(["a b c a b a"], "eng");
        let report = v.trim(2).unwrap();
        assert_eq!(report.kept, 2);
        assert_eq!(report.total, 3);
        assert_eq!(v.index_of("a"), 4);
        assert_eq!(v.index_of("b"), 5);
        assert_eq!(v.index_of("c"), UNK_IDX);
        assert_eq!(v.len(), 6);
        assert!(v.is_trimmed());
        assert!(maps_consistent(&v));
    }

    #[test]
    fn test_second_trim_is_noop() {
        let mut once = Vocabulary::from_sentences(["a b c a b a d d"], "eng");
        let mut twice = once.clone();
        once.trim(2);
        twice.trim(2);
        assert!(twice.trim(3).is_none());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_trim_everything_keeps_reserved() {
        let mut v = Vocabulary::from_sentences(["x y z"], "eng");
        v.trim(10);
        assert_eq!(v.len(), NUM_RESERVED);
        assert!(maps_consistent(&v));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut v = Vocabulary::from_sentences(["das ist gut", "das ist schlecht"], "deu");
        v.trim(1);
        let restored = Vocabulary::from_snapshot(v.to_snapshot()).unwrap();
        assert_eq!(restored, v);
        assert_eq!(v.to_snapshot().vocab_size(), v.len());
    }

    #[test]
    fn test_snapshot_rejects_duplicates_and_reserved() {
        let dup = VocabularySnapshot {
            lang: "eng".into(),
            trimmed: false,
            tokens: vec!["a".into(), "a".into()],
            counts: vec![1, 1],
        };
        assert_eq!(
            Vocabulary::from_snapshot(dup),
            Err(SnapshotError::DuplicateToken("a".into()))
        );

        let reserved = VocabularySnapshot {
            lang: "eng".into(),
            trimmed: false,
            tokens: vec!["<EOS>".into()],
            counts: vec![1],
        };
        assert!(matches!(
            Vocabulary::from_snapshot(reserved),
            Err(SnapshotError::ReservedToken(_))
        ));

        let misaligned = VocabularySnapshot {
            lang: "eng".into(),
            trimmed: false,
            tokens: vec!["a".into()],
            counts: vec![],
        };
        assert!(Vocabulary::from_snapshot(misaligned).is_err());
    }
}
