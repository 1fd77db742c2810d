// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits, so a
// different corpus format or translation engine can be plugged
// in without touching the workflows.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sentence_pair::SentencePair;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can produce bilingual sentence pairs.
///
/// Implementations:
///   - CorpusLoader → tab-separated text file
pub trait CorpusSource {
    fn load_pairs(&self) -> Result<Vec<SentencePair>>;
}

// ─── Translate ────────────────────────────────────────────────────────────────
/// Any component that turns a source sentence into a target one.
///
/// Implementations:
///   - Translator → greedy decoding with the trained model
pub trait Translate {
    fn translate(&self, sentence: &str) -> Result<String>;
}
