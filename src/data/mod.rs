// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw corpus file to tensor batches.
//
//   corpus .txt (tab-separated)
//       │
//       ▼
//   CorpusLoader      → reads lines, yields SentencePairs
//       │
//       ▼
//   Preprocessor      → lowercases, splits punctuation,
//       │               expands contractions, filters lengths
//       ▼
//   split_data        → seeded train / validation / test
//       │
//       ▼
//   PairDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   BatchBuilder      → sorts, encodes, pads, transposes
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads tab-separated parallel corpora
pub mod loader;

/// Cleans sentences and filters pairs by length
pub mod preprocessor;

/// Implements Burn's Dataset trait for sentence pairs
pub mod dataset;

/// Implements Burn's Batcher trait: padded time-major batches
pub mod batcher;

/// Seeded train / validation / test split
pub mod splitter;
