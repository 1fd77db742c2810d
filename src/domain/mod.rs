// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts
// of the translation system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// What lives here:
//
//   vocabulary.rs    — token <-> index mapping with counts,
//                      reserved PAD/SOS/EOS/UNK indices and
//                      frequency-based trimming
//
//   sequence.rs      — sentence -> [SOS, ids.., EOS] encoding
//                      and the inverse decoding
//
//   sentence_pair.rs — one (source, target) training example
//
//   traits.rs        — seams implemented by other layers
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Bidirectional token/index mapping built from a corpus
pub mod vocabulary;

/// Sentence <-> index sequence conversion
pub mod sequence;

/// A bilingual (source, target) sentence pair
pub mod sentence_pair;

/// Core abstractions (traits) that other layers implement
pub mod traits;
