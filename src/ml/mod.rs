// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches tensors once a batch exists.
//
//   model.rs           — GRU encoder and decoder
//   loss.rs            — masked negative log-likelihood
//   teacher_forcing.rs — seeded per-timestep coin flip
//   clipping.rs        — global gradient norm clipping
//   seq2seq.rs         — one batch through encoder + decoder;
//                        evaluation over a loader
//   schedule.rs        — training state and plateau decay
//   trainer.rs         — the training loop controller
//   inferencer.rs      — greedy decoding and sentence translation
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Sutskever et al. (2014) Sequence to Sequence Learning
//            Cho et al. (2014) GRU Encoder-Decoder

/// GRU encoder/decoder architecture
pub mod model;

pub mod loss;

pub mod teacher_forcing;

pub mod clipping;

/// Shared forward pass for training and evaluation
pub mod seq2seq;

pub mod schedule;

/// Iteration loop with validation, lr decay and checkpointing
pub mod trainer;

/// Greedy decoder and translator
pub mod inferencer;
