// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence that several layers share:
//
//   checkpoint.rs — model / optimiser records (CompactRecorder),
//                   vocabulary snapshots, training state and
//                   the run's TrainConfig, with strict
//                   compatibility checks on load
//
//   metrics.rs    — per-validation CSV rows and the per-run
//                   experiment summary
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoint saving and loading
pub mod checkpoint;

/// Validation metrics and experiment logs
pub mod metrics;
