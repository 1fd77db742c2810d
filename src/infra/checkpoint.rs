// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything needed to resume a run or
// translate with a trained model.
//
// File layout:
//   checkpoints/<model_name>/
//     train_config.json          ← run configuration
//     latest_checkpoint.json     ← iteration of the newest save
//     1500/
//       encoder.mpk.gz           ← encoder weights (incl. source embedding)
//       decoder.mpk.gz           ← decoder weights (incl. target embedding)
//       encoder_optim.mpk.gz     ← encoder Adam moments
//       decoder_optim.mpk.gz     ← decoder Adam moments
//       src_vocab.json           ← source vocabulary snapshot
//       trg_vocab.json           ← target vocabulary snapshot
//       state.json               ← TrainingState + model dimensions
//
// Loading is strict. Vocabulary snapshots are validated,
// vocabulary sizes are compared against the freshly built
// vocabularies and against the model's embedding tables, and
// any mismatch is a CheckpointError before a single weight is
// applied.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    module::Module,
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, Record, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::application::train_use_case::TrainConfig;
use crate::domain::vocabulary::{SnapshotError, Vocabulary, VocabularySnapshot};
use crate::ml::{
    model::{Decoder, Encoder},
    schedule::TrainingState,
};

const LATEST_FILE: &str = "latest_checkpoint.json";
const CONFIG_FILE: &str = "train_config.json";
const STATE_FILE:  &str = "state.json";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("{side} vocabulary mismatch: checkpoint has {saved} tokens, expected {expected}")]
    VocabularyMismatch { side: &'static str, saved: usize, expected: usize },

    #[error("{side} embedding mismatch: checkpoint was saved with {saved} rows, model has {expected}")]
    EmbeddingMismatch { side: &'static str, saved: usize, expected: usize },

    #[error("hidden size mismatch: checkpoint has {saved}, model has {expected}")]
    HiddenSizeMismatch { saved: usize, expected: usize },

    #[error("{side} embedding width mismatch: checkpoint has {saved}, model has {expected}")]
    EmbeddingDimMismatch { side: &'static str, saved: usize, expected: usize },

    #[error("{side} layer count mismatch: checkpoint has {saved} GRU layers, model has {expected}")]
    LayerCountMismatch { side: &'static str, saved: usize, expected: usize },

    #[error("invalid {side} vocabulary in checkpoint: {source}")]
    InvalidVocabulary {
        side: &'static str,
        #[source]
        source: SnapshotError,
    },

    #[error("no checkpoint found in '{0}'")]
    NotFound(PathBuf),
}

/// Contents of `state.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub iteration:      usize,
    pub state:          TrainingState,
    pub src_vocab_size: usize,
    pub trg_vocab_size: usize,
    pub embedding_dim:  usize,
    pub hidden_size:    usize,
    pub n_layers:       usize,
}

/// Borrowed view of everything a checkpoint persists.
pub struct CheckpointParts<'a, B: AutodiffBackend, OE, OD> {
    pub state:         &'a TrainingState,
    pub encoder:       &'a Encoder<B>,
    pub decoder:       &'a Decoder<B>,
    pub encoder_optim: &'a OE,
    pub decoder_optim: &'a OD,
    pub src_vocab:     &'a Vocabulary,
    pub trg_vocab:     &'a Vocabulary,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Open an existing run directory without creating anything.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(CheckpointError::NotFound(dir).into());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn iteration_dir(&self, iteration: usize) -> PathBuf {
        self.dir.join(iteration.to_string())
    }

    // ─── Saving ───────────────────────────────────────────────────────────────

    pub fn save<B, OE, OD>(&self, parts: CheckpointParts<'_, B, OE, OD>) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        OE: Optimizer<Encoder<B>, B>,
        OD: Optimizer<Decoder<B>, B>,
    {
        let iteration = parts.state.iteration;
        let dir = self.iteration_dir(iteration);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;

        save_record::<B, _>(dir.join("encoder"), parts.encoder.clone().into_record())?;
        save_record::<B, _>(dir.join("decoder"), parts.decoder.clone().into_record())?;
        save_record::<B, _>(dir.join("encoder_optim"), parts.encoder_optim.to_record())?;
        save_record::<B, _>(dir.join("decoder_optim"), parts.decoder_optim.to_record())?;

        write_json(&dir.join("src_vocab.json"), &parts.src_vocab.to_snapshot())?;
        write_json(&dir.join("trg_vocab.json"), &parts.trg_vocab.to_snapshot())?;

        let meta = CheckpointMeta {
            iteration,
            state:          parts.state.clone(),
            src_vocab_size: parts.encoder.vocab_size(),
            trg_vocab_size: parts.decoder.vocab_size(),
            embedding_dim:  parts.encoder.embedding_dim(),
            hidden_size:    parts.encoder.hidden_size,
            n_layers:       parts.encoder.n_layers(),
        };
        write_json(&dir.join(STATE_FILE), &meta)?;

        // Pointer last, so it never names a half-written checkpoint.
        write_json(&self.dir.join(LATEST_FILE), &iteration)?;

        tracing::debug!("Saved checkpoint: iteration {}", iteration);
        Ok(dir)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        write_json(&self.dir.join(CONFIG_FILE), cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        read_json(&self.dir.join(CONFIG_FILE)).with_context(|| {
            "Cannot read the training config. Make sure you have run 'train' before 'translate'."
        })
    }

    // ─── Loading ──────────────────────────────────────────────────────────────

    /// Iteration of the newest checkpoint, if any was written.
    pub fn latest_iteration(&self) -> Option<usize> {
        read_json(&self.dir.join(LATEST_FILE)).ok()
    }

    pub fn require_latest_iteration(&self) -> Result<usize> {
        self.latest_iteration()
            .ok_or_else(|| CheckpointError::NotFound(self.dir.clone()).into())
    }

    pub fn load_meta(&self, iteration: usize) -> Result<CheckpointMeta> {
        read_json(&self.iteration_dir(iteration).join(STATE_FILE))
    }

    /// Restore both vocabularies of a checkpoint.
    ///
    /// `expected` holds the (source, target) sizes of freshly built
    /// vocabularies; a resumed run must agree with them exactly.
    pub fn load_vocabularies(
        &self,
        iteration: usize,
        expected:  Option<(usize, usize)>,
    ) -> Result<(Vocabulary, Vocabulary)> {
        let dir  = self.iteration_dir(iteration);
        let meta = self.load_meta(iteration)?;

        let src = restore_vocab("source", read_json(&dir.join("src_vocab.json"))?)?;
        let trg = restore_vocab("target", read_json(&dir.join("trg_vocab.json"))?)?;

        check_size(CheckpointError::VocabularyMismatch {
            side: "source", saved: src.len(), expected: meta.src_vocab_size,
        })?;
        check_size(CheckpointError::VocabularyMismatch {
            side: "target", saved: trg.len(), expected: meta.trg_vocab_size,
        })?;

        if let Some((src_expected, trg_expected)) = expected {
            check_size(CheckpointError::VocabularyMismatch {
                side: "source", saved: src.len(), expected: src_expected,
            })?;
            check_size(CheckpointError::VocabularyMismatch {
                side: "target", saved: trg.len(), expected: trg_expected,
            })?;
        }

        Ok((src, trg))
    }

    /// Load weights into freshly initialised models. Works for any
    /// backend, so an autodiff checkpoint can feed inference.
    pub fn load_models<B: Backend>(
        &self,
        iteration: usize,
        encoder:   Encoder<B>,
        decoder:   Decoder<B>,
        device:    &B::Device,
    ) -> Result<(Encoder<B>, Decoder<B>)> {
        let dir  = self.iteration_dir(iteration);
        let meta = self.load_meta(iteration)?;

        check_architecture(&meta, &encoder, &decoder)?;

        tracing::info!("Loading checkpoint from iteration {}", iteration);
        let encoder = encoder.load_record(load_record::<B, _>(dir.join("encoder"), device)?);
        let decoder = decoder.load_record(load_record::<B, _>(dir.join("decoder"), device)?);

        // The record replaces parameters wholesale; check again.
        check_architecture(&meta, &encoder, &decoder)?;
        Ok((encoder, decoder))
    }

    pub fn load_optimizers<B, OE, OD>(
        &self,
        iteration:     usize,
        encoder_optim: OE,
        decoder_optim: OD,
        device:        &B::Device,
    ) -> Result<(OE, OD)>
    where
        B: AutodiffBackend,
        OE: Optimizer<Encoder<B>, B>,
        OD: Optimizer<Decoder<B>, B>,
    {
        let dir = self.iteration_dir(iteration);
        let encoder_optim = encoder_optim.load_record(load_record::<B, _>(dir.join("encoder_optim"), device)?);
        let decoder_optim = decoder_optim.load_record(load_record::<B, _>(dir.join("decoder_optim"), device)?);
        Ok((encoder_optim, decoder_optim))
    }
}

fn check_architecture<B: Backend>(meta: &CheckpointMeta, encoder: &Encoder<B>, decoder: &Decoder<B>) -> Result<()> {
    check_size(CheckpointError::EmbeddingMismatch {
        side: "source", saved: meta.src_vocab_size, expected: encoder.vocab_size(),
    })?;
    check_size(CheckpointError::EmbeddingMismatch {
        side: "target", saved: meta.trg_vocab_size, expected: decoder.vocab_size(),
    })?;
    for (side, width) in [("source", encoder.embedding_dim()), ("target", decoder.embedding_dim())] {
        check_size(CheckpointError::EmbeddingDimMismatch {
            side, saved: meta.embedding_dim, expected: width,
        })?;
    }
    for hidden in [encoder.hidden_size, decoder.hidden_size] {
        if meta.hidden_size != hidden {
            return Err(CheckpointError::HiddenSizeMismatch {
                saved: meta.hidden_size, expected: hidden,
            }.into());
        }
    }
    for (side, layers) in [("encoder", encoder.n_layers()), ("decoder", decoder.n_layers())] {
        check_size(CheckpointError::LayerCountMismatch {
            side, saved: meta.n_layers, expected: layers,
        })?;
    }
    Ok(())
}

/// Passes the error through unless its sizes agree.
fn check_size(err: CheckpointError) -> Result<()> {
    match err {
        CheckpointError::VocabularyMismatch { saved, expected, .. }
        | CheckpointError::EmbeddingMismatch { saved, expected, .. }
        | CheckpointError::EmbeddingDimMismatch { saved, expected, .. }
        | CheckpointError::LayerCountMismatch { saved, expected, .. }
            if saved == expected => Ok(()),
        err => Err(err.into()),
    }
}

fn restore_vocab(side: &'static str, snapshot: VocabularySnapshot) -> Result<Vocabulary> {
    Vocabulary::from_snapshot(snapshot)
        .map_err(|source| CheckpointError::InvalidVocabulary { side, source }.into())
}

fn save_record<B: Backend, R: Record<B>>(path: PathBuf, record: R) -> Result<()> {
    Recorder::<B>::record(&CompactRecorder::new(), record, path.clone())
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
    Ok(())
}

fn load_record<B: Backend, R: Record<B>>(path: PathBuf, device: &B::Device) -> Result<R> {
    Recorder::<B>::load(&CompactRecorder::new(), path.clone(), device)
        .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed JSON in '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamConfig,
    };

    use crate::ml::model::Seq2SeqConfig;

    type TestBackend = NdArray;
    type TestAutodiff = Autodiff<NdArray>;

    fn vocabs() -> (Vocabulary, Vocabulary) {
        (
            Vocabulary::from_sentences(["i am cold", "go"], "eng"),
            Vocabulary::from_sentences(["mir ist kalt", "geh"], "deu"),
        )
    }

    fn config(src: &Vocabulary, trg: &Vocabulary) -> Seq2SeqConfig {
        Seq2SeqConfig::new(src.len(), trg.len())
            .with_embedding_dim(4)
            .with_hidden_size(6)
            .with_n_layers(1)
    }

    fn save_one(manager: &CheckpointManager, iteration: usize) -> (Vocabulary, Vocabulary) {
        let (src, trg) = vocabs();
        let device = Default::default();
        let cfg = config(&src, &trg);
        let encoder = cfg.init_encoder::<TestAutodiff>(&device);
        let decoder = cfg.init_decoder::<TestAutodiff>(&device);
        let encoder_optim = AdamConfig::new().init::<TestAutodiff, Encoder<TestAutodiff>>();
        let decoder_optim = AdamConfig::new().init::<TestAutodiff, Decoder<TestAutodiff>>();
        let mut state = TrainingState::new(1e-3, 5e-3);
        state.iteration = iteration;

        manager
            .save(CheckpointParts {
                state: &state,
                encoder: &encoder,
                decoder: &decoder,
                encoder_optim: &encoder_optim,
                decoder_optim: &decoder_optim,
                src_vocab: &src,
                trg_vocab: &trg,
            })
            .unwrap();
        (src, trg)
    }

    #[test]
    fn test_save_then_restore_vocab_and_models() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let (src, trg) = save_one(&manager, 20);

        assert_eq!(manager.latest_iteration(), Some(20));
        assert_eq!(manager.load_meta(20).unwrap().state.encoder_lr, 1e-3);

        let (src_back, trg_back) = manager
            .load_vocabularies(20, Some((src.len(), trg.len())))
            .unwrap();
        assert_eq!(src_back, src);
        assert_eq!(trg_back, trg);

        let device = Default::default();
        let cfg = config(&src, &trg);
        let loaded = manager.load_models(
            20,
            cfg.init_encoder::<TestBackend>(&device),
            cfg.init_decoder::<TestBackend>(&device),
            &device,
        );
        assert!(loaded.is_ok());
    }

    #[test]
    fn test_vocabulary_size_mismatch_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let (src, trg) = save_one(&manager, 5);

        let err = manager
            .load_vocabularies(5, Some((src.len() + 1, trg.len())))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::VocabularyMismatch { side: "source", .. })
        ));
    }

    #[test]
    fn test_embedding_mismatch_rejected_before_loading() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let (src, trg) = save_one(&manager, 5);

        let device = Default::default();
        let bigger = Seq2SeqConfig::new(src.len() + 3, trg.len())
            .with_embedding_dim(4)
            .with_hidden_size(6)
            .with_n_layers(1);
        let err = manager
            .load_models(
                5,
                bigger.init_encoder::<TestBackend>(&device),
                bigger.init_decoder::<TestBackend>(&device),
                &device,
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::EmbeddingMismatch { side: "source", .. })
        ));
    }

    #[test]
    fn test_missing_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        assert_eq!(manager.latest_iteration(), None);
        let err = manager.require_latest_iteration().unwrap_err();
        assert!(matches!(err.downcast_ref::<CheckpointError>(), Some(CheckpointError::NotFound(_))));
    }

    fn load_into(manager: &CheckpointManager, cfg: Seq2SeqConfig) -> Result<(Encoder<TestBackend>, Decoder<TestBackend>)> {
        let device = Default::default();
        manager.load_models(
            5,
            cfg.init_encoder::<TestBackend>(&device),
            cfg.init_decoder::<TestBackend>(&device),
            &device,
        )
    }

    #[test]
    fn test_embedding_width_mismatch_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let (src, trg) = save_one(&manager, 5);
        assert_eq!(manager.load_meta(5).unwrap().embedding_dim, 4);

        let err = load_into(&manager, config(&src, &trg).with_embedding_dim(5)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::EmbeddingDimMismatch { saved: 4, expected: 5, .. })
        ));
    }

    #[test]
    fn test_layer_count_mismatch_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path());
        let (src, trg) = save_one(&manager, 5);
        assert_eq!(manager.load_meta(5).unwrap().n_layers, 1);

        let err = load_into(&manager, config(&src, &trg).with_n_layers(2)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CheckpointError>(),
            Some(CheckpointError::LayerCountMismatch { saved: 1, expected: 2, .. })
        ));
    }

    #[test]
    fn test_open_does_not_create_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("no-such-run");
        let err = CheckpointManager::open(&missing).err().unwrap();
        assert!(matches!(err.downcast_ref::<CheckpointError>(), Some(CheckpointError::NotFound(_))));
        assert!(!missing.exists());
    }
}
