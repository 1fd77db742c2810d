// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the parallel corpus     (Layer 4 - data)
//   Step 2: Clean both sides             (Layer 4 - data)
//   Step 3: Reverse direction (optional) (Layer 3 - domain)
//   Step 4: Length filter + limit        (Layer 4 - data)
//   Step 5: Build vocabularies           (Layer 3 - domain)
//   Step 6: Split train/valid/test       (Layer 4 - data)
//   Step 7: Save config, find resume pt  (Layer 6 - infra)
//   Step 8: Run training loop            (Layer 5 - ml)
//   Step 9: Test loss, samples, summary  (Layer 5 + 6)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Result};
use std::{path::PathBuf, sync::Arc, time::Instant};
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::AutodiffModule,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::BatchBuilder,
    dataset::PairDataset,
    loader::CorpusLoader,
    preprocessor::{filter_pairs, Preprocessor},
    splitter::split_data,
};
use crate::domain::{
    sentence_pair::SentencePair,
    sequence::{decode_to_sentence, encode},
    traits::CorpusSource,
    vocabulary::Vocabulary,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{ExperimentLog, ExperimentSummary},
};
use crate::ml::{
    inferencer::GreedyDecoder,
    model::Seq2SeqConfig,
    schedule::PlateauPolicy,
    seq2seq::evaluate,
    trainer::{Trainer, TrainerConfig, TrainingData},
};

/// Sample translations logged after training.
const N_SAMPLE_TRANSLATIONS: usize = 3;

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Saved as train_config.json
// next to the checkpoints so inference can rebuild the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    // ── Files ──
    pub corpus_path:            String,
    /// Column separator of the corpus file.
    pub delimiter:              char,
    pub checkpoint_dir:         String,
    pub model_name:             String,

    // ── Corpus ──
    pub src_lang:               String,
    pub trg_lang:               String,
    pub expand_contractions:    bool,
    /// Train target → source instead.
    pub reverse:                bool,
    pub limit:                  Option<usize>,
    /// Trim both vocabularies to tokens seen at least this often.
    pub min_count:              Option<usize>,
    pub min_length:             usize,
    pub max_length:             usize,
    pub val_ratio:              f64,
    pub test_ratio:             f64,
    pub split_seed:             u64,

    // ── Model ──
    pub embedding_dim:          usize,
    pub hidden_size:            usize,
    pub n_layers:               usize,
    pub dropout:                f64,

    // ── Optimisation ──
    pub batch_size:             usize,
    pub valid_batch_size:       usize,
    pub epochs:                 usize,
    pub n_iteration:            Option<usize>,
    pub learning_rate:          f64,
    pub decoder_learning_ratio: f64,
    pub clip:                   f64,
    pub teacher_forcing_ratio:  f64,
    pub print_every:            usize,
    pub valid_every:            usize,
    pub save_every:             usize,
    pub num_workers:            usize,
    pub seed:                   u64,
    pub plateau:                PlateauPolicy,
    pub resume:                 bool,

    // ── Inference ──
    pub max_decode_len:         usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            corpus_path:            "data/deu.txt".to_string(),
            delimiter:              '\t',
            checkpoint_dir:         "checkpoints".to_string(),
            model_name:             "eng-deu-gru".to_string(),
            src_lang:               "eng".to_string(),
            trg_lang:               "deu".to_string(),
            expand_contractions:    true,
            reverse:                false,
            limit:                  None,
            min_count:              None,
            min_length:             1,
            max_length:             10,
            val_ratio:              0.2,
            test_ratio:             0.1,
            split_seed:             40,
            embedding_dim:          256,
            hidden_size:            256,
            n_layers:               2,
            dropout:                0.1,
            batch_size:             64,
            valid_batch_size:       64,
            epochs:                 8,
            n_iteration:            None,
            learning_rate:          1e-4,
            decoder_learning_ratio: 5.0,
            clip:                   10.0,
            teacher_forcing_ratio:  0.3,
            print_every:            100,
            valid_every:            100,
            save_every:             500,
            num_workers:            2,
            seed:                   42,
            plateau:                PlateauPolicy::default(),
            resume:                 false,
            max_decode_len:         10,
        }
    }
}

impl TrainConfig {
    /// Checkpoints, metrics and logs of this run live here.
    pub fn run_dir(&self) -> PathBuf {
        PathBuf::from(&self.checkpoint_dir).join(&self.model_name)
    }

    /// Language names after the optional reversal.
    pub fn languages(&self) -> (&str, &str) {
        if self.reverse {
            (&self.trg_lang, &self.src_lang)
        } else {
            (&self.src_lang, &self.trg_lang)
        }
    }

    pub fn model_config(&self, src_vocab_size: usize, trg_vocab_size: usize) -> Seq2SeqConfig {
        Seq2SeqConfig::new(src_vocab_size, trg_vocab_size)
            .with_embedding_dim(self.embedding_dim)
            .with_hidden_size(self.hidden_size)
            .with_n_layers(self.n_layers)
            .with_dropout(self.dropout)
    }
}

impl From<&TrainConfig> for TrainerConfig {
    fn from(c: &TrainConfig) -> Self {
        TrainerConfig {
            batch_size:             c.batch_size,
            valid_batch_size:       c.valid_batch_size,
            epochs:                 c.epochs,
            n_iteration:            c.n_iteration,
            learning_rate:          c.learning_rate,
            decoder_learning_ratio: c.decoder_learning_ratio,
            clip:                   c.clip,
            teacher_forcing_ratio:  c.teacher_forcing_ratio,
            print_every:            c.print_every,
            valid_every:            c.valid_every,
            save_every:             c.save_every,
            num_workers:            c.num_workers,
            seed:                   c.seed,
            plateau:                c.plateau.clone(),
        }
    }
}

/// What a finished run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub iterations:      usize,
    pub best_valid_loss: Option<f64>,
    /// `None` when the test split is empty.
    pub test_loss:       Option<f64>,
    pub encoder_lr:      f64,
    pub decoder_lr:      f64,
    pub checkpoint:      Option<PathBuf>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end on `device`.
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainReport> {
        let cfg     = &self.config;
        let started = Instant::now();

        // ── Step 1: Load corpus ───────────────────────────────────────────────
        let raw_pairs = CorpusLoader::new(&cfg.corpus_path)
            .with_delimiter(cfg.delimiter)
            .load_pairs()?;
        if raw_pairs.is_empty() {
            bail!("Corpus '{}' contains no sentence pairs", cfg.corpus_path);
        }

        // ── Step 2: Clean / normalise text ────────────────────────────────────
        let preprocessor = Preprocessor::new(cfg.expand_contractions);
        let pairs: Vec<SentencePair> = raw_pairs
            .iter()
            .map(|p| preprocessor.clean_pair(p))
            .collect();

        // ── Step 3: Reverse direction ─────────────────────────────────────────
        let pairs: Vec<SentencePair> = if cfg.reverse {
            pairs.into_iter().map(SentencePair::reversed).collect()
        } else {
            pairs
        };

        // ── Step 4: Length filter + limit ─────────────────────────────────────
        let total     = pairs.len();
        let mut pairs = filter_pairs(pairs, cfg.min_length, cfg.max_length);
        tracing::info!(
            "Kept {} / {} pairs with {}..={} source tokens",
            pairs.len(), total, cfg.min_length, cfg.max_length,
        );
        if let Some(limit) = cfg.limit {
            pairs.truncate(limit);
        }
        if pairs.is_empty() {
            bail!("No sentence pairs left after filtering");
        }

        // ── Step 5: Build vocabularies ────────────────────────────────────────
        let (src_lang, trg_lang) = cfg.languages();
        let mut src_vocab = Vocabulary::from_sentences(pairs.iter().map(|p| p.source.as_str()), src_lang);
        let mut trg_vocab = Vocabulary::from_sentences(pairs.iter().map(|p| p.target.as_str()), trg_lang);
        if let Some(min_count) = cfg.min_count {
            src_vocab.trim(min_count);
            trg_vocab.trim(min_count);
        }
        if src_vocab.is_empty() || trg_vocab.is_empty() {
            bail!("Vocabulary is empty after trimming to min_count {:?}", cfg.min_count);
        }
        tracing::info!(
            "Vocabularies: {} | {}{}",
            src_vocab, trg_vocab,
            if src_vocab.is_trimmed() { " (trimmed)" } else { "" },
        );

        // ── Step 6: Train / validation / test split ───────────────────────────
        let n_pairs = pairs.len();
        let splits = split_data(pairs, cfg.val_ratio, cfg.test_ratio, cfg.split_seed);
        tracing::info!(
            "Split: {} train, {} validation, {} test",
            splits.train.len(), splits.val.len(), splits.test.len(),
        );
        if splits.val.is_empty() {
            bail!(
                "Validation split is empty ({} pairs, val_ratio {}); use a larger corpus or ratio",
                n_pairs, cfg.val_ratio,
            );
        }
        let train_dataset = PairDataset::new(splits.train);
        let valid_dataset = PairDataset::new(splits.val);
        let test_pairs    = splits.test;
        let (max_src_len, max_trg_len) = train_dataset.max_lengths();
        let (n_train, n_valid, n_test) = (train_dataset.len(), valid_dataset.len(), test_pairs.len());

        // ── Step 7: Save config, find resume point ────────────────────────────
        let ckpt = CheckpointManager::new(cfg.run_dir());
        ckpt.save_config(cfg)?;

        let resume_from = if cfg.resume {
            let latest = ckpt.latest_iteration();
            if latest.is_none() {
                tracing::warn!("No checkpoint in '{}', starting from scratch", ckpt.dir().display());
            }
            latest
        } else {
            None
        };
        if let Some(iteration) = resume_from {
            // Sizes must agree with what this corpus produces.
            (src_vocab, trg_vocab) =
                ckpt.load_vocabularies(iteration, Some((src_vocab.len(), trg_vocab.len())))?;
        }

        // ── Step 8: Run training loop (Layer 5) ───────────────────────────────
        let src_vocab = Arc::new(src_vocab);
        let trg_vocab = Arc::new(trg_vocab);
        let model_cfg = cfg.model_config(src_vocab.len(), trg_vocab.len());
        let trainer   = Trainer::<B>::new(TrainerConfig::from(cfg), device.clone());
        let outcome   = trainer.fit(
            &model_cfg,
            TrainingData {
                src_vocab: src_vocab.clone(),
                trg_vocab: trg_vocab.clone(),
                train:     train_dataset,
                valid:     valid_dataset,
            },
            &ckpt,
            resume_from,
        )?;

        // ── Step 9: Test loss, sample translations, experiment log ────────────
        let encoder = outcome.encoder.valid();
        let decoder = outcome.decoder.valid();

        let test_loader = DataLoaderBuilder::new(BatchBuilder::<B::InnerBackend>::new(
            device.clone(), src_vocab.clone(), trg_vocab.clone(),
        ))
        .batch_size(cfg.valid_batch_size)
        .build(PairDataset::new(test_pairs.clone()));
        let test_loss = evaluate(&encoder, &decoder, test_loader.as_ref());
        match test_loss {
            Some(loss) => tracing::info!("Test loss: {:.4}", loss),
            None => tracing::warn!("Test split is empty, no test loss"),
        }

        let greedy = GreedyDecoder::new(encoder, decoder, device);
        for pair in test_pairs.iter().take(N_SAMPLE_TRANSLATIONS) {
            let output = greedy.decode(&encode(&src_vocab, &pair.source), cfg.max_decode_len);
            tracing::info!(
                "> {}\n  = {}\n  < {}",
                pair.source, pair.target, decode_to_sentence(&trg_vocab, &output),
            );
        }

        let summary = ExperimentSummary {
            model_name:      cfg.model_name.clone(),
            checkpoint_dir:  ckpt.dir().display().to_string(),
            train_samples:   n_train,
            valid_samples:   n_valid,
            test_samples:    n_test,
            max_src_len,
            max_trg_len,
            learning_rate:   cfg.learning_rate,
            best_valid_loss: outcome.best_valid_loss,
            test_loss,
            duration_secs:   started.elapsed().as_secs_f64(),
        };
        if let Err(e) = ExperimentLog::new(ckpt.dir()).record(&summary) {
            tracing::warn!("Failed to write experiment log: {:#}", e);
        }

        Ok(TrainReport {
            iterations:      outcome.iterations,
            best_valid_loss: outcome.best_valid_loss,
            test_loss,
            encoder_lr:      outcome.final_state.encoder_lr,
            decoder_lr:      outcome.final_state.decoder_lr,
            checkpoint:      outcome.last_checkpoint,
        })
    }
}
