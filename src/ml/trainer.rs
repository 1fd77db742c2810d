// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Iteration-driven train + validation loop using Burn's
// DataLoader and two Adam optimisers (encoder and decoder).
//
//   for each epoch (shuffled, seeded):
//     for each batch:
//       forward_batch      → masked loss
//       backward           → one gradient set, split per model
//       encoder_optim.step(encoder_lr)
//       decoder_optim.step(decoder_lr = lr × decoder_learning_ratio)
//       every valid_every  → validate, observe, maybe decay lr
//       every save_every   → checkpoint
//   stop at n_iteration steps or after the last epoch
//
// Burn notes:
//   - Training runs on B (AutodiffBackend) for gradients
//   - encoder.valid() / decoder.valid() live on B::InnerBackend,
//     so the validation batcher uses the inner backend too
//   - Gradients are clipped per model on their joint norm
//     before each optimiser step
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::{BatchBuilder, Seq2SeqBatch},
    dataset::PairDataset,
};
use crate::domain::vocabulary::Vocabulary;
use crate::infra::{
    checkpoint::{CheckpointManager, CheckpointParts},
    metrics::{MetricsLogger, ValidationMetrics},
};
use crate::ml::{
    clipping::clip_global_norm,
    model::{Decoder, Encoder, Seq2SeqConfig},
    schedule::{PlateauPolicy, TrainingState, ValidationOutcome},
    seq2seq::{evaluate, forward_batch},
    teacher_forcing::TeacherForcing,
};

/// Optimisation settings for one run.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub batch_size:             usize,
    pub valid_batch_size:       usize,
    pub epochs:                 usize,
    /// Hard cap on optimiser steps, counted across resumes.
    pub n_iteration:            Option<usize>,
    pub learning_rate:          f64,
    pub decoder_learning_ratio: f64,
    pub clip:                   f64,
    pub teacher_forcing_ratio:  f64,
    /// 0 disables progress logging.
    pub print_every:            usize,
    /// 0 validates once at the end of every epoch.
    pub valid_every:            usize,
    /// 0 disables periodic checkpoints.
    pub save_every:             usize,
    pub num_workers:            usize,
    pub seed:                   u64,
    pub plateau:                PlateauPolicy,
}

/// Vocabularies and the train / validation splits they were built from.
pub struct TrainingData {
    pub src_vocab: Arc<Vocabulary>,
    pub trg_vocab: Arc<Vocabulary>,
    pub train:     PairDataset,
    pub valid:     PairDataset,
}

pub struct TrainOutcome<B: AutodiffBackend> {
    pub encoder:         Encoder<B>,
    pub decoder:         Decoder<B>,
    /// Total optimiser steps, including those before a resume.
    pub iterations:      usize,
    pub best_valid_loss: Option<f64>,
    pub final_state:     TrainingState,
    pub last_checkpoint: Option<PathBuf>,
}

pub struct Trainer<B: AutodiffBackend> {
    config: TrainerConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainerConfig, device: B::Device) -> Self {
        Self { config, device }
    }

    /// Train from scratch, or from checkpoint `resume_from` when given.
    pub fn fit(
        &self,
        model_cfg:   &Seq2SeqConfig,
        data:        TrainingData,
        ckpt:        &CheckpointManager,
        resume_from: Option<usize>,
    ) -> Result<TrainOutcome<B>> {
        let cfg    = &self.config;
        let device = &self.device;

        // ── Build models ──────────────────────────────────────────────────────
        let mut encoder = model_cfg.init_encoder::<B>(device);
        let mut decoder = model_cfg.init_decoder::<B>(device);
        tracing::info!(
            "Models ready: {} GRU layers, hidden_size={}, vocab {} → {}",
            model_cfg.n_layers, model_cfg.hidden_size,
            model_cfg.src_vocab_size, model_cfg.trg_vocab_size,
        );

        // ── Adam optimisers ───────────────────────────────────────────────────
        // m = β1*m + (1-β1)*g        (mean)
        // v = β2*v + (1-β2)*g²       (variance)
        // θ = θ - lr * m / (√v + ε)  (update)
        let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
        let mut encoder_optim = optim_cfg.init::<B, Encoder<B>>();
        let mut decoder_optim = optim_cfg.init::<B, Decoder<B>>();

        let mut state = TrainingState::new(
            cfg.learning_rate,
            cfg.learning_rate * cfg.decoder_learning_ratio,
        );

        // ── Resume ────────────────────────────────────────────────────────────
        if let Some(iteration) = resume_from {
            (encoder, decoder) = ckpt.load_models(iteration, encoder, decoder, device)?;
            (encoder_optim, decoder_optim) =
                ckpt.load_optimizers::<B, _, _>(iteration, encoder_optim, decoder_optim, device)?;
            state = ckpt.load_meta(iteration)?.state;
            tracing::info!(
                "Resumed at iteration {} (encoder_lr={:e}, decoder_lr={:e})",
                state.iteration, state.encoder_lr, state.decoder_lr,
            );
        }

        let TrainingData { src_vocab, trg_vocab, train, valid } = data;

        // ── Training data loader (AutodiffBackend) ────────────────────────────
        let train_batcher = BatchBuilder::<B>::new(
            device.clone(), src_vocab.clone(), trg_vocab.clone(),
        );
        let mut train_builder = DataLoaderBuilder::new(train_batcher)
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed);
        if cfg.num_workers > 0 {
            train_builder = train_builder.num_workers(cfg.num_workers);
        }
        let train_loader = train_builder.build(train);

        // ── Validation data loader (InnerBackend — no autodiff overhead) ──────
        let valid_batcher = BatchBuilder::<B::InnerBackend>::new(
            device.clone(), src_vocab.clone(), trg_vocab.clone(),
        );
        let mut valid_builder = DataLoaderBuilder::new(valid_batcher)
            .batch_size(cfg.valid_batch_size);
        if cfg.num_workers > 0 {
            valid_builder = valid_builder.num_workers(cfg.num_workers);
        }
        let valid_loader = valid_builder.build(valid);

        let metrics = match MetricsLogger::new(ckpt.dir()) {
            Ok(logger) => {
                tracing::info!("Validation metrics go to '{}'", logger.csv_path().display());
                Some(logger)
            }
            Err(e) => {
                tracing::warn!("Metrics logging disabled: {:#}", e);
                None
            }
        };

        let mut teacher_forcing = TeacherForcing::new(cfg.teacher_forcing_ratio, cfg.seed);
        let start_iteration     = state.iteration;
        let mut last_checkpoint = None;
        let mut saved_at        = resume_from;
        let mut validated_at    = None;

        let mut print_loss_sum = 0.0f64;
        let mut print_steps    = 0usize;
        let mut valid_loss_sum = 0.0f64;
        let mut valid_steps    = 0usize;

        let reached_cap = |iteration: usize| cfg.n_iteration.is_some_and(|n| iteration >= n);

        // ── Epoch loop ────────────────────────────────────────────────────────
        'epochs: for epoch in 1..=cfg.epochs {
            if reached_cap(state.iteration) {
                break;
            }

            let mut epoch_loss_sum = 0.0f64;
            let mut epoch_steps    = 0usize;

            for batch in train_loader.iter() {
                if reached_cap(state.iteration) {
                    break 'epochs;
                }

                // ── Training step ─────────────────────────────────────────────
                let out      = forward_batch(&encoder, &decoder, &batch, &mut teacher_forcing);
                let loss_val = out.value();

                let mut grads     = out.loss.backward();
                let mut encoder_grads = GradientsParams::from_module(&mut grads, &encoder);
                let mut decoder_grads = GradientsParams::from_module(&mut grads, &decoder);
                clip_global_norm::<B, _>(&encoder, &mut encoder_grads, cfg.clip);
                clip_global_norm::<B, _>(&decoder, &mut decoder_grads, cfg.clip);
                encoder = encoder_optim.step(state.encoder_lr, encoder, encoder_grads);
                decoder = decoder_optim.step(state.decoder_lr, decoder, decoder_grads);
                state.iteration += 1;

                epoch_loss_sum += loss_val;
                epoch_steps    += 1;
                print_loss_sum += loss_val;
                print_steps    += 1;
                valid_loss_sum += loss_val;
                valid_steps    += 1;

                if cfg.print_every > 0 && state.iteration % cfg.print_every == 0 {
                    let progress = cfg.n_iteration
                        .map(|n| format!("; {:.1}% complete", 100.0 * state.iteration as f64 / n.max(1) as f64))
                        .unwrap_or_default();
                    tracing::info!(
                        "Iteration {}{}; average loss {:.4}",
                        state.iteration, progress, print_loss_sum / print_steps as f64,
                    );
                    print_loss_sum = 0.0;
                    print_steps    = 0;
                }

                // ── Periodic validation ───────────────────────────────────────
                if cfg.valid_every > 0 && state.iteration % cfg.valid_every == 0 {
                    let improved = self.validate(
                        &encoder, &decoder, valid_loader.as_ref(), &mut state,
                        mean(valid_loss_sum, valid_steps), metrics.as_ref(),
                    );
                    validated_at   = Some(state.iteration);
                    valid_loss_sum = 0.0;
                    valid_steps    = 0;

                    if improved {
                        last_checkpoint = Some(self.save(
                            ckpt, &state, &encoder, &decoder,
                            &encoder_optim, &decoder_optim, &src_vocab, &trg_vocab,
                        )?);
                        saved_at = Some(state.iteration);
                    }
                }

                // ── Periodic checkpoint ───────────────────────────────────────
                if cfg.save_every > 0
                    && state.iteration % cfg.save_every == 0
                    && saved_at != Some(state.iteration)
                {
                    last_checkpoint = Some(self.save(
                        ckpt, &state, &encoder, &decoder,
                        &encoder_optim, &decoder_optim, &src_vocab, &trg_vocab,
                    )?);
                    saved_at = Some(state.iteration);
                }
            }

            // ── End-of-epoch validation ───────────────────────────────────────
            if cfg.valid_every == 0 && valid_steps > 0 {
                let improved = self.validate(
                    &encoder, &decoder, valid_loader.as_ref(), &mut state,
                    mean(valid_loss_sum, valid_steps), metrics.as_ref(),
                );
                validated_at   = Some(state.iteration);
                valid_loss_sum = 0.0;
                valid_steps    = 0;

                if improved {
                    last_checkpoint = Some(self.save(
                        ckpt, &state, &encoder, &decoder,
                        &encoder_optim, &decoder_optim, &src_vocab, &trg_vocab,
                    )?);
                    saved_at = Some(state.iteration);
                }
            }

            println!(
                "Epoch {:>3}/{} | iterations={} | train_loss={:.4} | best_valid_loss={}",
                epoch, cfg.epochs, state.iteration, mean(epoch_loss_sum, epoch_steps),
                format_loss(state.best_valid_loss),
            );
        }

        // ── Final validation + checkpoint ─────────────────────────────────────
        if state.iteration > start_iteration && validated_at != Some(state.iteration) {
            self.validate(
                &encoder, &decoder, valid_loader.as_ref(), &mut state,
                mean(valid_loss_sum, valid_steps), metrics.as_ref(),
            );
        }
        if state.iteration > start_iteration && saved_at != Some(state.iteration) {
            last_checkpoint = Some(self.save(
                ckpt, &state, &encoder, &decoder,
                &encoder_optim, &decoder_optim, &src_vocab, &trg_vocab,
            )?);
        }

        tracing::info!(
            "Training complete after {} iterations (best valid loss {})",
            state.iteration, format_loss(state.best_valid_loss),
        );

        Ok(TrainOutcome {
            encoder,
            decoder,
            iterations:      state.iteration,
            best_valid_loss: state.best_valid_loss,
            final_state:     state,
            last_checkpoint,
        })
    }

    /// One validation pass. Returns true when the loss improved.
    /// A validation set without target tokens leaves the schedule
    /// untouched.
    fn validate(
        &self,
        encoder:    &Encoder<B>,
        decoder:    &Decoder<B>,
        loader:     &dyn DataLoader<Seq2SeqBatch<B::InnerBackend>>,
        state:      &mut TrainingState,
        train_loss: f64,
        metrics:    Option<&MetricsLogger>,
    ) -> bool {
        // .valid() → inner backend, dropout disabled
        let Some(valid_loss) = evaluate(&encoder.valid(), &decoder.valid(), loader) else {
            tracing::warn!(
                "Iteration {}: validation set is empty, learning rates left unchanged",
                state.iteration,
            );
            return false;
        };
        let outcome = state.observe(valid_loss, &self.config.plateau);

        match outcome {
            ValidationOutcome::Improved { best } => {
                tracing::info!("Iteration {}: valid loss improved to {:.4}", state.iteration, best);
            }
            ValidationOutcome::NoImprovement { bad_count } => {
                tracing::info!(
                    "Iteration {}: valid loss {:.4} (no improvement, {} / {})",
                    state.iteration, valid_loss, bad_count, self.config.plateau.bad_valid_threshold,
                );
            }
            ValidationOutcome::Decayed { encoder_lr, decoder_lr } => {
                tracing::info!(
                    "Iteration {}: plateau, learning rates decayed to {:e} / {:e}",
                    state.iteration, encoder_lr, decoder_lr,
                );
            }
            ValidationOutcome::FloorReached => {
                tracing::info!(
                    "Iteration {}: plateau, learning rates already at the {:e} floor",
                    state.iteration, self.config.plateau.min_lr,
                );
            }
        }

        if let Some(logger) = metrics {
            let row = ValidationMetrics {
                iteration:       state.iteration,
                train_loss,
                valid_loss,
                encoder_lr:      state.encoder_lr,
                decoder_lr:      state.decoder_lr,
                bad_valid_count: state.bad_valid_count,
            };
            if let Err(e) = logger.log(&row) {
                tracing::warn!("Failed to write metrics row: {:#}", e);
            }
        }

        matches!(outcome, ValidationOutcome::Improved { .. })
    }

    #[allow(clippy::too_many_arguments)]
    fn save<OE, OD>(
        &self,
        ckpt:          &CheckpointManager,
        state:         &TrainingState,
        encoder:       &Encoder<B>,
        decoder:       &Decoder<B>,
        encoder_optim: &OE,
        decoder_optim: &OD,
        src_vocab:     &Vocabulary,
        trg_vocab:     &Vocabulary,
    ) -> Result<PathBuf>
    where
        OE: Optimizer<Encoder<B>, B>,
        OD: Optimizer<Decoder<B>, B>,
    {
        let path = ckpt.save(CheckpointParts {
            state,
            encoder,
            decoder,
            encoder_optim,
            decoder_optim,
            src_vocab,
            trg_vocab,
        })?;
        tracing::info!("Checkpoint saved for iteration {}", state.iteration);
        Ok(path)
    }
}

fn mean(sum: f64, n: usize) -> f64 {
    if n > 0 { sum / n as f64 } else { f64::NAN }
}

fn format_loss(loss: Option<f64>) -> String {
    loss.map_or_else(|| "n/a".to_string(), |l| format!("{:.4}", l))
}
