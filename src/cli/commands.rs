// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `translate`,
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::schedule::PlateauPolicy;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the encoder/decoder on a tab-separated parallel corpus
    Train(TrainArgs),

    /// Translate with the newest checkpoint of a trained model
    Translate(TranslateArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Tab-separated corpus: source<TAB>target[<TAB>attribution]
    #[arg(long, default_value = "data/deu.txt")]
    pub corpus: String,

    /// Column separator of the corpus file
    #[arg(long, default_value_t = '\t')]
    pub delimiter: char,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Run name; checkpoints go to <checkpoint_dir>/<model_name>
    #[arg(long, default_value = "eng-deu-gru")]
    pub model_name: String,

    #[arg(long, default_value = "eng")]
    pub src_lang: String,

    #[arg(long, default_value = "deu")]
    pub trg_lang: String,

    /// Keep contractions as-is ("i'm" → "i m") instead of expanding them
    #[arg(long)]
    pub no_contractions: bool,

    /// Translate target → source
    #[arg(long)]
    pub reverse: bool,

    /// Use only the first N pairs after filtering
    #[arg(long)]
    pub limit: Option<usize>,

    /// Drop vocabulary words seen fewer than N times
    #[arg(long)]
    pub min_count: Option<usize>,

    #[arg(long, default_value_t = 1)]
    pub min_length: usize,

    /// Longest source sentence kept, in tokens
    #[arg(long, default_value_t = 10)]
    pub max_length: usize,

    #[arg(long, default_value_t = 256)]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = 256)]
    pub hidden_size: usize,

    /// Stacked GRU layers in both encoder and decoder
    #[arg(long, default_value_t = 2)]
    pub n_layers: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 64)]
    pub valid_batch_size: usize,

    #[arg(long, default_value_t = 8)]
    pub epochs: usize,

    /// Stop after this many optimiser steps
    #[arg(long)]
    pub n_iteration: Option<usize>,

    /// Encoder learning rate
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Decoder learning rate = lr × this
    #[arg(long, default_value_t = 5.0)]
    pub decoder_learning_ratio: f64,

    /// Gradient norm ceiling
    #[arg(long, default_value_t = 10.0)]
    pub clip: f64,

    /// Probability of feeding the true previous token, in [0, 1]
    #[arg(long, default_value_t = 0.3, value_parser = parse_probability)]
    pub teacher_forcing_ratio: f64,

    #[arg(long, default_value_t = 100)]
    pub print_every: usize,

    /// Validate every N iterations (0 = end of each epoch)
    #[arg(long, default_value_t = 100)]
    pub valid_every: usize,

    #[arg(long, default_value_t = 500)]
    pub save_every: usize,

    #[arg(long, default_value_t = 2)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 0.2)]
    pub val_ratio: f64,

    #[arg(long, default_value_t = 0.1)]
    pub test_ratio: f64,

    /// Multiply learning rates by this on a validation plateau
    #[arg(long, default_value_t = 0.5)]
    pub lr_decay: f64,

    /// Learning rates are never decayed below this
    #[arg(long, default_value_t = 1e-4)]
    pub min_lr: f64,

    /// Consecutive non-improving validations before decaying
    #[arg(long, default_value_t = 10)]
    pub patience: usize,

    /// Continue from the newest checkpoint of this run
    #[arg(long)]
    pub resume: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            corpus_path:            a.corpus,
            delimiter:              a.delimiter,
            checkpoint_dir:         a.checkpoint_dir,
            model_name:             a.model_name,
            src_lang:               a.src_lang,
            trg_lang:               a.trg_lang,
            expand_contractions:    !a.no_contractions,
            reverse:                a.reverse,
            limit:                  a.limit,
            min_count:              a.min_count,
            min_length:             a.min_length,
            max_length:             a.max_length,
            val_ratio:              a.val_ratio,
            test_ratio:             a.test_ratio,
            embedding_dim:          a.embedding_dim,
            hidden_size:            a.hidden_size,
            n_layers:               a.n_layers,
            dropout:                a.dropout,
            batch_size:             a.batch_size,
            valid_batch_size:       a.valid_batch_size,
            epochs:                 a.epochs,
            n_iteration:            a.n_iteration,
            learning_rate:          a.lr,
            decoder_learning_ratio: a.decoder_learning_ratio,
            clip:                   a.clip,
            teacher_forcing_ratio:  a.teacher_forcing_ratio,
            print_every:            a.print_every,
            valid_every:            a.valid_every,
            save_every:             a.save_every,
            num_workers:            a.num_workers,
            seed:                   a.seed,
            plateau: PlateauPolicy {
                decay_factor:        a.lr_decay,
                min_lr:              a.min_lr,
                bad_valid_threshold: a.patience,
                ..PlateauPolicy::default()
            },
            resume:                 a.resume,
            max_decode_len:         a.max_length,
            ..TrainConfig::default()
        }
    }
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("expected a probability in [0, 1], got {s}"))
    }
}

/// All arguments for the `translate` command
#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Sentence to translate; reads stdin line by line when omitted
    #[arg(long)]
    pub sentence: Option<String>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value = "eng-deu-gru")]
    pub model_name: String,

    /// Maximum output tokens (defaults to the value saved with the run)
    #[arg(long)]
    pub max_length: Option<usize>,
}
