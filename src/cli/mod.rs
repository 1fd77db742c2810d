// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses command line arguments with `clap` and hands off to
// Layer 2 (application). The GPU backend is picked here, once.
//
//   1. `train`     — trains the model on a parallel corpus
//   2. `translate` — loads a checkpoint and translates
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};
use clap::Parser;
use commands::{Commands, TrainArgs, TranslateArgs};
use std::io;

type TrainBackend = Autodiff<Wgpu>;
type InferBackend = Wgpu;

#[derive(Parser, Debug)]
#[command(
    name = "seq2seq-nmt",
    version = "0.1.0",
    about = "Train a GRU encoder/decoder translation model, then translate with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => Self::run_train(args),
            Commands::Translate(args) => Self::run_translate(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on corpus: {}", args.corpus);

        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);

        let report = TrainUseCase::new(args.into()).execute::<TrainBackend>(device)?;

        let loss = |l: Option<f64>| l.map_or_else(|| "n/a".to_string(), |l| format!("{:.4}", l));
        println!(
            "Training complete after {} iterations. Best valid loss {}, test loss {}.",
            report.iterations, loss(report.best_valid_loss), loss(report.test_loss),
        );
        println!(
            "Final learning rates: encoder {:e}, decoder {:e}",
            report.encoder_lr, report.decoder_lr,
        );
        if let Some(path) = report.checkpoint {
            println!("Last checkpoint: {}", path.display());
        }
        Ok(())
    }

    fn run_translate(args: TranslateArgs) -> Result<()> {
        use crate::application::translate_use_case::TranslateUseCase;

        let use_case = TranslateUseCase::<InferBackend>::new(
            &args.checkpoint_dir,
            &args.model_name,
            args.max_length,
            WgpuDevice::default(),
        )?;

        match args.sentence {
            Some(sentence) => println!("{}", use_case.translate(&sentence)?),
            None => {
                let n = use_case.translate_lines(io::stdin().lock(), io::stdout().lock())?;
                tracing::info!("Translated {} sentences", n);
            }
        }
        Ok(())
    }
}
