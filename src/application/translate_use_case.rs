// ============================================================
// Layer 2 — TranslateUseCase
// ============================================================
// Loads the newest checkpoint of a run and translates either a
// single sentence or a stream of lines (one sentence per line)
// until EOF or a line reading "q" / "quit".

use anyhow::Result;
use std::{
    io::{BufRead, Write},
    path::PathBuf,
};
use burn::prelude::*;

use crate::domain::traits::Translate;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Translator;

pub struct TranslateUseCase<B: Backend> {
    translator: Translator<B>,
}

impl<B: Backend> TranslateUseCase<B> {
    pub fn new(
        checkpoint_dir: &str,
        model_name:     &str,
        max_length:     Option<usize>,
        device:         B::Device,
    ) -> Result<Self> {
        let ckpt = CheckpointManager::open(PathBuf::from(checkpoint_dir).join(model_name))?;
        let translator = Translator::from_checkpoint(&ckpt, device, max_length)?;
        Ok(Self { translator })
    }

    pub fn translate(&self, sentence: &str) -> Result<String> {
        self.translator.translate(sentence)
    }

    /// Translate every line of `input` into `output`. A line that
    /// fails is reported and skipped. Returns the number translated.
    pub fn translate_lines<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<usize> {
        let mut translated = 0usize;

        for line in input.lines() {
            let line = line?;
            let sentence = line.trim();
            if sentence.is_empty() {
                continue;
            }
            if sentence == "q" || sentence == "quit" {
                break;
            }

            match self.translate(sentence) {
                Ok(target) => {
                    writeln!(output, "{}", target)?;
                    translated += 1;
                }
                Err(e) => {
                    tracing::warn!("Could not translate {:?}: {:#}", sentence, e);
                    writeln!(output, "Error: {}", e)?;
                }
            }
            output.flush()?;
        }

        Ok(translated)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::infra::checkpoint::CheckpointError;

    #[test]
    fn test_missing_run_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = TranslateUseCase::<NdArray>::new(
            &tmp.path().display().to_string(), "nothing-here", None, Default::default(),
        );
        let Err(err) = result else { panic!("expected an error") };
        assert!(matches!(err.downcast_ref::<CheckpointError>(), Some(CheckpointError::NotFound(_))));

        // Nothing is left behind for a mistyped run name.
        assert!(!tmp.path().join("nothing-here").exists());
    }
}
