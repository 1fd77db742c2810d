// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads a parallel corpus with one sentence pair per line:
//
//   Go.<TAB>Geh.<TAB>CC-BY 2.0 (France) Attribution: ...
//
// Column 0 is the source sentence, column 1 the target.
// Any further columns (licence / attribution) are ignored.
// Lines with fewer than two non-empty columns are skipped
// with a warning instead of failing the whole corpus.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use crate::domain::sentence_pair::SentencePair;
use crate::domain::traits::CorpusSource;

pub struct CorpusLoader {
    path:      PathBuf,
    delimiter: char,
}

impl CorpusLoader {
    /// Tab-separated loader for the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), delimiter: '\t' }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl CorpusSource for CorpusLoader {
    fn load_pairs(&self) -> Result<Vec<SentencePair>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open corpus '{}'", self.path.display()))?;

        let mut pairs   = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("Cannot read line {} of '{}'", line_no + 1, self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line, self.delimiter) {
                Some(pair) => pairs.push(pair),
                None => {
                    skipped += 1;
                    tracing::warn!("Skipping malformed line {}: {:?}", line_no + 1, line);
                }
            }
        }

        tracing::info!(
            "Read {} sentence pairs from '{}' ({} skipped)",
            pairs.len(),
            self.path.display(),
            skipped
        );
        Ok(pairs)
    }
}

fn parse_line(line: &str, delimiter: char) -> Option<SentencePair> {
    let mut columns = line.split(delimiter).map(str::trim);
    let source = columns.next().filter(|s| !s.is_empty())?;
    let target = columns.next().filter(|s| !s.is_empty())?;
    Some(SentencePair::new(source, target))
}
