// ============================================================
// Layer 6 — Metrics Logger & Experiment Log
// ============================================================
// Two CSV records of a run.
//
// MetricsLogger — one row per validation pass, in
// <checkpoint_dir>/<model_name>/metrics.csv:
//
//   iteration,train_loss,valid_loss,encoder_lr,decoder_lr,bad_valid_count
//   100,4.812300,4.901200,0.000100,0.000500,0
//   200,4.102900,4.233400,0.000100,0.000500,0
//
// ExperimentLog — one summary per finished run. The latest
// summary overwrites last_experiment.txt; a row is appended to
// experiment_history.csv so runs can be compared later.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const METRICS_HEADER: &str = "iteration,train_loss,valid_loss,encoder_lr,decoder_lr,bad_valid_count";
const HISTORY_HEADER: &str = "timestamp,model_name,checkpoint_dir,train_samples,valid_samples,test_samples,\
max_src_len,max_trg_len,learning_rate,best_valid_loss,test_loss,duration_secs";

/// One row of metrics for a single validation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub iteration:       usize,
    /// Mean masked loss over the training steps since the last pass
    pub train_loss:      f64,
    pub valid_loss:      f64,
    pub encoder_lr:      f64,
    pub decoder_lr:      f64,
    pub bad_valid_count: usize,
}

/// Appends validation metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// resumed run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{}", METRICS_HEADER)?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &ValidationMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{}",
            m.iteration,
            m.train_loss,
            m.valid_loss,
            m.encoder_lr,
            m.decoder_lr,
            m.bad_valid_count,
        )?;

        tracing::debug!(
            "Logged iteration {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.iteration,
            m.train_loss,
            m.valid_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Experiment summary ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub model_name:      String,
    pub checkpoint_dir:  String,
    pub train_samples:   usize,
    pub valid_samples:   usize,
    pub test_samples:    usize,
    pub max_src_len:     usize,
    pub max_trg_len:     usize,
    pub learning_rate:   f64,
    pub best_valid_loss: Option<f64>,
    pub test_loss:       Option<f64>,
    pub duration_secs:   f64,
}

impl ExperimentSummary {
    fn to_report(&self, timestamp: &str) -> String {
        format!(
            "Experiment finished at {}\n\
             model name:       {}\n\
             checkpoint dir:   {}\n\
             samples:          {} train / {} valid / {} test\n\
             max length:       {} source / {} target\n\
             learning rate:    {}\n\
             best valid loss:  {}\n\
             test loss:        {}\n\
             duration:         {:.1}s\n",
            timestamp,
            self.model_name,
            self.checkpoint_dir,
            self.train_samples, self.valid_samples, self.test_samples,
            self.max_src_len, self.max_trg_len,
            self.learning_rate,
            self.best_valid_loss.map_or_else(|| "n/a".to_string(), |l| format!("{:.4}", l)),
            self.test_loss.map_or_else(|| "n/a".to_string(), |l| format!("{:.4}", l)),
            self.duration_secs,
        )
    }

    fn to_csv_row(&self, timestamp: &str) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{:.1}",
            timestamp,
            self.model_name,
            self.checkpoint_dir,
            self.train_samples, self.valid_samples, self.test_samples,
            self.max_src_len, self.max_trg_len,
            self.learning_rate,
            self.best_valid_loss.map_or_else(String::new, |l| format!("{:.6}", l)),
            self.test_loss.map_or_else(String::new, |l| format!("{:.6}", l)),
            self.duration_secs,
        )
    }
}

/// Writes run summaries next to the checkpoints.
pub struct ExperimentLog {
    dir: PathBuf,
}

impl ExperimentLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn last_path(&self) -> PathBuf {
        self.dir.join("last_experiment.txt")
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join("experiment_history.csv")
    }

    pub fn record(&self, summary: &ExperimentSummary) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        fs::write(self.last_path(), summary.to_report(&timestamp))
            .with_context(|| format!("Cannot write '{}'", self.last_path().display()))?;

        let history = self.history_path();
        let is_new  = !history.exists();
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&history)
            .with_context(|| format!("Cannot open '{}'", history.display()))?;
        if is_new {
            writeln!(f, "{}", HISTORY_HEADER)?;
        }
        writeln!(f, "{}", summary.to_csv_row(&timestamp))?;

        tracing::info!("Experiment summary written to '{}'", self.dir.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn summary(test_loss: Option<f64>) -> ExperimentSummary {
        ExperimentSummary {
            model_name:      "tiny".to_string(),
            checkpoint_dir:  "checkpoints/tiny".to_string(),
            train_samples:   70,
            valid_samples:   20,
            test_samples:    10,
            max_src_len:     10,
            max_trg_len:     12,
            learning_rate:   1e-4,
            best_valid_loss: Some(3.5),
            test_loss,
            duration_secs:   12.0,
        }
    }

    #[test]
    fn test_metrics_rows_are_appended() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        for iteration in [100, 200] {
            logger
                .log(&ValidationMetrics {
                    iteration,
                    train_loss: 4.0,
                    valid_loss: 4.5,
                    encoder_lr: 1e-4,
                    decoder_lr: 5e-4,
                    bad_valid_count: 0,
                })
                .unwrap();
        }

        // Reopening must not rewrite the header.
        MetricsLogger::new(tmp.path()).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], METRICS_HEADER);
        assert!(lines[2].starts_with("200,4.000000,4.500000"));
    }

    #[test]
    fn test_last_overwritten_history_appended() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ExperimentLog::new(tmp.path());

        log.record(&summary(Some(3.9))).unwrap();
        log.record(&summary(Some(3.1))).unwrap();

        let last = fs::read_to_string(log.last_path()).unwrap();
        assert!(last.contains("test loss:        3.1000"));
        assert!(!last.contains("3.9000"));

        let history = fs::read_to_string(log.history_path()).unwrap();
        assert_eq!(history.lines().count(), 3);
        assert!(history.lines().nth(1).unwrap().contains(",tiny,"));
    }

    #[test]
    fn test_missing_test_loss_is_reported_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ExperimentLog::new(tmp.path());
        log.record(&summary(None)).unwrap();

        let last = fs::read_to_string(log.last_path()).unwrap();
        assert!(last.contains("test loss:        n/a"));

        let history = fs::read_to_string(log.history_path()).unwrap();
        assert!(history.lines().nth(1).unwrap().contains(",3.500000,,"));
    }
}
