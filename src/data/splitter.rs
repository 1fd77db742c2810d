// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Shuffles samples with a seeded RNG and cuts them into three
// sets:
//
//   1. `val_ratio` of everything becomes the validation set
//   2. `test_ratio` of what remains becomes the test set
//   3. the rest is training data
//
// With the defaults (0.2, 0.1) that is 72% / 20% / 8%.
// The seed makes the split reproducible across runs, so a
// resumed training run sees the same validation data.
//
// Reference: rand crate documentation (SliceRandom, StdRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// The three splits, in (train, validation, test) order.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSplits<T> {
    pub train: Vec<T>,
    pub val:   Vec<T>,
    pub test:  Vec<T>,
}

pub fn split_data<T>(mut samples: Vec<T>, val_ratio: f64, test_ratio: f64, seed: u64) -> DataSplits<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let val_size = ((total as f64) * val_ratio.clamp(0.0, 1.0)) as usize;
    let val      = samples.split_off(total - val_size);

    let remaining = samples.len();
    let test_size = ((remaining as f64) * test_ratio.clamp(0.0, 1.0)) as usize;
    let test      = samples.split_off(remaining - test_size);

    tracing::debug!(
        "Dataset split: {} training, {} validation, {} test",
        samples.len(),
        val.len(),
        test.len(),
    );

    DataSplits { train: samples, val, test }
}
