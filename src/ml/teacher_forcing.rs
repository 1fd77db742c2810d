use rand::{rngs::StdRng, Rng, SeedableRng};

/// Per-timestep coin flip deciding whether the decoder is fed the
/// true previous token (teacher forcing) or its own prediction.
///
/// Seeded, so a given seed always produces the same sequence of
/// decisions. Ratios of 0 and 1 never touch the RNG; NaN counts as 0.
pub struct TeacherForcing {
    ratio: f64,
    rng:   StdRng,
}

impl TeacherForcing {
    pub fn new(ratio: f64, seed: u64) -> Self {
        Self {
            ratio: if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) },
            rng:   StdRng::seed_from_u64(seed),
        }
    }

    /// Always feed predictions back (validation and inference).
    pub fn disabled() -> Self {
        Self::new(0.0, 0)
    }

    pub fn use_teacher(&mut self) -> bool {
        if self.ratio <= 0.0 {
            false
        } else if self.ratio >= 1.0 {
            true
        } else {
            self.rng.gen_bool(self.ratio)
        }
    }
}
