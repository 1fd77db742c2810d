// ============================================================
// Layer 5 — Training State & Plateau Policy
// ============================================================
// Mutable per-run state of the training controller, and the
// rule that decays learning rates when validation loss stops
// improving.
//
// After every validation pass:
//
//   loss < best - min_delta ?
//     yes → best = loss, bad_count = 0               (Improved)
//     no  → bad_count += 1
//           bad_count == threshold ?
//             yes → both lrs *= decay_factor,
//                   unless that would go below min_lr
//                   (checked per optimizer), bad_count = 0
//             no  → keep going                       (NoImprovement)
//
// The state is serialised into every checkpoint, so a resumed
// run continues with the same learning rates and counters.

use serde::{Deserialize, Serialize};

/// Decay policy constants. Defaults reproduce the fixed values
/// the project was tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateauPolicy {
    pub decay_factor:        f64,
    pub min_lr:              f64,
    pub bad_valid_threshold: usize,
    pub min_delta:           f64,
}

impl Default for PlateauPolicy {
    fn default() -> Self {
        Self {
            decay_factor:        0.5,
            min_lr:              1e-4,
            bad_valid_threshold: 10,
            min_delta:           0.0,
        }
    }
}

impl PlateauPolicy {
    /// Decayed rate, or `None` if it would fall below the floor.
    pub fn decay(&self, lr: f64) -> Option<f64> {
        let next = lr * self.decay_factor;
        (next >= self.min_lr).then_some(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationOutcome {
    Improved { best: f64 },
    NoImprovement { bad_count: usize },
    Decayed { encoder_lr: f64, decoder_lr: f64 },
    /// Threshold reached but both rates already sit at the floor.
    FloorReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub encoder_lr:      f64,
    pub decoder_lr:      f64,
    pub bad_valid_count: usize,
    /// `None` until the first validation pass.
    pub best_valid_loss: Option<f64>,
    pub iteration:       usize,
}

impl TrainingState {
    pub fn new(encoder_lr: f64, decoder_lr: f64) -> Self {
        Self {
            encoder_lr,
            decoder_lr,
            bad_valid_count: 0,
            best_valid_loss: None,
            iteration: 0,
        }
    }

    pub fn observe(&mut self, valid_loss: f64, policy: &PlateauPolicy) -> ValidationOutcome {
        let improved = match self.best_valid_loss {
            None       => !valid_loss.is_nan(),
            Some(best) => valid_loss < best - policy.min_delta,
        };

        if improved {
            self.best_valid_loss = Some(valid_loss);
            self.bad_valid_count = 0;
            return ValidationOutcome::Improved { best: valid_loss };
        }

        self.bad_valid_count += 1;
        if self.bad_valid_count < policy.bad_valid_threshold {
            return ValidationOutcome::NoImprovement { bad_count: self.bad_valid_count };
        }
        self.bad_valid_count = 0;

        let encoder_lr = policy.decay(self.encoder_lr);
        let decoder_lr = policy.decay(self.decoder_lr);
        if encoder_lr.is_none() && decoder_lr.is_none() {
            return ValidationOutcome::FloorReached;
        }
        self.encoder_lr = encoder_lr.unwrap_or(self.encoder_lr);
        self.decoder_lr = decoder_lr.unwrap_or(self.decoder_lr);

        ValidationOutcome::Decayed {
            encoder_lr: self.encoder_lr,
            decoder_lr: self.decoder_lr,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PlateauPolicy {
        PlateauPolicy { min_lr: 1e-5, ..Default::default() }
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut s = TrainingState::new(1e-3, 5e-3);
        assert!(matches!(s.observe(2.0, &policy()), ValidationOutcome::Improved { .. }));
        s.observe(2.5, &policy());
        s.observe(2.5, &policy());
        assert_eq!(s.bad_valid_count, 2);
        assert!(matches!(s.observe(1.9, &policy()), ValidationOutcome::Improved { .. }));
        assert_eq!(s.bad_valid_count, 0);
        assert_eq!(s.best_valid_loss, Some(1.9));
    }

    #[test]
    fn test_ten_bad_checks_halve_once() {
        let mut s = TrainingState::new(1e-3, 5e-3);
        s.observe(1.0, &policy());
        for i in 1..10 {
            assert_eq!(
                s.observe(1.5, &policy()),
                ValidationOutcome::NoImprovement { bad_count: i }
            );
        }
        assert_eq!(s.encoder_lr, 1e-3);

        let outcome = s.observe(1.5, &policy());
        assert_eq!(outcome, ValidationOutcome::Decayed { encoder_lr: 5e-4, decoder_lr: 2.5e-3 });
        assert_eq!(s.bad_valid_count, 0);
        assert_eq!(s.encoder_lr, 5e-4);

        // The very next bad check starts counting again from 1.
        assert_eq!(s.observe(1.5, &policy()), ValidationOutcome::NoImprovement { bad_count: 1 });
        assert_eq!(s.encoder_lr, 5e-4);
    }

    #[test]
    fn test_floor_is_per_optimizer() {
        let p = PlateauPolicy { bad_valid_threshold: 1, min_lr: 1e-4, ..Default::default() };
        let mut s = TrainingState::new(1e-4, 5e-4);
        s.observe(1.0, &p);

        assert_eq!(s.observe(1.0, &p), ValidationOutcome::Decayed { encoder_lr: 1e-4, decoder_lr: 2.5e-4 });
        s.observe(1.0, &p);
        assert_eq!(s.decoder_lr, 1.25e-4);
        assert_eq!(s.observe(1.0, &p), ValidationOutcome::FloorReached);
        assert_eq!(s.decoder_lr, 1.25e-4);
        assert_eq!(s.encoder_lr, 1e-4);
    }

    #[test]
    fn test_min_delta_requires_real_improvement() {
        let p = PlateauPolicy { min_delta: 0.1, ..policy() };
        let mut s = TrainingState::new(1e-3, 1e-3);
        s.observe(1.0, &p);
        assert!(matches!(s.observe(0.95, &p), ValidationOutcome::NoImprovement { .. }));
        assert!(matches!(s.observe(0.85, &p), ValidationOutcome::Improved { .. }));
    }

    #[test]
    fn test_nan_never_improves() {
        let mut s = TrainingState::new(1e-3, 1e-3);
        assert!(matches!(s.observe(f64::NAN, &policy()), ValidationOutcome::NoImprovement { .. }));
        assert_eq!(s.best_valid_loss, None);
    }

    #[test]
    fn test_state_serialises() {
        let mut s = TrainingState::new(1e-3, 5e-3);
        s.observe(1.25, &policy());
        s.iteration = 40;
        let json = serde_json::to_string(&s).unwrap();
        let back: TrainingState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
