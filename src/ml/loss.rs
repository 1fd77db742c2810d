// ============================================================
// Layer 5 — Masked Loss
// ============================================================
// Negative log-likelihood over a padded target batch.
//
//   loss = Σ_{t,i : mask[t,i]} -log p(target[t,i])
//          ─────────────────────────────────────────
//                   number of mask-true positions
//
// Dividing by the valid-token count (not the batch size, not
// T × batch) keeps short sentences from being down-weighted
// by the padding around them.

use burn::{prelude::*, tensor::activation::log_softmax};

pub struct MaskedLoss<B: Backend> {
    /// Scalar mean over valid positions — shape [1]
    pub loss:        Tensor<B, 1>,
    /// Number of valid (non-pad) target tokens
    pub n_tokens:    usize,
}

impl<B: Backend> MaskedLoss<B> {
    pub fn value(&self) -> f64 {
        self.loss.clone().into_scalar().elem::<f64>()
    }
}

/// logits: [steps, batch, vocab], targets and mask: [steps, batch].
/// `n_tokens` is the number of true entries in `mask`, which the
/// caller already knows from the target lengths.
pub fn masked_nll_loss<B: Backend>(
    logits:   Tensor<B, 3>,
    targets:  Tensor<B, 2, Int>,
    mask:     Tensor<B, 2, Bool>,
    n_tokens: usize,
) -> MaskedLoss<B> {
    let [steps, batch_size, _] = logits.dims();

    let nll = log_softmax(logits, 2)
        .gather(2, targets.reshape([steps, batch_size, 1]))
        .reshape([steps, batch_size])
        .neg();

    let total = nll.mask_fill(mask.bool_not(), 0.0).sum();

    MaskedLoss {
        loss: total.div_scalar(n_tokens.max(1) as f64),
        n_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray;

    fn sample() -> (Tensor<TestBackend, 3>, Tensor<TestBackend, 2, Int>) {
        let device = Default::default();
        let logits = Tensor::from_data(
            TensorData::new(
                vec![
                    2.0f32, 0.5, -1.0,   0.1, 0.2, 0.3,
                    -0.5, 1.5, 0.0,      1.0, -2.0, 0.5,
                ],
                [2, 2, 3],
            ),
            &device,
        );
        let targets = Tensor::from_data(TensorData::new(vec![0i64, 2, 1, 0], [2, 2]), &device);
        (logits, targets)
    }

    #[test]
    fn test_all_true_mask_equals_mean() {
        let device = Default::default();
        let (logits, targets) = sample();
        let mask = Tensor::<TestBackend, 2, Int>::ones([2, 2], &device).equal_elem(1);

        let masked = masked_nll_loss(logits.clone(), targets.clone(), mask, 4);

        let mean = log_softmax(logits, 2)
            .gather(2, targets.reshape([2, 2, 1]))
            .neg()
            .mean()
            .into_scalar()
            .elem::<f64>();

        assert_eq!(masked.n_tokens, 4);
        assert!((masked.value() - mean).abs() < 1e-5);
    }

    #[test]
    fn test_masked_positions_are_ignored() {
        let device = Default::default();
        let (logits, targets) = sample();
        // Only the first column's two steps count.
        let mask = Tensor::<TestBackend, 2, Int>::from_data(TensorData::new(vec![1i64, 0, 1, 0], [2, 2]), &device)
            .equal_elem(1);

        let masked = masked_nll_loss(logits.clone(), targets.clone(), mask, 2);

        let per_token: Vec<f32> = log_softmax(logits, 2)
            .gather(2, targets.reshape([2, 2, 1]))
            .neg()
            .reshape([4])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let expected = (per_token[0] + per_token[2]) as f64 / 2.0;

        assert_eq!(masked.n_tokens, 2);
        assert!((masked.value() - expected).abs() < 1e-5);
    }
}
