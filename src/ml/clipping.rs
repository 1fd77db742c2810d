// ============================================================
// Layer 5 — Global Gradient Norm Clipping
// ============================================================
// Burn's optimiser-level clipping works one parameter tensor
// at a time. Here every gradient of a module shares a single
// scale factor:
//
//   norm = sqrt(Σ_p ‖g_p‖²)
//   if norm > max_norm:  g_p ← g_p × max_norm / norm   (all p)
//
// so the relative sizes of the gradients are preserved.

use std::marker::PhantomData;

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

/// Rescale the gradients of `module` in `grads` so their joint L2
/// norm is at most `max_norm`. Returns the norm before clipping.
pub fn clip_global_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut squares = SquaredNorm::<B> { grads: &*grads, total: None, _backend: PhantomData };
    module.visit(&mut squares);

    let norm = squares
        .total
        .map(|total| total.into_scalar().elem::<f64>().sqrt())
        .unwrap_or(0.0);

    if norm > max_norm {
        let mut rescale = Rescale::<B> {
            grads,
            scale: max_norm / norm,
            _backend: PhantomData,
        };
        module.visit(&mut rescale);
    }
    norm
}

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads:    &'a GradientsParams,
    total:    Option<Tensor<B::InnerBackend, 1>>,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) else {
            return;
        };
        let squared = grad.powf_scalar(2.0).sum();
        self.total = Some(match self.total.take() {
            Some(total) => total + squared,
            None => squared,
        });
    }
}

struct Rescale<'a, B: AutodiffBackend> {
    grads:    &'a mut GradientsParams,
    scale:    f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id, grad.mul_scalar(self.scale));
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
    };

    type TestBackend = Autodiff<NdArray>;

    /// sum(x·W + b) with x = [[3]]: every weight gradient is 3 and
    /// every bias gradient is 1, so the joint norm is √(9+9+1+1) = √20.
    fn known_gradients() -> (Linear<TestBackend>, GradientsParams) {
        let device = Default::default();
        let linear = LinearConfig::new(1, 2).init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 2>::from_floats([[3.0]], &device);
        let grads  = linear.forward(x).sum().backward();
        let params = GradientsParams::from_grads(grads, &linear);
        (linear, params)
    }

    fn weight_grad(linear: &Linear<TestBackend>, grads: &GradientsParams) -> Vec<f32> {
        grads
            .get::<NdArray, 2>(linear.weight.id)
            .unwrap()
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn test_scales_every_gradient_by_one_factor() {
        let (linear, mut grads) = known_gradients();

        let norm = clip_global_norm::<TestBackend, _>(&linear, &mut grads, 1.0);
        assert!((norm - 20f64.sqrt()).abs() < 1e-4);

        let scale = 1.0 / 20f32.sqrt();
        for g in weight_grad(&linear, &grads) {
            assert!((g - 3.0 * scale).abs() < 1e-5);
        }

        // Clipped to exactly the ceiling.
        let after = clip_global_norm::<TestBackend, _>(&linear, &mut grads, 100.0);
        assert!((after - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_small_gradients_are_untouched() {
        let (linear, mut grads) = known_gradients();

        let norm = clip_global_norm::<TestBackend, _>(&linear, &mut grads, 10.0);
        assert!((norm - 20f64.sqrt()).abs() < 1e-4);
        assert_eq!(weight_grad(&linear, &grads), vec![3.0, 3.0]);
    }
}
