use rayon::prelude::*;

use super::{AdamStep, NumericOps};

/// Below this length the element-wise kernels stay on the calling thread.
const MIN_PAR_LEN: usize = 1 << 14;

/// Upper bound of the running average decay.
const MAX_AVG_DECAY: f32 = 0.9999;

/// Computes the L2 norm of a flat buffer.
///
/// The reduction is sequential so that the result is reproducible across runs.
pub fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// `NumericOps` over plain `f32` slices on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuOps;

impl CpuOps {
    /// Creates a new `CpuOps`.
    ///
    /// # Returns
    /// A new `CpuOps` instance.
    pub fn new() -> Self {
        Self
    }
}

impl NumericOps for CpuOps {
    fn allocate(&self, len: usize) -> Box<[f32]> {
        vec![0.; len].into_boxed_slice()
    }

    fn clip_gradient(&self, gradient: &mut [f32], threshold: f32) {
        let norm = l2_norm(gradient);

        if norm >= threshold {
            let scale = threshold / norm;

            gradient
                .par_iter_mut()
                .with_min_len(MIN_PAR_LEN)
                .for_each(|g| *g *= scale);
        }
    }

    fn adam(
        &self,
        weights: &mut [f32],
        gradient: &mut [f32],
        mom1: &mut [f32],
        mom2: &mut [f32],
        step: AdamStep,
    ) {
        let AdamStep {
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            learning_rate: lr,
        } = step;

        weights
            .par_iter_mut()
            .zip(gradient.par_iter_mut())
            .zip(mom1.par_iter_mut())
            .zip(mom2.par_iter_mut())
            .with_min_len(MIN_PAR_LEN)
            .for_each(|(((w, g), m1), m2)| {
                *m1 = b1 * *m1 + (1. - b1) * *g;
                *m2 = b2 * *m2 + (1. - b2) * *g * *g;
                *w -= lr * (*m1 / (m2.sqrt() + eps));
                *g = 0.;
            });
    }

    fn update_averages(&self, averages: &mut [f32], weights: &[f32], nr_upd: usize) {
        let t = nr_upd as f32;
        let decay = ((1. + t) / (10. + t)).min(MAX_AVG_DECAY);

        averages
            .par_iter_mut()
            .zip(weights.par_iter())
            .with_min_len(MIN_PAR_LEN)
            .for_each(|(avg, w)| *avg -= (1. - decay) * (*avg - w));
    }
}
