use log::{debug, warn};

use super::Optimizer;
use crate::error::Result;

const LOWER_THRESHOLD: f32 = 0.1;
const UPPER_THRESHOLD: f32 = 10.;
const BETA3: f32 = 0.999;

/// Rescales the learning rate of the wrapped optimizer according to how the
/// reported training loss evolves.
///
/// Every capability other than `update` and `set_loss` is forwarded untouched.
#[derive(Debug)]
pub struct Eve<O> {
    inner: O,
    d: f32,
    f: Option<f32>,
}

impl<O> Eve<O> {
    /// Creates a new `Eve` wrapper.
    ///
    /// # Arguments
    /// * `inner` - The optimizer whose learning rate gets rescaled.
    ///
    /// # Returns
    /// A new `Eve` instance with a neutral rescale factor.
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            d: 1.,
            f: None,
        }
    }

    /// Returns the current learning rate multiplier.
    pub fn rescale(&self) -> f32 {
        self.d
    }

    /// Returns the smoothed loss the next report is compared against, if any.
    pub fn loss_baseline(&self) -> Option<f32> {
        self.f
    }

    /// Returns the wrapped optimizer.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Returns the wrapped optimizer mutably.
    pub fn inner_mut(&mut self) -> &mut O {
        &mut self.inner
    }

    /// Consumes the wrapper and returns the wrapped optimizer.
    pub fn into_inner(self) -> O {
        self.inner
    }
}

/// Bounds the relative change between `loss` and `prev`.
///
/// The result is pinned to the lower bound of the active branch, the upper
/// bound never takes part.
fn clamp_factor(loss: f32, prev: f32) -> f32 {
    let lower = if loss < prev {
        LOWER_THRESHOLD + 1.
    } else {
        1. / (UPPER_THRESHOLD + 1.)
    };

    lower.max(loss / prev).min(lower)
}

impl<K, O: Optimizer<K>> Optimizer<K> for Eve<O> {
    fn update(
        &mut self,
        weights: &mut [f32],
        gradient: &mut [f32],
        key: Option<&K>,
        lr_scale: f32,
    ) -> Result<()> {
        self.inner.update(weights, gradient, key, lr_scale * self.d)
    }

    fn learning_rate(&self, nr_upd: usize) -> f32 {
        self.inner.learning_rate(nr_upd)
    }

    fn set_loss(&mut self, loss: f32) {
        match self.f {
            None => self.f = Some(loss),
            Some(prev) => {
                let new_f = clamp_factor(loss, prev) * loss;
                let r = (new_f - prev).abs() / new_f.min(prev);

                self.d += (1. - BETA3) * (r - self.d);
                self.f = Some(new_f);

                if !self.d.is_finite() {
                    warn!(loss = loss, prev = prev; "eve rescale factor is no longer finite");
                }

                debug!(loss = loss, d = self.d; "eve rescale");
            }
        }

        self.inner.set_loss(loss);
    }

    fn iteration_count(&self) -> usize {
        self.inner.iteration_count()
    }

    fn averages(&self, key: &K) -> Option<&[f32]> {
        self.inner.averages(key)
    }

    fn swap_averages(&mut self, key: &K, weights: &mut [f32]) -> Result<bool> {
        self.inner.swap_averages(key, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{Sgd, SgdConfig};

    fn eve() -> Eve<Sgd<&'static str>> {
        Eve::new(Sgd::new(SgdConfig::new(0.1)))
    }

    #[test]
    fn test_clamp_factor_is_pinned() {
        assert_eq!(clamp_factor(1., 2.), 1.1);
        assert_eq!(clamp_factor(0.5, 100.), 1.1);
        assert_eq!(clamp_factor(3., 2.), 1. / 11.);
        assert_eq!(clamp_factor(2., 2.), 1. / 11.);
    }

    #[test]
    fn test_first_loss_sets_baseline() {
        let mut opt = eve();
        opt.set_loss(2.);

        assert_eq!(opt.rescale(), 1.);
        assert_eq!(opt.loss_baseline(), Some(2.));
    }

    #[test]
    fn test_smaller_loss_moves_d_one_smoothing_step() {
        let mut opt = eve();
        opt.set_loss(2.);
        opt.set_loss(1.);

        let new_f = 1.1f32;
        let r = (new_f - 2.).abs() / new_f;
        let expected = 1. + (1. - BETA3) * (r - 1.);

        assert!((opt.rescale() - expected).abs() < 1e-6);
        assert!((opt.rescale() - 1.).abs() <= (1. - BETA3) + 1e-6);
        assert_eq!(opt.loss_baseline(), Some(new_f));
    }

    #[test]
    fn test_larger_loss_uses_reciprocal_bound() {
        let mut opt = eve();
        opt.set_loss(1.);
        opt.set_loss(4.);

        let new_f = 4. / 11.;
        let r = (new_f - 1.0f32).abs() / new_f;
        let expected = 1. + (1. - BETA3) * (r - 1.);

        assert!((opt.rescale() - expected).abs() < 1e-6);
        assert!((opt.loss_baseline().unwrap() - new_f).abs() < 1e-7);
    }

    #[test]
    fn test_update_scales_learning_rate_by_d() {
        let mut opt = eve();
        opt.set_loss(1.);
        opt.set_loss(4.);
        let d = opt.rescale();

        let mut weights = [1.];
        let mut grad = [1.];
        opt.step(&mut weights, &mut grad, Some(&"w")).unwrap();

        assert!((weights[0] - (1. - 0.1 * d)).abs() < 1e-6);
        assert_eq!(grad, [0.]);
    }

    #[test]
    fn test_forwards_to_inner() {
        let mut opt = eve();
        let mut weights = [1.];
        opt.step(&mut weights, &mut [1.], Some(&"w")).unwrap();
        opt.step(&mut weights, &mut [1.], None).unwrap();

        assert_eq!(opt.learning_rate(3), 0.1);
        assert_eq!(opt.iteration_count(), 1);
        assert_eq!(opt.inner().update_count(Some(&"w")), 1);
        assert!(opt.averages(&"w").is_some());
        assert!(opt.swap_averages(&"w", &mut weights).unwrap());
    }
}
