use std::hash::Hash;

use log::trace;

use super::{
    Optimizer,
    schedule::{bias_corrected, linear_decay},
    state::{Buffers, RunningAverages, UpdateCounts},
};
use crate::{
    error::{OptimErr, Result},
    ops::{AdamStep, CpuOps, NumericOps},
};

/// The gradient norm is clipped to its length divided by this value.
const CLIP_DIVISOR: f32 = 100.;

/// Construction parameters of `Adam`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub l2: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub decay: f32,
}

impl AdamConfig {
    /// Creates a new `AdamConfig` with the usual defaults.
    ///
    /// # Arguments
    /// * `learning_rate` - The base learning rate.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            l2: 1e-4,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            decay: 0.,
        }
    }
}

/// Adam with L2 regularization, bias correction and linear learning rate decay.
///
/// Running averages of the weights are always tracked.
#[derive(Debug)]
pub struct Adam<K, O = CpuOps> {
    ops: O,
    config: AdamConfig,
    counts: UpdateCounts<K>,
    mom1: Buffers<K>,
    mom2: Buffers<K>,
    averages: RunningAverages<K>,
}

impl<K: Eq + Hash + Clone> Adam<K> {
    /// Creates a new `Adam` optimizer running on the host.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(config: AdamConfig) -> Self {
        Self::with_ops(config, CpuOps)
    }
}

impl<K: Eq + Hash + Clone, O: NumericOps> Adam<K, O> {
    /// Creates a new `Adam` optimizer with custom numeric kernels.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    /// * `ops` - The numeric kernels.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn with_ops(config: AdamConfig, ops: O) -> Self {
        Self {
            ops,
            config,
            counts: UpdateCounts::new(),
            mom1: Buffers::new("first moment"),
            mom2: Buffers::new("second moment"),
            averages: RunningAverages::new(true),
        }
    }

    /// Returns the hyperparameters of this instance.
    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Returns the first and second moment estimates of `key` if they were allocated.
    pub fn moments(&self, key: &K) -> Option<(&[f32], &[f32])> {
        Some((self.mom1.get(key)?, self.mom2.get(key)?))
    }

    /// Returns how many updates `key` has received.
    pub fn update_count(&self, key: &K) -> usize {
        self.counts.get(Some(key))
    }

    /// Validates the arguments of an update before any state is touched.
    ///
    /// # Returns
    /// The key to update or the violated precondition.
    fn check_update<'a>(
        &self,
        weights: &[f32],
        gradient: &[f32],
        key: Option<&'a K>,
    ) -> Result<&'a K> {
        let key = key.ok_or(OptimErr::InvalidArgument(
            "adam requires a parameter group key",
        ))?;

        if gradient.is_empty() {
            return Err(OptimErr::InvalidArgument("adam requires a non empty gradient"));
        }

        let len = weights.len();
        OptimErr::check_len("gradient", gradient.len(), len)?;
        self.mom1.check_len(key, len)?;
        self.mom2.check_len(key, len)?;
        self.averages.check_len(key, len)?;

        Ok(key)
    }
}

impl<K: Eq + Hash + Clone, O: NumericOps> Optimizer<K> for Adam<K, O> {
    fn update(
        &mut self,
        weights: &mut [f32],
        gradient: &mut [f32],
        key: Option<&K>,
        lr_scale: f32,
    ) -> Result<()> {
        let key = self.check_update(weights, gradient, key)?;
        let len = weights.len();

        let nr_upd = self.counts.increment(Some(key));
        let lr = self.learning_rate(nr_upd) * lr_scale;
        let AdamConfig {
            l2, beta1, epsilon, ..
        } = self.config;

        for (g, w) in gradient.iter_mut().zip(weights.iter()) {
            *g += l2 * w;
        }
        self.ops.clip_gradient(gradient, len as f32 / CLIP_DIVISOR);

        let mom1 = self.mom1.get_or_allocate(key, len, &self.ops)?;
        let mom2 = self.mom2.get_or_allocate(key, len, &self.ops)?;

        // beta1 drives the decay of both moments.
        let step = AdamStep {
            beta1,
            beta2: beta1,
            epsilon,
            learning_rate: lr,
        };
        self.ops.adam(weights, gradient, mom1, mom2, step);
        gradient.fill(0.);

        self.averages.update(key, weights, nr_upd, &self.ops)?;

        trace!(nr_upd = nr_upd, lr = lr, len = len; "adam update");
        Ok(())
    }

    /// Returns the decayed rate with the moment bias correction already applied,
    /// which is the rate `update` feeds to the kernel before `lr_scale`.
    fn learning_rate(&self, nr_upd: usize) -> f32 {
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            decay,
            ..
        } = self.config;

        let alpha = linear_decay(learning_rate, decay, nr_upd);
        bias_corrected(alpha, beta1, beta2, nr_upd)
    }

    fn iteration_count(&self) -> usize {
        self.counts.max()
    }

    fn averages(&self, key: &K) -> Option<&[f32]> {
        self.averages.get(key)
    }

    fn swap_averages(&mut self, key: &K, weights: &mut [f32]) -> Result<bool> {
        self.averages.swap(key, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adam(config: AdamConfig) -> Adam<u32> {
        Adam::new(config)
    }

    #[test]
    fn test_bias_corrected_rate_with_equal_betas() {
        let opt = adam(AdamConfig {
            beta1: 0.9,
            beta2: 0.9,
            ..AdamConfig::new(0.001)
        });

        let lr = opt.learning_rate(1);
        assert!((lr - 0.001 * 10f32.sqrt()).abs() < 1e-7);
    }

    #[test]
    fn test_requires_key() {
        let mut opt = adam(AdamConfig::new(0.001));
        let mut weights = [1., 2.];
        let mut grad = [0.1, 0.1];

        let err = opt.step(&mut weights, &mut grad, None).unwrap_err();
        assert!(matches!(err, OptimErr::InvalidArgument(_)));
        assert_eq!(weights, [1., 2.]);
        assert_eq!(grad, [0.1, 0.1]);
        assert_eq!(opt.iteration_count(), 0);
    }

    #[test]
    fn test_requires_non_empty_gradient() {
        let mut opt = adam(AdamConfig::new(0.001));
        let mut weights: [f32; 0] = [];
        let mut grad: [f32; 0] = [];
        let err = opt.step(&mut weights, &mut grad, Some(&0)).unwrap_err();
        assert!(matches!(err, OptimErr::InvalidArgument(_)));
        assert!(opt.moments(&0).is_none());
    }

    #[test]
    fn test_size_mismatch() {
        let mut opt = adam(AdamConfig::new(0.001));
        let err = opt.step(&mut [1., 2.], &mut [1.], Some(&0)).unwrap_err();
        assert!(matches!(err, OptimErr::SizeMismatch { .. }));
        assert_eq!(opt.update_count(&0), 0);
    }

    #[test]
    fn test_first_step() {
        let mut opt = adam(AdamConfig {
            l2: 0.,
            ..AdamConfig::new(0.01)
        });

        let mut weights = [1., 2.];
        let mut grad = [0.001, -0.002];
        opt.step(&mut weights, &mut grad, Some(&7)).unwrap();

        assert_eq!(grad, [0.; 2]);
        assert_eq!(opt.update_count(&7), 1);

        let (mom1, mom2) = opt.moments(&7).unwrap();
        assert!((mom1[0] - 1e-4).abs() < 1e-9);
        assert!((mom1[1] + 2e-4).abs() < 1e-9);
        // Both moments decay with beta1.
        assert!((mom2[0] - 1e-7).abs() < 1e-10);
        assert!((mom2[1] - 4e-7).abs() < 1e-10);

        // lr * m1 / sqrt(m2) = 0.01 * sqrt(0.001) / 0.1 * sqrt(0.1)
        assert!((weights[0] - 0.999).abs() < 1e-5);
        assert!((weights[1] - 2.001).abs() < 1e-5);
    }

    #[test]
    fn test_second_step_uses_second_rate() {
        let config = AdamConfig {
            l2: 0.,
            decay: 0.5,
            ..AdamConfig::new(0.01)
        };
        let mut opt = adam(config);
        let mut weights = [1.];

        opt.step(&mut weights, &mut [0.001], Some(&0)).unwrap();
        let before = weights[0];
        opt.step(&mut weights, &mut [0.001], Some(&0)).unwrap();

        let (mom1, mom2) = opt.moments(&0).unwrap();
        assert!((mom1[0] - 1.9e-4).abs() < 1e-9);
        assert!((mom2[0] - 1.9e-7).abs() < 1e-12);

        let lr = bias_corrected(linear_decay(0.01, 0.5, 2), 0.9, 0.999, 2);
        assert_eq!(opt.learning_rate(2), lr);

        let expected = lr * mom1[0] / (mom2[0].sqrt() + config.epsilon);
        let delta = before - weights[0];
        assert!(
            (delta - expected).abs() < 1e-6,
            "delta {delta}, expected {expected}"
        );
    }

    #[test]
    fn test_l2_is_added_before_clipping() {
        let mut opt = adam(AdamConfig {
            l2: 0.1,
            ..AdamConfig::new(0.01)
        });

        let mut weights = [1.];
        opt.step(&mut weights, &mut [0.], Some(&0)).unwrap();

        // g = 0.1 * 1, clipped to 1 / 100
        let (mom1, _) = opt.moments(&0).unwrap();
        assert!((mom1[0] - 0.001).abs() < 1e-7);
        assert!(weights[0] < 1.);
    }

    #[test]
    fn test_moments_are_per_key() {
        let mut opt = adam(AdamConfig::new(0.01));
        let mut a = [1., 1.];
        let mut b = [1., 1., 1.];

        opt.step(&mut a, &mut [0.01, 0.01], Some(&0)).unwrap();
        opt.step(&mut a, &mut [0.01, 0.01], Some(&0)).unwrap();
        opt.step(&mut b, &mut [0.01, 0.01, 0.01], Some(&1)).unwrap();

        assert_eq!(opt.moments(&0).unwrap().0.len(), 2);
        assert_eq!(opt.moments(&1).unwrap().0.len(), 3);
        assert_eq!(opt.update_count(&0), 2);
        assert_eq!(opt.iteration_count(), 2);

        let err = opt.step(&mut b, &mut [0.01, 0.01, 0.01], Some(&0)).unwrap_err();
        assert!(matches!(err, OptimErr::SizeMismatch { got: 3, expected: 2, .. }));
    }

    #[test]
    fn test_averages_are_always_tracked() {
        let mut opt = adam(AdamConfig::new(0.01));
        let mut weights = [1., -1.];
        opt.step(&mut weights, &mut [0.1, 0.1], Some(&3)).unwrap();

        let avg = opt.averages(&3).unwrap().to_vec();
        let trained = weights;

        assert!(opt.swap_averages(&3, &mut weights).unwrap());
        assert_eq!(weights.to_vec(), avg);
        assert!(opt.swap_averages(&3, &mut weights).unwrap());
        assert_eq!(weights, trained);
    }
}
