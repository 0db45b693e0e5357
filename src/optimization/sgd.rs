use std::hash::Hash;

use log::trace;

use super::{
    Optimizer,
    schedule::linear_decay,
    state::{Buffers, RunningAverages, UpdateCounts},
};
use crate::{
    error::{OptimErr, Result},
    ops::{CpuOps, NumericOps},
};

/// Gradients are rescaled so their norm never exceeds this value.
pub const MAX_GRAD_NORM: f32 = 100.;

/// Construction parameters of `Sgd`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SgdConfig {
    pub learning_rate: f32,
    pub momentum: f32,
    pub decay: f32,
    pub track_averages: bool,
}

impl SgdConfig {
    /// Creates a new `SgdConfig` with no momentum, no decay and running averages on.
    ///
    /// # Arguments
    /// * `learning_rate` - The base learning rate.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            momentum: 0.,
            decay: 0.,
            track_averages: true,
        }
    }
}

/// Stochastic gradient descent with optional momentum and linear learning rate decay.
#[derive(Debug)]
pub struct Sgd<K, O = CpuOps> {
    ops: O,
    config: SgdConfig,
    counts: UpdateCounts<K>,
    momentums: Buffers<K>,
    averages: RunningAverages<K>,
}

impl<K: Eq + Hash + Clone> Sgd<K> {
    /// Creates a new `Sgd` optimizer running on the host.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    ///
    /// # Returns
    /// A new `Sgd` instance.
    pub fn new(config: SgdConfig) -> Self {
        Self::with_ops(config, CpuOps)
    }
}

impl<K: Eq + Hash + Clone, O: NumericOps> Sgd<K, O> {
    /// Creates a new `Sgd` optimizer with custom numeric kernels.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    /// * `ops` - The numeric kernels.
    ///
    /// # Returns
    /// A new `Sgd` instance.
    pub fn with_ops(config: SgdConfig, ops: O) -> Self {
        Self {
            ops,
            config,
            counts: UpdateCounts::new(),
            momentums: Buffers::new("momentum"),
            averages: RunningAverages::new(config.track_averages),
        }
    }

    /// Returns the hyperparameters of this instance.
    pub fn config(&self) -> &SgdConfig {
        &self.config
    }

    /// Returns the momentum buffer of `key` if it was allocated.
    pub fn momentum_buffer(&self, key: &K) -> Option<&[f32]> {
        self.momentums.get(key)
    }

    /// Returns how many updates `key` has received.
    pub fn update_count(&self, key: Option<&K>) -> usize {
        self.counts.get(key)
    }
}

impl<K: Eq + Hash + Clone, O: NumericOps> Optimizer<K> for Sgd<K, O> {
    fn update(
        &mut self,
        weights: &mut [f32],
        gradient: &mut [f32],
        key: Option<&K>,
        lr_scale: f32,
    ) -> Result<()> {
        let len = weights.len();
        OptimErr::check_len("gradient", gradient.len(), len)?;

        if let Some(key) = key {
            self.momentums.check_len(key, len)?;
            self.averages.check_len(key, len)?;
        }

        let nr_upd = self.counts.increment(key);
        let lr = self.learning_rate(nr_upd) * lr_scale;
        self.ops.clip_gradient(gradient, MAX_GRAD_NORM);

        match key {
            Some(key) if self.config.momentum != 0. => {
                let mu = self.config.momentum;
                let momentum = self.momentums.get_or_allocate(key, len, &self.ops)?;

                weights
                    .iter_mut()
                    .zip(gradient.iter())
                    .zip(momentum.iter_mut())
                    .for_each(|((w, g), m)| {
                        *m = *m * mu + g * lr;
                        *w -= *m;
                    });
            }
            _ => {
                for (w, g) in weights.iter_mut().zip(gradient.iter()) {
                    *w -= lr * g;
                }
            }
        }

        gradient.fill(0.);

        if let Some(key) = key {
            self.averages.update(key, weights, nr_upd, &self.ops)?;
        }

        trace!(nr_upd = nr_upd, lr = lr, len = len; "sgd update");
        Ok(())
    }

    fn learning_rate(&self, nr_upd: usize) -> f32 {
        linear_decay(self.config.learning_rate, self.config.decay, nr_upd)
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
