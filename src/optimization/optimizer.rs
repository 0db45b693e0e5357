use crate::error::Result;

/// Defines the strategy for updating a model's parameter groups based on their gradients.
///
/// Every parameter group is identified by a key of type `K`, all the state an optimizer
/// keeps (counters, momentum, moments, averages) is indexed by it. Updates without a key
/// don't persist any per-group buffer.
pub trait Optimizer<K> {
    /// Updates `weights` in place using `gradient` and clears the gradient.
    ///
    /// # Arguments
    /// * `weights` - The weights of the parameter group.
    /// * `gradient` - The gradient of the parameter group, zeroed on success.
    /// * `key` - The parameter group, `None` disables per-group state for this call.
    /// * `lr_scale` - A positive multiplier of this step's learning rate.
    ///
    /// # Returns
    /// An error if the arguments violate the optimizer's contract.
    fn update(
        &mut self,
        weights: &mut [f32],
        gradient: &mut [f32],
        key: Option<&K>,
        lr_scale: f32,
    ) -> Result<()>;

    /// Same as `update` with an unscaled learning rate.
    fn step(&mut self, weights: &mut [f32], gradient: &mut [f32], key: Option<&K>) -> Result<()> {
        self.update(weights, gradient, key, 1.)
    }

    /// Returns the learning rate after `nr_upd` updates of a parameter group.
    fn learning_rate(&self, nr_upd: usize) -> f32;

    /// Reports the latest training loss, ignored unless the optimizer adapts to it.
    fn set_loss(&mut self, _loss: f32) {}

    /// Returns the largest update count across all parameter groups, `0` if none.
    fn iteration_count(&self) -> usize;

    /// Returns the running average of the weights of `key`, if tracked.
    fn averages(&self, key: &K) -> Option<&[f32]>;

    /// Exchanges `weights` with the running average of `key`.
    ///
    /// # Returns
    /// Whether an average existed and was swapped, or a size mismatch error.
    fn swap_averages(&mut self, key: &K, weights: &mut [f32]) -> Result<bool>;
}

impl<K, O: Optimizer<K> + ?Sized> Optimizer<K> for Box<O> {
    fn update(
        &mut self,
        weights: &mut [f32],
        gradient: &mut [f32],
        key: Option<&K>,
        lr_scale: f32,
    ) -> Result<()> {
        (**self).update(weights, gradient, key, lr_scale)
    }

    fn learning_rate(&self, nr_upd: usize) -> f32 {
        (**self).learning_rate(nr_upd)
    }

    fn set_loss(&mut self, loss: f32) {
        (**self).set_loss(loss)
    }

    fn iteration_count(&self) -> usize {
        (**self).iteration_count()
    }

    fn averages(&self, key: &K) -> Option<&[f32]> {
        (**self).averages(key)
    }

    fn swap_averages(&mut self, key: &K, weights: &mut [f32]) -> Result<bool> {
        (**self).swap_averages(key, weights)
    }
}
