/// Hyperparameters of a single fused Adam step.
///
/// `learning_rate` is expected to be already bias-corrected by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamStep {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub learning_rate: f32,
}

/// The numeric kernels an optimizer relies on.
///
/// Implementors own the actual arithmetic over the flat buffers, the optimizers
/// only decide *what* to run and with which hyperparameters. Length agreement
/// between the slices is checked by the callers before any kernel runs.
pub trait NumericOps {
    /// Allocates a new zero-initialized buffer.
    ///
    /// # Arguments
    /// * `len` - The amount of elements of the buffer.
    fn allocate(&self, len: usize) -> Box<[f32]>;

    /// Rescales `gradient` in place so that its L2 norm doesn't exceed `threshold`.
    ///
    /// # Arguments
    /// * `gradient` - The gradient to clip.
    /// * `threshold` - The maximum norm allowed.
    fn clip_gradient(&self, gradient: &mut [f32], threshold: f32);

    /// Applies a fused Adam update to `weights` and zeroes `gradient`.
    ///
    /// # Arguments
    /// * `weights` - The weights to update.
    /// * `gradient` - The gradient of this step, cleared on return.
    /// * `mom1` - The first moment estimate.
    /// * `mom2` - The second moment estimate.
    /// * `step` - The decay rates, epsilon and learning rate of this step.
    fn adam(
        &self,
        weights: &mut [f32],
        gradient: &mut [f32],
        mom1: &mut [f32],
        mom2: &mut [f32],
        step: AdamStep,
    );

    /// Moves `averages` towards `weights` with a count-weighted decay.
    ///
    /// # Arguments
    /// * `averages` - The running average to update.
    /// * `weights` - The current weights.
    /// * `nr_upd` - How many updates the weights have seen so far.
    fn update_averages(&self, averages: &mut [f32], weights: &[f32], nr_upd: usize);
}
