/// Linearly decays `rate` with the amount of elapsed updates.
///
/// # Arguments
/// * `rate` - The base learning rate.
/// * `decay` - The decay coefficient, `0` disables the decay.
/// * `nr_upd` - The amount of updates seen so far.
///
/// # Returns
/// `rate / (1 + decay * nr_upd)`.
pub fn linear_decay(rate: f32, decay: f32, nr_upd: usize) -> f32 {
    rate * (1. / (1. + decay * nr_upd as f32))
}

/// Scales `alpha` to compensate for zero-initialized moment estimates.
///
/// # Arguments
/// * `alpha` - The (already decayed) learning rate.
/// * `beta1`, `beta2` - The moment decay rates.
/// * `nr_upd` - The amount of updates seen so far, must be at least `1`.
///
/// # Returns
/// `alpha * sqrt(1 - beta2^t) / (1 - beta1^t)`.
pub fn bias_corrected(alpha: f32, beta1: f32, beta2: f32, nr_upd: usize) -> f32 {
    let t = nr_upd as f32;
    let fix1 = 1. - beta1.powf(t);
    let fix2 = 1. - beta2.powf(t);

    alpha * fix2.sqrt() / fix1
}
