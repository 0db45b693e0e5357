use std::hash::Hash;

use log::info;

use super::OptimizerSpec;
use crate::{
    error::{OptimErr, Result},
    optimization::{Adam, AdamConfig, Eve, Optimizer, Sgd, SgdConfig},
};

/// Builds `Optimizer`s given a specification.
#[derive(Debug, Default)]
pub struct OptimizerBuilder;

impl OptimizerBuilder {
    /// Creates a new `OptimizerBuilder`.
    ///
    /// # Returns
    /// A new `OptimizerBuilder` instance.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Optimizer` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification of the optimizer.
    ///
    /// # Returns
    /// A new optimizer or an `InvalidConfig` error if the spec holds values
    /// outside of their domain.
    pub fn build<K>(&self, spec: &OptimizerSpec) -> Result<Box<dyn Optimizer<K>>>
    where
        K: Eq + Hash + Clone + 'static,
    {
        info!(optimizer = spec.name(); "building optimizer");

        match *spec {
            OptimizerSpec::Sgd {
                learning_rate,
                momentum,
                decay,
                track_averages,
            } => {
                check_rate("learning_rate", learning_rate)?;
                check_non_negative("momentum", momentum)?;
                check_non_negative("decay", decay)?;

                let config = SgdConfig {
                    learning_rate,
                    momentum,
                    decay,
                    track_averages,
                };
                Ok(Box::new(Sgd::new(config)))
            }
            OptimizerSpec::Adam {
                learning_rate,
                l2,
                beta1,
                beta2,
                epsilon,
                decay,
            } => {
                check_rate("learning_rate", learning_rate)?;
                check_non_negative("l2", l2)?;
                check_beta("beta1", beta1)?;
                check_beta("beta2", beta2)?;
                check_rate("epsilon", epsilon)?;
                check_non_negative("decay", decay)?;

                let config = AdamConfig {
                    learning_rate,
                    l2,
                    beta1,
                    beta2,
                    epsilon,
                    decay,
                };
                Ok(Box::new(Adam::new(config)))
            }
            OptimizerSpec::Eve { ref inner } => {
                let inner = self.build(inner)?;
                Ok(Box::new(Eve::new(inner)))
            }
        }
    }
}

/// Checks that `value` is a finite and strictly positive.
fn check_rate(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0. {
        return Err(OptimErr::InvalidConfig(format!(
            "{name} must be finite and positive, got {value}"
        )));
    }

    Ok(())
}

/// Checks that `value` is finite and not negative.
fn check_non_negative(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0. {
        return Err(OptimErr::InvalidConfig(format!(
            "{name} must be finite and non negative, got {value}"
        )));
    }

    Ok(())
}

/// Checks that a moment decay rate lies in `[0, 1)`.
fn check_beta(name: &str, value: f32) -> Result<()> {
    if !(0. ..1.).contains(&value) {
        return Err(OptimErr::InvalidConfig(format!(
            "{name} must be in [0, 1), got {value}"
        )));
    }

    Ok(())
}
