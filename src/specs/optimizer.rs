use serde::{Deserialize, Serialize};

use crate::{
    error::{OptimErr, Result},
    optimization::{AdamConfig, SgdConfig},
};

/// The specification for the `Optimizer` trait.
///
/// Omitted hyperparameters fall back to the defaults of `SgdConfig::new` and
/// `AdamConfig::new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Sgd {
        learning_rate: f32,
        #[serde(default)]
        momentum: f32,
        #[serde(default)]
        decay: f32,
        #[serde(default = "default_track_averages")]
        track_averages: bool,
    },
    Adam {
        learning_rate: f32,
        #[serde(default = "default_l2")]
        l2: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
        #[serde(default)]
        decay: f32,
    },
    Eve {
        inner: Box<OptimizerSpec>,
    },
}

fn default_track_averages() -> bool {
    SgdConfig::new(0.).track_averages
}

fn default_l2() -> f32 {
    AdamConfig::new(0.).l2
}

fn default_beta1() -> f32 {
    AdamConfig::new(0.).beta1
}

fn default_beta2() -> f32 {
    AdamConfig::new(0.).beta2
}

fn default_epsilon() -> f32 {
    AdamConfig::new(0.).epsilon
}

impl OptimizerSpec {
    /// Parses a spec from its JSON representation.
    ///
    /// # Arguments
    /// * `json` - The serialized spec.
    ///
    /// # Returns
    /// The spec or an `InvalidConfig` error if the JSON doesn't describe one.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| OptimErr::InvalidConfig(e.to_string()))
    }

    /// Returns the name of the optimization algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerSpec::Sgd { .. } => "sgd",
            OptimizerSpec::Adam { .. } => "adam",
            OptimizerSpec::Eve { .. } => "eve",
        }
    }
}

impl From<SgdConfig> for OptimizerSpec {
    fn from(config: SgdConfig) -> Self {
        let SgdConfig {
            learning_rate,
            momentum,
            decay,
            track_averages,
        } = config;

        Self::Sgd {
            learning_rate,
            momentum,
            decay,
            track_averages,
        }
    }
}

impl From<AdamConfig> for OptimizerSpec {
    fn from(config: AdamConfig) -> Self {
        let AdamConfig {
            learning_rate,
            l2,
            beta1,
            beta2,
            epsilon,
            decay,
        } = config;

        Self::Adam {
            learning_rate,
            l2,
            beta1,
            beta2,
            epsilon,
            decay,
        }
    }
}
