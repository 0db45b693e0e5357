//! Stateful gradient based optimizers.
//!
//! Every optimizer mutates a parameter group's weights in place given its freshly
//! computed gradient, keeping per group state (update counters, momentum, moment
//! estimates and running averages) indexed by an opaque key.
//!
//! - `Sgd`: gradient descent with optional momentum and linear decay.
//! - `Adam`: bias corrected adaptive moments with L2 regularization.
//! - `Eve`: rescales any wrapped optimizer's learning rate from the reported loss.

pub mod error;
pub mod ops;
pub mod optimization;
pub mod specs;

pub use error::{OptimErr, Result};
pub use ops::{CpuOps, NumericOps};
pub use optimization::{Adam, AdamConfig, Eve, Optimizer, Sgd, SgdConfig};
pub use specs::{OptimizerBuilder, OptimizerSpec};
