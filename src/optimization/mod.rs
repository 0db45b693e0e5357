mod adam;
mod eve;
mod optimizer;
pub mod schedule;
pub mod state;
mod sgd;

pub use adam::{Adam, AdamConfig};
pub use eve::Eve;
pub use optimizer::Optimizer;
pub use sgd::{MAX_GRAD_NORM, Sgd, SgdConfig};
