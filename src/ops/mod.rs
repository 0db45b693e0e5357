mod cpu;
mod numeric;

pub use cpu::{CpuOps, l2_norm};
pub use numeric::{AdamStep, NumericOps};
