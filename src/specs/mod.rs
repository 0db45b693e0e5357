mod builder;
mod optimizer;

pub use builder::OptimizerBuilder;
pub use optimizer::OptimizerSpec;
