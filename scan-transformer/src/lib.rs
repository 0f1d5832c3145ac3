pub mod builder;
pub mod runner;
pub mod transform;

pub use builder::{TransformBuilder, TransformConfig};
pub use runner::Transformer;
