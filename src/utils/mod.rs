pub mod random;
pub mod tracing;
