pub mod analyzer;
pub mod generator;
pub mod infra;
pub mod pipeline;
pub mod rules;
pub mod sources;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use analyzer::Analyzer;
