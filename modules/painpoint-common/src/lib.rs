pub mod config;
pub mod error;
pub mod types;

pub use config::{AiProvider, Config, PipelineSettings};
pub use error::{PainPointError, Result};
pub use types::*;
