pub mod claude;
pub mod error;
pub mod openai;
pub mod util;

pub use claude::Claude;
pub use error::{AiError, Result};
pub use openai::OpenAi;
