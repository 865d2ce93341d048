use thiserror::Error;

pub type Result<T> = std::result::Result<T, PainPointError>;

#[derive(Error, Debug)]
pub enum PainPointError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("{service} rate limit reached, retry later{}", retry_hint(.retry_after_secs))]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PainPointError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PainPointError::RateLimited { .. })
    }
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (in about {secs}s)"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_message_includes_hint() {
        let err = PainPointError::RateLimited {
            service: "reddit".to_string(),
            retry_after_secs: Some(42),
        };
        assert!(err.is_rate_limited());
        assert_eq!(
            err.to_string(),
            "reddit rate limit reached, retry later (in about 42s)"
        );
    }

    #[test]
    fn rate_limit_message_without_hint() {
        let err = PainPointError::RateLimited {
            service: "anthropic".to_string(),
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "anthropic rate limit reached, retry later");
    }

    #[test]
    fn other_errors_are_not_rate_limits() {
        assert!(!PainPointError::Retrieval("boom".into()).is_rate_limited());
        assert!(!PainPointError::Timeout(30).is_rate_limited());
    }
}
