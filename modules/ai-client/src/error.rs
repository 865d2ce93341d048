use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} rate limit reached")]
    RateLimited {
        provider: &'static str,
        retry_after_secs: Option<u64>,
    },

    #[error("No text in {0} response")]
    EmptyResponse(&'static str),

    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}

impl AiError {
    /// Classify a non-success response. 429 and Anthropic's 529 overload both mean "back off".
    pub(crate) fn from_status(
        provider: &'static str,
        status: StatusCode,
        headers: &HeaderMap,
        body: String,
    ) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529 {
            let retry_after_secs = headers
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return AiError::RateLimited {
                provider,
                retry_after_secs,
            };
        }
        AiError::Api {
            provider,
            status: status.as_u16(),
            message: body,
        }
    }
}
