// --- TextGenerator impls for the ai-client agents ---

use std::sync::Arc;

use ai_client::{AiError, Claude, OpenAi};
use async_trait::async_trait;

use painpoint_common::{AiProvider, Config, PainPointError, Result};

use crate::traits::TextGenerator;

const SYSTEM_PROMPT: &str = "You are an analyst who reads online discussions and reports \
what people complain about. Follow the requested output format exactly.";

fn map_error(err: AiError) -> PainPointError {
    match err {
        AiError::RateLimited {
            provider,
            retry_after_secs,
        } => PainPointError::RateLimited {
            service: provider.to_ascii_lowercase(),
            retry_after_secs,
        },
        other => PainPointError::Generation(other.to_string()),
    }
}

#[async_trait]
impl TextGenerator for Claude {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat_completion(SYSTEM_PROMPT, prompt)
            .await
            .map_err(map_error)
    }
}

#[async_trait]
impl TextGenerator for OpenAi {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat_completion(SYSTEM_PROMPT, prompt)
            .await
            .map_err(map_error)
    }
}

/// Build the generator selected by `AI_PROVIDER`.
pub fn from_config(config: &Config) -> Arc<dyn TextGenerator> {
    match config.ai_provider {
        AiProvider::Anthropic => Arc::new(Claude::new(&config.ai_api_key, &config.ai_model)),
        AiProvider::OpenAi => Arc::new(OpenAi::new(&config.ai_api_key, &config.ai_model)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_rate_limit_maps_to_rate_limited() {
        let err = map_error(AiError::RateLimited {
            provider: "Claude",
            retry_after_secs: Some(5),
        });
        match err {
            PainPointError::RateLimited {
                service,
                retry_after_secs,
            } => {
                assert_eq!(service, "claude");
                assert_eq!(retry_after_secs, Some(5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_response_is_generation_error() {
        let err = map_error(AiError::EmptyResponse("OpenAI"));
        assert!(matches!(err, PainPointError::Generation(_)));
    }
}
