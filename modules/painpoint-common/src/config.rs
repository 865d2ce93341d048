use std::env;
use std::time::Duration;

use tracing::info;

use crate::error::{PainPointError, Result};

const DEFAULT_USER_AGENT: &str = "painpoint-scout/0.1 (pain point discovery)";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    Anthropic,
    OpenAi,
}

impl AiProvider {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(AiProvider::Anthropic),
            "openai" => Ok(AiProvider::OpenAi),
            other => Err(PainPointError::Config(format!(
                "AI_PROVIDER must be \"anthropic\" or \"openai\", got \"{other}\""
            ))),
        }
    }
}

/// Tunables for one analysis run. Pure data; no credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Cap on documents kept after retrieval merge.
    pub max_documents: usize,
    /// Engagement gate threshold.
    pub min_engagement: i64,
    /// Per external call.
    pub call_timeout: Duration,
    /// Communities queried by the community strategy.
    pub max_communities: usize,
    /// Top documents whose replies get fetched after merge.
    pub reply_posts: usize,
    pub replies_per_post: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_documents: 300,
            min_engagement: 2,
            call_timeout: Duration::from_secs(30),
            max_communities: 5,
            reply_posts: 10,
            replies_per_post: 20,
        }
    }
}

impl PipelineSettings {
    /// Defaults overridden by any `PAINPOINT_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_documents: parsed_env("PAINPOINT_MAX_DOCUMENTS", defaults.max_documents)?,
            min_engagement: parsed_env("PAINPOINT_MIN_ENGAGEMENT", defaults.min_engagement)?,
            call_timeout: Duration::from_secs(parsed_env(
                "PAINPOINT_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )?),
            max_communities: parsed_env("PAINPOINT_MAX_COMMUNITIES", defaults.max_communities)?,
            reply_posts: parsed_env("PAINPOINT_REPLY_POSTS", defaults.reply_posts)?,
            replies_per_post: parsed_env("PAINPOINT_REPLIES_PER_POST", defaults.replies_per_post)?,
        })
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Reddit
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_user_agent: String,

    // AI provider
    pub ai_provider: AiProvider,
    pub ai_api_key: String,
    pub ai_model: String,

    pub pipeline: PipelineSettings,
}

impl Config {
    /// Load configuration from environment variables.
    /// Missing credentials are reported before any work starts.
    pub fn from_env() -> Result<Self> {
        let ai_provider = match env::var("AI_PROVIDER") {
            Ok(value) => AiProvider::parse(&value)?,
            Err(_) => AiProvider::Anthropic,
        };
        let (ai_api_key, default_model) = match ai_provider {
            AiProvider::Anthropic => (required_env("ANTHROPIC_API_KEY")?, DEFAULT_ANTHROPIC_MODEL),
            AiProvider::OpenAi => (required_env("OPENAI_API_KEY")?, DEFAULT_OPENAI_MODEL),
        };

        Ok(Self {
            reddit_client_id: required_env("REDDIT_CLIENT_ID")?,
            reddit_client_secret: required_env("REDDIT_CLIENT_SECRET")?,
            reddit_user_agent: env::var("REDDIT_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            ai_provider,
            ai_api_key,
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| default_model.to_string()),
            pipeline: PipelineSettings::from_env()?,
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            reddit_client_id = %redact(&self.reddit_client_id),
            reddit_client_secret = %redact(&self.reddit_client_secret),
            reddit_user_agent = %self.reddit_user_agent,
            ai_provider = ?self.ai_provider,
            ai_api_key = %redact(&self.ai_api_key),
            ai_model = %self.ai_model,
            max_documents = self.pipeline.max_documents,
            min_engagement = self.pipeline.min_engagement,
            call_timeout_secs = self.pipeline.call_timeout.as_secs(),
            "Loaded configuration"
        );
    }
}

fn required_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PainPointError::Config(format!(
            "{key} environment variable is required"
        ))),
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PainPointError::Config(format!("{key} must be a number, got \"{raw}\""))),
        Err(_) => Ok(default),
    }
}

/// Keep the first four chars of a secret.
fn redact(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        return "****".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}****")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.min_engagement, 2);
        assert_eq!(settings.call_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_communities, 5);
    }

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!(AiProvider::parse("Anthropic").unwrap(), AiProvider::Anthropic);
        assert_eq!(AiProvider::parse("claude").unwrap(), AiProvider::Anthropic);
        assert_eq!(AiProvider::parse(" OPENAI ").unwrap(), AiProvider::OpenAi);
        assert!(matches!(
            AiProvider::parse("llama"),
            Err(PainPointError::Config(_))
        ));
    }

    #[test]
    fn redact_masks_secrets() {
        assert_eq!(redact("sk-ant-123456"), "sk-a****");
        assert_eq!(redact("abc"), "****");
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        let value: usize = parsed_env("PAINPOINT_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn missing_required_variable_is_config_error() {
        let err = required_env("PAINPOINT_TEST_SURELY_UNSET_KEY").unwrap_err();
        assert!(matches!(err, PainPointError::Config(_)));
        assert!(err.to_string().contains("PAINPOINT_TEST_SURELY_UNSET_KEY"));
    }
}
