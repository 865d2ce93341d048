use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use ai_client::util::strip_code_blocks;
use painpoint_common::{Category, PainPointError, Result};

use crate::infra::util::with_timeout;
use crate::pipeline::stats::Failures;
use crate::traits::TextGenerator;

/// Member complaints quoted as evidence per category.
pub const EVIDENCE_PER_CATEGORY: usize = 10;

#[derive(Debug, Default)]
pub struct SummaryOutcome {
    pub fallbacks: usize,
    pub failures: Failures,
}

fn summary_prompt(term: &str, category: &Category) -> String {
    let evidence = category
        .pain_points
        .iter()
        .take(EVIDENCE_PER_CATEGORY)
        .map(|c| format!("- {}", c.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Summarize the "{name}" category of user complaints about "{term}".

Category description: {description}

Representative complaints:
{evidence}

Write a 2-3 sentence summary in a professional tone describing the core problem and its impact on users. Respond with the summary text only."#,
        name = category.name,
        description = category.description,
    )
}

/// Templated summary used whenever generation fails.
pub fn fallback_summary(category: &Category) -> String {
    format!("Common issues related to {}", category.name)
}

pub struct Summarizer<'a> {
    generator: &'a dyn TextGenerator,
    timeout: Duration,
}

impl<'a> Summarizer<'a> {
    pub fn new(generator: &'a dyn TextGenerator, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Always yields a summary; failures become the templated sentence.
    pub async fn summarize(&self, category: &Category, term: &str) -> String {
        self.try_summarize(category, term)
            .await
            .unwrap_or_else(|_| fallback_summary(category))
    }

    /// Fill in every category's summary concurrently.
    pub async fn summarize_all(&self, categories: &mut [Category], term: &str) -> SummaryOutcome {
        let width = categories.len().max(1);
        let results: Vec<Result<String>> = stream::iter(
            categories
                .iter()
                .map(|category| self.try_summarize(category, term)),
        )
        .buffered(width)
        .collect()
        .await;

        let mut outcome = SummaryOutcome::default();
        for (category, result) in categories.iter_mut().zip(results) {
            category.summary = match result {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(category = category.name.as_str(), error = %e, "Summary failed, using template");
                    outcome.failures.record(&e);
                    outcome.fallbacks += 1;
                    fallback_summary(category)
                }
            };
        }

        info!(
            categories = categories.len(),
            fallbacks = outcome.fallbacks,
            "Summaries complete"
        );
        outcome
    }

    async fn try_summarize(&self, category: &Category, term: &str) -> Result<String> {
        let prompt = summary_prompt(term, category);
        let reply = with_timeout(self.timeout, self.generator.generate(&prompt)).await?;
        let summary = strip_code_blocks(&reply).trim().trim_matches('"').trim();
        if summary.is_empty() {
            return Err(PainPointError::Generation("empty summary".to_string()));
        }
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candidate, MockFailure, MockGenerator};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn category(name: &str, members: usize) -> Category {
        let members = (0..members)
            .map(|i| candidate(&format!("{name}{i}"), &format!("{name} complaint {i}"), 3))
            .collect();
        Category::new(name, format!("{name} problems"), members)
    }

    #[tokio::test]
    async fn generated_summary_is_used() {
        let generator = MockGenerator::new().on("Summarize", "\"Users report constant lag.\"\n");
        let summary = Summarizer::new(&generator, TIMEOUT)
            .summarize(&category("Lag", 2), "game")
            .await;
        assert_eq!(summary, "Users report constant lag.");
    }

    #[tokio::test]
    async fn failure_uses_template() {
        let generator = MockGenerator::new().fail_on("Summarize", MockFailure::Error);
        let summary = Summarizer::new(&generator, TIMEOUT)
            .summarize(&category("Billing", 1), "app")
            .await;
        assert_eq!(summary, "Common issues related to Billing");
    }

    #[tokio::test]
    async fn categories_are_independent() {
        let generator = MockGenerator::new()
            .fail_on("\"Crashes\" category", MockFailure::RateLimited)
            .on("Summarize", "A clear summary.");
        let mut categories = vec![category("Crashes", 1), category("Pricing", 1)];

        let outcome = Summarizer::new(&generator, TIMEOUT)
            .summarize_all(&mut categories, "app")
            .await;

        assert_eq!(categories[0].summary, "Common issues related to Crashes");
        assert_eq!(categories[1].summary, "A clear summary.");
        assert_eq!(outcome.fallbacks, 1);
        assert!(outcome.failures.hit_rate_limit());
    }

    #[tokio::test]
    async fn evidence_is_capped() {
        let generator = MockGenerator::new().on("Summarize", "ok");
        Summarizer::new(&generator, TIMEOUT)
            .summarize(&category("Big", 25), "app")
            .await;
        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("Big complaint 9"));
        assert!(!prompt.contains("Big complaint 10"));
    }
}
