use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use painpoint_common::{Candidate, Result};

use crate::infra::parse::{parse_list, ParseFailure};
use crate::infra::util::with_timeout;
use crate::pipeline::stats::Failures;
use crate::traits::TextGenerator;

/// Candidates per classification request.
pub const BATCH_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(alias = "isRelevant", alias = "is_relevant")]
    relevant: bool,
    #[serde(
        default,
        alias = "painPoint",
        alias = "pain_point",
        alias = "summary",
        alias = "rephrased"
    )]
    restatement: Option<String>,
}

#[derive(Debug, Default)]
pub struct RelevanceOutcome {
    pub candidates: Vec<Candidate>,
    /// Batches kept whole because classification failed.
    pub fallback_batches: usize,
    pub failures: Failures,
}

fn relevance_prompt(term: &str, batch: &[Candidate]) -> String {
    let items = batch
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.content))
        .collect::<Vec<_>>()
        .join("\n");
    let n = batch.len();

    format!(
        r#"Search term: "{term}"

Classify each numbered item below. Decide whether it is genuinely a complaint or pain point about "{term}", not an unrelated topic that happens to share a word. If it is relevant, restate the pain point in 1-2 clear sentences.

Items:
{items}

Respond with ONLY a JSON array of exactly {n} objects, in the same order as the items:
[{{"relevant": true, "restatement": "..."}}, {{"relevant": false, "restatement": ""}}]"#
    )
}

/// AI relevance check in fixed-size batches. Never grows its input.
pub struct RelevanceFilter<'a> {
    generator: &'a dyn TextGenerator,
    timeout: Duration,
}

impl<'a> RelevanceFilter<'a> {
    pub fn new(generator: &'a dyn TextGenerator, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn filter(&self, candidates: Vec<Candidate>, term: &str) -> RelevanceOutcome {
        let input = candidates.len();
        let batches: Vec<Vec<Candidate>> = candidates
            .chunks(BATCH_SIZE)
            .map(<[Candidate]>::to_vec)
            .collect();
        let width = batches.len().max(1);

        let results: Vec<(Vec<Candidate>, Result<Vec<Verdict>>)> =
            stream::iter(batches.into_iter().map(|batch| async move {
                let verdicts = self.classify(&batch, term).await;
                (batch, verdicts)
            }))
            .buffered(width)
            .collect()
            .await;

        let mut outcome = RelevanceOutcome::default();
        for (index, (batch, verdicts)) in results.into_iter().enumerate() {
            match verdicts {
                Ok(verdicts) => outcome.candidates.extend(apply(batch, verdicts)),
                Err(e) => {
                    warn!(batch = index, size = batch.len(), error = %e, "Relevance batch failed, keeping all");
                    outcome.failures.record(&e);
                    outcome.fallback_batches += 1;
                    outcome.candidates.extend(batch);
                }
            }
        }

        info!(
            input,
            kept = outcome.candidates.len(),
            fallback_batches = outcome.fallback_batches,
            "Relevance filter complete"
        );
        outcome
    }

    async fn classify(&self, batch: &[Candidate], term: &str) -> Result<Vec<Verdict>> {
        let prompt = relevance_prompt(term, batch);
        let reply = with_timeout(self.timeout, self.generator.generate(&prompt)).await?;
        let verdicts: Vec<Verdict> = parse_list(&reply)?;
        if verdicts.len() != batch.len() {
            return Err(ParseFailure::Shape(format!(
                "expected {} verdicts, got {}",
                batch.len(),
                verdicts.len()
            ))
            .into());
        }
        Ok(verdicts)
    }
}

/// Keep relevant candidates; a non-empty restatement replaces the content.
fn apply(batch: Vec<Candidate>, verdicts: Vec<Verdict>) -> Vec<Candidate> {
    batch
        .into_iter()
        .zip(verdicts)
        .filter(|(_, v)| v.relevant)
        .map(|(mut candidate, verdict)| {
            if let Some(text) = verdict.restatement.as_deref().map(str::trim) {
                if !text.is_empty() {
                    candidate.content = text.to_string();
                }
            }
            candidate
        })
        .collect()
}
