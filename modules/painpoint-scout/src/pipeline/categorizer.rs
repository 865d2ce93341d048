// Categorization: one AI grouping request, with a keyword rule fallback.
//
// The AI path only sees the first AI_WINDOW candidates and leaves the rest
// uncategorized. The fallback path covers every candidate exactly once.

use std::collections::HashSet;
use std::time::Duration;

use ai_client::util::truncate_to_char_boundary;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use painpoint_common::{slugify, Candidate, Category, PainPointError, Result};

use crate::infra::parse::{as_index, parse_list, ParseFailure};
use crate::infra::util::with_timeout;
use crate::pipeline::stats::Failures;
use crate::rules::Rulebook;
use crate::traits::TextGenerator;

/// Candidates listed in the grouping prompt.
pub const AI_WINDOW: usize = 50;

/// Long titles and restatements are cut in the grouping prompt.
const PROMPT_ITEM_BYTES: usize = 300;

#[derive(Debug, Deserialize)]
struct ProposedCategory {
    #[serde(alias = "category", alias = "title")]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(
        default,
        alias = "items",
        alias = "members",
        alias = "pain_points",
        alias = "painPoints"
    )]
    indices: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct CategorizeOutcome {
    pub categories: Vec<Category>,
    /// True when the keyword rules produced the categories.
    pub fallback: bool,
    /// Candidates the AI path left out of every category.
    pub uncategorized: usize,
    pub failures: Failures,
}

fn grouping_prompt(term: &str, window: &[Candidate]) -> String {
    let items = window
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. (engagement {}) {}",
                i + 1,
                c.engagement_score,
                truncate_to_char_boundary(&c.content, PROMPT_ITEM_BYTES)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let n = window.len();

    format!(
        r#"Group these {n} complaints about "{term}" into 5-10 distinct categories of pain points.

Complaints:
{items}

Rules:
- Give each category a short name (2-4 words) and a one-sentence description.
- Put each complaint in at most one category, referring to it by its number.
- Prefer specific themes over vague ones.

Respond with ONLY a JSON object:
{{"categories": [{{"name": "Category Name", "description": "What these complaints share", "indices": [1, 4, 7]}}]}}"#
    )
}

pub struct Categorizer<'a> {
    generator: &'a dyn TextGenerator,
    rules: &'a Rulebook,
    timeout: Duration,
}

impl<'a> Categorizer<'a> {
    pub fn new(generator: &'a dyn TextGenerator, rules: &'a Rulebook, timeout: Duration) -> Self {
        Self {
            generator,
            rules,
            timeout,
        }
    }

    pub async fn categorize(&self, candidates: &[Candidate], term: &str) -> CategorizeOutcome {
        if candidates.is_empty() {
            return CategorizeOutcome::default();
        }

        let mut failures = Failures::default();
        match self.ai_categories(candidates, term).await {
            Ok(categories) => {
                let covered: usize = categories.iter().map(|c| c.count).sum();
                info!(
                    categories = categories.len(),
                    covered,
                    candidates = candidates.len(),
                    "AI categorization complete"
                );
                return CategorizeOutcome {
                    categories,
                    fallback: false,
                    uncategorized: candidates.len() - covered,
                    failures,
                };
            }
            Err(e) => {
                warn!(error = %e, "AI categorization failed, using keyword rules");
                failures.record(&e);
            }
        }

        let categories = fallback_categories(self.rules, candidates);
        info!(categories = categories.len(), "Keyword categorization complete");
        CategorizeOutcome {
            categories,
            fallback: true,
            uncategorized: 0,
            failures,
        }
    }

    async fn ai_categories(&self, candidates: &[Candidate], term: &str) -> Result<Vec<Category>> {
        let window = &candidates[..candidates.len().min(AI_WINDOW)];
        let prompt = grouping_prompt(term, window);
        let reply = with_timeout(self.timeout, self.generator.generate(&prompt)).await?;
        let proposed: Vec<ProposedCategory> = parse_list(&reply)?;

        let categories = resolve(proposed, window);
        if categories.is_empty() {
            return Err(PainPointError::from(ParseFailure::Shape(
                "no category resolved to any candidate".to_string(),
            )));
        }
        Ok(categories)
    }
}

/// Turn proposed groups into categories over `window`. 1-based indices that
/// miss the window are dropped, a candidate claimed twice stays with the first
/// claimant, names with the same slug merge, and empty categories are dropped.
fn resolve(proposed: Vec<ProposedCategory>, window: &[Candidate]) -> Vec<Category> {
    let mut assigned = HashSet::new();
    let mut groups: Vec<(String, String, String, Vec<Candidate>)> = Vec::new();

    for group in proposed {
        let name = group.name.trim();
        if name.is_empty() {
            continue;
        }
        let members: Vec<Candidate> = group
            .indices
            .iter()
            .filter_map(as_index)
            .filter_map(|i| i.checked_sub(1))
            .filter(|&i| i < window.len() && assigned.insert(i))
            .map(|i| window[i].clone())
            .collect();

        // Category ids are slugs, so names that slug alike are the same category.
        let slug = slugify(name);
        match groups.iter_mut().find(|(existing, _, _, _)| *existing == slug) {
            Some((_, _, _, existing)) => existing.extend(members),
            None => groups.push((
                slug,
                name.to_string(),
                group.description.trim().to_string(),
                members,
            )),
        }
    }

    groups
        .into_iter()
        .filter(|(_, _, _, members)| !members.is_empty())
        .map(|(_, name, description, members)| Category::new(name, description, members))
        .collect()
}

/// Partition every candidate by the first matching keyword rule; unmatched
/// candidates land in the catch-all. Empty rule groups are dropped.
pub fn fallback_categories(rules: &Rulebook, candidates: &[Candidate]) -> Vec<Category> {
    let mut buckets: Vec<(&str, &str, Vec<Candidate>)> = rules
        .category_rules()
        .map(|rule| (rule.name, rule.description, Vec::new()))
        .collect();

    for candidate in candidates {
        let rule = rules.classify(&candidate.content);
        if let Some((_, _, members)) = buckets.iter_mut().find(|(name, _, _)| *name == rule.name) {
            members.push(candidate.clone());
        }
    }

    buckets
        .into_iter()
        .filter(|(_, _, members)| !members.is_empty())
        .map(|(name, description, members)| Category::new(name, description, members))
        .collect()
}
