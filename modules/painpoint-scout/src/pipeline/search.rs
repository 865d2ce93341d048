// Multi-strategy retrieval.
//
// Four strategies run concurrently and settle independently:
//   Direct      one broad query, most relevant first, all time
//   Community   the term searched inside a few resolved communities
//   Variation   complaint-flavoured phrasings of the term over one year
//   TimeSliced  the term sorted by top over several windows
//
// Each sub-query is timed out and failure-isolated. Outputs are merged in the
// fixed order above so that first-seen-wins dedup is deterministic.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use painpoint_common::{Document, PipelineSettings, Result, SortOrder, TimeRange};

use crate::infra::parse::parse_list;
use crate::infra::util::with_timeout;
use crate::pipeline::stats::Failures;
use crate::rules::Rulebook;
use crate::traits::{ContentSource, TextGenerator};

/// Listing endpoints return at most this many items per call.
const SOURCE_PAGE_CAP: u32 = 100;

const DIRECT_BUDGET: u32 = 100;
const COMMUNITY_BUDGET: u32 = 100;
const VARIATION_BUDGET: u32 = 100;
const TIME_SLICE_BUDGET: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Community,
    Variation,
    TimeSliced,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Community => "community",
            Strategy::Variation => "variation",
            Strategy::TimeSliced => "time_sliced",
        }
    }
}

#[derive(Debug, Clone)]
struct Query {
    community: Option<String>,
    text: String,
    sort: SortOrder,
    time_range: TimeRange,
    limit: u32,
}

/// What one strategy produced once all its sub-queries settled.
#[derive(Debug, Default)]
pub struct StrategyOutput {
    pub documents: Vec<Document>,
    pub queries: usize,
    pub failures: Failures,
}

#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Deduplicated, sorted by `score + replies` descending, capped.
    pub documents: Vec<Document>,
    pub queries: usize,
    pub replies_fetched: usize,
    pub failures: Failures,
}

/// Fixed budget split evenly across a fan-out, kept within one page.
fn per_query_limit(budget: u32, fan_out: usize) -> u32 {
    if fan_out == 0 {
        return 0;
    }
    (budget / fan_out as u32).clamp(1, SOURCE_PAGE_CAP)
}

/// Merge strategy outputs in the order given. The first document seen under an
/// id is kept; later copies are ignored. Then stable-sorted by rank and capped.
pub fn merge(outputs: Vec<Vec<Document>>, cap: usize) -> Vec<Document> {
    let mut seen = HashSet::new();
    let mut documents: Vec<Document> = outputs
        .into_iter()
        .flatten()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect();
    documents.sort_by(|a, b| b.engagement.rank().cmp(&a.engagement.rank()));
    documents.truncate(cap);
    documents
}

/// Clean up community names: strip `r/` prefixes, drop anything that isn't a
/// plausible name, dedupe case-insensitively, cap.
pub fn normalize_communities(names: impl IntoIterator<Item = String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let name = name.trim().trim_start_matches('/');
            let name = name
                .strip_prefix("r/")
                .or_else(|| name.strip_prefix("R/"))
                .unwrap_or(name);
            name.trim().to_string()
        })
        .filter(|name| {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .filter(|name| seen.insert(name.to_lowercase()))
        .take(cap)
        .collect()
}

fn community_prompt(term: &str, max: usize) -> String {
    format!(
        r#"Suggest up to {max} Reddit communities (subreddits) where people are most likely to discuss problems, complaints and frustrations with "{term}".

Prefer active, topic-specific communities over general ones.

Respond with ONLY a JSON array of subreddit names without the "r/" prefix, for example ["apple", "iphone"]."#
    )
}

pub struct SearchAggregator<'a> {
    source: &'a dyn ContentSource,
    generator: &'a dyn TextGenerator,
    rules: &'a Rulebook,
    settings: &'a PipelineSettings,
}

impl<'a> SearchAggregator<'a> {
    pub fn new(
        source: &'a dyn ContentSource,
        generator: &'a dyn TextGenerator,
        rules: &'a Rulebook,
        settings: &'a PipelineSettings,
    ) -> Self {
        Self {
            source,
            generator,
            rules,
            settings,
        }
    }

    /// Run all strategies, merge, then attach replies to the top documents.
    /// An empty outcome is a valid "no results", not an error.
    pub async fn search(&self, term: &str) -> SearchOutcome {
        let (direct, community, variation, time_sliced) = tokio::join!(
            self.direct(term),
            self.community(term),
            self.variation(term),
            self.time_sliced(term),
        );

        let mut failures = Failures::default();
        let mut queries = 0;
        let mut outputs = Vec::with_capacity(4);
        for output in [direct, community, variation, time_sliced] {
            queries += output.queries;
            failures.absorb(output.failures);
            outputs.push(output.documents);
        }

        let mut documents = merge(outputs, self.settings.max_documents);
        let (replies_fetched, reply_failures) = self.attach_replies(&mut documents).await;
        failures.absorb(reply_failures);

        info!(
            documents = documents.len(),
            queries,
            failed = failures.count,
            replies_fetched,
            "Search complete"
        );

        SearchOutcome {
            documents,
            queries,
            replies_fetched,
            failures,
        }
    }

    async fn direct(&self, term: &str) -> StrategyOutput {
        let query = Query {
            community: None,
            text: term.to_string(),
            sort: SortOrder::Relevance,
            time_range: TimeRange::All,
            limit: per_query_limit(DIRECT_BUDGET, 1),
        };
        self.run_queries(Strategy::Direct, vec![query]).await
    }

    async fn community(&self, term: &str) -> StrategyOutput {
        let (communities, resolve_failures) = self.resolve_communities(term).await;
        let limit = per_query_limit(COMMUNITY_BUDGET, communities.len());
        let queries = communities
            .into_iter()
            .map(|community| Query {
                community: Some(community),
                text: term.to_string(),
                sort: SortOrder::Relevance,
                time_range: TimeRange::All,
                limit,
            })
            .collect();

        let mut output = self.run_queries(Strategy::Community, queries).await;
        output.failures.absorb(resolve_failures);
        output
    }

    async fn variation(&self, term: &str) -> StrategyOutput {
        let variations = self.rules.variations(term);
        let limit = per_query_limit(VARIATION_BUDGET, variations.len());
        let queries = variations
            .into_iter()
            .map(|text| Query {
                community: None,
                text,
                sort: SortOrder::Relevance,
                time_range: TimeRange::Year,
                limit,
            })
            .collect();
        self.run_queries(Strategy::Variation, queries).await
    }

    async fn time_sliced(&self, term: &str) -> StrategyOutput {
        let slices = self.rules.time_slices();
        let limit = per_query_limit(TIME_SLICE_BUDGET, slices.len());
        let queries = slices
            .iter()
            .map(|&time_range| Query {
                community: None,
                text: term.to_string(),
                sort: SortOrder::Top,
                time_range,
                limit,
            })
            .collect();
        self.run_queries(Strategy::TimeSliced, queries).await
    }

    async fn execute(&self, query: &Query) -> Result<Vec<Document>> {
        match &query.community {
            Some(community) => {
                self.source
                    .query_in_community(
                        community,
                        &query.text,
                        query.sort,
                        query.time_range,
                        query.limit,
                    )
                    .await
            }
            None => {
                self.source
                    .query_global(&query.text, query.sort, query.time_range, query.limit)
                    .await
            }
        }
    }

    /// Fan out one strategy's sub-queries and join them. Each sub-query keeps
    /// at most its own limit. Failed sub-queries are logged and counted; they
    /// contribute no documents.
    async fn run_queries(&self, strategy: Strategy, queries: Vec<Query>) -> StrategyOutput {
        let width = queries.len().max(1);
        let timeout = self.settings.call_timeout;
        let results: Vec<(Query, Result<Vec<Document>>)> =
            stream::iter(queries.into_iter().map(|query| async move {
                let result = with_timeout(timeout, self.execute(&query)).await;
                (query, result)
            }))
            .buffered(width)
            .collect()
            .await;

        let mut output = StrategyOutput {
            queries: results.len(),
            ..Default::default()
        };
        for (query, result) in results {
            match result {
                Ok(documents) => output.documents.extend(
                    documents
                        .into_iter()
                        .take(query.limit as usize)
                        .filter(|doc| doc.is_substantive()),
                ),
                Err(e) => {
                    warn!(
                        strategy = strategy.as_str(),
                        query = query.text.as_str(),
                        community = query.community.as_deref().unwrap_or("*"),
                        time_range = query.time_range.as_str(),
                        error = %e,
                        "Sub-query failed"
                    );
                    output.failures.record(&e);
                }
            }
        }

        info!(
            strategy = strategy.as_str(),
            queries = output.queries,
            documents = output.documents.len(),
            failed = output.failures.count,
            "Strategy settled"
        );
        output
    }

    /// AI suggestion, then the keyword table, then the source's own lookup.
    /// The first non-empty answer wins.
    pub async fn resolve_communities(&self, term: &str) -> (Vec<String>, Failures) {
        let cap = self.settings.max_communities;
        let timeout = self.settings.call_timeout;
        let mut failures = Failures::default();

        let prompt = community_prompt(term, cap);
        match with_timeout(timeout, self.generator.generate(&prompt)).await {
            Ok(reply) => match parse_list::<String>(&reply) {
                Ok(names) => {
                    let communities = normalize_communities(names, cap);
                    if !communities.is_empty() {
                        info!(?communities, "Communities suggested");
                        return (communities, failures);
                    }
                }
                Err(e) => warn!(error = %e, "Community suggestion unparsable"),
            },
            Err(e) => {
                warn!(error = %e, "Community suggestion failed");
                // The table covers ordinary failures; only a rate limit is worth surfacing.
                if e.is_rate_limited() {
                    failures.record(&e);
                }
            }
        }

        let communities = normalize_communities(self.rules.communities_for(term), cap);
        if !communities.is_empty() {
            info!(?communities, "Communities from keyword table");
            return (communities, failures);
        }

        match with_timeout(timeout, self.source.resolve_communities(term)).await {
            Ok(names) => {
                let communities = normalize_communities(names, cap);
                info!(?communities, "Communities from source lookup");
                (communities, failures)
            }
            Err(e) => {
                warn!(error = %e, "Community lookup failed");
                failures.record(&e);
                (Vec::new(), failures)
            }
        }
    }

    /// Fetch replies for the first `reply_posts` documents. A failed fetch
    /// leaves that document without replies.
    async fn attach_replies(&self, documents: &mut [Document]) -> (usize, Failures) {
        let mut failures = Failures::default();
        let take = self.settings.reply_posts.min(documents.len());
        let limit = self.settings.replies_per_post;
        if take == 0 || limit == 0 {
            return (0, failures);
        }

        let timeout = self.settings.call_timeout;
        let fetched: Vec<Result<_>> = stream::iter(
            documents[..take]
                .iter()
                .map(|doc| with_timeout(timeout, self.source.fetch_replies(doc, limit))),
        )
        .buffered(take)
        .collect()
        .await;

        let mut attached = 0;
        for (doc, result) in documents.iter_mut().zip(fetched) {
            match result {
                Ok(replies) => {
                    attached += replies.len();
                    doc.replies = replies;
                }
                Err(e) => {
                    warn!(document = doc.id.as_str(), error = %e, "Reply fetch failed");
                    failures.record(&e);
                }
            }
        }
        (attached, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{doc, reply, MockContentSource, MockFailure, MockGenerator};

    fn settings() -> PipelineSettings {
        PipelineSettings::default()
    }

    #[test]
    fn budget_splits_evenly_within_page_cap() {
        assert_eq!(per_query_limit(100, 4), 25);
        assert_eq!(per_query_limit(100, 8), 12);
        assert_eq!(per_query_limit(100, 1), 100);
        assert_eq!(per_query_limit(500, 1), SOURCE_PAGE_CAP);
        assert_eq!(per_query_limit(100, 300), 1);
        assert_eq!(per_query_limit(100, 0), 0);
    }

    #[test]
    fn merge_keeps_first_seen_and_sorts_by_rank() {
        let mut direct_copy = doc("a", "The app keeps crashing on launch", None, 1, 0);
        direct_copy.community = "first".into();
        let mut later_copy = direct_copy.clone();
        later_copy.community = "second".into();
        later_copy.engagement.score = 999;

        let merged = merge(
            vec![
                vec![direct_copy, doc("b", "Battery drains way too fast now", None, 50, 5)],
                vec![later_copy, doc("c", "Sync has been broken for weeks", None, 20, 0)],
            ],
            10,
        );

        let ids: Vec<_> = merged.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(merged[2].community, "first");
    }

    #[test]
    fn merge_truncates_to_cap() {
        let docs = (0..10)
            .map(|i| doc(&format!("d{i}"), "A long enough title to keep", None, i, 0))
            .collect();
        assert_eq!(merge(vec![docs], 3).len(), 3);
    }

    #[test]
    fn communities_are_normalized() {
        let names = vec![
            "r/apple".to_string(),
            "/r/iPhone".to_string(),
            "Apple".to_string(),
            "not a subreddit".to_string(),
            "ios".to_string(),
        ];
        assert_eq!(normalize_communities(names, 2), vec!["apple", "iPhone"]);
    }

    #[tokio::test]
    async fn failing_sub_query_does_not_abort_siblings() {
        let source = MockContentSource::new()
            .on_global("spotify", vec![doc("a", "Spotify shuffle is broken again", None, 5, 1)])
            .fail_query("spotify problems", MockFailure::Error)
            .on_global(
                "spotify worst",
                vec![doc("b", "Worst update ever, playlists vanished", None, 9, 3)],
            );
        let generator = MockGenerator::new();
        let rules = Rulebook::standard();
        let settings = settings();

        let outcome = SearchAggregator::new(&source, &generator, &rules, &settings)
            .search("spotify")
            .await;

        let ids: Vec<_> = outcome.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(outcome.failures.count, 1);
        assert!(!outcome.failures.hit_rate_limit());
    }

    #[tokio::test]
    async fn every_failure_yields_empty_outcome() {
        let source = MockContentSource::new().fail_everything(MockFailure::RateLimited);
        let generator = MockGenerator::new();
        let rules = Rulebook::standard();
        let settings = settings();

        let outcome = SearchAggregator::new(&source, &generator, &rules, &settings)
            .search("widgets")
            .await;

        assert!(outcome.documents.is_empty());
        assert!(outcome.failures.hit_rate_limit());
    }

    #[tokio::test]
    async fn link_only_documents_are_dropped_at_ingestion() {
        let source = MockContentSource::new().on_global(
            "widgets",
            vec![
                doc("short", "Help", None, 100, 100),
                doc("ok", "Help", Some("My widget broke after a week"), 1, 0),
                doc("blank", "   ", Some("body without a title"), 100, 0),
            ],
        );
        let generator = MockGenerator::new();
        let rules = Rulebook::standard();
        let settings = settings();

        let outcome = SearchAggregator::new(&source, &generator, &rules, &settings)
            .search("widgets")
            .await;

        let ids: Vec<_> = outcome.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[tokio::test]
    async fn suggested_communities_are_searched() {
        let source = MockContentSource::new().on_community(
            "truespotify",
            "spotify",
            vec![doc("c", "Spotify keeps logging me out of every device", None, 3, 0)],
        );
        let generator =
            MockGenerator::new().on("Suggest up to", "```json\n[\"r/truespotify\"]\n```");
        let rules = Rulebook::standard();
        let settings = settings();

        let outcome = SearchAggregator::new(&source, &generator, &rules, &settings)
            .search("spotify")
            .await;

        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(source.calls_of("community"), 1);
        assert_eq!(source.calls_of("resolve"), 0);
    }

    #[tokio::test]
    async fn community_resolution_falls_back_to_table_then_source() {
        let generator = MockGenerator::new();
        let rules = Rulebook::standard();
        let settings = settings();

        let source = MockContentSource::new();
        let aggregator = SearchAggregator::new(&source, &generator, &rules, &settings);
        let (communities, _) = aggregator.resolve_communities("my iphone").await;
        assert_eq!(communities, vec!["apple", "iphone", "ios"]);

        let source = MockContentSource::new().with_communities(&["r/Widgets", "widgets", "gadgets"]);
        let aggregator = SearchAggregator::new(&source, &generator, &rules, &settings);
        let (communities, _) = aggregator.resolve_communities("widgets").await;
        assert_eq!(communities, vec!["Widgets", "gadgets"]);
    }

    #[tokio::test]
    async fn strategies_send_their_query_shapes() {
        let source = MockContentSource::new().with_communities(&["xfans", "xhelp"]);
        let generator = MockGenerator::new();
        let rules = Rulebook::standard();
        let settings = settings();

        SearchAggregator::new(&source, &generator, &rules, &settings)
            .search("x")
            .await;

        let calls = source.calls();
        let global: Vec<&str> = calls
            .iter()
            .filter_map(|c| c.strip_prefix("global:"))
            .collect();

        // Direct: one broad query over all time.
        assert_eq!(
            global.iter().filter(|c| c.starts_with("x|relevance|")).collect::<Vec<_>>(),
            vec![&"x|relevance|all|100"]
        );
        for window in ["week", "month", "year", "all"] {
            let expected = format!("x|top|{window}|25");
            assert!(global.contains(&expected.as_str()), "missing {expected}");
        }
        assert_eq!(global.iter().filter(|c| c.starts_with("x|top|")).count(), 4);

        let variations: Vec<_> = global.iter().filter(|c| c.starts_with("x ")).collect();
        assert_eq!(variations.len(), 8);
        assert!(variations.iter().all(|c| c.ends_with("|relevance|year|12")));
        assert!(variations.contains(&&"x problems|relevance|year|12"));

        let mut community: Vec<&str> = calls
            .iter()
            .filter_map(|c| c.strip_prefix("community:"))
            .collect();
        community.sort();
        assert_eq!(
            community,
            vec!["xfans|x|relevance|all|50", "xhelp|x|relevance|all|50"]
        );
    }

    #[tokio::test]
    async fn sub_query_keeps_only_its_own_budget() {
        let documents = (0..30)
            .map(|i| doc(&format!("d{i}"), "Widgets are broken and slow", None, 100 - i, 0))
            .collect();
        let source = MockContentSource::new()
            .on_global("widgets", documents)
            .ignoring_limits();
        let generator = MockGenerator::new();
        let rules = Rulebook::standard();
        let settings = settings();

        let aggregator = SearchAggregator::new(&source, &generator, &rules, &settings);
        let output = aggregator.time_sliced("widgets").await;

        // Four windows at 25 each; the source returned 30 per window.
        assert_eq!(output.queries, 4);
        assert_eq!(output.documents.len(), 4 * 25);
        assert!(output.documents.iter().all(|d| d.id != "d25"));
    }

    #[tokio::test]
    async fn replies_are_attached_to_top_documents() {
        let source = MockContentSource::new()
            .on_global("widgets", vec![doc("a", "Widgets are broken and slow", None, 5, 2)])
            .with_replies("a", vec![reply("r1", "Same, it crashes constantly", 3)]);
        let generator = MockGenerator::new();
        let rules = Rulebook::standard();
        let settings = settings();

        let outcome = SearchAggregator::new(&source, &generator, &rules, &settings)
            .search("widgets")
            .await;

        assert_eq!(outcome.documents[0].replies.len(), 1);
        assert_eq!(outcome.replies_fetched, 1);
    }

    #[tokio::test]
    async fn failed_reply_fetch_keeps_document() {
        let source = MockContentSource::new()
            .on_global("widgets", vec![doc("a", "Widgets are broken and slow", None, 5, 2)])
            .failing_replies();
        let generator = MockGenerator::new();
        let rules = Rulebook::standard();
        let settings = settings();

        let outcome = SearchAggregator::new(&source, &generator, &rules, &settings)
            .search("widgets")
            .await;

        assert_eq!(outcome.documents.len(), 1);
        assert!(outcome.documents[0].replies.is_empty());
        assert_eq!(outcome.failures.count, 1);
    }
}
