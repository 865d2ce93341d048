use std::sync::Arc;

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use painpoint_common::{AnalysisResult, PainPointError, PipelineSettings, Result};

use crate::pipeline::categorizer::Categorizer;
use crate::pipeline::engagement;
use crate::pipeline::extractor::CandidateExtractor;
use crate::pipeline::relevance::RelevanceFilter;
use crate::pipeline::search::SearchAggregator;
use crate::pipeline::stats::RunStats;
use crate::pipeline::summarizer::Summarizer;
use crate::rules::Rulebook;
use crate::traits::{ContentSource, NoopProgress, ProgressReporter, Stage, TextGenerator};

/// Runs the full discovery pipeline for one search term at a time.
pub struct Analyzer {
    source: Arc<dyn ContentSource>,
    generator: Arc<dyn TextGenerator>,
    rules: Arc<Rulebook>,
    settings: PipelineSettings,
    progress: Arc<dyn ProgressReporter>,
}

impl Analyzer {
    pub fn new(
        source: Arc<dyn ContentSource>,
        generator: Arc<dyn TextGenerator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            generator,
            rules: Arc::new(Rulebook::standard()),
            settings,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_rules(mut self, rules: Arc<Rulebook>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Search, extract, filter, categorize and summarize pain points for `term`.
    ///
    /// Stage-level failures degrade to fallbacks and never surface here. The
    /// errors returned are a blank term, rejected credentials, or a rate limit
    /// that left retrieval with nothing.
    pub async fn analyze(&self, term: &str) -> Result<AnalysisResult> {
        let term = term.trim();
        if term.is_empty() {
            return Err(PainPointError::InvalidInput(
                "search term must not be empty".to_string(),
            ));
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("analysis", %run_id, term);
        self.run(run_id, term).instrument(span).await
    }

    async fn run(&self, run_id: Uuid, term: &str) -> Result<AnalysisResult> {
        let mut stats = RunStats::default();
        let mut warnings = Vec::new();
        let timeout = self.settings.call_timeout;
        info!("Analysis started");

        // Search
        self.progress
            .report(Stage::Searching, 5, &format!("Searching for \"{term}\""));
        let search = SearchAggregator::new(
            self.source.as_ref(),
            self.generator.as_ref(),
            &self.rules,
            &self.settings,
        )
        .search(term)
        .await;
        stats.queries_run = search.queries;
        stats.queries_failed = search.failures.count;
        stats.documents_retrieved = search.documents.len();
        stats.replies_fetched = search.replies_fetched;

        if search.documents.is_empty() {
            if let Some(message) = &search.failures.credentials {
                return Err(PainPointError::Config(message.clone()));
            }
            if let Some(err) = search.failures.rate_limit_error() {
                return Err(err);
            }
            self.progress.report(Stage::Complete, 100, "No posts found");
            info!("{stats}");
            return Ok(AnalysisResult::no_posts(run_id, term));
        }
        warnings.extend(search.failures.rate_limit_warning("search"));
        let total_posts = search.documents.len();

        // Extract
        self.progress.report(
            Stage::Extracting,
            30,
            &format!("Extracting pain points from {total_posts} posts"),
        );
        let candidates = CandidateExtractor::new(&self.rules).extract(&search.documents);
        drop(search.documents);
        stats.candidates_extracted = candidates.len();

        if candidates.is_empty() {
            return Ok(self.no_pain_points(run_id, term, total_posts, warnings, &stats));
        }

        // Relevance + engagement
        self.progress.report(
            Stage::Filtering,
            45,
            &format!("Checking relevance of {} candidates", candidates.len()),
        );
        let relevance = RelevanceFilter::new(self.generator.as_ref(), timeout)
            .filter(candidates, term)
            .await;
        stats.candidates_relevant = relevance.candidates.len();
        stats.relevance_fallback_batches = relevance.fallback_batches;
        warnings.extend(relevance.failures.rate_limit_warning("relevance"));

        let (candidates, relaxed) =
            engagement::gate(relevance.candidates, self.settings.min_engagement);
        stats.candidates_gated = candidates.len();
        stats.gate_relaxed = relaxed;

        if candidates.is_empty() {
            return Ok(self.no_pain_points(run_id, term, total_posts, warnings, &stats));
        }

        // Categorize
        self.progress.report(
            Stage::Categorizing,
            65,
            &format!("Grouping {} pain points", candidates.len()),
        );
        let categorized = Categorizer::new(self.generator.as_ref(), &self.rules, timeout)
            .categorize(&candidates, term)
            .await;
        stats.categories = categorized.categories.len();
        stats.categorizer_fallback = categorized.fallback;
        warnings.extend(categorized.failures.rate_limit_warning("categorization"));
        let mut categories = categorized.categories;

        // Summarize
        self.progress.report(
            Stage::Summarizing,
            80,
            &format!("Summarizing {} categories", categories.len()),
        );
        let summaries = Summarizer::new(self.generator.as_ref(), timeout)
            .summarize_all(&mut categories, term)
            .await;
        stats.summary_fallbacks = summaries.fallbacks;
        warnings.extend(summaries.failures.rate_limit_warning("summary"));

        let result =
            AnalysisResult::assemble(run_id, term, categories, candidates.len(), total_posts)
                .with_warnings(warnings);

        self.progress.report(
            Stage::Complete,
            100,
            &format!("Found {} categories", result.categories.len()),
        );
        info!("{stats}");
        Ok(result)
    }

    fn no_pain_points(
        &self,
        run_id: Uuid,
        term: &str,
        total_posts: usize,
        warnings: Vec<String>,
        stats: &RunStats,
    ) -> AnalysisResult {
        self.progress
            .report(Stage::Complete, 100, "No relevant pain points found");
        info!("{stats}");
        AnalysisResult::no_pain_points(run_id, term, total_posts).with_warnings(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{doc, MockContentSource, MockFailure, MockGenerator, RecordingProgress};

    fn analyzer(source: MockContentSource, generator: Arc<MockGenerator>) -> Analyzer {
        Analyzer::new(Arc::new(source), generator, PipelineSettings::default())
    }

    #[tokio::test]
    async fn blank_term_is_rejected() {
        let analyzer = analyzer(MockContentSource::new(), Arc::new(MockGenerator::new()));
        let err = analyzer.analyze("   ").await.unwrap_err();
        assert!(matches!(err, PainPointError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rejected_credentials_are_fatal() {
        let source = MockContentSource::new().fail_everything(MockFailure::Auth);
        let err = analyzer(source, Arc::new(MockGenerator::new()))
            .analyze("widgets")
            .await
            .unwrap_err();
        assert!(matches!(err, PainPointError::Config(_)));
    }

    #[tokio::test]
    async fn rate_limit_with_no_posts_asks_for_retry() {
        let source = MockContentSource::new().fail_everything(MockFailure::RateLimited);
        let err = analyzer(source, Arc::new(MockGenerator::new()))
            .analyze("widgets")
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn partial_rate_limit_becomes_warning() {
        let source = MockContentSource::new()
            .on_global("widgets", vec![doc("a", "My widgets are broken again", None, 5, 1)])
            .fail_query("widgets problems", MockFailure::RateLimited);
        let result = analyzer(source, Arc::new(MockGenerator::new()))
            .analyze("widgets")
            .await
            .unwrap();

        assert_eq!(result.total_pain_points, 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("rate limited"));
    }

    #[tokio::test]
    async fn progress_walks_through_every_stage() {
        let source = MockContentSource::new()
            .on_global("widgets", vec![doc("a", "My widgets are broken again", None, 5, 1)]);
        let progress = Arc::new(RecordingProgress::default());
        let analyzer = analyzer(source, Arc::new(MockGenerator::new()))
            .with_progress(progress.clone());

        analyzer.analyze("widgets").await.unwrap();

        assert_eq!(
            progress.stages(),
            vec![
                Stage::Searching,
                Stage::Extracting,
                Stage::Filtering,
                Stage::Categorizing,
                Stage::Summarizing,
                Stage::Complete,
            ]
        );
        let percents: Vec<_> = progress.updates().into_iter().map(|(_, p)| p).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }
}
