// Trait seams between the pipeline and the outside world.
//
// ContentSource: where documents come from (Reddit in production).
// TextGenerator: prompt in, text out (Claude or OpenAI in production).
// ProgressReporter: fire-and-forget stage updates for long-running jobs.
//
// The pipeline only sees these traits, so tests run against MockContentSource
// and MockGenerator with no network.

use async_trait::async_trait;
use tracing::info;

use painpoint_common::{Document, Result, SortOrder, SubDocument, TimeRange};

// ---------------------------------------------------------------------------
// ContentSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Query the whole source. `Ok(vec![])` means "no results", never failure.
    async fn query_global(
        &self,
        query: &str,
        sort: SortOrder,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Document>>;

    /// Query inside one community.
    async fn query_in_community(
        &self,
        community: &str,
        query: &str,
        sort: SortOrder,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Document>>;

    /// Community names the source itself associates with `term`.
    async fn resolve_communities(&self, term: &str) -> Result<Vec<String>>;

    /// Replies to one document. Sources without threaded replies return nothing.
    async fn fetch_replies(&self, _document: &Document, _limit: u32) -> Result<Vec<SubDocument>> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// TextGenerator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// ProgressReporter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Searching,
    Extracting,
    Filtering,
    Categorizing,
    Summarizing,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Searching => "searching",
            Stage::Extracting => "extracting",
            Stage::Filtering => "filtering",
            Stage::Categorizing => "categorizing",
            Stage::Summarizing => "summarizing",
            Stage::Complete => "complete",
        }
    }
}

/// Receives coarse progress at stage boundaries. Never awaited, never fails.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, stage: Stage, percent: u8, message: &str);
}

pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _stage: Stage, _percent: u8, _message: &str) {}
}

/// Emits progress as tracing events.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, stage: Stage, percent: u8, message: &str) {
        info!(stage = stage.as_str(), percent, message, "Progress");
    }
}
