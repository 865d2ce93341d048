// Test mocks for the analysis pipeline.
//
// Two mocks matching the two async trait boundaries:
// - MockContentSource (ContentSource): query-keyed documents, scripted failures
// - MockGenerator (TextGenerator): prompt-substring-keyed replies, scripted failures
//
// Plus helpers for constructing Documents, SubDocuments and Candidates.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use painpoint_common::{
    Candidate, CandidateOrigin, Document, Engagement, PainPointError, Result, SortOrder,
    SubDocument, TimeRange,
};

use crate::traits::{ContentSource, ProgressReporter, Stage, TextGenerator};

// ---------------------------------------------------------------------------
// Scripted failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Error,
    RateLimited,
    Auth,
}

impl MockFailure {
    fn into_error(self, service: &str) -> PainPointError {
        match self {
            MockFailure::Error => PainPointError::Retrieval(format!("{service} mock failure")),
            MockFailure::RateLimited => PainPointError::RateLimited {
                service: service.to_string(),
                retry_after_secs: Some(60),
            },
            MockFailure::Auth => {
                PainPointError::Config(format!("{service} rejected the mock credentials"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockContentSource
// ---------------------------------------------------------------------------

/// Query-keyed content source. Unregistered queries return no documents.
/// Builder pattern: `.on_global()`, `.on_community()`, `.with_communities()`,
/// `.with_replies()`, `.fail_query()`, `.fail_everything()`.
pub struct MockContentSource {
    global: HashMap<String, Vec<Document>>,
    community: HashMap<(String, String), Vec<Document>>,
    communities: Vec<String>,
    replies: HashMap<String, Vec<SubDocument>>,
    failing_queries: HashMap<String, MockFailure>,
    fail_all: Option<MockFailure>,
    fail_replies: bool,
    ignore_limits: bool,
    calls: Mutex<Vec<String>>,
}

impl MockContentSource {
    pub fn new() -> Self {
        Self {
            global: HashMap::new(),
            community: HashMap::new(),
            communities: Vec::new(),
            replies: HashMap::new(),
            failing_queries: HashMap::new(),
            fail_all: None,
            fail_replies: false,
            ignore_limits: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Documents for a global query, whatever the sort or time range.
    pub fn on_global(mut self, query: &str, documents: Vec<Document>) -> Self {
        self.global.insert(query.to_string(), documents);
        self
    }

    pub fn on_community(mut self, community: &str, query: &str, documents: Vec<Document>) -> Self {
        self.community.insert(
            (community.to_lowercase(), query.to_string()),
            documents,
        );
        self
    }

    pub fn with_communities(mut self, names: &[&str]) -> Self {
        self.communities = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_replies(mut self, document_id: &str, replies: Vec<SubDocument>) -> Self {
        self.replies.insert(document_id.to_string(), replies);
        self
    }

    /// Fail every global or community query whose text is `query`.
    pub fn fail_query(mut self, query: &str, failure: MockFailure) -> Self {
        self.failing_queries.insert(query.to_string(), failure);
        self
    }

    pub fn fail_everything(mut self, failure: MockFailure) -> Self {
        self.fail_all = Some(failure);
        self
    }

    pub fn failing_replies(mut self) -> Self {
        self.fail_replies = true;
        self
    }

    /// Return every scripted document regardless of the requested limit.
    pub fn ignoring_limits(mut self) -> Self {
        self.ignore_limits = true;
        self
    }

    /// Every call made so far, formatted as `kind:arg|arg|...`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_of(&self, kind: &str) -> usize {
        let prefix = format!("{kind}:");
        self.calls()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self, query: &str) -> Result<()> {
        if let Some(failure) = self.fail_all.or_else(|| self.failing_queries.get(query).copied()) {
            return Err(failure.into_error("reddit"));
        }
        Ok(())
    }
}

impl Default for MockContentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    async fn query_global(
        &self,
        query: &str,
        sort: SortOrder,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Document>> {
        self.record(format!(
            "global:{query}|{}|{}|{limit}",
            sort.as_str(),
            time_range.as_str()
        ));
        self.check(query)?;
        let mut documents = self.global.get(query).cloned().unwrap_or_default();
        if !self.ignore_limits {
            documents.truncate(limit as usize);
        }
        Ok(documents)
    }

    async fn query_in_community(
        &self,
        community: &str,
        query: &str,
        sort: SortOrder,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Document>> {
        self.record(format!(
            "community:{community}|{query}|{}|{}|{limit}",
            sort.as_str(),
            time_range.as_str()
        ));
        self.check(query)?;
        let mut documents = self
            .community
            .get(&(community.to_lowercase(), query.to_string()))
            .cloned()
            .unwrap_or_default();
        if !self.ignore_limits {
            documents.truncate(limit as usize);
        }
        Ok(documents)
    }

    async fn resolve_communities(&self, term: &str) -> Result<Vec<String>> {
        self.record(format!("resolve:{term}"));
        if let Some(failure) = self.fail_all {
            return Err(failure.into_error("reddit"));
        }
        Ok(self.communities.clone())
    }

    async fn fetch_replies(&self, document: &Document, limit: u32) -> Result<Vec<SubDocument>> {
        self.record(format!("replies:{}", document.id));
        if self.fail_replies {
            return Err(MockFailure::Error.into_error("reddit"));
        }
        let mut replies = self.replies.get(&document.id).cloned().unwrap_or_default();
        replies.truncate(limit as usize);
        Ok(replies)
    }
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(MockFailure),
}

/// Replies picked by the first registered substring found in the prompt.
/// Unmatched prompts fail, so untouched stages fall back deterministically.
pub struct MockGenerator {
    script: Vec<(String, Scripted)>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, prompt_contains: &str, reply: &str) -> Self {
        self.script
            .push((prompt_contains.to_string(), Scripted::Reply(reply.to_string())));
        self
    }

    pub fn fail_on(mut self, prompt_contains: &str, failure: MockFailure) -> Self {
        self.script
            .push((prompt_contains.to_string(), Scripted::Fail(failure)));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn prompts_containing(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match self
            .script
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
        {
            Some((_, Scripted::Reply(text))) => Ok(text.clone()),
            Some((_, Scripted::Fail(MockFailure::Error))) | None => Err(
                PainPointError::Generation("mock generator has no reply".to_string()),
            ),
            Some((_, Scripted::Fail(failure))) => Err(failure.into_error("claude")),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingProgress
// ---------------------------------------------------------------------------

/// Collects every progress update for later assertions.
#[derive(Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<(Stage, u8)>>,
}

impl RecordingProgress {
    pub fn stages(&self) -> Vec<Stage> {
        let mut seen = HashSet::new();
        self.updates()
            .into_iter()
            .map(|(stage, _)| stage)
            .filter(|stage| seen.insert(stage.as_str()))
            .collect()
    }

    pub fn updates(&self) -> Vec<(Stage, u8)> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, stage: Stage, percent: u8, _message: &str) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push((stage, percent));
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A post in `apps` with a fixed timestamp.
pub fn doc(id: &str, title: &str, body: Option<&str>, score: i64, replies: i64) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        body: body.map(str::to_string),
        engagement: Engagement::new(score, replies),
        community: "apps".to_string(),
        url: format!("https://www.reddit.com/r/apps/comments/{id}/"),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        author: "tester".to_string(),
        replies: Vec::new(),
    }
}

pub fn reply(id: &str, body: &str, score: i64) -> SubDocument {
    SubDocument {
        id: id.to_string(),
        body: Some(body.to_string()),
        engagement: Engagement::new(score, 0),
        community: "apps".to_string(),
        url: format!("https://www.reddit.com/r/apps/comments/x/{id}/"),
        created_at: Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
        author: "replier".to_string(),
    }
}

pub fn candidate(id: &str, content: &str, engagement_score: i64) -> Candidate {
    Candidate {
        id: id.to_string(),
        content: content.to_string(),
        origin: CandidateOrigin::Title,
        engagement_score,
        score: engagement_score,
        reply_count: 0,
        community: "apps".to_string(),
        url: format!("https://www.reddit.com/r/apps/comments/{id}/"),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}
