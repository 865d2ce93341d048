use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of categories surfaced in `AnalysisResult::top_categories`.
pub const TOP_CATEGORY_COUNT: usize = 10;

// --- Retrieval ---

/// Upvote score and reply count of a post or reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub score: i64,
    pub reply_count: i64,
}

impl Engagement {
    pub fn new(score: i64, reply_count: i64) -> Self {
        Self { score, reply_count }
    }

    /// Ordering key used when ranking retrieved documents.
    pub fn rank(&self) -> i64 {
        self.score + self.reply_count
    }

    /// Engagement score carried by candidates: replies weigh double.
    pub fn weighted(&self) -> i64 {
        self.score + 2 * self.reply_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Relevance,
    Top,
    New,
    Hot,
    Comments,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::Top => "top",
            SortOrder::New => "new",
            SortOrder::Hot => "hot",
            SortOrder::Comments => "comments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
            TimeRange::All => "all",
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reply nested under a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubDocument {
    pub id: String,
    pub body: Option<String>,
    pub engagement: Engagement,
    pub community: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
}

/// One retrieved post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    pub engagement: Engagement,
    pub community: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<SubDocument>,
}

impl Document {
    /// Body text if present and not blank.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.trim().is_empty())
    }

    /// Link-only and title-only stubs carry too little text to mine.
    /// A document passes with a title and either a body or a title longer than 15 chars.
    pub fn is_substantive(&self) -> bool {
        let title = self.title.trim();
        if title.is_empty() {
            return false;
        }
        self.body_text().is_some() || title.chars().count() > 15
    }
}

// --- Extraction ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    Title,
    Body,
    Reply,
}

impl std::fmt::Display for CandidateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateOrigin::Title => write!(f, "title"),
            CandidateOrigin::Body => write!(f, "body"),
            CandidateOrigin::Reply => write!(f, "reply"),
        }
    }
}

/// A pain-point assertion lifted from a title, body, or reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: String,
    pub content: String,
    pub origin: CandidateOrigin,
    pub engagement_score: i64,
    pub score: i64,
    pub reply_count: i64,
    pub community: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

// --- Categorization ---

/// A named, non-overlapping cluster of candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub pain_points: Vec<Candidate>,
    pub count: usize,
    pub average_engagement: i64,
    pub summary: String,
}

impl Category {
    /// Build a category; `count` and `average_engagement` come from `members`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        members: Vec<Candidate>,
    ) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            count: members.len(),
            average_engagement: average_engagement(&members),
            description: description.into(),
            pain_points: members,
            summary: String::new(),
            name,
        }
    }
}

/// Rounded mean engagement score. 0 for an empty slice.
pub fn average_engagement(members: &[Candidate]) -> i64 {
    if members.is_empty() {
        return 0;
    }
    let total: i64 = members.iter().map(|c| c.engagement_score).sum();
    (total as f64 / members.len() as f64).round() as i64
}

/// Lowercase, ASCII-alphanumeric slug with single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("category");
    }
    slug
}

// --- Result ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub search_term: String,
    pub analyzed_at: DateTime<Utc>,
    pub categories: Vec<Category>,
    pub top_categories: Vec<Category>,
    pub total_pain_points: usize,
    pub total_posts_analyzed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    /// Assemble the final result. `categories` keeps its order; the top list is
    /// sorted by member count, descending.
    pub fn assemble(
        run_id: Uuid,
        search_term: &str,
        categories: Vec<Category>,
        total_pain_points: usize,
        total_posts_analyzed: usize,
    ) -> Self {
        let mut top_categories = categories.clone();
        top_categories.sort_by(|a, b| b.count.cmp(&a.count));
        top_categories.truncate(TOP_CATEGORY_COUNT);

        Self {
            run_id,
            search_term: search_term.to_string(),
            analyzed_at: Utc::now(),
            categories,
            top_categories,
            total_pain_points,
            total_posts_analyzed,
            message: None,
            warnings: Vec::new(),
        }
    }

    /// Retrieval found nothing at all.
    pub fn no_posts(run_id: Uuid, search_term: &str) -> Self {
        let mut result = Self::assemble(run_id, search_term, Vec::new(), 0, 0);
        result.message = Some(format!(
            "No posts found for \"{search_term}\". Try a broader or more common search term."
        ));
        result
    }

    /// Posts were found but none of them held a relevant pain point.
    pub fn no_pain_points(run_id: Uuid, search_term: &str, total_posts_analyzed: usize) -> Self {
        let mut result = Self::assemble(run_id, search_term, Vec::new(), 0, total_posts_analyzed);
        result.message = Some(format!(
            "Analyzed {total_posts_analyzed} posts about \"{search_term}\" but found no relevant pain points."
        ));
        result
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}
