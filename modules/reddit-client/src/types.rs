use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

// --- Listing envelope ---

/// Reddit wraps every collection in `{ "kind": "Listing", "data": { "children": [...] } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
    pub after: Option<String>,
}

/// One typed entry in a listing (`t1` comment, `t3` link, `t5` subreddit).
#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        self.data.children.into_iter().map(|c| c.data).collect()
    }
}

// --- Posts ---

/// A submission (`t3`).
#[derive(Debug, Clone, Deserialize)]
pub struct RedditPost {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    pub url: Option<String>,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub stickied: bool,
}

impl RedditPost {
    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp(self.created_utc)
    }

    pub fn permalink_url(&self) -> String {
        absolute_permalink(&self.permalink, self.url.as_deref())
    }
}

// --- Comments ---

/// A comment (`t1`). `replies` is `""` when empty and a nested listing otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditComment {
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub replies: serde_json::Value,
}

impl RedditComment {
    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp(self.created_utc)
    }

    pub fn permalink_url(&self) -> String {
        absolute_permalink(&self.permalink, None)
    }

    /// Direct replies present in the payload. Collapsed "more" stubs are not counted.
    pub fn reply_count(&self) -> i64 {
        self.replies
            .pointer("/data/children")
            .and_then(|c| c.as_array())
            .map(|children| {
                children
                    .iter()
                    .filter(|c| c.get("kind").and_then(|k| k.as_str()) == Some("t1"))
                    .count() as i64
            })
            .unwrap_or(0)
    }

    /// Deleted and removed comments keep a placeholder body.
    pub fn is_removed(&self) -> bool {
        matches!(self.body.trim(), "" | "[deleted]" | "[removed]")
    }
}

// --- Subreddits ---

/// A subreddit (`t5`) as returned by `/subreddits/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubredditInfo {
    pub display_name: String,
    #[serde(default)]
    pub subscribers: Option<i64>,
    #[serde(default)]
    pub over18: bool,
}

// --- OAuth ---

#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

fn timestamp(created_utc: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(created_utc as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn absolute_permalink(permalink: &str, fallback: Option<&str>) -> String {
    if permalink.starts_with('/') {
        format!("https://www.reddit.com{permalink}")
    } else if !permalink.is_empty() {
        permalink.to_string()
    } else {
        fallback.unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_listing() {
        let json = r#"{
            "kind": "Listing",
            "data": {
                "after": "t3_abc",
                "children": [
                    {"kind": "t3", "data": {
                        "id": "abc", "title": "Why is it so slow", "selftext": "",
                        "score": 12, "num_comments": 4, "subreddit": "software",
                        "permalink": "/r/software/comments/abc/why/",
                        "url": "https://example.com", "created_utc": 1700000000.0,
                        "author": "alice"
                    }}
                ]
            }
        }"#;
        let listing: Listing<RedditPost> = serde_json::from_str(json).unwrap();
        assert_eq!(listing.data.after.as_deref(), Some("t3_abc"));
        let posts = listing.into_items();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].num_comments, 4);
        assert_eq!(
            posts[0].permalink_url(),
            "https://www.reddit.com/r/software/comments/abc/why/"
        );
        assert_eq!(posts[0].created_at().timestamp(), 1_700_000_000);
    }

    #[test]
    fn comment_reply_count_handles_empty_string() {
        let json = r#"{"id": "c1", "body": "meh", "score": 3, "replies": ""}"#;
        let comment: RedditComment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.reply_count(), 0);
    }

    #[test]
    fn comment_reply_count_ignores_more_stubs() {
        let json = r#"{
            "id": "c1", "body": "meh", "score": 3,
            "replies": {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {"id": "c2"}},
                {"kind": "t1", "data": {"id": "c3"}},
                {"kind": "more", "data": {"count": 9}}
            ]}}
        }"#;
        let comment: RedditComment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.reply_count(), 2);
    }

    #[test]
    fn removed_comments_are_detected() {
        let json = r#"{"id": "c1", "body": "[removed]"}"#;
        let comment: RedditComment = serde_json::from_str(json).unwrap();
        assert!(comment.is_removed());
    }
}
