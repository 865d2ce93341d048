pub mod error;
pub mod types;

pub use error::{RedditError, Result};
pub use types::{Listing, RedditComment, RedditPost, SubredditInfo};

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use types::AccessTokenResponse;

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_URL: &str = "https://oauth.reddit.com";

/// Reddit caps listing pages at 100 items.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Refresh the token this long before Reddit says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    api_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditClient {
    pub fn new(client_id: String, client_secret: String, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| RedditError::Network(e.to_string()))?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            auth_url: AUTH_URL.to_string(),
            api_url: API_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Point the client at a different host pair (used against local fakes).
    pub fn with_base_urls(mut self, auth_url: &str, api_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Return a valid app-only bearer token, fetching a new one when the cached one is stale.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Requesting Reddit access token");
        let resp = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(resp.headers()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RedditError::Auth(format!("status {}: {}", status.as_u16(), body)));
        }

        let token: AccessTokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_url, path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(query)
            .query(&[("raw_json", "1")])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(resp.headers()));
        }
        if status == StatusCode::UNAUTHORIZED {
            // Force a fresh token on the next call.
            *self.token.lock().await = None;
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RedditError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Search all of Reddit for link posts.
    pub async fn search(
        &self,
        query: &str,
        sort: &str,
        time_range: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>> {
        tracing::debug!(query, sort, time_range, limit, "Reddit global search");
        let listing: Listing<RedditPost> = self
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("sort", sort.to_string()),
                    ("t", time_range.to_string()),
                    ("limit", page_size(limit)),
                    ("type", "link".to_string()),
                ],
            )
            .await?;
        Ok(listing.into_items())
    }

    /// Search within one subreddit.
    pub async fn search_subreddit(
        &self,
        subreddit: &str,
        query: &str,
        sort: &str,
        time_range: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>> {
        tracing::debug!(subreddit, query, sort, time_range, limit, "Reddit subreddit search");
        let path = format!("/r/{}/search", subreddit.trim_start_matches("r/"));
        let listing: Listing<RedditPost> = self
            .get_json(
                &path,
                &[
                    ("q", query.to_string()),
                    ("restrict_sr", "on".to_string()),
                    ("sort", sort.to_string()),
                    ("t", time_range.to_string()),
                    ("limit", page_size(limit)),
                ],
            )
            .await?;
        Ok(listing.into_items())
    }

    /// Look up subreddits whose name or description matches `query`.
    pub async fn search_subreddits(&self, query: &str, limit: u32) -> Result<Vec<SubredditInfo>> {
        let listing: Listing<SubredditInfo> = self
            .get_json(
                "/subreddits/search",
                &[("q", query.to_string()), ("limit", page_size(limit))],
            )
            .await?;
        Ok(listing.into_items())
    }

    /// Fetch top-level comments for a post. Returns only live `t1` comments.
    pub async fn comments(&self, post_id: &str, limit: u32) -> Result<Vec<RedditComment>> {
        let path = format!("/comments/{post_id}");
        // The endpoint returns `[post_listing, comment_listing]`.
        let listings: Vec<Listing<serde_json::Value>> = self
            .get_json(
                &path,
                &[
                    ("limit", page_size(limit)),
                    ("depth", "2".to_string()),
                    ("sort", "top".to_string()),
                ],
            )
            .await?;

        let Some(comment_listing) = listings.into_iter().nth(1) else {
            return Ok(Vec::new());
        };

        let mut comments = Vec::new();
        for thing in comment_listing.data.children {
            if thing.kind != "t1" {
                continue;
            }
            let comment: RedditComment = serde_json::from_value(thing.data)?;
            if !comment.is_removed() {
                comments.push(comment);
            }
        }
        tracing::debug!(post_id, count = comments.len(), "Fetched Reddit comments");
        Ok(comments)
    }
}

fn page_size(limit: u32) -> String {
    limit.clamp(1, MAX_PAGE_SIZE).to_string()
}

/// Reddit reports seconds until the window resets in `x-ratelimit-reset`.
fn rate_limited(headers: &HeaderMap) -> RedditError {
    let retry_after_secs = ["x-ratelimit-reset", "retry-after"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| secs.ceil() as u64);
    RedditError::RateLimited { retry_after_secs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(page_size(0), "1");
        assert_eq!(page_size(25), "25");
        assert_eq!(page_size(500), "100");
    }

    #[test]
    fn rate_limit_reads_reset_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("41.5"));
        match rate_limited(&headers) {
            RedditError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, Some(42)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rate_limit_without_headers() {
        match rate_limited(&HeaderMap::new()) {
            RedditError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, None),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn base_urls_are_normalized() {
        let client = RedditClient::new("id".into(), "secret".into(), "test-agent")
            .unwrap()
            .with_base_urls("http://localhost:1/token", "http://localhost:1/");
        assert_eq!(client.api_url, "http://localhost:1");
    }
}
