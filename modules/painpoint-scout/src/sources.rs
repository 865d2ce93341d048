// --- ContentSource impl for RedditClient ---

use async_trait::async_trait;
use reddit_client::{RedditClient, RedditComment, RedditError, RedditPost};

use painpoint_common::{
    Document, Engagement, PainPointError, Result, SortOrder, SubDocument, TimeRange,
};

use crate::traits::ContentSource;

/// Subreddit lookups return a handful of candidates; the aggregator caps further.
const SUBREDDIT_LOOKUP_LIMIT: u32 = 10;

fn document(post: RedditPost) -> Document {
    let url = post.permalink_url();
    let created_at = post.created_at();
    let body = Some(post.selftext).filter(|b| !b.trim().is_empty());
    Document {
        id: post.id,
        title: post.title,
        body,
        engagement: Engagement::new(post.score, post.num_comments),
        community: post.subreddit,
        url,
        created_at,
        author: post.author,
        replies: Vec::new(),
    }
}

fn sub_document(comment: RedditComment, fallback_community: &str) -> SubDocument {
    let url = comment.permalink_url();
    let created_at = comment.created_at();
    let engagement = Engagement::new(comment.score, comment.reply_count());
    let community = if comment.subreddit.is_empty() {
        fallback_community.to_string()
    } else {
        comment.subreddit
    };
    SubDocument {
        id: comment.id,
        body: Some(comment.body),
        engagement,
        community,
        url,
        created_at,
        author: comment.author,
    }
}

fn map_error(err: RedditError) -> PainPointError {
    match err {
        RedditError::RateLimited { retry_after_secs } => PainPointError::RateLimited {
            service: "reddit".to_string(),
            retry_after_secs,
        },
        RedditError::Auth(message) => PainPointError::Config(format!(
            "Reddit rejected the client credentials: {message}"
        )),
        RedditError::Parse(message) => PainPointError::Parse(message),
        other => PainPointError::Retrieval(other.to_string()),
    }
}

fn live_documents(posts: Vec<RedditPost>) -> Vec<Document> {
    posts
        .into_iter()
        .filter(|p| !p.stickied)
        .map(document)
        .collect()
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn query_global(
        &self,
        query: &str,
        sort: SortOrder,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Document>> {
        let posts = self
            .search(query, sort.as_str(), time_range.as_str(), limit)
            .await
            .map_err(map_error)?;
        Ok(live_documents(posts))
    }

    async fn query_in_community(
        &self,
        community: &str,
        query: &str,
        sort: SortOrder,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Document>> {
        let posts = self
            .search_subreddit(community, query, sort.as_str(), time_range.as_str(), limit)
            .await
            .map_err(map_error)?;
        Ok(live_documents(posts))
    }

    async fn resolve_communities(&self, term: &str) -> Result<Vec<String>> {
        let mut subreddits = self
            .search_subreddits(term, SUBREDDIT_LOOKUP_LIMIT)
            .await
            .map_err(map_error)?;
        subreddits.retain(|s| !s.over18);
        subreddits.sort_by(|a, b| b.subscribers.unwrap_or(0).cmp(&a.subscribers.unwrap_or(0)));
        Ok(subreddits.into_iter().map(|s| s.display_name).collect())
    }

    async fn fetch_replies(&self, document: &Document, limit: u32) -> Result<Vec<SubDocument>> {
        let comments = self.comments(&document.id, limit).await.map_err(map_error)?;
        Ok(comments
            .into_iter()
            .map(|c| sub_document(c, &document.community))
            .collect())
    }
}
