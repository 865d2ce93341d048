// Shared helpers for the pipeline stages.

use std::future::Future;
use std::time::Duration;

use painpoint_common::{PainPointError, Result};

/// Body and reply excerpts longer than this are collapsed and cut.
pub const CONTENT_CHAR_BUDGET: usize = 200;

/// Run one external call under a deadline. A timeout is an ordinary failure.
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PainPointError::Timeout(limit.as_secs())),
    }
}

/// Collapse newlines to spaces and cut to `CONTENT_CHAR_BUDGET` chars with an ellipsis.
/// Short text is returned unchanged. The ellipsis is only added when something was cut.
pub fn excerpt(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= CONTENT_CHAR_BUDGET {
        return text.to_string();
    }
    let collapsed: String = text
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.chars().count() <= CONTENT_CHAR_BUDGET {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(CONTENT_CHAR_BUDGET).collect();
    format!("{}...", cut.trim_end())
}

/// First `n` chars, lowercased. Used as the near-duplicate key.
pub fn prefix_key(text: &str, n: usize) -> String {
    text.chars().take(n).collect::<String>().to_lowercase()
}
