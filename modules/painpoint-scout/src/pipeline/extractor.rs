use std::collections::HashSet;

use tracing::info;

use painpoint_common::{Candidate, CandidateOrigin, Document, Engagement, SubDocument};

use crate::infra::util::{excerpt, prefix_key};
use crate::rules::Rulebook;

/// Candidates kept after sorting.
pub const MAX_CANDIDATES: usize = 100;

/// Leading chars compared when collapsing near-duplicates.
pub const DEDUP_PREFIX_CHARS: usize = 50;

/// Rule-based pain-point detection over titles, bodies and replies.
pub struct CandidateExtractor<'a> {
    rules: &'a Rulebook,
}

impl<'a> CandidateExtractor<'a> {
    pub fn new(rules: &'a Rulebook) -> Self {
        Self { rules }
    }

    /// Deduplicated candidates, highest engagement first, at most `MAX_CANDIDATES`.
    pub fn extract(&self, documents: &[Document]) -> Vec<Candidate> {
        let raw: Vec<Candidate> = documents
            .iter()
            .flat_map(|doc| self.from_document(doc))
            .collect();
        let found = raw.len();

        let mut seen = HashSet::new();
        let mut candidates: Vec<Candidate> = raw
            .into_iter()
            .filter(|c| seen.insert(prefix_key(&c.content, DEDUP_PREFIX_CHARS)))
            .collect();
        let unique = candidates.len();

        candidates.sort_by(|a, b| b.engagement_score.cmp(&a.engagement_score));
        candidates.truncate(MAX_CANDIDATES);

        info!(
            documents = documents.len(),
            found,
            unique,
            kept = candidates.len(),
            "Candidates extracted"
        );
        candidates
    }

    fn from_document(&self, doc: &Document) -> Vec<Candidate> {
        let mut out = Vec::new();

        if self.rules.is_complaint(&doc.title) {
            out.push(candidate(
                format!("{}_title", doc.id),
                doc.title.trim().to_string(),
                CandidateOrigin::Title,
                doc.engagement,
                doc,
            ));
        }

        if let Some(body) = doc.body_text() {
            if self.rules.is_complaint(body) {
                out.push(candidate(
                    format!("{}_body", doc.id),
                    excerpt(body),
                    CandidateOrigin::Body,
                    doc.engagement,
                    doc,
                ));
            }
        }

        for reply in &doc.replies {
            if let Some(c) = self.from_reply(doc, reply) {
                out.push(c);
            }
        }

        out
    }

    fn from_reply(&self, doc: &Document, reply: &SubDocument) -> Option<Candidate> {
        let body = reply.body.as_deref().filter(|b| !b.trim().is_empty())?;
        if !self.rules.is_complaint(body) {
            return None;
        }
        let mut c = candidate(
            format!("{}_reply_{}", doc.id, reply.id),
            excerpt(body),
            CandidateOrigin::Reply,
            reply.engagement,
            doc,
        );
        c.community = reply.community.clone();
        c.url = reply.url.clone();
        c.created_at = reply.created_at;
        Some(c)
    }
}

fn candidate(
    id: String,
    content: String,
    origin: CandidateOrigin,
    engagement: Engagement,
    doc: &Document,
) -> Candidate {
    Candidate {
        id,
        content,
        origin,
        engagement_score: engagement.weighted(),
        score: engagement.score,
        reply_count: engagement.reply_count,
        community: doc.community.clone(),
        url: doc.url.clone(),
        created_at: doc.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{doc, reply};

    fn extract(documents: &[Document]) -> Vec<Candidate> {
        let rules = Rulebook::standard();
        CandidateExtractor::new(&rules).extract(documents)
    }

    #[test]
    fn engagement_is_score_plus_twice_replies() {
        let candidates = extract(&[doc("a", "This product is terrible and broken", None, 10, 5)]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "a_title");
        assert_eq!(candidates[0].engagement_score, 20);
        assert_eq!(candidates[0].origin, CandidateOrigin::Title);
    }

    #[test]
    fn title_body_and_replies_each_yield_a_candidate() {
        let mut post = doc(
            "p",
            "Why is the new update so slow?",
            Some("Ever since last week everything lags and crashes."),
            4,
            1,
        );
        post.replies = vec![
            reply("r1", "Same here, so frustrating.", 7),
            reply("r2", "Works fine for me.", 100),
        ];

        let candidates = extract(&[post]);
        let ids: Vec<_> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["p_reply_r1", "p_title", "p_body"]);
        assert_eq!(candidates[0].url, "https://www.reddit.com/r/apps/comments/x/r1/");
    }

    #[test]
    fn non_complaints_yield_nothing() {
        assert!(extract(&[doc("a", "Look at my new desk setup everyone", None, 50, 3)]).is_empty());
    }

    #[test]
    fn long_bodies_are_collapsed_titles_kept_verbatim() {
        let body = format!("The app is broken.\n\n{}", "details ".repeat(40));
        let title = "Honestly the app is broken and I am done with it";
        let candidates = extract(&[doc("a", title, Some(&body), 1, 0)]);

        let title_c = candidates.iter().find(|c| c.origin == CandidateOrigin::Title).unwrap();
        let body_c = candidates.iter().find(|c| c.origin == CandidateOrigin::Body).unwrap();
        assert_eq!(title_c.content, title);
        assert!(body_c.content.ends_with("..."));
        assert!(!body_c.content.contains('\n'));
    }

    #[test]
    fn shared_prefix_collapses_to_first_seen() {
        let prefix = "I hate how this app handles notifications because it ";
        let first = doc("a", &format!("{prefix}spams me"), None, 1, 0);
        let second = doc("b", &format!("{prefix}never shows anything"), None, 99, 0);

        let candidates = extract(&[first, second]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "a_title");
    }

    #[test]
    fn output_is_capped_and_sorted() {
        let documents: Vec<_> = (0..150)
            .map(|i| doc(&format!("d{i}"), &format!("Issue {i}: the app is broken again"), None, i, 0))
            .collect();
        let candidates = extract(&documents);
        assert_eq!(candidates.len(), MAX_CANDIDATES);
        assert!(candidates
            .windows(2)
            .all(|w| w[0].engagement_score >= w[1].engagement_score));
        assert_eq!(candidates[0].id, "d149_title");
    }

    #[test]
    fn extraction_is_idempotent() {
        let documents = vec![
            doc("a", "Terrible battery life on this phone", None, 3, 2),
            doc("b", "Terrible battery life on this phone!!", None, 1, 0),
            doc("c", "Why does sync keep failing?", Some("It is broken."), 8, 0),
        ];
        let first: Vec<_> = extract(&documents).into_iter().map(|c| c.id).collect();
        let second: Vec<_> = extract(&documents).into_iter().map(|c| c.id).collect();
        assert_eq!(first, second);
    }
}
