use tracing::info;

use painpoint_common::Candidate;

/// Keep candidates whose engagement score reaches `min_score`.
pub fn filter(candidates: &[Candidate], min_score: i64) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| c.engagement_score >= min_score)
        .cloned()
        .collect()
}

/// Apply the threshold, but never let a non-empty pool collapse to nothing:
/// if nothing passes, the unfiltered set is used. Returns whether it relaxed.
pub fn gate(candidates: Vec<Candidate>, min_score: i64) -> (Vec<Candidate>, bool) {
    let passed = filter(&candidates, min_score);
    if passed.is_empty() && !candidates.is_empty() {
        info!(
            min_score,
            candidates = candidates.len(),
            "No candidate met the engagement threshold, keeping all"
        );
        return (candidates, true);
    }
    info!(min_score, before = candidates.len(), after = passed.len(), "Engagement gate applied");
    (passed, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candidate;

    #[test]
    fn threshold_is_inclusive() {
        let pool = vec![candidate("a", "x", 1), candidate("b", "y", 2), candidate("c", "z", 3)];
        let ids: Vec<_> = filter(&pool, 2).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn gate_relaxes_instead_of_emptying() {
        let pool = vec![candidate("a", "x", 0), candidate("b", "y", 1)];
        let (kept, relaxed) = gate(pool.clone(), 2);
        assert!(relaxed);
        assert_eq!(kept, pool);
    }

    #[test]
    fn gate_filters_normally_when_something_passes() {
        let pool = vec![candidate("a", "x", 0), candidate("b", "y", 5)];
        let (kept, relaxed) = gate(pool, 2);
        assert!(!relaxed);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn empty_stays_empty() {
        let (kept, relaxed) = gate(Vec::new(), 2);
        assert!(kept.is_empty());
        assert!(!relaxed);
    }
}
