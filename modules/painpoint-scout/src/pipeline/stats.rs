use painpoint_common::PainPointError;

/// Recovered failures from one fan-out. Filled only at join points.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Failures {
    pub count: usize,
    pub rate_limited: usize,
    pub rate_limited_service: Option<String>,
    pub retry_after_secs: Option<u64>,
    pub credentials: Option<String>,
}

impl Failures {
    pub fn record(&mut self, err: &PainPointError) {
        self.count += 1;
        match err {
            PainPointError::RateLimited {
                service,
                retry_after_secs,
            } => {
                self.rate_limited += 1;
                if self.rate_limited_service.is_none() {
                    self.rate_limited_service = Some(service.clone());
                }
                self.retry_after_secs = self.retry_after_secs.max(*retry_after_secs);
            }
            PainPointError::Config(message) => {
                self.credentials.get_or_insert_with(|| message.clone());
            }
            _ => {}
        }
    }

    pub fn absorb(&mut self, other: Failures) {
        self.count += other.count;
        self.rate_limited += other.rate_limited;
        if self.rate_limited_service.is_none() {
            self.rate_limited_service = other.rate_limited_service;
        }
        self.retry_after_secs = self.retry_after_secs.max(other.retry_after_secs);
        if self.credentials.is_none() {
            self.credentials = other.credentials;
        }
    }

    pub fn hit_rate_limit(&self) -> bool {
        self.rate_limited > 0
    }

    /// Retry-later error to hand the caller when a rate limit starved the run.
    pub fn rate_limit_error(&self) -> Option<PainPointError> {
        self.hit_rate_limit().then(|| PainPointError::RateLimited {
            service: self
                .rate_limited_service
                .clone()
                .unwrap_or_else(|| "upstream".to_string()),
            retry_after_secs: self.retry_after_secs,
        })
    }

    /// User-facing note when results were produced despite rate limiting.
    pub fn rate_limit_warning(&self, stage: &str) -> Option<String> {
        self.hit_rate_limit().then(|| {
            format!(
                "{} {stage} call(s) were rate limited; results may be incomplete. Retry later for fuller coverage.",
                self.rate_limited
            )
        })
    }
}

/// Stats from one analysis run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub queries_run: usize,
    pub queries_failed: usize,
    pub documents_retrieved: usize,
    pub replies_fetched: usize,
    pub candidates_extracted: usize,
    pub candidates_relevant: usize,
    pub relevance_fallback_batches: usize,
    pub candidates_gated: usize,
    pub gate_relaxed: bool,
    pub categories: usize,
    pub categorizer_fallback: bool,
    pub summary_fallbacks: usize,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Analysis Complete ===")?;
        writeln!(f, "Queries run:        {}", self.queries_run)?;
        writeln!(f, "Queries failed:     {}", self.queries_failed)?;
        writeln!(f, "Documents:          {}", self.documents_retrieved)?;
        writeln!(f, "Replies fetched:    {}", self.replies_fetched)?;
        writeln!(f, "Candidates found:   {}", self.candidates_extracted)?;
        writeln!(
            f,
            "Relevant:           {} ({} batch(es) passed through)",
            self.candidates_relevant, self.relevance_fallback_batches
        )?;
        writeln!(
            f,
            "After gate:         {}{}",
            self.candidates_gated,
            if self.gate_relaxed { " (relaxed)" } else { "" }
        )?;
        writeln!(
            f,
            "Categories:         {}{}",
            self.categories,
            if self.categorizer_fallback {
                " (keyword fallback)"
            } else {
                ""
            }
        )?;
        write!(f, "Summary fallbacks:  {}", self.summary_fallbacks)
    }
}
