//! Title resolution: search, retry, and pick the authoritative hit.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::SearchBackend;
use crate::config::Config;
use crate::error::{ResolverError, Result};
use crate::skip::SkipPatterns;
use crate::types::{Candidate, SearchResponse};

/// Exponential backoff before retry number `attempt + 1`: `min(2^attempt, cap)` seconds.
pub fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(cap)
}

/// Wait before the next attempt after `error`, honouring any server-requested delay.
pub fn retry_delay(error: &ResolverError, attempt: u32, cap: Duration) -> Duration {
    let backoff = backoff_delay(attempt, cap);
    match error.retry_after() {
        Some(server) => server.max(backoff).min(cap),
        None => backoff,
    }
}

/// Index of the hit to use: the first non-special one, else rank 0.
///
/// `None` only when there are no hits at all.
pub fn choose_candidate(items: &[Candidate], patterns: &SkipPatterns) -> Option<usize> {
    if items.is_empty() {
        return None;
    }
    Some(
        items
            .iter()
            .position(|c| !patterns.is_special(c))
            .unwrap_or(0),
    )
}

/// Resolves titles to search hits through a [`SearchBackend`].
#[derive(Clone)]
pub struct Resolver {
    backend: Arc<dyn SearchBackend>,
    patterns: SkipPatterns,
    rows: u32,
    max_retries: u32,
    timeout: Duration,
    max_backoff: Duration,
}

impl Resolver {
    pub fn new(backend: Arc<dyn SearchBackend>, config: &Config) -> Self {
        Self {
            backend,
            patterns: config.skip_patterns.clone(),
            rows: config.rows,
            max_retries: config.max_retries.max(1),
            timeout: config.timeout,
            max_backoff: config.max_backoff,
        }
    }

    pub fn patterns(&self) -> &SkipPatterns {
        &self.patterns
    }

    /// Resolve a title to its best hit.
    ///
    /// `Ok(None)` means the search succeeded with zero hits. Transient
    /// failures are retried with exponential backoff; once `max_retries`
    /// attempts have failed the last error is returned inside
    /// [`ResolverError::RetriesExhausted`]. Permanent failures are returned
    /// immediately.
    pub async fn resolve(&self, title: &str) -> Result<Option<Candidate>> {
        let response = self.search_with_retry(title).await?;
        if response.is_empty() {
            info!(title, "no results");
            return Ok(None);
        }

        let Some(index) = choose_candidate(&response.items, &self.patterns) else {
            return Ok(None);
        };
        if index > 0 {
            debug!(title, skipped = index, "skipped non-article hits");
        } else if self.patterns.is_special(&response.items[0]) {
            warn!(
                title,
                doi = response.items[0].doi().unwrap_or("-"),
                "every hit looks like a non-article entry; using the top hit"
            );
        }
        Ok(response.items.into_iter().nth(index))
    }

    async fn search_with_retry(&self, title: &str) -> Result<SearchResponse> {
        let mut attempt = 0;
        loop {
            debug!(
                title,
                backend = self.backend.name(),
                attempt = attempt + 1,
                max = self.max_retries,
                "searching"
            );
            let outcome =
                match tokio::time::timeout(self.timeout, self.backend.search(title, self.rows))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ResolverError::Timeout(self.timeout)),
                };

            let error = match outcome {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= self.max_retries {
                warn!(title, attempts = attempt, error = %error, "giving up");
                return Err(ResolverError::RetriesExhausted {
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }

            let wait = retry_delay(&error, attempt - 1, self.max_backoff);
            warn!(
                title,
                attempt,
                wait_secs = wait.as_secs_f64(),
                error = %error,
                "transient failure, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
