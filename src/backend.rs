//! The seam between the resolver and the search service.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{ResolverError, Result};
use crate::types::SearchResponse;

/// Boxed future returned by [`SearchBackend::search`].
pub type SearchFuture<'a> = Pin<Box<dyn Future<Output = Result<SearchResponse>> + Send + 'a>>;

/// A service that can run a ranked title search.
pub trait SearchBackend: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Return up to `rows` ranked hits for `title`.
    ///
    /// Zero hits is a successful, empty response. Errors are for failures to
    /// obtain a response at all.
    fn search<'a>(&'a self, title: &'a str, rows: u32) -> SearchFuture<'a>;
}

/// A configurable mock response for [`MockBackend`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return these hits.
    Hits(SearchResponse),
    /// Simulate a timeout.
    Timeout,
    /// Simulate an HTTP error status.
    Status(u16),
    /// Simulate a 429 with an optional Retry-After.
    RateLimited { retry_after: Option<Duration> },
    /// Simulate an unparseable body.
    Malformed,
}

impl MockResponse {
    fn into_result(self) -> Result<SearchResponse> {
        match self {
            MockResponse::Hits(resp) => Ok(resp),
            MockResponse::Timeout => Err(ResolverError::Timeout(Duration::from_secs(20))),
            MockResponse::Status(status) => Err(ResolverError::Api {
                status,
                message: format!("mock status {}", status),
            }),
            MockResponse::RateLimited { retry_after } => {
                Err(ResolverError::RateLimited { retry_after })
            }
            MockResponse::Malformed => Err(ResolverError::Parse("mock malformed body".into())),
        }
    }
}

type Route = (String, Vec<MockResponse>);

/// A hand-rolled in-memory [`SearchBackend`] for tests and dry runs.
///
/// Responses are routed by exact title. Each route holds a sequence that is
/// consumed one call at a time, repeating the last entry once exhausted.
/// Unrouted titles get the fallback (zero hits unless overridden).
pub struct MockBackend {
    routes: Mutex<Vec<Route>>,
    fallback: MockResponse,
    delays: Vec<(String, Duration)>,
    call_count: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// A backend that answers every title with zero hits.
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            fallback: MockResponse::Hits(SearchResponse::default()),
            delays: Vec::new(),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Answer `title` with `response` on every call.
    pub fn route(self, title: impl Into<String>, response: MockResponse) -> Self {
        self.route_sequence(title, vec![response])
    }

    /// Answer `title` with `responses` in order, repeating the last one.
    pub fn route_sequence(self, title: impl Into<String>, mut responses: Vec<MockResponse>) -> Self {
        if responses.is_empty() {
            return self;
        }
        responses.reverse();
        if let Ok(mut routes) = self.routes.lock() {
            routes.push((title.into(), responses));
        }
        self
    }

    /// Response for titles without a route.
    pub fn with_fallback(mut self, response: MockResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Simulated latency for one title.
    pub fn with_delay(mut self, title: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((title.into(), delay));
        self
    }

    /// How many times `search()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self, title: &str) -> MockResponse {
        let Ok(mut routes) = self.routes.lock() else {
            return self.fallback.clone();
        };
        match routes.iter_mut().find(|(t, _)| t == title) {
            Some((_, seq)) if seq.len() > 1 => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Some((_, seq)) => seq.last().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

impl SearchBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn search<'a>(&'a self, title: &'a str, _rows: u32) -> SearchFuture<'a> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response(title);
        let delay = self
            .delays
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, d)| *d);

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            response.into_result()
        })
    }
}
