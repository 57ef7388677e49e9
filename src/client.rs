//! The Crossref works API client.

use crate::backend::{SearchBackend, SearchFuture};
use crate::config::Config;
use crate::error::{ResolverError, Result};
use crate::parse::parse_search_response;
use crate::types::SearchResponse;
use reqwest::Client;
use std::time::Duration;

/// Async client for the Crossref works search endpoint.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> crossref_ris::error::Result<()> {
/// use crossref_ris::{Config, CrossrefClient};
///
/// let client = CrossrefClient::new(&Config::default())?;
/// let results = client.search_works("Attention is all you need", 5).await?;
/// for hit in &results.items {
///     println!("{:?}", hit.titles());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CrossrefClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) user_agent: String,
    pub(crate) mailto: Option<String>,
}

impl CrossrefClient {
    /// Create a client for the endpoint, contact address and timeout in `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            user_agent: config.user_agent(),
            mailto: config.mailto.clone(),
        })
    }

    /// Override the base URL (useful for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Build the search URL for a title.
    pub fn search_url(&self, title: &str, rows: u32) -> Result<url::Url> {
        let rows = rows.to_string();
        let mut params = vec![("query", title), ("rows", rows.as_str())];
        if let Some(mailto) = self.mailto.as_deref() {
            params.push(("mailto", mailto));
        }
        url::Url::parse_with_params(&self.base_url, &params)
            .map_err(|e| ResolverError::Config(format!("invalid base URL {}: {}", self.base_url, e)))
    }

    /// Search works by free-text title, returning up to `rows` ranked hits.
    pub async fn search_works(&self, title: &str, rows: u32) -> Result<SearchResponse> {
        let url = self.search_url(title, rows)?;
        let body = self.get(url).await?;
        parse_search_response(&body)
    }

    /// Make a GET request to the API.
    pub(crate) async fn get(&self, url: url::Url) -> Result<String> {
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        handle_response(response).await
    }
}

impl SearchBackend for CrossrefClient {
    fn name(&self) -> &str {
        "Crossref"
    }

    fn search<'a>(&'a self, title: &'a str, rows: u32) -> SearchFuture<'a> {
        Box::pin(self.search_works(title, rows))
    }
}

/// Handle the HTTP response, mapping status codes to errors.
async fn handle_response(response: reqwest::Response) -> Result<String> {
    let status = response.status().as_u16();

    match status {
        200..=299 => Ok(response.text().await?),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(ResolverError::RateLimited { retry_after })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ResolverError::Api {
                status,
                message: body,
            })
        }
    }
}
