//! Search API response parsing.

use crate::error::ResolverError;
use crate::types::{Candidate, SearchResponse};
use serde::Deserialize;

/// Works search response wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct WorksApiResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub message: WorksApiMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorksApiMessage {
    #[serde(rename = "total-results", default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

/// Parse a works search JSON response into a [`SearchResponse`].
///
/// Items are kept as raw JSON; a missing `total-results` is taken to be the
/// number of returned items.
pub fn parse_search_response(json: &str) -> crate::error::Result<SearchResponse> {
    let response: WorksApiResponse = serde_json::from_str(json)
        .map_err(|e| ResolverError::Parse(format!("Invalid works JSON: {}", e)))?;

    if let Some(status) = response.status.as_deref() {
        if status != "ok" {
            return Err(ResolverError::Parse(format!(
                "Unexpected response status: {}",
                status
            )));
        }
    }

    let items: Vec<Candidate> = response
        .message
        .items
        .into_iter()
        .filter(|item| item.is_object())
        .map(Candidate::from_value)
        .collect();

    Ok(SearchResponse {
        total_results: response
            .message
            .total_results
            .unwrap_or(items.len() as u64),
        items,
    })
}
