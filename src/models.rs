//! Wire and data models.
//!
//! These types shape the upload and search boundaries. JSON field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Returned after a successful upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub document_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub indexed: bool,
    pub message: String,
}

/// A search request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    10
}

/// The ordered result set for one search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Number of results actually returned — not the engine's unbounded
    /// match count.
    pub total_hits: u64,
    pub results: Vec<SearchResult>,
}

/// One ranked hit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document_id: String,
    pub file_name: String,
    pub score: f32,
    /// First 200 characters of the stored content, with `"..."` appended
    /// when truncated.
    pub snippet: String,
}
