//! Error taxonomy for the upload and search pipelines.
//!
//! Validation errors (`UnsupportedType`) are raised before any resource is
//! acquired and surface as client errors. `CapacityExceeded` is distinct so
//! callers can retry later. Everything else in the upload chain is wrapped
//! into a single processing-failure category with the originating cause
//! attached; the search chain only fails hard when merge or query execution
//! itself fails.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::extract::ExtractError;
use crate::index::IndexError;
use crate::store::StoreError;

/// Failures of one document upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Maximum number of parallel requests reached. Please try again later.")]
    CapacityExceeded,

    #[error("Failed to process document: {0}")]
    Processing(#[from] ProcessingError),
}

/// Cause of a processing failure inside the upload pipeline. Any stage
/// failing aborts the whole upload; the admission permit is still released.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("text extraction failed")]
    Extract(#[from] ExtractError),

    #[error("index construction failed")]
    Index(#[from] IndexError),

    #[error("index encryption failed")]
    Encrypt(#[from] CryptoError),

    #[error("storing document artifacts failed")]
    Store(#[from] StoreError),

    #[error("processing task aborted")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Hard failures of the search pipeline. Per-document load failures are not
/// represented here — they are logged and skipped during fan-in.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to parse search query: {0}")]
    Query(#[from] tantivy::query::QueryParserError),

    #[error("failed to merge document indexes")]
    Merge(#[source] IndexError),

    #[error("search execution failed")]
    Execute(#[source] tantivy::TantivyError),
}
