//! # Fulltext Vault
//!
//! An encrypted per-document full-text indexing and search service.
//!
//! Documents are ingested, their text extracted, and a per-document search
//! index built and encrypted at rest. Each document persists as exactly two
//! objects in a blob store: the encrypted index and its raw encryption key.
//! At query time the service reconstructs a combined index on demand by
//! fetching, decrypting, and merging every per-document index, then runs the
//! query against the merge.
//!
//! ## Architecture
//!
//! ```text
//! upload ──▶ admission gate ──▶ extract ──▶ index ──▶ encrypt ──▶ store
//!                                                                  │
//! search ──▶ list ids ──▶ fetch + decrypt + deserialize ──▶ merge ──▶ query
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Wire and data types |
//! | [`mime`] | Supported media type set |
//! | [`admission`] | Bounded upload concurrency gate |
//! | [`extract`] | Media-type-dispatched text extraction |
//! | [`ocr`] | OCR engine boundary for image-only PDFs |
//! | [`index`] | Per-document index build, serialization, merge |
//! | [`crypto`] | Per-document envelope encryption |
//! | [`store`] | Object store gateway (S3/MinIO, in-memory) |
//! | [`pipeline`] | Upload orchestration |
//! | [`search`] | Search fan-in and result shaping |
//! | [`server`] | HTTP server |
//! | [`error`] | Error taxonomy |

pub mod admission;
pub mod config;
pub mod crypto;
pub mod error;
pub mod extract;
pub mod index;
pub mod mime;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod store;
