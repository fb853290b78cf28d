//! Object store gateway.
//!
//! Persists two objects per document — the encrypted index and its raw
//! encryption key — under a deterministic naming scheme, and discovers the
//! document-id set purely by listing. There is no manifest or catalog object.
//!
//! [`S3ObjectStore`] speaks the S3 REST API with AWS Signature V4
//! authentication using only pure-Rust dependencies (`hmac`, `sha2`) — no C
//! library dependencies — and supports custom endpoints for S3-compatible
//! services (MinIO, LocalStack) with path-style addressing.
//! [`MemoryObjectStore`] backs tests and local experiments.
//!
//! Credentials are read from environment variables:
//! - `AWS_ACCESS_KEY_ID` — required
//! - `AWS_SECRET_ACCESS_KEY` — required
//! - `AWS_SESSION_TOKEN` — optional (temporary credentials / IAM roles)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info};

type HmacSha256 = Hmac<Sha256>;

/// Object name prefix/suffix for encrypted index blobs.
const INDEX_PREFIX: &str = "index-";
const INDEX_SUFFIX: &str = ".enc";

/// Object name prefix/suffix for encryption key blobs.
const KEY_PREFIX: &str = "key-";
const KEY_SUFFIX: &str = ".bin";

/// Content type for persisted blobs.
const OCTET_STREAM: &str = "application/octet-stream";

/// Errors from object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object {0} not found")]
    NotFound(String),

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned HTTP {status} for {operation} {name}")]
    UnexpectedStatus {
        operation: &'static str,
        name: String,
        status: u16,
    },

    #[error("{0} environment variable not set")]
    Credentials(&'static str),
}

/// Minimal blob-store boundary consumed by the pipeline and search path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether the configured bucket exists.
    async fn bucket_exists(&self) -> Result<bool, StoreError>;

    /// Create the configured bucket.
    async fn create_bucket(&self) -> Result<(), StoreError>;

    /// Store an object, replacing any previous content.
    async fn put(&self, name: &str, data: &[u8], content_type: &str) -> Result<(), StoreError>;

    /// Fetch an object's full content.
    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// List object names starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Gateway: naming scheme over any ObjectStore
// ═══════════════════════════════════════════════════════════════════════

/// Naming convention and per-document persistence over an [`ObjectStore`].
#[derive(Clone)]
pub struct StorageGateway {
    store: Arc<dyn ObjectStore>,
}

impl StorageGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn index_object_name(document_id: &str) -> String {
        format!("{INDEX_PREFIX}{document_id}{INDEX_SUFFIX}")
    }

    fn key_object_name(document_id: &str) -> String {
        format!("{KEY_PREFIX}{document_id}{KEY_SUFFIX}")
    }

    /// Create the bucket if it is missing. Failures are logged, not fatal:
    /// a store that comes up later still serves uploads.
    pub async fn ensure_bucket(&self) {
        match self.store.bucket_exists().await {
            Ok(true) => {}
            Ok(false) => {
                info!("bucket missing, creating it");
                if let Err(e) = self.store.create_bucket().await {
                    error!(error = %e, "failed to create bucket");
                }
            }
            Err(e) => error!(error = %e, "failed to check bucket existence"),
        }
    }

    pub async fn upload_index(&self, document_id: &str, data: &[u8]) -> Result<(), StoreError> {
        let name = Self::index_object_name(document_id);
        self.store.put(&name, data, OCTET_STREAM).await?;
        debug!(document_id, "uploaded encrypted index");
        Ok(())
    }

    pub async fn upload_key(&self, document_id: &str, key: &[u8]) -> Result<(), StoreError> {
        let name = Self::key_object_name(document_id);
        self.store.put(&name, key, OCTET_STREAM).await?;
        debug!(document_id, "uploaded encryption key");
        Ok(())
    }

    pub async fn download_index(&self, document_id: &str) -> Result<Vec<u8>, StoreError> {
        self.store
            .get(&Self::index_object_name(document_id))
            .await
    }

    pub async fn download_key(&self, document_id: &str) -> Result<Vec<u8>, StoreError> {
        self.store.get(&Self::key_object_name(document_id)).await
    }

    /// Discover all known document ids by listing index objects and
    /// stripping the fixed prefix/suffix. Listing failures are logged and
    /// yield an empty set so a search degrades to "no documents".
    pub async fn list_document_ids(&self) -> Vec<String> {
        match self.store.list(INDEX_PREFIX).await {
            Ok(names) => names
                .iter()
                .filter_map(|name| {
                    name.strip_prefix(INDEX_PREFIX)
                        .and_then(|rest| rest.strip_suffix(INDEX_SUFFIX))
                        .map(str::to_string)
                })
                .collect(),
            Err(e) => {
                error!(error = %e, "failed to list document ids");
                Vec::new()
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// In-memory store
// ═══════════════════════════════════════════════════════════════════════

/// In-memory [`ObjectStore`] for tests and local runs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    bucket_created: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            bucket_created: AtomicBool::new(false),
        }
    }

    /// Drop an object, simulating out-of-band loss or corruption of stored
    /// data. Not part of the [`ObjectStore`] boundary — the service itself
    /// has no delete path.
    pub fn remove(&self, name: &str) -> bool {
        self.objects.write().unwrap().remove(name).is_some()
    }

    /// Overwrite an object's raw bytes directly.
    pub fn corrupt(&self, name: &str, data: Vec<u8>) {
        self.objects.write().unwrap().insert(name.to_string(), data);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self) -> Result<bool, StoreError> {
        Ok(self.bucket_created.load(Ordering::SeqCst))
    }

    async fn create_bucket(&self) -> Result<(), StoreError> {
        self.bucket_created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn put(&self, name: &str, data: &[u8], _content_type: &str) -> Result<(), StoreError> {
        self.objects
            .write()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .objects
            .read()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// S3-compatible store with SigV4 signing
// ═══════════════════════════════════════════════════════════════════════

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self, StoreError> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| StoreError::Credentials("AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| StoreError::Credentials("AWS_SECRET_ACCESS_KEY"))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// S3 REST API client for one bucket.
///
/// With a custom `endpoint_url` (MinIO, LocalStack) requests use path-style
/// addressing (`/{bucket}/{key}`); against AWS proper they use the standard
/// virtual-hosted style (`{bucket}.s3.{region}.amazonaws.com`).
pub struct S3ObjectStore {
    client: reqwest::Client,
    credentials: AwsCredentials,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3ObjectStore {
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            client: reqwest::Client::new(),
            credentials: AwsCredentials::from_env()?,
            bucket,
            region,
            endpoint_url,
        })
    }

    /// Scheme, host, and the path prefix objects live under.
    fn endpoint_parts(&self) -> (&'static str, String, String) {
        if let Some(ref endpoint) = self.endpoint_url {
            let scheme = if endpoint.starts_with("http://") {
                "http"
            } else {
                "https"
            };
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string();
            (scheme, host, format!("/{}", self.bucket))
        } else {
            (
                "https",
                format!("{}.s3.{}.amazonaws.com", self.bucket, self.region),
                String::new(),
            )
        }
    }

    /// Issue one signed request and return the response. The content type,
    /// when present, travels as an unsigned header.
    async fn signed_request(
        &self,
        method: reqwest::Method,
        canonical_uri: &str,
        query_params: &[(String, String)],
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, StoreError> {
        let (scheme, host, _) = self.endpoint_parts();

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        // Canonical query string must be sorted.
        let mut sorted_params = query_params.to_vec();
        sorted_params.sort_by(|a, b| a.0.cmp(&b.0));
        let canonical_querystring: String = sorted_params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let payload_hash = hex_sha256(&body);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_querystring,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.credentials.secret_access_key,
            &date_stamp,
            &self.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.credentials.access_key_id, credential_scope, signed_headers, signature
        );

        let mut url = format!("{}://{}{}", scheme, host, canonical_uri);
        if !canonical_querystring.is_empty() {
            url.push('?');
            url.push_str(&canonical_querystring);
        }

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);
        if let Some(ref token) = self.credentials.session_token {
            request = request.header("x-amz-security-token", token);
        }
        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        Ok(request.send().await?)
    }

    fn object_uri(&self, name: &str) -> String {
        let (_, _, base_path) = self.endpoint_parts();
        let encoded = name.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        format!("{}/{}", base_path, encoded)
    }

    fn bucket_uri(&self) -> String {
        let (_, _, base_path) = self.endpoint_parts();
        if base_path.is_empty() {
            "/".to_string()
        } else {
            base_path
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self) -> Result<bool, StoreError> {
        let response = self
            .signed_request(reqwest::Method::HEAD, &self.bucket_uri(), &[], Vec::new(), None)
            .await?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(StoreError::UnexpectedStatus {
                operation: "HeadBucket",
                name: self.bucket.clone(),
                status,
            }),
        }
    }

    async fn create_bucket(&self) -> Result<(), StoreError> {
        let response = self
            .signed_request(reqwest::Method::PUT, &self.bucket_uri(), &[], Vec::new(), None)
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::UnexpectedStatus {
                operation: "CreateBucket",
                name: self.bucket.clone(),
                status: response.status().as_u16(),
            })
        }
    }

    async fn put(&self, name: &str, data: &[u8], content_type: &str) -> Result<(), StoreError> {
        let response = self
            .signed_request(
                reqwest::Method::PUT,
                &self.object_uri(name),
                &[],
                data.to_vec(),
                Some(content_type),
            )
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::UnexpectedStatus {
                operation: "PutObject",
                name: name.to_string(),
                status: response.status().as_u16(),
            })
        }
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .signed_request(reqwest::Method::GET, &self.object_uri(name), &[], Vec::new(), None)
            .await?;
        match response.status().as_u16() {
            200 => Ok(response.bytes().await?.to_vec()),
            404 => Err(StoreError::NotFound(name.to_string())),
            status => Err(StoreError::UnexpectedStatus {
                operation: "GetObject",
                name: name.to_string(),
                status,
            }),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut continuation_token: Option<String> = None;

        // ListObjectsV2 with max-keys=1000 per page; follow the continuation
        // token until the listing is complete.
        loop {
            let mut query_params = vec![
                ("list-type".to_string(), "2".to_string()),
                ("max-keys".to_string(), "1000".to_string()),
                ("prefix".to_string(), prefix.to_string()),
            ];
            if let Some(ref token) = continuation_token {
                query_params.push(("continuation-token".to_string(), token.clone()));
            }

            let response = self
                .signed_request(
                    reqwest::Method::GET,
                    &self.bucket_uri(),
                    &query_params,
                    Vec::new(),
                    None,
                )
                .await?;
            if !response.status().is_success() {
                return Err(StoreError::UnexpectedStatus {
                    operation: "ListObjectsV2",
                    name: self.bucket.clone(),
                    status: response.status().as_u16(),
                });
            }

            let xml_body = response.text().await?;
            let (batch, is_truncated, next_token) = parse_list_objects_response(&xml_body);
            names.extend(batch);

            if is_truncated {
                continuation_token = next_token;
            } else {
                break;
            }
        }

        Ok(names)
    }
}

// ============ AWS SigV4 helpers ============

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute hex-encoded HMAC-SHA256.
fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986 (used in SigV4 canonical requests).
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

// ============ XML parsing (minimal, no extra deps) ============

/// Parse a `ListObjectsV2` XML response into object keys, plus whether the
/// listing is truncated and the next continuation token for pagination.
fn parse_list_objects_response(xml: &str) -> (Vec<String>, bool, Option<String>) {
    let mut keys = Vec::new();
    let is_truncated = extract_xml_value(xml, "IsTruncated")
        .map(|v| v == "true")
        .unwrap_or(false);
    let next_token = extract_xml_value(xml, "NextContinuationToken");

    let mut remaining = xml;
    while let Some(start) = remaining.find("<Contents>") {
        let block_start = start + "<Contents>".len();
        if let Some(end) = remaining[block_start..].find("</Contents>") {
            let block = &remaining[block_start..block_start + end];
            if let Some(key) = extract_xml_value(block, "Key") {
                if !key.is_empty() && !key.ends_with('/') {
                    keys.push(key);
                }
            }
            remaining = &remaining[block_start + end + "</Contents>".len()..];
        } else {
            break;
        }
    }

    (keys, is_truncated, next_token)
}

/// Extract the text content of an XML tag (simple, non-nested).
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    if let Some(start) = xml.find(&open) {
        let value_start = start + open.len();
        if let Some(end) = xml[value_start..].find(&close) {
            return Some(xml[value_start..value_start + end].to_string());
        }
    }
    None
}
