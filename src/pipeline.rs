//! Document upload pipeline.
//!
//! One call processes one document end to end: validate the declared type,
//! take an admission permit, extract text, build and serialize the
//! per-document index, seal it under a fresh key, and persist both objects.
//! Any stage failing aborts the whole upload; the permit is released on
//! every exit path because it is an RAII guard.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::admission::AdmissionController;
use crate::crypto::{self, EncryptionKey};
use crate::error::{ProcessingError, UploadError};
use crate::extract;
use crate::index;
use crate::mime::SupportedMimeType;
use crate::models::UploadReceipt;
use crate::ocr::OcrEngine;
use crate::store::StorageGateway;

/// Processes uploads into encrypted, stored per-document indexes.
#[derive(Clone)]
pub struct DocumentProcessor {
    admission: AdmissionController,
    storage: StorageGateway,
    ocr: Arc<dyn OcrEngine>,
    key_size: u32,
}

impl DocumentProcessor {
    pub fn new(
        admission: AdmissionController,
        storage: StorageGateway,
        ocr: Arc<dyn OcrEngine>,
        key_size: u32,
    ) -> Self {
        Self {
            admission,
            storage,
            ocr,
            key_size,
        }
    }

    /// Process one document.
    ///
    /// The type check runs before admission so an unsupported upload never
    /// consumes a permit. CPU-heavy stages (extraction, indexing,
    /// encryption) run on the blocking pool; the permit stays held across
    /// the store writes and is returned when this future completes or is
    /// dropped.
    pub async fn process(
        &self,
        file_name: String,
        mime_type: String,
        data: Vec<u8>,
    ) -> Result<UploadReceipt, UploadError> {
        let mime = SupportedMimeType::parse(&mime_type)
            .ok_or_else(|| UploadError::UnsupportedType(mime_type.clone()))?;

        let _permit = self
            .admission
            .try_acquire()
            .ok_or(UploadError::CapacityExceeded)?;

        let document_id = Uuid::new_v4().to_string();
        let size = data.len() as u64;
        info!(%document_id, %file_name, %mime, "processing document");

        let ocr = Arc::clone(&self.ocr);
        let key_size = self.key_size;
        let task_id = document_id.clone();
        let task_name = file_name.clone();
        let (sealed, key) = tokio::task::spawn_blocking(
            move || -> Result<(Vec<u8>, EncryptionKey), ProcessingError> {
                let text = extract::extract_text(&data, mime, ocr.as_ref())?;
                debug!(characters = text.len(), "extracted text");

                let per_doc_index = index::build_index(&task_id, &task_name, &text)?;
                let serialized = index::serialize_index(&per_doc_index)?;

                let key = EncryptionKey::generate(key_size)?;
                let sealed = crypto::encrypt(&serialized, &key)?;
                Ok((sealed, key))
            },
        )
        .await
        .map_err(ProcessingError::TaskJoin)??;

        self.storage
            .upload_index(&document_id, &sealed)
            .await
            .map_err(ProcessingError::Store)?;
        self.storage
            .upload_key(&document_id, key.as_bytes())
            .await
            .map_err(ProcessingError::Store)?;

        info!(%document_id, "document processed and indexed");
        Ok(UploadReceipt {
            document_id,
            file_name,
            mime_type,
            size,
            indexed: true,
            message: "Document successfully processed and indexed".to_string(),
        })
    }

    /// The admission gate, exposed for observability.
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }
}
