//! End-to-end pipeline tests over the in-memory object store.
//!
//! Exercises the full upload path (extract → index → encrypt → store) and the
//! search fan-in (list → fetch → decrypt → deserialize → merge → query),
//! including the failure modes the fan-in must absorb.

use std::sync::Arc;

use fulltext_vault::admission::AdmissionController;
use fulltext_vault::error::UploadError;
use fulltext_vault::ocr::DisabledOcr;
use fulltext_vault::pipeline::DocumentProcessor;
use fulltext_vault::search::SearchEngine;
use fulltext_vault::store::{MemoryObjectStore, ObjectStore, StorageGateway};

fn rig(max_parallel: usize) -> (Arc<MemoryObjectStore>, DocumentProcessor, SearchEngine) {
    let store = Arc::new(MemoryObjectStore::new());
    let storage = StorageGateway::new(store.clone() as Arc<dyn ObjectStore>);
    let admission = AdmissionController::new(max_parallel);
    let processor =
        DocumentProcessor::new(admission, storage.clone(), Arc::new(DisabledOcr), 256);
    let search = SearchEngine::new(storage);
    (store, processor, search)
}

async fn upload_text(processor: &DocumentProcessor, name: &str, body: &str) -> String {
    let receipt = processor
        .process(name.to_string(), "text/plain".to_string(), body.into())
        .await
        .expect("upload succeeds");
    assert!(receipt.indexed);
    receipt.document_id
}

/// Minimal valid single-page PDF containing the given phrase. Builds body
/// then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}endstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[tokio::test]
async fn upload_then_search_round_trip() {
    let (_store, processor, search) = rig(8);

    let rust_id = upload_text(
        &processor,
        "alpha.txt",
        "the alpha document is about rust programming and cargo crates",
    )
    .await;
    upload_text(
        &processor,
        "beta.txt",
        "the beta document discusses python and machine learning",
    )
    .await;

    let response = search.search("cargo", 10).await.unwrap();
    assert_eq!(response.total_hits, 1);
    assert_eq!(response.results[0].document_id, rust_id);
    assert_eq!(response.results[0].file_name, "alpha.txt");
    assert!(response.results[0].score > 0.0);
    assert!(response.results[0].snippet.contains("cargo"));
}

#[tokio::test]
async fn upload_receipt_reports_document_metadata() {
    let (store, processor, _search) = rig(8);

    let receipt = processor
        .process(
            "notes.txt".to_string(),
            "text/plain".to_string(),
            b"short clinical note".to_vec(),
        )
        .await
        .unwrap();

    assert_eq!(receipt.file_name, "notes.txt");
    assert_eq!(receipt.mime_type, "text/plain");
    assert_eq!(receipt.size, "short clinical note".len() as u64);
    assert!(receipt.indexed);
    assert_eq!(receipt.message, "Document successfully processed and indexed");

    // Exactly two objects per document: encrypted index plus raw key.
    let index_name = format!("index-{}.enc", receipt.document_id);
    let key_name = format!("key-{}.bin", receipt.document_id);
    assert!(store.get(&index_name).await.is_ok());
    assert!(store.get(&key_name).await.is_ok());
    assert_eq!(store.list("").await.unwrap().len(), 2);
}

#[tokio::test]
async fn stored_index_is_not_plaintext() {
    let (store, processor, _search) = rig(8);
    let id = upload_text(&processor, "secret.txt", "confidential cardiology referral").await;

    let sealed = store.get(&format!("index-{}.enc", id)).await.unwrap();
    let haystack = String::from_utf8_lossy(&sealed);
    assert!(!haystack.contains("cardiology"));
    assert!(!haystack.contains("meta.json"));
}

#[tokio::test]
async fn empty_corpus_returns_empty_response() {
    let (_store, _processor, search) = rig(8);
    let response = search.search("anything", 10).await.unwrap();
    assert_eq!(response.total_hits, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn search_skips_document_with_missing_key() {
    let (store, processor, search) = rig(8);

    upload_text(&processor, "one.txt", "shared marker aurora plus unique teal").await;
    upload_text(&processor, "two.txt", "shared marker aurora plus unique coral").await;
    let broken = upload_text(&processor, "three.txt", "shared marker aurora plus unique ochre").await;

    assert!(store.remove(&format!("key-{}.bin", broken)));

    let response = search.search("aurora", 10).await.unwrap();
    assert_eq!(response.total_hits, 2, "two healthy documents still match");
    assert!(response
        .results
        .iter()
        .all(|r| r.document_id != broken));
}

#[tokio::test]
async fn search_skips_corrupt_index_object() {
    let (store, processor, search) = rig(8);

    let healthy = upload_text(&processor, "ok.txt", "marker quasar healthy body").await;
    let broken = upload_text(&processor, "bad.txt", "marker quasar broken body").await;

    store.corrupt(&format!("index-{}.enc", broken), vec![0u8; 40]);

    let response = search.search("quasar", 10).await.unwrap();
    assert_eq!(response.total_hits, 1);
    assert_eq!(response.results[0].document_id, healthy);
}

#[tokio::test]
async fn search_skips_document_with_wrong_key() {
    let (store, processor, search) = rig(8);

    let healthy = upload_text(&processor, "ok.txt", "marker nebula healthy body").await;
    let broken = upload_text(&processor, "bad.txt", "marker nebula broken body").await;

    // Replace the key object with different (valid-length) key material; the
    // authentication tag no longer verifies and the document is skipped.
    store.corrupt(&format!("key-{}.bin", broken), vec![0x42u8; 32]);

    let response = search.search("nebula", 10).await.unwrap();
    assert_eq!(response.total_hits, 1);
    assert_eq!(response.results[0].document_id, healthy);
}

#[tokio::test]
async fn snippet_truncates_long_content() {
    let (_store, processor, search) = rig(8);

    let long_body = format!("zircon {}", "lorem ipsum dolor sit amet ".repeat(20));
    assert!(long_body.chars().count() > 200);
    upload_text(&processor, "long.txt", &long_body).await;

    let response = search.search("zircon", 10).await.unwrap();
    let snippet = &response.results[0].snippet;
    assert!(snippet.ends_with("..."));
    assert_eq!(snippet.chars().count(), 203);
    assert_eq!(&snippet[..200], &long_body[..200]);
}

#[tokio::test]
async fn snippet_is_verbatim_for_short_content() {
    let (_store, processor, search) = rig(8);

    let body = "garnet short body under the limit";
    upload_text(&processor, "short.txt", body).await;

    let response = search.search("garnet", 10).await.unwrap();
    assert_eq!(response.results[0].snippet, body);
}

#[tokio::test]
async fn unsupported_type_is_rejected_before_any_work() {
    let (store, processor, _search) = rig(8);

    let err = processor
        .process(
            "page.html".to_string(),
            "text/html".to_string(),
            b"<html>ignored</html>".to_vec(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::UnsupportedType(ref t) if t.as_str() == "text/html"));
    assert!(store.list("").await.unwrap().is_empty(), "nothing was stored");
    assert_eq!(
        processor.admission().available(),
        processor.admission().capacity(),
        "no permit was consumed"
    );
}

#[tokio::test]
async fn capacity_exceeded_when_pool_is_exhausted() {
    let store = Arc::new(MemoryObjectStore::new());
    let storage = StorageGateway::new(store.clone() as Arc<dyn ObjectStore>);
    let admission = AdmissionController::new(1);
    let processor = DocumentProcessor::new(
        admission.clone(),
        storage.clone(),
        Arc::new(DisabledOcr),
        256,
    );

    let held = admission.try_acquire().expect("take the only permit");

    let err = processor
        .process(
            "queued.txt".to_string(),
            "text/plain".to_string(),
            b"rejected while pool is full".to_vec(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::CapacityExceeded));

    drop(held);
    processor
        .process(
            "retried.txt".to_string(),
            "text/plain".to_string(),
            b"accepted after a permit frees up".to_vec(),
        )
        .await
        .expect("upload succeeds once a permit is free");
}

#[tokio::test]
async fn max_results_bounds_the_hit_count() {
    let (_store, processor, search) = rig(8);

    for i in 0..3 {
        upload_text(
            &processor,
            &format!("doc-{i}.txt"),
            "every document mentions basalt somewhere",
        )
        .await;
    }

    let response = search.search("basalt", 2).await.unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(
        response.total_hits, 2,
        "total reflects returned results, not the engine match count"
    );
}

#[tokio::test]
async fn results_are_ordered_by_descending_score() {
    let (_store, processor, search) = rig(8);

    upload_text(&processor, "weak.txt", "topaz appears once in a fairly long sentence here").await;
    upload_text(&processor, "strong.txt", "topaz topaz topaz").await;

    let response = search.search("topaz", 10).await.unwrap();
    assert_eq!(response.results.len(), 2);
    assert!(response.results.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(response.results[0].file_name, "strong.txt");
}

#[tokio::test]
async fn pdf_upload_round_trips_through_search() {
    let (_store, processor, search) = rig(8);

    let pdf = minimal_pdf_with_phrase(
        "discharge summary mentions amoxicillin treatment for the patient",
    );
    let receipt = processor
        .process("summary.pdf".to_string(), "application/pdf".to_string(), pdf)
        .await
        .unwrap();

    let response = search.search("amoxicillin", 10).await.unwrap();
    assert_eq!(response.total_hits, 1);
    assert_eq!(response.results[0].document_id, receipt.document_id);
    assert_eq!(response.results[0].file_name, "summary.pdf");
}

#[tokio::test]
async fn concurrent_uploads_within_capacity_all_succeed() {
    let (_store, processor, search) = rig(16);
    let processor = Arc::new(processor);

    let mut handles = Vec::new();
    for i in 0..10 {
        let processor = Arc::clone(&processor);
        handles.push(tokio::spawn(async move {
            processor
                .process(
                    format!("bulk-{i}.txt"),
                    "text/plain".to_string(),
                    format!("bulk corpus item number {i} mentions obsidian").into_bytes(),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("upload within capacity succeeds");
    }

    let response = search.search("obsidian", 20).await.unwrap();
    assert_eq!(response.total_hits, 10);
}
