//! Shared mock-server fixtures for the signature API.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use signature_downloader_core::{ArchiveConfig, RetryPolicy};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "tok_test_0123456789abcdef";

/// Base URL of the mock API, with the version segment.
pub fn base_url(server: &MockServer) -> String {
    format!("{}/v3", server.uri())
}

/// Retry policy with millisecond delays and no jitter.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(5),
        Duration::from_millis(50),
        2.0,
    )
    .without_jitter()
}

/// Configuration for year 2024 against the mock server.
pub fn config(server: &MockServer, output_root: &Path, max_attempts: u32) -> ArchiveConfig {
    ArchiveConfig::new(2024, TOKEN)
        .with_output_root(output_root)
        .with_base_url(base_url(server))
        .with_retry_policy(fast_policy(max_attempts))
        .with_request_interval(Duration::ZERO)
}

/// A listing entry with one document per `(document_id, file_name)` pair.
pub fn signature(id: &str, documents: &[(&str, &str)]) -> Value {
    json!({
        "id": id,
        "created_at": "2024-06-01T12:00:00+0000",
        "status": "completed",
        "documents": documents
            .iter()
            .map(|(doc_id, name)| json!({"id": doc_id, "file": {"name": name}}))
            .collect::<Vec<_>>()
    })
}

/// A detail payload whose only signer has `email`.
pub fn detail_with_signer(id: &str, email: &str) -> Value {
    json!({"id": id, "signers": [{"email": email, "name": "Signer"}]})
}

/// Serves `records` as the listing page at `offset`.
pub async fn mount_listing_page(server: &MockServer, offset: usize, records: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/v3/signatures.json"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(records)))
        .mount(server)
        .await;
}

/// Serves the detail payload for `signature_id`.
pub async fn mount_detail(server: &MockServer, signature_id: &str, payload: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v3/signatures/{signature_id}.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(server)
        .await;
}

/// Serves the signed content of one document.
pub async fn mount_document(
    server: &MockServer,
    signature_id: &str,
    document_id: &str,
    content: &[u8],
) {
    Mock::given(method("GET"))
        .and(path(document_path(signature_id, document_id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

pub fn document_path(signature_id: &str, document_id: &str) -> String {
    format!("/v3/signatures/{signature_id}/documents/{document_id}/download/signed")
}

/// Reads the download log, skipping the byte-order mark.
pub fn read_log(log_path: &Path) -> Vec<csv::StringRecord> {
    let bytes = std::fs::read(log_path).expect("log should exist");
    let body = bytes
        .strip_prefix(signature_downloader_core::audit::UTF8_BOM)
        .expect("log should start with a BOM");
    csv::Reader::from_reader(body)
        .records()
        .collect::<Result<_, _>>()
        .expect("log should parse")
}

/// Number of PDF files directly under `dir`.
pub fn pdf_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .expect("dir should exist")
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "pdf"))
        .count()
}
