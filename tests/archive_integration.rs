//! End-to-end archive runs against a mock signature API.
//!
//! Each test drives [`Archiver::run`] over HTTP and checks the files and the
//! download log it leaves behind.

mod support;

use std::sync::Arc;

use serde_json::json;
use signature_downloader_core::{ArchiveError, Archiver, SignaturitClient};
use support::{
    TOKEN, config, detail_with_signer, document_path, mount_detail, mount_document,
    mount_listing_page, pdf_count, read_log, signature,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn archiver(config: signature_downloader_core::ArchiveConfig) -> Archiver {
    let client = SignaturitClient::new(&config.base_url, TOKEN).unwrap();
    Archiver::new(config, Arc::new(client))
}

#[tokio::test]
async fn test_success_and_detail_failure_each_get_one_row() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    mount_listing_page(
        &server,
        0,
        vec![
            signature("A", &[("a-doc", "Contract.pdf")]),
            signature("B", &[("b-doc", "Lease.pdf")]),
        ],
    )
    .await;
    mount_detail(&server, "A", detail_with_signer("A", "a@x.com")).await;
    Mock::given(method("GET"))
        .and(path("/v3/signatures/B.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    mount_document(&server, "A", "a-doc", b"%PDF-A").await;
    Mock::given(method("GET"))
        .and(path(document_path("B", "b-doc")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server, temp_dir.path(), 3);
    let summary = archiver(config.clone()).run().await.unwrap();

    assert_eq!(summary.signatures(), 2);
    assert_eq!(summary.downloaded(), 1);
    assert_eq!(summary.failed(), 1);

    let rows = read_log(&config.log_path());
    assert_eq!(rows.len(), 2);

    assert_eq!(&rows[0][0], "A");
    assert_eq!(&rows[0][2], "a@x.com");
    assert_eq!(&rows[0][3], "Contract.pdf");
    assert_eq!(&rows[0][6], "success");
    assert_eq!(&rows[0][7], "");
    let saved = config.year_dir().join("a@x.com_Contract.pdf");
    assert_eq!(&rows[0][4], saved.display().to_string());
    assert_eq!(std::fs::read(&saved).unwrap(), b"%PDF-A");

    assert_eq!(&rows[1][0], "B");
    assert_eq!(&rows[1][4], "");
    assert_eq!(&rows[1][6], "failure");
    assert!(rows[1][7].contains("503"), "error was {}", &rows[1][7]);

    assert_eq!(pdf_count(&config.year_dir()), 1);
}

#[tokio::test]
async fn test_unauthorized_detail_aborts_before_any_download() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    mount_listing_page(
        &server,
        0,
        vec![
            signature("A", &[("a-doc", "one.pdf")]),
            signature("B", &[("b-doc", "two.pdf")]),
        ],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v3/signatures/A.json"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/signatures/B.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(document_path("A", "a-doc")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server, temp_dir.path(), 5);
    let err = archiver(config.clone()).run().await.unwrap_err();

    assert!(matches!(err, ArchiveError::Unauthorized { .. }), "got {err:?}");
    assert!(err.is_auth_failure());
    let rows = read_log(&config.log_path());
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][6], "failure");
}

#[tokio::test]
async fn test_unauthorized_listing_aborts_run() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/v3/signatures.json"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server, temp_dir.path(), 5);
    let err = archiver(config.clone()).run().await.unwrap_err();

    assert!(matches!(err, ArchiveError::Unauthorized { .. }));
    assert!(read_log(&config.log_path()).is_empty());
}

#[tokio::test]
async fn test_listing_failure_after_retries_is_fatal() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/v3/signatures.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let err = archiver(config(&server, temp_dir.path(), 2))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Listing { .. }));
    assert!(err.is_fatal());
    assert!(!err.is_auth_failure());
}

#[tokio::test]
async fn test_pagination_follows_offsets_until_short_page() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    mount_listing_page(
        &server,
        0,
        vec![signature("S1", &[("d1", "a.pdf")]), signature("S2", &[("d2", "b.pdf")])],
    )
    .await;
    mount_listing_page(&server, 2, vec![signature("S3", &[("d3", "c.pdf")])]).await;
    for (sig, doc) in [("S1", "d1"), ("S2", "d2"), ("S3", "d3")] {
        mount_detail(&server, sig, detail_with_signer(sig, "p@x.com")).await;
        mount_document(&server, sig, doc, sig.as_bytes()).await;
    }

    let config = config(&server, temp_dir.path(), 1).with_page_size(2);
    let summary = archiver(config.clone()).run().await.unwrap();

    assert_eq!(summary.signatures(), 3);
    assert_eq!(summary.downloaded(), 3);
    let rows = read_log(&config.log_path());
    let ids: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
    assert_eq!(ids, ["S1", "S2", "S3"]);
}

#[tokio::test]
async fn test_colliding_names_and_rerun_never_overwrite() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    mount_listing_page(
        &server,
        0,
        vec![
            signature("A", &[("a-doc", "Offer.pdf")]),
            signature("B", &[("b-doc", "Offer.pdf")]),
        ],
    )
    .await;
    mount_detail(&server, "A", detail_with_signer("A", "same@x.com")).await;
    mount_detail(&server, "B", detail_with_signer("B", "same@x.com")).await;
    mount_document(&server, "A", "a-doc", b"first").await;
    mount_document(&server, "B", "b-doc", b"second").await;

    let config = config(&server, temp_dir.path(), 1);
    let year_dir = config.year_dir();

    archiver(config.clone()).run().await.unwrap();
    assert_eq!(
        std::fs::read(year_dir.join("same@x.com_Offer.pdf")).unwrap(),
        b"first"
    );
    assert_eq!(
        std::fs::read(year_dir.join("same@x.com_Offer_2.pdf")).unwrap(),
        b"second"
    );
    assert_eq!(pdf_count(&year_dir), 2);

    archiver(config.clone()).run().await.unwrap();
    assert_eq!(pdf_count(&year_dir), 4);
    assert_eq!(
        std::fs::read(year_dir.join("same@x.com_Offer.pdf")).unwrap(),
        b"first"
    );
    assert!(year_dir.join("same@x.com_Offer_4.pdf").exists());

    let log = std::fs::read_to_string(config.log_path()).unwrap();
    assert_eq!(log.matches("signature_id,").count(), 1);
    assert_eq!(read_log(&config.log_path()).len(), 4);
}

#[tokio::test]
async fn test_missing_signer_email_uses_sentinel_and_saves_payload() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    mount_listing_page(&server, 0, vec![signature("N", &[("n-doc", "Memo.pdf")])]).await;
    mount_detail(&server, "N", json!({"id": "N", "signers": []})).await;
    mount_document(&server, "N", "n-doc", b"memo").await;

    let config = config(&server, temp_dir.path(), 1);
    archiver(config.clone()).run().await.unwrap();

    assert!(config.year_dir().join("no_email_Memo.pdf").exists());
    let sample = config.diagnostics_dir().join("N.json");
    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(sample).unwrap()).unwrap();
    assert_eq!(saved, json!({"id": "N", "signers": []}));

    let rows = read_log(&config.log_path());
    assert_eq!(&rows[0][2], "no_email");
}

#[tokio::test]
async fn test_failed_download_is_logged_and_next_document_continues() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    mount_listing_page(
        &server,
        0,
        vec![signature("A", &[("gone", "Gone.pdf"), ("ok", "Ok.pdf")])],
    )
    .await;
    mount_detail(&server, "A", detail_with_signer("A", "a@x.com")).await;
    Mock::given(method("GET"))
        .and(path(document_path("A", "gone")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_document(&server, "A", "ok", b"ok").await;

    let config = config(&server, temp_dir.path(), 3);
    let summary = archiver(config.clone()).run().await.unwrap();

    assert_eq!(summary.downloaded(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(!config.year_dir().join("a@x.com_Gone.pdf").exists());
    let rows = read_log(&config.log_path());
    assert_eq!(&rows[0][6], "failure");
    assert_eq!(&rows[0][2], "a@x.com");
    assert_eq!(&rows[1][6], "success");
}

#[tokio::test]
async fn test_empty_year_leaves_header_only_log() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    mount_listing_page(&server, 0, vec![]).await;

    let config = config(&server, temp_dir.path(), 1);
    let summary = archiver(config.clone()).run().await.unwrap();

    assert_eq!(summary.signatures(), 0);
    assert_eq!(summary.total(), 0);
    assert!(read_log(&config.log_path()).is_empty());
    assert_eq!(pdf_count(&config.year_dir()), 0);
}
