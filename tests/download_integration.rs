//! Integration tests for remote clip download.
//!
//! Runs the downloader against a mock HTTP server:
//! - A successful response is streamed to the destination file
//! - Transient 5xx responses are retried with backoff
//! - Permanent failures are reported without retrying
//! - A finished download is reused without a request

use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use termcine::source::{DownloadError, Downloader};

const BODY: &[u8] = b"not really an mp4 but bytes are bytes";

fn fast_downloader() -> Downloader {
    Downloader::new()
        .unwrap()
        .with_retry_policy(3, Duration::from_millis(10), Duration::from_millis(50))
}

// ==================== Download Tests ====================

#[tokio::test]
async fn test_download_writes_body_to_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clips/intro.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/clips/intro.mp4", server.uri());
    let dest = fast_downloader().fetch(&url, dir.path()).await.unwrap();

    assert_eq!(dest, Downloader::destination(&url, dir.path()));
    assert_eq!(std::fs::read(&dest).unwrap(), BODY);
    assert!(!dest.with_extension("part").exists());
}

#[tokio::test]
async fn test_download_reuses_existing_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/clip.mp4", server.uri());
    let dest = Downloader::destination(&url, dir.path());
    std::fs::write(&dest, b"cached").unwrap();

    let fetched = fast_downloader().fetch(&url, dir.path()).await.unwrap();
    assert_eq!(fetched, dest);
    assert_eq!(std::fs::read(&fetched).unwrap(), b"cached");
}

// ==================== Retry Tests ====================

#[tokio::test]
async fn test_transient_status_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/clip.mp4", server.uri());
    let dest = fast_downloader().fetch(&url, dir.path()).await.unwrap();
    assert_eq!(std::fs::read(dest).unwrap(), BODY);
}

#[tokio::test]
async fn test_retries_exhausted_reports_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/clip.mp4", server.uri());
    let result = fast_downloader().fetch(&url, dir.path()).await;

    match result {
        Err(DownloadError::Network { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("expected network error, got {:?}", other),
    }
    assert!(!Downloader::destination(&url, dir.path()).exists());
}

#[tokio::test]
async fn test_not_found_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let url = format!("{}/missing.mp4", server.uri());
    let result = fast_downloader().fetch(&url, dir.path()).await;

    assert!(matches!(result, Err(DownloadError::Status { status: 404, .. })));
    assert!(!Downloader::destination(&url, dir.path()).exists());
}
