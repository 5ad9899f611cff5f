use std::sync::Once;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sheetlink_core::FailureKind;
use sheetlink_engine::{DownloadSettings, Downloader, ResolverSettings};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const XLSX_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(link_logging::initialize_for_tests);
}

fn downloader(settings: DownloadSettings) -> Downloader {
    Downloader::new(settings, ResolverSettings::default().html_content_types)
}

fn settings() -> DownloadSettings {
    DownloadSettings {
        request_timeout_ms: 5_000,
        ..DownloadSettings::default()
    }
}

#[tokio::test]
async fn follows_redirects_and_returns_bytes() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/storage/book.xlsx"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/book.xlsx"))
        .and(header("accept", "*/*"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"PK\x03\x04rest-of-zip".to_vec(), XLSX_TYPE),
        )
        .mount(&server)
        .await;

    let file = downloader(settings())
        .download(&format!("{}/dl", server.uri()))
        .await
        .expect("downloaded");

    assert_eq!(file.final_url, format!("{}/storage/book.xlsx", server.uri()));
    assert_eq!(file.http_status, 200);
    assert_eq!(file.redirect_count, 1);
    assert_eq!(file.content_type.as_deref(), Some(XLSX_TYPE));
    assert_eq!(file.bytes.len(), 15);
    assert_eq!(file.first_bytes_hex(4), "504b0304");
}

#[tokio::test]
async fn error_status_keeps_a_body_snippet() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("item not found", "text/plain"))
        .mount(&server)
        .await;

    let err = downloader(settings())
        .download(&format!("{}/missing", server.uri()))
        .await
        .expect_err("404");

    assert_eq!(err.kind, FailureKind::DownloadHttpError { status: 404 });
    assert_eq!(err.body_snippet.as_deref(), Some("item not found"));
}

#[tokio::test]
async fn html_instead_of_a_workbook_is_rejected() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/book.xlsx"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>Sign in</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let err = downloader(settings())
        .download(&format!("{}/book.xlsx", server.uri()))
        .await
        .expect_err("html");

    assert_eq!(err.kind, FailureKind::UnexpectedHtml);
    assert_eq!(err.body_snippet.as_deref(), Some("<html>Sign in</html>"));
    assert_eq!(err.content_type.as_deref(), Some("text/html; charset=utf-8"));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 64], XLSX_TYPE))
        .mount(&server)
        .await;

    let err = downloader(DownloadSettings {
        max_bytes: 16,
        ..settings()
    })
    .download(&format!("{}/big", server.uri()))
    .await
    .expect_err("too large");

    assert!(matches!(
        err.kind,
        FailureKind::TooLarge { max_bytes: 16, .. }
    ));
}

#[tokio::test]
async fn slow_server_times_out() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"PK".to_vec(), XLSX_TYPE)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = downloader(DownloadSettings {
        request_timeout_ms: 50,
        ..settings()
    })
    .download(&format!("{}/slow", server.uri()))
    .await
    .expect_err("timeout");

    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn redirect_limit_is_enforced() {
    init_logging();
    let server = MockServer::start().await;
    for (from, to) in [("/r1", "/r2"), ("/r2", "/r3"), ("/r3", "/r4")] {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", to))
            .mount(&server)
            .await;
    }

    let err = downloader(DownloadSettings {
        redirect_limit: 1,
        ..settings()
    })
    .download(&format!("{}/r1", server.uri()))
    .await
    .expect_err("too many redirects");

    assert_eq!(err.kind, FailureKind::TooManyRedirects { max_hops: 1 });
}
