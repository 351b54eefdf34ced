//! Fetcher behavior against a mock server

use crate::common::{fetcher_config, read_lines, Workspace};
use scent_harvest::crawler::{FetchOutcome, Fetcher};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;
    let ws = Workspace::new();

    Mock::given(method("GET"))
        .and(path("/perfume/Acme/Rose-1.html"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/perfume/Acme/Rose-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&fetcher_config(&server.uri()), ws.ledgers()).unwrap();
    let outcome = fetcher
        .fetch(&format!("{}/perfume/Acme/Rose-1.html", server.uri()))
        .await;

    assert_eq!(
        outcome,
        FetchOutcome::Success {
            body: "<html>ok</html>".to_string(),
            status: 200
        }
    );

    let failures = read_lines(&ws.failure_log());
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("429"));
    assert!(read_lines(&ws.gave_up_log()).is_empty());
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    let ws = Workspace::new();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&fetcher_config(&server.uri()), ws.ledgers()).unwrap();
    let url = format!("{}/missing", server.uri());
    let outcome = fetcher.fetch(&url).await;

    assert!(matches!(outcome, FetchOutcome::Failed { status: 404, .. }));

    let failures = read_lines(&ws.failure_log());
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains(&url));
    assert!(failures[0].contains("404"));
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let fetcher = Fetcher::new(&fetcher_config(&server.uri()), ws.ledgers()).unwrap();
    let outcome = fetcher.fetch(&format!("{}/busy", server.uri())).await;

    assert!(matches!(outcome, FetchOutcome::Failed { status: 503, .. }));
}

#[tokio::test]
async fn test_non_200_success_codes_are_failures() {
    let server = MockServer::start().await;
    let ws = Workspace::new();

    Mock::given(method("GET"))
        .and(path("/perfume/Acme/Empty-4.html"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&fetcher_config(&server.uri()), ws.ledgers()).unwrap();
    let url = format!("{}/perfume/Acme/Empty-4.html", server.uri());
    let outcome = fetcher.fetch(&url).await;

    assert!(matches!(outcome, FetchOutcome::Failed { status: 204, .. }));

    let failures = read_lines(&ws.failure_log());
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains(&url));
    assert!(read_lines(&ws.gave_up_log()).is_empty());
}

#[tokio::test]
async fn test_persistent_rate_limit_gives_up() {
    let server = MockServer::start().await;
    let ws = Workspace::new();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&fetcher_config(&server.uri()), ws.ledgers()).unwrap();
    let url = format!("{}/perfume/Acme/Oud-2.html", server.uri());
    let outcome = fetcher.fetch(&url).await;

    match outcome {
        FetchOutcome::GaveUp {
            attempts,
            last_reason,
        } => {
            assert_eq!(attempts, 3);
            assert!(last_reason.contains("429"));
        }
        other => panic!("expected GaveUp, got {:?}", other),
    }

    assert_eq!(read_lines(&ws.failure_log()).len(), 3);
    let gave_up = read_lines(&ws.gave_up_log());
    assert_eq!(gave_up.len(), 1);
    assert!(gave_up[0].contains(&url));
}

#[tokio::test]
async fn test_timeout_counts_toward_ceiling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let mut config = fetcher_config(&server.uri());
    config.request_timeout_ms = 100;
    config.max_attempts = 2;

    let ws = Workspace::new();
    let fetcher = Fetcher::new(&config, ws.ledgers()).unwrap();
    let outcome = fetcher.fetch(&format!("{}/slow", server.uri())).await;

    match outcome {
        FetchOutcome::GaveUp {
            attempts,
            last_reason,
        } => {
            assert_eq!(attempts, 2);
            assert!(last_reason.starts_with("network error"));
        }
        other => panic!("expected GaveUp, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_after_hint_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let fetcher = Fetcher::new(&fetcher_config(&server.uri()), ws.ledgers()).unwrap();
    let outcome = fetcher.attempt(&format!("{}/x", server.uri())).await;

    assert_eq!(
        outcome,
        FetchOutcome::RateLimited {
            retry_after_hint: Some(Duration::from_secs(7))
        }
    );
}

#[tokio::test]
async fn test_requests_carry_browser_headers_and_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header_exists("user-agent"))
        .and(header_exists("accept-language"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(
        &fetcher_config(&server.uri()),
        Arc::new(scent_harvest::ledger::Ledgers::disabled()),
    )
    .unwrap()
    .with_bearer_token("tok-1");

    let outcome = fetcher.fetch(&format!("{}/r/fragrance/new.json", server.uri())).await;
    assert!(outcome.is_success());
}
