//! End-to-end pipeline tests: discovery, batches, checkpoint and artifact

use crate::common::{designer_page, perfume_page, read_lines, Workspace};
use scent_harvest::crawler::{CancelFlag, DiscussionLinkDiscoverer, PerfumeLinkDiscoverer};
use scent_harvest::extract::{DiscussionExtractor, Extractor, PerfumeExtractor, PerfumeRecord};
use scent_harvest::seeds::GroupSeed;
use scent_harvest::storage::{load_state, SqliteStore};
use scent_harvest::HarvestError;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, page_path: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn designer_seed(server: &MockServer, key: &str) -> GroupSeed {
    GroupSeed {
        group: key.to_string(),
        url: Some(format!("{}/designers/{}.html", server.uri(), key)),
        children: vec![],
    }
}

/// Panics on any URL containing `poison`
struct PanickingExtractor {
    poison: &'static str,
}

impl Extractor for PanickingExtractor {
    type Record = PerfumeRecord;

    fn extract(&self, body: &str, url: &str) -> PerfumeRecord {
        if url.contains(self.poison) {
            panic!("extractor blew up on {}", url);
        }
        PerfumeExtractor::new().extract(body, url)
    }
}

/// Requests cancellation after extracting its first record
struct CancellingExtractor {
    cancel: CancelFlag,
}

impl Extractor for CancellingExtractor {
    type Record = PerfumeRecord;

    fn extract(&self, body: &str, url: &str) -> PerfumeRecord {
        self.cancel.cancel();
        PerfumeExtractor::new().extract(body, url)
    }
}

/// Mounts a designer page and `count` perfume pages named P1..Pn
async fn mount_numbered(server: &MockServer, count: usize, delay: Duration) -> Vec<String> {
    let paths: Vec<String> = (1..=count).map(|i| format!("/perfume/Acme/P-{}.html", i)).collect();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    mount_page(server, "/designers/Acme.html", 200, designer_page(&path_refs)).await;

    for (i, p) in paths.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(p.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(perfume_page(&format!("P{}", i + 1), "Acme"))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    paths.iter().map(|p| format!("{}{}", server.uri(), p)).collect()
}

fn record_names(output: &serde_json::Value) -> Vec<String> {
    output[0]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect()
}

/// One designer, three perfumes, one of which is missing
async fn mount_acme(server: &MockServer) {
    mount_page(
        server,
        "/designers/Acme.html",
        200,
        designer_page(&[
            "/perfume/Acme/Rose-1.html",
            "/perfume/Acme/Oud-2.html",
            "/perfume/Acme/Gone-3.html",
        ]),
    )
    .await;
    mount_page(server, "/perfume/Acme/Rose-1.html", 200, perfume_page("Rose", "Acme")).await;
    mount_page(server, "/perfume/Acme/Oud-2.html", 200, perfume_page("Oud", "Acme")).await;
    mount_page(server, "/perfume/Acme/Gone-3.html", 404, String::new()).await;
}

#[tokio::test]
async fn test_acme_designer_with_missing_page() {
    let server = MockServer::start().await;
    mount_acme(&server).await;

    let ws = Workspace::new();
    let mut coordinator = ws.coordinator(
        &server.uri(),
        PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
        PerfumeExtractor::new(),
        50,
    );

    let summary = coordinator.run(&[designer_seed(&server, "Acme")]).await.unwrap();

    assert_eq!(summary.groups_completed, 1);
    assert_eq!(summary.urls_attempted, 3);
    assert_eq!(summary.records_emitted, 2);
    assert_eq!(summary.fetch_failures, 1);
    assert!(!summary.interrupted);

    let checkpoint = ws.checkpoint();
    assert_eq!(checkpoint["processed"].as_array().unwrap().len(), 3);
    assert_eq!(checkpoint["current_group_index"], 1);
    assert_eq!(checkpoint["completed"], true);
    assert_eq!(checkpoint["config_hash"], "test-hash");

    let output = ws.output();
    assert_eq!(output.as_array().unwrap().len(), 1);
    assert_eq!(output[0]["group"], "Acme");
    let names: Vec<&str> = output[0]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Rose", "Oud"]);

    let failures = read_lines(&ws.failure_log());
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("/perfume/Acme/Gone-3.html"));

    // Both records lack ratings, so both are in the missing-fields ledger
    let missing = read_lines(&ws.missing_log());
    assert_eq!(missing.len(), 2);
    assert!(missing[0].contains("longevity"));
}

#[tokio::test]
async fn test_sqlite_checkpoint_backend() {
    let server = MockServer::start().await;
    mount_acme(&server).await;

    let ws = Workspace::new();
    let db_path = ws.path("progress.db");
    let store = Box::new(SqliteStore::new(&db_path).unwrap());

    let summary = ws
        .coordinator_with_store(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            PerfumeExtractor::new(),
            2,
            store,
        )
        .run(&[designer_seed(&server, "Acme")])
        .await
        .unwrap();
    assert_eq!(summary.batches, 2);

    let reopened = SqliteStore::new(&db_path).unwrap();
    // Two batch saves, one group save and the completion save
    assert_eq!(reopened.save_count().unwrap(), 4);

    let state = load_state::<PerfumeRecord>(&reopened).unwrap().unwrap();
    assert!(state.completed);
    assert_eq!(state.processed.len(), 3);
    assert_eq!(state.record_count(), 2);
    assert_eq!(state.config_hash.as_deref(), Some("test-hash"));
}

#[tokio::test]
async fn test_rerun_after_completion_fetches_nothing() {
    let server = MockServer::start().await;
    mount_acme(&server).await;

    let ws = Workspace::new();
    let seeds = [designer_seed(&server, "Acme")];

    ws.coordinator(
        &server.uri(),
        PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
        PerfumeExtractor::new(),
        50,
    )
    .run(&seeds)
    .await
    .unwrap();
    let first_output = std::fs::read(ws.output_path()).unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let summary = ws
        .coordinator(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            PerfumeExtractor::new(),
            50,
        )
        .run(&seeds)
        .await
        .unwrap();

    assert_eq!(summary.urls_attempted, 0);
    assert_eq!(summary.batches, 0);
    assert_eq!(std::fs::read(ws.output_path()).unwrap(), first_output);
    server.verify().await;
}

#[tokio::test]
async fn test_resume_skips_processed_urls() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/designers/Acme.html",
        200,
        designer_page(&["/perfume/Acme/Rose-1.html", "/perfume/Acme/Oud-2.html"]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/perfume/Acme/Rose-1.html"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/perfume/Acme/Oud-2.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(perfume_page("Oud", "Acme")))
        .expect(1)
        .mount(&server)
        .await;

    let rose_url = format!("{}/perfume/Acme/Rose-1.html", base);
    let rose = PerfumeExtractor::new().extract(&perfume_page("Rose", "Acme"), &rose_url);

    let ws = Workspace::new();
    let prior = json!({
        "current_group_index": 0,
        "current_group_key": "Acme",
        "processed": [rose_url],
        "accumulated": [{ "group": "Acme", "records": [rose] }],
        "config_hash": "test-hash",
        "completed": false
    });
    std::fs::write(ws.checkpoint_path(), prior.to_string()).unwrap();

    let summary = ws
        .coordinator(
            &base,
            PerfumeLinkDiscoverer::new(&base).unwrap(),
            PerfumeExtractor::new(),
            50,
        )
        .run(&[designer_seed(&server, "Acme")])
        .await
        .unwrap();

    assert_eq!(summary.urls_attempted, 1);

    let output = ws.output();
    let names: Vec<&str> = output[0]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Rose", "Oud"]);
    assert_eq!(ws.checkpoint()["processed"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_links_do_not_abort_batches() {
    let server = MockServer::start().await;

    let paths: Vec<String> = (1..=5).map(|i| format!("/perfume/Acme/P-{}.html", i)).collect();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    mount_page(&server, "/designers/Acme.html", 200, designer_page(&path_refs)).await;

    for (i, p) in paths.iter().enumerate() {
        if i == 2 {
            mount_page(&server, p, 500, String::new()).await;
        } else {
            mount_page(&server, p, 200, perfume_page(&format!("P{}", i + 1), "Acme")).await;
        }
    }

    let ws = Workspace::new();
    let summary = ws
        .coordinator(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            PerfumeExtractor::new(),
            2,
        )
        .run(&[designer_seed(&server, "Acme")])
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.urls_attempted, 5);
    assert_eq!(summary.records_emitted, 4);

    let names: Vec<String> = ws.output()[0]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["P1", "P2", "P4", "P5"]);
}

#[tokio::test]
async fn test_undiscoverable_group_is_skipped() {
    let server = MockServer::start().await;

    mount_page(&server, "/designers/Broken.html", 404, String::new()).await;
    mount_page(
        &server,
        "/designers/Globex.html",
        200,
        designer_page(&["/perfume/Globex/Iris-9.html"]),
    )
    .await;
    mount_page(&server, "/perfume/Globex/Iris-9.html", 200, perfume_page("Iris", "Globex")).await;

    let ws = Workspace::new();
    let summary = ws
        .coordinator(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            PerfumeExtractor::new(),
            50,
        )
        .run(&[designer_seed(&server, "Broken"), designer_seed(&server, "Globex")])
        .await
        .unwrap();

    assert_eq!(summary.groups_failed, 1);
    assert_eq!(summary.groups_completed, 1);

    let output = ws.output();
    assert_eq!(output.as_array().unwrap().len(), 1);
    assert_eq!(output[0]["group"], "Globex");
    assert_eq!(ws.checkpoint()["current_group_index"], 2);
}

#[tokio::test]
async fn test_cancelled_run_stops_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancelFlag::new();
    cancel.cancel();

    let ws = Workspace::new();
    let summary = ws
        .coordinator(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            PerfumeExtractor::new(),
            50,
        )
        .with_cancel_flag(cancel)
        .run(&[designer_seed(&server, "Acme")])
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.urls_attempted, 0);
    assert!(!ws.checkpoint_path().exists());
}

#[tokio::test]
async fn test_discussion_job_with_seeded_wiki_page() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/r/fragrance/new.json"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {
                "after": null,
                "children": [
                    { "kind": "t3", "data": { "permalink": "/r/fragrance/comments/abc123/best_rose/" } }
                ]
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/r/fragrance/comments/abc123/best_rose.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "kind": "Listing", "data": { "children": [ { "kind": "t3", "data": {
                "id": "abc123", "title": "Best rose?", "selftext": "", "score": 5,
                "num_comments": 1, "subreddit": "fragrance", "created_utc": 1700000000
            } } ] } },
            { "kind": "Listing", "data": { "children": [
                { "kind": "t1", "data": { "author": "alice", "body": "Rose Absolue", "score": 3, "replies": "" } }
            ] } }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/r/fragrance/wiki/faq.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "wikipage",
            "data": { "content_md": "Start here" }
        })))
        .mount(&server)
        .await;

    let seed = GroupSeed {
        group: "fragrance".to_string(),
        url: None,
        children: vec![format!("{}/r/fragrance/wiki/faq.json", base)],
    };

    let ws = Workspace::new();
    let summary = ws
        .coordinator(
            &base,
            DiscussionLinkDiscoverer::new(&base, &[], 100).unwrap(),
            DiscussionExtractor::new(),
            50,
        )
        .run(&[seed])
        .await
        .unwrap();

    assert_eq!(summary.records_emitted, 2);

    let output = ws.output();
    assert_eq!(output[0]["group"], "fragrance");
    let posts = output[0]["records"].as_array().unwrap();
    assert_eq!(posts[0]["id"], "wiki_faq");
    assert_eq!(posts[0]["title"], "Wiki: faq");
    assert_eq!(posts[1]["id"], "abc123");
    assert_eq!(posts[1]["comments"][0]["author"], "alice");
}

#[tokio::test]
async fn test_task_panic_saves_checkpoint_and_halts() {
    let server = MockServer::start().await;
    let urls = mount_numbered(&server, 4, Duration::ZERO).await;

    let ws = Workspace::new();
    let result = ws
        .coordinator(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            PanickingExtractor { poison: "P-3" },
            2,
        )
        .run(&[designer_seed(&server, "Acme")])
        .await;

    match result {
        Err(HarvestError::TaskFault { group, message }) => {
            assert_eq!(group, "Acme");
            assert!(message.contains("panic"), "{}", message);
        }
        other => panic!("expected TaskFault, got {:?}", other),
    }

    // Only the batch before the fault is recorded
    let checkpoint = ws.checkpoint();
    let processed: Vec<&str> = checkpoint["processed"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u.as_str().unwrap())
        .collect();
    assert_eq!(processed, vec![urls[0].as_str(), urls[1].as_str()]);
    assert_eq!(checkpoint["current_group_index"], 0);
    assert_eq!(checkpoint["completed"], false);
    assert_eq!(record_names(&ws.output()), vec!["P1", "P2"]);
}

#[tokio::test]
async fn test_concurrency_ceiling_bounds_in_flight_fetches() {
    let server = MockServer::start().await;
    mount_numbered(&server, 6, Duration::from_millis(300)).await;

    let ws = Workspace::new();
    let started = Instant::now();
    let summary = ws
        .coordinator(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            PerfumeExtractor::new(),
            50,
        )
        .run(&[designer_seed(&server, "Acme")])
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.batches, 1);
    assert_eq!(summary.records_emitted, 6);

    // Three permits over six 300ms responses: two waves, not one and not six
    assert!(elapsed >= Duration::from_millis(600), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "{:?}", elapsed);
    assert_eq!(record_names(&ws.output()), vec!["P1", "P2", "P3", "P4", "P5", "P6"]);
}

#[tokio::test]
async fn test_cancel_between_batches_then_resume() {
    let server = MockServer::start().await;
    let urls = mount_numbered(&server, 3, Duration::ZERO).await;
    let seeds = [designer_seed(&server, "Acme")];

    let cancel = CancelFlag::new();
    let ws = Workspace::new();
    let summary = ws
        .coordinator(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            CancellingExtractor {
                cancel: cancel.clone(),
            },
            1,
        )
        .with_cancel_flag(cancel)
        .run(&seeds)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.batches, 1);

    let checkpoint = ws.checkpoint();
    assert_eq!(checkpoint["processed"], json!([urls[0]]));
    assert_eq!(checkpoint["current_group_index"], 0);
    assert_eq!(checkpoint["completed"], false);
    assert_eq!(record_names(&ws.output()), vec!["P1"]);

    let summary = ws
        .coordinator(
            &server.uri(),
            PerfumeLinkDiscoverer::new(&server.uri()).unwrap(),
            PerfumeExtractor::new(),
            1,
        )
        .run(&seeds)
        .await
        .unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.urls_attempted, 2);
    assert_eq!(record_names(&ws.output()), vec!["P1", "P2", "P3"]);
    assert_eq!(ws.checkpoint()["completed"], true);

    // Each perfume page was fetched exactly once across both runs
    let requests = server.received_requests().await.unwrap();
    for i in 1..=3 {
        let page = format!("/perfume/Acme/P-{}.html", i);
        let hits = requests.iter().filter(|r| r.url.path() == page).count();
        assert_eq!(hits, 1, "{}", page);
    }
}
