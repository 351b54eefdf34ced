//! Shared fixtures for integration tests

use scent_harvest::config::{FetcherConfig, LedgerConfig, SchedulerConfig};
use scent_harvest::crawler::{Coordinator, Fetcher, LinkDiscoverer};
use scent_harvest::extract::Extractor;
use scent_harvest::ledger::Ledgers;
use scent_harvest::output::JsonArtifact;
use scent_harvest::storage::{CheckpointStore, JsonFileStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Fetcher settings with millisecond waits so retries stay fast
pub fn fetcher_config(base_url: &str) -> FetcherConfig {
    FetcherConfig {
        base_url: base_url.to_string(),
        request_timeout_ms: 2_000,
        max_attempts: 3,
        backoff_base_ms: 5,
        backoff_cap_ms: 20,
        network_cooldown_ms: 10,
        user_agents: vec![],
    }
}

/// Scheduler settings without pacing delays
pub fn scheduler_config(batch_size: usize) -> SchedulerConfig {
    SchedulerConfig {
        batch_size,
        concurrency: 3,
        launch_delay_min_ms: 0,
        launch_delay_max_ms: 0,
        discovery_delay_min_ms: 0,
        discovery_delay_max_ms: 0,
        max_listing_pages: 5,
    }
}

/// Temp directory holding the checkpoint, artifact and ledgers of one test
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.path("checkpoint.json")
    }

    pub fn output_path(&self) -> PathBuf {
        self.path("output.json")
    }

    pub fn failure_log(&self) -> PathBuf {
        self.path("failed_urls.log")
    }

    pub fn gave_up_log(&self) -> PathBuf {
        self.path("gave_up.log")
    }

    pub fn missing_log(&self) -> PathBuf {
        self.path("missing_fields.log")
    }

    pub fn ledgers(&self) -> Arc<Ledgers> {
        let config = LedgerConfig {
            failure_log: Some(self.failure_log().display().to_string()),
            gave_up_log: Some(self.gave_up_log().display().to_string()),
            missing_fields_log: Some(self.missing_log().display().to_string()),
        };
        Arc::new(Ledgers::from_config(&config).unwrap())
    }

    pub fn store(&self) -> Box<dyn CheckpointStore + Send> {
        Box::new(JsonFileStore::new(self.checkpoint_path()))
    }

    pub fn checkpoint(&self) -> serde_json::Value {
        read_json(&self.checkpoint_path())
    }

    pub fn output(&self) -> serde_json::Value {
        read_json(&self.output_path())
    }

    /// Builds a coordinator writing into this workspace
    pub fn coordinator<D: LinkDiscoverer, E: Extractor>(
        &self,
        base_url: &str,
        discoverer: D,
        extractor: E,
        batch_size: usize,
    ) -> Coordinator<D, E> {
        self.coordinator_with_store(base_url, discoverer, extractor, batch_size, self.store())
    }

    /// Same as [`Workspace::coordinator`] with a caller-chosen checkpoint backend
    pub fn coordinator_with_store<D: LinkDiscoverer, E: Extractor>(
        &self,
        base_url: &str,
        discoverer: D,
        extractor: E,
        batch_size: usize,
        store: Box<dyn CheckpointStore + Send>,
    ) -> Coordinator<D, E> {
        let ledgers = self.ledgers();
        let fetcher = Fetcher::new(&fetcher_config(base_url), Arc::clone(&ledgers)).unwrap();

        Coordinator::new(
            fetcher,
            discoverer,
            extractor,
            &scheduler_config(batch_size),
            store,
            Box::new(JsonArtifact::new(self.output_path())),
            ledgers,
        )
        .with_config_hash("test-hash")
    }
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let contents = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    serde_json::from_str(&contents).unwrap()
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// A perfume detail page with every identity field present
pub fn perfume_page(name: &str, brand: &str) -> String {
    format!(
        r#"<html><body>
            <h1 itemprop="name">{name} <small>for women and men</small></h1>
            <p itemprop="brand"><a href="/designers/{brand}.html"><span itemprop="name">{brand}</span></a></p>
            <div class="accord-box"><div class="accord-bar" style="width: 90%;">woody</div></div>
            <div id="pyramid_top"><a>Bergamot</a></div>
        </body></html>"#
    )
}

/// A designer page linking to the given perfume paths
pub fn designer_page(paths: &[&str]) -> String {
    let anchors: String = paths
        .iter()
        .map(|p| format!(r#"<a href="{}">perfume</a>"#, p))
        .collect();
    format!("<html><body>{}</body></html>", anchors)
}
