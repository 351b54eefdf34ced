//! Scent-Harvest main entry point
//!
//! This is the command-line interface for the Scent-Harvest harvester.

use anyhow::{bail, Context, Result};
use clap::Parser;
use scent_harvest::config::{load_config_with_hash, Config, JobKind};
use scent_harvest::crawler::{
    discover_designer_groups, fetch_app_token, CancelFlag, Coordinator, DiscussionLinkDiscoverer,
    FetchOutcome, Fetcher, LinkDiscoverer, PerfumeLinkDiscoverer, RunSummary,
};
use scent_harvest::extract::{
    DiscussionExtractor, DiscussionPost, Extractor, PerfumeExtractor, PerfumeRecord,
};
use scent_harvest::ledger::Ledgers;
use scent_harvest::output::{compute_statistics, print_statistics, JsonArtifact};
use scent_harvest::seeds::{load_seeds, write_seeds, GroupSeed};
use scent_harvest::storage::{load_state, open_store};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Scent-Harvest: a resumable perfume and discussion harvester
///
/// Scent-Harvest fetches perfume pages grouped by designer, or discussion
/// threads grouped by subreddit, extracts structured records and checkpoints
/// after every batch so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "scent-harvest")]
#[command(version)]
#[command(about = "A resumable perfume and discussion harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard the stored checkpoint and start from the first group
    #[arg(long)]
    fresh: bool,

    /// Validate config and seeds and show the resume point without fetching
    #[arg(long, conflicts_with_all = ["stats", "discover_groups"])]
    dry_run: bool,

    /// Show statistics from the stored checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "discover_groups"])]
    stats: bool,

    /// Build the seed file from the designer index page and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    discover_groups: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.discover_groups {
        handle_discover_groups(&config).await
    } else {
        handle_harvest(config, config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("scent_harvest=info,warn"),
            1 => EnvFilter::new("scent_harvest=debug,info"),
            2 => EnvFilter::new("scent_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates seeds and shows where a run would start
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== Scent-Harvest Dry Run ===\n");

    println!("Job:");
    println!("  Kind: {:?}", config.job.kind);
    println!("  Seeds: {}", config.job.seed_path);
    println!(
        "  Checkpoint: {} ({:?})",
        config.job.checkpoint_path, config.job.checkpoint_backend
    );
    println!("  Output: {}", config.job.output_path);

    println!("\nFetcher:");
    println!("  Base URL: {}", config.fetcher.base_url);
    println!("  Request timeout: {}ms", config.fetcher.request_timeout_ms);
    println!("  Max attempts: {}", config.fetcher.max_attempts);
    println!(
        "  Rate-limit backoff: {}ms doubling, capped at {}ms",
        config.fetcher.backoff_base_ms, config.fetcher.backoff_cap_ms
    );
    println!("  Network cooldown: {}ms", config.fetcher.network_cooldown_ms);

    println!("\nScheduler:");
    println!("  Batch size: {}", config.scheduler.batch_size);
    println!("  Concurrency: {}", config.scheduler.concurrency);
    println!(
        "  Launch delay: {}-{}ms",
        config.scheduler.launch_delay_min_ms, config.scheduler.launch_delay_max_ms
    );
    println!(
        "  Discovery delay: {}-{}ms",
        config.scheduler.discovery_delay_min_ms, config.scheduler.discovery_delay_max_ms
    );

    let seeds = load_seeds(Path::new(&config.job.seed_path))
        .with_context(|| format!("failed to load seeds from {}", config.job.seed_path))?;
    let seeded_children: usize = seeds.iter().map(|s| s.children.len()).sum();

    println!("\nGroups ({}):", seeds.len());
    for seed in seeds.iter().take(20) {
        println!(
            "  - {} ({}, {} seeded links)",
            seed.group,
            seed.url.as_deref().unwrap_or("no listing"),
            seed.children.len()
        );
    }
    if seeds.len() > 20 {
        println!("  ... and {} more", seeds.len() - 20);
    }

    let store = open_store(&config.job)?;
    let resume = match config.job.kind {
        JobKind::Perfume => load_state::<PerfumeRecord>(&*store)?
            .map(|s| (s.current_group_index, s.processed.len(), s.completed)),
        JobKind::Discussion => load_state::<DiscussionPost>(&*store)?
            .map(|s| (s.current_group_index, s.processed.len(), s.completed)),
    };

    println!("\n✓ Configuration is valid");
    match resume {
        Some((_, processed, true)) => println!(
            "✓ Checkpoint is complete ({} URLs processed); use --fresh to start over",
            processed
        ),
        Some((index, processed, false)) => println!(
            "✓ Would resume at group {}/{} with {} URLs already processed",
            index + 1,
            seeds.len(),
            processed
        ),
        None => println!(
            "✓ Would start with {} groups ({} seeded links)",
            seeds.len(),
            seeded_children
        ),
    }

    Ok(())
}

/// Handles the --stats mode: summarizes the stored checkpoint
fn handle_stats(config: &Config) -> Result<()> {
    let store = open_store(&config.job)?;
    println!("Checkpoint: {}\n", store.describe());

    let stats = match config.job.kind {
        JobKind::Perfume => {
            load_state::<PerfumeRecord>(&*store)?.map(|s| compute_statistics(&s))
        }
        JobKind::Discussion => {
            load_state::<DiscussionPost>(&*store)?.map(|s| compute_statistics(&s))
        }
    };

    match stats {
        Some(stats) => print_statistics(&stats),
        None => println!("No checkpoint found"),
    }

    Ok(())
}

/// Handles the --discover-groups mode: writes the seed file from the designer index
async fn handle_discover_groups(config: &Config) -> Result<()> {
    if config.job.kind != JobKind::Perfume {
        bail!("--discover-groups builds designer seeds and needs a perfume job");
    }

    let base = Url::parse(&config.fetcher.base_url)?;
    let index_url = base.join("/designers/")?;
    let fetcher = Fetcher::new(&config.fetcher, Arc::new(Ledgers::from_config(&config.ledgers)?))?;

    tracing::info!("Fetching designer index {}", index_url);
    let body = match fetcher.fetch(index_url.as_str()).await {
        FetchOutcome::Success { body, .. } => body,
        other => bail!("designer index unavailable: {}", other.reason()),
    };

    let groups = discover_designer_groups(&body, &base);
    if groups.is_empty() {
        bail!("no designer links found on {}", index_url);
    }

    write_seeds(Path::new(&config.job.seed_path), &groups)?;
    tracing::info!(
        "Wrote {} designer groups to {}",
        groups.len(),
        config.job.seed_path
    );

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String, fresh: bool) -> Result<()> {
    let seeds = load_seeds(Path::new(&config.job.seed_path))
        .with_context(|| format!("failed to load seeds from {}", config.job.seed_path))?;
    tracing::info!("Loaded {} groups from {}", seeds.len(), config.job.seed_path);

    let ledgers = Arc::new(Ledgers::from_config(&config.ledgers).context("failed to open ledgers")?);

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing the current batch before stopping");
                cancel.cancel();
            }
        });
    }

    let summary = match config.job.kind {
        JobKind::Perfume => {
            let fetcher = Fetcher::new(&config.fetcher, Arc::clone(&ledgers))?;
            let discoverer = PerfumeLinkDiscoverer::new(&config.fetcher.base_url)?;
            run_job(
                &config,
                config_hash,
                fresh,
                &seeds,
                fetcher,
                discoverer,
                PerfumeExtractor::new(),
                ledgers,
                cancel,
            )
            .await?
        }
        JobKind::Discussion => {
            let Some(discussion) = &config.discussion else {
                bail!("discussion job requires a [discussion] section");
            };

            let mut fetcher_config = config.fetcher.clone();
            if let Some(agent) = &discussion.user_agent {
                fetcher_config.user_agents = vec![agent.clone()];
            }

            let mut fetcher = Fetcher::new(&fetcher_config, Arc::clone(&ledgers))?;
            if let Some(token) = fetch_app_token(fetcher.client(), discussion).await? {
                fetcher = fetcher.with_bearer_token(token);
            }

            let discoverer = DiscussionLinkDiscoverer::new(
                &discussion.api_base_url,
                &discussion.search_terms,
                discussion.page_limit,
            )?;
            run_job(
                &config,
                config_hash,
                fresh,
                &seeds,
                fetcher,
                discoverer,
                DiscussionExtractor::new(),
                ledgers,
                cancel,
            )
            .await?
        }
    };

    tracing::info!(
        "Run finished: {} batches, {} URLs attempted, {} records, {} fetch failures",
        summary.batches,
        summary.urls_attempted,
        summary.records_emitted,
        summary.fetch_failures
    );
    if summary.interrupted {
        tracing::warn!("Stopped early; run the same command again to resume");
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_job<D, E>(
    config: &Config,
    config_hash: String,
    fresh: bool,
    seeds: &[GroupSeed],
    fetcher: Fetcher,
    discoverer: D,
    extractor: E,
    ledgers: Arc<Ledgers>,
    cancel: CancelFlag,
) -> Result<RunSummary>
where
    D: LinkDiscoverer,
    E: Extractor,
{
    let mut store = open_store(&config.job)?;
    if fresh {
        tracing::info!("Starting fresh (discarding checkpoint at {})", store.describe());
        store.clear()?;
    }

    let sink = Box::new(JsonArtifact::new(&config.job.output_path));

    let mut coordinator = Coordinator::new(
        fetcher,
        discoverer,
        extractor,
        &config.scheduler,
        store,
        sink,
        ledgers,
    )
    .with_config_hash(config_hash)
    .with_cancel_flag(cancel);

    coordinator.run(seeds).await.context("harvest failed")
}
