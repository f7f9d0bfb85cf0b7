// src/pipeline/monitor.rs

//! Monitoring pipeline: catalog → probes → diff → state → feed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{CatalogMatches, Config, Product, UpdateItem};
use crate::pipeline::diff::calculate_diff;
use crate::pipeline::render::FeedRenderer;
use crate::services::{
    CatalogExtractor, ProbeOutcome, Row, UpdateProber, download_catalog, rows_from_xlsx,
};
use crate::storage::StateStore;
use crate::utils::http::Fetch;

/// A product whose probe failed this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub product: String,
    pub substance: String,
    pub message: String,
}

/// Summary of one monitoring run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Catalog rows matched to a monitored substance
    pub matched_products: usize,
    /// Matches skipped because the catalog row has no URL
    pub skipped_no_url: usize,
    pub probed: usize,
    pub no_feed: usize,
    pub empty_feed: usize,
    pub no_usable_date: usize,
    pub failures: Vec<ProbeFailure>,
    pub all_items: Vec<UpdateItem>,
    pub new_items: Vec<UpdateItem>,
    pub feed_items_written: usize,
    pub feed_path: PathBuf,
}

impl RunReport {
    pub fn new_count(&self) -> usize {
        self.new_items.len()
    }
}

/// Items and counters gathered by the probe stage.
#[derive(Debug, Default)]
struct ProbeStage {
    items: Vec<UpdateItem>,
    skipped_no_url: usize,
    probed: usize,
    no_feed: usize,
    empty_feed: usize,
    no_usable_date: usize,
    failures: Vec<ProbeFailure>,
}

/// Download the catalog and narrow it to the monitored substances.
pub async fn run_catalog(config: &Config, fetcher: &dyn Fetch) -> Result<CatalogMatches> {
    let bytes = download_catalog(fetcher, config).await?;
    let rows = rows_from_xlsx(&bytes)?;
    extract_matches(config, &rows)
}

/// Run the full pipeline against the live catalog.
///
/// Only catalog download/format errors and output I/O abort the run;
/// individual probe failures are recorded in the report.
pub async fn run_monitor(
    config: &Config,
    fetcher: Arc<dyn Fetch>,
    store: &dyn StateStore,
) -> Result<RunReport> {
    let bytes = download_catalog(fetcher.as_ref(), config).await?;
    let rows = rows_from_xlsx(&bytes)?;
    monitor_catalog(config, &rows, fetcher, store).await
}

/// Run the pipeline on an already loaded catalog.
pub async fn monitor_catalog(
    config: &Config,
    rows: &[Row],
    fetcher: Arc<dyn Fetch>,
    store: &dyn StateStore,
) -> Result<RunReport> {
    let start_time = Utc::now();

    let matches = extract_matches(config, rows)?;
    let previous = store.load().await?;

    log::info!("Checking {} products for updates...", matches.product_count());
    let prober = UpdateProber::from_config(fetcher, config)?;
    let stage = probe_all(&prober, &matches, config).await;

    let diff = calculate_diff(stage.items, &previous);
    if !diff.has_changes() {
        log::debug!("No signature changes since last run");
    }
    store.save(&diff.state).await?;

    let feed_path = PathBuf::from(&config.feed.output);
    let renderer = FeedRenderer::from_config(&config.feed);
    let feed_items_written = renderer.write(&feed_path, &diff.all_items).await?;

    let report = RunReport {
        start_time: Some(start_time),
        end_time: Some(Utc::now()),
        matched_products: matches.product_count(),
        skipped_no_url: stage.skipped_no_url,
        probed: stage.probed,
        no_feed: stage.no_feed,
        empty_feed: stage.empty_feed,
        no_usable_date: stage.no_usable_date,
        failures: stage.failures,
        all_items: diff.all_items,
        new_items: diff.new_items,
        feed_items_written,
        feed_path,
    };

    log::info!(
        "Run complete: {} items, {} new, {} failed probes",
        report.all_items.len(),
        report.new_count(),
        report.failures.len()
    );
    Ok(report)
}

fn extract_matches(config: &Config, rows: &[Row]) -> Result<CatalogMatches> {
    let matches = CatalogExtractor::from_config(config).extract(rows)?;
    for group in &matches.groups {
        log::info!(
            "Substance '{}': {} products",
            group.substance,
            group.products.len()
        );
    }
    Ok(matches)
}

/// Probe every matched product with bounded concurrency.
///
/// Results are consumed here as they complete and re-ordered by catalog
/// position afterwards, so network timing never changes the outcome.
async fn probe_all(prober: &UpdateProber, matches: &CatalogMatches, config: &Config) -> ProbeStage {
    let delay = Duration::from_millis(config.http.request_delay_ms);
    let concurrency = config.http.max_concurrent.max(1);

    let mut stage = ProbeStage::default();
    let mut jobs: Vec<(usize, &Product)> = Vec::new();
    for (idx, product) in matches.products().enumerate() {
        if product.source_url.is_empty() {
            log::debug!("Skipping {}: no product URL in catalog", product.name);
            stage.skipped_no_url += 1;
        } else {
            jobs.push((idx, product));
        }
    }
    stage.probed = jobs.len();

    let mut found: Vec<(usize, UpdateItem)> = Vec::new();
    let mut results = stream::iter(jobs)
        .map(|(idx, product)| async move {
            // Throttle before the timed probe so the wait never counts against it.
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            (idx, product, prober.probe(product).await)
        })
        .buffer_unordered(concurrency);

    while let Some((idx, product, result)) = results.next().await {
        match result {
            Ok(ProbeOutcome::Found(item)) => {
                log::debug!("{}: {} ({})", product.name, item.title, item.raw_date);
                found.push((idx, item));
            }
            Ok(ProbeOutcome::NoFeed) => {
                log::info!("No RSS feed found for {}", product.name);
                stage.no_feed += 1;
            }
            Ok(ProbeOutcome::EmptyFeed) => {
                log::info!("RSS feed for {} has no items", product.name);
                stage.empty_feed += 1;
            }
            Ok(ProbeOutcome::NoUsableDate) => {
                log::info!("Latest update for {} has no date; skipped", product.name);
                stage.no_usable_date += 1;
            }
            Err(error) => {
                log::warn!("Failed to probe {} ({}): {}", product.name, product.source_url, error);
                stage.failures.push(ProbeFailure {
                    product: product.name.clone(),
                    substance: product.substance.clone(),
                    message: error.to_string(),
                });
            }
        }
    }

    found.sort_by_key(|(idx, _)| *idx);
    stage.items = found.into_iter().map(|(_, item)| item).collect();
    stage
}
