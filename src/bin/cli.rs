//! medwatch CLI
//!
//! Polls the EMA medicines catalog and republishes product updates as RSS.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use medwatch::{
    error::Result,
    models::Config,
    pipeline,
    storage::{JsonStateStore, StateStore},
    utils::http::HttpFetcher,
};

/// medwatch - EMA Medicine Update Monitor
#[derive(Parser, Debug)]
#[command(name = "medwatch", version, about = "EMA medicine update monitor")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "medwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every monitored product and regenerate the feed (default)
    Run(RunArgs),

    /// Download the catalog and list matching products
    Catalog,

    /// Validate configuration
    Validate,

    /// Show recorded state
    Info,
}

/// One-off overrides for a run.
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Feed output file
    #[arg(short, long)]
    output: Option<String>,

    /// State file
    #[arg(long)]
    state: Option<String>,

    /// Maximum items in the feed
    #[arg(long)]
    max_items: Option<usize>,

    /// Public URL of the feed
    #[arg(long)]
    feed_url: Option<String>,
}

impl RunArgs {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.output {
            config.feed.output = path;
        }
        if let Some(path) = self.state {
            config.monitor.state_file = path;
        }
        if let Some(max) = self.max_items {
            config.feed.max_items = max;
        }
        if let Some(url) = self.feed_url {
            config.feed.feed_url = url;
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn run(config: &Config) -> Result<()> {
    config.validate()?;

    let fetcher = Arc::new(HttpFetcher::from_config(&config.http)?);
    let store = JsonStateStore::new(&config.monitor.state_file);
    let report = pipeline::run_monitor(config, fetcher, &store).await?;

    if report.new_items.is_empty() {
        println!("\nNo new updates found since last check.");
    } else {
        println!("\nFound {} new updates.", report.new_count());
        for item in &report.new_items {
            println!("  - {}", item.summary_line());
        }
    }
    if !report.failures.is_empty() {
        log::warn!("{} products could not be checked:", report.failures.len());
        for failure in &report.failures {
            log::warn!("  {} [{}]: {}", failure.product, failure.substance, failure.message);
        }
    }
    log::info!(
        "Feed: {} ({} items)",
        report.feed_path.display(),
        report.feed_items_written
    );
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    log::debug!("Configuration: {}", cli.config.display());

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => {
            args.apply(&mut config);
            log::info!("Starting EMA monitoring process...");
            run(&config).await?;
            log::info!("Monitoring process finished.");
        }

        Command::Catalog => {
            let fetcher = HttpFetcher::from_config(&config.http)?;
            let matches = pipeline::run_catalog(&config, &fetcher).await?;
            for group in &matches.groups {
                println!("{} ({})", group.substance, group.products.len());
                for product in &group.products {
                    println!("  - {} <{}>", product.name, product.source_url);
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} substances)", config.substances().len());
        }

        Command::Info => {
            let store = JsonStateStore::new(&config.monitor.state_file);
            log::info!("State file: {}", store.path().display());
            let state = store.load().await?;
            if state.is_empty() {
                log::info!("No updates recorded yet.");
            }
            for (product, signature) in &state {
                println!("{product}: {signature}");
            }
        }
    }

    Ok(())
}
