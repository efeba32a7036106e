//! Ad-Harvest main entry point
//!
//! This is the command-line interface for the Ad-Harvest scraper.

use ad_harvest::config::{load_config_with_hash, load_search_links, Config};
use ad_harvest::contacts::{ContactCrawler, TextMiner};
use ad_harvest::http::HttpClient;
use ad_harvest::scraper::{build_token_manager, check_accounts, RunOutcome, Scraper};
use ad_harvest::FATAL_ERROR;
use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_NAME: &str = "scraper.log";

/// Ad-Harvest: a resumable classified-ad scraper
///
/// Walks marketplace search results page by page, collects item details and
/// seller phones, and checkpoints after every page so an interrupted run
/// resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "ad-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable classified-ad scraper", long_about = None)]
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

    /// Discard saved progress and intermediate results, start over
    #[arg(long, conflicts_with_all = ["check_accounts", "contacts"])]
    reset_progress: bool,

    /// Log in with every account and report which ones work
    #[arg(long, conflicts_with = "contacts")]
    check_accounts: bool,

    /// Collect contact emails and phones from a website and exit
    #[arg(long, value_name = "URL")]
    contacts: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;

    let _guard = setup_logging(cli.verbose, cli.quiet, Path::new(&config.paths.log_dir))?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if let Some(url) = cli.contacts.as_deref() {
        handle_contacts(&config, url).await;
    } else if cli.check_accounts {
        handle_check_accounts(&config).await;
    } else {
        handle_scrape(config, cli.reset_progress).await;
    }

    Ok(())
}

/// Sets up console and file logging based on verbosity level
///
/// The returned guard flushes the file writer when dropped.
fn setup_logging(verbose: u8, quiet: bool, log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ad_harvest=info,warn"),
            1 => EnvFilter::new("ad_harvest=debug,info"),
            2 => EnvFilter::new("ad_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(guard)
}

/// Cancels `token` on the first Ctrl-C and exits on the second
fn spawn_interrupt_listener(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current page.");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received. {}", FATAL_ERROR);
            std::process::exit(130);
        }
    });
}

/// Handles the default mode: scrape, checkpoint, export
async fn handle_scrape(config: Config, reset_progress: bool) {
    let links = match load_search_links(Path::new(&config.paths.search_links)) {
        Ok(links) => links,
        Err(e) => {
            tracing::error!("Can't load search links: {}", e);
            tracing::error!("{}", FATAL_ERROR);
            return;
        }
    };
    tracing::info!("Loaded {} search links", links.len());

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    let mut scraper = match Scraper::from_config(config, links, cancel, reset_progress).await {
        Ok(scraper) => scraper,
        Err(e) => {
            tracing::error!("Initialization failed: {}", e);
            tracing::error!("{}", FATAL_ERROR);
            return;
        }
    };

    if let Err(e) = scraper.init().await {
        tracing::error!("Initialization failed: {}", e);
        tracing::error!("{}", FATAL_ERROR);
        scraper.shutdown().await;
        return;
    }

    match scraper.execute().await {
        Ok(RunOutcome::Completed(items)) => {
            tracing::info!("Scraping finished with {} items", items.len())
        }
        Ok(RunOutcome::Stopped) => tracing::info!("Progress saved; run again to resume."),
        // Already logged with the fatal marker
        Err(_) => {}
    }

    scraper.shutdown().await;
}

/// Handles --check-accounts: logs in with every credential, no scraping
async fn handle_check_accounts(config: &Config) {
    let mut tokens = match build_token_manager(config, 0) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!("Can't prepare accounts: {}", e);
            tracing::error!("{}", FATAL_ERROR);
            return;
        }
    };

    let delay = Duration::from_secs(config.general.check_delay_secs);
    let report = check_accounts(&mut tokens, delay).await;
    for (login, reason) in &report.invalid {
        tracing::warn!("Invalid account {}: {}", login, reason);
    }
}

/// Handles --contacts: harvests emails and phones from one website
async fn handle_contacts(config: &Config, url: &str) {
    let prepared = TextMiner::new(config.contacts.min_phone_digits)
        .map_err(|e| e.to_string())
        .and_then(|miner| {
            HttpClient::direct("contacts", &config.http)
                .map(|client| (miner, client))
                .map_err(|e| e.to_string())
        });
    let (miner, client) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!("Can't prepare the contact crawler: {}", e);
            return;
        }
    };

    let crawler = ContactCrawler::new(&client, miner, config.contacts.max_depth);
    let report = crawler.harvest(url).await;

    tracing::info!("Emails found: {}", report.emails.len());
    for email in &report.emails {
        println!("email\t{}", email);
    }
    tracing::info!("Phones found: {}", report.phones.len());
    for phone in &report.phones {
        println!("phone\t{}", phone);
    }
}
