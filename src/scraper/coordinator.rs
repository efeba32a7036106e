//! Scrape loop - top-level run orchestration
//!
//! This module drives a run from start to export:
//! - Restoring (or resetting) the persisted cursor and snapshot
//! - Acquiring the initial tokens and the category tree
//! - Walking search links and result pages from the cursor onward
//! - Checkpointing results and cursor after every page
//! - Honoring the stop request between pages, or during rate-limit recovery
//! - Restarting after a fatal error when configured to

use crate::auth::TokenKind;
use crate::config::{search_links_hash, Config};
use crate::output::export_items;
use crate::parser::SiteParser;
use crate::scraper::context::{build_token_manager, Clients, ScrapeContext};
use crate::state::{Item, ItemStore, ProgressStore};
use crate::{ScrapeError, FATAL_ERROR};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a scrape run ended
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every search link was exhausted; carries the full result set
    Completed(Vec<Item>),
    /// A stop was requested; flushed results and cursor are kept
    Stopped,
}

/// Main scrape coordinator
pub struct Scraper {
    ctx: ScrapeContext,
    links: Vec<String>,
    cancel: CancellationToken,
}

impl Scraper {
    pub fn new(ctx: ScrapeContext, links: Vec<String>, cancel: CancellationToken) -> Self {
        Self { ctx, links, cancel }
    }

    /// Builds a scraper with every collaborator taken from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded and validated configuration
    /// * `links` - Search-result URLs, in scrape order
    /// * `cancel` - Stop request, polled after each page
    /// * `reset_progress` - Discard the saved cursor and snapshot first
    ///
    /// # Returns
    ///
    /// * `Ok(Scraper)` - Ready for `init`
    /// * `Err(ScrapeError)` - State, credentials or clients could not be set up
    pub async fn from_config(
        config: Config,
        links: Vec<String>,
        cancel: CancellationToken,
        reset_progress: bool,
    ) -> crate::Result<Self> {
        let mut progress = ProgressStore::load(Path::new(&config.paths.progress))?;
        if reset_progress {
            tracing::info!("Resetting saved progress and intermediate results.");
            progress.reset()?;
            ItemStore::empty(Path::new(&config.paths.snapshot)).clear()?;
        }
        progress.check_links_hash(&search_links_hash(&links));

        if config.general.save_images {
            std::fs::create_dir_all(&config.paths.image_dir)?;
        }

        let tokens = build_token_manager(&config, progress.progress().account_index)?;
        // The rotator may have clamped an out-of-range saved index
        progress.set_account_index(tokens.accounts().index());

        let clients = Clients::from_config(&config).await?;
        let parser = SiteParser::new(&config.parser)?;

        let ctx = ScrapeContext::new(config, clients, tokens, progress, Box::new(parser));
        Ok(Self::new(ctx, links, cancel))
    }

    pub fn context(&self) -> &ScrapeContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ScrapeContext {
        &mut self.ctx
    }

    /// Acquires the tokens and the category tree a run depends on
    pub async fn init(&mut self) -> crate::Result<()> {
        self.ctx.refresh_token(TokenKind::Personal).await?;
        self.ctx.load_categories().await?;
        if self.ctx.clients.anonymous.is_some() {
            self.ctx.refresh_token(TokenKind::Anonymous).await?;
        }
        Ok(())
    }

    /// Walks every search link from the saved cursor onward
    ///
    /// After each page the whole result set is flushed and the page cursor
    /// advanced, in that order. A stop request is honored at that point, or
    /// earlier when an item is stuck recovering from rate limits; the
    /// unfinished page then stays at the cursor.
    pub async fn run(&mut self) -> crate::Result<RunOutcome> {
        let mut items = ItemStore::load(Path::new(&self.ctx.config.paths.snapshot))?;

        while self.ctx.progress.progress().search_link_index < self.links.len() {
            let link = self.links[self.ctx.progress.progress().search_link_index].clone();
            tracing::info!("Scraping search request: {}.", link);

            let page_count = self.ctx.page_count(&link).await?;
            tracing::info!("Total page count: {}.", page_count);

            while self.ctx.progress.progress().page <= page_count {
                let page = self.ctx.progress.progress().page;
                tracing::info!("Scraping items for page {} of {}.", page, page_count);

                let item_ids = self.ctx.item_ids(&link, page).await?;
                for item_id in item_ids {
                    match self.ctx.process_item(&mut items, item_id, &self.cancel).await {
                        Ok(_) => {}
                        Err(ScrapeError::Interrupted { item_id }) => {
                            tracing::warn!(
                                "Stopped while retrying item {}. Page {} will be scraped again.",
                                item_id,
                                page
                            );
                            return Ok(RunOutcome::Stopped);
                        }
                        Err(e) => return Err(e),
                    }
                }

                tracing::info!("Items currently scraped: {}.", items.len());
                items.flush()?;
                tracing::info!("Saving intermediate results for page {}: OK.", page);
                self.ctx.progress.advance_page()?;

                if self.cancel.is_cancelled() {
                    return Ok(RunOutcome::Stopped);
                }
            }

            self.ctx.progress.advance_link()?;
        }

        Ok(RunOutcome::Completed(items.into_items()))
    }

    /// Runs to completion and exports, restarting after fatal errors if enabled
    pub async fn execute(&mut self) -> crate::Result<RunOutcome> {
        if self.ctx.config.general.restart_on_error {
            tracing::info!("Automatic 'restart-on-error' mode activated.");
        }

        loop {
            let error = match self.run_and_export().await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => e,
            };

            tracing::error!("{} ({})", FATAL_ERROR, error);
            if !self.ctx.config.general.restart_on_error {
                return Err(error);
            }

            tracing::info!("Restarting scraping process after a critical fail.");
            let cooldown = Duration::from_secs(self.ctx.config.general.restart_cooldown_secs);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Scraping process stopped by user.");
                    return Ok(RunOutcome::Stopped);
                }
                _ = tokio::time::sleep(cooldown) => {}
            }

            let progress_path = Path::new(&self.ctx.config.paths.progress);
            self.ctx.progress = ProgressStore::load(progress_path)?;
        }
    }

    async fn run_and_export(&mut self) -> crate::Result<RunOutcome> {
        match self.run().await? {
            RunOutcome::Stopped => {
                tracing::info!("Scraping process stopped by user.");
                Ok(RunOutcome::Stopped)
            }
            RunOutcome::Completed(items) => {
                tracing::info!("Scraping process complete. Now saving the results.");
                if export_items(&items, &self.ctx.config.paths)? {
                    tracing::info!("Saving complete.");
                }
                Ok(RunOutcome::Completed(items))
            }
        }
    }

    /// Releases the browser session, the relay and any proxy backend
    pub async fn shutdown(&mut self) {
        self.ctx.tokens.close().await;
        self.ctx.clients.site.shutdown().await;
    }
}
