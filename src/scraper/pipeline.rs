//! Per-item pipeline
//!
//! `pending → fetched → (rejected | enriched) → accumulated`
//!
//! An id already in the store short-circuits before any request. A gone or
//! not-found detail page rejects just that item. Every other failure is
//! fatal and propagates to the scrape loop.

use crate::auth::TokenKind;
use crate::http::FetchResult;
use crate::parser::{OfferDetails, NOT_AVAILABLE};
use crate::scraper::images::save_item_images;
use crate::scraper::phones::{
    choose_tier, normalize_phone, PhoneAction, PhoneResolver, RetryPolicy,
};
use crate::scraper::ScrapeContext;
use crate::state::{Item, ItemStore};
use crate::ScrapeError;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Detail-page statuses that skip the item instead of failing the run
pub const SOFT_REJECT_STATUSES: [u16; 2] = [404, 410];

/// How an item id left the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// New item appended to the store
    Accumulated,
    /// Id already present; nothing requested
    Duplicate,
    /// Listing is gone; skipped
    Rejected { status: u16 },
}

impl ScrapeContext {
    /// Runs one item id through the pipeline
    ///
    /// # Arguments
    ///
    /// * `items` - Accumulated result set (the only place items are added)
    /// * `item_id` - Id taken from a result page
    /// * `cancel` - Stop request; cuts short rate-limit recovery only
    ///
    /// # Returns
    ///
    /// * `Ok(ItemOutcome)` - The item was added, skipped as duplicate, or rejected
    /// * `Err(ScrapeError)` - Fatal failure; the run must stop
    pub async fn process_item(
        &mut self,
        items: &mut ItemStore,
        item_id: u64,
        cancel: &CancellationToken,
    ) -> crate::Result<ItemOutcome> {
        if items.contains(item_id) {
            tracing::info!("The item with id = {} is already scraped. Skipping.", item_id);
            return Ok(ItemOutcome::Duplicate);
        }

        tracing::info!("Scraping item (id = {}).", item_id);
        let url = self.config.site.offer_url(item_id);

        let json = match self.clients.api.get_json(&url, &[]).await {
            FetchResult::Success { body, .. } => body,
            FetchResult::HttpError { status_code }
                if SOFT_REJECT_STATUSES.contains(&status_code) =>
            {
                tracing::warn!(
                    "The requested item {} is not available ({}). Skipping.",
                    item_id,
                    status_code
                );
                return Ok(ItemOutcome::Rejected {
                    status: status_code,
                });
            }
            other => return Err(ScrapeError::request_failed(&url, other.status_code())),
        };

        let offer = self.parser.parse_offer(&json)?;
        let category = self.categories.breadcrumb(offer.category_id)?;

        let anonymous_available = self.clients.anonymous.is_some();
        let contact_phones = match choose_tier(&offer, anonymous_available) {
            Some(tier) => {
                let phones = self.resolve_phones(item_id, tier, cancel).await?;
                let phones: Vec<String> = phones
                    .iter()
                    .map(|phone| normalize_phone(phone, &self.config.phones))
                    .collect();
                phones.join(&self.config.phones.separator)
            }
            None => NOT_AVAILABLE.to_string(),
        };

        if self.config.general.save_images && !offer.photos.is_empty() {
            save_item_images(
                &self.clients.site,
                Path::new(&self.config.paths.image_dir),
                item_id,
                &offer.photos,
            )
            .await;
        }

        let separator = &self.config.phones.separator;
        let item = build_item(item_id, offer, category, contact_phones, separator);
        items.push(item);
        Ok(ItemOutcome::Accumulated)
    }

    /// Fetches an item's phones on `tier`, recovering from rate limits
    ///
    /// A stop request ends the recovery with `ScrapeError::Interrupted`.
    pub async fn resolve_phones(
        &mut self,
        item_id: u64,
        tier: TokenKind,
        cancel: &CancellationToken,
    ) -> crate::Result<Vec<String>> {
        match tier {
            TokenKind::Personal => {
                tracing::info!("Retrieving phones as protected (item id = {}).", item_id)
            }
            TokenKind::Anonymous => {
                tracing::info!("Retrieving phones as non-protected (item id = {}).", item_id)
            }
        }

        let url = self.config.site.phones_url(item_id);
        let policy = RetryPolicy::from_config(&self.config.rate_limit);
        let mut resolver = PhoneResolver::new(item_id, tier, &url, policy);

        loop {
            let client = self
                .clients
                .for_tier(tier)
                .ok_or_else(|| ScrapeError::request_failed(&url, None))?;

            let failed = match client.get_json(&url, &[]).await {
                FetchResult::Success { body, .. } => return Ok(self.parser.parse_phones(&body)?),
                other => other.status_code(),
            };

            let action = resolver.on_failure(failed)?;
            if cancel.is_cancelled() {
                return Err(ScrapeError::Interrupted { item_id });
            }

            match action {
                PhoneAction::RefreshToken => {
                    tracing::info!(
                        "Can't retrieve phones: access disallowed. New {} token required.",
                        tier
                    );
                    self.refresh_token(tier).await?;
                }
                PhoneAction::Cooldown(wait) => {
                    tracing::info!(
                        "Maybe too many requests. Waiting for {} seconds.",
                        wait.as_secs()
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(ScrapeError::Interrupted { item_id });
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }
}

/// Assembles the flat record from the parsed payload and resolved fields
fn build_item(
    item_id: u64,
    offer: OfferDetails,
    category: String,
    contact_phones: String,
    separator: &str,
) -> Item {
    let photos = offer
        .photos
        .iter()
        .map(|photo| photo.url.as_str())
        .collect::<Vec<_>>()
        .join(separator);

    Item {
        id: item_id,
        url: offer.url,
        title: offer.title,
        category,
        last_refresh_time: offer.last_refresh_time,
        created_time: offer.created_time,
        price: offer.price,
        state: offer.state,
        description: offer.description,
        city: offer.city,
        region: offer.region,
        photos,
        contact_name: offer.contact_name,
        contact_phones,
        user_id: offer.user_id,
        user_name: offer.user_name,
        user_created: offer.user_created,
        user_last_seen: offer.user_last_seen,
    }
}
