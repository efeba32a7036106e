//! Scraping pipeline
//!
//! This module contains the orchestration of a run:
//! - `ScrapeContext`: clients, tokens, cursor and parser shared by every step
//! - Item pipeline: dedup, detail fetch, category, phones, images, accumulate
//! - `PhoneResolver`: rate-limit state machine for the phones endpoint
//! - `Scraper`: the link → page → item loop with stop and restart handling
//! - Account check mode

mod accounts;
mod context;
mod coordinator;
mod images;
mod phones;
mod pipeline;

pub use accounts::{check_accounts, AccountReport};
pub use context::{build_token_manager, Clients, ScrapeContext};
pub use coordinator::{RunOutcome, Scraper};
pub use images::{image_file_name, save_item_images};
pub use phones::{choose_tier, normalize_phone, PhoneAction, PhoneResolver, RetryPolicy};
pub use pipeline::{ItemOutcome, SOFT_REJECT_STATUSES};
