//! Phone resolution
//!
//! The phones endpoint is rate limited per tier. A lookup is a small state
//! machine driven by the status of each failed answer:
//!
//! | Status | Tier | Next step |
//! |--------|------|-----------|
//! | 429 | any | refresh the tier's token, repeat the same request |
//! | 403 | personal | sleep the forbidden cooldown, repeat the same request |
//! | anything else | any | fatal |
//!
//! Both loops are unbounded unless `[rate-limit]` caps them.

use crate::auth::TokenKind;
use crate::config::{PhoneConfig, RateLimitConfig};
use crate::parser::OfferDetails;
use crate::ScrapeError;
use std::time::Duration;

const TOO_MANY_REQUESTS: u16 = 429;
const FORBIDDEN: u16 = 403;

/// Caps for the rate-limit loops; `None` means unbounded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_token_refreshes: Option<u32>,
    pub max_cooldowns: Option<u32>,
    pub forbidden_cooldown: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            max_token_refreshes: config.max_token_refreshes,
            max_cooldowns: config.max_cooldowns,
            forbidden_cooldown: Duration::from_secs(config.forbidden_cooldown_secs),
        }
    }
}

/// Recovery step chosen after a failed phones request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneAction {
    /// Acquire a new token for the tier, then repeat the request
    RefreshToken,
    /// Sleep, then repeat the request
    Cooldown(Duration),
}

/// Rate-limit state of one phone lookup
#[derive(Debug)]
pub struct PhoneResolver {
    item_id: u64,
    tier: TokenKind,
    url: String,
    policy: RetryPolicy,
    refreshes: u32,
    cooldowns: u32,
}

impl PhoneResolver {
    pub fn new(item_id: u64, tier: TokenKind, url: &str, policy: RetryPolicy) -> Self {
        Self {
            item_id,
            tier,
            url: url.to_string(),
            policy,
            refreshes: 0,
            cooldowns: 0,
        }
    }

    pub fn tier(&self) -> TokenKind {
        self.tier
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Token refreshes performed so far
    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }

    /// Cooldowns performed so far
    pub fn cooldowns(&self) -> u32 {
        self.cooldowns
    }

    /// Chooses the next step after a failed request
    ///
    /// # Arguments
    ///
    /// * `status` - Status of the failed answer, `None` if the server was
    ///   never reached
    ///
    /// # Returns
    ///
    /// * `Ok(PhoneAction)` - Recoverable; perform the action and retry
    /// * `Err(ScrapeError)` - Fatal for the lookup (and the run)
    pub fn on_failure(&mut self, status: Option<u16>) -> Result<PhoneAction, ScrapeError> {
        match status {
            Some(TOO_MANY_REQUESTS) => {
                if let Some(max) = self.policy.max_token_refreshes {
                    if self.refreshes >= max {
                        return Err(self.exhausted(format!("{} token refreshes", max)));
                    }
                }
                self.refreshes += 1;
                Ok(PhoneAction::RefreshToken)
            }
            Some(FORBIDDEN) if self.tier == TokenKind::Personal => {
                if let Some(max) = self.policy.max_cooldowns {
                    if self.cooldowns >= max {
                        return Err(self.exhausted(format!("{} cooldowns", max)));
                    }
                }
                self.cooldowns += 1;
                Ok(PhoneAction::Cooldown(self.policy.forbidden_cooldown))
            }
            other => Err(ScrapeError::request_failed(&self.url, other)),
        }
    }

    fn exhausted(&self, reason: String) -> ScrapeError {
        ScrapeError::RetryBudgetExhausted {
            item_id: self.item_id,
            tier: self.tier,
            reason,
        }
    }
}

/// Picks the access tier for an item's phones, `None` if it shows none
///
/// Unprotected phones go through the anonymous tier when it is available.
pub fn choose_tier(offer: &OfferDetails, anonymous_available: bool) -> Option<TokenKind> {
    if !offer.has_phone {
        return None;
    }

    if !offer.protect_phone && anonymous_available {
        Some(TokenKind::Anonymous)
    } else {
        Some(TokenKind::Personal)
    }
}

/// Strips separators and adds the country prefix where it is missing
///
/// # Example
///
/// ```
/// use ad_harvest::config::PhoneConfig;
/// use ad_harvest::scraper::normalize_phone;
///
/// let rules = PhoneConfig::default();
/// assert_eq!(normalize_phone("(050) 123-45-67", &rules), "+380501234567");
/// assert_eq!(normalize_phone("380501234567", &rules), "+380501234567");
/// ```
pub fn normalize_phone(raw: &str, rules: &PhoneConfig) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();

    if !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return cleaned;
    }

    let len = cleaned.len();
    if (rules.min_local_digits..=rules.max_local_digits).contains(&len) {
        format!("{}{}", rules.country_prefix, cleaned)
    } else if len == rules.international_digits && cleaned.starts_with(&rules.country_code) {
        format!("+{}", cleaned)
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{sample_offer_json, PageParser, SiteParser};

    fn unbounded() -> RetryPolicy {
        RetryPolicy::from_config(&RateLimitConfig::default())
    }

    #[test]
    fn test_normalize_local_number() {
        let rules = PhoneConfig::default();
        assert_eq!(normalize_phone("0501234567", &rules), "+380501234567");
        assert_eq!(normalize_phone("050 123 45 67", &rules), "+380501234567");
    }

    #[test]
    fn test_normalize_international_number() {
        let rules = PhoneConfig::default();
        assert_eq!(normalize_phone("380501234567", &rules), "+380501234567");
        assert_eq!(normalize_phone("+38 (050) 123-45-67", &rules), "+380501234567");
    }

    #[test]
    fn test_other_lengths_pass_through() {
        let rules = PhoneConfig::default();
        assert_eq!(normalize_phone("1234567", &rules), "1234567");
        assert_eq!(normalize_phone("4915112345678", &rules), "4915112345678");
        assert_eq!(normalize_phone("123456789012", &rules), "123456789012");
    }

    #[test]
    fn test_too_many_requests_refreshes_token() {
        let mut resolver = PhoneResolver::new(1, TokenKind::Anonymous, "u", unbounded());
        for _ in 0..50 {
            assert_eq!(resolver.on_failure(Some(429)).unwrap(), PhoneAction::RefreshToken);
        }
        assert_eq!(resolver.refreshes(), 50);
        assert_eq!(resolver.cooldowns(), 0);
    }

    #[test]
    fn test_forbidden_cools_down_only_on_personal_tier() {
        let mut personal = PhoneResolver::new(1, TokenKind::Personal, "u", unbounded());
        assert_eq!(
            personal.on_failure(Some(403)).unwrap(),
            PhoneAction::Cooldown(Duration::from_secs(100))
        );

        let mut anonymous = PhoneResolver::new(1, TokenKind::Anonymous, "u", unbounded());
        assert!(matches!(
            anonymous.on_failure(Some(403)),
            Err(ScrapeError::RequestFailed {
                status_code: Some(403),
                ..
            })
        ));
    }

    #[test]
    fn test_other_failures_are_fatal() {
        let mut resolver = PhoneResolver::new(1, TokenKind::Personal, "u", unbounded());
        assert!(resolver.on_failure(Some(500)).is_err());
        assert!(matches!(
            resolver.on_failure(None),
            Err(ScrapeError::RequestFailed {
                status_code: None,
                ..
            })
        ));
    }

    #[test]
    fn test_refresh_budget() {
        let policy = RetryPolicy {
            max_token_refreshes: Some(2),
            ..unbounded()
        };
        let mut resolver = PhoneResolver::new(9, TokenKind::Personal, "u", policy);
        assert!(resolver.on_failure(Some(429)).is_ok());
        assert!(resolver.on_failure(Some(429)).is_ok());
        assert!(matches!(
            resolver.on_failure(Some(429)),
            Err(ScrapeError::RetryBudgetExhausted { item_id: 9, .. })
        ));
    }

    #[test]
    fn test_cooldown_budget() {
        let policy = RetryPolicy {
            max_cooldowns: Some(1),
            ..unbounded()
        };
        let mut resolver = PhoneResolver::new(9, TokenKind::Personal, "u", policy);
        assert!(resolver.on_failure(Some(403)).is_ok());
        assert!(resolver.on_failure(Some(403)).is_err());
    }

    #[test]
    fn test_choose_tier() {
        let parser = SiteParser::new(&Default::default()).unwrap();
        let open = parser.parse_offer(&sample_offer_json(5, true, false)).unwrap();
        let protected = parser.parse_offer(&sample_offer_json(5, true, true)).unwrap();
        let silent = parser.parse_offer(&sample_offer_json(5, false, false)).unwrap();

        assert_eq!(choose_tier(&open, true), Some(TokenKind::Anonymous));
        assert_eq!(choose_tier(&open, false), Some(TokenKind::Personal));
        assert_eq!(choose_tier(&protected, true), Some(TokenKind::Personal));
        assert_eq!(choose_tier(&silent, true), None);
    }
}
