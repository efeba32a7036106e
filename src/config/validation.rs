use crate::config::types::{
    Config, HttpConfig, PathsConfig, PhoneConfig, ProxyConfig, ProxyMode, SessionConfig, SiteConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_paths(&config.paths)?;
    validate_http(&config.http)?;
    validate_site(&config.site)?;
    validate_phones(&config.phones)?;
    validate_proxy(&config.proxy)?;
    validate_session(&config.session)?;
    validate_selectors(config)?;
    Ok(())
}

fn validate_paths(paths: &PathsConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("search-links", &paths.search_links),
        ("accounts", &paths.accounts),
        ("progress", &paths.progress),
        ("snapshot", &paths.snapshot),
        ("csv", &paths.csv),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "paths.{} cannot be empty",
                name
            )));
        }
    }

    if paths.progress == paths.snapshot {
        return Err(ConfigError::Validation(
            "paths.progress and paths.snapshot must be different files".to_string(),
        ));
    }

    Ok(())
}

fn validate_http(http: &HttpConfig) -> Result<(), ConfigError> {
    if http.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            http.max_retries
        )));
    }

    if http.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            http.timeout_secs
        )));
    }

    if http.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if let Some(status) = http
        .pass_through_statuses
        .iter()
        .find(|status| !(400..600).contains(*status))
    {
        return Err(ConfigError::Validation(format!(
            "pass-through-statuses must be error statuses (400-599), got {}",
            status
        )));
    }

    Ok(())
}

fn validate_site(site: &SiteConfig) -> Result<(), ConfigError> {
    let host = Url::parse(&site.host)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site host '{}': {}", site.host, e)))?;

    if host.scheme() != "http" && host.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Site host must use http or https, got '{}'",
            site.host
        )));
    }

    for (name, template) in [
        ("offer-endpoint", &site.offer_endpoint),
        ("phones-endpoint", &site.phones_endpoint),
    ] {
        if !template.contains("{id}") {
            return Err(ConfigError::Validation(format!(
                "{} must contain an {{id}} placeholder, got '{}'",
                name, template
            )));
        }
    }

    Url::parse(&site.ip_check_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid ip-check-url: {}", e)))?;

    Ok(())
}

fn validate_phones(phones: &PhoneConfig) -> Result<(), ConfigError> {
    if phones.min_local_digits > phones.max_local_digits {
        return Err(ConfigError::Validation(format!(
            "min-local-digits ({}) exceeds max-local-digits ({})",
            phones.min_local_digits, phones.max_local_digits
        )));
    }

    if !phones.country_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "country-code must be digits only, got '{}'",
            phones.country_code
        )));
    }

    Ok(())
}

fn validate_proxy(proxy: &ProxyConfig) -> Result<(), ConfigError> {
    match proxy.mode {
        ProxyMode::Fixed => {
            let address = proxy.address.as_deref().ok_or_else(|| {
                ConfigError::Validation("proxy.address is required in fixed mode".to_string())
            })?;
            validate_proxy_url(address)?;
        }
        ProxyMode::List => {
            if proxy.list.is_empty() {
                return Err(ConfigError::Validation(
                    "proxy.list cannot be empty in list mode".to_string(),
                ));
            }
            for address in &proxy.list {
                validate_proxy_url(address)?;
            }
        }
        ProxyMode::Free => {
            if proxy.max_remembered < 1 {
                return Err(ConfigError::Validation(
                    "proxy.max-remembered must be >= 1".to_string(),
                ));
            }
            Url::parse(&proxy.free_list_url)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid free-list-url: {}", e)))?;
        }
        ProxyMode::Direct | ProxyMode::Tor => {}
    }

    Ok(())
}

fn validate_proxy_url(address: &str) -> Result<(), ConfigError> {
    Url::parse(address)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", address, e)))
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.command.trim().is_empty() {
        return Err(ConfigError::Validation(
            "session.command cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_selectors(config: &Config) -> Result<(), ConfigError> {
    for selector in [
        &config.parser.last_page_selector,
        &config.parser.results_selector,
        &config.parser.item_selector,
        &config.parser.landing_item_selector,
    ] {
        scraper::Selector::parse(selector).map_err(|e| {
            ConfigError::Validation(format!("Invalid CSS selector '{}': {:?}", selector, e))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_zero_retries_rejected() {
        let http = HttpConfig {
            max_retries: 0,
            ..HttpConfig::default()
        };
        assert!(validate_http(&http).is_err());
    }

    #[test]
    fn test_pass_through_must_be_error_status() {
        let http = HttpConfig {
            pass_through_statuses: vec![200],
            ..HttpConfig::default()
        };
        assert!(validate_http(&http).is_err());
    }

    #[test]
    fn test_fixed_proxy_requires_address() {
        let proxy = ProxyConfig {
            mode: ProxyMode::Fixed,
            ..ProxyConfig::default()
        };
        assert!(validate_proxy(&proxy).is_err());

        let proxy = ProxyConfig {
            mode: ProxyMode::Fixed,
            address: Some("http://10.0.0.1:3128".to_string()),
            ..ProxyConfig::default()
        };
        assert!(validate_proxy(&proxy).is_ok());
    }

    #[test]
    fn test_list_proxy_requires_entries() {
        let proxy = ProxyConfig {
            mode: ProxyMode::List,
            ..ProxyConfig::default()
        };
        assert!(validate_proxy(&proxy).is_err());
    }

    #[test]
    fn test_phone_digit_range() {
        let phones = PhoneConfig {
            min_local_digits: 11,
            ..PhoneConfig::default()
        };
        assert!(validate_phones(&phones).is_err());
        assert!(validate_phones(&PhoneConfig::default()).is_ok());
    }

    #[test]
    fn test_endpoint_requires_placeholder() {
        let site = SiteConfig {
            host: "https://www.example.ua".to_string(),
            offer_endpoint: "/api/v1/offers/".to_string(),
            phones_endpoint: "/api/v1/offers/{id}/limited-phones/".to_string(),
            categories_endpoint: "/api/partner/categories".to_string(),
            ip_check_url: "http://icanhazip.com".to_string(),
            api_version_header: "2.0".to_string(),
        };
        assert!(validate_site(&site).is_err());
    }
}
