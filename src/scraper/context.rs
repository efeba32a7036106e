use crate::auth::{
    load_accounts, AccountRotator, ExternalSessionProvider, TokenKind, TokenManager,
};
use crate::config::{Config, ProxyMode};
use crate::http::{FetchResult, HttpClient, ProxySource, TorRelay};
use crate::parser::{CategoryTree, PageParser};
use crate::state::ProgressStore;
use crate::ScrapeError;
use std::path::Path;
use std::time::Duration;

/// HTTP clients, one per access path
pub struct Clients {
    /// Search pages, landing page and images; follows `[proxy]`
    pub site: HttpClient,
    /// Item details and personal-tier phones
    pub api: HttpClient,
    /// Category tree (sends the API version header)
    pub catalog: HttpClient,
    /// Anonymous-tier phones through the relay; absent when the tier is off
    pub anonymous: Option<HttpClient>,
}

impl Clients {
    pub async fn from_config(config: &Config) -> crate::Result<Self> {
        let timeout = Duration::from_secs(config.http.timeout_secs);
        let proxy = ProxySource::from_config(&config.proxy, &config.anonymous, timeout)?;
        let ip_check =
            (proxy.mode() != ProxyMode::Direct).then_some(config.site.ip_check_url.as_str());
        let site = HttpClient::connect("site", &config.http, proxy, ip_check).await?;

        let api = HttpClient::direct("api", &config.http)?;

        let mut catalog = HttpClient::direct("catalog", &config.http)?;
        catalog.set_header("Version", &config.site.api_version_header)?;

        let anonymous = if config.general.use_anonymous_tier {
            Some(HttpClient::with_proxy(
                "anonymous",
                &config.http,
                &config.anonymous.socks_proxy,
            )?)
        } else {
            None
        };

        Ok(Self {
            site,
            api,
            catalog,
            anonymous,
        })
    }

    /// Client that carries the given tier's token
    pub fn for_tier(&self, tier: TokenKind) -> Option<&HttpClient> {
        match tier {
            TokenKind::Personal => Some(&self.api),
            TokenKind::Anonymous => self.anonymous.as_ref(),
        }
    }
}

/// Builds the token manager from the credential table and session settings
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `start_index` - Persisted account index to resume from
pub fn build_token_manager(config: &Config, start_index: usize) -> crate::Result<TokenManager> {
    let credentials = load_accounts(Path::new(&config.paths.accounts))?;
    tracing::info!("Loaded {} accounts", credentials.len());

    let accounts = AccountRotator::new(credentials, start_index)?;
    let provider = ExternalSessionProvider::new(&config.session, &config.site.host);
    let relay = config
        .general
        .use_anonymous_tier
        .then(|| TorRelay::new(&config.anonymous));

    Ok(TokenManager::new(
        Box::new(provider),
        accounts,
        relay,
        &config.anonymous.socks_proxy,
    ))
}

/// Everything a scrape step needs, passed explicitly
pub struct ScrapeContext {
    pub config: Config,
    pub clients: Clients,
    pub tokens: TokenManager,
    pub progress: ProgressStore,
    pub parser: Box<dyn PageParser>,
    pub categories: CategoryTree,
}

impl ScrapeContext {
    pub fn new(
        config: Config,
        clients: Clients,
        tokens: TokenManager,
        progress: ProgressStore,
        parser: Box<dyn PageParser>,
    ) -> Self {
        Self {
            config,
            clients,
            tokens,
            progress,
            parser,
            categories: CategoryTree::default(),
        }
    }

    /// Acquires a fresh token for `kind` and attaches it to that tier's client
    pub async fn refresh_token(&mut self, kind: TokenKind) -> crate::Result<()> {
        match kind {
            TokenKind::Personal => {
                tracing::info!("Getting personal API token.");
                let token = self.tokens.acquire_personal(&mut self.progress).await?;
                self.clients.api.set_bearer(token.value())?;
                self.clients.catalog.set_bearer(token.value())?;
            }
            TokenKind::Anonymous => {
                tracing::info!("Getting anonymous API token.");
                let landing_url = self.landing_item_url().await?;
                let token = self.tokens.acquire_anonymous(&landing_url).await?;
                if let Some(client) = self.clients.anonymous.as_mut() {
                    client.set_bearer(token.value())?;
                }
            }
        }
        Ok(())
    }

    /// Loads the category tree used for breadcrumbs
    pub async fn load_categories(&mut self) -> crate::Result<()> {
        tracing::info!("Retrieving categories list.");
        let url = self.config.site.categories_url();

        let json = match self.clients.catalog.get_json(&url, &[]).await {
            FetchResult::Success { body, .. } => body,
            other => return Err(ScrapeError::request_failed(&url, other.status_code())),
        };

        self.categories = CategoryTree::from_json(&json)?;
        tracing::info!("Loaded {} categories", self.categories.len());
        Ok(())
    }

    /// Number of result pages for a search link
    pub async fn page_count(&self, link: &str) -> crate::Result<u32> {
        let html = self.fetch_html(link, &[]).await?;
        Ok(self.parser.parse_page_count(&html)?)
    }

    /// Item ids on one result page (pages start at 1)
    pub async fn item_ids(&self, link: &str, page: u32) -> crate::Result<Vec<u64>> {
        let page = page.to_string();
        let html = self.fetch_html(link, &[("page", page.as_str())]).await?;
        Ok(self.parser.parse_item_ids(&html)?)
    }

    async fn landing_item_url(&self) -> crate::Result<String> {
        let host = self.config.site.host.clone();
        let html = self.fetch_html(&host, &[]).await?;
        Ok(self.parser.parse_landing_item_url(&html, &host)?)
    }

    async fn fetch_html(&self, url: &str, params: &[(&str, &str)]) -> crate::Result<String> {
        match self.clients.site.get_html(url, params).await {
            FetchResult::Success { body, .. } => Ok(body),
            other => Err(ScrapeError::request_failed(url, other.status_code())),
        }
    }
}
