//! Mock marketplace and scraper assembly shared by the integration tests

use ad_harvest::auth::{
    AccountRotator, Credential, SessionError, SessionProvider, Token, TokenKind, TokenManager,
};
use ad_harvest::config::{load_config, Config};
use ad_harvest::http::HttpClient;
use ad_harvest::parser::SiteParser;
use ad_harvest::scraper::{Clients, ScrapeContext, Scraper};
use ad_harvest::state::ProgressStore;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const SEARCH_PATH: &str = "/search/bikes";

/// Session provider that hands out numbered tokens and records every call
///
/// With `anonymous_cookie` set, opening a landing page succeeds and leaves
/// that value in the `a_access_token` cookie.
#[derive(Clone, Default)]
pub struct CountingProvider {
    pub logins: Arc<Mutex<Vec<String>>>,
    pub relogins: Arc<Mutex<Vec<String>>>,
    pub visits: Arc<Mutex<Vec<(String, String)>>>,
    pub anonymous_cookie: Option<String>,
}

impl CountingProvider {
    pub fn login_count(&self) -> usize {
        self.logins.lock().unwrap().len()
    }

    pub fn relogin_count(&self) -> usize {
        self.relogins.lock().unwrap().len()
    }

    pub fn visits(&self) -> Vec<(String, String)> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionProvider for CountingProvider {
    async fn login(&mut self, credential: &Credential) -> Result<Token, SessionError> {
        let mut logins = self.logins.lock().unwrap();
        logins.push(credential.login.clone());
        Ok(Token::new(TokenKind::Personal, format!("tok-{}", logins.len())))
    }

    async fn relogin(&mut self, credential: &Credential) -> Result<Token, SessionError> {
        let mut relogins = self.relogins.lock().unwrap();
        relogins.push(credential.login.clone());
        Ok(Token::new(TokenKind::Personal, format!("re-{}", relogins.len())))
    }

    async fn logout(&mut self) -> Result<bool, SessionError> {
        Ok(true)
    }

    async fn open_anonymous(&mut self, url: &str, proxy: &str) -> Result<(), SessionError> {
        if self.anonymous_cookie.is_none() {
            return Err(SessionError::Provider("anonymous tier is off".to_string()));
        }
        self.visits
            .lock()
            .unwrap()
            .push((url.to_string(), proxy.to_string()));
        Ok(())
    }

    fn get_cookie(&self, name: &str) -> Option<String> {
        let visited = !self.visits.lock().unwrap().is_empty();
        (name == "a_access_token" && visited)
            .then(|| self.anonymous_cookie.clone())
            .flatten()
    }
}

/// Search results: `pages[n]` holds the item ids of page `n + 1`
///
/// The `blocked` page (1-based) answers 200 with an access-denied body.
pub struct ResultPages {
    pub pages: Vec<Vec<u64>>,
    pub blocked: Option<usize>,
}

impl Respond for ResultPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let page = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .unwrap_or(1);

        if self.blocked == Some(page) {
            return ResponseTemplate::new(200)
                .set_body_string("<html><body><h1>Access denied</h1></body></html>");
        }

        let rows: String = self
            .pages
            .get(page - 1)
            .map(|ids| {
                ids.iter()
                    .map(|id| {
                        format!(
                            r#"<tr><td><div class="offer-wrapper"><table data-id="{}"><tr><td>x</td></tr></table></div></td></tr>"#,
                            id
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let marker = if self.pages.len() > 1 {
            format!(
                r#"<a data-cy="page-link-last" href="?page={0}"><span>{0}</span></a>"#,
                self.pages.len()
            )
        } else {
            String::new()
        };

        ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><table id="offers_table">{}</table>{}</body></html>"#,
            rows, marker
        ))
    }
}

/// Phones endpoint that answers 429 a fixed number of times first
pub struct FlakyPhones {
    pub failures: usize,
    pub seen: AtomicUsize,
    pub phones: Vec<&'static str>,
}

impl Respond for FlakyPhones {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.failures {
            ResponseTemplate::new(429)
        } else {
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "phones": self.phones } }))
        }
    }
}

/// Item-detail payload in the marketplace API shape
pub fn offer_json(id: u64, category_id: u64, has_phone: bool) -> Value {
    json!({
        "data": {
            "url": format!("https://market.example/item/{}.html", id),
            "title": format!("Bike {}", id),
            "category": {"id": category_id},
            "last_refresh_time": "2021-11-02T10:15:00+02:00",
            "created_time": "2021-11-01T09:00:00+02:00",
            "params": [{"key": "state", "value": {"label": "Used"}}],
            "description": "Ride\r\nit",
            "location": {"city": {"name": "Lviv"}, "region": {"name": "Lviv region"}},
            "photos": [],
            "contact": {"name": "Olena", "phone": has_phone},
            "protect_phone": true,
            "user": {"id": 9, "name": "Olena", "created": "2016-01-01T00:00:00+02:00"}
        }
    })
}

/// A running mock marketplace plus the scratch directory for run state
pub struct Market {
    pub server: MockServer,
    pub dir: TempDir,
}

impl Market {
    pub async fn start() -> Self {
        let market = Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().unwrap(),
        };

        Mock::given(method("GET"))
            .and(path("/api/categories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": 1, "name": "Hobby", "parent_id": 0},
                    {"id": 5, "name": "Bikes", "parent_id": 1}
                ]
            })))
            .mount(&market.server)
            .await;

        std::fs::write(
            market.file("accounts.csv"),
            "login,password\nfirst@mail.ua,pw1\nsecond@mail.ua,pw2\n",
        )
        .unwrap();

        market
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn search_link(&self) -> String {
        format!("{}{}", self.server.uri(), SEARCH_PATH)
    }

    pub async fn serve_results(&self, pages: Vec<Vec<u64>>) {
        self.serve_results_blocking(pages, None).await;
    }

    pub async fn serve_results_blocking(&self, pages: Vec<Vec<u64>>, blocked: Option<usize>) {
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResultPages { pages, blocked })
            .mount(&self.server)
            .await;
    }

    /// Serves an item's details; `expected` pins the number of requests
    pub async fn serve_offer(&self, id: u64, category_id: u64, expected: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(format!("/api/offers/{}", id)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(offer_json(id, category_id, false)),
            );
        match expected {
            Some(n) => mock.expect(n).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    pub async fn serve_offer_with_phone(&self, id: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/offers/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(offer_json(id, 5, true)))
            .mount(&self.server)
            .await;
    }

    /// Serves an item whose phones may go through the anonymous tier
    pub async fn serve_unprotected_offer(&self, id: u64) {
        let mut offer = offer_json(id, 5, true);
        offer["data"]["protect_phone"] = json!(false);
        Mock::given(method("GET"))
            .and(path(format!("/api/offers/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(offer))
            .mount(&self.server)
            .await;
    }

    /// Landing page linking to one item, used for the anonymous cookie
    pub async fn serve_landing(&self) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><h4 class="normal"><a href="/item/bike-ID7.html">Bike</a></h4></body></html>"#,
            ))
            .mount(&self.server)
            .await;
    }

    pub async fn serve_offer_status(&self, id: u64, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/api/offers/{}", id)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub async fn serve_phones(&self, id: u64, phones: FlakyPhones) {
        Mock::given(method("GET"))
            .and(path(format!("/api/offers/{}/phones", id)))
            .respond_with(phones)
            .mount(&self.server)
            .await;
    }

    /// Writes and loads a configuration pointing at this marketplace
    pub fn config(&self, restart_on_error: bool) -> Config {
        let file = |name: &str| self.file(name).display().to_string();
        let toml = format!(
            r#"
[general]
use-anonymous-tier = false
restart-on-error = {restart}
restart-cooldown-secs = 0

[paths]
search-links = "{links}"
accounts = "{accounts}"
progress = "{progress}"
snapshot = "{snapshot}"
csv = "{csv}"
sqlite = "{sqlite}"

[http]
max-retries = 1
request-delay-ms = 0

[site]
host = "{host}"
offer-endpoint = "/api/offers/{{id}}"
phones-endpoint = "/api/offers/{{id}}/phones"
categories-endpoint = "/api/categories"

[session]
command = "session-helper"
"#,
            restart = restart_on_error,
            links = file("links.txt"),
            accounts = file("accounts.csv"),
            progress = file("progress.json"),
            snapshot = file("items.json"),
            csv = file("items.csv"),
            sqlite = file("items.db"),
            host = self.server.uri(),
        );

        let path = self.file("config.toml");
        std::fs::write(&path, toml).unwrap();
        load_config(&path).unwrap()
    }

    /// Assembles a scraper with direct clients and the counting provider
    pub fn scraper(
        &self,
        config: Config,
        provider: CountingProvider,
        cancel: CancellationToken,
    ) -> Scraper {
        self.assemble(config, provider, cancel, false)
    }

    /// Same as `scraper`, plus a direct client for the anonymous tier
    pub fn scraper_with_anonymous(
        &self,
        config: Config,
        provider: CountingProvider,
        cancel: CancellationToken,
    ) -> Scraper {
        self.assemble(config, provider, cancel, true)
    }

    fn assemble(
        &self,
        config: Config,
        provider: CountingProvider,
        cancel: CancellationToken,
        anonymous: bool,
    ) -> Scraper {
        let progress = ProgressStore::load(Path::new(&config.paths.progress)).unwrap();

        let credentials = vec![
            Credential::new("first@mail.ua", "pw1"),
            Credential::new("second@mail.ua", "pw2"),
        ];
        let accounts =
            AccountRotator::new(credentials, progress.progress().account_index).unwrap();
        let tokens = TokenManager::new(Box::new(provider), accounts, None, "socks5://unused");

        let mut catalog = HttpClient::direct("catalog", &config.http).unwrap();
        catalog.set_header("Version", "2.0").unwrap();
        let clients = Clients {
            site: HttpClient::direct("site", &config.http).unwrap(),
            api: HttpClient::direct("api", &config.http).unwrap(),
            catalog,
            anonymous: anonymous.then(|| HttpClient::direct("anonymous", &config.http).unwrap()),
        };

        let parser = SiteParser::new(&config.parser).unwrap();
        let ctx = ScrapeContext::new(config, clients, tokens, progress, Box::new(parser));
        Scraper::new(ctx, vec![self.search_link()], cancel)
    }
}
