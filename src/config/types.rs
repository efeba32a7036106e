use serde::Deserialize;

/// Main configuration structure for Ad-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub phones: PhoneConfig,
    #[serde(default, rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub anonymous: AnonymousConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub contacts: ContactsConfig,
}

/// Top-level switches for a scraping run
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeneralConfig {
    /// Download item photos into `paths.image-dir`
    #[serde(default)]
    pub save_images: bool,

    /// Restart the whole loop after a fatal error instead of exiting
    #[serde(default)]
    pub restart_on_error: bool,

    /// Fetch unprotected phones through the anonymizing relay
    #[serde(default = "default_true")]
    pub use_anonymous_tier: bool,

    /// Pause before an automatic restart (seconds)
    #[serde(default = "default_restart_cooldown")]
    pub restart_cooldown_secs: u64,

    /// Pause between two authorizations in account-check mode (seconds)
    #[serde(default = "default_check_delay")]
    pub check_delay_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            save_images: false,
            restart_on_error: false,
            use_anonymous_tier: true,
            restart_cooldown_secs: default_restart_cooldown(),
            check_delay_secs: default_check_delay(),
        }
    }
}

/// File locations for inputs, durable state and exports
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathsConfig {
    /// Newline-delimited list of search-result URLs
    pub search_links: String,

    /// Credential table (CSV with `login,password` header)
    pub accounts: String,

    /// Progress cursor record
    pub progress: String,

    /// Whole-snapshot item collection (JSON, overwritten on every flush)
    pub snapshot: String,

    /// Final CSV export
    pub csv: String,

    /// Optional final SQLite export
    #[serde(default)]
    pub sqlite: Option<String>,

    /// Directory for downloaded item photos
    #[serde(default = "default_image_dir")]
    pub image_dir: String,

    /// Directory for the log file
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

/// Request behavior shared by every HTTP client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per request before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Politeness delay after every attempt (milliseconds)
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Statuses handed straight back to the caller instead of retried
    #[serde(default = "default_pass_through")]
    pub pass_through_statuses: Vec<u16>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            request_delay_ms: default_request_delay(),
            user_agent: default_user_agent(),
            pass_through_statuses: default_pass_through(),
        }
    }
}

/// Target-site endpoints; `{id}` is replaced by the item id
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    pub host: String,
    pub offer_endpoint: String,
    pub phones_endpoint: String,
    pub categories_endpoint: String,

    #[serde(default = "default_ip_check_url")]
    pub ip_check_url: String,

    /// Value of the `Version` header sent with category requests
    #[serde(default = "default_api_version")]
    pub api_version_header: String,
}

impl SiteConfig {
    /// Full URL of the item-detail endpoint
    pub fn offer_url(&self, item_id: u64) -> String {
        self.endpoint(&self.offer_endpoint, item_id)
    }

    /// Full URL of the phones-by-item endpoint
    pub fn phones_url(&self, item_id: u64) -> String {
        self.endpoint(&self.phones_endpoint, item_id)
    }

    /// Full URL of the category tree endpoint
    pub fn categories_url(&self) -> String {
        self.endpoint(&self.categories_endpoint, 0)
    }

    fn endpoint(&self, template: &str, item_id: u64) -> String {
        let path = template.replace("{id}", &item_id.to_string());
        if path.starts_with("http://") || path.starts_with("https://") {
            path
        } else {
            format!("{}{}", self.host.trim_end_matches('/'), path)
        }
    }
}

/// Phone number normalization rules
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhoneConfig {
    /// Prefix prepended to local numbers
    #[serde(default = "default_country_prefix")]
    pub country_prefix: String,

    /// Leading digits of an international number without `+`
    #[serde(default = "default_country_code")]
    pub country_code: String,

    #[serde(default = "default_min_local_digits")]
    pub min_local_digits: usize,

    #[serde(default = "default_max_local_digits")]
    pub max_local_digits: usize,

    #[serde(default = "default_international_digits")]
    pub international_digits: usize,

    /// Separator used when joining phones and photo URLs
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            country_prefix: default_country_prefix(),
            country_code: default_country_code(),
            min_local_digits: default_min_local_digits(),
            max_local_digits: default_max_local_digits(),
            international_digits: default_international_digits(),
            separator: default_separator(),
        }
    }
}

/// Rate-limit recovery on the phones endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitConfig {
    /// Sleep after a forbidden response on the personal tier (seconds)
    #[serde(default = "default_forbidden_cooldown")]
    pub forbidden_cooldown_secs: u64,

    /// Token refreshes allowed per phone lookup; unbounded when absent
    #[serde(default)]
    pub max_token_refreshes: Option<u32>,

    /// Cooldowns allowed per phone lookup; unbounded when absent
    #[serde(default)]
    pub max_cooldowns: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            forbidden_cooldown_secs: default_forbidden_cooldown(),
            max_token_refreshes: None,
            max_cooldowns: None,
        }
    }
}

/// How the site client picks its outbound proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    #[default]
    Direct,
    Fixed,
    List,
    Free,
    Tor,
}

/// Proxy settings for the site (HTML) client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProxyConfig {
    #[serde(default)]
    pub mode: ProxyMode,

    /// Proxy used in `fixed` mode
    #[serde(default)]
    pub address: Option<String>,

    /// Proxies consumed round-robin in `list` mode
    #[serde(default)]
    pub list: Vec<String>,

    #[serde(default = "default_free_list_url")]
    pub free_list_url: String,

    /// IP-echo endpoint answering `{"origin": "<ip>"}`
    #[serde(default = "default_validate_url")]
    pub validate_url: String,

    /// Optional page a free proxy must load repeatedly before it is accepted
    #[serde(default)]
    pub test_url: Option<String>,

    #[serde(default = "default_test_attempts")]
    pub test_attempts: u32,

    /// Cap on the remembered-proxy table
    #[serde(default = "default_max_remembered")]
    pub max_remembered: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::Direct,
            address: None,
            list: Vec::new(),
            free_list_url: default_free_list_url(),
            validate_url: default_validate_url(),
            test_url: None,
            test_attempts: default_test_attempts(),
            max_remembered: default_max_remembered(),
        }
    }
}

/// Anonymizing relay used by the anonymous tier
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnonymousConfig {
    #[serde(default = "default_tor_executable")]
    pub tor_executable: String,

    #[serde(default = "default_socks_proxy")]
    pub socks_proxy: String,

    /// Wait after spawning the relay (seconds)
    #[serde(default = "default_startup_secs")]
    pub startup_secs: u64,

    #[serde(default = "default_relay_check_url")]
    pub check_url: String,
}

impl Default for AnonymousConfig {
    fn default() -> Self {
        Self {
            tor_executable: default_tor_executable(),
            socks_proxy: default_socks_proxy(),
            startup_secs: default_startup_secs(),
            check_url: default_relay_check_url(),
        }
    }
}

/// External browser-driver helper
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,
}

/// CSS selectors for the search-results markup
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParserConfig {
    #[serde(default = "default_last_page_selector")]
    pub last_page_selector: String,

    /// Container of the result rows; its absence means the page was not a results page
    #[serde(default = "default_results_selector")]
    pub results_selector: String,

    /// Result rows, matched inside the results container
    #[serde(default = "default_item_selector")]
    pub item_selector: String,

    #[serde(default = "default_item_id_attribute")]
    pub item_id_attribute: String,

    /// Link to any item on the landing page (anonymous token flow)
    #[serde(default = "default_landing_item_selector")]
    pub landing_item_selector: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            last_page_selector: default_last_page_selector(),
            results_selector: default_results_selector(),
            item_selector: default_item_selector(),
            item_id_attribute: default_item_id_attribute(),
            landing_item_selector: default_landing_item_selector(),
        }
    }
}

/// Contact harvesting limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContactsConfig {
    #[serde(default = "default_contacts_depth")]
    pub max_depth: u32,

    #[serde(default = "default_min_phone_digits")]
    pub min_phone_digits: usize,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            max_depth: default_contacts_depth(),
            min_phone_digits: default_min_phone_digits(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_restart_cooldown() -> u64 {
    10
}

fn default_check_delay() -> u64 {
    30
}

fn default_image_dir() -> String {
    "img".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_delay() -> u64 {
    500
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 6.1; rv:94.0) Gecko/20100101 Firefox/94.0".to_string()
}

fn default_pass_through() -> Vec<u16> {
    vec![401, 403, 404, 410, 429]
}

fn default_ip_check_url() -> String {
    "http://icanhazip.com".to_string()
}

fn default_api_version() -> String {
    "2.0".to_string()
}

fn default_country_prefix() -> String {
    "+38".to_string()
}

fn default_country_code() -> String {
    "38".to_string()
}

fn default_min_local_digits() -> usize {
    8
}

fn default_max_local_digits() -> usize {
    10
}

fn default_international_digits() -> usize {
    12
}

fn default_separator() -> String {
    ", ".to_string()
}

fn default_forbidden_cooldown() -> u64 {
    100
}

fn default_free_list_url() -> String {
    "https://free-proxy-list.net".to_string()
}

fn default_validate_url() -> String {
    "https://httpbin.org/ip".to_string()
}

fn default_test_attempts() -> u32 {
    5
}

fn default_max_remembered() -> usize {
    1000
}

fn default_tor_executable() -> String {
    "tor".to_string()
}

fn default_socks_proxy() -> String {
    "socks5h://127.0.0.1:9050".to_string()
}

fn default_startup_secs() -> u64 {
    15
}

fn default_relay_check_url() -> String {
    "https://httpbin.org/".to_string()
}

fn default_session_timeout() -> u64 {
    120
}

fn default_last_page_selector() -> String {
    "a[data-cy='page-link-last'] span".to_string()
}

fn default_results_selector() -> String {
    "table#offers_table".to_string()
}

fn default_item_selector() -> String {
    "div.offer-wrapper table[data-id]".to_string()
}

fn default_item_id_attribute() -> String {
    "data-id".to_string()
}

fn default_landing_item_selector() -> String {
    "h4.normal a[href]".to_string()
}

fn default_contacts_depth() -> u32 {
    1
}

fn default_min_phone_digits() -> usize {
    8
}
