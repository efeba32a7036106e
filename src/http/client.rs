//! Retrying HTTP client
//!
//! Every request made by the scraper goes through `HttpClient`, which:
//! - Applies the configured header set, timeout and current proxy
//! - Retries transport failures and non-2xx answers up to `max-retries`
//! - Sleeps a fixed delay after every attempt (politeness throttle)
//! - Hands pass-through statuses (gone, not-found, too-many-requests, ...)
//!   straight back to the caller, who knows what they mean

use crate::config::HttpConfig;
use crate::http::proxy::ProxySource;
use crate::http::HttpError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Proxy};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult<T> {
    /// The server answered with a 2xx status
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Decoded body
        body: T,
    },

    /// The server answered with an error status
    HttpError {
        /// The last status code received
        status_code: u16,
    },

    /// The server was never reached (connection refused, timeout, ...)
    NetworkError {
        /// Error description
        error: String,
    },

    /// The server answered 2xx but the body could not be decoded
    DecodeError {
        /// HTTP status code of the answer
        status_code: u16,
        /// Error description
        error: String,
    },
}

impl<T> FetchResult<T> {
    /// Status code of the last answer, `None` when the server was never reached
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code, .. }
            | Self::HttpError { status_code }
            | Self::DecodeError { status_code, .. } => Some(*status_code),
            Self::NetworkError { .. } => None,
        }
    }

    /// Returns true if a decoded body is available
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Consumes the result, returning the body if there is one
    pub fn into_body(self) -> Option<T> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Decodes a successful body, turning decode failures into `DecodeError`
    pub fn and_then_body<U, F>(self, decode: F) -> FetchResult<U>
    where
        F: FnOnce(T) -> Result<U, String>,
    {
        match self {
            Self::Success {
                final_url,
                status_code,
                body,
            } => match decode(body) {
                Ok(body) => FetchResult::Success {
                    final_url,
                    status_code,
                    body,
                },
                Err(error) => FetchResult::DecodeError { status_code, error },
            },
            Self::HttpError { status_code } => FetchResult::HttpError { status_code },
            Self::NetworkError { error } => FetchResult::NetworkError { error },
            Self::DecodeError { status_code, error } => {
                FetchResult::DecodeError { status_code, error }
            }
        }
    }
}

/// Builds a reqwest client with the configured timeout and optional proxy
///
/// # Arguments
///
/// * `settings` - Request behavior (user agent, timeout)
/// * `proxy` - Proxy URL (`http://`, `socks5h://`, ...) or `None` for direct
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client or parse the proxy URL
pub fn build_http_client(settings: &HttpConfig, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .gzip(true)
        .brotli(true);

    builder = match proxy {
        Some(address) => builder.proxy(Proxy::all(address)?),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// HTTP client with retries, a politeness delay and a swappable proxy
pub struct HttpClient {
    label: String,
    settings: HttpConfig,
    headers: HeaderMap,
    proxy: ProxySource,
    current_proxy: Option<String>,
    ip_check_url: Option<String>,
    client: Client,
}

impl HttpClient {
    /// Creates a client that talks to servers directly
    pub fn direct(label: &str, settings: &HttpConfig) -> Result<Self, HttpError> {
        Self::with_current(label, settings, ProxySource::Direct, None)
    }

    /// Creates a client bound to a single proxy address
    pub fn with_proxy(label: &str, settings: &HttpConfig, address: &str) -> Result<Self, HttpError> {
        Self::with_current(
            label,
            settings,
            ProxySource::Fixed(address.to_string()),
            Some(address.to_string()),
        )
    }

    /// Creates a client and selects its first proxy from `proxy`
    ///
    /// For the free-proxy and relay backends this performs network I/O
    /// (listing download, relay startup) before returning.
    pub async fn connect(
        label: &str,
        settings: &HttpConfig,
        proxy: ProxySource,
        ip_check_url: Option<&str>,
    ) -> Result<Self, HttpError> {
        let mut client = Self::with_current(label, settings, proxy, None)?;
        client.ip_check_url = ip_check_url.map(str::to_string);
        client.rotate_proxy().await?;
        Ok(client)
    }

    fn with_current(
        label: &str,
        settings: &HttpConfig,
        proxy: ProxySource,
        current_proxy: Option<String>,
    ) -> Result<Self, HttpError> {
        let client = build_http_client(settings, current_proxy.as_deref())?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        Ok(Self {
            label: label.to_string(),
            settings: settings.clone(),
            headers,
            proxy,
            current_proxy,
            ip_check_url: None,
            client,
        })
    }

    /// Name used in log lines
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Proxy the client currently routes through
    pub fn current_proxy(&self) -> Option<&str> {
        self.current_proxy.as_deref()
    }

    /// Sets (or replaces) a header sent with every request
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| HttpError::InvalidHeader {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| HttpError::InvalidHeader {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    /// Returns the current value of a header, if set
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Attaches a bearer token to every subsequent request
    pub fn set_bearer(&mut self, token: &str) -> Result<(), HttpError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            HttpError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
                message: e.to_string(),
            }
        })?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Returns true if an `Authorization` header is attached
    pub fn has_bearer(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION)
    }

    /// Sends a GET request with query parameters
    pub async fn get(&self, url: &str, params: &[(&str, &str)]) -> FetchResult<Vec<u8>> {
        self.execute(Method::GET, url, params, None).await
    }

    /// Sends a POST request with a form body
    pub async fn post(&self, url: &str, form: &[(&str, &str)]) -> FetchResult<Vec<u8>> {
        self.execute(Method::POST, url, &[], Some(form)).await
    }

    /// GET returning the body as text; an empty body counts as a failure
    pub async fn get_html(&self, url: &str, params: &[(&str, &str)]) -> FetchResult<String> {
        self.get(url, params).await.and_then_body(|body| {
            let text = String::from_utf8_lossy(&body).into_owned();
            if text.trim().is_empty() {
                Err("empty body".to_string())
            } else {
                Ok(text)
            }
        })
    }

    /// GET returning the body decoded as JSON
    pub async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> FetchResult<Value> {
        let result = self.get(url, params).await.and_then_body(|body| {
            if body.iter().all(u8::is_ascii_whitespace) {
                return Err("empty body".to_string());
            }
            serde_json::from_slice::<Value>(&body).map_err(|e| e.to_string())
        });

        if let FetchResult::DecodeError { error, .. } = &result {
            tracing::error!("Error while getting JSON from URL [{}]: {}", url, error);
        }

        result
    }

    /// Asks the IP-echo service which address the client appears from
    pub async fn current_ip(&self, ip_check_url: &str) -> Option<String> {
        self.get_html(ip_check_url, &[])
            .await
            .into_body()
            .map(|text| text.trim().to_string())
    }

    /// Checks that a site answers and does not redirect to another host
    ///
    /// The check is soft: the final URL must still contain the first label
    /// of the requested host (`www.` ignored).
    pub async fn check_url(&self, url: &str) -> bool {
        let final_url = match self.get(url, &[]).await {
            FetchResult::Success { final_url, .. } => final_url,
            _ => return false,
        };

        let host = match url::Url::parse(url) {
            Ok(parsed) => parsed.host_str().unwrap_or_default().to_lowercase(),
            Err(_) => return false,
        };
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let label = host.split('.').next().unwrap_or_default();

        final_url.to_lowercase().contains(label)
    }

    /// Downloads `url` into `path`, returning the number of bytes written
    pub async fn save_image(&self, url: &str, path: &Path) -> Result<usize, HttpError> {
        let result = self.get(url, &[]).await;
        let status_code = result.status_code();
        let bytes = result.into_body().ok_or_else(|| HttpError::Download {
            url: url.to_string(),
            status_code,
        })?;

        tokio::fs::write(path, &bytes).await?;
        Ok(bytes.len())
    }

    /// Advances to the next proxy of the configured backend
    ///
    /// The underlying reqwest client is rebuilt and, if an IP-echo URL is
    /// known, the new outbound address is logged.
    pub async fn rotate_proxy(&mut self) -> Result<(), HttpError> {
        tracing::info!("[{}] Changing proxy (if possible).", self.label);

        let next = self.proxy.next().await?;
        self.client = build_http_client(&self.settings, next.as_deref())?;
        self.current_proxy = next;

        if let Some(ip_check_url) = self.ip_check_url.clone() {
            match self.current_ip(&ip_check_url).await {
                Some(ip) => tracing::info!("[{}] Now using IP: {}", self.label, ip),
                None => tracing::warn!("[{}] Can't determine the outbound IP", self.label),
            }
        }

        Ok(())
    }

    /// Stops any process backing the proxy (the relay)
    pub async fn shutdown(&mut self) {
        self.proxy.shutdown().await;
    }

    /// Sends one request with the retry policy applied
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Return body |
    /// | Pass-through status (404, 410, 429, ...) | Return status immediately |
    /// | Other non-2xx | Retry, keep last status |
    /// | Transport error | Retry, no status |
    ///
    /// Every attempt is followed by the politeness delay.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        form: Option<&[(&str, &str)]>,
    ) -> FetchResult<Vec<u8>> {
        let max_retries = self.settings.max_retries.max(1);
        let mut last = FetchResult::NetworkError {
            error: "no attempt made".to_string(),
        };

        for attempt in 1..=max_retries {
            let mut request = self
                .client
                .request(method.clone(), url)
                .headers(self.headers.clone());
            if !params.is_empty() {
                request = request.query(params);
            }
            if let Some(form) = form {
                request = request.form(form);
            }

            let outcome = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let final_url = response.url().to_string();

                    if status.is_success() {
                        match response.bytes().await {
                            Ok(body) => FetchResult::Success {
                                final_url,
                                status_code: status.as_u16(),
                                body: body.to_vec(),
                            },
                            Err(e) => FetchResult::NetworkError {
                                error: e.to_string(),
                            },
                        }
                    } else {
                        FetchResult::HttpError {
                            status_code: status.as_u16(),
                        }
                    }
                }
                Err(e) => FetchResult::NetworkError {
                    error: classify_error(&e),
                },
            };

            self.throttle().await;

            match &outcome {
                FetchResult::Success { status_code, .. } => {
                    tracing::debug!(
                        client = %self.label,
                        status = status_code,
                        attempt,
                        "{} {}",
                        method,
                        url
                    );
                    return outcome;
                }
                FetchResult::HttpError { status_code } => {
                    tracing::warn!(
                        client = %self.label,
                        attempt,
                        "Error {} while accessing {}",
                        status_code,
                        url
                    );
                    if self.settings.pass_through_statuses.contains(status_code) {
                        return outcome;
                    }
                }
                FetchResult::NetworkError { error } | FetchResult::DecodeError { error, .. } => {
                    tracing::warn!(
                        client = %self.label,
                        attempt,
                        "Request to {} failed: {}",
                        url,
                        error
                    );
                }
            }

            last = outcome;
        }

        tracing::error!(
            "[{}] Can't execute HTTP request while accessing {} ({} attempts)",
            self.label,
            url,
            max_retries
        );
        last
    }

    async fn throttle(&self) {
        if self.settings.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.request_delay_ms)).await;
        }
    }
}

/// Maps a reqwest error to a short description
fn classify_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        error.to_string()
    }
}
