use crate::config::{AnonymousConfig, ProxyConfig, ProxyMode};
use crate::http::{FreeProxyPool, HttpError, TorRelay};
use std::time::Duration;

/// Where the site client gets its next outbound proxy from
pub enum ProxySource {
    /// No proxy
    Direct,
    /// Always the same proxy
    Fixed(String),
    /// Round-robin over a configured list
    List {
        proxies: Vec<String>,
        index: Option<usize>,
    },
    /// Scraped, validated free proxies
    Free(FreeProxyPool),
    /// Local anonymizing relay, restarted on every rotation
    Tor(TorRelay),
}

impl ProxySource {
    /// Builds the proxy backend selected by `[proxy] mode`
    pub fn from_config(
        proxy: &ProxyConfig,
        anonymous: &AnonymousConfig,
        timeout: Duration,
    ) -> Result<Self, HttpError> {
        let source = match proxy.mode {
            ProxyMode::Direct => Self::Direct,
            ProxyMode::Fixed => {
                let address = proxy.address.clone().ok_or_else(|| {
                    HttpError::NoProxyAvailable("fixed mode without an address".to_string())
                })?;
                Self::Fixed(address)
            }
            ProxyMode::List => Self::List {
                proxies: proxy.list.clone(),
                index: None,
            },
            ProxyMode::Free => Self::Free(FreeProxyPool::new(proxy, timeout)?),
            ProxyMode::Tor => Self::Tor(TorRelay::new(anonymous)),
        };
        Ok(source)
    }

    pub fn mode(&self) -> ProxyMode {
        match self {
            Self::Direct => ProxyMode::Direct,
            Self::Fixed(_) => ProxyMode::Fixed,
            Self::List { .. } => ProxyMode::List,
            Self::Free(_) => ProxyMode::Free,
            Self::Tor(_) => ProxyMode::Tor,
        }
    }

    /// Produces the next proxy address, `None` meaning "connect directly"
    pub async fn next(&mut self) -> Result<Option<String>, HttpError> {
        match self {
            Self::Direct => Ok(None),
            Self::Fixed(address) => Ok(Some(address.clone())),
            Self::List { proxies, index } => {
                if proxies.is_empty() {
                    return Err(HttpError::NoProxyAvailable("proxy list is empty".to_string()));
                }
                let next = index.map_or(0, |i| (i + 1) % proxies.len());
                *index = Some(next);
                Ok(Some(proxies[next].clone()))
            }
            Self::Free(pool) => {
                tracing::info!("Searching for free proxies.");
                match pool.get_proxy().await? {
                    Some(address) => Ok(Some(address)),
                    None => Err(HttpError::NoProxyAvailable(
                        "no free proxy passed validation".to_string(),
                    )),
                }
            }
            Self::Tor(relay) => {
                tracing::info!("Starting TOR");
                relay.restart(true).await?;
                if !relay.is_running() {
                    return Err(HttpError::Relay("relay exited during startup".to_string()));
                }
                Ok(Some(relay.socks_proxy().to_string()))
            }
        }
    }

    /// Stops the relay process, if this source owns one
    pub async fn shutdown(&mut self) {
        if let Self::Tor(relay) = self {
            relay.terminate().await;
        }
    }
}
