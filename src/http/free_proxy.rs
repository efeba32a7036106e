//! Free-proxy backend
//!
//! Downloads a public proxy listing, keeps only anonymous HTTPS-capable
//! entries, prefers the least-used ones and validates each candidate
//! before handing it out.

use crate::config::ProxyConfig;
use crate::http::HttpError;
use reqwest::{Client, Proxy};
use scraper::{Html, Selector};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

const ACCEPTED_ANONYMITY: [&str; 2] = ["anonymous", "elite proxy"];
const TEST_DELAY: Duration = Duration::from_secs(2);

/// A proxy candidate and how many times it has been handed out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    pub address: String,
    pub use_count: u32,
}

pub struct FreeProxyPool {
    client: Client,
    timeout: Duration,
    list_url: String,
    validate_url: String,
    test_url: Option<String>,
    test_attempts: u32,
    max_remembered: usize,
    used: HashMap<String, u32>,
    order: VecDeque<String>,
}

impl FreeProxyPool {
    pub fn new(config: &ProxyConfig, timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder().timeout(timeout).no_proxy().build()?;

        Ok(Self {
            client,
            timeout,
            list_url: config.free_list_url.clone(),
            validate_url: config.validate_url.clone(),
            test_url: config.test_url.clone(),
            test_attempts: config.test_attempts,
            max_remembered: config.max_remembered.max(1),
            used: HashMap::new(),
            order: VecDeque::new(),
        })
    }

    /// Extracts `ip:port` addresses from the listing table
    ///
    /// Only rows flagged as HTTPS-capable with an accepted anonymity level
    /// are kept.
    pub fn parse_listing(html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let (Ok(row_selector), Ok(cell_selector)) =
            (Selector::parse("tbody tr"), Selector::parse("td"))
        else {
            return Vec::new();
        };

        document
            .select(&row_selector)
            .filter_map(|row| {
                let cells: Vec<String> = row
                    .select(&cell_selector)
                    .map(|cell| cell.text().collect::<String>().trim().to_string())
                    .collect();
                if cells.len() < 7 {
                    return None;
                }

                let anonymity = cells[4].to_lowercase();
                let https = cells[6].eq_ignore_ascii_case("yes");
                if https && ACCEPTED_ANONYMITY.contains(&anonymity.as_str()) {
                    Some(format!("{}:{}", cells[0], cells[1]))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Orders candidates least-used first, keeping listing order on ties
    pub fn rank(&self, candidates: Vec<String>) -> Vec<ProxyRecord> {
        let mut records: Vec<ProxyRecord> = candidates
            .into_iter()
            .map(|address| ProxyRecord {
                use_count: self.use_count(&address),
                address,
            })
            .collect();
        records.sort_by_key(|record| record.use_count);
        records
    }

    /// Times `address` has been handed out
    pub fn use_count(&self, address: &str) -> u32 {
        self.used.get(address).copied().unwrap_or(0)
    }

    /// Number of addresses currently remembered
    pub fn remembered(&self) -> usize {
        self.used.len()
    }

    /// Counts one use of `address`, evicting the oldest entries over the cap
    pub fn record_use(&mut self, address: &str) {
        match self.used.get_mut(address) {
            Some(count) => *count += 1,
            None => {
                self.used.insert(address.to_string(), 1);
                self.order.push_back(address.to_string());
            }
        }

        while self.used.len() > self.max_remembered {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.used.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Finds a working proxy, or `None` if no candidate validates
    pub async fn get_proxy(&mut self) -> Result<Option<String>, HttpError> {
        let candidates = self.fetch_candidates().await?;
        tracing::debug!("{} free proxy candidates", candidates.len());

        for record in self.rank(candidates) {
            let address = format!("http://{}", record.address);
            if !self.is_valid(&address).await {
                continue;
            }
            if let Some(test_url) = self.test_url.clone() {
                if !self.passes_test(&address, &test_url).await {
                    continue;
                }
            }

            self.record_use(&record.address);
            tracing::info!("Using free proxy {}", address);
            return Ok(Some(address));
        }

        tracing::warn!("No free proxy passed validation");
        Ok(None)
    }

    async fn fetch_candidates(&self) -> Result<Vec<String>, HttpError> {
        let response = self.client.get(&self.list_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Download {
                url: self.list_url.clone(),
                status_code: Some(status.as_u16()),
            });
        }

        let html = response.text().await?;
        Ok(Self::parse_listing(&html))
    }

    /// The IP-echo endpoint must report the proxy's own address
    async fn is_valid(&self, address: &str) -> bool {
        let Ok(client) = self.proxied_client(address) else {
            return false;
        };

        let body = match client.get(&self.validate_url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<serde_json::Value>().await {
                    Ok(body) => body,
                    Err(_) => return false,
                }
            }
            _ => return false,
        };

        let host = address
            .trim_start_matches("http://")
            .split(':')
            .next()
            .unwrap_or_default();
        body.get("origin")
            .and_then(|origin| origin.as_str())
            .map(|origin| origin.contains(host))
            .unwrap_or(false)
    }

    async fn passes_test(&self, address: &str, test_url: &str) -> bool {
        let Ok(client) = self.proxied_client(address) else {
            return false;
        };

        for _ in 0..self.test_attempts {
            match client.get(test_url).send().await {
                Ok(response) if response.status().is_success() => {}
                _ => return false,
            }
            tokio::time::sleep(TEST_DELAY).await;
        }
        true
    }

    fn proxied_client(&self, address: &str) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(self.timeout)
            .proxy(Proxy::all(address)?)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <table>
          <thead><tr><th>IP</th><th>Port</th><th>Code</th><th>Country</th><th>Anonymity</th><th>Google</th><th>Https</th></tr></thead>
          <tbody>
            <tr><td>10.0.0.1</td><td>8080</td><td>UA</td><td>Ukraine</td><td>anonymous</td><td>no</td><td>yes</td></tr>
            <tr><td>10.0.0.2</td><td>3128</td><td>DE</td><td>Germany</td><td>transparent</td><td>no</td><td>yes</td></tr>
            <tr><td>10.0.0.3</td><td>80</td><td>US</td><td>United States</td><td>elite proxy</td><td>no</td><td>no</td></tr>
            <tr><td>10.0.0.4</td><td>8000</td><td>PL</td><td>Poland</td><td>elite proxy</td><td>yes</td><td>yes</td></tr>
          </tbody>
        </table>
    "#;

    fn pool(max_remembered: usize) -> FreeProxyPool {
        let config = ProxyConfig {
            max_remembered,
            ..ProxyConfig::default()
        };
        FreeProxyPool::new(&config, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_parse_listing_filters_rows() {
        let proxies = FreeProxyPool::parse_listing(LISTING);
        assert_eq!(proxies, vec!["10.0.0.1:8080", "10.0.0.4:8000"]);
    }

    #[test]
    fn test_rank_prefers_least_used() {
        let mut pool = pool(10);
        pool.record_use("10.0.0.1:8080");
        pool.record_use("10.0.0.1:8080");
        pool.record_use("10.0.0.4:8000");

        let ranked = pool.rank(vec![
            "10.0.0.1:8080".to_string(),
            "10.0.0.4:8000".to_string(),
            "10.0.0.9:9999".to_string(),
        ]);
        let order: Vec<&str> = ranked.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(order, vec!["10.0.0.9:9999", "10.0.0.4:8000", "10.0.0.1:8080"]);
        assert_eq!(ranked[2].use_count, 2);
    }

    #[test]
    fn test_record_use_evicts_oldest() {
        let mut pool = pool(2);
        pool.record_use("a:1");
        pool.record_use("b:2");
        pool.record_use("a:1");
        pool.record_use("c:3");

        assert_eq!(pool.remembered(), 2);
        assert_eq!(pool.use_count("a:1"), 0);
        assert_eq!(pool.use_count("b:2"), 1);
        assert_eq!(pool.use_count("c:3"), 1);
    }
}
