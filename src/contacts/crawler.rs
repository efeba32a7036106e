use crate::contacts::links::{contains_either_scheme, internal_links};
use crate::contacts::miner::TextMiner;
use crate::http::{FetchResult, HttpClient};
use scraper::Html;
use url::Url;

/// Contacts found on one website
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContactReport {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
}

impl ContactReport {
    /// At least one email and one phone were found
    pub fn is_complete(&self) -> bool {
        !self.emails.is_empty() && !self.phones.is_empty()
    }
}

/// Depth-limited, same-site crawler that collects emails and phones
pub struct ContactCrawler<'a> {
    client: &'a HttpClient,
    miner: TextMiner,
    max_depth: u32,
}

impl<'a> ContactCrawler<'a> {
    pub fn new(client: &'a HttpClient, miner: TextMiner, max_depth: u32) -> Self {
        Self {
            client,
            miner,
            max_depth,
        }
    }

    /// Collects contact data for the site at `url`
    ///
    /// The start page is mined first. Links are followed (up to the depth
    /// limit) only when emails or phones are still missing. An unreachable
    /// or redirected site yields an empty report.
    pub async fn harvest(&self, url: &str) -> ContactReport {
        tracing::info!("Collecting contact data for site {}", url);
        let mut report = ContactReport::default();

        let start = match Url::parse(url) {
            Ok(start) => start,
            Err(e) => {
                tracing::warn!("Invalid site URL {}: {}", url, e);
                return report;
            }
        };

        if !self.client.check_url(url).await {
            tracing::warn!("The site {} not available.", url);
            return report;
        }

        let root = format!("{}://{}", start.scheme(), host_with_port(&start));
        let mut visited = vec![root.clone(), format!("{}/", root), start.to_string()];

        self.crawl(&start, self.max_depth, &mut visited, &mut report).await;

        if !report.is_complete() && self.max_depth > 0 {
            tracing::info!("Starting deep search for site {}", url);
            self.crawl(&start, 0, &mut visited, &mut report).await;
        }

        report
    }

    /// Depth-first walk from `start`, whose depth is `start_depth`
    async fn crawl(
        &self,
        start: &Url,
        start_depth: u32,
        visited: &mut Vec<String>,
        report: &mut ContactReport,
    ) {
        let mut stack = vec![(start.clone(), start_depth)];

        while let Some((page_url, depth)) = stack.pop() {
            tracing::info!("Crawling page {}", page_url);

            let html = match self.client.get_html(page_url.as_str(), &[]).await {
                FetchResult::Success { body, .. } => body,
                other => {
                    let status = other.status_code();
                    tracing::debug!("Skipping {} (status: {:?})", page_url, status);
                    continue;
                }
            };

            let text = page_text(&html).to_lowercase();
            self.miner.collect_emails(&text, &mut report.emails);
            self.miner.collect_phones(&text, &mut report.phones);

            if depth >= self.max_depth {
                continue;
            }

            let mut children = Vec::new();
            for link in internal_links(&html, &page_url) {
                if contains_either_scheme(visited, &link) {
                    continue;
                }
                if let Ok(child) = Url::parse(&link) {
                    visited.push(link);
                    children.push((child, depth + 1));
                }
            }
            // Reversed so the first link on the page is crawled first
            stack.extend(children.into_iter().rev());
        }
    }
}

fn host_with_port(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// Visible text of a page, text nodes separated by `|`
fn page_text(html: &str) -> String {
    Html::parse_document(html)
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("|")
}
