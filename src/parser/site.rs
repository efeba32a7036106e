use crate::config::ParserConfig;
use crate::parser::{api_error, OfferDetails, PageParser, ParseError};
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

#[derive(Deserialize)]
struct PhonesPayload {
    data: PhonesData,
}

#[derive(Deserialize)]
struct PhonesData {
    phones: Vec<Value>,
}

/// `PageParser` for the marketplace's markup and API
///
/// # Example
///
/// ```
/// use ad_harvest::config::ParserConfig;
/// use ad_harvest::parser::{PageParser, SiteParser};
///
/// let parser = SiteParser::new(&ParserConfig::default()).unwrap();
/// assert_eq!(parser.parse_page_count("<html><body></body></html>").unwrap(), 1);
/// ```
pub struct SiteParser {
    last_page: Selector,
    results: Selector,
    item: Selector,
    item_id_attribute: String,
    landing_item: Selector,
}

impl SiteParser {
    pub fn new(config: &ParserConfig) -> Result<Self, ParseError> {
        Ok(Self {
            last_page: parse_selector(&config.last_page_selector)?,
            results: parse_selector(&config.results_selector)?,
            item: parse_selector(&config.item_selector)?,
            item_id_attribute: config.item_id_attribute.clone(),
            landing_item: parse_selector(&config.landing_item_selector)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|_| ParseError::Selector(selector.to_string()))
}

impl PageParser for SiteParser {
    fn parse_page_count(&self, html: &str) -> Result<u32, ParseError> {
        let document = Html::parse_document(html);

        match document.select(&self.last_page).next() {
            Some(element) => {
                let text = element.text().collect::<String>();
                text.trim()
                    .parse::<u32>()
                    .map_err(|_| ParseError::InvalidPageCount(text.trim().to_string()))
            }
            None => Ok(1),
        }
    }

    fn parse_item_ids(&self, html: &str) -> Result<Vec<u64>, ParseError> {
        let document = Html::parse_document(html);

        // Block and captcha pages come back as 200 without the results table
        let results = document
            .select(&self.results)
            .next()
            .ok_or_else(|| ParseError::MissingElement("results table".to_string()))?;

        results
            .select(&self.item)
            .map(|element| {
                let raw = element
                    .value()
                    .attr(&self.item_id_attribute)
                    .ok_or_else(|| {
                        ParseError::MissingElement(format!(
                            "item row without '{}' attribute",
                            self.item_id_attribute
                        ))
                    })?;
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ParseError::InvalidItemId(raw.to_string()))
            })
            .collect()
    }

    fn parse_landing_item_url(&self, html: &str, base_url: &str) -> Result<String, ParseError> {
        let document = Html::parse_document(html);

        let href = document
            .select(&self.landing_item)
            .find_map(|element| element.value().attr("href"))
            .ok_or_else(|| ParseError::MissingElement("item link on landing page".to_string()))?;

        let base = Url::parse(base_url)
            .map_err(|_| ParseError::MissingElement(format!("valid base URL '{}'", base_url)))?;
        base.join(href.trim())
            .map(|url| url.to_string())
            .map_err(|_| ParseError::MissingElement(format!("resolvable item link '{}'", href)))
    }

    fn parse_offer(&self, json: &Value) -> Result<OfferDetails, ParseError> {
        OfferDetails::from_json(json)
    }

    fn parse_phones(&self, json: &Value) -> Result<Vec<String>, ParseError> {
        if let Some(error) = api_error(json) {
            return Err(ParseError::Api(error));
        }

        let payload = PhonesPayload::deserialize(json)?;
        Ok(payload
            .data
            .phones
            .into_iter()
            .map(|phone| match phone {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect())
    }
}
