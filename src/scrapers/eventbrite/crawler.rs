use crate::config::ScraperConfig;
use crate::error::{Result, ScraperError};
use crate::scrapers::traits::{ListingCrawler, SourceInfo};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Instant;
use tracing::{debug, info, instrument};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";
const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const REFERER: &str = "https://www.google.com/";

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));
    headers.insert(header::REFERER, HeaderValue::from_static(REFERER));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

/// Fetches the Eventbrite Sydney discovery page with a browser-like profile.
pub struct EventbriteCrawler {
    client: reqwest::Client,
    info: SourceInfo,
}

impl EventbriteCrawler {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .default_headers(browser_headers())
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            info: SourceInfo {
                name: config.source.clone(),
                listing_url: config.listing_url.clone(),
            },
        })
    }
}

#[async_trait::async_trait]
impl ListingCrawler for EventbriteCrawler {
    fn source_info(&self) -> &SourceInfo {
        &self.info
    }

    #[instrument(skip(self), fields(url = %self.info.listing_url))]
    async fn fetch_listing(&self) -> Result<String> {
        let started = Instant::now();
        let response = self.client.get(&self.info.listing_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Fetch {
                url: self.info.listing_url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "received listing body");
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched {} listing", self.info.name
        );
        Ok(body)
    }
}
