use crate::error::Result;
use crate::types::DraftEvent;
use chrono::{DateTime, Utc};
use std::fmt;

/// Identity of a listing source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: String,
    pub listing_url: String,
}

#[async_trait::async_trait]
pub trait ListingCrawler: Send + Sync {
    fn source_info(&self) -> &SourceInfo;

    /// Fetch the raw listing page body.
    async fn fetch_listing(&self) -> Result<String>;
}

pub trait ListingParser: Send + Sync {
    /// Extract draft events from a listing page. Never fails: a page without
    /// recognisable events yields an empty listing.
    fn parse_listing(&self, body: &str, now: DateTime<Utc>) -> ParsedListing;
}

/// Which locator strategy produced the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStrategy {
    Selector(&'static str),
    LinkScan,
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorStrategy::Selector(css) => write!(f, "selector '{css}'"),
            LocatorStrategy::LinkScan => f.write_str("link scan"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedListing {
    pub strategy: LocatorStrategy,
    /// Elements the strategy matched, valid or not.
    pub candidates: usize,
    /// Candidates dropped because extraction failed.
    pub failures: usize,
    pub drafts: Vec<DraftEvent>,
}
