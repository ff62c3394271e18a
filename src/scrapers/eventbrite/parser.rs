use super::dates::DateContext;
use super::fields::{self, FieldContext};
use crate::constants::EVENT_DETAIL_PATH;
use crate::error::{Result, ScraperError};
use crate::scrapers::document::Document;
use crate::scrapers::traits::{ListingParser, LocatorStrategy, ParsedListing};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::Selector;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Card selectors, most specific first.
pub const CARD_SELECTORS: [&str; 8] = [
    ".discover-search-results li",
    ".discover-search-desktop-card",
    ".search-result-card",
    "[data-spec=\"search-card\"]",
    ".eds-event-card",
    ".eds-card",
    ".event-card",
    "article",
];

static CARD_STRATEGIES: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    CARD_SELECTORS
        .iter()
        .map(|css| (*css, Selector::parse(css).expect("valid card selector")))
        .collect()
});

static LINKS_WITH_HREF: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Turns an Eventbrite discovery page into draft events.
pub struct EventbriteParser {
    base_url: Url,
    source: String,
}

impl EventbriteParser {
    pub fn new(base_url: &str, source: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ScraperError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        Ok(Self {
            base_url,
            source: source.into(),
        })
    }

    fn field_context(&self, now: DateTime<Utc>) -> FieldContext<'_> {
        FieldContext {
            base_url: &self.base_url,
            source: &self.source,
            dates: DateContext::new(now),
        }
    }

    /// Tries each card strategy in order; the first one that yields a valid
    /// draft supplies the whole result.
    fn locate_cards(&self, document: &Document, ctx: &FieldContext<'_>) -> Option<ParsedListing> {
        for (css, selector) in CARD_STRATEGIES.iter() {
            let css: &'static str = *css;
            let candidates = document.select(selector);
            if candidates.is_empty() {
                debug!(selector = css, "no candidates");
                continue;
            }

            let mut drafts = Vec::new();
            let mut failures = 0;
            for candidate in &candidates {
                match fields::extract_card(*candidate, ctx) {
                    Ok(Some(draft)) => drafts.push(draft),
                    Ok(None) => {}
                    Err(e) => {
                        failures += 1;
                        warn!(selector = css, error = %e, "skipping candidate");
                    }
                }
            }

            debug!(
                selector = css,
                candidates = candidates.len(),
                valid = drafts.len(),
                "tried card selector"
            );
            if !drafts.is_empty() {
                return Some(ParsedListing {
                    strategy: LocatorStrategy::Selector(css),
                    candidates: candidates.len(),
                    failures,
                    drafts,
                });
            }
        }
        None
    }

    /// Treats every link to an event detail page as a weak candidate.
    fn scan_links(&self, document: &Document, ctx: &FieldContext<'_>) -> ParsedListing {
        let links: Vec<_> = document
            .select(&LINKS_WITH_HREF)
            .into_iter()
            .filter_map(|link| {
                let href = link.value().attr("href")?.trim();
                href.contains(EVENT_DETAIL_PATH).then_some((link, href))
            })
            .collect();

        let mut seen = HashSet::new();
        let mut drafts = Vec::new();
        let mut failures = 0;
        for (link, href) in &links {
            match fields::extract_link(*link, href, ctx) {
                Ok(draft) => {
                    if seen.insert(draft.original_url.clone()) {
                        drafts.push(draft);
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, "skipping event link");
                }
            }
        }

        ParsedListing {
            strategy: LocatorStrategy::LinkScan,
            candidates: links.len(),
            failures,
            drafts,
        }
    }
}

impl ListingParser for EventbriteParser {
    fn parse_listing(&self, body: &str, now: DateTime<Utc>) -> ParsedListing {
        let document = Document::parse(body);
        let ctx = self.field_context(now);

        if let Some(listing) = self.locate_cards(&document, &ctx) {
            info!(
                strategy = %listing.strategy,
                events = listing.drafts.len(),
                "found events with card selector"
            );
            return listing;
        }

        info!("no events found with card selectors, scanning event links");
        let listing = self.scan_links(&document, &ctx);
        if listing.drafts.is_empty() {
            info!("no event candidates on listing page");
        }
        listing
    }
}
