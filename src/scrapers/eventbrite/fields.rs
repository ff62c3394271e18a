//! Per-candidate field extraction.
//!
//! Every field walks its own ordered list of sub-selectors and keeps the first
//! non-empty value.

use super::dates::{self, DateContext};
use super::price;
use crate::constants::{DEFAULT_CATEGORY, FALLBACK_LINK_TITLE};
use crate::error::ExtractionError;
use crate::scrapers::document::{first_attr, first_text_of, inner_text, parent_element, texts_of};
use crate::types::DraftEvent;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Selector};

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).expect("valid field selector"))
        .collect()
}

static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    compile(&[
        ".event-card__title",
        "h2",
        "h3",
        ".eds-event-card__title",
        ".eds-text-color--ui-800",
    ])
});

static ANY_HEADING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5").expect("valid heading selector"));

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid link selector"));

static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid image selector"));

static DATE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    compile(&[
        ".event-card__date",
        ".eds-text-color--ui-600",
        ".date-info",
        "time",
        "[data-automation=\"event-date\"]",
        "[data-component=\"date\"]",
        ".eds-event-card-content__sub-title",
        ".eds-text-bs--fixed",
        "[data-subcontent-key=\"date\"]",
        "[aria-label*=\"date\"]",
    ])
});

static LOCATION_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    compile(&[
        ".event-card__location",
        ".location-info",
        ".eds-text-color--ui-600",
        "[data-component=\"venue\"]",
        ".address",
        ".card-text--truncated__content",
    ])
});

static PRICE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    compile(&[
        ".event-card__price",
        ".price-info",
        ".eds-text-bl",
        "[data-component=\"price\"]",
        ".price",
        ".eds-text-color--grey-600",
        ".eds-text-bs",
        ".eds-event-card-content__sub-title",
        "[data-subcontent-key=\"price\"]",
    ])
});

static CATEGORY_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    compile(&[
        ".event-card__tag",
        ".category-info",
        ".eds-text-bs",
        "[data-component=\"category\"]",
    ])
});

// Shorter date texts are labels ("Today", "Date") rather than dates.
const MIN_DATE_TEXT_LEN: usize = 6;

/// What every extractor needs to know about the listing being parsed.
pub struct FieldContext<'a> {
    pub base_url: &'a Url,
    pub source: &'a str,
    pub dates: DateContext,
}

/// Builds a draft from one event card.
///
/// `Ok(None)` means the card lacks a title or a link and is not an event.
pub fn extract_card(
    card: ElementRef<'_>,
    ctx: &FieldContext<'_>,
) -> Result<Option<DraftEvent>, ExtractionError> {
    let Some(title) = extract_title(card) else {
        return Ok(None);
    };
    let Some(href) = first_attr(card, &LINK, "href") else {
        return Ok(None);
    };
    let original_url = resolve_url(ctx.base_url, &href)?;

    let (date, time) = extract_date_time(card, &ctx.dates);
    let card_text = inner_text(card);

    Ok(Some(DraftEvent {
        title,
        date,
        time,
        location: first_text_of(card, &LOCATION_SELECTORS),
        image_url: extract_image(card),
        original_url,
        price: price::price_from_fields(texts_of(card, &PRICE_SELECTORS), &card_text),
        category: first_text_of(card, &CATEGORY_SELECTORS)
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        source: ctx.source.to_string(),
    }))
}

/// Builds a weak draft from a bare event link with target `href` and the
/// text around it.
pub fn extract_link(
    link: ElementRef<'_>,
    href: &str,
    ctx: &FieldContext<'_>,
) -> Result<DraftEvent, ExtractionError> {
    let original_url = resolve_url(ctx.base_url, href)?;

    let text = inner_text(link);
    let title = if text.is_empty() {
        FALLBACK_LINK_TITLE.to_string()
    } else {
        text
    };

    let parent = parent_element(link);
    let image_url = first_attr(link, &IMAGE, "src")
        .or_else(|| parent.and_then(|p| first_attr(p, &IMAGE, "src")));

    let context_text = parent
        .and_then(parent_element)
        .map(inner_text)
        .unwrap_or_default();

    Ok(DraftEvent {
        title,
        date: dates::parse_context_date(&context_text, &ctx.dates).unwrap_or(ctx.dates.now),
        time: dates::extract_time(&context_text),
        location: None,
        image_url,
        original_url,
        price: price::price_from_text(&context_text),
        category: DEFAULT_CATEGORY.to_string(),
        source: ctx.source.to_string(),
    })
}

pub fn extract_title(card: ElementRef<'_>) -> Option<String> {
    first_text_of(card, &TITLE_SELECTORS)
        .or_else(|| first_text_of(card, std::slice::from_ref(&*ANY_HEADING)))
}

pub fn extract_image(card: ElementRef<'_>) -> Option<String> {
    let img = card.select(&IMAGE).next()?;
    ["src", "data-src"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Date from the first date-bearing element any tier can read, else `now`.
/// The clock time is taken from the first date text that carries one.
pub fn extract_date_time(card: ElementRef<'_>, ctx: &DateContext) -> (DateTime<Utc>, Option<String>) {
    let texts: Vec<String> = texts_of(card, &DATE_SELECTORS)
        .into_iter()
        .filter(|text| text.chars().count() >= MIN_DATE_TEXT_LEN)
        .collect();

    let date = texts
        .iter()
        .find_map(|text| dates::parse_card_date(text, ctx))
        .unwrap_or(ctx.now);
    let time = texts.iter().find_map(|text| dates::extract_time(text));
    (date, time)
}

/// Absolute `http(s)` URL for `href`, resolved against the site origin.
pub fn resolve_url(base: &Url, href: &str) -> Result<String, ExtractionError> {
    let invalid = |reason: String| ExtractionError::InvalidUrl {
        href: href.to_string(),
        reason,
    };
    let url = base.join(href.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::document::Document;
    use chrono::TimeZone;

    fn base() -> Url {
        Url::parse("https://www.eventbrite.com.au").unwrap()
    }

    fn ctx(base: &Url) -> FieldContext<'_> {
        FieldContext {
            base_url: base,
            source: "Eventbrite",
            dates: DateContext::new(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
        }
    }

    fn first<'a>(doc: &'a Document, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap())[0]
    }

    #[test]
    fn full_card_extraction() {
        let doc = Document::parse(
            r#"<div class="card">
                 <a href="/e/harbour-lights-tickets-123"><img data-src="/img/h.jpg"></a>
                 <h3>Harbour Lights</h3>
                 <p class="event-card__date">Thu, Jun 12, 7:00 PM</p>
                 <p class="event-card__location">Circular Quay</p>
                 <p class="event-card__price">Starts at $45</p>
                 <span class="event-card__tag">Music</span>
               </div>"#,
        );
        let base = base();
        let draft = extract_card(first(&doc, ".card"), &ctx(&base)).unwrap().unwrap();

        assert_eq!(draft.title, "Harbour Lights");
        assert_eq!(
            draft.original_url,
            "https://www.eventbrite.com.au/e/harbour-lights-tickets-123"
        );
        assert_eq!(draft.image_url.as_deref(), Some("/img/h.jpg"));
        assert_eq!(draft.date.format("%Y-%m-%d").to_string(), "2024-06-12");
        assert_eq!(draft.time.as_deref(), Some("7:00 PM"));
        assert_eq!(draft.location.as_deref(), Some("Circular Quay"));
        assert_eq!(draft.price, "$45");
        assert_eq!(draft.category, "Music");
        assert_eq!(draft.source, "Eventbrite");
    }

    #[test]
    fn sparse_card_uses_defaults() {
        let doc = Document::parse(
            r#"<article><h5>Pop-up Market</h5><a href="https://example.com/e/9">go</a></article>"#,
        );
        let base = base();
        let context = ctx(&base);
        let draft = extract_card(first(&doc, "article"), &context).unwrap().unwrap();

        assert_eq!(draft.title, "Pop-up Market");
        assert_eq!(draft.original_url, "https://example.com/e/9");
        assert_eq!(draft.date, context.dates.now);
        assert_eq!(draft.time, None);
        assert_eq!(draft.price, "Free");
        assert_eq!(draft.category, "Event");
        assert_eq!(draft.image_url, None);
    }

    #[test]
    fn card_without_link_or_title_is_not_an_event() {
        let doc = Document::parse(
            r#"<div class="a"><h2>No link</h2></div><div class="b"><a href="/e/1">  </a></div>"#,
        );
        let base = base();
        assert_eq!(extract_card(first(&doc, ".a"), &ctx(&base)).unwrap(), None);
        assert_eq!(extract_card(first(&doc, ".b"), &ctx(&base)).unwrap(), None);
    }

    #[test]
    fn unresolvable_link_is_an_extraction_error() {
        let doc = Document::parse(r#"<div class="c"><h2>Bad</h2><a href="mailto:x@y.z">x</a></div>"#);
        let base = base();
        let err = extract_card(first(&doc, ".c"), &ctx(&base)).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidUrl { .. }));
    }

    #[test]
    fn short_date_labels_are_ignored() {
        let doc = Document::parse(
            r#"<div class="d"><h2>T</h2><a href="/e/2">x</a>
                 <time>Today</time><p class="date-info">Sat, 14 Dec</p></div>"#,
        );
        let base = base();
        let draft = extract_card(first(&doc, ".d"), &ctx(&base)).unwrap().unwrap();
        assert_eq!(draft.date.format("%Y-%m-%d").to_string(), "2024-12-14");
    }

    #[test]
    fn link_extraction_reads_surrounding_context() {
        let doc = Document::parse(
            r#"<section><div><a href="/e/ferry-party-77">Ferry Party</a><img src="/img/f.png"></div>
                 <span>14/12/2024 at 6:30 pm</span><span>$20</span></section>"#,
        );
        let base = base();
        let draft = extract_link(first(&doc, "a"), "/e/ferry-party-77", &ctx(&base)).unwrap();

        assert_eq!(draft.title, "Ferry Party");
        assert_eq!(draft.original_url, "https://www.eventbrite.com.au/e/ferry-party-77");
        assert_eq!(draft.image_url.as_deref(), Some("/img/f.png"));
        assert_eq!(draft.date.format("%Y-%m-%d").to_string(), "2024-12-14");
        assert_eq!(draft.time.as_deref(), Some("6:30 pm"));
        assert_eq!(draft.price, "$20");
        assert_eq!(draft.category, "Event");
    }

    #[test]
    fn empty_link_text_gets_generic_title() {
        let doc = Document::parse(r#"<div><div><a href="/e/5"><img src="/i.png"></a></div></div>"#);
        let base = base();
        let draft = extract_link(first(&doc, "a"), "/e/5", &ctx(&base)).unwrap();
        assert_eq!(draft.title, "Eventbrite Event");
        assert_eq!(draft.image_url.as_deref(), Some("/i.png"));
        assert_eq!(draft.price, "Free");
    }
}
