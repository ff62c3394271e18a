//! Canonical display forms for stored dates and prices.
//!
//! The same functions run when a draft is written and when a stored record is
//! read back, so every function here is pure and idempotent.

use crate::constants;
use crate::types::StoredEvent;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static BARE_AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d{1,2})?$").expect("valid amount regex"));

pub const CURRENCY_MARKER: &str = "$";

/// Formats a timestamp the way it is persisted and served.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a stored date value, if it materializes to a point in time.
pub fn parse_stored_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical date text; an unreadable value becomes `now`.
pub fn canonical_date(raw: &str, now: DateTime<Utc>) -> String {
    format_date(&parse_stored_date(raw).unwrap_or(now))
}

/// Canonical price text.
///
/// Values that already carry a currency marker or read as free pass through,
/// bare amounts gain a `$`, blanks become `Free`.
pub fn canonical_price(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return constants::DEFAULT_PRICE.to_string();
    }
    if trimmed.contains(CURRENCY_MARKER) || reads_as_free(trimmed) {
        return trimmed.to_string();
    }
    if BARE_AMOUNT_RE.is_match(trimmed) {
        return format!("{CURRENCY_MARKER}{trimmed}");
    }
    trimmed.to_string()
}

fn reads_as_free(price: &str) -> bool {
    let lower = price.to_lowercase();
    lower.contains("free") || lower.contains("complimentary")
}

/// Applies the date and price normalization to a stored record.
pub fn normalize_event(mut event: StoredEvent, now: DateTime<Utc>) -> StoredEvent {
    event.date = canonical_date(&event.date, now);
    event.price = canonical_price(&event.price);
    event
}

/// Resolves an image reference for display.
///
/// Placeholder and empty references resolve to `None`; site-relative paths are
/// anchored on the origin that hosts them.
pub fn resolve_image_url(source: &str, url: Option<&str>) -> Option<String> {
    let url = url.map(str::trim).filter(|u| !u.is_empty())?;
    if url.contains("placehold.co") {
        return None;
    }
    let lower = url.to_lowercase();
    if url.starts_with('/') && !lower.starts_with("http://") && !lower.starts_with("https://") {
        let base = if source == constants::WHATSON_SOURCE || lower.contains("whatson") {
            constants::WHATSON_BASE_URL
        } else {
            constants::GENERIC_IMAGE_BASE_URL
        };
        return Some(format!("{base}{url}"));
    }
    Some(url.to_string())
}
