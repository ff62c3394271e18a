//! Date and clock-time recognition for listing text.
//!
//! Each tier is a plain `fn(&str, &DateContext) -> Option<DateTime<Utc>>` and
//! the cascades below try them in order, first match wins. Callers fall back to
//! [`DateContext::now`] when every tier misses.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Full and abbreviated month names, optionally dotted.
const MONTHS: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b\.?";

const WEEKDAYS: &str = r"(?:mon(?:day)?|tue(?:s(?:day)?)?|wed(?:nesday)?|thu(?:r(?:s(?:day)?)?)?|fri(?:day)?|sat(?:urday)?|sun(?:day)?)\b\.?";

static COMPACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b{WEEKDAYS},\s+(?:({MONTHS})\s+(\d{{1,2}})\b|(\d{{1,2}})\s+({MONTHS}))(?:,?\s+(\d{{4}})\b)?"
    ))
    .expect("valid compact date regex")
});

static DAY_MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:{WEEKDAYS},?\s+)?\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})\s+(\d{{4}})"
    ))
    .expect("valid day-month-year regex")
});

static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:[,\s]+(\d{{4}})\b)?"
    ))
    .expect("valid month-day regex")
});

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/\s\-.](\d{1,2})[/\s\-.](\d{4}|\d{2})\b").expect("valid numeric date regex")
});

static MIXED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})[/\s\-.]{{1,2}}(\d{{1,2}}|{MONTHS})[/\s\-.]{{1,2}}(\d{{4}}|\d{{2}})\b"
    ))
    .expect("valid mixed date regex")
});

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,2}):(\d{2})(?:\s*(?:am|pm))?").expect("valid time regex"));

/// Clock used while parsing one listing.
#[derive(Debug, Clone, Copy)]
pub struct DateContext {
    pub now: DateTime<Utc>,
}

impl DateContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn year(&self) -> i32 {
        self.now.year()
    }
}

pub type DateTier = fn(&str, &DateContext) -> Option<DateTime<Utc>>;

/// Tiers applied to dedicated date elements of an event card.
pub const CARD_TIERS: [(&str, DateTier); 4] = [
    ("compact", parse_compact),
    ("generic", parse_generic),
    ("day_month_year", parse_day_month_year),
    ("month_day", parse_month_day),
];

/// Tiers applied to text surrounding a bare event link.
pub const CONTEXT_TIERS: [(&str, DateTier); 6] = [
    ("compact", parse_compact),
    ("generic", parse_generic),
    ("day_month_year", parse_day_month_year),
    ("month_day", parse_month_day),
    ("numeric", parse_numeric),
    ("mixed_numeric", parse_mixed_numeric),
];

pub fn run_tiers(tiers: &[(&str, DateTier)], text: &str, ctx: &DateContext) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    tiers.iter().find_map(|(name, tier)| {
        let parsed = tier(text, ctx);
        if parsed.is_some() {
            tracing::trace!(tier = *name, text, "date tier matched");
        }
        parsed
    })
}

pub fn parse_card_date(text: &str, ctx: &DateContext) -> Option<DateTime<Utc>> {
    run_tiers(&CARD_TIERS, text, ctx)
}

pub fn parse_context_date(text: &str, ctx: &DateContext) -> Option<DateTime<Utc>> {
    run_tiers(&CONTEXT_TIERS, text, ctx)
}

/// `"Thu, Jun 12"` or `"Thu, 12 Jun"`; the current year unless one follows.
pub fn parse_compact(text: &str, ctx: &DateContext) -> Option<DateTime<Utc>> {
    let caps = COMPACT_RE.captures(text)?;
    let (month, day) = match (caps.get(1), caps.get(2)) {
        (Some(month), Some(day)) => (month.as_str(), day.as_str()),
        _ => (caps.get(4)?.as_str(), caps.get(3)?.as_str()),
    };
    let year = year_or_current(&caps, 5, ctx)?;
    ymd(year, month_number(month)?, day.parse().ok()?)
}

/// Whole-string formats a general date parser would accept.
pub fn parse_generic(text: &str, _ctx: &DateContext) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    let formats = [
        "%Y-%m-%d",
        "%B %d, %Y",
        "%B %d %Y",
        "%A, %B %d, %Y",
        "%a, %b %d, %Y",
        "%d %B %Y",
        "%A, %d %B %Y",
        "%a, %d %b %Y",
    ];
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(midnight)
}

/// `"[Saturday, ]14th December 2024"`.
pub fn parse_day_month_year(text: &str, _ctx: &DateContext) -> Option<DateTime<Utc>> {
    let caps = DAY_MONTH_YEAR_RE.captures(text)?;
    ymd(
        caps[3].parse().ok()?,
        month_number(&caps[2])?,
        caps[1].parse().ok()?,
    )
}

/// `"December 14th[, 2024]"`; the current year when none is given.
pub fn parse_month_day(text: &str, ctx: &DateContext) -> Option<DateTime<Utc>> {
    let caps = MONTH_DAY_RE.captures(text)?;
    let year = year_or_current(&caps, 3, ctx)?;
    ymd(year, month_number(&caps[1])?, caps[2].parse().ok()?)
}

/// `"14/12/2024"`, day first; month first only when day first is impossible.
pub fn parse_numeric(text: &str, _ctx: &DateContext) -> Option<DateTime<Utc>> {
    let caps = NUMERIC_RE.captures(text)?;
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[2].parse().ok()?;
    let year = expand_year(&caps[3])?;
    ymd(year, second, first).or_else(|| ymd(year, first, second))
}

/// `"14-Dec-24"`, `"14 12 2024"` and similar day-first mixes.
pub fn parse_mixed_numeric(text: &str, _ctx: &DateContext) -> Option<DateTime<Utc>> {
    let caps = MIXED_RE.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = match caps[2].parse::<u32>() {
        Ok(number) => number,
        Err(_) => month_number(&caps[2])?,
    };
    ymd(expand_year(&caps[3])?, month, day)
}

/// First `H:MM[ am|pm]` token, verbatim.
pub fn extract_time(text: &str) -> Option<String> {
    TIME_RE.find(text).map(|m| m.as_str().to_string())
}

fn year_or_current(caps: &Captures<'_>, group: usize, ctx: &DateContext) -> Option<i32> {
    match caps.get(group) {
        Some(year) => year.as_str().parse().ok(),
        None => Some(ctx.year()),
    }
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(if raw.len() == 2 { 2000 + year } else { year })
}

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn ymd(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day).and_then(midnight)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}
