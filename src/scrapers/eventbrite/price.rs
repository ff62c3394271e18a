use crate::constants::DEFAULT_PRICE;
use once_cell::sync::Lazy;
use regex::Regex;

// A "starts at" phrase yields only its amount.
static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bstarts at\s+(\$\s*\d+(?:\.\d{2})?)|(\$\s*\d+(?:\.\d{2})?)|\b(free)\b|\b(complimentary)\b",
    )
    .expect("valid price regex")
});

/// The price signal inside `text`: a `$` amount, "free" or "complimentary".
pub fn match_price(text: &str) -> Option<String> {
    let caps = PRICE_RE.captures(text)?;
    (1..=4)
        .find_map(|group| caps.get(group))
        .map(|m| m.as_str().to_string())
}

/// Picks a price from the texts of price-bearing elements, in priority order.
///
/// The first non-empty text wins: its recognised price if there is one,
/// otherwise the text itself. Without any such text the whole card is
/// scanned, and `Free` is the last resort.
pub fn price_from_fields<I>(field_texts: I, card_text: &str) -> String
where
    I: IntoIterator<Item = String>,
{
    let first = field_texts
        .into_iter()
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty());
    if let Some(text) = first {
        return match_price(&text).unwrap_or(text);
    }
    price_from_text(card_text)
}

/// Price recognised anywhere in `text`, else `Free`.
pub fn price_from_text(text: &str) -> String {
    match_price(text).unwrap_or_else(|| DEFAULT_PRICE.to_string())
}
