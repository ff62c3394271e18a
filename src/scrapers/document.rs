//! Thin helpers over `scraper` for querying listing markup.

use scraper::{ElementRef, Html, Selector};

/// A parsed listing page.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    pub fn select<'a>(&'a self, selector: &Selector) -> Vec<ElementRef<'a>> {
        self.html.select(selector).collect()
    }
}

/// Collapses runs of whitespace into single spaces.
pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text below `element`, whitespace-collapsed.
pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first match of `selector` inside `element`, if non-empty.
pub fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

/// First non-empty text across an ordered list of selectors.
pub fn first_text_of(element: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|selector| first_text(element, selector))
}

/// Non-empty texts of the first match of each selector, in selector order.
pub fn texts_of(element: ElementRef<'_>, selectors: &[Selector]) -> Vec<String> {
    selectors
        .iter()
        .filter_map(|selector| first_text(element, selector))
        .collect()
}

pub fn first_attr(element: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_helpers_collapse_whitespace() {
        let doc = Document::parse(
            r#"<div class="card"><h3>  Night
                Market </h3><p class="empty">   </p><p class="x">two</p></div>"#,
        );
        let card_sel = Selector::parse(".card").unwrap();
        let card = doc.select(&card_sel)[0];

        let h3 = Selector::parse("h3").unwrap();
        let empty = Selector::parse(".empty").unwrap();
        let x = Selector::parse(".x").unwrap();

        assert_eq!(first_text(card, &h3).as_deref(), Some("Night Market"));
        assert_eq!(first_text(card, &empty), None);
        assert_eq!(
            first_text_of(card, &[empty.clone(), x.clone()]).as_deref(),
            Some("two")
        );
        assert_eq!(texts_of(card, &[h3, empty, x]), vec!["Night Market", "two"]);
    }
}
