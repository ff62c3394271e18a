//! Persistent event store.
//!
//! Records are keyed by `original_url` for refreshes and must be unique on
//! `(title, date)`. A write that would break the second rule fails with
//! [`StoreError::Conflict`], which callers treat as an expected duplicate.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

use crate::error::StoreError;
use crate::normalize::{canonical_price, format_date};
use crate::types::{DraftEvent, EventFilter, EventPage, StoredEvent, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use uuid::Uuid;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Inserts the draft, or refreshes the record already stored under the
    /// same `original_url`.
    async fn upsert_by_original_url(&self, draft: &DraftEvent) -> StoreResult<UpsertOutcome>;

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<StoredEvent>>;

    /// Matching records sorted by date ascending, one page at a time.
    async fn list_events(&self, filter: &EventFilter) -> StoreResult<EventPage>;

    /// Number of matching records, ignoring pagination.
    async fn count_events(&self, filter: &EventFilter) -> StoreResult<u64>;

    /// Distinct non-empty categories, sorted.
    async fn categories(&self) -> StoreResult<Vec<String>>;

    /// Returns `false` when no record has `id`.
    async fn set_featured(&self, id: Uuid, featured: bool) -> StoreResult<bool>;
}

/// Field values as they are written for a draft.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WriteFields {
    pub title: String,
    pub date: String,
    pub time: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub original_url: String,
    pub price: String,
    pub category: String,
    pub source: String,
}

impl WriteFields {
    pub fn from_draft(draft: &DraftEvent) -> StoreResult<Self> {
        if !draft.is_persistable() {
            return Err(StoreError::InvalidRecord(
                "title and original URL are required".to_string(),
            ));
        }
        let original_url = draft.original_url.trim();
        let parsed = Url::parse(original_url).map_err(|e| {
            StoreError::InvalidRecord(format!("original URL '{original_url}': {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StoreError::InvalidRecord(format!(
                "original URL '{original_url}' is not http(s)"
            )));
        }

        Ok(Self {
            title: draft.title.trim().to_string(),
            date: format_date(&draft.date),
            time: non_blank(&draft.time),
            location: non_blank(&draft.location),
            image_url: non_blank(&draft.image_url),
            original_url: original_url.to_string(),
            price: canonical_price(&draft.price),
            category: draft.category.trim().to_string(),
            source: draft.source.clone(),
        })
    }

    pub fn into_new_record(self, id: Uuid, created_at: DateTime<Utc>) -> StoredEvent {
        StoredEvent {
            id,
            title: self.title,
            description: None,
            date: self.date,
            time: self.time,
            location: self.location,
            image_url: self.image_url,
            original_url: self.original_url,
            price: self.price,
            category: self.category,
            featured: false,
            source: self.source,
            created_at,
        }
    }

    /// Overwrites the scraped fields of `record`, keeping its identity,
    /// creation time and curated fields.
    pub fn apply_to(self, record: &mut StoredEvent) {
        record.title = self.title;
        record.date = self.date;
        record.time = self.time;
        record.location = self.location;
        record.image_url = self.image_url;
        record.price = self.price;
        record.category = self.category;
        record.source = self.source;
    }

    pub fn conflict(&self) -> StoreError {
        StoreError::Conflict {
            title: self.title.clone(),
            date: self.date.clone(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> DraftEvent {
        DraftEvent {
            title: "  Vivid Sydney  ".to_string(),
            date: Utc.with_ymd_and_hms(2024, 5, 24, 0, 0, 0).unwrap(),
            time: Some(" ".to_string()),
            location: Some("Circular Quay".to_string()),
            image_url: None,
            original_url: "https://www.eventbrite.com.au/e/vivid-1".to_string(),
            price: "25".to_string(),
            category: "Festival".to_string(),
            source: "Eventbrite".to_string(),
        }
    }

    #[test]
    fn write_fields_are_canonical() {
        let fields = WriteFields::from_draft(&draft()).unwrap();
        assert_eq!(fields.title, "Vivid Sydney");
        assert_eq!(fields.date, "2024-05-24T00:00:00.000Z");
        assert_eq!(fields.price, "$25");
        assert_eq!(fields.time, None);
    }

    #[test]
    fn drafts_without_title_or_url_are_rejected() {
        let mut untitled = draft();
        untitled.title = "   ".to_string();
        assert!(matches!(
            WriteFields::from_draft(&untitled),
            Err(StoreError::InvalidRecord(_))
        ));

        let mut relative = draft();
        relative.original_url = "/e/vivid-1".to_string();
        assert!(matches!(
            WriteFields::from_draft(&relative),
            Err(StoreError::InvalidRecord(_))
        ));
    }
}
