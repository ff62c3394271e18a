use crate::constants;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event pulled out of one listing page, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEvent {
    pub title: String,
    /// Falls back to the extraction time when no date could be parsed.
    pub date: DateTime<Utc>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub original_url: String,
    pub price: String,
    pub category: String,
    pub source: String,
}

impl DraftEvent {
    /// Records without a title or a source URL are never written.
    pub fn is_persistable(&self) -> bool {
        !self.title.trim().is_empty() && !self.original_url.trim().is_empty()
    }
}

/// An event as held by the store and returned on the read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// RFC 3339 UTC text; see [`crate::normalize::canonical_date`].
    pub date: String,
    pub time: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub original_url: String,
    pub price: String,
    pub category: String,
    pub featured: bool,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Uuid),
    Updated(Uuid),
}

impl UpsertOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => *id,
        }
    }
}

/// Read-side filter. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: bool,
    pub page: u32,
    pub limit: u32,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            featured: false,
            page: 1,
            limit: constants::DEFAULT_PAGE_SIZE,
        }
    }
}

impl EventFilter {
    /// Category filter with the "all" pseudo-category and blanks dropped.
    pub fn effective_category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
    }

    pub fn effective_search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.max(1)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    /// Applies every filter except pagination.
    pub fn matches(&self, event: &StoredEvent) -> bool {
        if let Some(category) = self.effective_category() {
            if event.category != category {
                return false;
            }
        }
        if self.featured && !event.featured {
            return false;
        }
        // ASCII case folding only, as SQLite's LIKE does.
        if let Some(search) = self.effective_search() {
            let needle = search.to_ascii_lowercase();
            let hit = |field: Option<&str>| {
                field
                    .map(|v| v.to_ascii_lowercase().contains(&needle))
                    .unwrap_or(false)
            };
            if !hit(Some(&event.title))
                && !hit(event.description.as_deref())
                && !hit(event.location.as_deref())
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub events: Vec<StoredEvent>,
    pub total_pages: u64,
    pub current_page: u32,
    pub total_events: u64,
}

impl EventPage {
    pub fn new(events: Vec<StoredEvent>, total_events: u64, filter: &EventFilter) -> Self {
        let limit = u64::from(filter.limit());
        Self {
            events,
            total_pages: total_events.div_ceil(limit),
            current_page: filter.page(),
            total_events,
        }
    }
}
