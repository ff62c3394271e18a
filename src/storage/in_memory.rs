use super::{Storage, StoreResult, WriteFields};
use crate::error::StoreError;
use crate::types::{DraftEvent, EventFilter, EventPage, StoredEvent, UpsertOutcome};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// In-memory store for tests and throwaway runs.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    events: Arc<Mutex<HashMap<Uuid, StoredEvent>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<Uuid, StoredEvent>>> {
        self.events.lock().map_err(|_| StoreError::Poisoned)
    }

    fn sorted_matches(&self, filter: &EventFilter) -> StoreResult<Vec<StoredEvent>> {
        let events = self.lock()?;
        let mut matches: Vec<StoredEvent> =
            events.values().filter(|e| filter.matches(e)).cloned().collect();
        matches.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));
        Ok(matches)
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_by_original_url(&self, draft: &DraftEvent) -> StoreResult<UpsertOutcome> {
        let fields = WriteFields::from_draft(draft)?;
        let mut events = self.lock()?;

        let existing = events
            .values()
            .find(|e| e.original_url == fields.original_url)
            .map(|e| e.id);
        let clashes = events
            .values()
            .any(|e| Some(e.id) != existing && e.title == fields.title && e.date == fields.date);
        if clashes {
            return Err(fields.conflict());
        }

        match existing.and_then(|id| events.get_mut(&id)) {
            Some(record) => {
                fields.apply_to(record);
                debug!(id = %record.id, "updated event");
                Ok(UpsertOutcome::Updated(record.id))
            }
            None => {
                let id = Uuid::new_v4();
                events.insert(id, fields.into_new_record(id, Utc::now()));
                debug!(%id, "created event");
                Ok(UpsertOutcome::Created(id))
            }
        }
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<StoredEvent>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> StoreResult<EventPage> {
        let matches = self.sorted_matches(filter)?;
        let total = matches.len() as u64;
        let events = matches
            .into_iter()
            .skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX))
            .take(filter.limit() as usize)
            .collect();
        Ok(EventPage::new(events, total, filter))
    }

    async fn count_events(&self, filter: &EventFilter) -> StoreResult<u64> {
        let events = self.lock()?;
        Ok(events.values().filter(|e| filter.matches(e)).count() as u64)
    }

    async fn categories(&self) -> StoreResult<Vec<String>> {
        let events = self.lock()?;
        let categories: BTreeSet<String> = events
            .values()
            .map(|e| e.category.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        Ok(categories.into_iter().collect())
    }

    async fn set_featured(&self, id: Uuid, featured: bool) -> StoreResult<bool> {
        let mut events = self.lock()?;
        Ok(match events.get_mut(&id) {
            Some(record) => {
                record.featured = featured;
                true
            }
            None => false,
        })
    }
}
