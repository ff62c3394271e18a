//! Read path over the event store.
//!
//! Everything returned from here has been through the normalizer and the
//! image URL resolver, whatever the stored values look like.

use crate::normalize::{normalize_event, resolve_image_url};
use crate::storage::{Storage, StoreResult};
use crate::types::{EventFilter, EventPage, StoredEvent};
use chrono::{DateTime, Utc};
use uuid::Uuid;

fn present(event: StoredEvent, now: DateTime<Utc>) -> StoredEvent {
    let mut event = normalize_event(event, now);
    event.image_url = resolve_image_url(&event.source, event.image_url.as_deref());
    event
}

pub async fn list_events(storage: &dyn Storage, filter: &EventFilter) -> StoreResult<EventPage> {
    let now = Utc::now();
    let mut page = storage.list_events(filter).await?;
    page.events = page
        .events
        .into_iter()
        .map(|event| present(event, now))
        .collect();
    Ok(page)
}

pub async fn get_event(storage: &dyn Storage, id: Uuid) -> StoreResult<Option<StoredEvent>> {
    let now = Utc::now();
    Ok(storage.get_event(id).await?.map(|event| present(event, now)))
}

pub async fn categories(storage: &dyn Storage) -> StoreResult<Vec<String>> {
    storage.categories().await
}
