use super::{Storage, StoreResult, WriteFields};
use crate::error::StoreError;
use crate::normalize::format_date;
use crate::types::{DraftEvent, EventFilter, EventPage, StoredEvent, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS events (
        id            TEXT PRIMARY KEY,
        title         TEXT NOT NULL,
        description   TEXT,
        date          TEXT NOT NULL,
        time          TEXT,
        location      TEXT,
        image_url     TEXT,
        original_url  TEXT NOT NULL UNIQUE,
        price         TEXT NOT NULL DEFAULT 'Free',
        category      TEXT NOT NULL DEFAULT 'Event',
        featured      INTEGER NOT NULL DEFAULT 0,
        source        TEXT NOT NULL,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL,
        UNIQUE (title, date)
    );
    CREATE INDEX IF NOT EXISTS idx_events_date ON events (date);
    CREATE INDEX IF NOT EXISTS idx_events_category ON events (category);
"#;

const COLUMNS: &str = "id, title, description, date, time, location, image_url, original_url, \
                       price, category, featured, source, created_at";

/// SQLite-backed event store.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!(path = %path.display(), "opened event store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Extended result code for a failed `UNIQUE` constraint.
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation && e.extended_code == SQLITE_CONSTRAINT_UNIQUE
    )
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<StoredEvent> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(12)?;
    Ok(StoredEvent {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        title: row.get(1)?,
        description: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        location: row.get(5)?,
        image_url: row.get(6)?,
        original_url: row.get(7)?,
        price: row.get(8)?,
        category: row.get(9)?,
        featured: row.get::<_, i64>(10)? != 0,
        source: row.get(11)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| conversion_error(12, e))?
            .with_timezone(&Utc),
    })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + 2);
    escaped.push('%');
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// WHERE clause and its bound values for `filter`, pagination excluded.
/// `LIKE` folds ASCII case only; `EventFilter::matches` folds the same way.
fn filter_clause(filter: &EventFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(category) = filter.effective_category() {
        conditions.push("category = ?".to_string());
        values.push(Value::Text(category.to_string()));
    }
    if filter.featured {
        conditions.push("featured = 1".to_string());
    }
    if let Some(search) = filter.effective_search() {
        conditions.push(
            "(title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\' OR location LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        let pattern = escape_like(search);
        values.extend(std::iter::repeat(Value::Text(pattern)).take(3));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn count_matching(conn: &Connection, filter: &EventFilter) -> rusqlite::Result<u64> {
    let (clause, values) = filter_clause(filter);
    let sql = format!("SELECT COUNT(*) FROM events{clause}");
    let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_by_original_url(&self, draft: &DraftEvent) -> StoreResult<UpsertOutcome> {
        let fields = WriteFields::from_draft(draft)?;
        let now = format_date(&Utc::now());
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM events WHERE original_url = ?1",
                params![fields.original_url],
                |row| row.get(0),
            )
            .optional()?;

        let written = match &existing {
            Some(id) => tx.execute(
                "UPDATE events SET title = ?2, date = ?3, time = ?4, location = ?5, image_url = ?6,
                        price = ?7, category = ?8, source = ?9, updated_at = ?10
                 WHERE id = ?1",
                params![
                    id,
                    fields.title,
                    fields.date,
                    fields.time,
                    fields.location,
                    fields.image_url,
                    fields.price,
                    fields.category,
                    fields.source,
                    now,
                ],
            ),
            None => tx.execute(
                "INSERT INTO events (id, title, date, time, location, image_url, original_url,
                                     price, category, source, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    Uuid::new_v4().to_string(),
                    fields.title,
                    fields.date,
                    fields.time,
                    fields.location,
                    fields.image_url,
                    fields.original_url,
                    fields.price,
                    fields.category,
                    fields.source,
                    now,
                ],
            ),
        };
        if let Err(e) = written {
            return Err(if is_unique_violation(&e) {
                fields.conflict()
            } else {
                e.into()
            });
        }

        let id: String = tx.query_row(
            "SELECT id FROM events WHERE original_url = ?1",
            params![fields.original_url],
            |row| row.get(0),
        )?;
        tx.commit()?;

        let id = Uuid::parse_str(&id)
            .map_err(|e| StoreError::InvalidRecord(format!("stored id '{id}': {e}")))?;
        debug!(%id, updated = existing.is_some(), "upserted event");
        Ok(match existing {
            Some(_) => UpsertOutcome::Updated(id),
            None => UpsertOutcome::Created(id),
        })
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Option<StoredEvent>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COLUMNS} FROM events WHERE id = ?1");
        let event = conn
            .query_row(&sql, params![id.to_string()], event_from_row)
            .optional()?;
        Ok(event)
    }

    async fn list_events(&self, filter: &EventFilter) -> StoreResult<EventPage> {
        let conn = self.conn()?;
        let total = count_matching(&conn, filter)?;

        let Ok(offset) = i64::try_from(filter.offset()) else {
            return Ok(EventPage::new(Vec::new(), total, filter));
        };
        let (clause, mut values) = filter_clause(filter);
        values.push(Value::Integer(i64::from(filter.limit())));
        values.push(Value::Integer(offset));
        let sql = format!(
            "SELECT {COLUMNS} FROM events{clause} ORDER BY date ASC, title ASC LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_from_iter(values), event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(EventPage::new(events, total, filter))
    }

    async fn count_events(&self, filter: &EventFilter) -> StoreResult<u64> {
        let conn = self.conn()?;
        Ok(count_matching(&conn, filter)?)
    }

    async fn categories(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT TRIM(category) AS c FROM events WHERE TRIM(category) <> '' ORDER BY c",
        )?;
        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(categories)
    }

    async fn set_featured(&self, id: Uuid, featured: bool) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE events SET featured = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), featured as i64, format_date(&Utc::now())],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(title: &str, url: &str, day: u32) -> DraftEvent {
        DraftEvent {
            title: title.to_string(),
            date: Utc.with_ymd_and_hms(2024, 9, day, 0, 0, 0).unwrap(),
            time: Some("7:00 PM".to_string()),
            location: Some("Enmore Theatre".to_string()),
            image_url: Some("https://img.evbuc.com/x.jpg".to_string()),
            original_url: format!("https://www.eventbrite.com.au/e/{url}"),
            price: "$30".to_string(),
            category: "Comedy".to_string(),
            source: "Eventbrite".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_refresh_by_url() {
        let store = SqliteStorage::open_in_memory().unwrap();
        let created = store
            .upsert_by_original_url(&draft("Stand-up Night", "standup-1", 6))
            .await
            .unwrap();
        assert!(matches!(created, UpsertOutcome::Created(_)));

        let mut refreshed = draft("Stand-up Night", "standup-1", 6);
        refreshed.price = "45".to_string();
        let updated = store.upsert_by_original_url(&refreshed).await.unwrap();
        assert_eq!(updated, UpsertOutcome::Updated(created.id()));

        let stored = store.get_event(created.id()).await.unwrap().unwrap();
        assert_eq!(stored.price, "$45");
        assert_eq!(stored.date, "2024-09-06T00:00:00.000Z");
        assert_eq!(stored.time.as_deref(), Some("7:00 PM"));
        assert!(!stored.featured);
    }

    #[tokio::test]
    async fn title_date_clash_is_reported_as_conflict() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store
            .upsert_by_original_url(&draft("Stand-up Night", "standup-1", 6))
            .await
            .unwrap();
        let err = store
            .upsert_by_original_url(&draft("Stand-up Night", "standup-new-url", 6))
            .await
            .unwrap_err();
        assert!(err.is_conflict(), "unexpected error: {err}");
        assert_eq!(store.count_events(&EventFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn filters_by_category_search_and_featured() {
        let store = SqliteStorage::open_in_memory().unwrap();
        let comedy = store
            .upsert_by_original_url(&draft("Stand-up Night", "a", 6))
            .await
            .unwrap();
        let mut gig = draft("100% Rock", "b", 7);
        gig.category = "Music".to_string();
        gig.location = Some("Oxford Art Factory".to_string());
        store.upsert_by_original_url(&gig).await.unwrap();
        store.set_featured(comedy.id(), true).await.unwrap();

        let by_category = EventFilter {
            category: Some("Music".to_string()),
            ..EventFilter::default()
        };
        assert_eq!(store.count_events(&by_category).await.unwrap(), 1);

        let all = EventFilter {
            category: Some("all".to_string()),
            ..EventFilter::default()
        };
        assert_eq!(store.count_events(&all).await.unwrap(), 2);

        let by_location = EventFilter {
            search: Some("art factory".to_string()),
            ..EventFilter::default()
        };
        let page = store.list_events(&by_location).await.unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].title, "100% Rock");

        let literal_percent = EventFilter {
            search: Some("100%".to_string()),
            ..EventFilter::default()
        };
        assert_eq!(store.count_events(&literal_percent).await.unwrap(), 1);

        let featured = EventFilter {
            featured: true,
            ..EventFilter::default()
        };
        let page = store.list_events(&featured).await.unwrap();
        assert_eq!(page.total_events, 1);
        assert_eq!(page.events[0].id, comedy.id());
    }

    #[tokio::test]
    async fn paginates_in_date_order() {
        let store = SqliteStorage::open_in_memory().unwrap();
        for day in [20, 3, 11, 7, 15] {
            store
                .upsert_by_original_url(&draft(&format!("Show {day}"), &format!("s{day}"), day))
                .await
                .unwrap();
        }
        let filter = EventFilter {
            page: 2,
            limit: 2,
            ..EventFilter::default()
        };
        let page = store.list_events(&filter).await.unwrap();
        let titles: Vec<_> = page.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Show 11", "Show 15"]);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_events, 5);
    }

    #[tokio::test]
    async fn categories_skip_blanks() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store.upsert_by_original_url(&draft("A", "a", 1)).await.unwrap();
        let mut blank = draft("B", "b", 2);
        blank.category = "  ".to_string();
        store.upsert_by_original_url(&blank).await.unwrap();
        let mut music = draft("C", "c", 3);
        music.category = "Music".to_string();
        store.upsert_by_original_url(&music).await.unwrap();

        assert_eq!(store.categories().await.unwrap(), vec!["Comedy", "Music"]);
    }

    #[tokio::test]
    async fn reopens_existing_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.db");
        {
            let store = SqliteStorage::open(&path).unwrap();
            store.upsert_by_original_url(&draft("A", "a", 1)).await.unwrap();
        }
        let store = SqliteStorage::open(&path).unwrap();
        assert_eq!(store.count_events(&EventFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn page_beyond_any_offset_is_empty() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store.upsert_by_original_url(&draft("A", "a", 1)).await.unwrap();
        let filter = EventFilter {
            page: 3_000_000_000,
            limit: 4_000_000_000,
            ..EventFilter::default()
        };
        let page = store.list_events(&filter).await.unwrap();
        assert!(page.events.is_empty());
        assert_eq!(page.total_events, 1);
        assert_eq!(page.current_page, 3_000_000_000);
    }

    #[tokio::test]
    async fn search_folds_case_like_the_in_memory_store() {
        let sqlite = SqliteStorage::open_in_memory().unwrap();
        let memory = crate::storage::InMemoryStorage::new();
        let cafe = draft("Café Crawl", "cafe", 4);
        sqlite.upsert_by_original_url(&cafe).await.unwrap();
        memory.upsert_by_original_url(&cafe).await.unwrap();

        for (needle, expected) in [("café", 1), ("CAFé", 1), ("CAFÉ", 0), ("crawl", 1)] {
            let filter = EventFilter {
                search: Some(needle.to_string()),
                ..EventFilter::default()
            };
            assert_eq!(sqlite.count_events(&filter).await.unwrap(), expected, "sqlite: {needle}");
            assert_eq!(memory.count_events(&filter).await.unwrap(), expected, "memory: {needle}");
        }
    }

    #[test]
    fn only_unique_failures_count_as_conflicts() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (name TEXT NOT NULL UNIQUE, n INTEGER CHECK (n > 0));
             INSERT INTO t (name, n) VALUES ('a', 1);",
        )
        .unwrap();

        let duplicate = conn
            .execute("INSERT INTO t (name, n) VALUES ('a', 2)", [])
            .unwrap_err();
        assert!(is_unique_violation(&duplicate));

        let null_name = conn
            .execute("INSERT INTO t (name, n) VALUES (NULL, 2)", [])
            .unwrap_err();
        assert!(!is_unique_violation(&null_name));

        let failed_check = conn
            .execute("INSERT INTO t (name, n) VALUES ('b', 0)", [])
            .unwrap_err();
        assert!(!is_unique_violation(&failed_check));
    }
}
