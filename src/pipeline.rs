use crate::config::ScraperConfig;
use crate::error::{Result, StoreError};
use crate::metrics::IngestMetrics;
use crate::scrapers::eventbrite::{EventbriteCrawler, EventbriteParser};
use crate::scrapers::{ListingCrawler, ListingParser};
use crate::storage::Storage;
use crate::types::{DraftEvent, UpsertOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// What started an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Startup,
    Scheduled,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    FetchFailed,
    /// Another run for the same source held the guard.
    AlreadyRunning,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::FetchFailed => "fetch_failed",
            RunStatus::AlreadyRunning => "already_running",
        }
    }
}

/// Per-record outcomes of the store writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub created: usize,
    pub updated: usize,
    /// Dropped because another record holds the same title and date.
    pub duplicates: usize,
    /// Dropped for lacking a title or a usable URL.
    pub invalid: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub source: String,
    pub trigger: Trigger,
    pub status: RunStatus,
    pub error: Option<String>,
    pub strategy: Option<String>,
    pub candidates: usize,
    pub extracted: usize,
    pub writes: WriteStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestSummary {
    fn new(source: &str, trigger: Trigger, status: RunStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            source: source.to_string(),
            trigger,
            status,
            error: None,
            strategy: None,
            candidates: 0,
            extracted: 0,
            writes: WriteStats::default(),
            started_at,
            finished_at: started_at,
        }
    }

    /// Records processed by the run: every draft handed to the store writer.
    pub fn count(&self) -> usize {
        self.extracted
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn message(&self) -> String {
        match self.status {
            RunStatus::Completed => format!("Successfully scraped {} events", self.extracted),
            RunStatus::FetchFailed => format!(
                "Error scraping {}: {}",
                self.source,
                self.error.as_deref().unwrap_or("fetch failed")
            ),
            RunStatus::AlreadyRunning => {
                format!("A {} ingestion run is already in progress", self.source)
            }
        }
    }
}

/// Writes each draft independently. Duplicates and invalid drafts are
/// expected; only other storage failures are logged as errors.
pub async fn persist_drafts(storage: &dyn Storage, drafts: &[DraftEvent]) -> WriteStats {
    let mut stats = WriteStats::default();
    for draft in drafts {
        if !draft.is_persistable() {
            stats.invalid += 1;
            continue;
        }
        match storage.upsert_by_original_url(draft).await {
            Ok(UpsertOutcome::Created(_)) => stats.created += 1,
            Ok(UpsertOutcome::Updated(_)) => stats.updated += 1,
            Err(e) if e.is_conflict() => {
                stats.duplicates += 1;
                debug!(title = %draft.title, "skipping duplicate event");
            }
            Err(StoreError::InvalidRecord(reason)) => {
                stats.invalid += 1;
                warn!(url = %draft.original_url, %reason, "skipping invalid event");
            }
            Err(e) => {
                stats.failed += 1;
                error!(title = %draft.title, error = %e, "failed to store event");
            }
        }
    }
    stats
}

/// One ingestion source wired to a store, guarded so runs never overlap.
pub struct IngestService {
    crawler: Arc<dyn ListingCrawler>,
    parser: Arc<dyn ListingParser>,
    storage: Arc<dyn Storage>,
    guard: Mutex<()>,
}

impl IngestService {
    pub fn new(
        crawler: Arc<dyn ListingCrawler>,
        parser: Arc<dyn ListingParser>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            crawler,
            parser,
            storage,
            guard: Mutex::new(()),
        }
    }

    pub fn eventbrite(config: &ScraperConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        let crawler = EventbriteCrawler::new(config)?;
        let parser = EventbriteParser::new(&config.base_url, config.source.clone())?;
        Ok(Self::new(Arc::new(crawler), Arc::new(parser), storage))
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.storage)
    }

    pub fn source_name(&self) -> &str {
        &self.crawler.source_info().name
    }

    pub fn is_running(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    /// Runs one fetch, extract and persist pass. Never fails: the outcome is
    /// reported in the summary.
    #[instrument(skip(self), fields(source = %self.source_name()))]
    pub async fn run(&self, trigger: Trigger) -> IngestSummary {
        let started_at = Utc::now();
        let source = self.source_name().to_string();

        let Ok(_running) = self.guard.try_lock() else {
            warn!(%trigger, "ingestion already running, skipping trigger");
            IngestMetrics::record_run(trigger.as_str(), RunStatus::AlreadyRunning.as_str());
            return IngestSummary::new(&source, trigger, RunStatus::AlreadyRunning, started_at);
        };

        info!(%trigger, "starting ingestion run");
        let fetch_started = Instant::now();
        let body = match self.crawler.fetch_listing().await {
            Ok(body) => body,
            Err(e) => {
                error!(%trigger, error = %e, "failed to fetch listing");
                IngestMetrics::record_run(trigger.as_str(), RunStatus::FetchFailed.as_str());
                let mut summary =
                    IngestSummary::new(&source, trigger, RunStatus::FetchFailed, started_at);
                summary.error = Some(e.to_string());
                summary.finished_at = Utc::now();
                return summary;
            }
        };
        IngestMetrics::record_fetch_duration(fetch_started.elapsed().as_secs_f64());

        let listing = self.parser.parse_listing(&body, started_at);
        IngestMetrics::record_candidates(
            listing.strategy.to_string(),
            listing.candidates,
            listing.failures,
        );

        let writes = persist_drafts(self.storage.as_ref(), &listing.drafts).await;
        IngestMetrics::record_writes(writes.created, writes.updated, writes.duplicates, writes.failed);
        IngestMetrics::record_run(trigger.as_str(), RunStatus::Completed.as_str());

        let mut summary = IngestSummary::new(&source, trigger, RunStatus::Completed, started_at);
        summary.strategy = Some(listing.strategy.to_string());
        summary.candidates = listing.candidates;
        summary.extracted = listing.drafts.len();
        summary.writes = writes;
        summary.finished_at = Utc::now();

        info!(
            %trigger,
            strategy = %listing.strategy,
            extracted = summary.extracted,
            created = writes.created,
            updated = writes.updated,
            duplicates = writes.duplicates,
            failed = writes.failed,
            "ingestion run finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScraperError;
    use crate::scrapers::{LocatorStrategy, ParsedListing, SourceInfo};
    use crate::storage::InMemoryStorage;
    use crate::types::EventFilter;
    use chrono::TimeZone;
    use tokio::sync::Notify;

    fn draft(title: &str, url: &str) -> DraftEvent {
        DraftEvent {
            title: title.to_string(),
            date: Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap(),
            time: None,
            location: None,
            image_url: None,
            original_url: url.to_string(),
            price: "Free".to_string(),
            category: "Event".to_string(),
            source: "Eventbrite".to_string(),
        }
    }

    struct FixedParser(Vec<DraftEvent>);

    impl ListingParser for FixedParser {
        fn parse_listing(&self, _body: &str, _now: DateTime<Utc>) -> ParsedListing {
            ParsedListing {
                strategy: LocatorStrategy::Selector(".event-card"),
                candidates: self.0.len(),
                failures: 0,
                drafts: self.0.clone(),
            }
        }
    }

    struct StubCrawler {
        info: SourceInfo,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    impl StubCrawler {
        fn new(fail: bool, gate: Option<Arc<Notify>>) -> Self {
            Self {
                info: SourceInfo {
                    name: "Eventbrite".to_string(),
                    listing_url: "https://www.eventbrite.com.au/d/australia--sydney/events/"
                        .to_string(),
                },
                fail,
                gate,
            }
        }
    }

    #[async_trait::async_trait]
    impl ListingCrawler for StubCrawler {
        fn source_info(&self) -> &SourceInfo {
            &self.info
        }

        async fn fetch_listing(&self) -> Result<String> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(ScraperError::Fetch {
                    url: self.info.listing_url.clone(),
                    status: 403,
                });
            }
            Ok("<html></html>".to_string())
        }
    }

    fn service(crawler: StubCrawler, drafts: Vec<DraftEvent>) -> IngestService {
        IngestService::new(
            Arc::new(crawler),
            Arc::new(FixedParser(drafts)),
            Arc::new(InMemoryStorage::new()),
        )
    }

    #[tokio::test]
    async fn writer_skips_invalid_and_duplicate_drafts() {
        let storage = InMemoryStorage::new();
        let drafts = vec![
            draft("Opera", "https://www.eventbrite.com.au/e/opera"),
            draft("", "https://www.eventbrite.com.au/e/untitled"),
            draft("No link", ""),
            draft("Opera", "https://www.eventbrite.com.au/e/opera-again"),
        ];
        let stats = persist_drafts(&storage, &drafts).await;
        assert_eq!(
            stats,
            WriteStats {
                created: 1,
                updated: 0,
                duplicates: 1,
                invalid: 2,
                failed: 0,
            }
        );
        assert_eq!(storage.count_events(&EventFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let svc = service(
            StubCrawler::new(false, None),
            vec![
                draft("Opera", "https://www.eventbrite.com.au/e/opera"),
                draft("Ballet", "https://www.eventbrite.com.au/e/ballet"),
            ],
        );
        let first = svc.run(Trigger::Startup).await;
        assert!(first.is_success());
        assert_eq!(first.writes.created, 2);

        let second = svc.run(Trigger::Manual).await;
        assert_eq!(second.count(), 2);
        assert_eq!(second.writes.created, 0);
        assert_eq!(second.writes.updated, 2);
        assert_eq!(
            svc.storage().count_events(&EventFilter::default()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_reported_not_raised() {
        let svc = service(
            StubCrawler::new(true, None),
            vec![draft("Opera", "https://www.eventbrite.com.au/e/opera")],
        );
        let summary = svc.run(Trigger::Scheduled).await;
        assert_eq!(summary.status, RunStatus::FetchFailed);
        assert_eq!(summary.count(), 0);
        assert!(summary.message().contains("403"));
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn overlapping_trigger_is_turned_away() {
        let gate = Arc::new(Notify::new());
        let svc = Arc::new(service(
            StubCrawler::new(false, Some(Arc::clone(&gate))),
            vec![draft("Opera", "https://www.eventbrite.com.au/e/opera")],
        ));

        let background = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.run(Trigger::Scheduled).await })
        };
        while !svc.is_running() {
            tokio::task::yield_now().await;
        }

        let rejected = svc.run(Trigger::Manual).await;
        assert_eq!(rejected.status, RunStatus::AlreadyRunning);
        assert_eq!(rejected.count(), 0);

        gate.notify_one();
        let finished = background.await.unwrap();
        assert_eq!(finished.status, RunStatus::Completed);
        assert_eq!(finished.writes.created, 1);
    }
}
