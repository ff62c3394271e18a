use crate::pipeline::{IngestService, Trigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Runs ingestion once at startup and then on a fixed interval.
pub struct Scheduler {
    service: Arc<IngestService>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(service: Arc<IngestService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run_forever())
    }

    async fn run_forever(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            source = %self.service.source_name(),
            "scheduler started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately.
        let mut trigger = Trigger::Startup;
        loop {
            ticker.tick().await;
            run_isolated(Arc::clone(&self.service), trigger).await;
            trigger = Trigger::Scheduled;
        }
    }
}

/// Runs one pass in its own task so a panic is logged instead of ending the
/// scheduler.
async fn run_isolated(service: Arc<IngestService>, trigger: Trigger) {
    match tokio::spawn(async move { service.run(trigger).await }).await {
        Ok(summary) => info!(
            %trigger,
            status = summary.status.as_str(),
            count = summary.count(),
            "scheduled ingestion finished"
        ),
        Err(e) => error!(%trigger, error = %e, "ingestion run aborted"),
    }
}
