// src/ingest/scheduler.rs
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{FeedConfig, SchedulerConfig};
use crate::ingest::types::{FeedProvider, FetchMode};
use crate::notify::{publish_batch, Publisher};

/// Everything one periodic tick needs.
#[derive(Clone)]
pub struct PollJob {
    pub provider: Arc<dyn FeedProvider>,
    pub publisher: Arc<dyn Publisher>,
    pub feed: FeedConfig,
}

impl PollJob {
    /// Fetch in periodic mode and, when anything qualifies, hand the notices to the
    /// publisher on a detached task. The tick never waits on publishing; the returned
    /// handle is only for callers that want to observe it (tests).
    pub async fn tick(&self, tick_no: u64) -> Option<JoinHandle<bool>> {
        counter!("scheduler_ticks_total").increment(1);
        gauge!("scheduler_last_tick_ts").set(chrono::Utc::now().timestamp() as f64);

        let notices =
            crate::ingest::fetch_notices(self.provider.as_ref(), FetchMode::Periodic, &self.feed)
                .await;
        if notices.is_empty() {
            tracing::debug!(target: "ingest", tick_no, "nothing to post");
            return None;
        }

        let publisher = Arc::clone(&self.publisher);
        Some(tokio::spawn(async move {
            let report = publish_batch(publisher.as_ref(), &notices).await;
            if report.all_succeeded() {
                tracing::info!(
                    target: "notify",
                    tick_no,
                    posted = report.receipts.len(),
                    "SCHEDULE | posting to {} SUCCEEDED",
                    publisher.name()
                );
            } else {
                tracing::error!(
                    target: "notify",
                    tick_no,
                    posted = report.receipts.len(),
                    skipped = report.skipped(),
                    "SCHEDULE | posting to {} FAILED",
                    publisher.name()
                );
            }
            report.all_succeeded()
        }))
    }
}

/// Spawn the periodic poller. Returns immediately; the loop runs until the runtime stops.
pub fn spawn_feed_scheduler(cfg: SchedulerConfig, job: PollJob) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(cfg.interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            target: "ingest",
            interval_secs = period.as_secs(),
            window_ms = job.feed.recency_window_ms,
            "feed scheduler started"
        );

        let mut tick_no: u64 = 0;
        loop {
            ticker.tick().await;
            tick_no += 1;
            // Detached: the handle is dropped, the publish task keeps running.
            let _ = job.tick(tick_no).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{FeedEnvelope, FetchError};
    use crate::notify::{PublishError, PublishReceipt};
    use std::sync::Mutex;

    struct StaticFeed(Result<FeedEnvelope, ()>);

    #[async_trait::async_trait]
    impl FeedProvider for StaticFeed {
        async fn fetch_feed(&self, _mode: FetchMode) -> Result<FeedEnvelope, FetchError> {
            match &self.0 {
                Ok(env) => Ok(env.clone()),
                Err(()) => Err(FetchError::UnexpectedContentType {
                    url: "test".into(),
                    content_type: "text/html".into(),
                }),
            }
        }
        fn name(&self) -> &'static str {
            "static"
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(PublishReceipt::Disabled)
        }
        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn fresh_feed() -> FeedEnvelope {
        let now = chrono::Utc::now().timestamp_millis();
        let raw = format!(
            r#"{{"features":[
                {{"properties":{{"mag":2.9,"place":"5 km W of Cobb, CA","time":{now},"status":"automatic","url":"https://earthquake.usgs.gov/earthquakes/eventpage/nc1"}},
                  "geometry":{{"coordinates":[-122.8,38.8,2.1]}}}},
                {{"properties":{{"mag":4.0,"place":"Tonga","time":{now},"status":"reviewed","url":"u"}},
                  "geometry":{{"coordinates":[-175.0,-21.0,10.0]}}}}
            ]}}"#
        );
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn tick_publishes_fresh_notices_on_detached_task() {
        let publisher = Arc::new(RecordingPublisher::default());
        let job = PollJob {
            provider: Arc::new(StaticFeed(Ok(fresh_feed()))),
            publisher: publisher.clone(),
            feed: FeedConfig::default(),
        };

        let handle = job.tick(1).await.expect("publish task spawned");
        assert!(handle.await.unwrap());
        let seen = publisher.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("Cobb, CA"));
    }

    #[tokio::test]
    async fn broken_feed_spawns_nothing() {
        let publisher = Arc::new(RecordingPublisher::default());
        let job = PollJob {
            provider: Arc::new(StaticFeed(Err(()))),
            publisher: publisher.clone(),
            feed: FeedConfig::default(),
        };
        assert!(job.tick(1).await.is_none());
        assert!(publisher.seen.lock().unwrap().is_empty());
    }
}
