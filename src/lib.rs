// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod preview;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use crate::api::{create_router, AppState};
pub use crate::config::BotConfig;
pub use crate::ingest::scheduler::{spawn_feed_scheduler, PollJob};
pub use crate::ingest::types::FetchMode;

use crate::ingest::providers::usgs_geojson::UsgsGeoJsonProvider;
use crate::ingest::types::FeedProvider;
use crate::notify::{Publisher, ThreadsPublisher};

pub const ENV_LOG_FORMAT: &str = "QUAKE_LOG_FORMAT";

/// Install the tracing subscriber. `QUAKE_LOG_FORMAT=json` switches to JSON lines.
/// A no-op when the hosting runtime already installed one.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quake_notice_bot=info,warn"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed, keeping it");
    }
}

/// Production wiring: USGS feed provider + Threads publisher built from config.
pub struct Services {
    pub provider: Arc<dyn FeedProvider>,
    pub publisher: Arc<dyn Publisher>,
}

impl Services {
    pub fn from_config(cfg: &BotConfig) -> Result<Self> {
        let provider = UsgsGeoJsonProvider::from_config(&cfg.feed)?;
        let publisher = ThreadsPublisher::from_config(
            &cfg.publish,
            Duration::from_secs(cfg.feed.http_timeout_secs.max(1)),
        )?;
        Ok(Self {
            provider: Arc::new(provider),
            publisher: Arc::new(publisher),
        })
    }

    pub fn poll_job(&self, cfg: &BotConfig) -> PollJob {
        PollJob {
            provider: Arc::clone(&self.provider),
            publisher: Arc::clone(&self.publisher),
            feed: cfg.feed.clone(),
        }
    }
}
