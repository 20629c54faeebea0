// src/config/mod.rs
pub mod feed;
pub mod publish;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use feed::{BoundingBox, FeedConfig};
pub use publish::{Credentials, PublishConfig};

pub const ENV_CONFIG_PATH: &str = "QUAKE_CONFIG_PATH";
pub const ENV_POLL_INTERVAL_SECS: &str = "QUAKE_POLL_INTERVAL_SECS";
pub const ENV_SCHEDULER_ENABLED: &str = "QUAKE_SCHEDULER_ENABLED";

fn default_interval_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between periodic polls. Should match `feed.recency_window_ms`.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl BotConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.finish();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $QUAKE_CONFIG_PATH
    /// 2) config/quake.toml
    /// 3) config/quake.json
    /// 4) built-in defaults
    ///
    /// Env overrides are applied in every case.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/quake.toml", "config/quake.json"] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        let mut cfg = Self::default();
        cfg.finish();
        Ok(cfg)
    }

    fn finish(&mut self) {
        self.feed.sanitize();
        self.publish.apply_env();

        if let Some(secs) = std::env::var(ENV_POLL_INTERVAL_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.scheduler.interval_secs = secs;
        }
        if let Ok(v) = std::env::var(ENV_SCHEDULER_ENABLED) {
            self.scheduler.enabled = !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        // tokio::time::interval panics on a zero period
        if self.scheduler.interval_secs == 0 {
            self.scheduler.interval_secs = default_interval_secs();
        }
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<BotConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("invalid JSON config");
    }
    match toml::from_str::<BotConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!(toml_err))
            .context("unsupported config format"),
    }
}
