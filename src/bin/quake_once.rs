//! One polling pass from the command line:
//! `quake-once [periodic|on-demand] [--publish]`
//!
//! Prints the notices that qualify and, with `--publish`, posts them to Threads
//! (a no-op unless THREADS_IG_USER_ID and THREADS_API_ACCESS_TOKEN are set).

use anyhow::{anyhow, Result};
use quake_notice_bot::ingest::fetch_and_filter;
use quake_notice_bot::notify::publish_batch;
use quake_notice_bot::{init_tracing, BotConfig, FetchMode, Services};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut mode = FetchMode::OnDemand;
    let mut publish = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--publish" => publish = true,
            other => mode = other.parse().map_err(|e: String| anyhow!(e))?,
        }
    }

    let cfg = BotConfig::load_default()?;
    let services = Services::from_config(&cfg)?;

    let now_ms = chrono::Utc::now().timestamp_millis();
    let notices = fetch_and_filter(services.provider.as_ref(), mode, &cfg.feed, now_ms).await?;
    if notices.is_empty() {
        println!("no qualifying events ({})", mode.as_str());
        return Ok(());
    }
    for n in &notices {
        println!("{n}\n");
    }

    if publish {
        let report = publish_batch(services.publisher.as_ref(), &notices).await;
        println!(
            "published {}/{} (skipped {})",
            report.receipts.len(),
            report.total,
            report.skipped()
        );
        if let Some(f) = report.failure {
            return Err(anyhow!("notice #{} failed: {}", f.index + 1, f.error));
        }
    }
    Ok(())
}
