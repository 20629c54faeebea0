use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-wide Prometheus recorder. Call once, from the binary.
pub fn install_recorder() -> Result<PrometheusHandle> {
    // Use default buckets to avoid API differences across crate versions.
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;

    describe_counter!("scheduler_ticks_total", "Periodic feed polls run.");
    describe_gauge!("scheduler_last_tick_ts", "Unix ts of the last scheduler tick.");
    describe_counter!("publish_items_total", "Notices handed to the publisher, by result.");
    describe_counter!("publish_batches_total", "Publish batches, by outcome.");

    Ok(handle)
}
