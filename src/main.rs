//! Quake notice bot binary entrypoint.
//! Boots the Axum HTTP server and the periodic USGS poller.

use quake_notice_bot::{
    create_router, init_tracing, spawn_feed_scheduler, AppState, BotConfig, Services,
};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = BotConfig::load_default()?;
    tracing::info!(
        periodic_url = %cfg.feed.periodic_url,
        on_demand_url = %cfg.feed.on_demand_url,
        publishing = cfg.publish.is_enabled(),
        scheduler = cfg.scheduler.enabled,
        "config loaded"
    );

    let services = Services::from_config(&cfg)?;

    if cfg.scheduler.enabled {
        spawn_feed_scheduler(cfg.scheduler.clone(), services.poll_job(&cfg));
    } else {
        tracing::warn!("feed scheduler disabled, serving preview only");
    }

    let mut state = AppState::new(services.provider.clone(), cfg.feed.clone());
    match quake_notice_bot::metrics::install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(create_router(state).into())
}
