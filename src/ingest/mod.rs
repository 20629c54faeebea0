// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::config::{BoundingBox, FeedConfig};
use crate::ingest::types::{FeedProvider, FetchError, FetchMode, QuakeFeature};

/// Separator between the headline, the details and the disclaimer of a notice.
/// The preview page splits on it.
pub const SEGMENT_SEPARATOR: &str = " | ";

pub const PRELIMINARY_CAVEAT: &str =
    "This report is a preliminary assessment and is subject to change. ";

pub const DISCLAIMER: &str = "NOTICE: this automated account only posts notifications for earthquakes of magnitude 2.5+ that are located within the contiguous U.S.";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_total", "Feed fetches attempted.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Feed fetches that failed (transport, status, content type, parse)."
        );
        describe_counter!("feed_features_total", "Features parsed from the feed.");
        describe_counter!(
            "notices_formatted_total",
            "Features that passed the filters and became notices."
        );
        describe_histogram!("feed_fetch_ms", "Feed fetch + parse time in milliseconds.");
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("scheduler_last_tick_ts", "Unix ts of the last scheduler tick.");
    });
}

/// Geographic filter: exactly three coordinates and inside `bbox` (edges inclusive).
pub fn is_within_bbox(feature: &QuakeFeature, bbox: &BoundingBox) -> bool {
    feature
        .position()
        .is_some_and(|(lon, lat)| bbox.contains(lon, lat))
}

/// Recency filter: strictly newer than `now_ms - window_ms`.
pub fn is_recent(feature: &QuakeFeature, now_ms: i64, window_ms: i64) -> bool {
    feature.properties.time > now_ms.saturating_sub(window_ms)
}

/// `10/18/2026 at 3:04:05 PM EDT` in the given zone.
pub fn format_event_time(time_ms: i64, tz: Tz) -> String {
    let utc = DateTime::<Utc>::from_timestamp_millis(time_ms).unwrap_or_default();
    let local = utc.with_timezone(&tz);
    format!(
        "{} at {}",
        local.format("%-m/%-d/%Y"),
        local.format("%-I:%M:%S %p %Z")
    )
}

fn format_magnitude(mag: Option<f64>) -> String {
    mag.map(|m| m.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Render one notice: headline, caveat + detail link, disclaimer.
pub fn format_notice(feature: &QuakeFeature, tz: Tz) -> String {
    let p = &feature.properties;
    let headline = format!(
        "M {} earthquake located {} was reported by the U.S. Geological Survey on {}",
        format_magnitude(p.mag),
        p.place,
        format_event_time(p.time, tz)
    );
    let caveat = if feature.is_automatic() {
        PRELIMINARY_CAVEAT
    } else {
        ""
    };
    let details = format!(
        "{caveat}For the latest details visit the USGS (@usgs_quakes) event page at {}",
        p.url
    );
    [headline.as_str(), details.as_str(), DISCLAIMER].join(SEGMENT_SEPARATOR)
}

pub fn parse_time_zone(name: &str) -> Result<Tz, FetchError> {
    name.parse::<Tz>()
        .map_err(|_| FetchError::TimeZone(name.to_string()))
}

/// Apply the mode's filters to features in feed order and format the survivors.
///
/// Periodic keeps every feature in the box that is inside the recency window.
/// On-demand ignores recency and stops at the first feature in the box.
pub fn select_notices(
    features: &[QuakeFeature],
    mode: FetchMode,
    cfg: &FeedConfig,
    tz: Tz,
    now_ms: i64,
) -> Vec<String> {
    let mut notices = Vec::new();
    let mut in_box = 0usize;

    for feature in features.iter().filter(|f| is_within_bbox(f, &cfg.bbox)) {
        in_box += 1;
        match mode {
            FetchMode::OnDemand => {
                notices.push(format_notice(feature, tz));
                tracing::debug!(target: "ingest", "first eligible event found, skipping further processing");
                break;
            }
            FetchMode::Periodic => {
                if is_recent(feature, now_ms, cfg.recency_window_ms) {
                    notices.push(format_notice(feature, tz));
                }
            }
        }
    }

    if in_box == 0 {
        tracing::debug!(target: "ingest", mode = mode.as_str(), "no new events");
    }
    notices
}

/// Fetch the feed for `mode`, filter, and format. Failures are returned, not logged.
pub async fn fetch_and_filter(
    provider: &dyn FeedProvider,
    mode: FetchMode,
    cfg: &FeedConfig,
    now_ms: i64,
) -> Result<Vec<String>, FetchError> {
    ensure_metrics_described();
    let tz = parse_time_zone(&cfg.time_zone)?;

    let t0 = std::time::Instant::now();
    counter!("feed_fetch_total", "mode" => mode.as_str()).increment(1);
    let envelope = provider.fetch_feed(mode).await?;
    histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    let notices = select_notices(&envelope.features, mode, cfg, tz, now_ms);
    counter!("notices_formatted_total").increment(notices.len() as u64);

    tracing::info!(
        target: "ingest",
        provider = provider.name(),
        mode = mode.as_str(),
        features = envelope.features.len(),
        notices = notices.len(),
        "feed processed"
    );
    Ok(notices)
}

/// Boundary adapter: a broken feed yields no notices instead of an error.
pub async fn fetch_notices(
    provider: &dyn FeedProvider,
    mode: FetchMode,
    cfg: &FeedConfig,
) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    match fetch_and_filter(provider, mode, cfg, now_ms).await {
        Ok(notices) => notices,
        Err(e) => {
            counter!("feed_fetch_errors_total", "mode" => mode.as_str()).increment(1);
            tracing::error!(
                target: "ingest",
                error = %e,
                provider = provider.name(),
                mode = mode.as_str(),
                "feed fetch failed, treating as no events"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{Geometry, QuakeProperties};

    fn feature(lon: f64, lat: f64, time: i64, status: &str) -> QuakeFeature {
        QuakeFeature {
            id: "ci0001".into(),
            properties: QuakeProperties {
                mag: Some(3.4),
                place: "10 km NE of Somewhere, CA".into(),
                time,
                status: status.into(),
                url: "https://earthquake.usgs.gov/earthquakes/eventpage/ci0001".into(),
            },
            geometry: Geometry {
                coordinates: vec![lon, lat, 8.1],
            },
        }
    }

    #[test]
    fn two_component_positions_never_match() {
        let bbox = BoundingBox::CONTIGUOUS_US;
        let mut f = feature(-100.0, 40.0, 0, "reviewed");
        assert!(is_within_bbox(&f, &bbox));
        f.geometry.coordinates.truncate(2);
        assert!(!is_within_bbox(&f, &bbox));
    }

    #[test]
    fn bbox_boundaries_are_inclusive() {
        let bbox = BoundingBox::CONTIGUOUS_US;
        for (lon, lat) in [(-125.0, 24.6), (-65.0, 50.0), (-125.0, 50.0), (-65.0, 24.6)] {
            assert!(is_within_bbox(&feature(lon, lat, 0, ""), &bbox), "{lon},{lat}");
        }
        for (lon, lat) in [(-125.1, 30.0), (-64.9, 30.0), (-100.0, 24.5), (-100.0, 50.1)] {
            assert!(!is_within_bbox(&feature(lon, lat, 0, ""), &bbox), "{lon},{lat}");
        }
    }

    #[test]
    fn recency_window_edges() {
        let now = 1_700_000_000_000;
        assert!(is_recent(&feature(-100.0, 40.0, now - 59_999, ""), now, 60_000));
        assert!(!is_recent(&feature(-100.0, 40.0, now - 60_000, ""), now, 60_000));
        assert!(!is_recent(&feature(-100.0, 40.0, now - 60_001, ""), now, 60_000));
    }

    #[test]
    fn event_time_is_rendered_in_eastern_zone() {
        let tz = parse_time_zone("America/New_York").unwrap();
        // 2024-07-04T18:30:05Z = 2:30:05 PM EDT
        assert_eq!(
            format_event_time(1_720_117_805_000, tz),
            "7/4/2024 at 2:30:05 PM EDT"
        );
        // 2024-01-15T05:07:09Z = 12:07:09 AM EST
        assert_eq!(
            format_event_time(1_705_295_229_000, tz),
            "1/15/2024 at 12:07:09 AM EST"
        );
    }

    #[test]
    fn notice_has_three_segments_and_caveat_only_when_automatic() {
        let tz = parse_time_zone("America/New_York").unwrap();
        let auto = format_notice(&feature(-118.0, 34.0, 1_720_117_805_000, "automatic"), tz);
        assert_eq!(auto.split(SEGMENT_SEPARATOR).count(), 3);
        assert!(auto.starts_with("M 3.4 earthquake located 10 km NE of Somewhere, CA"));
        assert!(auto.contains(PRELIMINARY_CAVEAT));
        assert!(auto.ends_with(DISCLAIMER));

        let reviewed = format_notice(&feature(-118.0, 34.0, 1_720_117_805_000, "reviewed"), tz);
        assert!(!reviewed.contains(PRELIMINARY_CAVEAT));
        assert!(reviewed.contains(" | For the latest details visit"));
    }

    #[test]
    fn whole_magnitudes_have_no_trailing_zero() {
        assert_eq!(format_magnitude(Some(3.0)), "3");
        assert_eq!(format_magnitude(Some(2.51)), "2.51");
        assert_eq!(format_magnitude(None), "?");
    }

    #[test]
    fn on_demand_takes_first_in_feed_order() {
        let cfg = FeedConfig::default();
        let tz = parse_time_zone(&cfg.time_zone).unwrap();
        let mut a = feature(-150.0, 61.0, 0, "reviewed"); // Alaska, outside
        a.properties.place = "alaska".into();
        let mut b = feature(-118.0, 34.0, 1, "reviewed");
        b.properties.place = "first".into();
        let mut c = feature(-100.0, 40.0, 2, "reviewed");
        c.properties.place = "second".into();
        let mut d = feature(-90.0, 35.0, 3, "reviewed");
        d.properties.place = "third".into();

        let out = select_notices(&[a, b, c, d], FetchMode::OnDemand, &cfg, tz, i64::MAX);
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("located first"));
    }

    #[test]
    fn periodic_keeps_all_recent_in_box() {
        let cfg = FeedConfig::default();
        let tz = parse_time_zone(&cfg.time_zone).unwrap();
        let now = 1_700_000_000_000;
        let feats = vec![
            feature(-118.0, 34.0, now - 1_000, "automatic"),
            feature(-118.0, 34.0, now - 120_000, "automatic"),
            feature(-100.0, 40.0, now - 5_000, "reviewed"),
            feature(10.0, 40.0, now, "automatic"),
        ];
        let out = select_notices(&feats, FetchMode::Periodic, &cfg, tz, now);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn unknown_zone_is_an_error() {
        assert!(matches!(
            parse_time_zone("Mars/Olympus_Mons"),
            Err(FetchError::TimeZone(_))
        ));
    }
}
