use async_trait::async_trait;
use metrics::{counter, histogram};
use std::time::Duration;

use crate::config::FeedConfig;
use crate::ingest::types::{FeedEnvelope, FeedProvider, FetchError, FetchMode};

/// USGS real-time GeoJSON summary feed.
pub struct UsgsGeoJsonProvider {
    mode: Mode,
}

enum Mode {
    // Body served for every fetch regardless of `FetchMode`; keeps tests off the network.
    Fixture { content_type: String, body: String },
    Http {
        client: reqwest::Client,
        periodic_url: String,
        on_demand_url: String,
    },
}

impl UsgsGeoJsonProvider {
    pub fn from_fixture(content_type: &str, body: &str) -> Self {
        Self {
            mode: Mode::Fixture {
                content_type: content_type.to_string(),
                body: body.to_string(),
            },
        }
    }

    pub fn from_config(cfg: &FeedConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.http_timeout_secs.max(1)))
            .build()?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: reqwest::Client, cfg: &FeedConfig) -> Self {
        Self {
            mode: Mode::Http {
                client,
                periodic_url: cfg.periodic_url.clone(),
                on_demand_url: cfg.on_demand_url.clone(),
            },
        }
    }

    fn parse_envelope(url: &str, content_type: &str, body: &str) -> Result<FeedEnvelope, FetchError> {
        if !is_json_content_type(content_type) {
            return Err(FetchError::UnexpectedContentType {
                url: url.to_string(),
                content_type: content_type.to_string(),
            });
        }

        let t0 = std::time::Instant::now();
        let envelope: FeedEnvelope = serde_json::from_str(body)?;
        histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("feed_features_total").increment(envelope.features.len() as u64);
        Ok(envelope)
    }
}

#[async_trait]
impl FeedProvider for UsgsGeoJsonProvider {
    async fn fetch_feed(&self, mode: FetchMode) -> Result<FeedEnvelope, FetchError> {
        match &self.mode {
            Mode::Fixture { content_type, body } => {
                Self::parse_envelope("fixture", content_type, body)
            }

            Mode::Http {
                client,
                periodic_url,
                on_demand_url,
            } => {
                let url = match mode {
                    FetchMode::Periodic => periodic_url.as_str(),
                    FetchMode::OnDemand => on_demand_url.as_str(),
                };
                let http_err = |source| FetchError::Http {
                    url: url.to_string(),
                    source,
                };

                let resp = client.get(url).send().await.map_err(http_err)?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                let content_type = resp
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let body = resp.text().await.map_err(http_err)?;
                if !is_json_content_type(&content_type) {
                    // Keep the log short; an HTML error page can be large.
                    let preview: String = body.chars().take(200).collect();
                    tracing::error!(
                        target: "ingest",
                        %url, %content_type, body = %preview,
                        "unexpected response returned from USGS API"
                    );
                }
                Self::parse_envelope(url, &content_type, &body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "USGS"
    }
}

/// `application/json`, `application/geo+json` or any other `+json` media type.
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_media_types_are_recognized() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("Application/GEO+JSON"));
        assert!(!is_json_content_type("text/html"));
        assert!(!is_json_content_type("text/json+html"));
        assert!(!is_json_content_type(""));
    }

    #[tokio::test]
    async fn fixture_with_html_content_type_is_rejected() {
        let p = UsgsGeoJsonProvider::from_fixture("text/html", "<html>busy</html>");
        let err = p.fetch_feed(FetchMode::Periodic).await.unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedContentType { .. }));
    }

    #[tokio::test]
    async fn fixture_with_bad_json_is_a_parse_error() {
        let p = UsgsGeoJsonProvider::from_fixture("application/json", "{not json");
        let err = p.fetch_feed(FetchMode::OnDemand).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
