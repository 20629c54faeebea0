// src/ingest/types.rs
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Which feed to read and how to filter it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchMode {
    /// Scheduler poll: short look-back feed, only events from the last window.
    Periodic,
    /// Preview request: long look-back feed, first eligible event only.
    OnDemand,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Periodic => "periodic",
            FetchMode::OnDemand => "on-demand",
        }
    }
}

impl std::str::FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "periodic" | "cron" => Ok(FetchMode::Periodic),
            "on-demand" | "ondemand" | "latest" => Ok(FetchMode::OnDemand),
            other => Err(format!("unknown fetch mode '{other}'")),
        }
    }
}

/// GeoJSON `FeatureCollection` as served by the USGS summary feeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedEnvelope {
    #[serde(default)]
    pub metadata: FeedMetadata,
    #[serde(default)]
    pub features: Vec<QuakeFeature>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedMetadata {
    /// Epoch ms.
    #[serde(default)]
    pub generated: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuakeFeature {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: QuakeProperties,
    #[serde(default, deserialize_with = "null_as_default")]
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuakeProperties {
    pub mag: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub place: String,
    /// Epoch ms.
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geometry {
    /// `[longitude, latitude, depth]`
    #[serde(default, deserialize_with = "null_as_default")]
    pub coordinates: Vec<f64>,
}

/// USGS emits `null` for missing members; treat it like an absent field.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

impl QuakeFeature {
    /// `(longitude, latitude)` when the position has all three components.
    pub fn position(&self) -> Option<(f64, f64)> {
        match self.geometry.coordinates.as_slice() {
            [lon, lat, _depth] => Some((*lon, *lat)),
            _ => None,
        }
    }

    pub fn is_automatic(&self) -> bool {
        self.properties.status == "automatic"
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("feed {url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("feed {url} returned unexpected content type {content_type:?}")]
    UnexpectedContentType { url: String, content_type: String },
    #[error("feed body is not a GeoJSON feature collection: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid time zone '{0}'")]
    TimeZone(String),
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_feed(&self, mode: FetchMode) -> Result<FeedEnvelope, FetchError>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_requires_three_components() {
        let mut f = QuakeFeature::default();
        f.geometry.coordinates = vec![-118.0, 34.0];
        assert_eq!(f.position(), None);
        f.geometry.coordinates = vec![-118.0, 34.0, 7.5];
        assert_eq!(f.position(), Some((-118.0, 34.0)));
        f.geometry.coordinates = vec![-118.0, 34.0, 7.5, 1.0];
        assert_eq!(f.position(), None);
    }

    #[test]
    fn tolerant_feature_parsing() {
        let raw = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"mag":null,"place":"x"},"geometry":{"type":"Point"}},
            {"type":"Feature","properties":{"mag":3.1,"place":null,"status":null},"geometry":null}
        ]}"#;
        let env: FeedEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.features.len(), 2);
        assert!(env.features[0].properties.mag.is_none());
        assert!(env.features[0].position().is_none());
        assert_eq!(env.features[1].properties.place, "");
        assert!(env.features[1].position().is_none());
    }

    #[test]
    fn mode_parses_from_cli_words() {
        assert_eq!("cron".parse::<FetchMode>().unwrap(), FetchMode::Periodic);
        assert_eq!("On-Demand".parse::<FetchMode>().unwrap(), FetchMode::OnDemand);
        assert!("weekly".parse::<FetchMode>().is_err());
    }
}
