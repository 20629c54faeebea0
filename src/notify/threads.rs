use anyhow::{Context, Result};
use reqwest::{header, Client, Url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{PublishError, PublishReceipt, Publisher};
use crate::config::{Credentials, PublishConfig};

/// Status code and raw body of a Graph API call.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

/// Outbound POST used by the publisher. Swappable so tests can script replies.
#[async_trait::async_trait]
pub trait GraphTransport: Send + Sync {
    async fn post(&self, url: Url, bearer: &str) -> Result<ApiReply>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building Graph API client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl GraphTransport for ReqwestTransport {
    async fn post(&self, url: Url, bearer: &str) -> Result<ApiReply> {
        let resp = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .bearer_auth(bearer)
            .send()
            .await
            .context("graph api post")?;
        let status = resp.status().as_u16();
        let body = resp.text().await.context("graph api body")?;
        Ok(ApiReply { status, body })
    }
}

#[derive(Debug, Deserialize)]
struct CreateContainerResponse {
    id: String,
}

/// Two-phase Threads publisher: create a media container, then publish it.
#[derive(Clone)]
pub struct ThreadsPublisher {
    creds: Option<Credentials>,
    api_base: String,
    transport: Arc<dyn GraphTransport>,
}

impl ThreadsPublisher {
    pub fn from_config(cfg: &PublishConfig, timeout: Duration) -> Result<Self> {
        let transport = ReqwestTransport::new(timeout)?;
        Ok(Self::with_transport(cfg, Arc::new(transport)))
    }

    pub fn with_transport(cfg: &PublishConfig, transport: Arc<dyn GraphTransport>) -> Self {
        let creds = cfg.credentials();
        if creds.is_none() {
            tracing::info!(target: "notify", "Threads publishing disabled (no credentials)");
        }
        Self {
            creds,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.creds.is_some()
    }

    fn create_url(&self, user_id: &str, text: &str) -> Result<Url, PublishError> {
        Url::parse_with_params(
            &format!("{}/{}/media", self.api_base, user_id),
            &[
                ("surface", "threads"),
                ("text", text),
                ("cross_post_options", "0"),
            ],
        )
        .map_err(|e| PublishError::InvalidUrl(e.to_string()))
    }

    fn publish_url(&self, user_id: &str, container_id: &str) -> Result<Url, PublishError> {
        Url::parse_with_params(
            &format!("{}/{}/media_publish", self.api_base, user_id),
            &[("creation_id", container_id)],
        )
        .map_err(|e| PublishError::InvalidUrl(e.to_string()))
    }

    async fn create_container(&self, creds: &Credentials, text: &str) -> Result<String, PublishError> {
        let url = self.create_url(&creds.user_id, text)?;
        let reply = self
            .transport
            .post(url, &creds.access_token)
            .await
            .map_err(|e| PublishError::Transport {
                phase: "create",
                message: format!("{e:#}"),
            })?;

        if reply.status != 200 {
            return Err(PublishError::CreateRejected {
                status: reply.status,
            });
        }
        let parsed: CreateContainerResponse = serde_json::from_str(&reply.body)
            .map_err(|e| PublishError::MissingContainerId(e.to_string()))?;
        if parsed.id.trim().is_empty() {
            return Err(PublishError::MissingContainerId("empty id".to_string()));
        }
        Ok(parsed.id)
    }

    async fn confirm_container(&self, creds: &Credentials, container_id: &str) -> Result<(), PublishError> {
        let url = self.publish_url(&creds.user_id, container_id)?;
        let reply = self
            .transport
            .post(url, &creds.access_token)
            .await
            .map_err(|e| PublishError::Transport {
                phase: "publish",
                message: format!("{e:#}"),
            })?;

        if reply.status != 200 {
            tracing::error!(
                target: "notify",
                status = reply.status,
                container_id,
                "unable to publish Threads post"
            );
            return Err(PublishError::ConfirmRejected {
                container_id: container_id.to_string(),
                status: reply.status,
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Publisher for ThreadsPublisher {
    async fn publish(&self, text: &str) -> Result<PublishReceipt, PublishError> {
        let Some(creds) = &self.creds else {
            tracing::debug!(target: "notify", "Threads disabled, skipping post");
            return Ok(PublishReceipt::Disabled);
        };

        let container_id = self.create_container(creds, text).await?;
        self.confirm_container(creds, &container_id).await?;
        tracing::info!(target: "notify", %container_id, "Threads post published");
        Ok(PublishReceipt::Published { container_id })
    }

    fn name(&self) -> &'static str {
        "threads"
    }
}
