// src/config/publish.rs
use serde::{Deserialize, Serialize};

pub const ENV_USER_ID: &str = "THREADS_IG_USER_ID";
pub const ENV_ACCESS_TOKEN: &str = "THREADS_API_ACCESS_TOKEN";
pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

fn default_api_base() -> String {
    DEFAULT_GRAPH_API_BASE.to_string()
}

/// Threads publishing settings. Publishing is disabled unless both the
/// account id and the bearer token are present.
#[derive(Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            access_token: None,
            api_base: default_api_base(),
        }
    }
}

// Token stays out of logs.
impl std::fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishConfig")
            .field("user_id", &self.user_id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|t| format!("<{} chars>", t.len())),
            )
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Credentials resolved from a `PublishConfig`; only exists when both parts are set.
#[derive(Clone)]
pub struct Credentials {
    pub user_id: String,
    pub access_token: String,
}

impl PublishConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        let user_id = non_blank(self.user_id.as_deref())?;
        let access_token = non_blank(self.access_token.as_deref())?;
        Some(Credentials {
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials().is_some()
    }

    /// Env wins over whatever the config file said.
    pub(crate) fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_USER_ID) {
            self.user_id = Some(v);
        }
        if let Ok(v) = std::env::var(ENV_ACCESS_TOKEN) {
            self.access_token = Some(v);
        }
        self.api_base = self.api_base.trim_end_matches('/').to_string();
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
