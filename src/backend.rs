//! Session-start / session-end collaborator.
//!
//! The controller only needs two calls from the interview service: mark the
//! session started when it goes live and mark it ended when it finishes.
//! [`HttpSessionBackend`] implements them over the REST API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::BackendConfig;
use crate::error::{ProctorError, Result};

/// Acknowledgement body returned by the start/end routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionAck {
    #[serde(default)]
    pub status: String,
}

/// Remote bookkeeping for a session's lifecycle.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn start_session(&self, session_id: &str) -> Result<SessionAck>;

    async fn end_session(&self, session_id: &str) -> Result<SessionAck>;
}

/// REST implementation: `POST {base}{prefix}/interview/{id}/start` and `/end`.
pub struct HttpSessionBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpSessionBackend {
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn route(&self, session_id: &str, action: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let prefix = self.config.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{base}/interview/{session_id}/{action}")
        } else {
            format!("{base}/{prefix}/interview/{session_id}/{action}")
        }
    }

    async fn post(&self, session_id: &str, action: &str) -> Result<SessionAck> {
        let url = self.route(session_id, action);
        tracing::debug!(%url, "session backend request");
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ProctorError::Backend(format!("{action} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProctorError::Backend(format!(
                "{action} returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        // An empty or non-JSON body still counts as success.
        let body = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn start_session(&self, session_id: &str) -> Result<SessionAck> {
        self.post(session_id, "start").await
    }

    async fn end_session(&self, session_id: &str) -> Result<SessionAck> {
        self.post(session_id, "end").await
    }
}
