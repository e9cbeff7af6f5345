//! Slack Web API client.
//!
//! Only the two methods this service needs are wrapped: `users.admin.invite`
//! for sending the workspace invitation and `auth.test` for readiness checks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use invitey_core::config::SlackConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("slack request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("slack returned HTTP {status}")]
    Status { status: u16 },
    #[error("failed to parse slack response: {source}; body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("slack api error: {0}")]
    Api(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InviteRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub channels: Vec<String>,
}

/// Envelope returned by `users.admin.invite`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    identity: AuthIdentity,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn invite(&self, request: &InviteRequest) -> Result<InviteResponse, SlackError>;
    async fn auth_test(&self) -> Result<AuthIdentity, SlackError>;
}

pub struct HttpSlackClient {
    client: Client,
    workspace_url: String,
    token: SecretString,
}

impl HttpSlackClient {
    pub fn new(
        workspace_url: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, SlackError> {
        let client = Client::builder().timeout(timeout).build().map_err(SlackError::Request)?;
        Ok(Self { client, workspace_url: workspace_url.into(), token })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackError> {
        Self::new(
            config.workspace_url.clone(),
            config.token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/api/{method}", self.workspace_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SlackApi for HttpSlackClient {
    async fn invite(&self, request: &InviteRequest) -> Result<InviteResponse, SlackError> {
        // The trailing timestamp keeps intermediaries from serving a cached response.
        let url = format!("{}?{}", self.api_url("users.admin.invite"), Utc::now().timestamp());

        let mut form = vec![
            ("set_active", "true".to_string()),
            ("token", self.token.expose_secret().to_string()),
            ("email", request.email.clone()),
            ("first_name", request.first_name.clone()),
            ("last_name", request.last_name.clone()),
        ];
        if !request.channels.is_empty() {
            form.push(("channels", request.channels.join(",")));
        }

        debug!(email = %request.email, "calling slack users.admin.invite");
        let response =
            self.client.post(&url).form(&form).send().await.map_err(SlackError::Request)?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "slack invite endpoint returned non-success status");
            return Err(SlackError::Status { status: status.as_u16() });
        }

        let body = response.text().await.map_err(SlackError::Request)?;
        serde_json::from_str::<InviteResponse>(&body)
            .map_err(|source| SlackError::Parse { body, source })
    }

    async fn auth_test(&self) -> Result<AuthIdentity, SlackError> {
        let response = self
            .client
            .post(self.api_url("auth.test"))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(SlackError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackError::Status { status: status.as_u16() });
        }

        let body = response.text().await.map_err(SlackError::Request)?;
        let result: AuthTestResponse = serde_json::from_str(&body)
            .map_err(|source| SlackError::Parse { body: body.clone(), source })?;

        if !result.ok {
            return Err(SlackError::Api(result.error.unwrap_or_else(|| "unknown".to_string())));
        }
        Ok(result.identity)
    }
}
