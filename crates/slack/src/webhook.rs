use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::blocks::WebhookMessage;
use crate::client::SlackError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &WebhookMessage) -> Result<(), SlackError>;
}

/// Used when no webhook URL is configured.
#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _message: &WebhookMessage) -> Result<(), SlackError> {
        debug!("webhook notifications disabled; skipping");
        Ok(())
    }
}

pub struct WebhookNotifier {
    client: Client,
    url: SecretString,
}

impl WebhookNotifier {
    pub fn new(url: SecretString, timeout: Duration) -> Result<Self, SlackError> {
        let client = Client::builder().timeout(timeout).build().map_err(SlackError::Request)?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &WebhookMessage) -> Result<(), SlackError> {
        let response = self
            .client
            .post(self.url.expose_secret())
            .json(message)
            .send()
            .await
            .map_err(SlackError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackError::Status { status: status.as_u16() });
        }
        Ok(())
    }
}
