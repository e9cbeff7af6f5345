use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use invitey_core::config::AppConfig;
use invitey_slack::{HttpSlackClient, NoopNotifier, Notifier, SlackError, WebhookNotifier};
use thiserror::Error;
use tower_http::services::ServeDir;
use tracing::info;

use crate::health::{self, HealthState};
use crate::profile::{ProfileError, ProfileInspector};
use crate::signup::{self, init_templates, SignupSettings, SignupState};

pub struct Application {
    pub config: AppConfig,
    pub signup: SignupState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("slack client setup failed: {0}")]
    Slack(#[source] SlackError),
    #[error("profile inspector setup failed: {0}")]
    Profile(#[source] ProfileError),
}

impl Application {
    pub fn router(&self) -> Router {
        signup::router(self.signup.clone())
            .merge(health::router(HealthState { webhook_enabled: self.config.webhook_enabled() }))
            .nest_service("/static", ServeDir::new(&self.config.server.static_dir))
    }
}

/// Builds the application from an already-loaded config so `main` can set up
/// logging from the same values first.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let slack = HttpSlackClient::from_config(&config.slack).map_err(BootstrapError::Slack)?;

    let notifier: Arc<dyn Notifier> = match &config.slack.webhook_url {
        Some(webhook_url) => Arc::new(
            WebhookNotifier::new(
                webhook_url.clone(),
                Duration::from_secs(config.slack.timeout_secs),
            )
            .map_err(BootstrapError::Slack)?,
        ),
        None => Arc::new(NoopNotifier),
    };
    info!(
        event_name = "system.bootstrap.slack_ready",
        correlation_id = "bootstrap",
        webhook_enabled = config.webhook_enabled(),
        channels = config.slack.channels.len(),
        "slack client initialized"
    );

    let profiles = ProfileInspector::from_config(&config.profile).map_err(BootstrapError::Profile)?;
    let templates = init_templates(&config.server.templates_dir);
    info!(
        event_name = "system.bootstrap.templates_loaded",
        correlation_id = "bootstrap",
        templates_dir = %config.server.templates_dir.display(),
        "signup templates loaded"
    );

    let signup = SignupState::new(
        Arc::new(slack),
        notifier,
        Arc::new(profiles),
        templates,
        SignupSettings::from(&config),
    );

    Ok(Application { config, signup })
}
