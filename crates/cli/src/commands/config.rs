use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use invitey_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

struct ConfigField<'a> {
    key: &'static str,
    value: String,
    env_keys: &'a [&'static str],
}

impl<'a> ConfigField<'a> {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'a [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::output(lines.join("\n"))
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField<'static>> {
    let webhook_url = if config.webhook_enabled() { "<redacted>" } else { "<unset>" };
    let channels = if config.slack.channels.is_empty() {
        "<none>".to_string()
    } else {
        config.slack.channels.join(",")
    };

    vec![
        ConfigField::new(
            "slack.workspace_url",
            config.slack.workspace_url.clone(),
            &["INVITEY_SLACK_WORKSPACE_URL"],
        ),
        ConfigField::new(
            "slack.token",
            redact_token(config.slack.token.expose_secret()),
            &["INVITEY_SLACK_TOKEN"],
        ),
        ConfigField::new("slack.webhook_url", webhook_url, &["INVITEY_SLACK_WEBHOOK_URL"]),
        ConfigField::new("slack.channels", channels, &["INVITEY_SLACK_CHANNELS"]),
        ConfigField::new(
            "slack.timeout_secs",
            config.slack.timeout_secs.to_string(),
            &["INVITEY_SLACK_TIMEOUT_SECS"],
        ),
        ConfigField::new(
            "profile.verify",
            config.profile.verify.to_string(),
            &["INVITEY_PROFILE_VERIFY"],
        ),
        ConfigField::new(
            "profile.require_public",
            config.profile.require_public.to_string(),
            &["INVITEY_PROFILE_REQUIRE_PUBLIC"],
        ),
        ConfigField::new(
            "profile.timeout_secs",
            config.profile.timeout_secs.to_string(),
            &["INVITEY_PROFILE_TIMEOUT_SECS"],
        ),
        ConfigField::new(
            "profile.search_redirect_marker",
            config.profile.search_redirect_marker.clone(),
            &["INVITEY_PROFILE_SEARCH_REDIRECT_MARKER"],
        ),
        ConfigField::new(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["INVITEY_SERVER_BIND_ADDRESS"],
        ),
        ConfigField::new("server.port", config.server.port.to_string(), &["INVITEY_SERVER_PORT"]),
        ConfigField::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["INVITEY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        ConfigField::new(
            "server.templates_dir",
            config.server.templates_dir.display().to_string(),
            &["INVITEY_SERVER_TEMPLATES_DIR"],
        ),
        ConfigField::new(
            "server.static_dir",
            config.server.static_dir.display().to_string(),
            &["INVITEY_SERVER_STATIC_DIR"],
        ),
        ConfigField::new(
            "logging.level",
            config.logging.level.clone(),
            &["INVITEY_LOGGING_LEVEL", "INVITEY_LOG_LEVEL"],
        ),
        ConfigField::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["INVITEY_LOGGING_FORMAT", "INVITEY_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("invitey.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/invitey.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the `xoxb`/`xoxp` prefix so operators can tell token types apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
