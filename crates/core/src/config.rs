use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub profile: ProfileConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub workspace_url: String,
    pub token: SecretString,
    pub webhook_url: Option<SecretString>,
    pub channels: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ProfileConfig {
    pub verify: bool,
    pub require_public: bool,
    pub timeout_secs: u64,
    pub search_redirect_marker: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub slack_workspace_url: Option<String>,
    pub slack_token: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub profile_verify: Option<bool>,
    pub profile_require_public: Option<bool>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                workspace_url: "https://slack.com".to_string(),
                token: String::new().into(),
                webhook_url: None,
                channels: Vec::new(),
                timeout_secs: 10,
            },
            profile: ProfileConfig {
                verify: true,
                require_public: true,
                timeout_secs: 5,
                search_redirect_marker: "MvpSearch".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                templates_dir: PathBuf::from("templates"),
                static_dir: PathBuf::from("static"),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("invitey.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn webhook_enabled(&self) -> bool {
        self.slack.webhook_url.is_some()
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(workspace_url) = slack.workspace_url {
                self.slack.workspace_url = workspace_url;
            }
            if let Some(slack_token_value) = slack.token {
                self.slack.token = secret_value(slack_token_value);
            }
            if let Some(webhook_url) = slack.webhook_url {
                self.slack.webhook_url = Some(secret_value(webhook_url));
            }
            if let Some(channels) = slack.channels {
                self.slack.channels = channels;
            }
            if let Some(timeout_secs) = slack.timeout_secs {
                self.slack.timeout_secs = timeout_secs;
            }
        }

        if let Some(profile) = patch.profile {
            if let Some(verify) = profile.verify {
                self.profile.verify = verify;
            }
            if let Some(require_public) = profile.require_public {
                self.profile.require_public = require_public;
            }
            if let Some(timeout_secs) = profile.timeout_secs {
                self.profile.timeout_secs = timeout_secs;
            }
            if let Some(marker) = profile.search_redirect_marker {
                self.profile.search_redirect_marker = marker;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(templates_dir) = server.templates_dir {
                self.server.templates_dir = templates_dir;
            }
            if let Some(static_dir) = server.static_dir {
                self.server.static_dir = static_dir;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("INVITEY_SLACK_WORKSPACE_URL") {
            self.slack.workspace_url = value;
        }
        if let Some(value) = read_env("INVITEY_SLACK_TOKEN") {
            self.slack.token = secret_value(value);
        }
        if let Some(value) = read_env("INVITEY_SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(secret_value(value));
        }
        if let Some(value) = read_env("INVITEY_SLACK_CHANNELS") {
            self.slack.channels = parse_list(&value);
        }
        if let Some(value) = read_env("INVITEY_SLACK_TIMEOUT_SECS") {
            self.slack.timeout_secs = parse_u64("INVITEY_SLACK_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("INVITEY_PROFILE_VERIFY") {
            self.profile.verify = parse_bool("INVITEY_PROFILE_VERIFY", &value)?;
        }
        if let Some(value) = read_env("INVITEY_PROFILE_REQUIRE_PUBLIC") {
            self.profile.require_public = parse_bool("INVITEY_PROFILE_REQUIRE_PUBLIC", &value)?;
        }
        if let Some(value) = read_env("INVITEY_PROFILE_TIMEOUT_SECS") {
            self.profile.timeout_secs = parse_u64("INVITEY_PROFILE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("INVITEY_PROFILE_SEARCH_REDIRECT_MARKER") {
            self.profile.search_redirect_marker = value;
        }

        if let Some(value) = read_env("INVITEY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("INVITEY_SERVER_PORT") {
            self.server.port = parse_u16("INVITEY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("INVITEY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("INVITEY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("INVITEY_SERVER_TEMPLATES_DIR") {
            self.server.templates_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("INVITEY_SERVER_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(value);
        }

        let log_level =
            read_env("INVITEY_LOGGING_LEVEL").or_else(|| read_env("INVITEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("INVITEY_LOGGING_FORMAT").or_else(|| read_env("INVITEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(workspace_url) = overrides.slack_workspace_url {
            self.slack.workspace_url = workspace_url;
        }
        if let Some(slack_token) = overrides.slack_token {
            self.slack.token = secret_value(slack_token);
        }
        if let Some(webhook_url) = overrides.slack_webhook_url {
            self.slack.webhook_url = Some(secret_value(webhook_url));
        }
        if let Some(verify) = overrides.profile_verify {
            self.profile.verify = verify;
        }
        if let Some(require_public) = overrides.profile_require_public {
            self.profile.require_public = require_public;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_profile(&self.profile)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("invitey.toml"), PathBuf::from("config/invitey.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    match Url::parse(value.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if !is_http_url(&slack.workspace_url) {
        return Err(ConfigError::Validation(
            "slack.workspace_url must be an absolute http:// or https:// URL".to_string(),
        ));
    }

    let token = slack.token.expose_secret();
    if token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.token is required. Use a workspace admin token with permission to send invitations".to_string(),
        ));
    }
    if !token.starts_with("xox") {
        return Err(ConfigError::Validation(
            "slack.token must be a Slack API token starting with `xox`".to_string(),
        ));
    }

    if let Some(webhook_url) = &slack.webhook_url {
        if !is_http_url(webhook_url.expose_secret()) {
            return Err(ConfigError::Validation(
                "slack.webhook_url must be an absolute http:// or https:// URL. Get it from https://api.slack.com/messaging/webhooks".to_string(),
            ));
        }
    }

    if slack.channels.iter().any(|channel| channel.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "slack.channels must not contain empty channel ids".to_string(),
        ));
    }

    if slack.timeout_secs == 0 || slack.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "slack.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_profile(profile: &ProfileConfig) -> Result<(), ConfigError> {
    if profile.timeout_secs == 0 || profile.timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "profile.timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    if profile.search_redirect_marker.trim().is_empty() {
        return Err(ConfigError::Validation(
            "profile.search_redirect_marker must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    profile: Option<ProfilePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    workspace_url: Option<String>,
    token: Option<String>,
    webhook_url: Option<String>,
    channels: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfilePatch {
    verify: Option<bool>,
    require_public: Option<bool>,
    timeout_secs: Option<u64>,
    search_redirect_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    templates_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
