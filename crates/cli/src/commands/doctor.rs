use invitey_core::config::{AppConfig, LoadOptions};
use invitey_slack::{HttpSlackClient, SlackApi};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_auth(&config));
            checks.push(check_webhook_configuration(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("slack_auth"));
            checks.push(skipped("webhook_configuration"));
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    }
}

fn check_slack_auth(config: &AppConfig) -> DoctorCheck {
    let client = match HttpSlackClient::from_config(&config.slack) {
        Ok(client) => client,
        Err(error) => {
            return DoctorCheck {
                name: "slack_auth",
                status: CheckStatus::Fail,
                details: format!("failed to build slack client: {error}"),
            };
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "slack_auth",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    match runtime.block_on(client.auth_test()) {
        Ok(identity) => DoctorCheck {
            name: "slack_auth",
            status: CheckStatus::Pass,
            details: format!(
                "token accepted for team `{}` as `{}`",
                identity.team.as_deref().unwrap_or("unknown"),
                identity.user.as_deref().unwrap_or("unknown")
            ),
        },
        Err(error) => DoctorCheck {
            name: "slack_auth",
            status: CheckStatus::Fail,
            details: format!("auth.test against `{}` failed: {error}", config.slack.workspace_url),
        },
    }
}

fn check_webhook_configuration(config: &AppConfig) -> DoctorCheck {
    if config.webhook_enabled() {
        DoctorCheck {
            name: "webhook_configuration",
            status: CheckStatus::Pass,
            details: "invitations will be announced through the configured webhook".to_string(),
        }
    } else {
        DoctorCheck {
            name: "webhook_configuration",
            status: CheckStatus::Skipped,
            details: "slack.webhook_url is not set; invitations will not be announced".to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
