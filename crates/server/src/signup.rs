//! Signup routes.
//!
//! HTML Endpoints:
//! - `GET  /`                       - signup form
//! - `POST /`                       - validate, verify profile, invite, notify
//! - `GET  /error`                  - generic error page
//!
//! JSON Endpoints:
//! - `GET  /validate-profile-link`  - remote check used by the form's profile field

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Form, Json, Router,
};
use invitey_core::config::AppConfig;
use invitey_core::domain::signup::is_valid_profile_url;
use invitey_core::{
    ApplicationError, DomainError, ProfileValidation, Signup, SignupField, SignupForm,
    ValidationErrors,
};
use invitey_slack::{
    invitation_sent_message, translate_error, InviteOutcome, InviteRequest, Notifier, SlackApi,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tera::{Context, Tera};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::profile::{ProfileInspector, ProfileLookup, PROFILE_NOT_FOUND_MESSAGE};

#[derive(Clone, Debug, Default)]
pub struct SignupSettings {
    pub verify_profile: bool,
    pub require_public_profile: bool,
    pub channels: Vec<String>,
}

impl From<&AppConfig> for SignupSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            verify_profile: config.profile.verify,
            require_public_profile: config.profile.require_public,
            channels: config.slack.channels.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SignupState {
    pub(crate) slack: Arc<dyn SlackApi>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) profiles: Arc<ProfileInspector>,
    pub(crate) templates: Arc<Tera>,
    pub(crate) settings: SignupSettings,
}

impl SignupState {
    pub fn new(
        slack: Arc<dyn SlackApi>,
        notifier: Arc<dyn Notifier>,
        profiles: Arc<ProfileInspector>,
        templates: Arc<Tera>,
        settings: SignupSettings,
    ) -> Self {
        Self { slack, notifier, profiles, templates, settings }
    }
}

/// Result of one pass through the signup flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignupOutcome {
    Invited(Signup),
    Invalid(ValidationErrors),
    Rejected { message: String },
    Failed { message: String },
}

#[derive(Debug, Deserialize)]
pub struct ProfileLinkQuery {
    pub profile_link: Option<String>,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

fn embedded_templates() -> Tera {
    let mut tera = Tera::default();
    if let Err(error) = tera.add_raw_templates(vec![
        ("layout.html", include_str!("../../../templates/signup/layout.html")),
        ("index.html", include_str!("../../../templates/signup/index.html")),
        ("thanks.html", include_str!("../../../templates/signup/thanks.html")),
        ("error.html", include_str!("../../../templates/signup/error.html")),
    ]) {
        error!(error = %error, "failed to register embedded signup templates");
    }
    tera
}

/// Loads `<templates_dir>/signup/**/*`, falling back to the templates compiled
/// into the binary when the directory is missing or empty.
pub fn init_templates(templates_dir: &Path) -> Arc<Tera> {
    let glob = templates_dir.join("signup").join("**").join("*");
    let tera = match Tera::new(&glob.to_string_lossy()) {
        Ok(tera) if tera.get_template_names().next().is_some() => tera,
        Ok(_) => {
            warn!(templates_dir = %templates_dir.display(), "no signup templates found on disk, using embedded templates");
            embedded_templates()
        }
        Err(error) => {
            warn!(error = %error, "failed to load signup templates from filesystem, using embedded templates");
            embedded_templates()
        }
    };
    Arc::new(tera)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: SignupState) -> Router {
    Router::new()
        .route("/", get(signup_page).post(submit_signup))
        .route("/validate-profile-link", get(validate_profile_link))
        .route("/error", get(error_page))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn signup_page(State(state): State<SignupState>) -> (StatusCode, Html<String>) {
    let correlation_id = Uuid::new_v4().to_string();
    debug!(event_name = "signup.form.viewed", correlation_id = %correlation_id, "rendering signup form");
    let context = form_context(&SignupForm::default(), None, None);
    render(&state.templates, "index.html", &context, StatusCode::OK)
}

async fn submit_signup(
    State(state): State<SignupState>,
    Form(form): Form<SignupForm>,
) -> (StatusCode, Html<String>) {
    let correlation_id = Uuid::new_v4().to_string();

    match process_signup(&state, &form, &correlation_id).await {
        SignupOutcome::Invited(signup) => {
            let mut context = Context::new();
            context.insert("first_name", &signup.first_name);
            context.insert("email", &signup.email);
            render(&state.templates, "thanks.html", &context, StatusCode::OK)
        }
        SignupOutcome::Invalid(errors) => render(
            &state.templates,
            "index.html",
            &form_context(&form, Some(&errors), None),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        SignupOutcome::Rejected { message } | SignupOutcome::Failed { message } => render(
            &state.templates,
            "index.html",
            &form_context(&form, None, Some(&message)),
            StatusCode::BAD_GATEWAY,
        ),
    }
}

async fn validate_profile_link(
    State(state): State<SignupState>,
    Query(query): Query<ProfileLinkQuery>,
) -> Json<Value> {
    let correlation_id = Uuid::new_v4().to_string();
    let link = query.profile_link.as_deref().map(str::trim).unwrap_or_default();

    if check_profile_link(&state, link, &correlation_id).await {
        Json(json!(true))
    } else {
        Json(json!(PROFILE_NOT_FOUND_MESSAGE))
    }
}

async fn check_profile_link(state: &SignupState, link: &str, correlation_id: &str) -> bool {
    if !is_valid_profile_url(link) {
        info!(
            event_name = "signup.profile_link.malformed",
            correlation_id,
            profile_link = %link,
            "profile link is not an absolute http(s) url"
        );
        return false;
    }

    let reason = match state.profiles.inspect(link).await {
        Ok(ProfileLookup::Public(_)) => {
            info!(
                event_name = "signup.profile_link.validated",
                correlation_id,
                profile_link = %link,
                "validated profile link"
            );
            return true;
        }
        Ok(ProfileLookup::NotFound { reason }) => reason,
        Err(error) => error.to_string(),
    };

    warn!(
        event_name = "signup.profile_link.not_found",
        correlation_id,
        profile_link = %link,
        reason = %reason,
        "failed to validate profile link"
    );
    false
}

async fn error_page(State(state): State<SignupState>) -> (StatusCode, Html<String>) {
    let correlation_id = Uuid::new_v4().to_string();
    info!(event_name = "signup.error_page.viewed", correlation_id = %correlation_id, "rendering error page");
    let mut context = Context::new();
    context.insert("correlation_id", &correlation_id);
    render(&state.templates, "error.html", &context, StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

pub async fn process_signup(
    state: &SignupState,
    form: &SignupForm,
    correlation_id: &str,
) -> SignupOutcome {
    let signup = match form.validate() {
        Ok(signup) => signup,
        Err(errors) => {
            info!(
                event_name = "signup.form.invalid",
                correlation_id,
                error = %DomainError::InvalidSignup(errors.clone()),
                "signup form failed validation"
            );
            return SignupOutcome::Invalid(errors);
        }
    };

    let validation = match check_profile(state, &signup, correlation_id).await {
        Ok(validation) => validation,
        Err(errors) => return SignupOutcome::Invalid(errors),
    };

    let request = InviteRequest {
        email: signup.email.clone(),
        first_name: signup.first_name.clone(),
        last_name: signup.last_name.clone(),
        channels: state.settings.channels.clone(),
    };

    info!(
        event_name = "signup.invite.requested",
        correlation_id,
        email = %signup.email,
        first_name = %signup.first_name,
        last_name = %signup.last_name,
        profile_link = %signup.profile_link,
        "calling slack invite api"
    );

    let response = match state.slack.invite(&request).await {
        Ok(response) => response,
        Err(slack_error) => {
            let interface = ApplicationError::Integration(slack_error.to_string())
                .into_interface(correlation_id);
            error!(
                event_name = "signup.invite.failed",
                correlation_id,
                email = %signup.email,
                error = %slack_error,
                "attempted to invite and received an error"
            );
            return SignupOutcome::Failed { message: interface.user_message().to_string() };
        }
    };

    match InviteOutcome::from(response) {
        InviteOutcome::Invited { warning } => {
            if let Some(warning) = warning {
                error!(
                    event_name = "signup.invite.warning",
                    correlation_id,
                    email = %signup.email,
                    warning = %warning,
                    "invite succeeded with warnings"
                );
            }
            notify_channel(state, &signup, validation.as_ref(), correlation_id).await;
            info!(
                event_name = "signup.invite.sent",
                correlation_id,
                email = %signup.email,
                "invitation sent"
            );
            SignupOutcome::Invited(signup)
        }
        InviteOutcome::Rejected { code } => {
            error!(
                event_name = "signup.invite.rejected",
                correlation_id,
                email = %signup.email,
                slack_error = %code,
                "slack rejected the invitation"
            );
            SignupOutcome::Rejected { message: translate_error(&code).to_string() }
        }
    }
}

/// `Ok(None)` when verification is disabled; `Err` when a public profile is
/// required and the link does not lead to one.
async fn check_profile(
    state: &SignupState,
    signup: &Signup,
    correlation_id: &str,
) -> Result<Option<ProfileValidation>, ValidationErrors> {
    let settings = &state.settings;
    if !settings.verify_profile && !settings.require_public_profile {
        return Ok(None);
    }

    let reason = match state.profiles.inspect(&signup.profile_link).await {
        Ok(ProfileLookup::Public(page)) => {
            let validation = ProfileValidation::verify(signup, &page);
            info!(
                event_name = "signup.profile.verified",
                correlation_id,
                email_verified = ?validation.email_verified,
                name_verified = validation.name_verified,
                "profile page checked"
            );
            return Ok(settings.verify_profile.then_some(validation));
        }
        Ok(ProfileLookup::NotFound { reason }) => reason,
        Err(error) => error.to_string(),
    };

    warn!(
        event_name = "signup.profile.not_found",
        correlation_id,
        profile_link = %signup.profile_link,
        reason = %reason,
        "profile link did not resolve to a public profile"
    );

    if settings.require_public_profile {
        info!(
            event_name = "signup.profile.rejected",
            correlation_id,
            error = %DomainError::ProfileNotPublic(signup.profile_link.clone()),
            "rejecting signup without public profile"
        );
        let mut errors = ValidationErrors::default();
        errors.push(SignupField::ProfileLink, PROFILE_NOT_FOUND_MESSAGE);
        return Err(errors);
    }

    Ok(settings.verify_profile.then(ProfileValidation::unverified))
}

async fn notify_channel(
    state: &SignupState,
    signup: &Signup,
    validation: Option<&ProfileValidation>,
    correlation_id: &str,
) {
    let message = invitation_sent_message(signup, validation, correlation_id);
    if let Err(notify_error) = state.notifier.notify(&message).await {
        error!(
            event_name = "signup.notify.failed",
            correlation_id,
            email = %signup.email,
            error = %notify_error,
            "attempted to post message to the invites channel and received an error"
        );
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn form_context(
    form: &SignupForm,
    errors: Option<&ValidationErrors>,
    summary: Option<&str>,
) -> Context {
    let field_error = |field: SignupField| {
        errors.and_then(|errors| errors.for_field(field)).unwrap_or_default().to_string()
    };

    let mut context = Context::new();
    context.insert(
        "form",
        &json!({
            "email": form.email.as_deref().unwrap_or_default(),
            "first_name": form.first_name.as_deref().unwrap_or_default(),
            "last_name": form.last_name.as_deref().unwrap_or_default(),
            "profile_link": form.profile_link.as_deref().unwrap_or_default(),
        }),
    );
    context.insert(
        "errors",
        &json!({
            "email": field_error(SignupField::Email),
            "first_name": field_error(SignupField::FirstName),
            "last_name": field_error(SignupField::LastName),
            "profile_link": field_error(SignupField::ProfileLink),
        }),
    );
    context.insert("summary", summary.unwrap_or_default());
    context
}

fn render(
    templates: &Tera,
    name: &str,
    context: &Context,
    status: StatusCode,
) -> (StatusCode, Html<String>) {
    match templates.render(name, context) {
        Ok(body) => (status, Html(body)),
        Err(error) => {
            error!(template = name, error = %error, "failed to render template");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<h1>Error.</h1><p>An error occurred while processing your request.</p>".to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use invitey_core::SignupForm;
    use invitey_slack::client::AuthIdentity;
    use invitey_slack::invite::{ALREADY_IN_TEAM_MESSAGE, DEFAULT_ERROR_MESSAGE};
    use invitey_slack::{InviteRequest, InviteResponse, Notifier, SlackApi, SlackError, WebhookMessage};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    enum InviteReply {
        Envelope(InviteResponse),
        Status(u16),
    }

    struct FakeSlack {
        reply: InviteReply,
        requests: Mutex<Vec<InviteRequest>>,
    }

    impl FakeSlack {
        fn replying(reply: InviteReply) -> Arc<Self> {
            Arc::new(Self { reply, requests: Mutex::new(Vec::new()) })
        }

        fn ok() -> Arc<Self> {
            Self::replying(InviteReply::Envelope(InviteResponse {
                ok: true,
                error: None,
                warning: None,
            }))
        }

        fn request_count(&self) -> usize {
            self.requests.lock().map(|requests| requests.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl SlackApi for FakeSlack {
        async fn invite(&self, request: &InviteRequest) -> Result<InviteResponse, SlackError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            match &self.reply {
                InviteReply::Envelope(response) => Ok(response.clone()),
                InviteReply::Status(status) => Err(SlackError::Status { status: *status }),
            }
        }

        async fn auth_test(&self) -> Result<AuthIdentity, SlackError> {
            Ok(AuthIdentity::default())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        messages: Mutex<Vec<WebhookMessage>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<WebhookMessage> {
            self.messages.lock().map(|messages| messages.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &WebhookMessage) -> Result<(), SlackError> {
            if let Ok(mut messages) = self.messages.lock() {
                messages.push(message.clone());
            }
            if self.fail {
                return Err(SlackError::Status { status: 500 });
            }
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut bytes) = self.0.lock() {
                bytes.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn line_for(&self, event_name: &str) -> Option<String> {
            let bytes = self.0.lock().map(|bytes| bytes.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes)
                .lines()
                .find(|line| line.contains(event_name))
                .map(str::to_string)
        }
    }

    fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    const PROFILE_HTML: &str =
        "<html><head><title>Ada Lovelace | MVP</title></head><body><h1>Ada Lovelace</h1></body></html>";

    async fn profile_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/PublicProfile/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE_HTML))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/PublicProfile/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    fn state(
        slack: Arc<FakeSlack>,
        notifier: Arc<RecordingNotifier>,
        settings: SignupSettings,
    ) -> SignupState {
        let profiles = ProfileInspector::new(Duration::from_secs(5), "MvpSearch")
            .expect("inspector should build");
        SignupState::new(slack, notifier, Arc::new(profiles), Arc::new(embedded_templates()), settings)
    }

    fn verifying() -> SignupSettings {
        SignupSettings { verify_profile: true, require_public_profile: true, channels: Vec::new() }
    }

    fn form(profile_link: &str) -> SignupForm {
        SignupForm {
            email: Some("ada@example.com".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            profile_link: Some(profile_link.to_string()),
        }
    }

    #[tokio::test]
    async fn successful_signup_invites_and_notifies_with_verification() {
        let server = profile_server().await;
        let slack = FakeSlack::ok();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state(slack.clone(), notifier.clone(), verifying());

        let outcome =
            process_signup(&state, &form(&format!("{}/PublicProfile/1", server.uri())), "req-1")
                .await;

        assert!(matches!(outcome, SignupOutcome::Invited(ref signup) if signup.email == "ada@example.com"));
        assert_eq!(slack.request_count(), 1);

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.starts_with("Invitation sent for\n   *Email:* ada@example.com"));
        assert!(messages[0].text.ends_with("\t*Email Verified:* unknown\n\t*Name Verified:* True"));
    }

    #[tokio::test]
    async fn invalid_form_short_circuits_before_any_upstream_call() {
        let slack = FakeSlack::ok();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state(slack.clone(), notifier.clone(), verifying());

        let outcome = process_signup(&state, &SignupForm::default(), "req-2").await;

        assert!(matches!(outcome, SignupOutcome::Invalid(ref errors) if errors.len() == 4));
        assert_eq!(slack.request_count(), 0);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn missing_public_profile_is_rejected_when_required() {
        let server = profile_server().await;
        let slack = FakeSlack::ok();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state(slack.clone(), notifier, verifying());

        let outcome = process_signup(
            &state,
            &form(&format!("{}/PublicProfile/missing", server.uri())),
            "req-3",
        )
        .await;

        match outcome {
            SignupOutcome::Invalid(errors) => assert_eq!(
                errors.for_field(SignupField::ProfileLink),
                Some(PROFILE_NOT_FOUND_MESSAGE)
            ),
            other => panic!("expected profile rejection, got {other:?}"),
        }
        assert_eq!(slack.request_count(), 0);
    }

    #[tokio::test]
    async fn public_profile_without_verification_omits_summary_lines() {
        let server = profile_server().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = SignupSettings { verify_profile: false, ..verifying() };
        let state = state(FakeSlack::ok(), notifier.clone(), settings);

        let outcome =
            process_signup(&state, &form(&format!("{}/PublicProfile/1", server.uri())), "req-11")
                .await;

        assert!(matches!(outcome, SignupOutcome::Invited(_)));
        let messages = notifier.messages();
        assert!(messages[0].text.ends_with(">"));
        assert!(!messages[0].text.contains("Verified"));
    }

    #[tokio::test]
    async fn unreachable_profile_is_reported_unverified_when_only_verifying() {
        let slack = FakeSlack::ok();
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = SignupSettings { require_public_profile: false, ..verifying() };
        let state = state(slack.clone(), notifier.clone(), settings);

        // Nothing listens on this address, so the fetch itself errors.
        let outcome =
            process_signup(&state, &form("http://127.0.0.1:9/PublicProfile/1"), "req-12").await;

        assert!(matches!(outcome, SignupOutcome::Invited(_)));
        assert_eq!(slack.request_count(), 1);
        assert!(notifier.messages()[0]
            .text
            .ends_with("\t*Email Verified:* unknown\n\t*Name Verified:* False"));
    }

    #[tokio::test]
    async fn profile_rejection_does_not_log_invite_request() {
        let server = profile_server().await;
        let state = state(FakeSlack::ok(), Arc::default(), verifying());
        let (logs, _guard) = capture_logs();

        let outcome = process_signup(
            &state,
            &form(&format!("{}/PublicProfile/missing", server.uri())),
            "req-13",
        )
        .await;

        assert!(matches!(outcome, SignupOutcome::Invalid(_)));
        assert!(logs.line_for("signup.invite.requested").is_none());
        let rejected = logs.line_for("signup.profile.rejected").expect("rejection should be logged");
        assert!(rejected.contains("req-13"));
    }

    #[tokio::test]
    async fn missing_profile_is_reported_unverified_when_not_required() {
        let server = profile_server().await;
        let slack = FakeSlack::ok();
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = SignupSettings { require_public_profile: false, ..verifying() };
        let state = state(slack, notifier.clone(), settings);

        let outcome = process_signup(
            &state,
            &form(&format!("{}/PublicProfile/missing", server.uri())),
            "req-4",
        )
        .await;

        assert!(matches!(outcome, SignupOutcome::Invited(_)));
        let messages = notifier.messages();
        assert!(messages[0].text.ends_with("\t*Email Verified:* unknown\n\t*Name Verified:* False"));
    }

    #[tokio::test]
    async fn disabled_verification_skips_profile_fetch_and_summary() {
        let slack = FakeSlack::ok();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state(slack, notifier.clone(), SignupSettings::default());

        // Nothing listens on this address; a fetch would fail the signup.
        let outcome =
            process_signup(&state, &form("http://127.0.0.1:9/PublicProfile/1"), "req-5").await;

        assert!(matches!(outcome, SignupOutcome::Invited(_)));
        assert!(notifier.messages()[0].text.ends_with(">"));
    }

    #[tokio::test]
    async fn slack_rejection_is_translated_and_not_notified() {
        let slack = FakeSlack::replying(InviteReply::Envelope(InviteResponse {
            ok: false,
            error: Some("already_in_team".to_string()),
            warning: None,
        }));
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state(slack, notifier.clone(), SignupSettings::default());

        let outcome = process_signup(&state, &form("https://example.com/p/1"), "req-6").await;

        assert_eq!(outcome, SignupOutcome::Rejected { message: ALREADY_IN_TEAM_MESSAGE.to_string() });
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn unknown_slack_error_uses_default_message() {
        let slack = FakeSlack::replying(InviteReply::Envelope(InviteResponse {
            ok: false,
            error: Some("paid_teams_only".to_string()),
            warning: None,
        }));
        let state = state(slack, Arc::new(RecordingNotifier::default()), SignupSettings::default());

        let outcome = process_signup(&state, &form("https://example.com/p/1"), "req-7").await;

        assert_eq!(outcome, SignupOutcome::Rejected { message: DEFAULT_ERROR_MESSAGE.to_string() });
    }

    #[tokio::test]
    async fn transport_failure_shows_generic_error() {
        let slack = FakeSlack::replying(InviteReply::Status(500));
        let notifier = Arc::new(RecordingNotifier::default());
        let state = state(slack, notifier.clone(), SignupSettings::default());

        let outcome = process_signup(&state, &form("https://example.com/p/1"), "req-8").await;

        assert_eq!(outcome, SignupOutcome::Failed { message: "An error occurred.".to_string() });
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_signup() {
        let slack = FakeSlack::ok();
        let notifier = Arc::new(RecordingNotifier { fail: true, ..RecordingNotifier::default() });
        let state = state(slack, notifier.clone(), SignupSettings::default());

        let outcome = process_signup(&state, &form("https://example.com/p/1"), "req-9").await;

        assert!(matches!(outcome, SignupOutcome::Invited(_)));
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn configured_channels_are_forwarded_to_invite() {
        let slack = FakeSlack::ok();
        let settings = SignupSettings { channels: vec!["C01".to_string()], ..SignupSettings::default() };
        let state = state(slack.clone(), Arc::new(RecordingNotifier::default()), settings);

        process_signup(&state, &form("https://example.com/p/1"), "req-10").await;

        let requests = slack.requests.lock().map(|requests| requests.clone()).unwrap_or_default();
        assert_eq!(requests[0].channels, vec!["C01".to_string()]);
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn get_root_renders_empty_form() {
        let app = router(state(FakeSlack::ok(), Arc::default(), SignupSettings::default()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(r#"<form method="post" action="/""#));
        assert!(!body.contains("field-error"));
    }

    #[tokio::test]
    async fn post_with_missing_fields_rerenders_form_with_escaped_values() {
        let app = router(state(FakeSlack::ok(), Arc::default(), SignupSettings::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("email=&first_name=%3Cb%3EAda&last_name=&profile_link=nope"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("You must enter an e-mail address."));
        assert!(body.contains("You must enter your last name."));
        assert!(body.contains("Please enter a valid fully-qualified http or https URL."));
        assert!(body.contains("&lt;b&gt;Ada"));
        assert!(!body.contains("<b>Ada"));
    }

    #[tokio::test]
    async fn post_success_renders_thanks_page() {
        let app = router(state(FakeSlack::ok(), Arc::default(), SignupSettings::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "email=ada%40example.com&first_name=Ada&last_name=Lovelace&profile_link=https%3A%2F%2Fexample.com%2Fp%2F1",
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Thanks, Ada!"));
        assert!(body.contains("ada@example.com"));
    }

    #[tokio::test]
    async fn post_transport_failure_returns_bad_gateway_with_message() {
        let slack = FakeSlack::replying(InviteReply::Status(502));
        let app = router(state(slack, Arc::default(), SignupSettings::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "email=ada%40example.com&first_name=Ada&last_name=Lovelace&profile_link=https%3A%2F%2Fexample.com%2Fp%2F1",
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_text(response).await;
        assert!(body.contains("An error occurred."));
        assert!(body.contains(r#"value="ada@example.com""#));
    }

    #[tokio::test]
    async fn validate_profile_link_reports_public_and_missing_profiles() {
        let server = profile_server().await;
        let state = state(FakeSlack::ok(), Arc::default(), verifying());

        let public = validate_profile_link(
            State(state.clone()),
            Query(ProfileLinkQuery {
                profile_link: Some(format!("{}/PublicProfile/1", server.uri())),
            }),
        )
        .await;
        assert_eq!(public.0, json!(true));

        let missing = validate_profile_link(
            State(state.clone()),
            Query(ProfileLinkQuery {
                profile_link: Some(format!("{}/PublicProfile/missing", server.uri())),
            }),
        )
        .await;
        assert_eq!(missing.0, json!(PROFILE_NOT_FOUND_MESSAGE));

        let malformed =
            validate_profile_link(State(state), Query(ProfileLinkQuery { profile_link: None }))
                .await;
        assert_eq!(malformed.0, json!(PROFILE_NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn post_without_public_profile_returns_unprocessable_entity() {
        let server = profile_server().await;
        let slack = FakeSlack::ok();
        let settings = SignupSettings { verify_profile: false, ..verifying() };
        let app = router(state(slack.clone(), Arc::default(), settings));
        let link = format!("{}/PublicProfile/missing", server.uri());
        let body = format!(
            "email=ada%40example.com&first_name=Ada&last_name=Lovelace&profile_link={}",
            link.replace(':', "%3A").replace('/', "%2F")
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("A public MVP profile couldn"));
        assert_eq!(slack.request_count(), 0);
    }

    #[tokio::test]
    async fn profile_link_check_logs_correlation_id() {
        let server = profile_server().await;
        let state = state(FakeSlack::ok(), Arc::default(), verifying());
        let (logs, _guard) = capture_logs();

        let public = check_profile_link(
            &state,
            &format!("{}/PublicProfile/1", server.uri()),
            "req-link-1",
        )
        .await;
        let missing = check_profile_link(
            &state,
            &format!("{}/PublicProfile/missing", server.uri()),
            "req-link-2",
        )
        .await;

        assert!(public);
        assert!(!missing);
        let validated =
            logs.line_for("signup.profile_link.validated").expect("validation should be logged");
        assert!(validated.contains("req-link-1"));
        let not_found =
            logs.line_for("signup.profile_link.not_found").expect("miss should be logged");
        assert!(not_found.contains("req-link-2"));
    }

    #[tokio::test]
    async fn error_page_renders_reference_id() {
        let app = router(state(FakeSlack::ok(), Arc::default(), SignupSettings::default()));

        let response = app
            .oneshot(Request::builder().uri("/error").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("An error occurred while processing your request."));
        let reference = body
            .split("Reference: ")
            .nth(1)
            .and_then(|rest| rest.split("</p>").next())
            .expect("reference should be rendered");
        assert!(Uuid::parse_str(reference.trim()).is_ok());
    }

    #[test]
    fn missing_template_directory_falls_back_to_embedded_templates() {
        let templates = init_templates(Path::new("/nonexistent/invitey-templates"));

        assert!(templates.get_template_names().any(|name| name == "index.html"));
    }
}
