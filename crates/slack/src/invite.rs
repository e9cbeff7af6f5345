use crate::client::InviteResponse;

pub const ALREADY_IN_TEAM_MESSAGE: &str = "It looks like you're already in the team.";
pub const ALREADY_INVITED_MESSAGE: &str =
    "You've already been invited. Check your e-mail for the invitation.";
pub const INVALID_EMAIL_MESSAGE: &str =
    "Slack didn't accept that e-mail address. Please check it and try again.";
pub const DEFAULT_ERROR_MESSAGE: &str =
    "An error occurred while trying to send the request. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InviteOutcome {
    Invited { warning: Option<String> },
    Rejected { code: String },
}

impl From<InviteResponse> for InviteOutcome {
    fn from(response: InviteResponse) -> Self {
        if response.ok {
            let warning = response.warning.filter(|warning| !warning.trim().is_empty());
            Self::Invited { warning }
        } else {
            Self::Rejected { code: response.error.unwrap_or_else(|| "unknown".to_string()) }
        }
    }
}

/// Maps a `users.admin.invite` error code to the message shown on the form.
pub fn translate_error(code: &str) -> &'static str {
    match code {
        "already_in_team" => ALREADY_IN_TEAM_MESSAGE,
        "already_invited" | "sent_recently" => ALREADY_INVITED_MESSAGE,
        "invalid_email" => INVALID_EMAIL_MESSAGE,
        _ => DEFAULT_ERROR_MESSAGE,
    }
}
