use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

pub const EMAIL_REQUIRED: &str = "You must enter an e-mail address.";
pub const EMAIL_INVALID: &str = "Please enter a valid e-mail address.";
pub const FIRST_NAME_REQUIRED: &str = "You must enter your first name.";
pub const LAST_NAME_REQUIRED: &str = "You must enter your last name.";
pub const PROFILE_LINK_REQUIRED: &str = "You must enter the URL to your public MVP profile.";
pub const PROFILE_LINK_INVALID: &str = "Please enter a valid fully-qualified http or https URL.";

/// Raw form submission as posted by the browser.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_link: Option<String>,
}

/// A submission that passed field validation. Values are trimmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Signup {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_link: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupField {
    Email,
    FirstName,
    LastName,
    ProfileLink,
}

impl SignupField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::ProfileLink => "profile_link",
        }
    }
}

impl fmt::Display for SignupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: SignupField,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: SignupField, message: impl Into<String>) {
        self.errors.push(FieldError { field, message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn for_field(&self, field: SignupField) -> Option<&str> {
        self.errors.iter().find(|error| error.field == field).map(|error| error.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&rendered)
    }
}

impl SignupForm {
    /// Validates every field and reports all failures at once.
    pub fn validate(&self) -> Result<Signup, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let email = required(&self.email);
        match email {
            None => errors.push(SignupField::Email, EMAIL_REQUIRED),
            Some(value) if !is_valid_email(value) => errors.push(SignupField::Email, EMAIL_INVALID),
            Some(_) => {}
        }

        let first_name = required(&self.first_name);
        if first_name.is_none() {
            errors.push(SignupField::FirstName, FIRST_NAME_REQUIRED);
        }

        let last_name = required(&self.last_name);
        if last_name.is_none() {
            errors.push(SignupField::LastName, LAST_NAME_REQUIRED);
        }

        let profile_link = required(&self.profile_link);
        match profile_link {
            None => errors.push(SignupField::ProfileLink, PROFILE_LINK_REQUIRED),
            Some(value) if !is_valid_profile_url(value) => {
                errors.push(SignupField::ProfileLink, PROFILE_LINK_INVALID)
            }
            Some(_) => {}
        }

        match (email, first_name, last_name, profile_link) {
            (Some(email), Some(first_name), Some(last_name), Some(profile_link))
                if errors.is_empty() =>
            {
                Ok(Signup {
                    email: email.to_string(),
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    profile_link: profile_link.to_string(),
                })
            }
            _ => Err(errors),
        }
    }
}

impl Signup {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Exactly one `@`, not at either end, and no whitespace.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    }
}

pub fn is_valid_profile_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}
