use serde::Serialize;

use crate::domain::signup::Signup;

/// Facts scraped from a public profile page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfilePage {
    pub names: Vec<String>,
    pub emails: Vec<String>,
    pub text: String,
}

/// Outcome of comparing a submission against its profile page.
///
/// `email_verified` is `None` when the page does not publish any address,
/// which is common for public profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ProfileValidation {
    pub email_verified: Option<bool>,
    pub name_verified: bool,
}

impl ProfileValidation {
    pub fn verify(signup: &Signup, page: &ProfilePage) -> Self {
        Self {
            email_verified: verify_email(&signup.email, &page.emails),
            name_verified: verify_name(&signup.first_name, &signup.last_name, page),
        }
    }

    pub fn unverified() -> Self {
        Self { email_verified: None, name_verified: false }
    }

    pub fn to_slack_message(&self) -> String {
        let email = match self.email_verified {
            Some(value) => display_bool(value),
            None => "unknown",
        };
        format!(
            "\t*Email Verified:* {email}\n\t*Name Verified:* {}",
            display_bool(self.name_verified)
        )
    }
}

fn display_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn verify_email(submitted: &str, published: &[String]) -> Option<bool> {
    if published.is_empty() {
        return None;
    }
    let submitted = submitted.trim();
    Some(published.iter().any(|candidate| candidate.trim().eq_ignore_ascii_case(submitted)))
}

fn verify_name(first_name: &str, last_name: &str, page: &ProfilePage) -> bool {
    let first = words(first_name);
    let last = words(last_name);
    if first.is_empty() || last.is_empty() {
        return false;
    }

    let matches = |candidate: &str| {
        let haystack = words(candidate);
        contains_phrase(&haystack, &first) && contains_phrase(&haystack, &last)
    };

    if page.names.is_empty() {
        return matches(&page.text);
    }
    page.names.iter().any(|candidate| matches(candidate))
}

/// Lowercased words; punctuation other than `-` and `'` separates words.
fn words(value: &str) -> Vec<String> {
    value
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == '-' || ch == '\'' { ch } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
