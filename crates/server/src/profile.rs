//! Public profile lookup and scraping.
//!
//! A profile link is "public" when it answers 2xx and the profile site did not
//! redirect to its search page. Public pages are scraped into a
//! [`ProfilePage`] for the name/e-mail match in `invitey_core`.

use std::time::Duration;

use invitey_core::config::ProfileConfig;
use invitey_core::domain::signup::is_valid_email;
use invitey_core::ProfilePage;
use reqwest::Client;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;

pub const PROFILE_NOT_FOUND_MESSAGE: &str = "A public MVP profile couldn't be found.";

/// Upper bound on the profile page body read into memory.
pub const MAX_PROFILE_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile request failed: {0}")]
    Request(#[source] reqwest::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileLookup {
    Public(ProfilePage),
    NotFound { reason: String },
}

pub struct ProfileInspector {
    client: Client,
    search_redirect_marker: String,
    max_body_bytes: usize,
}

impl ProfileInspector {
    pub fn new(
        timeout: Duration,
        search_redirect_marker: impl Into<String>,
    ) -> Result<Self, ProfileError> {
        let client = Client::builder().timeout(timeout).build().map_err(ProfileError::Request)?;
        Ok(Self {
            client,
            search_redirect_marker: search_redirect_marker.into(),
            max_body_bytes: MAX_PROFILE_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn from_config(config: &ProfileConfig) -> Result<Self, ProfileError> {
        Self::new(Duration::from_secs(config.timeout_secs), config.search_redirect_marker.clone())
    }

    pub async fn inspect(&self, profile_link: &str) -> Result<ProfileLookup, ProfileError> {
        let mut response =
            self.client.get(profile_link).send().await.map_err(ProfileError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ProfileLookup::NotFound {
                reason: format!("profile page returned HTTP {}", status.as_u16()),
            });
        }

        let final_url = response.url().to_string();
        if final_url.contains(&self.search_redirect_marker) {
            return Ok(ProfileLookup::NotFound {
                reason: format!("profile link redirected to search page `{final_url}`"),
            });
        }

        let too_large = || ProfileLookup::NotFound {
            reason: format!("profile page exceeds {} bytes", self.max_body_bytes),
        };
        if response.content_length().is_some_and(|length| length > self.max_body_bytes as u64) {
            return Ok(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(ProfileError::Request)? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Ok(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        let page = extract_profile_page(&String::from_utf8_lossy(&body));
        debug!(
            profile_link = %profile_link,
            names = page.names.len(),
            emails = page.emails.len(),
            "scraped public profile page"
        );
        Ok(ProfileLookup::Public(page))
    }
}

pub fn extract_profile_page(html: &str) -> ProfilePage {
    let document = Html::parse_document(html);

    let mut names = Vec::new();
    if let Some(selector) = selector(r#"meta[property="og:title"]"#) {
        for element in document.select(&selector) {
            if let Some(content) = element.value().attr("content") {
                push_unique(&mut names, collapse_whitespace(content));
            }
        }
    }
    for css in ["h1", "title"] {
        if let Some(selector) = selector(css) {
            for element in document.select(&selector) {
                push_unique(&mut names, collapse_whitespace(&element.text().collect::<String>()));
            }
        }
    }

    let text = visible_text(&document);

    let mut emails = Vec::new();
    if let Some(selector) = selector(r#"a[href^="mailto:"]"#) {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let address = href.trim_start_matches("mailto:").split('?').next().unwrap_or_default();
            if looks_like_email(address) {
                push_unique_email(&mut emails, address);
            }
        }
    }
    for token in text.split_whitespace() {
        let candidate = token.trim_matches(|ch: char| {
            matches!(ch, '(' | ')' | ',' | ';' | ':' | '<' | '>' | '"' | '\'' | '[' | ']' | '.')
        });
        if looks_like_email(candidate) {
            push_unique_email(&mut emails, candidate);
        }
    }

    ProfilePage { names, emails, text }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|element| element.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript" | "title"))
            .unwrap_or(false);
        if !hidden {
            parts.push(text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn looks_like_email(candidate: &str) -> bool {
    is_valid_email(candidate)
        && candidate.split('@').nth(1).map(|domain| domain.contains('.')).unwrap_or(false)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !value.is_empty() && !values.contains(&value) {
        values.push(value);
    }
}

fn push_unique_email(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|existing| existing.eq_ignore_ascii_case(value)) {
        values.push(value.to_string());
    }
}
