use invitey_core::{ProfileValidation, Signup};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// Incoming-webhook payload. `text` is the notification fallback and the
/// full message for clients that do not render blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> WebhookMessage {
        WebhookMessage { text: self.text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Escapes the three characters Slack treats as control sequences in mrkdwn.
pub fn escape_mrkdwn(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Notification posted to the invites channel after a successful invite.
/// `validation` is `None` when profile verification did not run.
pub fn invitation_sent_message(
    signup: &Signup,
    validation: Option<&ProfileValidation>,
    correlation_id: &str,
) -> WebhookMessage {
    let mut text = format!(
        "Invitation sent for\n   *Email:* {}\n   *Name:* {} {}\n   *MVP Profile:* <{}>",
        escape_mrkdwn(&signup.email),
        escape_mrkdwn(&signup.first_name),
        escape_mrkdwn(&signup.last_name),
        escape_mrkdwn(&signup.profile_link),
    );
    if let Some(validation) = validation {
        text.push('\n');
        text.push_str(&validation.to_slack_message());
    }

    let section_text = text.clone();
    MessageBuilder::new(text)
        .section("signup.invitation.summary.v1", |section| {
            section.mrkdwn(section_text);
        })
        .context("signup.invitation.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}
