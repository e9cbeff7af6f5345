//! Slack Integration - invitations and channel notifications
//!
//! This crate provides the Slack side of invitey:
//! - **Web API client** (`client`) - `users.admin.invite` and `auth.test`
//! - **Invite outcomes** (`invite`) - envelope interpretation and user-facing error text
//! - **Webhook** (`webhook`) - incoming-webhook notifier for the invites channel
//! - **Block Kit** (`blocks`) - notification message builders
//!
//! # Flow
//!
//! ```text
//! Signup form → SlackApi::invite → InviteOutcome
//!                                      ↓ (invited)
//!                  invitation_sent_message → Notifier::notify
//! ```

pub mod blocks;
pub mod client;
pub mod invite;
pub mod webhook;

pub use blocks::{invitation_sent_message, WebhookMessage};
pub use client::{HttpSlackClient, InviteRequest, InviteResponse, SlackApi, SlackError};
pub use invite::{translate_error, InviteOutcome};
pub use webhook::{NoopNotifier, Notifier, WebhookNotifier};
