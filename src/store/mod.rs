//! External collaborators: identity store, usage store, credit ledger and the
//! outbound email publisher.
//!
//! The account service and the gate only see these traits. Errors are plain
//! `anyhow` errors and are never retried at the call site; the one exception is
//! account creation, which reports duplicates as a typed [`StoreError`] so the
//! caller can branch on the variant instead of the message.

pub mod memory;
pub mod publisher;

pub use memory::MemoryStore;
pub use publisher::{HttpPublisher, LogPublisher};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Usage-quota class of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Light,
    Plus,
    Partner,
}

/// Account record as held by the identity store.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub account_enabled: bool,
    pub email_enabled: bool,
    pub admin_access: bool,
    pub credits: f64,
    /// Active one-time verification value, cleared once consumed.
    pub verification_value: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub limit: i64,
    pub used: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub username: String,
    pub tier: Tier,
    pub data_bytes: Limits,
    pub ipns_records: Limits,
    pub pubsub_sent: Limits,
    pub keys: Limits,
}

/// Message handed to the email queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSend {
    pub subject: String,
    pub content: String,
    pub content_type: String,
    pub usernames: Vec<String>,
    pub emails: Vec<String>,
}

impl EmailSend {
    /// HTML message addressed to a single account.
    #[must_use]
    pub fn to_user(user: &User, subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            content_type: "text/html".to_string(),
            usernames: vec![user.username.clone()],
            emails: vec![user.email.clone()],
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email address is already registered")]
    DuplicateEmail,
    #[error("username is already taken")]
    DuplicateUsername,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn new_user_account(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<User, StoreError>;

    /// Replace the user's one-time verification value and return the updated user.
    async fn generate_verification_value(&self, username: &str) -> Result<User>;

    /// Atomically consume `value` if it is the user's active one. Consuming
    /// enables the account and its email features. Fails if the value is not
    /// (or no longer) active.
    async fn consume_verification_value(&self, username: &str, value: &str) -> Result<User>;

    /// Returns `Ok(false)` for unknown users and wrong passwords alike.
    async fn sign_in(&self, username: &str, password: &str) -> Result<bool>;

    /// Returns `Ok(false)` if `old_password` does not match.
    async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<bool>;

    /// Set a random password and return it.
    async fn reset_password(&self, username: &str) -> Result<String>;
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn new_usage_entry(&self, username: &str, tier: Tier) -> Result<Usage>;

    async fn find_usage(&self, username: &str) -> Result<Usage>;

    async fn update_tier(&self, username: &str, tier: Tier) -> Result<()>;
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Add `amount` to the user's balance and return the updated user.
    async fn add_credits(&self, username: &str, amount: f64) -> Result<User>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: &EmailSend) -> Result<()>;
}

/// Handles to every collaborator, cloned into each service that needs them.
#[derive(Clone)]
pub struct Collaborators {
    pub users: Arc<dyn UserStore>,
    pub usage: Arc<dyn UsageStore>,
    pub credits: Arc<dyn CreditLedger>,
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    /// Back every store with one [`MemoryStore`].
    #[must_use]
    pub fn in_memory(store: Arc<MemoryStore>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            users: store.clone(),
            usage: store.clone(),
            credits: store,
            publisher,
        }
    }
}
