//! In-process store used by the development binary and the tests.
//!
//! Passwords are kept as SHA-256 digests and verification values are 32 random
//! bytes, base64url encoded. Every operation runs under one async mutex, which
//! is what makes consuming a verification value atomic.

use super::{CreditLedger, Limits, StoreError, Tier, Usage, UsageStore, User, UserStore};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

const GIB: i64 = 1 << 30;

struct Account {
    user: User,
    password_digest: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    usage: HashMap<String, Usage>,
    next_id: u64,
}

impl Inner {
    fn account_mut(&mut self, username: &str) -> Result<&mut Account> {
        self.accounts
            .get_mut(username)
            .ok_or_else(|| anyhow!("user {username} does not exist"))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant or revoke administrative access.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist.
    pub async fn set_admin_access(&self, username: &str, admin: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.account_mut(username)?.user.admin_access = admin;
        Ok(())
    }
}

fn digest(password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

fn random_value() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random value")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn limits_for(tier: Tier) -> (i64, i64, i64, i64) {
    // data bytes, ipns records, pubsub messages, keys
    match tier {
        Tier::Free => (3 * GIB, 5, 100, 5),
        Tier::Light => (100 * GIB, 1_000, 10_000, 1_000),
        Tier::Plus => (1_000 * GIB, 5_000, 100_000, 5_000),
        Tier::Partner => (100_000 * GIB, 50_000, 1_000_000, 50_000),
    }
}

fn apply_tier(usage: &mut Usage, tier: Tier) {
    let (data, ipns, pubsub, keys) = limits_for(tier);
    usage.tier = tier;
    usage.data_bytes.limit = data;
    usage.ipns_records.limit = ipns;
    usage.pubsub_sent.limit = pubsub;
    usage.keys.limit = keys;
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.get(username).map(|account| account.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| account.user.email.eq_ignore_ascii_case(email))
            .map(|account| account.user.clone()))
    }

    async fn new_user_account(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.accounts.contains_key(username) {
            return Err(StoreError::DuplicateUsername);
        }
        if inner
            .accounts
            .values()
            .any(|account| account.user.email.eq_ignore_ascii_case(email))
        {
            return Err(StoreError::DuplicateEmail);
        }

        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            username: username.to_string(),
            email: email.to_string(),
            account_enabled: false,
            email_enabled: false,
            admin_access: false,
            credits: 0.0,
            verification_value: None,
        };
        inner.accounts.insert(
            username.to_string(),
            Account {
                user: user.clone(),
                password_digest: digest(password),
            },
        );
        debug!(user = username, "account created");
        Ok(user)
    }

    async fn generate_verification_value(&self, username: &str) -> Result<User> {
        let value = random_value()?;
        let mut inner = self.inner.lock().await;
        let account = inner.account_mut(username)?;
        account.user.verification_value = Some(value);
        Ok(account.user.clone())
    }

    async fn consume_verification_value(&self, username: &str, value: &str) -> Result<User> {
        let mut inner = self.inner.lock().await;
        let account = inner.account_mut(username)?;
        if account.user.verification_value.as_deref() != Some(value) {
            return Err(anyhow!("verification value is not active"));
        }
        account.user.verification_value = None;
        account.user.account_enabled = true;
        account.user.email_enabled = true;
        Ok(account.user.clone())
    }

    async fn sign_in(&self, username: &str, password: &str) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .get(username)
            .is_some_and(|account| account.password_digest == digest(password)))
    }

    async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let account = inner.account_mut(username)?;
        if account.password_digest != digest(old_password) {
            return Ok(false);
        }
        account.password_digest = digest(new_password);
        Ok(true)
    }

    async fn reset_password(&self, username: &str) -> Result<String> {
        let password = random_value()?;
        let mut inner = self.inner.lock().await;
        inner.account_mut(username)?.password_digest = digest(&password);
        Ok(password)
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn new_usage_entry(&self, username: &str, tier: Tier) -> Result<Usage> {
        let mut usage = Usage {
            username: username.to_string(),
            tier,
            data_bytes: Limits::default(),
            ipns_records: Limits::default(),
            pubsub_sent: Limits::default(),
            keys: Limits::default(),
        };
        apply_tier(&mut usage, tier);

        let mut inner = self.inner.lock().await;
        inner.usage.insert(username.to_string(), usage.clone());
        Ok(usage)
    }

    async fn find_usage(&self, username: &str) -> Result<Usage> {
        let inner = self.inner.lock().await;
        inner
            .usage
            .get(username)
            .cloned()
            .ok_or_else(|| anyhow!("no usage entry for {username}"))
    }

    async fn update_tier(&self, username: &str, tier: Tier) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let usage = inner
            .usage
            .get_mut(username)
            .ok_or_else(|| anyhow!("no usage entry for {username}"))?;
        apply_tier(usage, tier);
        Ok(())
    }
}

#[async_trait]
impl CreditLedger for MemoryStore {
    async fn add_credits(&self, username: &str, amount: f64) -> Result<User> {
        let mut inner = self.inner.lock().await;
        let account = inner.account_mut(username)?;
        account.user.credits += amount;
        Ok(account.user.clone())
    }
}
