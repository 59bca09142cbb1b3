//! Email address acceptance rules.
//!
//! Checked in order: exactly one `@`, no `+` in the local part (no catch-all
//! routing), no trailing `.` in the local part, and a domain that resolves to
//! at least one address. The DNS step goes through [`DomainResolver`] so it can
//! be bounded by a timeout and replaced in tests.

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::net::lookup_host;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    #[error("invalid email format")]
    MalformedAddress,
    #[error("email must not contain '+'")]
    CatchAllNotAllowed,
    #[error("email must not end with '.'")]
    TrailingPeriod,
    #[error("invalid email host '{0}'")]
    UnresolvableDomain(String),
}

#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// Returns true if `domain` resolves to at least one address.
    async fn resolves(&self, domain: &str) -> bool;
}

/// Resolves through the operating system resolver, bounded by a timeout.
#[derive(Clone, Copy, Debug)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DomainResolver for SystemResolver {
    async fn resolves(&self, domain: &str) -> bool {
        match tokio::time::timeout(self.timeout, lookup_host((domain, 0))).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(err)) => {
                debug!(domain, error = %err, "email domain lookup failed");
                false
            }
            Err(_) => {
                debug!(domain, "email domain lookup timed out");
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct EmailValidator {
    resolver: Arc<dyn DomainResolver>,
}

impl EmailValidator {
    #[must_use]
    pub fn new(resolver: Arc<dyn DomainResolver>) -> Self {
        Self { resolver }
    }

    /// Validator backed by the system resolver.
    #[must_use]
    pub fn system(lookup_timeout: Duration) -> Self {
        Self::new(Arc::new(SystemResolver::new(lookup_timeout)))
    }

    /// Validate `email`, including the DNS lookup of its domain.
    ///
    /// # Errors
    ///
    /// Returns the first rule the address violates.
    pub async fn validate(&self, email: &str) -> Result<(), EmailError> {
        let domain = check_format(email)?;
        if self.resolver.resolves(domain).await {
            Ok(())
        } else {
            Err(EmailError::UnresolvableDomain(domain.to_string()))
        }
    }
}

/// Apply the syntactic rules and return the domain part.
///
/// # Errors
///
/// Returns the first syntactic rule the address violates.
pub fn check_format(email: &str) -> Result<&str, EmailError> {
    let mut parts = email.split('@');
    let (Some(account), Some(host), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(EmailError::MalformedAddress);
    };
    if account.is_empty() || host.is_empty() {
        return Err(EmailError::MalformedAddress);
    }
    if account.contains('+') {
        return Err(EmailError::CatchAllNotAllowed);
    }
    if account.ends_with('.') {
        return Err(EmailError::TrailingPeriod);
    }
    Ok(host)
}
