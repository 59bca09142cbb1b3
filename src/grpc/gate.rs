//! Per-call authentication.
//!
//! Every inbound call names a fully-qualified method (`/package.Service/Method`).
//! Exempt methods pass through untouched. Everything else must carry
//! `authorization: Bearer <token>`; the token is validated, its user resolved
//! through the identity store, and the result returned as a [`CallContext`].
//! Every credential failure surfaces as `Unauthenticated` with a generic
//! message; the specific reason is only logged.

use super::{CallContext, ResolvedIdentity};
use crate::error::AuthError;
use crate::store::UserStore;
use crate::token::TokenValidator;
use http::HeaderValue;
use regex::Regex;
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;
use tracing::debug;

pub const BEARER_PREFIX: &str = "Bearer ";

/// Methods that never require a credential unless configured otherwise.
pub const DEFAULT_EXEMPT_METHODS: [&str; 3] = [
    "/auth.TemporalAuth/Register",
    "/auth.TemporalAuth/Login",
    "/auth.TemporalAuth/Recover",
];

const METHOD_PATTERN: &str = r"^/[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*/[A-Za-z_][A-Za-z0-9_]*$";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExemptionError {
    #[error("invalid method name '{0}', expected /<package.Service>/<Method>")]
    InvalidMethod(String),
    #[error("failed to compile method pattern: {0}")]
    Pattern(String),
}

/// Fully-qualified method names that bypass authentication. Fixed at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExemptionSet {
    methods: HashSet<String>,
}

impl ExemptionSet {
    /// # Errors
    ///
    /// Returns an error for any entry that is not a fully-qualified method path.
    pub fn new<I, S>(methods: I) -> Result<Self, ExemptionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pattern =
            Regex::new(METHOD_PATTERN).map_err(|err| ExemptionError::Pattern(err.to_string()))?;

        let mut set = HashSet::new();
        for method in methods {
            let method = method.as_ref().trim();
            if !pattern.is_match(method) {
                return Err(ExemptionError::InvalidMethod(method.to_string()));
            }
            set.insert(method.to_string());
        }

        Ok(Self { methods: set })
    }

    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Outcome of gating a call that was not rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Exempt method; forward without a context.
    Exempt,
    Authenticated(CallContext),
}

impl Admission {
    /// Value recorded as `auth.outcome` on the `grpc.auth` span.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Exempt => "exempt",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

pub struct AuthGate {
    validator: TokenValidator,
    users: Arc<dyn UserStore>,
    exempt: ExemptionSet,
}

impl AuthGate {
    #[must_use]
    pub fn new(validator: TokenValidator, users: Arc<dyn UserStore>, exempt: ExemptionSet) -> Self {
        Self {
            validator,
            users,
            exempt,
        }
    }

    #[must_use]
    pub fn exemptions(&self) -> &ExemptionSet {
        &self.exempt
    }

    /// Decide whether a call to `method` may proceed.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` for any credential problem, `Internal` if the identity
    /// store fails.
    pub async fn authorize(
        &self,
        method: &str,
        authorization: Option<&HeaderValue>,
    ) -> Result<Admission, AuthError> {
        if self.exempt.contains(method) {
            debug!(method, "exempt method, skipping authentication");
            return Ok(Admission::Exempt);
        }

        self.authenticate(method, authorization)
            .await
            .map(Admission::Authenticated)
    }

    async fn authenticate(
        &self,
        method: &str,
        authorization: Option<&HeaderValue>,
    ) -> Result<CallContext, AuthError> {
        let Some(value) = authorization else {
            debug!(method, "rejected: no authorization metadata");
            return Err(AuthError::unauthenticated("no key provided"));
        };

        let Some(token) = bearer_token(value) else {
            debug!(method, "rejected: authorization is not a bearer credential");
            return Err(AuthError::unauthenticated("invalid key"));
        };

        let claims = self.validator.validate(token).map_err(|err| {
            debug!(method, reason = %err, "rejected: token validation failed");
            AuthError::unauthenticated("invalid token")
        })?;

        let user = match self.users.find_by_username(&claims.id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(method, user = %claims.id, "rejected: token user does not exist");
                return Err(AuthError::unauthenticated("invalid token"));
            }
            Err(err) => {
                return Err(AuthError::internal(
                    &claims.id,
                    "authenticate",
                    err,
                    "unable to resolve user associated with token",
                ));
            }
        };

        debug!(method, user = %user.username, "call authenticated");
        Ok(CallContext::new(claims, ResolvedIdentity::new(user)))
    }
}

fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let token = value.to_str().ok()?.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() { None } else { Some(token) }
}
