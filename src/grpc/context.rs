use crate::store::User;
use crate::token::SessionClaims;

/// The authenticated principal for one call.
///
/// The pending verification value is dropped on construction so it never
/// travels with the call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    user: User,
}

impl ResolvedIdentity {
    #[must_use]
    pub fn new(mut user: User) -> Self {
        user.verification_value = None;
        Self { user }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.user.username
    }

    #[must_use]
    pub fn admin_access(&self) -> bool {
        self.user.admin_access
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

/// Validated claims and resolved identity of an authenticated call.
///
/// Built by the gate once per call (once per stream for streaming calls) and
/// handed to protected handlers explicitly. It is never stored beyond the call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    claims: SessionClaims,
    identity: ResolvedIdentity,
}

impl CallContext {
    #[must_use]
    pub fn new(claims: SessionClaims, identity: ResolvedIdentity) -> Self {
        Self { claims, identity }
    }

    #[must_use]
    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    #[must_use]
    pub fn identity(&self) -> &ResolvedIdentity {
        &self.identity
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.identity.username()
    }
}
