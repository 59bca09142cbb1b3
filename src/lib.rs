//! # Authgate (token authentication for RPC account services)
//!
//! `authgate` signs and validates HMAC session tokens, gates every RPC of the
//! account service behind a bearer credential, and verifies account email
//! addresses with short-lived challenge tokens.
//!
//! ## Tokens
//!
//! Session and challenge tokens are compact three-segment tokens signed with a
//! single process-wide HMAC algorithm ([`token::SigningConfig`]). Tokens whose
//! header names another algorithm are rejected before the signature is checked.
//!
//! ## Request gate
//!
//! [`grpc::AuthLayer`] runs in front of the gRPC server. Methods in the
//! exemption set pass through untouched; every other call must carry
//! `authorization: Bearer <token>`, and the handler receives the resolved
//! [`grpc::CallContext`]. Streaming handlers see the same context on every
//! message through [`grpc::AuthenticatedStream`].
//!
//! ## Email verification
//!
//! [`challenge::ChallengeFlow`] binds a one-time value stored with the user to a
//! signed token, emails the link and redeems it at `GET /v3/verify`. A value is
//! consumed at most once and issuing a new one invalidates the previous link.

pub mod account;
pub mod api;
pub mod challenge;
pub mod cli;
pub mod email;
pub mod error;
pub mod grpc;
pub mod store;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
