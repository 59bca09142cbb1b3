//! Out-of-band verification through emailed challenge tokens.
//!
//! A challenge moves through `Issued -> Delivered -> Redeemed | Expired |
//! Invalidated`. Issuing asks the identity store for a fresh one-time value,
//! signs it into a challenge token and emails a link carrying the token.
//! Redeeming checks the token, matches it against the value the store still
//! holds as active and consumes that value, so a link works exactly once and a
//! newer challenge invalidates older ones.

use crate::error::AuthError;
use crate::store::{EmailSend, Publisher, User, UserStore};
use crate::token::{TokenIssuer, TokenValidator};
use std::sync::Arc;
use tracing::{debug, field, info, instrument, Span};
use url::Url;

pub const VERIFY_PATH: &str = "/v3/verify";

pub struct ChallengeFlow {
    issuer: TokenIssuer,
    validator: TokenValidator,
    users: Arc<dyn UserStore>,
    publisher: Arc<dyn Publisher>,
    verify_domain: String,
}

impl ChallengeFlow {
    #[must_use]
    pub fn new(
        issuer: TokenIssuer,
        validator: TokenValidator,
        users: Arc<dyn UserStore>,
        publisher: Arc<dyn Publisher>,
        verify_domain: impl Into<String>,
    ) -> Self {
        Self {
            issuer,
            validator,
            users,
            publisher,
            verify_domain: verify_domain.into(),
        }
    }

    /// Link the user follows to redeem `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured domain does not form a valid URL.
    pub fn verification_link(&self, username: &str, token: &str) -> Result<Url, url::ParseError> {
        let mut link = Url::parse(&format!("https://{}{VERIFY_PATH}", self.verify_domain))?;
        link.query_pairs_mut()
            .append_pair("user", username)
            .append_pair("token", token);
        Ok(link)
    }

    /// Issue a new challenge for `username` and email the verification link.
    ///
    /// Returns the user as updated by the store.
    ///
    /// # Errors
    ///
    /// `Internal` if any collaborator or the signer fails.
    #[instrument(skip_all, fields(user = %username))]
    pub async fn issue(&self, username: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .generate_verification_value(username)
            .await
            .map_err(|err| {
                AuthError::internal(
                    username,
                    "issue_challenge",
                    err,
                    "failed to generate email verification token",
                )
            })?;

        let challenge = user.verification_value.as_deref().ok_or_else(|| {
            AuthError::internal(
                username,
                "issue_challenge",
                "store returned no verification value",
                "failed to generate email verification token",
            )
        })?;
        let token = self
            .issuer
            .sign_challenge_token(&user.username, challenge)
            .map_err(|err| {
                AuthError::internal(
                    username,
                    "issue_challenge",
                    err,
                    "failed to generate email verification token",
                )
            })?;

        let link = self
            .verification_link(&user.username, &token)
            .map_err(|err| {
                AuthError::internal(
                    username,
                    "issue_challenge",
                    err,
                    "failed to build verification link",
                )
            })?;

        let message = EmailSend::to_user(
            &user,
            "Email Verification",
            format!("please click this <a href=\"{link}\">link</a> to verify your email address"),
        );
        self.publisher.publish(&message).await.map_err(|err| {
            AuthError::internal(
                username,
                "issue_challenge",
                err,
                "failed to send verification email",
            )
        })?;

        debug!("verification email sent");
        Ok(user)
    }

    /// Redeem a challenge token presented for `username`.
    ///
    /// # Errors
    ///
    /// * `MalformedRequest` for empty inputs, a token issued to another user,
    ///   or a challenge that is not the user's active one (including one that
    ///   was already redeemed).
    /// * `Unauthenticated` if the token fails validation, including a header
    ///   algorithm other than the configured one.
    /// * `NotFound` if the user does not exist.
    /// * `Internal` if the store fails.
    #[instrument(
        name = "challenge.redeem",
        skip_all,
        fields(user = %username, outcome = field::Empty)
    )]
    pub async fn redeem(&self, username: &str, token: &str) -> Result<(), AuthError> {
        let result = self.consume(username, token).await;
        let outcome = if result.is_ok() { "verified" } else { "rejected" };
        Span::current().record("outcome", outcome);
        result
    }

    async fn consume(&self, username: &str, token: &str) -> Result<(), AuthError> {
        if username.is_empty() || token.is_empty() {
            return Err(AuthError::malformed(
                "parameters user, token cannot be empty",
            ));
        }

        let claims = self.validator.validate_challenge(token).map_err(|err| {
            debug!(reason = %err, "challenge token rejected");
            AuthError::unauthenticated("invalid token")
        })?;

        if claims.id != username {
            return Err(AuthError::malformed("user in token does not match request"));
        }

        let user = match self.users.find_by_username(username).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AuthError::not_found("user not found")),
            Err(err) => {
                return Err(AuthError::internal(
                    username,
                    "redeem_challenge",
                    err,
                    "unable to validate user",
                ));
            }
        };

        if user.verification_value.as_deref() != Some(claims.challenge.as_str()) {
            return Err(AuthError::malformed("challenge in token is incorrect"));
        }

        self.users
            .consume_verification_value(username, &claims.challenge)
            .await
            .map_err(|err| {
                AuthError::internal(username, "redeem_challenge", err, "unable to validate user")
            })?;

        info!("user verified");
        Ok(())
    }
}
