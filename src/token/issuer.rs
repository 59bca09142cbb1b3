use super::{encode, unix_now, ChallengeClaims, SessionClaims, SigningConfig, TokenError};
use std::{sync::Arc, time::Duration};

/// A freshly signed session token and its expiry (seconds since epoch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub expire: i64,
    pub token: String,
}

/// Signs session and challenge tokens with the process signing configuration.
#[derive(Clone, Debug)]
pub struct TokenIssuer {
    config: Arc<SigningConfig>,
}

fn seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: Arc<SigningConfig>) -> Self {
        Self { config }
    }

    /// Sign a session token for `user` valid for the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the signing primitive rejects the key.
    pub fn sign_session_token(&self, user: &str) -> Result<SessionToken, TokenError> {
        self.sign_session_token_at(user, unix_now())
    }

    /// Same as [`Self::sign_session_token`] with an explicit issuance time.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the signing primitive rejects the key.
    pub fn sign_session_token_at(&self, user: &str, now: i64) -> Result<SessionToken, TokenError> {
        let claims = SessionClaims {
            id: user.to_string(),
            exp: now.saturating_add(seconds(self.config.timeout())),
            orig_iat: now,
        };
        let token = encode(self.config.algorithm(), self.config.key_bytes(), &claims)?;

        Ok(SessionToken {
            expire: claims.exp,
            token,
        })
    }

    /// Sign a challenge token binding `user` to a one-time verification value.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the signing primitive rejects the key.
    pub fn sign_challenge_token(&self, user: &str, challenge: &str) -> Result<String, TokenError> {
        self.sign_challenge_token_at(user, challenge, unix_now())
    }

    /// Same as [`Self::sign_challenge_token`] with an explicit issuance time.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the signing primitive rejects the key.
    pub fn sign_challenge_token_at(
        &self,
        user: &str,
        challenge: &str,
        now: i64,
    ) -> Result<String, TokenError> {
        let claims = ChallengeClaims {
            id: user.to_string(),
            challenge: challenge.to_string(),
            exp: now.saturating_add(seconds(self.config.challenge_timeout())),
            orig_iat: now,
        };
        encode(self.config.algorithm(), self.config.key_bytes(), &claims)
    }
}
