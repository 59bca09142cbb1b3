use super::{
    b64d_json, unix_now, verify_input, ChallengeClaims, SessionClaims, SigningConfig, TokenError,
    TokenHeader, CLAIM_CHALLENGE, CLAIM_EXPIRY, CLAIM_ORIG_IAT, CLAIM_USER, CLOCK_SKEW_SECONDS,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Parses and verifies tokens against the process signing configuration.
///
/// Holds no mutable state; clone it or share it behind an `Arc` across tasks.
#[derive(Clone, Debug)]
pub struct TokenValidator {
    config: Arc<SigningConfig>,
}

impl TokenValidator {
    #[must_use]
    pub fn new(config: Arc<SigningConfig>) -> Self {
        Self { config }
    }

    /// Validate a session token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns the first failed check, in order: structure, algorithm,
    /// signature, time claims, identity claim.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.validate_at(token, unix_now())
    }

    /// Same as [`Self::validate`] against an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Self::validate`]. Challenge tokens are rejected as malformed.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<SessionClaims, TokenError> {
        let claims = self.verify(token, now)?;
        // challenge tokens are emailed; they must never work as bearer credentials
        if claims.contains_key(CLAIM_CHALLENGE) {
            return Err(TokenError::MalformedToken);
        }
        serde_json::from_value(Value::Object(claims)).map_err(|_| TokenError::MalformedToken)
    }

    /// Validate a challenge token and return its claims.
    ///
    /// # Errors
    ///
    /// Same checks as [`Self::validate`].
    pub fn validate_challenge(&self, token: &str) -> Result<ChallengeClaims, TokenError> {
        self.validate_challenge_at(token, unix_now())
    }

    /// Same as [`Self::validate_challenge`] against an explicit clock.
    ///
    /// # Errors
    ///
    /// Same checks as [`Self::validate`].
    pub fn validate_challenge_at(
        &self,
        token: &str,
        now: i64,
    ) -> Result<ChallengeClaims, TokenError> {
        let claims = self.verify(token, now)?;
        serde_json::from_value(Value::Object(claims)).map_err(|_| TokenError::MalformedToken)
    }

    fn verify(&self, token: &str, now: i64) -> Result<Map<String, Value>, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::MalformedToken)?;
        let claims_b64 = parts.next().ok_or(TokenError::MalformedToken)?;
        let sig_b64 = parts.next().ok_or(TokenError::MalformedToken)?;
        if parts.next().is_some() {
            return Err(TokenError::MalformedToken);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        let claims: Map<String, Value> = b64d_json(claims_b64)?;
        let signature =
            Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::MalformedToken)?;

        let expected = self.config.algorithm();
        if header.alg != expected.as_str() {
            return Err(TokenError::AlgorithmMismatch {
                expected: expected.as_str(),
                found: header.alg,
            });
        }

        let signing_input = format!("{header_b64}.{claims_b64}");
        if !verify_input(
            expected,
            self.config.key_bytes(),
            signing_input.as_bytes(),
            &signature,
        ) {
            return Err(TokenError::BadSignature);
        }

        let exp = claims
            .get(CLAIM_EXPIRY)
            .and_then(Value::as_i64)
            .ok_or(TokenError::MalformedToken)?;
        if exp <= now {
            return Err(TokenError::Expired);
        }
        let issued_at = claims
            .get(CLAIM_ORIG_IAT)
            .and_then(Value::as_i64)
            .ok_or(TokenError::MalformedToken)?;
        if issued_at > now.saturating_add(CLOCK_SKEW_SECONDS) {
            return Err(TokenError::NotYetValid);
        }

        match claims.get(CLAIM_USER).and_then(Value::as_str) {
            Some(id) if !id.is_empty() => Ok(claims),
            _ => Err(TokenError::MissingIdentityClaim),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{test_support::sign_raw, SigningAlgorithm, TokenIssuer};
    use secrecy::SecretString;
    use serde_json::json;
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;
    const KEY: &str = "test-signing-key";

    fn config(key: &str, algorithm: SigningAlgorithm) -> Arc<SigningConfig> {
        Arc::new(
            SigningConfig::new(SecretString::from(key.to_string()), algorithm)
                .with_timeout(Duration::from_secs(600)),
        )
    }

    fn pair(key: &str) -> (TokenIssuer, TokenValidator) {
        let config = config(key, SigningAlgorithm::Hs512);
        (TokenIssuer::new(config.clone()), TokenValidator::new(config))
    }

    #[test]
    fn session_round_trip_preserves_identity() -> Result<(), TokenError> {
        let (issuer, validator) = pair(KEY);
        for user in ["alice", "bob", "ünïcode", "with space", "a"] {
            let signed = issuer.sign_session_token_at(user, NOW)?;
            let claims = validator.validate_at(&signed.token, NOW + 1)?;
            assert_eq!(claims.id, user);
            assert_eq!(claims.exp, signed.expire);
            assert_eq!(claims.orig_iat, NOW);
        }
        Ok(())
    }

    #[test]
    fn rejects_token_signed_with_other_key() -> Result<(), TokenError> {
        let (issuer, _) = pair("another-key");
        let (_, validator) = pair(KEY);
        let signed = issuer.sign_session_token_at("alice", NOW)?;
        assert_eq!(
            validator.validate_at(&signed.token, NOW),
            Err(TokenError::BadSignature)
        );
        Ok(())
    }

    #[test]
    fn rejects_expired_token() -> Result<(), TokenError> {
        let (issuer, validator) = pair(KEY);
        let signed = issuer.sign_session_token_at("alice", NOW)?;
        assert_eq!(
            validator.validate_at(&signed.token, signed.expire),
            Err(TokenError::Expired)
        );
        assert_eq!(
            validator.validate_at(&signed.token, signed.expire + 9999),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn rejects_weaker_algorithm_with_same_secret() {
        let (_, validator) = pair(KEY);
        let token = sign_raw(
            SigningAlgorithm::Hs256,
            KEY.as_bytes(),
            &json!({"id": "alice", "exp": NOW + 60, "orig_iat": NOW}),
        );
        assert_eq!(
            validator.validate_at(&token, NOW),
            Err(TokenError::AlgorithmMismatch {
                expected: "HS512",
                found: "HS256".to_string(),
            })
        );
    }

    #[test]
    fn rejects_unsigned_none_algorithm() {
        let (_, validator) = pair(KEY);
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = Base64UrlUnpadded::encode_string(
            json!({"id": "alice", "exp": NOW + 60, "orig_iat": NOW})
                .to_string()
                .as_bytes(),
        );
        let token = format!("{header}.{claims}.");
        assert!(matches!(
            validator.validate_at(&token, NOW),
            Err(TokenError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn rejects_malformed_structure() {
        let (_, validator) = pair(KEY);
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**", "e30.e30.%%%"] {
            assert_eq!(
                validator.validate_at(token, NOW),
                Err(TokenError::MalformedToken),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn rejects_issued_in_future_beyond_skew() {
        let (_, validator) = pair(KEY);
        let skewed = sign_raw(
            SigningAlgorithm::Hs512,
            KEY.as_bytes(),
            &json!({"id": "alice", "exp": NOW + 600, "orig_iat": NOW + CLOCK_SKEW_SECONDS}),
        );
        assert!(validator.validate_at(&skewed, NOW).is_ok());

        let future = sign_raw(
            SigningAlgorithm::Hs512,
            KEY.as_bytes(),
            &json!({"id": "alice", "exp": NOW + 600, "orig_iat": NOW + CLOCK_SKEW_SECONDS + 1}),
        );
        assert_eq!(
            validator.validate_at(&future, NOW),
            Err(TokenError::NotYetValid)
        );
    }

    #[test]
    fn rejects_missing_or_empty_identity() {
        let (_, validator) = pair(KEY);
        for claims in [
            json!({"exp": NOW + 60, "orig_iat": NOW}),
            json!({"id": "", "exp": NOW + 60, "orig_iat": NOW}),
            json!({"id": 42, "exp": NOW + 60, "orig_iat": NOW}),
        ] {
            let token = sign_raw(SigningAlgorithm::Hs512, KEY.as_bytes(), &claims);
            assert_eq!(
                validator.validate_at(&token, NOW),
                Err(TokenError::MissingIdentityClaim)
            );
        }
    }

    #[test]
    fn rejects_date_string_expiry() {
        let (_, validator) = pair(KEY);
        let token = sign_raw(
            SigningAlgorithm::Hs512,
            KEY.as_bytes(),
            &json!({"id": "alice", "exp": "2023-11-15 22:13:20 +0000 UTC", "orig_iat": NOW}),
        );
        assert_eq!(
            validator.validate_at(&token, NOW),
            Err(TokenError::MalformedToken)
        );
    }

    #[test]
    fn challenge_token_is_not_a_session_credential() -> Result<(), TokenError> {
        let (issuer, validator) = pair(KEY);
        let token = issuer.sign_challenge_token_at("alice", "one-time", NOW)?;
        assert_eq!(
            validator.validate_at(&token, NOW),
            Err(TokenError::MalformedToken)
        );

        let claims = validator.validate_challenge_at(&token, NOW)?;
        assert_eq!(claims.id, "alice");
        assert_eq!(claims.challenge, "one-time");
        assert_eq!(claims.exp, NOW + 86_400);
        Ok(())
    }

    #[test]
    fn validator_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TokenValidator>();
        assert_send_sync::<TokenIssuer>();
    }
}
