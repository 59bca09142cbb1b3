use super::error::TokenError;
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, str::FromStr, time::Duration};

const DEFAULT_SESSION_TIMEOUT_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_CHALLENGE_TIMEOUT_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_REALM: &str = "authgate";

/// HMAC family supported for signing. Exactly one is configured per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    Hs256,
    Hs384,
    Hs512,
}

impl SigningAlgorithm {
    /// Value carried in the token header `alg` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::Hs256),
            "HS384" => Ok(Self::Hs384),
            "HS512" => Ok(Self::Hs512),
            other => Err(TokenError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Process-wide signing configuration. Immutable once built; share it behind an `Arc`.
#[derive(Clone, Debug)]
pub struct SigningConfig {
    key: SecretString,
    algorithm: SigningAlgorithm,
    timeout: Duration,
    challenge_timeout: Duration,
    realm: String,
}

impl SigningConfig {
    #[must_use]
    pub fn new(key: SecretString, algorithm: SigningAlgorithm) -> Self {
        Self {
            key,
            algorithm,
            timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECONDS),
            challenge_timeout: Duration::from_secs(DEFAULT_CHALLENGE_TIMEOUT_SECONDS),
            realm: DEFAULT_REALM.to_string(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_challenge_timeout(mut self, timeout: Duration) -> Self {
        self.challenge_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_realm(mut self, realm: String) -> Self {
        self.realm = realm;
        self
    }

    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn challenge_timeout(&self) -> Duration {
        self.challenge_timeout
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub(crate) fn key_bytes(&self) -> &[u8] {
        self.key.expose_secret().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_parses_case_insensitive() {
        assert_eq!("hs512".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs512));
        assert_eq!(" HS256 ".parse::<SigningAlgorithm>(), Ok(SigningAlgorithm::Hs256));
        assert_eq!(
            "none".parse::<SigningAlgorithm>(),
            Err(TokenError::UnsupportedAlgorithm("NONE".to_string()))
        );
        assert!("RS256".parse::<SigningAlgorithm>().is_err());
    }

    #[test]
    fn config_defaults() {
        let config = SigningConfig::new(
            SecretString::from("secret".to_string()),
            SigningAlgorithm::Hs384,
        );
        assert_eq!(config.algorithm(), SigningAlgorithm::Hs384);
        assert_eq!(config.timeout(), Duration::from_secs(86_400));
        assert_eq!(config.challenge_timeout(), Duration::from_secs(86_400));
        assert_eq!(config.realm(), "authgate");
        assert_eq!(config.key_bytes(), b"secret");
    }

    #[test]
    fn debug_redacts_key() {
        let config = SigningConfig::new(
            SecretString::from("super-secret-key".to_string()),
            SigningAlgorithm::Hs512,
        );
        assert!(!format!("{config:?}").contains("super-secret-key"));
    }
}
