use super::config::SigningAlgorithm;
use serde::{Deserialize, Serialize};

pub const CLAIM_USER: &str = "id";
pub const CLAIM_CHALLENGE: &str = "challenge";
pub const CLAIM_ORIG_IAT: &str = "orig_iat";
pub const CLAIM_EXPIRY: &str = "exp";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub typ: String,
}

impl TokenHeader {
    pub(crate) fn for_algorithm(algorithm: SigningAlgorithm) -> Self {
        Self {
            alg: algorithm.as_str().to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by a session token. `exp` is fixed at issuance as `orig_iat + timeout`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub id: String,
    pub exp: i64,
    pub orig_iat: i64,
}

/// Claims carried by an emailed challenge token.
///
/// `challenge` must match the user's active one-time verification value at
/// redemption time. A token without the claim decodes to an empty value,
/// which never matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeClaims {
    pub id: String,
    #[serde(default)]
    pub challenge: String,
    pub exp: i64,
    pub orig_iat: i64,
}
