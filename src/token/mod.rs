//! Compact HMAC-signed tokens.
//!
//! Tokens are `base64url(header).base64url(claims).base64url(signature)` without
//! padding. The header names the algorithm; the validator accepts only the single
//! algorithm configured for the process, so a token claiming any other `alg`
//! (including a weaker HMAC with the same secret) is rejected before the
//! signature is looked at.

mod claims;
mod config;
mod error;
mod issuer;
mod validator;

pub use claims::{
    ChallengeClaims, SessionClaims, TokenHeader, CLAIM_CHALLENGE, CLAIM_EXPIRY, CLAIM_ORIG_IAT,
    CLAIM_USER,
};
pub use config::{SigningAlgorithm, SigningConfig};
pub use error::TokenError;
pub use issuer::{SessionToken, TokenIssuer};
pub use validator::TokenValidator;

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{digest::KeyInit, Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use std::time::{SystemTime, UNIX_EPOCH};

/// Tolerated drift for `orig_iat` values ahead of the local clock.
pub const CLOCK_SKEW_SECONDS: i64 = 60;

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|err| TokenError::Signing(err.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::MalformedToken)
}

fn mac_sign<M: Mac + KeyInit>(key: &[u8], input: &[u8]) -> Result<Vec<u8>, TokenError> {
    let mut mac = <M as KeyInit>::new_from_slice(key)
        .map_err(|_| TokenError::Signing("invalid key length".to_string()))?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn mac_verify<M: Mac + KeyInit>(key: &[u8], input: &[u8], signature: &[u8]) -> bool {
    <M as KeyInit>::new_from_slice(key).is_ok_and(|mut mac| {
        mac.update(input);
        mac.verify_slice(signature).is_ok()
    })
}

fn sign_input(
    algorithm: SigningAlgorithm,
    key: &[u8],
    input: &[u8],
) -> Result<Vec<u8>, TokenError> {
    if key.is_empty() {
        return Err(TokenError::Signing("empty signing key".to_string()));
    }
    match algorithm {
        SigningAlgorithm::Hs256 => mac_sign::<Hmac<Sha256>>(key, input),
        SigningAlgorithm::Hs384 => mac_sign::<Hmac<Sha384>>(key, input),
        SigningAlgorithm::Hs512 => mac_sign::<Hmac<Sha512>>(key, input),
    }
}

fn verify_input(algorithm: SigningAlgorithm, key: &[u8], input: &[u8], signature: &[u8]) -> bool {
    if key.is_empty() {
        return false;
    }
    match algorithm {
        SigningAlgorithm::Hs256 => mac_verify::<Hmac<Sha256>>(key, input, signature),
        SigningAlgorithm::Hs384 => mac_verify::<Hmac<Sha384>>(key, input, signature),
        SigningAlgorithm::Hs512 => mac_verify::<Hmac<Sha512>>(key, input, signature),
    }
}

/// Serialize and sign a claim set with the given algorithm and key.
fn encode<T: Serialize>(
    algorithm: SigningAlgorithm,
    key: &[u8],
    claims: &T,
) -> Result<String, TokenError> {
    let header_b64 = b64e_json(&TokenHeader::for_algorithm(algorithm))?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = sign_input(algorithm, key, signing_input.as_bytes())?;
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}
