use thiserror::Error;

/// Failure reasons for token signing and validation.
///
/// Callers at the network boundary collapse every variant except `Signing`
/// into an unauthenticated response; the variant itself is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    MalformedToken,
    #[error("token algorithm {found} does not match {expected}")]
    AlgorithmMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("invalid signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("missing identity claim")]
    MissingIdentityClaim,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("signing failed: {0}")]
    Signing(String),
}
