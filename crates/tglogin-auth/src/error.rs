//! Error types.

use thiserror::Error;
use tglogin_api::AuthError;

/// Reasons an inbound widget assertion is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// A required field is absent, empty, or not parseable.
    #[error("missing or malformed field `{field}`")]
    MissingField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// `auth_date` lies outside the freshness window.
    #[error("assertion is {age_seconds}s old")]
    Expired {
        /// Age of the assertion at verification time.
        age_seconds: i64,
    },

    /// The recomputed HMAC does not match `hash`.
    #[error("assertion signature mismatch")]
    SignatureMismatch,
}

/// Reasons a session token cannot be minted or accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Structure or signature check failed.
    #[error("session token signature is invalid")]
    BadSignature,

    /// `now` is at or past the embedded expiry.
    #[error("session token expired")]
    TokenExpired,

    /// The token could not be produced.
    #[error("failed to encode session token: {0}")]
    Encoding(String),
}

impl From<VerificationError> for AuthError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::MissingField { field } => AuthError::MissingField(field.to_string()),
            VerificationError::Expired { age_seconds } => AuthError::Expired { age_seconds },
            VerificationError::SignatureMismatch => AuthError::SignatureMismatch,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::BadSignature => AuthError::BadSignature,
            TokenError::TokenExpired => AuthError::TokenExpired,
            TokenError::Encoding(msg) => AuthError::Internal(msg),
        }
    }
}
