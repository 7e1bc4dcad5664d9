use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub type TelegramId = i64;
pub type UnixSeconds = u64;

/// Flat field map delivered by the login widget, keyed by field name.
pub type AssertionFields = BTreeMap<String, FieldValue>;

/// A single widget field. Query strings only ever carry text; JSON bodies
/// may carry integers for `id` and `auth_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Opaque signed session token. Holding one says nothing about its validity;
/// only the codec that minted it can vouch for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCredential(String);

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionCredential {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Request-level failure taxonomy. Every variant is terminal for the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed field: {0}")]
    MissingField(String),
    #[error("assertion expired ({age_seconds}s old)")]
    Expired { age_seconds: i64 },
    #[error("assertion signature mismatch")]
    SignatureMismatch,
    #[error("session token signature is invalid")]
    BadSignature,
    #[error("session token expired")]
    TokenExpired,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status an HTTP collaborator should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingField(_) => 400,
            AuthError::Expired { .. }
            | AuthError::SignatureMismatch
            | AuthError::BadSignature
            | AuthError::TokenExpired => 401,
            AuthError::Configuration(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable name, safe to expose in responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingField(_) => "missing_field",
            AuthError::Expired { .. } => "expired",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::BadSignature => "bad_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::Configuration(_) => "configuration_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
