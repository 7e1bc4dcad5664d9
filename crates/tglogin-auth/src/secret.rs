//! Process-wide secrets.
//!
//! Both secret types refuse empty input, redact themselves in `Debug`, and wipe
//! their buffer on drop. The raw value is only reachable from inside this crate.

use std::fmt;

use tglogin_api::AuthError;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bot token shared with the login widget; keys the assertion HMAC.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(String);

/// Key for signing session tokens.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret(String);

impl SharedSecret {
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        non_empty(value.into(), "shared secret").map(Self)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl SigningSecret {
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        non_empty(value.into(), "signing secret").map(Self)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(***)")
    }
}

fn non_empty(mut value: String, what: &str) -> Result<String, AuthError> {
    if value.trim().is_empty() {
        value.zeroize();
        return Err(AuthError::Configuration(format!("{what} is empty")));
    }
    Ok(value)
}
