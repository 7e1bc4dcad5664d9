//! Session token minting and validation (HS256 JWS).

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tglogin_api::{SessionCredential, TelegramId, UnixSeconds};

use crate::claim::IdentityClaim;
use crate::error::TokenError;
use crate::secret::SigningSecret;

/// Seven days.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaimsOut<'a> {
    telegram_id: TelegramId,
    name: &'a str,
    username: Option<&'a str>,
    photo: Option<&'a str>,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaimsIn {
    telegram_id: TelegramId,
    name: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    photo: Option<String>,
    exp: u64,
}

/// Encodes claims into signed, expiring session tokens and validates them.
#[derive(Clone)]
pub struct SessionTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: u64,
}

impl SessionTokenCodec {
    pub fn new(secret: &SigningSecret) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is compared against the caller's clock in `decode`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.expose()),
            decoding: DecodingKey::from_secret(secret.expose()),
            validation,
            ttl: DEFAULT_SESSION_TTL_SECS,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl = seconds;
        self
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Expiry instant of a token issued at `issued_at`.
    pub fn expires_at(&self, issued_at: UnixSeconds) -> Result<UnixSeconds, TokenError> {
        issued_at
            .checked_add(self.ttl)
            .ok_or_else(|| TokenError::Encoding("expiry overflows".to_string()))
    }

    /// Mint a token for `claim`. Identical inputs give identical tokens.
    pub fn encode(
        &self,
        claim: &IdentityClaim,
        issued_at: UnixSeconds,
    ) -> Result<SessionCredential, TokenError> {
        let claims = SessionClaimsOut {
            telegram_id: claim.telegram_id(),
            name: claim.name(),
            username: claim.username(),
            photo: claim.photo(),
            iat: issued_at,
            exp: self.expires_at(issued_at)?,
        };

        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map(SessionCredential::new)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Validate `token` as of `now` and return the claim it carries.
    pub fn decode(&self, token: &str, now: UnixSeconds) -> Result<IdentityClaim, TokenError> {
        let data = jsonwebtoken::decode::<SessionClaimsIn>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(reason = ?e.kind(), "session token rejected");
                TokenError::BadSignature
            })?;

        let claims = data.claims;
        if now >= claims.exp {
            return Err(TokenError::TokenExpired);
        }

        Ok(IdentityClaim::from_parts(
            claims.telegram_id,
            claims.name,
            claims.username,
            claims.photo,
        ))
    }
}

impl fmt::Debug for SessionTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenCodec")
            .field("alg", &ALGORITHM)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
