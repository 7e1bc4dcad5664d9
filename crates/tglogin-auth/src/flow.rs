//! Assertion-to-session orchestration.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tglogin_api::{AssertionFields, AuthError, SessionCredential, UnixSeconds};
use tracing::{debug, warn};

use crate::assertion::{AssertionVerifier, DEFAULT_FRESHNESS_WINDOW_SECS, RawAssertion};
use crate::claim::IdentityClaim;
use crate::secret::{SharedSecret, SigningSecret};
use crate::token::{DEFAULT_SESSION_TTL_SECS, SessionTokenCodec};

/// Settings the flow is built from. Secrets are optional here so that a
/// partially configured process fails per request with a configuration error
/// instead of falling back to a default key.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Bot token used to verify widget assertions.
    pub shared_secret: Option<SharedSecret>,

    /// Key used to sign session tokens.
    pub signing_secret: Option<SigningSecret>,

    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Maximum assertion age in seconds.
    pub freshness_window_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            shared_secret: None,
            signing_secret: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
        }
    }
}

/// Successful issuance: the credential plus the claim it encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub token: SessionCredential,
    pub user: IdentityClaim,
    pub expires_at: UnixSeconds,
}

/// Answer to "who is this caller?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityClaim>,
}

impl SessionStatus {
    pub fn logged_out() -> Self {
        Self {
            logged_in: false,
            user: None,
        }
    }
}

/// Verifies assertions and issues/checks session tokens.
///
/// Immutable after construction; share it behind an `Arc` across threads.
#[derive(Debug, Clone)]
pub struct AuthFlow {
    verifier: Option<AssertionVerifier>,
    codec: Option<SessionTokenCodec>,
}

impl AuthFlow {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let verifier = config
            .shared_secret
            .as_ref()
            .map(|s| {
                AssertionVerifier::new(s)
                    .map(|v| v.with_freshness_window(config.freshness_window_secs))
            })
            .transpose()?;
        let codec = config
            .signing_secret
            .as_ref()
            .map(|s| SessionTokenCodec::new(s).with_ttl(config.session_ttl_secs));

        if verifier.is_none() {
            warn!("shared secret not configured; session issuance will fail");
        }
        if codec.is_none() {
            warn!("signing secret not configured; session issuance and checks will fail");
        }

        Ok(Self { verifier, codec })
    }

    fn verifier(&self) -> Result<&AssertionVerifier, AuthError> {
        self.verifier
            .as_ref()
            .ok_or_else(|| AuthError::Configuration("shared secret is not configured".to_string()))
    }

    fn codec(&self) -> Result<&SessionTokenCodec, AuthError> {
        self.codec
            .as_ref()
            .ok_or_else(|| AuthError::Configuration("signing secret is not configured".to_string()))
    }

    /// Verify a widget payload and mint a session for it.
    ///
    /// Nothing is minted unless verification succeeds.
    pub fn issue_session(
        &self,
        fields: AssertionFields,
        now: UnixSeconds,
    ) -> Result<IssuedSession, AuthError> {
        let verifier = self.verifier()?;
        let codec = self.codec()?;

        debug!(stage = "received", fields = fields.len());
        let assertion = RawAssertion::parse(fields).map_err(|e| reject(e.into()))?;
        issue_verified(verifier, codec, assertion, now)
    }

    /// Same as [`issue_session`](Self::issue_session) for an already parsed assertion.
    pub fn issue_for(
        &self,
        assertion: RawAssertion,
        now: UnixSeconds,
    ) -> Result<IssuedSession, AuthError> {
        let verifier = self.verifier()?;
        let codec = self.codec()?;
        debug!(stage = "received", telegram_id = assertion.id());
        issue_verified(verifier, codec, assertion, now)
    }

    /// Validate a presented session token.
    pub fn check_session(&self, token: &str, now: UnixSeconds) -> Result<IdentityClaim, AuthError> {
        let codec = self.codec()?;
        codec.decode(token, now).map_err(AuthError::from)
    }

    /// Collapse a session check into the logged-in/out answer.
    ///
    /// A missing or rejected token is "logged out"; configuration problems
    /// are still reported as errors.
    pub fn session_status(
        &self,
        token: Option<&str>,
        now: UnixSeconds,
    ) -> Result<SessionStatus, AuthError> {
        let Some(token) = token else {
            return Ok(SessionStatus::logged_out());
        };
        match self.check_session(token, now) {
            Ok(user) => Ok(SessionStatus {
                logged_in: true,
                user: Some(user),
            }),
            Err(err @ (AuthError::Configuration(_) | AuthError::Internal(_))) => Err(err),
            Err(err) => {
                debug!(reason = err.kind(), "session check failed");
                Ok(SessionStatus::logged_out())
            }
        }
    }
}

fn issue_verified(
    verifier: &AssertionVerifier,
    codec: &SessionTokenCodec,
    assertion: RawAssertion,
    now: UnixSeconds,
) -> Result<IssuedSession, AuthError> {
    let telegram_id = assertion.id();
    debug!(stage = "verifying", telegram_id);
    let verified = verifier
        .verify(assertion, now)
        .map_err(|e| reject(e.into()))?;
    debug!(stage = "verified", telegram_id);

    let user = IdentityClaim::from_verified(&verified);
    let token = codec.encode(&user, now).map_err(|e| reject(e.into()))?;
    let expires_at = codec.expires_at(now).map_err(AuthError::from)?;
    debug!(stage = "issued", telegram_id, expires_at);

    Ok(IssuedSession {
        token,
        user,
        expires_at,
    })
}

fn reject(err: AuthError) -> AuthError {
    warn!(stage = "rejected", kind = err.kind(), "session issuance rejected");
    err
}

/// Current wall-clock time in Unix seconds.
pub fn unix_now() -> UnixSeconds {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}
