//! tglogin-auth
//!
//! Verification and session issuance for the Telegram login widget.
//!
//! - **Assertion verification**: rebuilds the widget's check string, recomputes
//!   `HMAC-SHA256(SHA256(bot_token), check_string)` and enforces the freshness window
//! - **Session tokens**: HS256-signed, expiring tokens carrying the verified identity
//! - **Transport helpers**: bearer extraction, session cookies, front-end redirects
//!
//! The entry point is [`AuthFlow`]. Everything is synchronous and free of I/O;
//! the caller supplies the current time.
//!
//! ## Quick start
//! ```no_run
//! use tglogin_auth::{AuthConfig, AuthFlow, SharedSecret, SigningSecret, unix_now};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let flow = AuthFlow::new(&AuthConfig {
//!     shared_secret: Some(SharedSecret::new("123456:bot-token")?),
//!     signing_secret: Some(SigningSecret::new("jwt-secret")?),
//!     ..Default::default()
//! })?;
//!
//! let fields = tglogin_auth::fields_from_query("id=1&first_name=Ada&auth_date=1700000000&hash=...");
//! let issued = flow.issue_session(fields, unix_now())?;
//! let user = flow.check_session(issued.token.as_str(), unix_now())?;
//! println!("telegram id {}", user.telegram_id());
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod assertion;
mod bearer;
mod claim;
mod cookie;
mod error;
mod flow;
mod redirect;
mod secret;
mod token;

pub use assertion::{
    AUTH_DATE_FIELD, AssertionVerifier, DEFAULT_FRESHNESS_WINDOW_SECS, HASH_FIELD, ID_FIELD,
    RawAssertion, VerifiedAssertion, check_string, fields_from_query, fields_to_query,
};
pub use bearer::extract_bearer;
pub use claim::IdentityClaim;
pub use cookie::{
    CookieOptions, SameSite, build_clear_cookie, build_set_cookie, session_from_cookie_header,
};
pub use error::{TokenError, VerificationError};
pub use flow::{AuthConfig, AuthFlow, IssuedSession, SessionStatus, unix_now};
pub use redirect::{TOKEN_PARAM, with_token};
pub use secret::{SharedSecret, SigningSecret};
pub use token::{DEFAULT_SESSION_TTL_SECS, SessionTokenCodec};

pub use tglogin_api::{AssertionFields, AuthError, FieldValue, SessionCredential};
