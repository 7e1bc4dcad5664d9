//! Session cookie helpers.

use httpdate::fmt_http_date;
use std::time::{Duration, UNIX_EPOCH};
use tglogin_api::{AuthError, SessionCredential, UnixSeconds};

use crate::token::DEFAULT_SESSION_TTL_SECS;

/// SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// SameSite=Strict
    Strict,
    /// SameSite=Lax
    Lax,
    /// SameSite=None
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    /// Parse a config value (`strict`, `lax`, `none`; any case).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// Options used to build the session cookie.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// Cookie name (without any prefix).
    pub name: String,

    /// Cookie path.
    pub path: String,

    /// Optional cookie domain.
    pub domain: Option<String>,

    /// Send on HTTPS only.
    pub secure: bool,

    /// Not accessible to JS.
    pub http_only: bool,

    /// SameSite attribute.
    pub same_site: SameSite,

    /// Max-Age in seconds. Defaults to the session lifetime.
    pub max_age_seconds: Option<u64>,

    /// If true and `domain` is None, the cookie name will be prefixed with `__Host-`
    /// and the function will enforce `path=/` and `secure=true`.
    pub use_host_prefix: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "tglogin_session".to_string(),
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age_seconds: Some(DEFAULT_SESSION_TTL_SECS),
            use_host_prefix: true,
        }
    }
}

impl CookieOptions {
    /// Effective cookie name, including the `__Host-` prefix when it applies.
    pub fn cookie_name(&self) -> Result<String, AuthError> {
        if self.use_host_prefix && self.domain.is_none() {
            if self.path != "/" {
                return Err(AuthError::Configuration(
                    "__Host- cookies must have Path=/".to_string(),
                ));
            }
            if !self.secure {
                return Err(AuthError::Configuration(
                    "__Host- cookies must be Secure".to_string(),
                ));
            }
            Ok(format!(
                "__Host-{}",
                self.name.trim_start_matches("__Host-")
            ))
        } else {
            Ok(self.name.clone())
        }
    }

    fn common_attributes(&self, parts: &mut Vec<String>) {
        parts.push(format!("Path={}", self.path));

        if let Some(domain) = &self.domain {
            parts.push(format!("Domain={domain}"));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }

        parts.push(format!("SameSite={}", self.same_site.as_str()));
    }
}

/// Build a `Set-Cookie` header value carrying the session credential.
///
/// `Expires` is `now + max_age`, matching a token issued at `now`.
pub fn build_set_cookie(
    credential: &SessionCredential,
    opts: &CookieOptions,
    now: UnixSeconds,
) -> Result<String, AuthError> {
    let name = opts.cookie_name()?;

    let mut parts: Vec<String> = vec![format!("{name}={credential}")];
    opts.common_attributes(&mut parts);

    if let Some(max_age) = opts.max_age_seconds {
        parts.push(format!("Max-Age={max_age}"));
        // Expires for older clients.
        let expires = UNIX_EPOCH + Duration::from_secs(now.saturating_add(max_age));
        parts.push(format!("Expires={}", fmt_http_date(expires)));
    }

    Ok(parts.join("; "))
}

/// Build a `Set-Cookie` header value that clears the session cookie.
pub fn build_clear_cookie(opts: &CookieOptions) -> Result<String, AuthError> {
    let name = opts.cookie_name()?;

    let mut parts: Vec<String> = vec![format!("{name}=")];
    opts.common_attributes(&mut parts);
    parts.push("Max-Age=0".to_string());
    parts.push(format!("Expires={}", fmt_http_date(UNIX_EPOCH)));

    Ok(parts.join("; "))
}

/// Find the session token in a `Cookie` request header.
pub fn session_from_cookie_header<'a>(header: &'a str, opts: &CookieOptions) -> Option<&'a str> {
    let name = opts.cookie_name().ok()?;
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}
