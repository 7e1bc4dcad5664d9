use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tglogin_api::AuthError;
use tglogin_auth::{AuthConfig, AuthFlow, CookieOptions, SameSite, SharedSecret, SigningSecret};
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "tglogin.toml";

pub const ENV_SHARED_SECRET: &str = "SHARED_SECRET";
pub const ENV_SHARED_SECRET_ALIAS: &str = "BOT_TOKEN";
pub const ENV_SIGNING_SECRET: &str = "SIGNING_SECRET";
pub const ENV_SIGNING_SECRET_ALIAS: &str = "JWT_SECRET";
pub const ENV_SESSION_TTL: &str = "SESSION_TTL";
pub const ENV_FRESHNESS_WINDOW: &str = "FRESHNESS_WINDOW";
pub const ENV_REDIRECT_URL: &str = "REDIRECT_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {}: {message}", path.display())]
    Toml { path: PathBuf, message: String },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("{0} is not configured")]
    MissingSecret(&'static str),
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        AuthError::Configuration(err.to_string())
    }
}

/// Where secrets and environment overrides come from.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory store, for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MapSecretStore(BTreeMap<String, String>);

impl MapSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl SecretStore for MapSecretStore {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Process-wide configuration, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub auth: AuthConfig,
    pub redirect_url: Option<String>,
    pub cookie: CookieOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    redirect_url: Option<String>,
    #[serde(default)]
    session: RawSession,
    #[serde(default)]
    assertion: RawAssertion,
    #[serde(default)]
    cookie: RawCookie,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSession {
    ttl: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAssertion {
    freshness_window: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCookie {
    name: Option<String>,
    path: Option<String>,
    domain: Option<String>,
    secure: Option<bool>,
    http_only: Option<bool>,
    same_site: Option<String>,
    use_host_prefix: Option<bool>,
    max_age: Option<String>,
}

impl Config {
    /// Load `tglogin.toml` from `dir` if present, then apply `store` on top.
    pub fn load(dir: &Path, store: &dyn SecretStore) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::from_file(&path, store)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::from_raw(RawConfig::default(), store)
        }
    }

    pub fn from_file(path: &Path, store: &dyn SecretStore) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_raw(raw, store)
    }

    /// Defaults plus the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_raw(RawConfig::default(), &EnvSecretStore)
    }

    fn from_raw(raw: RawConfig, store: &dyn SecretStore) -> Result<Self, ConfigError> {
        let mut auth = AuthConfig::default();

        if let Some(ttl) = override_or(store, ENV_SESSION_TTL, raw.session.ttl) {
            auth.session_ttl_secs = duration_setting("session.ttl", &ttl)?;
        }
        if let Some(window) =
            override_or(store, ENV_FRESHNESS_WINDOW, raw.assertion.freshness_window)
        {
            auth.freshness_window_secs = duration_setting("assertion.freshness_window", &window)?;
        }

        auth.shared_secret = secret_from(store, &[ENV_SHARED_SECRET, ENV_SHARED_SECRET_ALIAS])
            .map(SharedSecret::new)
            .transpose()
            .map_err(|e| invalid(ENV_SHARED_SECRET, &e))?;
        auth.signing_secret = secret_from(store, &[ENV_SIGNING_SECRET, ENV_SIGNING_SECRET_ALIAS])
            .map(SigningSecret::new)
            .transpose()
            .map_err(|e| invalid(ENV_SIGNING_SECRET, &e))?;

        let redirect_url = override_or(store, ENV_REDIRECT_URL, raw.redirect_url);
        let cookie = cookie_options(raw.cookie, auth.session_ttl_secs)?;

        Ok(Self {
            auth,
            redirect_url,
            cookie,
        })
    }

    /// Fail unless both secrets are present.
    pub fn require_secrets(&self) -> Result<(), ConfigError> {
        if self.auth.shared_secret.is_none() {
            return Err(ConfigError::MissingSecret(ENV_SHARED_SECRET));
        }
        if self.auth.signing_secret.is_none() {
            return Err(ConfigError::MissingSecret(ENV_SIGNING_SECRET));
        }
        Ok(())
    }

    pub fn auth_flow(&self) -> Result<AuthFlow, AuthError> {
        AuthFlow::new(&self.auth)
    }
}

fn override_or(store: &dyn SecretStore, key: &str, file_value: Option<String>) -> Option<String> {
    store
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .or(file_value)
}

fn secret_from(store: &dyn SecretStore, keys: &[&str]) -> Option<String> {
    for key in keys {
        match store.get(key) {
            Some(v) if !v.trim().is_empty() => return Some(v),
            Some(_) => warn!(key, "ignoring empty secret"),
            None => {}
        }
    }
    None
}

fn cookie_options(raw: RawCookie, session_ttl: u64) -> Result<CookieOptions, ConfigError> {
    let defaults = CookieOptions::default();
    let same_site = match raw.same_site {
        Some(v) => SameSite::parse(&v).ok_or_else(|| ConfigError::InvalidValue {
            key: "cookie.same_site".to_string(),
            message: format!("expected strict, lax or none, got {v:?}"),
        })?,
        None => defaults.same_site,
    };
    let max_age = match raw.max_age {
        Some(v) => duration_setting("cookie.max_age", &v)?,
        None => session_ttl,
    };

    let opts = CookieOptions {
        name: raw.name.unwrap_or(defaults.name),
        path: raw.path.unwrap_or(defaults.path),
        domain: raw.domain,
        secure: raw.secure.unwrap_or(defaults.secure),
        http_only: raw.http_only.unwrap_or(defaults.http_only),
        same_site,
        max_age_seconds: Some(max_age),
        use_host_prefix: raw.use_host_prefix.unwrap_or(defaults.use_host_prefix),
    };
    opts.cookie_name().map_err(|e| invalid("cookie", &e))?;
    Ok(opts)
}

fn duration_setting(key: &str, value: &str) -> Result<u64, ConfigError> {
    let secs = parse_ttl(value).map_err(|message| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    })?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(secs)
}

fn invalid(key: &str, err: &AuthError) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: err.to_string(),
    }
}

/// Parse a duration such as `7d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_ttl(ttl: &str) -> Result<u64, String> {
    let s = ttl.trim().to_lowercase();
    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s.as_str(), 's'),
    };
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        _ => return Err(format!("invalid duration unit in {ttl:?}; use s, m, h or d")),
    };
    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {ttl:?}"))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| format!("duration too large: {ttl:?}"))
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("tglogin")
    } else {
        PathBuf::from(".tglogin")
    }
}

/// Write the commented config template into `dir`. Existing files are kept unless `force`.
pub fn write_default_config(dir: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(CONFIG_FILE);
    if force || !path.exists() {
        fs::write(&path, include_str!("../../../docs/tglogin/tglogin.toml.example")).map_err(
            |source| ConfigError::Io {
                path: path.clone(),
                source,
            },
        )?;
    }
    Ok(path)
}
