//! Front-end redirect carrying a freshly issued credential.

use tglogin_api::{AuthError, SessionCredential};
use url::Url;

/// Query parameter the front-end reads the credential from.
pub const TOKEN_PARAM: &str = "token";

/// Append `token=<credential>` to `base_url`, keeping any existing query and fragment.
pub fn with_token(base_url: &str, credential: &SessionCredential) -> Result<String, AuthError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AuthError::Configuration(format!("invalid redirect url: {e}")))?;
    url.query_pairs_mut()
        .append_pair(TOKEN_PARAM, credential.as_str());
    Ok(url.into())
}
