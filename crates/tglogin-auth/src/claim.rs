//! Identity claim projected from a verified assertion.

use serde::Serialize;
use tglogin_api::{FieldValue, TelegramId};

use crate::assertion::VerifiedAssertion;

/// Verified identity carried inside a session token.
///
/// Absent optional attributes are `None` and serialize as JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaim {
    telegram_id: TelegramId,
    name: String,
    username: Option<String>,
    photo: Option<String>,
}

impl IdentityClaim {
    /// Project a verified assertion into a claim.
    ///
    /// `name` is `first_name` and `last_name` joined by a space and trimmed.
    /// Empty optional fields count as absent.
    pub fn from_verified(verified: &VerifiedAssertion) -> Self {
        let assertion = verified.assertion();
        let text = |field: &str| {
            assertion
                .field(field)
                .filter(|v| !v.is_empty())
                .map(FieldValue::to_string)
        };

        let first = text("first_name").unwrap_or_default();
        let last = text("last_name").unwrap_or_default();

        Self {
            telegram_id: assertion.id(),
            name: format!("{first} {last}").trim().to_string(),
            username: text("username"),
            photo: text("photo_url"),
        }
    }

    pub(crate) fn from_parts(
        telegram_id: TelegramId,
        name: String,
        username: Option<String>,
        photo: Option<String>,
    ) -> Self {
        Self {
            telegram_id,
            name,
            username,
            photo,
        }
    }

    pub fn telegram_id(&self) -> TelegramId {
        self.telegram_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn photo(&self) -> Option<&str> {
        self.photo.as_deref()
    }
}
