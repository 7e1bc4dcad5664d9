//! Login widget assertion parsing and verification.
//!
//! The widget signs its payload with `HMAC-SHA256(SHA256(bot_token), check_string)`
//! where the check string is every field except `hash`, sorted by name and
//! rendered as `name=value` lines joined by `\n`.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tglogin_api::{AssertionFields, AuthError, FieldValue, TelegramId, UnixSeconds};

use crate::error::VerificationError;
use crate::secret::SharedSecret;

type HmacSha256 = Hmac<Sha256>;

pub const HASH_FIELD: &str = "hash";
pub const ID_FIELD: &str = "id";
pub const AUTH_DATE_FIELD: &str = "auth_date";

/// Maximum assertion age in seconds. An assertion exactly this old is still fresh.
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 86_400;

/// A structurally valid assertion. Not yet authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAssertion {
    fields: AssertionFields,
    hash: String,
    id: TelegramId,
    auth_date: i64,
}

impl RawAssertion {
    /// Validate field presence and shape.
    ///
    /// `hash` is split off; `id` and `auth_date` stay in the payload since they
    /// take part in the check string.
    pub fn parse(mut fields: AssertionFields) -> Result<Self, VerificationError> {
        let hash = fields
            .remove(HASH_FIELD)
            .filter(|v| !v.is_empty())
            .ok_or(VerificationError::MissingField { field: HASH_FIELD })?
            .to_string();

        let id = fields
            .get(ID_FIELD)
            .and_then(FieldValue::as_integer)
            .ok_or(VerificationError::MissingField { field: ID_FIELD })?;

        let auth_date = fields
            .get(AUTH_DATE_FIELD)
            .and_then(FieldValue::as_integer)
            .ok_or(VerificationError::MissingField {
                field: AUTH_DATE_FIELD,
            })?;

        Ok(Self {
            fields,
            hash,
            id,
            auth_date,
        })
    }

    /// Parse an `application/x-www-form-urlencoded` query string.
    pub fn from_query(query: &str) -> Result<Self, VerificationError> {
        Self::parse(fields_from_query(query))
    }

    pub fn id(&self) -> TelegramId {
        self.id
    }

    pub fn auth_date(&self) -> i64 {
        self.auth_date
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Canonical HMAC input for this assertion.
    pub fn check_string(&self) -> String {
        check_string(&self.fields)
    }
}

/// Decode a query string into widget fields. A repeated key keeps its last value.
pub fn fields_from_query(query: &str) -> AssertionFields {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), FieldValue::Text(v.into_owned())))
        .collect()
}

/// Encode widget fields as a query string, in field-name order.
pub fn fields_to_query(fields: &AssertionFields) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in fields {
        out.append_pair(name, &value.to_string());
    }
    out.finish()
}

/// Build the check string from a field map, skipping `hash`.
///
/// `AssertionFields` is a `BTreeMap<String, _>`, so iteration is already in
/// byte order of the field names.
pub fn check_string(fields: &AssertionFields) -> String {
    fields
        .iter()
        .filter(|(name, _)| name.as_str() != HASH_FIELD)
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// An assertion whose signature and freshness have been checked.
///
/// Only [`AssertionVerifier::verify`] produces one.
#[derive(Debug, Clone)]
pub struct VerifiedAssertion {
    inner: RawAssertion,
}

impl VerifiedAssertion {
    pub fn assertion(&self) -> &RawAssertion {
        &self.inner
    }
}

/// Checks widget assertions against the bot token.
#[derive(Clone)]
pub struct AssertionVerifier {
    mac: HmacSha256,
    freshness_window: u64,
}

impl AssertionVerifier {
    pub fn new(secret: &SharedSecret) -> Result<Self, AuthError> {
        let key = Sha256::digest(secret.expose());
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| AuthError::Configuration(format!("cannot key assertion HMAC: {e}")))?;
        Ok(Self {
            mac,
            freshness_window: DEFAULT_FRESHNESS_WINDOW_SECS,
        })
    }

    #[must_use]
    pub fn with_freshness_window(mut self, seconds: u64) -> Self {
        self.freshness_window = seconds;
        self
    }

    pub fn freshness_window(&self) -> u64 {
        self.freshness_window
    }

    /// Authenticate `assertion` as of `now`.
    ///
    /// Freshness is checked before the signature. Assertions dated in the
    /// future pass the freshness check and still need a matching signature.
    pub fn verify(
        &self,
        assertion: RawAssertion,
        now: UnixSeconds,
    ) -> Result<VerifiedAssertion, VerificationError> {
        let now = i64::try_from(now).unwrap_or(i64::MAX);
        let age_seconds = now.saturating_sub(assertion.auth_date);
        let window = i64::try_from(self.freshness_window).unwrap_or(i64::MAX);
        if age_seconds > window {
            return Err(VerificationError::Expired { age_seconds });
        }

        let expected = self.digest(&assertion.check_string());
        let matches: bool = expected.as_bytes().ct_eq(assertion.hash.as_bytes()).into();
        if !matches {
            return Err(VerificationError::SignatureMismatch);
        }

        Ok(VerifiedAssertion { inner: assertion })
    }

    /// Compute the `hash` the widget would attach to `fields`.
    pub fn sign(&self, fields: &AssertionFields) -> String {
        self.digest(&check_string(fields))
    }

    fn digest(&self, check_string: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(check_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for AssertionVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionVerifier")
            .field("freshness_window", &self.freshness_window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T: u64 = 1_700_000_000;

    fn verifier() -> AssertionVerifier {
        AssertionVerifier::new(&SharedSecret::new("bot-secret").unwrap()).unwrap()
    }

    fn ada(auth_date: u64) -> AssertionFields {
        AssertionFields::from([
            ("id".to_string(), FieldValue::Integer(12345)),
            ("first_name".to_string(), FieldValue::from("Ada")),
            (
                "auth_date".to_string(),
                FieldValue::Integer(i64::try_from(auth_date).unwrap()),
            ),
        ])
    }

    fn signed(v: &AssertionVerifier, mut fields: AssertionFields) -> AssertionFields {
        let hash = v.sign(&fields);
        fields.insert("hash".to_string(), FieldValue::Text(hash));
        fields
    }

    #[test]
    fn check_string_is_sorted_and_excludes_hash() {
        let mut fields = ada(T);
        fields.insert("hash".into(), "abc".into());
        fields.insert("username".into(), "ada".into());
        assert_eq!(
            check_string(&fields),
            "auth_date=1700000000\nfirst_name=Ada\nid=12345\nusername=ada"
        );
    }

    #[test]
    fn check_string_sorts_by_bytes() {
        let fields = AssertionFields::from([
            ("b".to_string(), FieldValue::from("2")),
            ("B".to_string(), FieldValue::from("1")),
            ("a_b".to_string(), FieldValue::from("3")),
            ("a".to_string(), FieldValue::from("4")),
        ]);
        assert_eq!(check_string(&fields), "B=1\na=4\na_b=3\nb=2");
    }

    #[test]
    fn known_digest() {
        // HMAC-SHA256(SHA256("bot-secret"), "auth_date=1700000000\nfirst_name=Ada\nid=12345")
        let v = verifier();
        let key = Sha256::digest(b"bot-secret");
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(b"auth_date=1700000000\nfirst_name=Ada\nid=12345");
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(v.sign(&ada(T)), expected);
        assert_eq!(expected.len(), 64);
        assert_eq!(expected, expected.to_lowercase());
    }

    #[test]
    fn accepts_signed_assertion() {
        let v = verifier();
        let raw = RawAssertion::parse(signed(&v, ada(T))).unwrap();
        let verified = v.verify(raw, T).unwrap();
        assert_eq!(verified.assertion().id(), 12345);
    }

    #[test]
    fn freshness_boundary() {
        let v = verifier();
        let at_limit = RawAssertion::parse(signed(&v, ada(T - 86_400))).unwrap();
        assert!(v.verify(at_limit, T).is_ok());

        let past_limit = RawAssertion::parse(signed(&v, ada(T - 86_401))).unwrap();
        assert_eq!(
            v.verify(past_limit, T).unwrap_err(),
            VerificationError::Expired {
                age_seconds: 86_401
            }
        );
    }

    #[test]
    fn stale_assertion_reports_expired_before_signature() {
        let v = verifier();
        let mut fields = ada(T - 90_000);
        fields.insert("hash".into(), "0".repeat(64).into());
        let raw = RawAssertion::parse(fields).unwrap();
        assert!(matches!(
            v.verify(raw, T),
            Err(VerificationError::Expired { .. })
        ));
    }

    #[test]
    fn all_zero_hash_is_rejected() {
        let v = verifier();
        let mut fields = ada(T);
        fields.insert("hash".into(), "0".repeat(64).into());
        let raw = RawAssertion::parse(fields).unwrap();
        assert_eq!(
            v.verify(raw, T).unwrap_err(),
            VerificationError::SignatureMismatch
        );
    }

    #[test]
    fn uppercase_hash_is_rejected() {
        let v = verifier();
        let mut fields = signed(&v, ada(T));
        let upper = fields["hash"].to_string().to_uppercase();
        fields.insert("hash".into(), upper.into());
        let raw = RawAssertion::parse(fields).unwrap();
        assert_eq!(
            v.verify(raw, T).unwrap_err(),
            VerificationError::SignatureMismatch
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let other = AssertionVerifier::new(&SharedSecret::new("other").unwrap()).unwrap();
        let raw = RawAssertion::parse(signed(&other, ada(T))).unwrap();
        assert_eq!(
            verifier().verify(raw, T).unwrap_err(),
            VerificationError::SignatureMismatch
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let v = verifier();
        let mut fields = signed(&v, ada(T));
        fields.insert("first_name".into(), "Eve".into());
        let raw = RawAssertion::parse(fields).unwrap();
        assert_eq!(
            v.verify(raw, T).unwrap_err(),
            VerificationError::SignatureMismatch
        );
    }

    #[test]
    fn missing_fields() {
        let mut no_hash = ada(T);
        no_hash.remove("hash");
        assert_eq!(
            RawAssertion::parse(no_hash).unwrap_err(),
            VerificationError::MissingField { field: "hash" }
        );

        let mut no_id = ada(T);
        no_id.remove("id");
        no_id.insert("hash".into(), "00".into());
        assert_eq!(
            RawAssertion::parse(no_id).unwrap_err(),
            VerificationError::MissingField { field: "id" }
        );

        let mut empty_hash = ada(T);
        empty_hash.insert("hash".into(), "".into());
        assert_eq!(
            RawAssertion::parse(empty_hash).unwrap_err(),
            VerificationError::MissingField { field: "hash" }
        );
    }

    #[test]
    fn non_numeric_auth_date_is_missing_field() {
        let mut fields = ada(T);
        fields.insert("auth_date".into(), "yesterday".into());
        fields.insert("hash".into(), "00".into());
        assert_eq!(
            RawAssertion::parse(fields).unwrap_err(),
            VerificationError::MissingField { field: "auth_date" }
        );
    }

    #[test]
    fn text_and_integer_fields_sign_identically() {
        let v = verifier();
        let text = AssertionFields::from([
            ("id".to_string(), FieldValue::from("12345")),
            ("first_name".to_string(), FieldValue::from("Ada")),
            ("auth_date".to_string(), FieldValue::from(T.to_string())),
        ]);
        assert_eq!(v.sign(&text), v.sign(&ada(T)));
    }

    #[test]
    fn query_string_round_trip() {
        let v = verifier();
        let mut fields = ada(T);
        fields.insert("last_name".into(), "Lovelace Byron".into());
        fields.insert("photo_url".into(), "https://t.me/i/userpic/320/ada.jpg".into());
        let hash = v.sign(&fields);

        let query = format!(
            "?id=12345&first_name=Ada&last_name=Lovelace+Byron&photo_url=https%3A%2F%2Ft.me%2Fi%2Fuserpic%2F320%2Fada.jpg&auth_date={T}&hash={hash}"
        );
        let raw = RawAssertion::from_query(&query).unwrap();
        assert_eq!(raw.field("last_name"), Some(&FieldValue::from("Lovelace Byron")));
        assert!(v.verify(raw, T + 10).is_ok());
    }

    #[test]
    fn signed_fields_survive_query_encoding() {
        let v = verifier();
        let mut fields = ada(T);
        fields.insert("last_name".into(), "Lovelace Byron".into());
        fields.insert(HASH_FIELD.into(), v.sign(&fields).into());

        let query = fields_to_query(&fields);
        assert!(query.contains("last_name=Lovelace+Byron"));
        let raw = RawAssertion::from_query(&query).unwrap();
        assert!(v.verify(raw, T).is_ok());
    }

    #[test]
    fn future_dated_assertion_still_needs_signature() {
        let v = verifier();
        let raw = RawAssertion::parse(signed(&v, ada(T + 3_600))).unwrap();
        assert!(v.verify(raw, T).is_ok());
    }

    #[test]
    fn custom_freshness_window() {
        let v = verifier().with_freshness_window(60);
        let raw = RawAssertion::parse(signed(&v, ada(T - 61))).unwrap();
        assert!(matches!(
            v.verify(raw, T),
            Err(VerificationError::Expired { age_seconds: 61 })
        ));
    }

    #[test]
    fn debug_does_not_leak_key_material() {
        let rendered = format!("{:?}", verifier());
        assert!(rendered.starts_with("AssertionVerifier"));
        assert!(!rendered.contains("bot-secret"));
    }

    proptest! {
        #[test]
        fn any_single_hash_char_flip_is_rejected(pos in 0usize..64, replacement in "[0-9a-f]") {
            let v = verifier();
            let fields = signed(&v, ada(T));
            let hash = fields["hash"].to_string();
            let mut chars: Vec<char> = hash.chars().collect();
            let new_char = replacement.chars().next().unwrap();
            prop_assume!(chars[pos] != new_char);
            chars[pos] = new_char;

            let mut tampered = fields.clone();
            tampered.insert("hash".into(), chars.into_iter().collect::<String>().into());
            let raw = RawAssertion::parse(tampered).unwrap();
            prop_assert_eq!(v.verify(raw, T).unwrap_err(), VerificationError::SignatureMismatch);
        }

        #[test]
        fn insertion_order_does_not_matter(
            extra in proptest::collection::btree_map("[a-z_]{1,12}", "[ -~]{0,16}", 0..6),
            reverse in any::<bool>(),
        ) {
            let v = verifier();
            let mut pairs: Vec<(String, FieldValue)> = ada(T).into_iter().collect();
            pairs.extend(
                extra
                    .into_iter()
                    .filter(|(k, _)| !["id", "auth_date", "hash", "first_name"].contains(&k.as_str()))
                    .map(|(k, val)| (k, FieldValue::Text(val))),
            );
            let forward: AssertionFields = pairs.iter().cloned().collect();
            if reverse {
                pairs.reverse();
            } else {
                let mid = pairs.len() / 2;
                pairs.rotate_left(mid);
            }
            let shuffled: AssertionFields = pairs.into_iter().collect();

            prop_assert_eq!(check_string(&forward), check_string(&shuffled));
            prop_assert_eq!(v.sign(&forward), v.sign(&shuffled));

            let raw = RawAssertion::parse(signed(&v, shuffled)).unwrap();
            prop_assert!(v.verify(raw, T).is_ok());
        }

        #[test]
        fn freshness_matches_window(age in 0u64..200_000) {
            let v = verifier();
            let raw = RawAssertion::parse(signed(&v, ada(T - age))).unwrap();
            let result = v.verify(raw, T);
            if age <= 86_400 {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(
                    matches!(result, Err(VerificationError::Expired { .. })),
                    "expected Expired for age {}",
                    age
                );
            }
        }
    }
}
