use std::sync::Arc;
use std::thread;

use serde_json::json;
use tglogin_auth::{
    AssertionFields, AssertionVerifier, AuthConfig, AuthError, AuthFlow, CookieOptions,
    SharedSecret, SigningSecret, build_set_cookie, extract_bearer, fields_from_query,
    session_from_cookie_header, with_token,
};

const T: u64 = 1_700_000_000;
const BOT_SECRET: &str = "bot-secret";

fn flow() -> AuthFlow {
    AuthFlow::new(&AuthConfig {
        shared_secret: Some(SharedSecret::new(BOT_SECRET).unwrap()),
        signing_secret: Some(SigningSecret::new("jwt-secret").unwrap()),
        ..AuthConfig::default()
    })
    .unwrap()
}

/// Widget payload as it arrives in a JSON body, signed like the widget would.
fn widget_payload(auth_date: u64) -> AssertionFields {
    let mut fields: AssertionFields = serde_json::from_value(json!({
        "id": 12345,
        "first_name": "Ada",
        "auth_date": auth_date,
    }))
    .unwrap();
    let verifier = AssertionVerifier::new(&SharedSecret::new(BOT_SECRET).unwrap()).unwrap();
    let hash = verifier.sign(&fields);
    fields.insert("hash".into(), hash.into());
    fields
}

#[test]
fn ada_gets_a_session() {
    let flow = flow();
    let issued = flow.issue_session(widget_payload(T), T).unwrap();

    let claim = flow.check_session(issued.token.as_str(), T).unwrap();
    assert_eq!(
        serde_json::to_value(&claim).unwrap(),
        json!({"telegramId": 12345, "name": "Ada", "username": null, "photo": null})
    );
    assert_eq!(
        serde_json::to_value(&issued).unwrap()["user"],
        serde_json::to_value(&claim).unwrap()
    );
}

#[test]
fn stale_assertion_is_expired() {
    let err = flow()
        .issue_session(widget_payload(T - 90_000), T)
        .unwrap_err();
    assert_eq!(err, AuthError::Expired { age_seconds: 90_000 });
    assert_eq!(err.status_code(), 401);
}

#[test]
fn zeroed_hash_is_signature_mismatch() {
    let mut fields = widget_payload(T);
    fields.insert("hash".into(), "0".repeat(64).into());
    let err = flow().issue_session(fields, T).unwrap_err();
    assert_eq!(err, AuthError::SignatureMismatch);
    assert_eq!(err.kind(), "signature_mismatch");
}

#[test]
fn missing_id_is_bad_request() {
    let mut fields = widget_payload(T);
    fields.remove("id");
    let err = flow().issue_session(fields, T).unwrap_err();
    assert_eq!(err, AuthError::MissingField("id".into()));
    assert_eq!(err.status_code(), 400);
}

#[test]
fn query_string_delivery() {
    let verifier = AssertionVerifier::new(&SharedSecret::new(BOT_SECRET).unwrap()).unwrap();
    let unsigned = fields_from_query(&format!(
        "id=42&first_name=Grace&last_name=Hopper&username=amazing_grace&auth_date={T}"
    ));
    let hash = verifier.sign(&unsigned);
    let query = format!(
        "id=42&first_name=Grace&last_name=Hopper&username=amazing_grace&auth_date={T}&hash={hash}"
    );

    let issued = flow().issue_session(fields_from_query(&query), T + 5).unwrap();
    assert_eq!(issued.user.name(), "Grace Hopper");
    assert_eq!(issued.user.username(), Some("amazing_grace"));
    assert_eq!(issued.user.photo(), None);
}

#[test]
fn bearer_round_trip_through_headers() {
    let flow = flow();
    let issued = flow.issue_session(widget_payload(T), T).unwrap();

    let header = format!("Bearer {}", issued.token);
    let status = flow.session_status(extract_bearer(&header), T + 60).unwrap();
    assert!(status.logged_in);
    assert_eq!(status.user.unwrap().telegram_id(), 12345);

    let opts = CookieOptions::default();
    let set_cookie = build_set_cookie(&issued.token, &opts, T).unwrap();
    let cookie_pair = set_cookie.split(';').next().unwrap();
    let status = flow
        .session_status(session_from_cookie_header(cookie_pair, &opts), T + 60)
        .unwrap();
    assert!(status.logged_in);

    let redirect = with_token("https://app.example/", &issued.token).unwrap();
    assert!(redirect.ends_with(issued.token.as_str()));
}

#[test]
fn tampered_token_reports_logged_out() {
    let flow = flow();
    let issued = flow.issue_session(widget_payload(T), T).unwrap();
    let mut token = issued.token.into_inner();
    token.push('x');
    assert_eq!(flow.check_session(&token, T), Err(AuthError::BadSignature));
    assert!(!flow.session_status(Some(&token), T).unwrap().logged_in);
}

#[test]
fn concurrent_duplicate_submissions_are_independent() {
    let flow = Arc::new(flow());
    let good = widget_payload(T);
    let mut bad = widget_payload(T);
    bad.insert("first_name".into(), "Mallory".into());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let flow = Arc::clone(&flow);
            let fields = if i % 2 == 0 { good.clone() } else { bad.clone() };
            thread::spawn(move || flow.issue_session(fields, T))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first_token = results[0].as_ref().unwrap().token.clone();
    for (i, result) in results.iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(result.as_ref().unwrap().token, first_token);
        } else {
            assert_eq!(result, &Err(AuthError::SignatureMismatch));
        }
    }
}
