use anyhow::Context;
use clap::Args;
use serde_json::json;
use tglogin_auth::{
    AUTH_DATE_FIELD, AssertionFields, AssertionVerifier, FieldValue, HASH_FIELD, fields_to_query,
    unix_now,
};
use tglogin_core::Config;

#[derive(Debug, Args)]
pub struct SignArgs {
    /// Widget field as KEY=VALUE (repeatable); `auth_date` defaults to now
    #[arg(long = "field", value_parser = crate::parse_key_val, required = true)]
    fields: Vec<(String, String)>,

    /// Use this Unix time as the default `auth_date`
    #[arg(long)]
    now: Option<u64>,
}

pub fn cmd_sign(config: &Config, args: SignArgs, json: bool) -> anyhow::Result<()> {
    let secret = config
        .auth
        .shared_secret
        .as_ref()
        .context("SHARED_SECRET (or BOT_TOKEN) is not set")?;
    let verifier = AssertionVerifier::new(secret)?;

    let mut fields: AssertionFields = args
        .fields
        .into_iter()
        .map(|(k, v)| (k, FieldValue::Text(v)))
        .collect();
    fields.remove(HASH_FIELD);
    fields
        .entry(AUTH_DATE_FIELD.to_string())
        .or_insert_with(|| FieldValue::Text(args.now.unwrap_or_else(unix_now).to_string()));

    let hash = verifier.sign(&fields);
    fields.insert(HASH_FIELD.to_string(), FieldValue::Text(hash.clone()));
    let query = fields_to_query(&fields);

    crate::pout(
        json,
        json!({ "hash": hash, "fields": fields, "query": query }),
        &query,
    )
}
