use anyhow::{Context, bail, ensure};
use clap::{ArgGroup, Args};
use serde_json::json;
use tglogin_auth::{
    AssertionFields, FieldValue, build_set_cookie, extract_bearer, fields_from_query,
    session_from_cookie_header, unix_now, with_token,
};
use tglogin_core::Config;

#[derive(Debug, Args)]
pub struct IssueArgs {
    /// Widget field as KEY=VALUE (repeatable)
    #[arg(
        long = "field",
        value_parser = crate::parse_key_val,
        required_unless_present = "query"
    )]
    fields: Vec<(String, String)>,

    /// Raw widget query string, e.g. "id=1&first_name=Ada&auth_date=...&hash=..."
    #[arg(long, conflicts_with = "fields")]
    query: Option<String>,

    /// Also print the front-end redirect URL carrying the token
    #[arg(long)]
    redirect: bool,

    /// Also print a Set-Cookie header value carrying the token
    #[arg(long)]
    cookie: bool,

    /// Evaluate as of this Unix time instead of now
    #[arg(long)]
    now: Option<u64>,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").args(["token", "authorization", "cookie"])))]
pub struct CheckArgs {
    /// Raw session token
    #[arg(long)]
    token: Option<String>,

    /// Authorization header value ("Bearer <token>")
    #[arg(long)]
    authorization: Option<String>,

    /// Cookie header value
    #[arg(long)]
    cookie: Option<String>,

    /// Evaluate as of this Unix time instead of now
    #[arg(long)]
    now: Option<u64>,
}

pub fn cmd_issue(config: &Config, args: IssueArgs, json: bool) -> anyhow::Result<()> {
    let fields: AssertionFields = match args.query {
        Some(query) => fields_from_query(&query),
        None => args
            .fields
            .into_iter()
            .map(|(k, v)| (k, FieldValue::Text(v)))
            .collect(),
    };

    let flow = config.auth_flow()?;
    let now = args.now.unwrap_or_else(unix_now);
    let issued = match flow.issue_session(fields, now) {
        Ok(issued) => issued,
        Err(e) => bail!("{e} [{} / HTTP {}]", e.kind(), e.status_code()),
    };

    let mut value = serde_json::to_value(&issued)?;
    let mut lines = vec![issued.token.to_string()];

    if args.redirect {
        let base = config
            .redirect_url
            .as_deref()
            .context("--redirect needs redirect_url in tglogin.toml or REDIRECT_URL")?;
        let url = with_token(base, &issued.token)?;
        lines.push(format!("Location: {url}"));
        value["redirect"] = json!(url);
    }

    if args.cookie {
        let set_cookie = build_set_cookie(&issued.token, &config.cookie, now)?;
        lines.push(format!("Set-Cookie: {set_cookie}"));
        value["setCookie"] = json!(set_cookie);
    }

    crate::pout(json, value, &lines.join("\n"))
}

pub fn cmd_check(config: &Config, args: CheckArgs, json: bool) -> anyhow::Result<()> {
    let token = if let Some(token) = args.token.as_deref() {
        Some(token)
    } else if let Some(header) = args.authorization.as_deref() {
        extract_bearer(header)
    } else if let Some(header) = args.cookie.as_deref() {
        session_from_cookie_header(header, &config.cookie)
    } else {
        None
    };

    let flow = config.auth_flow()?;
    let status = flow.session_status(token, args.now.unwrap_or_else(unix_now))?;

    let text = match &status.user {
        Some(user) => match user.username() {
            Some(username) => format!(
                "Logged in as {} (@{username}, id {})",
                user.name(),
                user.telegram_id()
            ),
            None => format!("Logged in as {} (id {})", user.name(), user.telegram_id()),
        },
        None => "Not logged in".to_string(),
    };
    crate::pout(json, serde_json::to_value(&status)?, &text)?;

    ensure!(status.logged_in, "session is not valid");
    Ok(())
}
