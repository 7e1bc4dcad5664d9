use std::path::Path;

use clap::Subcommand;
use serde_json::json;
use tglogin_core::{Config, EnvSecretStore, write_default_config};

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a commented tglogin.toml template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Load the configuration and report whether both secrets are present
    Check,
}

fn presence(set: bool) -> &'static str {
    if set { "set" } else { "missing" }
}

pub fn cmd_config(command: ConfigCommands, dir: &Path, json: bool) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let path = write_default_config(dir, force)?;
            crate::pout(
                json,
                json!({ "ok": true, "path": path }),
                &format!("Config template at {}", path.display()),
            )
        }
        ConfigCommands::Check => {
            let config = Config::load(dir, &EnvSecretStore)?;
            let shared = presence(config.auth.shared_secret.is_some());
            let signing = presence(config.auth.signing_secret.is_some());
            let cookie_name = config.cookie.cookie_name()?;

            crate::pout(
                json,
                json!({
                    "shared_secret": shared,
                    "signing_secret": signing,
                    "session_ttl_secs": config.auth.session_ttl_secs,
                    "freshness_window_secs": config.auth.freshness_window_secs,
                    "redirect_url": config.redirect_url,
                    "cookie_name": cookie_name,
                }),
                &format!(
                    "shared secret: {shared}\nsigning secret: {signing}\nsession ttl: {}s\nfreshness window: {}s",
                    config.auth.session_ttl_secs, config.auth.freshness_window_secs
                ),
            )?;

            config.require_secrets()?;
            Ok(())
        }
    }
}
