mod commands;
mod logging;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tglogin_core::{Config, EnvSecretStore, default_config_dir};

use crate::commands::config::{ConfigCommands, cmd_config};
use crate::commands::session::{CheckArgs, IssueArgs, cmd_check, cmd_issue};
use crate::commands::sign::{SignArgs, cmd_sign};

#[derive(Debug, Parser)]
#[command(
    name = "tglogin",
    about = "Verify Telegram login widget payloads and manage session tokens"
)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Verify a widget payload and issue a session token
    Issue(IssueArgs),
    /// Check a session token (exits non-zero when not logged in)
    Check(CheckArgs),
    /// Compute the widget `hash` for a payload (development aid)
    Sign(SignArgs),
    /// Configuration template and validation
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init()?;

    let cfg_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    tracing::debug!(config_dir = %cfg_dir.display(), "resolved config directory");

    match cli.command {
        Commands::Issue(args) => cmd_issue(&load_config(&cfg_dir)?, args, cli.json),
        Commands::Check(args) => cmd_check(&load_config(&cfg_dir)?, args, cli.json),
        Commands::Sign(args) => cmd_sign(&load_config(&cfg_dir)?, args, cli.json),
        Commands::Config { command } => cmd_config(command, &cfg_dir, cli.json),
    }
}

fn load_config(dir: &Path) -> anyhow::Result<Config> {
    Ok(Config::load(dir, &EnvSecretStore)?)
}

pub fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}

pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| "must be KEY=VALUE".to_string())?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
