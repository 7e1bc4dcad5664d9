use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the tglogin CLI.
///
/// Everything goes to stderr so `--json` output on stdout stays parseable.
/// The level is controlled via `RUST_LOG`, defaulting to `info` for the
/// tglogin crates:
/// - RUST_LOG=debug tglogin issue ...   (per-stage flow events)
/// - RUST_LOG=warn tglogin check ...    (rejections only)
pub fn init() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("tglogin=info,tglogin_auth=info,tglogin_core=info")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
