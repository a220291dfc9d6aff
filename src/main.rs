//! pack-builder server
//!
//! Loads `config.yml` from the current directory (writing the default template
//! when missing), restores sessions from the recovery snapshot and serves the
//! API until SIGINT/SIGTERM.

use pack_builder::config::CONFIG_FILE_NAME;
use pack_builder::{Config, PackBuilder, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load_or_init(CONFIG_FILE_NAME)?;
    let builder = PackBuilder::new(config).await?;

    if let Err(e) = builder.restore_snapshot().await {
        tracing::warn!(
            path = %builder.snapshot_path().display(),
            error = %e,
            "Could not restore sessions, starting empty"
        );
    }

    run_with_shutdown(builder).await?;
    Ok(())
}
