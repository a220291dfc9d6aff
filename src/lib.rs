//! # pack-builder
//!
//! Session-based builder for Minecraft plugin and mod packs.
//!
//! A client creates a session from a list of plugin or mod links, then drives
//! it through three stages:
//! - **Preliminary** - resolve every link to project metadata and a set of
//!   download candidates
//! - **Process** - download and verify the archives, then find and fetch
//!   missing `plugin.yml` dependencies
//! - **Package** - zip the downloads into one pack
//!
//! Progress is pushed to websocket subscribers as events.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pack_builder::{Config, PackBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let builder = PackBuilder::new(Config::default()).await?;
//!
//!     let request = serde_json::from_value(serde_json::json!({
//!         "platform": "spigot",
//!         "game_version": "1.20.4",
//!         "links": {
//!             "5f0c6f0e-8f3a-4c55-9a43-1f1e0c5b9b11": "https://www.spigotmc.org/resources/vault.34315/"
//!         }
//!     }))?;
//!     let id = builder.create_session(request).await?;
//!
//!     let mut events = builder.session(id).await?.subscribe();
//!     builder.start_preliminary(id).await?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{}", event.name());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API and websocket server
pub mod api;
/// Session registry and stage runner
pub mod builder;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Websocket event framing
pub mod events;
/// Archive download and verification
pub mod jar;
/// `plugin.yml` lookup inside archives
pub mod manifest;
/// Zip packaging
pub mod packager;
/// Plugin and external providers
pub mod providers;
/// Link and name resolution
pub mod resolver;
/// Sessions and their event channels
pub mod session;
/// Core data model
pub mod types;
/// Utility functions
pub mod utils;
/// Lenient semver parsing and tested-version checks
pub mod version;

// Re-export commonly used types
pub use builder::{PackBuilder, PublishedPackage};
pub use config::Config;
pub use error::{
    ApiError, Error, ErrorDetail, JarError, ProviderError, Result, StageError, ToHttpStatus,
};
pub use events::{ClientCommand, ServerEvent, ToggleLink};
pub use session::{Session, SessionHandle};
pub use types::{LinkState, Mode, Platform, Request, Status};

/// Serve the API until a termination signal arrives, then save the recovery snapshot.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use pack_builder::{Config, PackBuilder, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let builder = PackBuilder::new(Config::default()).await?;
///     run_with_shutdown(builder).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(builder: PackBuilder) -> Result<()> {
    let config = builder.get_config();
    let builder = std::sync::Arc::new(builder);

    api::start_api_server(builder.clone(), config, wait_for_signal()).await?;

    builder.save_snapshot().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
