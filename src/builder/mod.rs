//! Pack builder service split into focused submodules.
//!
//! The `PackBuilder` struct and its methods are organized by domain:
//! - [`control`] - Session registry, link toggles and package publishing
//! - [`preliminary`] - Link resolution stage
//! - [`process`] - Download stage followed by dependency checks
//! - [`dependencies`] - `plugin.yml` dependency engine
//! - [`package`] - Zip packaging stage
//! - [`recovery`] - `recover.json` snapshot save and restore

mod control;
mod dependencies;
mod package;
mod preliminary;
mod process;
mod recovery;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use recovery::SNAPSHOT_FILE;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::jar::JarDownloader;
use crate::providers::{self, ProviderRegistry};
use crate::resolver::Resolver;
use crate::session::SessionHandle;
use crate::types::{PackageId, SessionId, Stage};

/// At most this many links resolve or download at once per session
pub(crate) const STAGE_CONCURRENCY: usize = 5;

/// A package that can be fetched over HTTP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPackage {
    /// Owning session
    pub session_id: SessionId,
    /// Display name
    pub name: String,
    /// Archive location
    pub path: PathBuf,
}

/// Session registry and stage runner (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct PackBuilder {
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Live sessions by id
    pub(crate) sessions: Arc<RwLock<HashMap<SessionId, Arc<SessionHandle>>>>,
    /// Published packages by id
    pub(crate) downloads: Arc<RwLock<HashMap<PackageId, PublishedPackage>>>,
    /// Link and name resolution
    pub(crate) resolver: Resolver,
    /// Candidate downloads
    pub(crate) jars: JarDownloader,
    /// Serialises writes of the recovery snapshot
    pub(crate) snapshot_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for PackBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackBuilder")
            .field("working_directory", &self.config.working_directory)
            .field("providers", self.resolver.registry())
            .finish_non_exhaustive()
    }
}

impl PackBuilder {
    /// Create a builder with the default providers
    ///
    /// Creates the working directory and one HTTP client shared by every
    /// provider and download.
    pub async fn new(config: Config) -> Result<Self> {
        let client = providers::http_client(&config.credentials)?;
        let registry = ProviderRegistry::from_credentials(client.clone(), &config.credentials);
        Self::with_providers(config, registry, client).await
    }

    /// Create a builder over an explicit provider registry
    pub async fn with_providers(
        config: Config,
        registry: ProviderRegistry,
        client: reqwest::Client,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.working_directory)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create working directory '{}': {}",
                        config.working_directory.display(),
                        e
                    ),
                ))
            })?;

        tracing::info!(
            working_directory = %config.working_directory.display(),
            providers = ?registry.names().collect::<Vec<_>>(),
            "Pack builder initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            downloads: Arc::new(RwLock::new(HashMap::new())),
            resolver: Resolver::new(Arc::new(registry)),
            jars: JarDownloader::new(client),
            snapshot_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Base directory of every session
    pub fn working_directory(&self) -> &Path {
        &self.config.working_directory
    }

    /// Start the preliminary stage in the background
    ///
    /// Preconditions are checked before returning; the stage itself runs on
    /// its own task and reports through the session's events.
    pub async fn start_preliminary(&self, id: SessionId) -> Result<()> {
        let (handle, guard) = self.claim_stage(id, Stage::Preliminary).await?;
        let builder = self.clone();
        tokio::spawn(async move {
            builder.run_preliminary(&handle).await;
            drop(guard);
            builder.save_snapshot().await;
        });
        Ok(())
    }

    /// Start the download and dependency stages in the background
    pub async fn start_process(&self, id: SessionId) -> Result<()> {
        let (handle, guard) = self.claim_stage(id, Stage::Download).await?;
        let builder = self.clone();
        tokio::spawn(async move {
            builder.run_process(&handle).await;
            drop(guard);
            builder.save_snapshot().await;
        });
        Ok(())
    }

    /// Start the package stage in the background
    pub async fn start_package(&self, id: SessionId) -> Result<()> {
        let (handle, guard) = self.claim_stage(id, Stage::Packaged).await?;
        let builder = self.clone();
        tokio::spawn(async move {
            builder.run_package(&handle).await;
            drop(guard);
            builder.save_snapshot().await;
        });
        Ok(())
    }

    async fn claim_stage(
        &self,
        id: SessionId,
        stage: Stage,
    ) -> Result<(Arc<SessionHandle>, OwnedMutexGuard<()>)> {
        let handle = self.session(id).await?;
        let guard = handle.begin_stage(stage).await?;
        tracing::info!(session_id = %id, ?stage, "Stage started");
        Ok((handle, guard))
    }
}
