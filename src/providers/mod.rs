//! Upstream hosts that plugins and mods are resolved from
//!
//! Two capability sets exist:
//! - [`PluginProvider`]: first-class hosts with an API that returns plugin metadata and versions
//! - [`ExternalProvider`]: fallbacks that turn an arbitrary URL into candidate JAR URLs
//!
//! The [`ProviderRegistry`] keeps both as ordered lists. The order is the probe order.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::Credentials;
use crate::error::{Error, ProviderError};
use crate::types::PluginInfo;

mod direct_link;
mod github;
mod modrinth;
mod spigot;

pub use direct_link::DirectLinkProvider;
pub use github::GithubProvider;
pub use modrinth::ModrinthProvider;
pub use spigot::SpigotProvider;

/// Result type for a single provider call
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A first-class host with an API describing plugins
///
/// Implementations must be safe to call concurrently; the preliminary and
/// post-processing stages probe several links at once.
#[async_trait]
pub trait PluginProvider: Send + Sync {
    /// Stable provider name, used as the key in failed attempts
    fn name(&self) -> &'static str;

    /// Resolve a page URL on this host to plugin metadata
    ///
    /// Returns [`ProviderError::Unrecognized`] without any network call when
    /// the URL does not belong to this host.
    async fn info_from_link(&self, link: &str) -> ProviderResult<PluginInfo>;

    /// Look up a plugin by its exact (case-insensitive) project name
    async fn info_from_name(&self, name: &str) -> ProviderResult<PluginInfo>;
}

/// A fallback that finds JAR downloads behind an arbitrary URL
#[async_trait]
pub trait ExternalProvider: Send + Sync {
    /// Stable provider name, used as the key in failed attempts
    fn name(&self) -> &'static str;

    /// Candidate JAR URLs behind `link`, in preference order
    async fn jar_links_from(&self, link: &str) -> ProviderResult<Vec<String>>;
}

/// Ordered provider lists
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    plugin: Vec<Arc<dyn PluginProvider>>,
    external: Vec<Arc<dyn ExternalProvider>>,
}

impl ProviderRegistry {
    /// Build a registry from explicit provider lists
    pub fn new(
        plugin: Vec<Arc<dyn PluginProvider>>,
        external: Vec<Arc<dyn ExternalProvider>>,
    ) -> Self {
        Self { plugin, external }
    }

    /// The production registry
    ///
    /// First-class: spigot, then modrinth. External: github, then direct links.
    pub fn from_credentials(client: reqwest::Client, credentials: &Credentials) -> Self {
        let modrinth_token = credentials.modrinth.get().map(str::to_string);
        let github_token = credentials.github.get().map(str::to_string);

        Self::new(
            vec![
                Arc::new(SpigotProvider::new(client.clone())),
                Arc::new(ModrinthProvider::new(client.clone(), modrinth_token)),
            ],
            vec![
                Arc::new(GithubProvider::new(client.clone(), github_token)),
                Arc::new(DirectLinkProvider::new(client)),
            ],
        )
    }

    /// First-class providers in probe order
    pub fn plugin_providers(&self) -> &[Arc<dyn PluginProvider>] {
        &self.plugin
    }

    /// External providers in probe order
    pub fn external_providers(&self) -> &[Arc<dyn ExternalProvider>] {
        &self.external
    }

    /// Every provider name, first-class before external
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugin
            .iter()
            .map(|p| p.name())
            .chain(self.external.iter().map(|p| p.name()))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Build the HTTP client shared by providers and the JAR downloader
pub fn http_client(credentials: &Credentials) -> crate::error::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(credentials.user_agent.clone())
        .build()
        .map_err(Error::Network)
}

/// Send a request and decode a JSON body, rejecting anything but 200
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> ProviderResult<T> {
    let response = request.send().await?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(ProviderError::Api {
            status: status.as_u16(),
        });
    }

    Ok(response.json::<T>().await?)
}
