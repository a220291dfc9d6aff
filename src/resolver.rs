//! Link and name resolution
//!
//! Turns one source link (or a bare project name) into a [`Preliminary`]: the
//! plugin metadata plus the candidate download URLs of the first version that
//! fits the session's platform and game version.

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

use crate::providers::ProviderRegistry;
use crate::types::{ErrorTag, PluginInfo, Preliminary, Request, Status, Version};

/// How deep the resolver may follow external version URLs
pub const MAX_EXTERNAL_DEPTH: u8 = 1;

/// What to resolve
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    /// Page URL to probe first
    pub link: Option<String>,
    /// Project name to probe when no provider handled the link
    pub name: Option<String>,
}

impl Lookup {
    /// Resolve by link only
    pub fn link(link: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            name: None,
        }
    }

    /// Resolve by project name only
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            link: None,
            name: Some(name.into()),
        }
    }
}

/// Resolves lookups against the provider registry
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<ProviderRegistry>,
}

impl Resolver {
    /// Create a resolver over a registry
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// The registry probed by this resolver
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolve a lookup for the platform and game version of `request`
    ///
    /// Provider failures never abort resolution; they are recorded in the
    /// result's failed attempts. The result is an error only when no provider
    /// knew the input or no version passed the gates.
    pub async fn resolve(&self, request: &Request, lookup: &Lookup) -> Preliminary {
        self.resolve_at_depth(request, lookup, 0).await
    }

    fn resolve_at_depth<'a>(
        &'a self,
        request: &'a Request,
        lookup: &'a Lookup,
        depth: u8,
    ) -> BoxFuture<'a, Preliminary> {
        Box::pin(async move {
            let mut result = Preliminary::new(self.registry.names());

            let Some(info) = self.probe(lookup, &mut result).await else {
                result.status = Status::Error;
                result.message = "none of the providers were able to handle the link".to_string();
                return result;
            };

            let versions = info.versions.clone();
            result.plugin_info = Some(info);

            for version in &versions {
                if !self.version_fits(request, version) {
                    continue;
                }

                if !version.is_external {
                    result.status = Status::Success;
                    result.message.clear();
                    result.certain = true;
                    result.links = [(version.url.clone(), true)].into_iter().collect();
                    return result;
                }

                if depth >= MAX_EXTERNAL_DEPTH {
                    continue;
                }

                if version.url.is_empty() {
                    result.status = Status::Error;
                    result.message = "no external URL found for external resource".to_string();
                    continue;
                }

                // Authors often point at another first-class host
                let nested = self
                    .resolve_at_depth(request, &Lookup::link(version.url.clone()), depth + 1)
                    .await;
                if nested.is_success() {
                    result.status = Status::Success;
                    result.message.clear();
                    result.plugin_info = nested.plugin_info;
                    result.links = nested.links;
                    result.certain = nested.certain;
                    return result;
                }

                for provider in self.registry.external_providers() {
                    match provider.jar_links_from(&version.url).await {
                        Ok(links) if !links.is_empty() => {
                            result.status = Status::Success;
                            result.message.clear();
                            result.certain = false;
                            result.links = links.into_iter().map(|link| (link, true)).collect();
                            return result;
                        }
                        Ok(_) => {
                            result.record_failure(provider.name(), "link", "no links found");
                        }
                        Err(e) => {
                            debug!(provider = provider.name(), url = %version.url, error = %e, "External provider failed");
                            result.record_failure(provider.name(), "link", e.to_string());
                        }
                    }
                }
            }

            result.status = Status::Error;
            result.error = Some(ErrorTag::NoSuitableVersion);
            if result.message.is_empty() {
                result.message = format!(
                    "no version matches {} {}",
                    request.platform.display_name(),
                    request.game_version
                );
            }
            result
        })
    }

    /// Ask first-class providers by link, then by name; the first success wins
    async fn probe(&self, lookup: &Lookup, result: &mut Preliminary) -> Option<PluginInfo> {
        if let Some(link) = &lookup.link {
            for provider in self.registry.plugin_providers() {
                match provider.info_from_link(link).await {
                    Ok(info) => return Some(info),
                    Err(e) => {
                        debug!(provider = provider.name(), link = %link, error = %e, "Provider could not handle link");
                        result.record_failure(provider.name(), "link", e.to_string());
                    }
                }
            }
        }

        if let Some(name) = &lookup.name {
            for provider in self.registry.plugin_providers() {
                match provider.info_from_name(name).await {
                    Ok(info) => return Some(info),
                    Err(e) => {
                        debug!(provider = provider.name(), name = %name, error = %e, "Provider could not find name");
                        result.record_failure(provider.name(), "name", e.to_string());
                    }
                }
            }
        }

        None
    }

    /// Loader and game-version gates
    fn version_fits(&self, request: &Request, version: &Version) -> bool {
        if !version.supports_platform(request.platform) {
            return false;
        }

        match request.parsed_game_version() {
            Some(game_version) => version.supports_game_version(&game_version),
            // Only versions that do not declare tested versions can pass without a parseable target
            None => version
                .game_versions
                .as_ref()
                .is_none_or(|tested| tested.is_empty()),
        }
    }
}
