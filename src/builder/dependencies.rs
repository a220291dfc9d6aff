//! Dependency engine for plugin packs.
//!
//! Reads the `plugin.yml` of every downloaded JAR, then makes sure each
//! declared hard dependency is either another plugin of the pack or can be
//! found and downloaded by name. Dependencies of dependencies are not followed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::events::ServerEvent;
use crate::manifest;
use crate::resolver::Lookup;
use crate::session::SessionHandle;
use crate::types::{Dependency, Download, LinkId, PostProcessing, Preliminary, Request};
use crate::utils;

use super::PackBuilder;

/// Names read from the manifests of the downloaded plugins
#[derive(Debug, Default)]
struct ManifestScan {
    /// Lowercased plugin name per link
    names: BTreeMap<LinkId, String>,
    /// Lowercased hard dependencies per link, only for links declaring some
    depends: BTreeMap<LinkId, Vec<String>>,
}

impl ManifestScan {
    fn provides(&self, name: &str) -> bool {
        self.names.values().any(|plugin| plugin == name)
    }
}

impl PackBuilder {
    /// Resolve the hard dependencies of every downloaded plugin
    ///
    /// Writes `post_processing` on each link that declares dependencies and
    /// emits a `process_step` for it. Returns `false` when the session was
    /// deleted meanwhile.
    pub(crate) async fn check_dependencies(&self, handle: &SessionHandle) -> bool {
        let session_id = handle.id();
        let (request, downloads_directory, downloaded) = handle
            .read(|session| {
                let downloaded: Vec<(LinkId, PathBuf)> = session
                    .links
                    .values()
                    .filter_map(|state| {
                        state
                            .download
                            .as_ref()
                            .filter(|d| d.is_success())
                            .map(|d| (state.id, d.path.clone()))
                    })
                    .collect();
                (
                    session.request.clone(),
                    session.downloads_directory.clone(),
                    downloaded,
                )
            })
            .await;

        let scan = scan_manifests(downloaded).await;
        let cancel = handle.cancellation();

        let mut memo: HashMap<String, Dependency> = HashMap::new();
        let mut results: Vec<(LinkId, PostProcessing)> = Vec::with_capacity(scan.depends.len());

        for (parent, names) in &scan.depends {
            let mut dependencies = Vec::with_capacity(names.len());

            for name in names {
                if cancel.is_cancelled() {
                    return false;
                }

                if let Some(known) = memo.get(name) {
                    dependencies.push(known.clone());
                    continue;
                }

                let mut dependency = Dependency {
                    name: name.clone(),
                    ..Default::default()
                };

                if scan.provides(name) {
                    dependency.other_plugin = true;
                } else {
                    tracing::info!(
                        session_id = %session_id,
                        plugin = scan.names.get(parent).map(String::as_str).unwrap_or_default(),
                        dependency = %name,
                        "Missing dependency"
                    );

                    let found = tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!(session_id = %session_id, "Dependency check cancelled");
                            return false;
                        }
                        found = self.find_dependency(&request, name, &downloads_directory) => found,
                    };
                    (dependency.search, dependency.download) = found;
                }

                memo.insert(name.clone(), dependency.clone());
                dependencies.push(dependency);
            }

            results.push((*parent, PostProcessing { dependencies }));
        }

        let updated = handle
            .update(|session| {
                results
                    .into_iter()
                    .filter_map(|(link_id, post_processing)| {
                        session.links.get_mut(&link_id).map(|state| {
                            state.post_processing = Some(post_processing);
                            state.clone()
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .await;

        match updated {
            Ok(states) => {
                for state in states {
                    handle.emit(ServerEvent::ProcessStep(Box::new(state)));
                }
                true
            }
            Err(_) => false,
        }
    }
}

impl PackBuilder {
    /// Search a dependency by name and download it when found
    async fn find_dependency(
        &self,
        request: &Request,
        name: &str,
        downloads_directory: &Path,
    ) -> (Option<Preliminary>, Option<Download>) {
        let search = self.resolver.resolve(request, &Lookup::name(name)).await;
        if !search.is_success() {
            return (Some(search), None);
        }

        let stem = search.file_stem().unwrap_or(name);
        let file_name = format!("{}.jar", utils::sanitize_file_name(stem));
        let download = self
            .jars
            .download_first(&search.enabled_links(), downloads_directory, &file_name)
            .await;
        (Some(search), Some(download))
    }
}

/// Read the manifest of every downloaded JAR
///
/// Archives that cannot be read, lack a `plugin.yml` or declare no name are
/// skipped.
async fn scan_manifests(downloaded: Vec<(LinkId, PathBuf)>) -> ManifestScan {
    let mut scan = ManifestScan::default();

    for (link_id, path) in downloaded {
        let plugin = match manifest::read_manifest_blocking(&path).await {
            Ok(Some(plugin)) => plugin,
            Ok(None) => {
                tracing::debug!(link_id = %link_id, path = %path.display(), "No plugin.yml in archive");
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    link_id = %link_id,
                    path = %path.display(),
                    error = %e,
                    "Unable to parse plugin manifest"
                );
                continue;
            }
        };

        let name = plugin.normalized_name();
        if name.is_empty() {
            tracing::warn!(link_id = %link_id, "Plugin manifest has no name");
            continue;
        }

        let depends = plugin.normalized_depends();
        if !depends.is_empty() {
            scan.depends.insert(link_id, depends);
        }
        scan.names.insert(link_id, name);
    }

    scan
}
