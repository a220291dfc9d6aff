//! Resources aggregator for SpigotMC, backed by the Spiget API

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::{PluginProvider, ProviderResult, fetch_json};
use crate::error::ProviderError;
use crate::types::{PluginInfo, ProviderKind, Version};
use crate::utils::regex_group;

/// Spiget API base URL
pub const DEFAULT_API_BASE: &str = "https://api.spiget.org/v2";

/// Public site the canonical links point to
const SITE_BASE: &str = "https://spigotmc.org";

#[allow(clippy::expect_used)]
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(?:www\.)?spigotmc\.org/resources/.+?\.(?P<id>[0-9]*)")
        .expect("spigot link pattern is valid")
});

#[derive(Debug, Default, Deserialize)]
struct SpigetIcon {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpigetFile {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    external_url: Option<String>,
}

impl SpigetFile {
    fn is_external(&self) -> bool {
        self.kind == "external"
    }
}

#[derive(Debug, Deserialize)]
struct SpigetVersionRef {
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpigetResource {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    contributors: String,
    #[serde(default)]
    premium: bool,
    #[serde(default)]
    tested_versions: Option<Vec<String>>,
    #[serde(default)]
    icon: SpigetIcon,
    #[serde(default)]
    file: SpigetFile,
    #[serde(default)]
    version: Option<SpigetVersionRef>,
}

/// Plugin provider for `spigotmc.org/resources/...` links
#[derive(Debug, Clone)]
pub struct SpigotProvider {
    client: reqwest::Client,
    api_base: String,
}

impl SpigotProvider {
    /// Provider against the public Spiget API
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_api_base(client, DEFAULT_API_BASE)
    }

    /// Provider against a custom API base (used by tests)
    pub fn with_api_base(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn to_plugin_info(&self, resource: SpigetResource) -> PluginInfo {
        let is_external = resource.file.is_external();
        let url = if is_external {
            resource.file.external_url.clone().unwrap_or_default()
        } else {
            format!("{}/resources/{}/download", self.api_base, resource.id)
        };

        let version_id = resource
            .version
            .as_ref()
            .map(|v| v.id)
            .unwrap_or(resource.id);

        let icon_link = match resource.icon.url.as_str() {
            "" => String::new(),
            url if url.starts_with("http") => url.to_string(),
            relative => format!("https://www.spigotmc.org/{relative}"),
        };

        PluginInfo {
            provider: ProviderKind::Spigot,
            id: resource.id.to_string(),
            link: format!("{SITE_BASE}/resources/{}", resource.id),
            name: resource.name,
            description: resource.tag,
            contributors: resource.contributors,
            premium: resource.premium,
            versions: vec![Version {
                id: version_id.to_string(),
                link: format!("{SITE_BASE}/resources/{}/updates", resource.id),
                is_external,
                url,
                platforms: None,
                game_versions: resource.tested_versions,
            }],
            icon_link,
        }
    }
}

#[async_trait]
impl PluginProvider for SpigotProvider {
    fn name(&self) -> &'static str {
        "spigot"
    }

    async fn info_from_link(&self, link: &str) -> ProviderResult<PluginInfo> {
        let id = regex_group(&LINK_RE, "id", link).ok_or(ProviderError::Unrecognized("Spigot ID"))?;

        let resource: SpigetResource = fetch_json(
            self.client
                .get(format!("{}/resources/{}", self.api_base, id)),
        )
        .await?;

        Ok(self.to_plugin_info(resource))
    }

    async fn info_from_name(&self, name: &str) -> ProviderResult<PluginInfo> {
        let url = format!(
            "{}/search/resources/{}",
            self.api_base,
            urlencoding::encode(name)
        );
        let resources: Vec<SpigetResource> = fetch_json(
            self.client
                .get(url)
                .query(&[("field", "name"), ("sort", "-downloads")]),
        )
        .await?;

        resources
            .into_iter()
            .find(|resource| resource.name.eq_ignore_ascii_case(name))
            .map(|resource| self.to_plugin_info(resource))
            .ok_or_else(|| ProviderError::NotFound("no project found with this exact name".into()))
    }
}
