//! Projects hub provider, backed by the Modrinth API

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::{PluginProvider, ProviderResult, fetch_json};
use crate::error::ProviderError;
use crate::types::{PluginInfo, ProviderKind, Version};
use crate::utils::regex_group;

/// Modrinth API base URL
pub const DEFAULT_API_BASE: &str = "https://api.modrinth.com/v2";

const SITE_BASE: &str = "https://modrinth.com";

/// How many search hits to scan for an exact title match
const SEARCH_LIMIT: &str = "20";

#[allow(clippy::expect_used)]
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(?:www\.)?modrinth\.com/(?:plugin|mod)/(?P<slug>[^/?#]+)")
        .expect("modrinth link pattern is valid")
});

#[derive(Debug, Deserialize)]
struct ModrinthProject {
    id: String,
    slug: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    icon_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModrinthFile {
    url: String,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Deserialize)]
struct ModrinthVersion {
    id: String,
    #[serde(default)]
    files: Vec<ModrinthFile>,
    #[serde(default)]
    loaders: Option<Vec<String>>,
    #[serde(default)]
    game_versions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    slug: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

/// Plugin provider for `modrinth.com/plugin/...` and `modrinth.com/mod/...` links
#[derive(Debug, Clone)]
pub struct ModrinthProvider {
    client: reqwest::Client,
    token: Option<String>,
    api_base: String,
}

impl ModrinthProvider {
    /// Provider against the public Modrinth API
    pub fn new(client: reqwest::Client, token: Option<String>) -> Self {
        Self::with_api_base(client, token, DEFAULT_API_BASE)
    }

    /// Provider against a custom API base (used by tests)
    pub fn with_api_base(
        client: reqwest::Client,
        token: Option<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.api_base, path));
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        }
    }

    async fn project_info(&self, slug: &str) -> ProviderResult<PluginInfo> {
        let slug = urlencoding::encode(slug);
        let project: ModrinthProject = fetch_json(self.get(&format!("/project/{slug}"))).await?;
        let versions: Vec<ModrinthVersion> =
            fetch_json(self.get(&format!("/project/{slug}/version"))).await?;

        let versions = versions
            .into_iter()
            .filter_map(|version| {
                let primary = version.files.into_iter().find(|file| file.primary)?;
                Some(Version {
                    link: format!("{SITE_BASE}/{}/version/{}", project.slug, version.id),
                    id: version.id,
                    is_external: false,
                    url: primary.url,
                    platforms: version.loaders,
                    game_versions: version.game_versions,
                })
            })
            .collect();

        Ok(PluginInfo {
            provider: ProviderKind::Modrinth,
            link: format!("{SITE_BASE}/plugin/{}", project.slug),
            id: project.id,
            name: project.title,
            description: project.description,
            contributors: project.team,
            premium: false,
            versions,
            icon_link: project.icon_url.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl PluginProvider for ModrinthProvider {
    fn name(&self) -> &'static str {
        "modrinth"
    }

    async fn info_from_link(&self, link: &str) -> ProviderResult<PluginInfo> {
        let slug =
            regex_group(&LINK_RE, "slug", link).ok_or(ProviderError::Unrecognized("Modrinth slug"))?;
        self.project_info(&slug).await
    }

    async fn info_from_name(&self, name: &str) -> ProviderResult<PluginInfo> {
        let search: SearchResponse = fetch_json(
            self.get("/search")
                .query(&[("query", name), ("limit", SEARCH_LIMIT)]),
        )
        .await?;

        let hit = search
            .hits
            .into_iter()
            .find(|hit| hit.title.eq_ignore_ascii_case(name))
            .ok_or_else(|| ProviderError::NotFound("no project found with this exact name".into()))?;

        tracing::debug!(name, slug = %hit.slug, "Found project by name");
        self.project_info(&hit.slug).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_project(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/project/luckperms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "Vebnzrzj",
                "slug": "luckperms",
                "title": "LuckPerms",
                "description": "A permissions plugin",
                "team": "team-1",
                "icon_url": "https://cdn.modrinth.com/icon.png"
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/project/luckperms/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "v2",
                    "files": [
                        {"url": "https://cdn.modrinth.com/extra.jar", "primary": false},
                        {"url": "https://cdn.modrinth.com/lp-fabric.jar", "primary": true}
                    ],
                    "loaders": ["fabric"],
                    "game_versions": ["1.20.4"]
                },
                {
                    "id": "v1",
                    "files": [{"url": "https://cdn.modrinth.com/no-primary.jar", "primary": false}],
                    "loaders": ["paper"],
                    "game_versions": ["1.20.4"]
                }
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_info_from_link_keeps_primary_files_only() {
        let server = MockServer::start().await;
        mount_project(&server).await;

        let provider = ModrinthProvider::with_api_base(reqwest::Client::new(), None, server.uri());
        let info = provider
            .info_from_link("https://modrinth.com/plugin/luckperms")
            .await
            .unwrap();

        assert_eq!(info.provider, ProviderKind::Modrinth);
        assert_eq!(info.id, "Vebnzrzj");
        assert_eq!(info.name, "LuckPerms");
        assert_eq!(info.contributors, "team-1");
        assert_eq!(info.versions.len(), 1);

        let version = &info.versions[0];
        assert_eq!(version.url, "https://cdn.modrinth.com/lp-fabric.jar");
        assert_eq!(version.link, "https://modrinth.com/luckperms/version/v2");
        assert_eq!(version.platforms.as_deref(), Some(&["fabric".to_string()][..]));
    }

    #[tokio::test]
    async fn test_mod_links_are_recognized() {
        let server = MockServer::start().await;
        mount_project(&server).await;

        let provider = ModrinthProvider::with_api_base(reqwest::Client::new(), None, server.uri());
        let info = provider
            .info_from_link("https://modrinth.com/mod/luckperms/versions")
            .await
            .unwrap();
        assert_eq!(info.name, "LuckPerms");
    }

    #[tokio::test]
    async fn test_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/project/secret"))
            .and(header("Authorization", "mrp_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "x", "slug": "secret", "title": "Secret"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/project/secret/version"))
            .and(header("Authorization", "mrp_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let provider = ModrinthProvider::with_api_base(
            reqwest::Client::new(),
            Some("mrp_token".to_string()),
            server.uri(),
        );
        let info = provider
            .info_from_link("https://modrinth.com/plugin/secret")
            .await
            .unwrap();
        assert!(info.versions.is_empty());
    }

    #[tokio::test]
    async fn test_info_from_name_picks_exact_title() {
        let server = MockServer::start().await;
        mount_project(&server).await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("query", "luckperms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hits": [
                    {"slug": "luckperms-addon", "title": "LuckPerms Addon"},
                    {"slug": "luckperms", "title": "LuckPerms"}
                ]
            })))
            .mount(&server)
            .await;

        let provider = ModrinthProvider::with_api_base(reqwest::Client::new(), None, server.uri());
        let info = provider.info_from_name("luckperms").await.unwrap();
        assert_eq!(info.id, "Vebnzrzj");
    }

    #[tokio::test]
    async fn test_unrecognized_link() {
        let provider = ModrinthProvider::new(reqwest::Client::new(), None);
        let err = provider
            .info_from_link("https://spigotmc.org/resources/vault.34315")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unable to parse Modrinth slug from link");
    }
}
