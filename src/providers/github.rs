//! Code-forge releases provider, backed by the GitHub REST API

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::{ExternalProvider, ProviderResult, fetch_json};
use crate::error::ProviderError;
use crate::utils::regex_group;

/// GitHub API base URL
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[allow(clippy::expect_used)]
static RELEASES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https://(?:www\.)?github\.com/(?P<owner>[^/]+)/(?P<repo>[^/]+)/releases(?:/tag/(?P<tag>[^/?#]+))?",
    )
    .expect("github releases pattern is valid")
});

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// External provider for `github.com/<owner>/<repo>/releases[/tag/<tag>]` links
#[derive(Debug, Clone)]
pub struct GithubProvider {
    client: reqwest::Client,
    token: Option<String>,
    api_base: String,
}

impl GithubProvider {
    /// Provider against the public GitHub API
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

    async fn fetch_release(&self, path: &str) -> ProviderResult<Release> {
        let mut request = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        fetch_json(request).await
    }

    /// The tagged release if the link names one and it exists, otherwise the latest
    async fn release_from_link(&self, link: &str) -> ProviderResult<Release> {
        let owner = regex_group(&RELEASES_RE, "owner", link);
        let repo = regex_group(&RELEASES_RE, "repo", link);
        let (Some(owner), Some(repo)) = (owner, repo) else {
            return Err(ProviderError::Unrecognized("repository"));
        };

        if let Some(tag) = regex_group(&RELEASES_RE, "tag", link) {
            let path = format!(
                "/repos/{owner}/{repo}/releases/tags/{}",
                urlencoding::encode(&tag)
            );
            match self.fetch_release(&path).await {
                Ok(release) => return Ok(release),
                Err(e) => {
                    tracing::debug!(owner, repo, tag, error = %e, "Tagged release lookup failed, falling back to latest");
                }
            }
        }

        self.fetch_release(&format!("/repos/{owner}/{repo}/releases/latest"))
            .await
    }
}

#[async_trait]
impl ExternalProvider for GithubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn jar_links_from(&self, link: &str) -> ProviderResult<Vec<String>> {
        let release = self.release_from_link(link).await?;

        let links: Vec<String> = release
            .assets
            .into_iter()
            .filter(|asset| asset.name.contains(".jar"))
            .map(|asset| asset.browser_download_url)
            .collect();

        if links.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "release {} has no JAR assets",
                release.tag_name
            )));
        }

        Ok(links)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release(tag: &str) -> serde_json::Value {
        serde_json::json!({
            "tag_name": tag,
            "assets": [
                {"name": "Essentials-2.20.1.jar", "browser_download_url": format!("https://dl/{tag}/Essentials.jar")},
                {"name": "checksums.txt", "browser_download_url": "https://dl/checksums.txt"},
                {"name": "EssentialsChat-2.20.1.jar", "browser_download_url": format!("https://dl/{tag}/EssentialsChat.jar")}
            ]
        })
    }

    #[tokio::test]
    async fn test_latest_release_jar_assets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/EssentialsX/Essentials/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release("2.20.1")))
            .mount(&server)
            .await;

        let provider = GithubProvider::with_api_base(reqwest::Client::new(), None, server.uri());
        let links = provider
            .jar_links_from("https://github.com/EssentialsX/Essentials/releases")
            .await
            .unwrap();

        assert_eq!(
            links,
            vec![
                "https://dl/2.20.1/Essentials.jar".to_string(),
                "https://dl/2.20.1/EssentialsChat.jar".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_tagged_release_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/releases/tags/v1.0"))
            .and(header("Authorization", "Bearer ghp_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release("v1.0")))
            .mount(&server)
            .await;

        let provider = GithubProvider::with_api_base(
            reqwest::Client::new(),
            Some("ghp_token".to_string()),
            server.uri(),
        );
        let links = provider
            .jar_links_from("https://github.com/owner/repo/releases/tag/v1.0")
            .await
            .unwrap();
        assert_eq!(links[0], "https://dl/v1.0/Essentials.jar");
    }

    #[tokio::test]
    async fn test_missing_tag_falls_back_to_latest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/releases/tags/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release("latest")))
            .mount(&server)
            .await;

        let provider = GithubProvider::with_api_base(reqwest::Client::new(), None, server.uri());
        let links = provider
            .jar_links_from("https://github.com/owner/repo/releases/tag/gone")
            .await
            .unwrap();
        assert_eq!(links[0], "https://dl/latest/Essentials.jar");
    }

    #[tokio::test]
    async fn test_release_without_jars_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "v2",
                "assets": [{"name": "source.zip", "browser_download_url": "https://dl/source.zip"}]
            })))
            .mount(&server)
            .await;

        let provider = GithubProvider::with_api_base(reqwest::Client::new(), None, server.uri());
        let err = provider
            .jar_links_from("https://github.com/owner/repo/releases")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unrecognized_link() {
        let provider = GithubProvider::new(reqwest::Client::new(), None);
        let err = provider
            .jar_links_from("https://example.com/download.jar")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unable to parse repository from link");
    }
}
