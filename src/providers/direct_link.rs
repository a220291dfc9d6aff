//! Direct JAR links on arbitrary hosts

use async_trait::async_trait;

use super::{ExternalProvider, ProviderResult};
use crate::error::ProviderError;

const JAR_CONTENT_TYPE: &str = "application/java-archive";

/// External provider that accepts a URL if it serves a JAR itself
///
/// A HEAD request with a JAR content type is enough. Otherwise the first
/// bytes of a GET response must start with the zip signature `PK`.
#[derive(Debug, Clone)]
pub struct DirectLinkProvider {
    client: reqwest::Client,
}

impl DirectLinkProvider {
    /// Create a provider using the shared client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn head_is_jar(&self, link: &str) -> ProviderResult<bool> {
        let response = self.client.head(link).send().await?;
        let is_jar = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().eq_ignore_ascii_case(JAR_CONTENT_TYPE))
            .unwrap_or(false);
        Ok(is_jar)
    }

    async fn body_starts_with_zip_signature(&self, link: &str) -> ProviderResult<bool> {
        let mut response = self.client.get(link).send().await?;

        let mut prefix = Vec::with_capacity(4);
        while prefix.len() < 4 {
            match response.chunk().await? {
                Some(chunk) => prefix.extend_from_slice(&chunk[..chunk.len().min(4 - prefix.len())]),
                None => break,
            }
        }

        Ok(prefix.len() == 4 && prefix.starts_with(b"PK"))
    }
}

#[async_trait]
impl ExternalProvider for DirectLinkProvider {
    fn name(&self) -> &'static str {
        "direct_download"
    }

    async fn jar_links_from(&self, link: &str) -> ProviderResult<Vec<String>> {
        if self.head_is_jar(link).await? || self.body_starts_with_zip_signature(link).await? {
            return Ok(vec![link.to_string()]);
        }
        Err(ProviderError::NotAJar)
    }
}
