//! JAR downloads with file-type verification

use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::JarError;
use crate::types::Download;

/// Local file header signature every zip (and so every JAR) starts with
pub const JAR_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Downloads candidate URLs and checks that the result is a JAR
#[derive(Debug, Clone)]
pub struct JarDownloader {
    client: reqwest::Client,
}

impl JarDownloader {
    /// Create a downloader using the shared client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download `url` to `dir/file_name`, overwriting, and verify it
    ///
    /// Never fails: every problem is reported in the returned record.
    pub async fn download_and_verify(&self, url: &str, dir: &Path, file_name: &str) -> Download {
        let path = dir.join(file_name);
        match self.fetch_to(url, &path).await {
            Ok(size) => {
                debug!(url, path = %path.display(), size, "Downloaded JAR");
                Download::success(path, size)
            }
            Err(e) => {
                warn!(url, path = %path.display(), error = %e, "JAR download failed");
                Download::error(e.to_string())
            }
        }
    }

    /// Try candidates in order until one verifies
    ///
    /// Returns the first success, or the last failure. An empty candidate list
    /// yields an error record.
    pub async fn download_first(&self, urls: &[String], dir: &Path, file_name: &str) -> Download {
        let mut last = None;
        for url in urls {
            let result = self.download_and_verify(url, dir, file_name).await;
            if result.is_success() {
                return result;
            }
            last = Some(result);
        }
        last.unwrap_or_else(|| Download::error("none of the downloads worked"))
    }

    async fn fetch_to(&self, url: &str, path: &Path) -> Result<u64, JarError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JarError::Status(status.as_u16()));
        }

        let write_error = |source| JarError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(path).await.map_err(write_error)?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(write_error)?;
        }
        file.flush().await.map_err(write_error)?;
        drop(file);

        verify_jar(path).await
    }
}

/// Check a file's size and magic bytes, returning its size
pub async fn verify_jar(path: &Path) -> Result<u64, JarError> {
    let size = tokio::fs::metadata(path)
        .await
        .map_err(JarError::Inspect)?
        .len();
    if size == 0 {
        return Err(JarError::Empty);
    }

    let file = tokio::fs::File::open(path)
        .await
        .map_err(JarError::Inspect)?;
    let mut magic = Vec::with_capacity(JAR_MAGIC.len());
    file.take(JAR_MAGIC.len() as u64)
        .read_to_end(&mut magic)
        .await
        .map_err(JarError::Inspect)?;

    if magic != JAR_MAGIC {
        return Err(JarError::BadMagic(magic));
    }

    Ok(size)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jar_body(extra: usize) -> Vec<u8> {
        let mut body = JAR_MAGIC.to_vec();
        body.extend(std::iter::repeat_n(0xAB, extra));
        body
    }

    #[tokio::test]
    async fn test_download_and_verify_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ex.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jar_body(100)))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let downloader = JarDownloader::new(reqwest::Client::new());
        let result = downloader
            .download_and_verify(&format!("{}/ex.jar", server.uri()), temp_dir.path(), "Example.jar")
            .await;

        assert_eq!(result.status, Status::Success);
        assert_eq!(result.size, 104);
        assert_eq!(result.path, temp_dir.path().join("Example.jar"));
        let written = std::fs::read(&result.path).unwrap();
        assert_eq!(&written[..4], &JAR_MAGIC);
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let downloader = JarDownloader::new(reqwest::Client::new());
        let result = downloader
            .download_and_verify(&format!("{}/empty.jar", server.uri()), temp_dir.path(), "Empty.jar")
            .await;

        assert_eq!(result.status, Status::Error);
        assert_eq!(result.message, "file is empty");
    }

    #[tokio::test]
    async fn test_html_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let downloader = JarDownloader::new(reqwest::Client::new());
        let result = downloader
            .download_and_verify(&format!("{}/page", server.uri()), temp_dir.path(), "Page.jar")
            .await;

        assert_eq!(result.status, Status::Error);
        assert!(result.message.starts_with("not a valid JAR file"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_bytes(jar_body(10)))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let downloader = JarDownloader::new(reqwest::Client::new());
        let result = downloader
            .download_and_verify(&format!("{}/premium.jar", server.uri()), temp_dir.path(), "P.jar")
            .await;

        assert_eq!(result.status, Status::Error);
        assert_eq!(result.message, "error downloading: status code 403");
    }

    #[tokio::test]
    async fn test_download_first_falls_through_to_next_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a jar".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/good.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jar_body(8)))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let downloader = JarDownloader::new(reqwest::Client::new());
        let urls = vec![
            format!("{}/bad.jar", server.uri()),
            format!("{}/good.jar", server.uri()),
        ];
        let result = downloader
            .download_first(&urls, temp_dir.path(), "Plugin.jar")
            .await;

        assert!(result.is_success());
        assert_eq!(result.size, 12);
    }

    #[tokio::test]
    async fn test_download_first_without_candidates() {
        let temp_dir = TempDir::new().unwrap();
        let downloader = JarDownloader::new(reqwest::Client::new());
        let result = downloader
            .download_first(&[], temp_dir.path(), "Plugin.jar")
            .await;
        assert_eq!(result.message, "none of the downloads worked");
    }

    #[tokio::test]
    async fn test_verify_jar_short_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("short.jar");
        std::fs::write(&path, b"PK").unwrap();
        assert!(matches!(
            verify_jar(&path).await.unwrap_err(),
            JarError::BadMagic(_)
        ));
    }
}
