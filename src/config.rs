//! Configuration types for pack-builder
//!
//! The service reads `config.yml` from its working directory. When the file is
//! missing, the bundled template is written out and loaded instead.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

/// Default config template written on first start
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("config.dist.yml");

/// Default config file name, relative to the process working directory
pub const CONFIG_FILE_NAME: &str = "config.yml";

/// TLS settings for the web server
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub struct SslConfig {
    /// Serve over HTTPS
    #[serde(default)]
    pub enabled: bool,

    /// PEM certificate chain
    #[serde(default)]
    pub cert_path: PathBuf,

    /// PEM private key
    #[serde(default)]
    pub key_path: PathBuf,
}

/// Web server settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub struct WebConfig {
    /// Frontend origin (CORS and websocket origin check)
    #[serde(default = "default_frontend")]
    pub frontend: String,

    /// Listen address (default: "0.0.0.0")
    #[serde(default = "default_address")]
    pub address: String,

    /// Listen port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public URL of the service; empty means the listening endpoint
    #[serde(default)]
    pub public_url: String,

    /// Serve Swagger UI under `/api/swagger-ui` (default: false)
    #[serde(default)]
    pub swagger_ui: bool,

    /// TLS settings
    #[serde(default)]
    pub ssl: SslConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            frontend: default_frontend(),
            address: default_address(),
            port: default_port(),
            public_url: String::new(),
            swagger_ui: false,
            ssl: SslConfig::default(),
        }
    }
}

impl WebConfig {
    /// `address:port` as configured
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// The endpoint the server listens on, with scheme
    pub fn endpoint(&self) -> String {
        let scheme = if self.ssl.enabled { "https" } else { "http" };
        format!("{}://{}", scheme, self.listen_address())
    }

    /// Public URL, falling back to the listening endpoint
    pub fn public_url(&self) -> String {
        if self.public_url.is_empty() {
            self.endpoint()
        } else {
            self.public_url.trim_end_matches('/').to_string()
        }
    }
}

/// A single upstream API token
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TokenConfig {
    /// Token value, empty when unset
    #[serde(default)]
    pub token: String,
}

impl TokenConfig {
    /// The token if one is configured
    pub fn get(&self) -> Option<&str> {
        let token = self.token.trim();
        (!token.is_empty()).then_some(token)
    }
}

/// Credentials shared by all providers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub struct Credentials {
    /// User-Agent sent on every upstream request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Code-forge (GitHub) API token
    #[serde(default)]
    pub github: TokenConfig,

    /// CurseForge API token
    #[serde(default)]
    pub curseforge: TokenConfig,

    /// Projects-hub (Modrinth) API token
    #[serde(default)]
    pub modrinth: TokenConfig,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            github: TokenConfig::default(),
            curseforge: TokenConfig::default(),
            modrinth: TokenConfig::default(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Base folder for session directories and the recovery snapshot (default: ".")
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    /// Web server settings
    #[serde(default)]
    pub web: WebConfig,

    /// Upstream credentials
    #[serde(default)]
    pub credentials: Credentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_directory: default_working_directory(),
            web: WebConfig::default(),
            credentials: Credentials::default(),
        }
    }
}

impl Config {
    /// Parse a config document
    pub fn from_yaml(data: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config at `path`, writing the default template first if it does not exist
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Configuration not found, generating new");
                write_template(path)?;
                std::fs::read_to_string(path)?
            }
            Err(e) => return Err(Error::Io(e)),
        };

        Self::from_yaml(&data)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.web.port == 0 {
            return Err(Error::Config {
                message: "port must not be 0".to_string(),
                key: Some("web.port".to_string()),
            });
        }

        if self.web.ssl.enabled {
            if self.web.ssl.cert_path.as_os_str().is_empty() {
                return Err(Error::Config {
                    message: "ssl is enabled but no certificate path is set".to_string(),
                    key: Some("web.ssl.cert-path".to_string()),
                });
            }
            if self.web.ssl.key_path.as_os_str().is_empty() {
                return Err(Error::Config {
                    message: "ssl is enabled but no key path is set".to_string(),
                    key: Some("web.ssl.key-path".to_string()),
                });
            }
        }

        Ok(())
    }
}

#[cfg(unix)]
fn write_template(path: &Path) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o644)
        .open(path)?;
    file.write_all(DEFAULT_CONFIG_TEMPLATE.as_bytes())?;
    Ok(())
}

#[cfg(not(unix))]
fn write_template(path: &Path) -> Result<()> {
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(())
}

fn default_working_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_frontend() -> String {
    "http://localhost:5173".to_string()
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_user_agent() -> String {
    format!("pack-builder/{}", env!("CARGO_PKG_VERSION"))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_parses() {
        let config = Config::from_yaml(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.frontend, "http://localhost:5173");
        assert!(!config.web.ssl.enabled);
        assert_eq!(config.credentials.user_agent, "pack-builder");
        assert!(config.credentials.github.get().is_none());
    }

    #[test]
    fn test_kebab_case_keys() {
        let yaml = r#"
web:
  public-url: "https://packs.example.com/"
  ssl:
    enabled: true
    cert-path: /etc/cert.pem
    key-path: /etc/key.pem
credentials:
  user-agent: "tester"
  github:
    token: "ghp_abc"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.web.public_url(), "https://packs.example.com");
        assert_eq!(config.web.ssl.cert_path, PathBuf::from("/etc/cert.pem"));
        assert_eq!(config.credentials.user_agent, "tester");
        assert_eq!(config.credentials.github.get(), Some("ghp_abc"));
        // Unset sections fall back to defaults
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.working_directory, PathBuf::from("."));
    }

    #[test]
    fn test_public_url_falls_back_to_endpoint() {
        let mut config = Config::default();
        config.web.address = "127.0.0.1".to_string();
        config.web.port = 9000;
        assert_eq!(config.web.public_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_validate_rejects_ssl_without_paths() {
        let yaml = "web:\n  ssl:\n    enabled: true\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("web.ssl.cert-path")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let err = Config::from_yaml("web:\n  port: 0\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_load_or_init_writes_template() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.web.port, 8080);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            DEFAULT_CONFIG_TEMPLATE
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o600, 0o600, "owner must be able to read and write");
        }
    }

    #[test]
    fn test_load_or_init_reads_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "web:\n  port: 9999\n").unwrap();

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.web.port, 9999);
    }
}
