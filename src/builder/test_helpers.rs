//! Shared test helpers for creating PackBuilder instances in tests.

use crate::builder::PackBuilder;
use crate::config::Config;
use crate::error::ProviderError;
use crate::events::ServerEvent;
use crate::providers::{PluginProvider, ProviderRegistry, ProviderResult};
use crate::types::{PluginInfo, ProviderKind, Request, Version};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::broadcast;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Plugin provider answering from fixed tables
#[derive(Default)]
pub(crate) struct StaticProvider {
    pub(crate) by_link: HashMap<String, PluginInfo>,
    pub(crate) by_name: HashMap<String, PluginInfo>,
}

impl StaticProvider {
    pub(crate) fn with_link(mut self, link: &str, info: PluginInfo) -> Self {
        self.by_link.insert(link.to_string(), info);
        self
    }

    pub(crate) fn with_name(mut self, name: &str, info: PluginInfo) -> Self {
        self.by_name.insert(name.to_lowercase(), info);
        self
    }
}

#[async_trait]
impl PluginProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn info_from_link(&self, link: &str) -> ProviderResult<PluginInfo> {
        self.by_link
            .get(link)
            .cloned()
            .ok_or(ProviderError::Unrecognized("test ID"))
    }

    async fn info_from_name(&self, name: &str) -> ProviderResult<PluginInfo> {
        self.by_name
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| ProviderError::NotFound("no project found with this exact name".into()))
    }
}

/// Plugin metadata with one direct version tested on 1.20
pub(crate) fn plugin_info(name: &str, url: &str) -> PluginInfo {
    PluginInfo {
        provider: ProviderKind::Spigot,
        id: name.to_lowercase(),
        link: format!("https://spigotmc.org/resources/{}", name.to_lowercase()),
        name: name.to_string(),
        description: String::new(),
        contributors: String::new(),
        premium: false,
        versions: vec![Version {
            id: "1".into(),
            link: String::new(),
            is_external: false,
            url: url.to_string(),
            platforms: None,
            game_versions: Some(vec!["1.20".into()]),
        }],
        icon_link: String::new(),
    }
}

/// A spigot request for 1.20.4 over the given links
pub(crate) fn spigot_request(links: &[(Uuid, &str)]) -> Request {
    let links: serde_json::Map<String, serde_json::Value> = links
        .iter()
        .map(|(id, link)| (id.to_string(), serde_json::Value::from(*link)))
        .collect();
    serde_json::from_value(serde_json::json!({
        "platform": "spigot",
        "game_version": "1.20.4",
        "links": links
    }))
    .unwrap()
}

/// Bytes of a JAR holding a `plugin.yml`
pub(crate) fn plugin_jar(name: &str, depends: &[&str]) -> Vec<u8> {
    let mut manifest = format!("name: {name}\nversion: 1.0.0\nmain: com.example.{name}\n");
    if !depends.is_empty() {
        manifest.push_str(&format!("depend: [{}]\n", depends.join(", ")));
    }

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("plugin.yml", zip::write::FileOptions::default())
        .unwrap();
    zip.write_all(manifest.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

/// Serve `body` at `route` on the mock server
pub(crate) async fn serve_bytes(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Helper to create a test PackBuilder over a single static provider.
/// Returns the builder and the tempdir (which must be kept alive).
pub(crate) async fn create_test_builder(
    provider: StaticProvider,
) -> (PackBuilder, tempfile::TempDir) {
    create_test_builder_with(vec![Arc::new(provider)]).await
}

/// Builder over a temporary working directory with the given plugin providers
pub(crate) async fn create_test_builder_with(
    providers: Vec<Arc<dyn PluginProvider>>,
) -> (PackBuilder, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let config = Config {
        working_directory: temp_dir.path().to_path_buf(),
        ..Default::default()
    };

    let registry = ProviderRegistry::new(providers, vec![]);
    let builder = PackBuilder::with_providers(config, registry, reqwest::Client::new())
        .await
        .unwrap();

    (builder, temp_dir)
}

/// Wait for the next event with the given name, failing after five seconds
pub(crate) async fn wait_for_event(
    events: &mut broadcast::Receiver<ServerEvent>,
    name: &str,
) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if event.name() == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
}
