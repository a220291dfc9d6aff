//! Common test utilities for pack-builder integration tests

#[allow(dead_code)]
pub mod fixtures;

pub use fixtures::*;

use pack_builder::providers::{GithubProvider, ProviderRegistry, SpigotProvider};
use pack_builder::{Config, PackBuilder, ServerEvent, SessionHandle};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use wiremock::MockServer;

/// A builder whose resources aggregator and code forge both live on `server`
///
/// Returns the builder and the tempdir holding its working directory.
pub async fn create_mocked_builder(server: &MockServer) -> (PackBuilder, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = Config {
        working_directory: temp_dir.path().to_path_buf(),
        ..Default::default()
    };

    let client = reqwest::Client::new();
    let registry = ProviderRegistry::new(
        vec![Arc::new(SpigotProvider::with_api_base(
            client.clone(),
            server.uri(),
        ))],
        vec![Arc::new(GithubProvider::with_api_base(
            client.clone(),
            None,
            server.uri(),
        ))],
    );

    let builder = PackBuilder::with_providers(config, registry, client)
        .await
        .expect("Failed to create builder");
    (builder, temp_dir)
}

/// Wait for the named event, failing after ten seconds
pub async fn wait_for(
    handle: &SessionHandle,
    events: &mut broadcast::Receiver<ServerEvent>,
    name: &str,
) -> ServerEvent {
    let id = handle.id();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(event) if event.name() == name => return event,
                Ok(_) => {}
                Err(e) => panic!("event channel of {id} failed: {e}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name} on {id}"))
}
