//! Upstream fixtures: Spiget resources, GitHub releases and JAR bodies

use serde_json::{Value, json};
use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Local ZIP file header magic
pub const JAR_MAGIC: &[u8] = b"PK\x03\x04";

/// Magic bytes followed by `extra` arbitrary bytes
pub fn magic_then(extra: usize) -> Vec<u8> {
    let mut body = JAR_MAGIC.to_vec();
    body.extend((0..extra).map(|i| (i % 251) as u8));
    body
}

/// A real JAR holding a `plugin.yml`
pub fn plugin_jar(name: &str, depends: &[&str]) -> Vec<u8> {
    let mut manifest = format!("name: {name}\nversion: 1.0.0\nmain: com.example.{name}\n");
    if !depends.is_empty() {
        manifest.push_str(&format!("depend: [{}]\n", depends.join(", ")));
    }

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("plugin.yml", zip::write::FileOptions::default())
        .expect("Failed to start plugin.yml");
    zip.write_all(manifest.as_bytes())
        .expect("Failed to write plugin.yml");
    zip.finish().expect("Failed to finish JAR").into_inner()
}

/// Spiget resource JSON with a hosted file
pub fn resource(id: u64, name: &str, tested: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "tag": format!("{name} plugin"),
        "contributors": "someone",
        "premium": false,
        "testedVersions": tested,
        "file": {"type": ".jar"},
        "version": {"id": id * 10}
    })
}

/// Spiget resource JSON whose file lives elsewhere
pub fn external_resource(id: u64, name: &str, tested: &[&str], external_url: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "testedVersions": tested,
        "file": {"type": "external", "externalUrl": external_url},
        "version": {"id": id * 10}
    })
}

/// A spigotmc.org resource link
pub fn spigot_link(slug: &str, id: u64) -> String {
    format!("https://www.spigotmc.org/resources/{slug}.{id}/")
}

/// Answer `GET route` with JSON
pub async fn mock_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answer `GET route` with raw bytes
pub async fn mock_bytes(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}
