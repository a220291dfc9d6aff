//! Plugin manifests (`plugin.yml`) embedded in JARs

use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Entry name of the manifest inside a plugin JAR
pub const MANIFEST_ENTRY: &str = "plugin.yml";

/// The parts of `plugin.yml` dependency checking needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PluginManifest {
    /// Declared plugin name
    #[serde(default)]
    pub name: String,

    /// Hard dependencies
    #[serde(default, deserialize_with = "string_or_list")]
    pub depend: Vec<String>,
}

impl PluginManifest {
    /// Lowercased plugin name
    pub fn normalized_name(&self) -> String {
        self.name.trim().to_lowercase()
    }

    /// Lowercased hard dependency names, blanks dropped
    pub fn normalized_depends(&self) -> Vec<String> {
        self.depend
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }
}

/// Some authors write `depend: Vault` instead of a list
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(name)) => vec![name],
        Some(OneOrMany::Many(names)) => names,
        None => Vec::new(),
    })
}

/// Parse a manifest document
pub fn parse_manifest(data: &str) -> Result<PluginManifest> {
    Ok(serde_yaml::from_str(data)?)
}

/// Read the manifest of the JAR at `path`
///
/// Returns `Ok(None)` when the archive has no `plugin.yml` entry.
pub fn read_manifest(path: &Path) -> Result<Option<PluginManifest>> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut entry = match archive.by_name(MANIFEST_ENTRY) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(Error::Zip(e)),
    };

    let mut data = String::new();
    entry.read_to_string(&mut data)?;
    parse_manifest(&data).map(Some)
}

/// [`read_manifest`] on the blocking pool
pub async fn read_manifest_blocking(path: &Path) -> Result<Option<PluginManifest>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_manifest(&path))
        .await
        .map_err(|e| Error::Other(format!("manifest task failed: {e}")))?
}
