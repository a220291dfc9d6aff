//! Core types for pack-builder
//!
//! Field names on the wire follow what the frontend consumes, so a few Rust
//! names are renamed for serde (`type`, `package`).

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{Error, LinkIssue, Result, StageError};
use crate::version;

/// Session identifier
pub type SessionId = Uuid;

/// Caller-assigned link identifier
pub type LinkId = Uuid;

/// Package identifier
pub type PackageId = Uuid;

/// Target platform of a pack
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Platform {
    /// Spigot plugin server
    Spigot,
    /// Fabric mod loader
    Fabric,
    /// Quilt mod loader
    Quilt,
    /// Forge mod loader
    Forge,
    /// NeoForge mod loader
    #[serde(rename = "neoforge")]
    NeoForge,
}

impl Platform {
    /// All platforms, in display order
    pub const ALL: [Platform; 5] = [
        Platform::Spigot,
        Platform::Fabric,
        Platform::Quilt,
        Platform::Forge,
        Platform::NeoForge,
    ];

    /// Wire tag, also used for loader matching
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Spigot => "spigot",
            Platform::Fabric => "fabric",
            Platform::Quilt => "quilt",
            Platform::Forge => "forge",
            Platform::NeoForge => "neoforge",
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Spigot => "Spigot",
            Platform::Fabric => "Fabric",
            Platform::Quilt => "Quilt",
            Platform::Forge => "Forge",
            Platform::NeoForge => "NeoForge",
        }
    }

    /// The kind of pack this platform builds
    pub fn mode(&self) -> Mode {
        match self {
            Platform::Spigot => Mode::Plugins,
            Platform::Fabric | Platform::Quilt | Platform::Forge | Platform::NeoForge => {
                Mode::Mods
            }
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("invalid platform: {s}"))
    }
}

impl TryFrom<String> for Platform {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Kind of pack being built
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Server plugins with `plugin.yml` manifests
    Plugins,
    /// Loader mods
    Mods,
}

/// Outcome of an operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Worked
    #[default]
    Success,
    /// Worked with caveats
    Warning,
    /// Failed
    Error,
}

/// Machine-readable reason attached to a failed preliminary result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    /// Every version failed the loader or game-version gate
    NoSuitableVersion,
}

/// An ordered string-keyed map that serializes as a JSON object.
///
/// Insertion order is kept so candidate URLs are tried in provider order.
/// Deserialization keeps duplicate keys, which lets request validation report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMap<V>(Vec<(String, V)>);

impl<V> Default for LinkMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> LinkMap<V> {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    /// Value for a key (first occurrence)
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Mutable value for a key (first occurrence)
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.0.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether the key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries, duplicates included
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for LinkMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = LinkMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for LinkMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for LinkMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct LinkMapVisitor<V>(std::marker::PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for LinkMapVisitor<V> {
            type Value = LinkMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of links")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, V>()? {
                    entries.push((k, v));
                }
                Ok(LinkMap(entries))
            }

            fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(LinkMap::new())
            }
        }

        deserializer.deserialize_any(LinkMapVisitor(std::marker::PhantomData))
    }
}

/// A pack creation request made by a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Request {
    /// Target platform
    pub platform: Platform,

    /// Loader version, required in mods mode
    #[serde(default)]
    pub platform_version: String,

    /// Game version
    pub game_version: String,

    /// Caller-assigned link id -> source URL
    #[serde(default)]
    #[schema(value_type = Object)]
    pub links: LinkMap<String>,
}

impl Request {
    /// Mode implied by the platform
    pub fn mode(&self) -> Mode {
        self.platform.mode()
    }

    /// Parsed game version
    pub fn parsed_game_version(&self) -> Option<semver::Version> {
        version::parse_lenient(&self.game_version)
    }

    /// Validate the request shape and every link
    ///
    /// Shape problems (no links, bad versions) fail with an empty issue list;
    /// link problems fail with one issue per offending link.
    pub fn validate(&self) -> Result<()> {
        if self.links.is_empty() {
            return Err(invalid("no links provided"));
        }

        if self.mode() == Mode::Mods && version::parse_lenient(&self.platform_version).is_none() {
            return Err(invalid(format!(
                "invalid platform version: {}",
                self.platform_version
            )));
        }

        if self.parsed_game_version().is_none() {
            return Err(invalid(format!(
                "invalid game version: {}",
                self.game_version
            )));
        }

        // ids compare as parsed values, so case variants of one id collide
        let mut seen: HashMap<Uuid, usize> = HashMap::new();
        for id in self.links.keys().filter_map(|raw_id| Uuid::parse_str(raw_id).ok()) {
            *seen.entry(id).or_default() += 1;
        }

        let mut issues = Vec::new();
        for (raw_id, link) in self.links.iter() {
            let Ok(id) = Uuid::parse_str(raw_id) else {
                issues.push(LinkIssue::new(raw_id, "invalid ID"));
                continue;
            };

            if seen.get(&id).is_some_and(|count| *count > 1) {
                issues.push(LinkIssue::new(raw_id, "duplicate ID"));
            }

            if !link.starts_with("http://") && !link.starts_with("https://") {
                issues.push(LinkIssue::new(raw_id, "invalid link"));
            }
        }

        if !issues.is_empty() {
            return Err(Error::InvalidRequest {
                message: "invalid links".to_string(),
                issues,
            });
        }

        Ok(())
    }

    /// Link ids and URLs; entries with unparseable ids are skipped
    pub fn parsed_links(&self) -> Vec<(LinkId, String)> {
        self.links
            .iter()
            .filter_map(|(raw_id, link)| {
                Uuid::parse_str(raw_id)
                    .ok()
                    .map(|id| (id, link.to_string()))
            })
            .collect()
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidRequest {
        message: message.into(),
        issues: Vec::new(),
    }
}

/// Which host a piece of plugin metadata came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Resources aggregator (Spiget API for SpigotMC)
    Spigot,
    /// Projects hub (Modrinth)
    Modrinth,
}

/// One downloadable version of a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Version {
    /// Provider-scoped version id
    pub id: String,

    /// Human-facing page for this version
    pub link: String,

    /// The URL redirects to another host instead of serving an archive
    pub is_external: bool,

    /// Archive URL, or the redirect target when external
    pub url: String,

    /// Supported loaders; `None` when the provider does not say
    pub platforms: Option<Vec<String>>,

    /// Game versions tested by the author; `None` when unknown
    pub game_versions: Option<Vec<String>>,
}

impl Version {
    /// Loader gate: a missing loader list matches every platform
    pub fn supports_platform(&self, platform: Platform) -> bool {
        match &self.platforms {
            Some(loaders) => loaders
                .iter()
                .any(|loader| loader.eq_ignore_ascii_case(platform.as_str())),
            None => true,
        }
    }

    /// Game-version gate: a missing or empty list matches every game version
    pub fn supports_game_version(&self, game_version: &semver::Version) -> bool {
        match &self.game_versions {
            Some(tested) if !tested.is_empty() => version::is_tested_version(game_version, tested),
            _ => true,
        }
    }

    /// Human-readable list of tested versions
    pub fn formatted_tested_versions(&self) -> String {
        match &self.game_versions {
            Some(tested) if !tested.is_empty() => tested.join(", "),
            _ => "-".to_string(),
        }
    }
}

/// Provider-neutral plugin metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PluginInfo {
    /// Source provider
    #[serde(rename = "type")]
    pub provider: ProviderKind,

    /// Provider-scoped id
    pub id: String,

    /// Canonical page URL
    pub link: String,

    /// Human name
    pub name: String,

    /// Short description
    pub description: String,

    /// Authors
    pub contributors: String,

    /// Paid resource
    pub premium: bool,

    /// Versions in provider order
    pub versions: Vec<Version>,

    /// Icon URL
    pub icon_link: String,
}

/// Result of resolving one link (or dependency name) to download candidates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Preliminary {
    /// Overall outcome
    pub status: Status,

    /// Reason tag when the status is an error
    pub error: Option<ErrorTag>,

    /// Human-readable message
    pub message: String,

    /// provider name -> ("link" | "name") -> failure text
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub failed_attempts: HashMap<String, HashMap<String, String>>,

    /// Resolved metadata
    pub plugin_info: Option<PluginInfo>,

    /// Candidate URL -> use it?
    #[serde(default)]
    #[schema(value_type = Object)]
    pub links: LinkMap<bool>,

    /// Single unambiguous candidate from a first-class provider
    pub certain: bool,
}

impl Preliminary {
    /// A fresh successful result with an empty failure map per provider
    pub fn new<'a>(provider_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            failed_attempts: provider_names
                .into_iter()
                .map(|name| (name.to_string(), HashMap::new()))
                .collect(),
            ..Default::default()
        }
    }

    /// Whether resolution succeeded
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Record a provider failure under `key` ("link" or "name")
    pub fn record_failure(&mut self, provider: &str, key: &str, message: impl Into<String>) {
        self.failed_attempts
            .entry(provider.to_string())
            .or_default()
            .insert(key.to_string(), message.into());
    }

    /// Candidate URLs the user left enabled, in order
    pub fn enabled_links(&self) -> Vec<String> {
        self.links
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(url, _)| url.to_string())
            .collect()
    }

    /// File name to store the download under
    pub fn file_stem(&self) -> Option<&str> {
        self.plugin_info.as_ref().map(|info| info.name.as_str())
    }
}

/// Result of downloading one link
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Download {
    /// Outcome
    pub status: Status,

    /// Failure message, empty on success
    pub message: String,

    /// Where the file was written
    #[schema(value_type = String)]
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,
}

impl Download {
    /// A verified download
    pub fn success(path: PathBuf, size: u64) -> Self {
        Self {
            status: Status::Success,
            message: String::new(),
            path,
            size,
        }
    }

    /// A failed download
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            ..Default::default()
        }
    }

    /// Whether the download succeeded
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// One hard dependency declared in a plugin manifest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Dependency {
    /// Lowercased dependency name
    pub name: String,

    /// Another plugin in the pack already provides it
    pub other_plugin: bool,

    /// Result of looking it up by name
    pub search: Option<Preliminary>,

    /// Result of downloading it
    pub download: Option<Download>,
}

/// Per-link results of the post-processing stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PostProcessing {
    /// Declared hard dependencies, in manifest order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

/// State of a single link across stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LinkState {
    /// Link id, equal to its key in the session
    #[schema(value_type = String)]
    pub id: LinkId,

    /// Original URL
    pub link: String,

    /// Filled by the preliminary stage
    pub preliminary: Option<Preliminary>,

    /// Filled by the download stage
    pub download: Option<Download>,

    /// Filled by the post-processing stage
    pub post_processing: Option<PostProcessing>,
}

impl LinkState {
    /// Fresh state for a link
    pub fn new(id: LinkId, link: impl Into<String>) -> Self {
        Self {
            id,
            link: link.into(),
            preliminary: None,
            download: None,
            post_processing: None,
        }
    }
}

/// Session lifecycle stages, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Working directory created, links registered
    Initialized,
    /// Every link resolved
    Preliminary,
    /// Every link downloaded
    Download,
    /// Dependencies checked
    PostProcessing,
    /// Pack zipped
    Packaged,
    /// Session removed
    Deleted,
}

/// Per-stage completion flags; bits only ever go from false to true
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct OverallState {
    /// Initialized
    pub initialized: bool,
    /// Preliminary stage done
    pub preliminary: bool,
    /// Download stage done
    pub download: bool,
    /// Post-processing stage done
    pub post_processing: bool,
    /// Package stage done
    #[serde(rename = "package")]
    pub packaged: bool,
    /// Deleted
    pub deleted: bool,
}

impl OverallState {
    /// Whether a stage bit is set
    pub fn is_set(&self, stage: Stage) -> bool {
        match stage {
            Stage::Initialized => self.initialized,
            Stage::Preliminary => self.preliminary,
            Stage::Download => self.download,
            Stage::PostProcessing => self.post_processing,
            Stage::Packaged => self.packaged,
            Stage::Deleted => self.deleted,
        }
    }

    /// Check that `stage` may run: its predecessor is set and the session is alive
    pub fn require_ready_for(&self, stage: Stage) -> std::result::Result<(), StageError> {
        if stage == Stage::Deleted {
            return Ok(());
        }
        if self.deleted {
            return Err(StageError::Deleted);
        }

        let (previous, missing) = match stage {
            Stage::Initialized => return Ok(()),
            Stage::Preliminary => (Stage::Initialized, StageError::NotInitialized),
            Stage::Download => (Stage::Preliminary, StageError::PreliminaryNotRun),
            Stage::PostProcessing => (Stage::Download, StageError::ProcessNotRun),
            Stage::Packaged => (Stage::PostProcessing, StageError::ProcessNotRun),
            Stage::Deleted => return Ok(()),
        };

        if self.is_set(previous) {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Set a stage bit after checking its predecessor
    pub fn advance(&mut self, stage: Stage) -> std::result::Result<(), StageError> {
        self.require_ready_for(stage)?;
        match stage {
            Stage::Initialized => self.initialized = true,
            Stage::Preliminary => self.preliminary = true,
            Stage::Download => self.download = true,
            Stage::PostProcessing => self.post_processing = true,
            Stage::Packaged => self.packaged = true,
            Stage::Deleted => self.deleted = true,
        }
        Ok(())
    }
}

/// What a package is meant for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PackageCategory {
    /// Client-side pack
    Client,
    /// Server-side pack
    Server,
    /// Anything else
    Misc,
}

/// A packaged artifact of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Package {
    /// Retrievable over HTTP
    pub downloadable: bool,

    /// Outcome of packaging
    pub status: Status,

    /// Failure message, empty on success
    pub message: String,

    /// Display name
    pub name: String,

    /// Category
    #[serde(rename = "type")]
    pub category: PackageCategory,

    /// Archive location, re-derived from the session on recovery
    #[serde(skip)]
    pub path: PathBuf,

    /// Archive size in bytes
    pub size: u64,
}

/// Version lists offered for one platform
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlatformInfo {
    /// Human-readable name
    pub name: String,
    /// Loader versions (empty for plugin platforms)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub platform_versions: Vec<String>,
    /// Supported game versions
    pub game_versions: Vec<String>,
}

/// Response of `GET /api/info`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SupportInfo {
    /// Platform tag -> supported versions
    #[schema(value_type = Object)]
    pub platforms: BTreeMap<Platform, PlatformInfo>,
}

impl SupportInfo {
    /// The platforms table offered to clients
    pub fn current() -> Self {
        let versions = ["1.8.9", "1.12.2", "1.16.5", "1.18.2", "1.20.4"];
        let loader_versions = ["0.15.3", "0.15.2", "0.15.1"];
        let to_strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let platforms = Platform::ALL
            .into_iter()
            .map(|platform| {
                let info = match platform.mode() {
                    Mode::Plugins => PlatformInfo {
                        name: platform.display_name().to_string(),
                        platform_versions: Vec::new(),
                        game_versions: to_strings(&["1.8.8", "1.18.2", "1.20.4"]),
                    },
                    Mode::Mods => PlatformInfo {
                        name: platform.display_name().to_string(),
                        platform_versions: to_strings(&loader_versions),
                        game_versions: to_strings(&versions),
                    },
                };
                (platform, info)
            })
            .collect();

        Self { platforms }
    }
}
