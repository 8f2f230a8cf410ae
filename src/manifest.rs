//! Application manifest description.
//!
//! The manifest is the static declaration of the application under test:
//! package name, label, resource search paths and declared activities.
//! Discovering and parsing platform manifests is the job of a
//! `ManifestProvider`; this crate only consumes the resulting `AppManifest`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::TestConfig;
use crate::error::{SimError, SimResult};

/// Stable content identity of a manifest.
///
/// Two manifests with identical declarations share an id; any differing field
/// yields a different id. Used as the manifest half of the resource cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManifestId(blake3::Hash);

impl ManifestId {
    /// Returns the raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// A directory of resources belonging to one package namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePath {
    /// Package the resources were declared under.
    pub package_name: String,
    /// Directory holding the resource tables.
    pub res_dir: PathBuf,
}

impl ResourcePath {
    /// Creates a resource path.
    #[must_use]
    pub fn new(package_name: impl Into<String>, res_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_name: package_name.into(),
            res_dir: res_dir.into(),
        }
    }
}

/// An intent filter declared on an activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentFilterData {
    /// Actions the filter matches.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Categories the filter matches.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// An activity declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityData {
    /// Declared class name; may be relative (`.Main`) to the manifest package.
    pub name: String,
    /// Optional label reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Whether other packages may start the activity.
    #[serde(default)]
    pub exported: bool,
    /// Declared intent filters.
    #[serde(default)]
    pub intent_filters: Vec<IntentFilterData>,
}

impl ActivityData {
    /// Creates an activity declaration with no label or filters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            exported: false,
            intent_filters: Vec::new(),
        }
    }

    /// Adds an intent filter.
    #[must_use]
    pub fn with_intent_filter(mut self, filter: IntentFilterData) -> Self {
        self.intent_filters.push(filter);
        self
    }
}

/// Immutable description of the application under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    /// Application package name.
    pub package_name: String,

    /// Label reference, typically `@string/app_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_ref: Option<String>,

    /// Fully qualified application class, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_class: Option<String>,

    /// Declared version code.
    #[serde(default)]
    pub version_code: u32,

    /// Declared version name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,

    /// Minimum supported API level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sdk_version: Option<u32>,

    /// Targeted API level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sdk_version: Option<u32>,

    /// Resource search paths: the application's own first, then libraries,
    /// in declaration order. Earlier paths shadow later ones.
    #[serde(default)]
    pub resource_paths: Vec<ResourcePath>,

    /// Declared activities in declaration order.
    #[serde(default)]
    pub activities: Vec<ActivityData>,

    /// Application meta-data; values may reference resources.
    #[serde(default)]
    pub meta_data: BTreeMap<String, String>,
}

impl AppManifest {
    /// Creates a manifest for `package_name` with nothing declared.
    #[must_use]
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            label_ref: None,
            application_class: None,
            version_code: 0,
            version_name: None,
            min_sdk_version: None,
            target_sdk_version: None,
            resource_paths: Vec::new(),
            activities: Vec::new(),
            meta_data: BTreeMap::new(),
        }
    }

    /// Sets the label reference.
    #[must_use]
    pub fn with_label(mut self, label_ref: impl Into<String>) -> Self {
        self.label_ref = Some(label_ref.into());
        self
    }

    /// Appends a resource search path.
    #[must_use]
    pub fn with_resource_path(mut self, path: ResourcePath) -> Self {
        self.resource_paths.push(path);
        self
    }

    /// Appends a declared activity.
    #[must_use]
    pub fn with_activity(mut self, activity: ActivityData) -> Self {
        self.activities.push(activity);
        self
    }

    /// Adds a meta-data entry.
    #[must_use]
    pub fn with_meta_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta_data.insert(key.into(), value.into());
        self
    }

    /// Parses a manifest from JSON.
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        serde_json::from_str(json).map_err(|e| SimError::config(format!("invalid manifest: {e}")))
    }

    /// Reads and parses a manifest JSON file.
    pub fn from_path(path: &Path) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SimError::config(format!("cannot read manifest {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Content identity of this manifest.
    #[must_use]
    pub fn id(&self) -> ManifestId {
        let mut hasher = blake3::Hasher::new();
        hash_str(&mut hasher, &self.package_name);
        hash_opt(&mut hasher, self.label_ref.as_deref());
        hash_opt(&mut hasher, self.application_class.as_deref());
        hasher.update(&self.version_code.to_le_bytes());
        hash_opt(&mut hasher, self.version_name.as_deref());
        for sdk in [self.min_sdk_version, self.target_sdk_version] {
            hasher.update(&sdk.map_or(u64::MAX, u64::from).to_le_bytes());
        }

        hasher.update(&(self.resource_paths.len() as u64).to_le_bytes());
        for path in &self.resource_paths {
            hash_str(&mut hasher, &path.package_name);
            hash_str(&mut hasher, &path.res_dir.to_string_lossy());
        }

        hasher.update(&(self.activities.len() as u64).to_le_bytes());
        for activity in &self.activities {
            hash_str(&mut hasher, &activity.name);
            hash_opt(&mut hasher, activity.label.as_deref());
            hasher.update(&[u8::from(activity.exported)]);
            hasher.update(&(activity.intent_filters.len() as u64).to_le_bytes());
            for filter in &activity.intent_filters {
                hash_list(&mut hasher, &filter.actions);
                hash_list(&mut hasher, &filter.categories);
            }
        }

        hasher.update(&(self.meta_data.len() as u64).to_le_bytes());
        for (key, value) in &self.meta_data {
            hash_str(&mut hasher, key);
            hash_str(&mut hasher, value);
        }

        ManifestId(hasher.finalize())
    }
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_opt(hasher: &mut blake3::Hasher, s: Option<&str>) {
    match s {
        Some(s) => {
            hasher.update(&[1]);
            hash_str(hasher, s);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn hash_list(hasher: &mut blake3::Hasher, items: &[String]) {
    hasher.update(&(items.len() as u64).to_le_bytes());
    for item in items {
        hash_str(hasher, item);
    }
}

/// Supplies the manifest for a test.
pub trait ManifestProvider: Send + Sync {
    /// Returns the manifest the test described by `config` runs against.
    fn manifest(&self, config: &TestConfig) -> SimResult<AppManifest>;
}

/// Reads a manifest from a JSON file on every request.
#[derive(Debug, Clone)]
pub struct JsonManifestProvider {
    path: PathBuf,
}

impl JsonManifestProvider {
    /// Creates a provider backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ManifestProvider for JsonManifestProvider {
    fn manifest(&self, _config: &TestConfig) -> SimResult<AppManifest> {
        AppManifest::from_path(&self.path)
    }
}
