//! Loader for a single resource directory.
//!
//! A resource directory holds `*.json` tables, each mapping resource type to
//! entry name to value:
//!
//! ```json
//! { "string": { "app_name": "Demo" }, "integer": { "max_items": 3 } }
//! ```
//!
//! Tables are read eagerly so an unreadable or malformed directory fails at
//! composition time rather than on first lookup.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::ResourceError;
use crate::manifest::ResourcePath;

use super::{ResName, ResValue, ResourceIndex, ResourceLoader};

type ResourceTable = BTreeMap<String, BTreeMap<String, ResValue>>;

/// Resolves the resources of one directory within its own namespace.
#[derive(Debug)]
pub struct PackageResourceLoader {
    namespace: String,
    values: HashMap<ResName, ResValue>,
    index: ResourceIndex,
}

impl PackageResourceLoader {
    /// Loads every table under `path.res_dir`.
    pub fn load(path: &ResourcePath, package_id: u8) -> Result<Self, ResourceError> {
        let dir = &path.res_dir;
        let entries = std::fs::read_dir(dir).map_err(|source| ResourceError::Unreadable {
            path: dir.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ResourceError::Unreadable {
                path: dir.clone(),
                source,
            })?;
            let file = entry.path();
            if file.is_file() && file.extension().is_some_and(|ext| ext == "json") {
                files.push(file);
            }
        }
        files.sort();

        let mut values = HashMap::new();
        for file in &files {
            for (name, value) in read_table(file, &path.package_name)? {
                if values.contains_key(&name) {
                    return Err(ResourceError::Malformed {
                        path: file.clone(),
                        reason: format!("duplicate resource {name}"),
                    });
                }
                values.insert(name, value);
            }
        }

        tracing::trace!(
            package = %path.package_name,
            dir = %dir.display(),
            files = files.len(),
            resources = values.len(),
            "loaded resource directory"
        );
        Self::with_values(path.package_name.clone(), package_id, values)
    }

    /// A loader with no entries.
    #[must_use]
    pub fn empty(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            values: HashMap::new(),
            index: ResourceIndex::default(),
        }
    }

    /// Builds a loader from in-memory `(type, name, value)` entries.
    pub fn from_values<'a>(
        namespace: impl Into<String>,
        package_id: u8,
        entries: impl IntoIterator<Item = (&'a str, &'a str, ResValue)>,
    ) -> Result<Self, ResourceError> {
        let namespace = namespace.into();
        let values = entries
            .into_iter()
            .map(|(kind, name, value)| (ResName::new(namespace.as_str(), kind, name), value))
            .collect();
        Self::with_values(namespace, package_id, values)
    }

    fn with_values(
        namespace: String,
        package_id: u8,
        values: HashMap<ResName, ResValue>,
    ) -> Result<Self, ResourceError> {
        let index = ResourceIndex::build(package_id, values.keys())?;
        Ok(Self {
            namespace,
            values,
            index,
        })
    }

    /// Number of resources loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn read_table(file: &Path, package: &str) -> Result<Vec<(ResName, ResValue)>, ResourceError> {
    let raw = std::fs::read_to_string(file).map_err(|source| ResourceError::Unreadable {
        path: file.to_path_buf(),
        source,
    })?;
    let table: ResourceTable = serde_json::from_str(&raw).map_err(|e| ResourceError::Malformed {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut out = Vec::new();
    for (kind, entries) in table {
        for (name, value) in entries {
            if kind.is_empty() || name.is_empty() || kind.contains('/') || name.contains('/') {
                return Err(ResourceError::Malformed {
                    path: file.to_path_buf(),
                    reason: format!("invalid resource name '{kind}/{name}'"),
                });
            }
            out.push((ResName::new(package, kind.as_str(), name), value));
        }
    }
    Ok(out)
}

impl ResourceLoader for PackageResourceLoader {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get_value(&self, name: &ResName) -> Option<ResValue> {
        self.values.get(name).cloned()
    }

    fn resource_index(&self) -> &ResourceIndex {
        &self.index
    }
}
