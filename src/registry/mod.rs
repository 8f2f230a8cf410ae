//! Simulated package registry.
//!
//! An in-memory stand-in for the platform package manager. A fresh registry is
//! created for every test; code under test uses it for package lookups and
//! intent resolution.

pub mod intent;

pub use intent::{ActivityInfo, ComponentName, Intent, ResolveInfo};

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::PackageError;
use crate::manifest::AppManifest;

fn lock_err(context: &'static str) -> PackageError {
    PackageError::Backend {
        message: format!("poisoned lock: {context}"),
    }
}

/// Expands a relative class name against its owning package.
///
/// `.Main` becomes `com.example.Main`; every other name is left unchanged.
#[must_use]
pub fn qualify_class_name(package: &str, name: &str) -> String {
    if name.starts_with('.') {
        format!("{package}{name}")
    } else {
        name.to_string()
    }
}

/// Expands an application class name. Unlike activities, a bare `App` is
/// also taken to live in the owning package.
#[must_use]
pub fn qualify_application_class(package: &str, name: &str) -> String {
    if name.contains('.') {
        qualify_class_name(package, name)
    } else {
        format!("{package}.{name}")
    }
}

/// Application-level package information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    /// Owning package.
    pub package_name: String,
    /// Qualified application class, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Label resource id; 0 when the label did not resolve.
    #[serde(default)]
    pub label_res: u32,
    /// Minimum supported API level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sdk_version: Option<u32>,
    /// Targeted API level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sdk_version: Option<u32>,
    /// Meta-data with resource references resolved.
    #[serde(default)]
    pub meta_data: BTreeMap<String, String>,
    /// Whether the application is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// Everything the registry knows about one installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name.
    pub package_name: String,
    /// Declared version code.
    #[serde(default)]
    pub version_code: u32,
    /// Declared version name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    /// Application-level information.
    pub application_info: ApplicationInfo,
    /// Declared activities with qualified names.
    #[serde(default)]
    pub activities: Vec<ActivityInfo>,
}

impl PackageInfo {
    /// Builds the package record for a manifest. Meta-data is copied verbatim.
    #[must_use]
    pub fn from_manifest(manifest: &AppManifest, label_res: u32) -> Self {
        let package = manifest.package_name.as_str();
        Self {
            package_name: package.to_string(),
            version_code: manifest.version_code,
            version_name: manifest.version_name.clone(),
            application_info: ApplicationInfo {
                package_name: package.to_string(),
                class_name: manifest
                    .application_class
                    .as_deref()
                    .map(|class| qualify_application_class(package, class)),
                label_res,
                min_sdk_version: manifest.min_sdk_version,
                target_sdk_version: manifest.target_sdk_version,
                meta_data: manifest.meta_data.clone(),
                enabled: true,
            },
            activities: manifest
                .activities
                .iter()
                .map(|activity| ActivityInfo {
                    package_name: package.to_string(),
                    name: qualify_class_name(package, &activity.name),
                    label_res: 0,
                    exported: activity.exported,
                })
                .collect(),
        }
    }

    /// Replaces the application meta-data.
    #[must_use]
    pub fn with_meta_data(mut self, meta_data: BTreeMap<String, String>) -> Self {
        self.application_info.meta_data = meta_data;
        self
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    packages: BTreeMap<String, PackageInfo>,
    resolve_infos: HashMap<Intent, Vec<ResolveInfo>>,
}

/// In-memory package manager for a single test.
#[derive(Debug, Default)]
pub struct SimulatedPackageRegistry {
    state: RwLock<RegistryState>,
}

impl SimulatedPackageRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the package declared by `manifest` with the given label id.
    pub fn add_manifest(&self, manifest: &AppManifest, label_res: u32) -> Result<(), PackageError> {
        self.add_package(PackageInfo::from_manifest(manifest, label_res))
    }

    /// Registers (or replaces) a package record.
    pub fn add_package(&self, info: PackageInfo) -> Result<(), PackageError> {
        let mut state = self.state.write().map_err(|_| lock_err("registry.add_package"))?;
        state.packages.insert(info.package_name.clone(), info);
        Ok(())
    }

    /// Removes a package record.
    pub fn remove_package(&self, package: &str) -> Result<PackageInfo, PackageError> {
        let mut state = self.state.write().map_err(|_| lock_err("registry.remove_package"))?;
        state
            .packages
            .remove(package)
            .ok_or_else(|| PackageError::PackageNotFound {
                package: package.to_string(),
            })
    }

    /// Returns the package record for `package`.
    pub fn get_package_info(&self, package: &str) -> Result<PackageInfo, PackageError> {
        let state = self.state.read().map_err(|_| lock_err("registry.get_package_info"))?;
        state
            .packages
            .get(package)
            .cloned()
            .ok_or_else(|| PackageError::PackageNotFound {
                package: package.to_string(),
            })
    }

    /// Returns the application info for `package`.
    ///
    /// # Errors
    /// - `PackageNotFound`: if `package` was never registered
    pub fn get_application_info(&self, package: &str) -> Result<ApplicationInfo, PackageError> {
        self.get_package_info(package).map(|info| info.application_info)
    }

    /// Returns true if `package` is registered.
    #[must_use]
    pub fn contains_package(&self, package: &str) -> bool {
        self.state
            .read()
            .map(|state| state.packages.contains_key(package))
            .unwrap_or(false)
    }

    /// Registered package names, sorted.
    pub fn installed_packages(&self) -> Result<Vec<String>, PackageError> {
        let state = self.state.read().map_err(|_| lock_err("registry.installed_packages"))?;
        Ok(state.packages.keys().cloned().collect())
    }

    /// Records that `intent` resolves to `info`.
    pub fn add_resolve_info_for_intent(&self, intent: Intent, info: ResolveInfo) -> Result<(), PackageError> {
        let mut state = self.state.write().map_err(|_| lock_err("registry.add_resolve_info"))?;
        let entries = state.resolve_infos.entry(intent).or_default();
        if !entries.contains(&info) {
            entries.push(info);
        }
        Ok(())
    }

    /// Drops every resolution recorded for `intent`.
    pub fn remove_resolve_infos_for_intent(&self, intent: &Intent) -> Result<(), PackageError> {
        let mut state = self.state.write().map_err(|_| lock_err("registry.remove_resolve_infos"))?;
        state.resolve_infos.remove(intent);
        Ok(())
    }

    /// Registers every activity declared by `manifest`.
    ///
    /// Each activity is reachable by its qualified class name and by every
    /// action of its intent filters.
    pub fn add_manifest_activities(&self, manifest: &AppManifest) -> Result<usize, PackageError> {
        let package = manifest.package_name.as_str();
        let mut registered = 0;
        for activity in &manifest.activities {
            let name = qualify_class_name(package, &activity.name);
            let info = ResolveInfo::for_activity(ActivityInfo {
                package_name: package.to_string(),
                name: name.clone(),
                label_res: 0,
                exported: activity.exported,
            });

            self.add_resolve_info_for_intent(Intent::new(name), info.clone())?;
            for action in activity.intent_filters.iter().flat_map(|f| f.actions.iter()) {
                self.add_resolve_info_for_intent(Intent::new(action.as_str()), info.clone())?;
            }
            registered += 1;
        }
        Ok(registered)
    }

    /// All resolutions matching `intent`, highest priority first.
    ///
    /// Explicit intents match any entry targeting their component; implicit
    /// intents match entries recorded for the same intent.
    pub fn query_intent_activities(&self, intent: &Intent) -> Result<Vec<ResolveInfo>, PackageError> {
        let state = self.state.read().map_err(|_| lock_err("registry.query_intent_activities"))?;

        let mut matches: Vec<ResolveInfo> = match &intent.component {
            Some(component) => {
                let mut found: Vec<ResolveInfo> = Vec::new();
                for info in state.resolve_infos.values().flatten() {
                    if info.targets(component) && !found.contains(info) {
                        found.push(info.clone());
                    }
                }
                found
            }
            None => state.resolve_infos.get(intent).cloned().unwrap_or_default(),
        };
        matches.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(matches)
    }

    /// The best resolution for `intent`, if any.
    pub fn resolve_activity(&self, intent: &Intent) -> Result<Option<ResolveInfo>, PackageError> {
        Ok(self.query_intent_activities(intent)?.into_iter().next())
    }
}
