//! Resource resolution.
//!
//! A `ResourceLoader` resolves `ResName`s to values within one or more package
//! namespaces. Loaders compose: per-path `PackageResourceLoader`s are layered
//! by an `OverlayResourceLoader`, and a `RoutingResourceLoader` dispatches
//! between the platform namespace and the application namespace. The routed
//! result is what the process-wide `ResourceLoaderCache` hands out.

pub mod cache;
pub mod composer;
pub mod overlay;
pub mod package;
pub mod platform;
pub mod routing;

pub use cache::{CacheKey, ResourceCache, ResourceLoaderCache};
pub use composer::{DefaultResourceComposer, ResourceComposer};
pub use overlay::OverlayResourceLoader;
pub use package::PackageResourceLoader;
pub use platform::{PlatformResourceProvider, PlatformResources};
pub use routing::{ComposedResourceLoader, RoutingResourceLoader};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::ResourceError;

/// Package id of the platform namespace.
pub const PLATFORM_PACKAGE_ID: u8 = 0x01;

/// Package id of the application namespace.
pub const APP_PACKAGE_ID: u8 = 0x7f;

/// Reference chains longer than this are treated as unresolvable.
const MAX_REFERENCE_DEPTH: usize = 8;

/// Fully qualified resource name: `package:type/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResName {
    /// Owning package namespace.
    pub package: String,
    /// Resource type (`string`, `color`, ...).
    pub kind: String,
    /// Entry name.
    pub name: String,
}

impl ResName {
    /// Creates a resource name.
    #[must_use]
    pub fn new(package: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Parses `@type/name`, `@pkg:type/name`, `@+id/name` or the bare
    /// `type/name` forms. The package defaults to `default_package`.
    #[must_use]
    pub fn parse(reference: &str, default_package: &str) -> Option<Self> {
        let body = reference.trim();
        let body = body.strip_prefix('@').unwrap_or(body);
        let body = body.strip_prefix('+').unwrap_or(body);

        let (package, rest) = match body.split_once(':') {
            Some((pkg, rest)) => (pkg, rest),
            None => (default_package, body),
        };
        let (kind, name) = rest.split_once('/')?;
        if package.is_empty() || kind.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(package, kind, name))
    }

    /// Returns a copy of this name moved into another namespace.
    #[must_use]
    pub fn with_package(&self, package: &str) -> Self {
        Self::new(package, self.kind.clone(), self.name.clone())
    }
}

impl fmt::Display for ResName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.package, self.kind, self.name)
    }
}

/// A resolved resource value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResValue {
    /// A boolean.
    Bool(bool),
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string, possibly a reference to another resource.
    Text(String),
}

impl ResValue {
    /// Returns the text of a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the referenced name if this value is a `@type/name` reference.
    #[must_use]
    pub fn as_reference(&self, default_package: &str) -> Option<ResName> {
        let text = self.as_text()?;
        if !text.starts_with('@') {
            return None;
        }
        ResName::parse(text, default_package)
    }
}

impl fmt::Display for ResValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Bidirectional mapping between resource names and numeric ids.
///
/// Ids are `package_id << 24 | type_id << 16 | entry`. Type ids start at 1 and
/// follow the sorted order of resource types; entries follow the sorted order
/// of names within a type, so the same set of names always yields the same ids.
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    by_name: HashMap<ResName, u32>,
    by_id: HashMap<u32, ResName>,
}

impl ResourceIndex {
    /// Builds an index over `names` under `package_id`.
    ///
    /// # Errors
    /// - `IndexOverflow`: more than 255 types, or more than 65536 entries of one type
    pub fn build<'a>(
        package_id: u8,
        names: impl IntoIterator<Item = &'a ResName>,
    ) -> Result<Self, ResourceError> {
        let mut grouped: BTreeMap<&str, BTreeSet<&ResName>> = BTreeMap::new();
        for name in names {
            grouped.entry(name.kind.as_str()).or_default().insert(name);
        }

        let mut index = Self::default();
        for (type_idx, (kind, entries)) in grouped.iter().enumerate() {
            let type_id = u8::try_from(type_idx + 1).map_err(|_| ResourceError::IndexOverflow {
                package_id,
                detail: format!("more than {} resource types", u8::MAX),
            })?;
            for (entry, name) in entries.iter().enumerate() {
                let entry = u16::try_from(entry).map_err(|_| ResourceError::IndexOverflow {
                    package_id,
                    detail: format!("more than {} '{kind}' entries", u32::from(u16::MAX) + 1),
                })?;
                let id = (u32::from(package_id) << 24) | (u32::from(type_id) << 16) | u32::from(entry);
                index.insert(id, (*name).clone());
            }
        }
        Ok(index)
    }

    fn insert(&mut self, id: u32, name: ResName) {
        self.by_name.insert(name.clone(), id);
        self.by_id.insert(id, name);
    }

    /// Adds every mapping of `other` not already present.
    pub fn merge(&mut self, other: &Self) {
        for (id, name) in &other.by_id {
            if !self.by_id.contains_key(id) && !self.by_name.contains_key(name) {
                self.insert(*id, name.clone());
            }
        }
    }

    /// Returns the id of `name`.
    #[must_use]
    pub fn id_of(&self, name: &ResName) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Returns the name registered for `id`.
    #[must_use]
    pub fn name_of(&self, id: u32) -> Option<&ResName> {
        self.by_id.get(&id)
    }

    /// Resolves a textual reference (`@string/app_name`) to an id.
    #[must_use]
    pub fn resource_id(&self, reference: &str, default_package: &str) -> Option<u32> {
        ResName::parse(reference, default_package).and_then(|name| self.id_of(&name))
    }

    /// Iterates over every indexed name.
    pub fn names(&self) -> impl Iterator<Item = &ResName> {
        self.by_name.keys()
    }

    /// Number of indexed resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Resolves resource names to values.
pub trait ResourceLoader: Send + Sync + fmt::Debug {
    /// The namespace this loader answers for.
    fn namespace(&self) -> &str;

    /// Resolves a single name. Names outside the loader's reach yield `None`.
    fn get_value(&self, name: &ResName) -> Option<ResValue>;

    /// Index of every name this loader can resolve.
    fn resource_index(&self) -> &ResourceIndex;

    /// Returns true if `name` resolves.
    fn has_value(&self, name: &ResName) -> bool {
        self.get_value(name).is_some()
    }
}

/// Device configuration resources are resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Effective qualifier string.
    pub qualifiers: String,
    /// Smallest screen width in dp; 0 when undefined.
    pub smallest_screen_width_dp: u32,
    /// Screen width in dp; 0 when undefined.
    pub screen_width_dp: u32,
    /// Platform API level; 0 when undefined.
    pub api_level: u32,
}

#[derive(Debug)]
struct ResourcesInner {
    loader: Arc<dyn ResourceLoader>,
    default_package: String,
    configuration: RwLock<Configuration>,
}

/// Shared handle to a loader plus the configuration it is resolved under.
///
/// Clones share configuration: `update_configuration` on one is observed by all.
#[derive(Debug, Clone)]
pub struct Resources {
    inner: Arc<ResourcesInner>,
}

impl Resources {
    /// Creates a resources handle resolving unqualified references in `default_package`.
    #[must_use]
    pub fn new(
        loader: Arc<dyn ResourceLoader>,
        default_package: impl Into<String>,
        configuration: Configuration,
    ) -> Self {
        Self {
            inner: Arc::new(ResourcesInner {
                loader,
                default_package: default_package.into(),
                configuration: RwLock::new(configuration),
            }),
        }
    }

    /// The underlying loader.
    #[must_use]
    pub fn loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.inner.loader
    }

    /// Package unqualified references resolve against.
    #[must_use]
    pub fn default_package(&self) -> &str {
        &self.inner.default_package
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn configuration(&self) -> Configuration {
        self.inner
            .configuration
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the configuration.
    pub fn update_configuration(&self, configuration: Configuration) {
        *self
            .inner
            .configuration
            .write()
            .unwrap_or_else(PoisonError::into_inner) = configuration;
    }

    /// Resolves `@type/name` to its id.
    #[must_use]
    pub fn identifier(&self, reference: &str) -> Option<u32> {
        self.inner
            .loader
            .resource_index()
            .resource_id(reference, &self.inner.default_package)
    }

    /// Resolves an id to its raw value.
    #[must_use]
    pub fn get_value(&self, id: u32) -> Option<ResValue> {
        let name = self.inner.loader.resource_index().name_of(id)?;
        self.inner.loader.get_value(name)
    }

    /// Resolves an id to text, following `@type/name` references.
    #[must_use]
    pub fn get_text(&self, id: u32) -> Option<String> {
        let name = self.inner.loader.resource_index().name_of(id)?.clone();
        self.resolve_text(name)
    }

    /// Resolves a reference to text, following `@type/name` references.
    #[must_use]
    pub fn get_text_by_name(&self, reference: &str) -> Option<String> {
        let name = ResName::parse(reference, &self.inner.default_package)?;
        self.resolve_text(name)
    }

    fn resolve_text(&self, mut name: ResName) -> Option<String> {
        for _ in 0..MAX_REFERENCE_DEPTH {
            let value = self.inner.loader.get_value(&name)?;
            match value.as_reference(&name.package) {
                Some(next) => name = next,
                None => return Some(value.to_string()),
            }
        }
        None
    }

    /// Returns true if both handles share the same underlying state.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reference_forms() {
        assert_eq!(
            ResName::parse("@string/app_name", "com.example"),
            Some(ResName::new("com.example", "string", "app_name"))
        );
        assert_eq!(
            ResName::parse("@android:string/ok", "com.example"),
            Some(ResName::new("android", "string", "ok"))
        );
        assert_eq!(
            ResName::parse("@+id/title", "com.example"),
            Some(ResName::new("com.example", "id", "title"))
        );
        assert_eq!(
            ResName::parse("color/accent", "lib"),
            Some(ResName::new("lib", "color", "accent"))
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(ResName::parse("My App", "com.example").is_none());
        assert!(ResName::parse("@string/", "com.example").is_none());
        assert!(ResName::parse("@/name", "com.example").is_none());
        assert!(ResName::parse("@:string/name", "com.example").is_none());
        assert!(ResName::parse("@string/a/b", "com.example").is_none());
    }

    #[test]
    fn index_ids_are_stable_and_packed() {
        let names = [
            ResName::new("app", "string", "b"),
            ResName::new("app", "color", "accent"),
            ResName::new("app", "string", "a"),
        ];
        let index = ResourceIndex::build(APP_PACKAGE_ID, names.iter()).unwrap();
        assert_eq!(index.len(), 3);
        // color sorts before string: color -> type 1, string -> type 2.
        assert_eq!(index.id_of(&names[1]), Some(0x7f01_0000));
        assert_eq!(index.id_of(&names[2]), Some(0x7f02_0000));
        assert_eq!(index.id_of(&names[0]), Some(0x7f02_0001));
        assert_eq!(index.name_of(0x7f02_0001), Some(&names[0]));

        let rebuilt = ResourceIndex::build(APP_PACKAGE_ID, names.iter().rev()).unwrap();
        assert_eq!(rebuilt.id_of(&names[0]), index.id_of(&names[0]));
    }

    #[test]
    fn merge_keeps_existing_entries() {
        let a = ResourceIndex::build(PLATFORM_PACKAGE_ID, [ResName::new("android", "string", "ok")].iter()).unwrap();
        let mut b = ResourceIndex::build(APP_PACKAGE_ID, [ResName::new("app", "string", "ok")].iter()).unwrap();
        b.merge(&a);
        assert_eq!(b.len(), 2);
        assert_eq!(b.resource_id("@android:string/ok", "app"), Some(0x0101_0000));
        assert_eq!(b.resource_id("@string/ok", "app"), Some(0x7f01_0000));
    }

    #[test]
    fn full_type_fits_and_one_more_entry_overflows() {
        let names: Vec<ResName> = (0..=u32::from(u16::MAX))
            .map(|i| ResName::new("app", "string", format!("n{i:06}")))
            .collect();
        let index = ResourceIndex::build(APP_PACKAGE_ID, names.iter()).unwrap();
        assert_eq!(index.len(), 65_536);
        assert_eq!(index.id_of(&names[0]), Some(0x7f01_0000));
        assert_eq!(index.id_of(names.last().unwrap()), Some(0x7f01_ffff));

        let mut names = names;
        names.push(ResName::new("app", "string", "n065536"));
        let err = ResourceIndex::build(APP_PACKAGE_ID, names.iter()).unwrap_err();
        assert!(matches!(err, ResourceError::IndexOverflow { package_id: APP_PACKAGE_ID, .. }));
    }

    #[test]
    fn too_many_types_overflow() {
        let names: Vec<ResName> = (0..256).map(|i| ResName::new("app", format!("t{i:03}"), "x")).collect();
        assert!(ResourceIndex::build(APP_PACKAGE_ID, names[..255].iter()).is_ok());
        let err = ResourceIndex::build(APP_PACKAGE_ID, names.iter()).unwrap_err();
        assert!(format!("{err}").contains("resource types"));
    }

    #[test]
    fn value_deserializes_untagged() {
        let values: Vec<ResValue> = serde_json::from_str(r#"[true, 3, 1.5, "hi"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ResValue::Bool(true),
                ResValue::Integer(3),
                ResValue::Float(1.5),
                ResValue::Text("hi".to_string())
            ]
        );
    }

    #[test]
    fn resources_follow_references_and_share_configuration() {
        let loader = PackageResourceLoader::from_values(
            "app",
            APP_PACKAGE_ID,
            [
                ("string", "title", ResValue::Text("@string/app_name".to_string())),
                ("string", "app_name", ResValue::Text("Demo".to_string())),
            ],
        )
        .unwrap();
        let resources = Resources::new(Arc::new(loader), "app", Configuration::default());
        let title = resources.identifier("@string/title").unwrap();
        assert_eq!(resources.get_text(title).as_deref(), Some("Demo"));
        assert_eq!(resources.get_text_by_name("@string/app_name").as_deref(), Some("Demo"));

        let clone = resources.clone();
        clone.update_configuration(Configuration {
            screen_width_dp: 480,
            ..Configuration::default()
        });
        assert_eq!(resources.configuration().screen_width_dp, 480);
        assert!(clone.ptr_eq(&resources));
    }

    #[test]
    fn reference_cycles_do_not_resolve() {
        let loader = PackageResourceLoader::from_values(
            "app",
            APP_PACKAGE_ID,
            [
                ("string", "a", ResValue::Text("@string/b".to_string())),
                ("string", "b", ResValue::Text("@string/a".to_string())),
            ],
        )
        .unwrap();
        let resources = Resources::new(Arc::new(loader), "app", Configuration::default());
        assert!(resources.get_text_by_name("@string/a").is_none());
    }
}
