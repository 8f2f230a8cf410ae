//! Namespace routing between the platform and the application.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ResourceError;

use super::{ResName, ResValue, ResourceIndex, ResourceLoader};

/// The composed loader handed out by the resource cache.
pub type ComposedResourceLoader = RoutingResourceLoader;

/// Dispatches each lookup to the loader registered for the name's package.
#[derive(Debug)]
pub struct RoutingResourceLoader {
    primary: String,
    routes: BTreeMap<String, Arc<dyn ResourceLoader>>,
    index: ResourceIndex,
}

impl RoutingResourceLoader {
    /// Creates a router. `primary` is the namespace reported by `namespace()`,
    /// normally the application package.
    pub fn new(
        primary: impl Into<String>,
        loaders: impl IntoIterator<Item = (String, Arc<dyn ResourceLoader>)>,
    ) -> Result<Self, ResourceError> {
        let mut routes = BTreeMap::new();
        let mut index = ResourceIndex::default();
        for (package, loader) in loaders {
            if routes.contains_key(&package) {
                return Err(ResourceError::DuplicateNamespace { package });
            }
            index.merge(loader.resource_index());
            routes.insert(package, loader);
        }
        Ok(Self {
            primary: primary.into(),
            routes,
            index,
        })
    }

    /// Returns the loader serving `package`.
    #[must_use]
    pub fn route(&self, package: &str) -> Option<&Arc<dyn ResourceLoader>> {
        self.routes.get(package)
    }

    /// Routed namespaces, sorted.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

impl ResourceLoader for RoutingResourceLoader {
    fn namespace(&self) -> &str {
        &self.primary
    }

    fn get_value(&self, name: &ResName) -> Option<ResValue> {
        let Some(loader) = self.routes.get(&name.package) else {
            tracing::trace!(resource = %name, "no loader routed for package");
            return None;
        };
        loader.get_value(name)
    }

    fn resource_index(&self) -> &ResourceIndex {
        &self.index
    }
}
