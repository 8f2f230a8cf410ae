//! Application namespace overlaid on top of its libraries.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::ResourceError;

use super::{ResName, ResValue, ResourceIndex, ResourceLoader, APP_PACKAGE_ID};

/// Merges several loaders into one namespace.
///
/// Lookups try each loader in declaration order and the first hit wins, so the
/// application's own paths shadow library paths declared after them.
#[derive(Debug)]
pub struct OverlayResourceLoader {
    namespace: String,
    layers: Vec<Arc<dyn ResourceLoader>>,
    index: ResourceIndex,
}

impl OverlayResourceLoader {
    /// Creates an overlay answering for `namespace`.
    pub fn new(namespace: impl Into<String>, layers: Vec<Arc<dyn ResourceLoader>>) -> Result<Self, ResourceError> {
        let namespace = namespace.into();
        let ns = namespace.as_str();
        let names: BTreeSet<ResName> = layers
            .iter()
            .flat_map(move |layer| layer.resource_index().names().map(move |name| name.with_package(ns)))
            .collect();
        let index = ResourceIndex::build(APP_PACKAGE_ID, names.iter())?;
        Ok(Self {
            namespace,
            layers,
            index,
        })
    }

    /// Number of layered loaders.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl ResourceLoader for OverlayResourceLoader {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get_value(&self, name: &ResName) -> Option<ResValue> {
        if name.package != self.namespace {
            return None;
        }
        self.layers
            .iter()
            .find_map(|layer| layer.get_value(&name.with_package(layer.namespace())))
    }

    fn resource_index(&self) -> &ResourceIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::PackageResourceLoader;

    fn layer(namespace: &str, entries: &[(&'static str, &'static str, &str)]) -> Arc<dyn ResourceLoader> {
        Arc::new(PackageResourceLoader::from_values(
            namespace,
            APP_PACKAGE_ID,
            entries
                .iter()
                .map(|(kind, name, value)| (*kind, *name, ResValue::Text((*value).to_string()))),
        )
        .unwrap())
    }

    #[test]
    fn earlier_layers_shadow_later_ones() {
        let app = layer("com.example", &[("string", "title", "App title")]);
        let lib = layer("com.lib", &[("string", "title", "Lib title"), ("string", "lib_only", "From lib")]);
        let overlay = OverlayResourceLoader::new("com.example", vec![app, lib]).unwrap();

        assert_eq!(overlay.layer_count(), 2);
        assert_eq!(
            overlay.get_value(&ResName::new("com.example", "string", "title")),
            Some(ResValue::Text("App title".to_string()))
        );
        assert_eq!(
            overlay.get_value(&ResName::new("com.example", "string", "lib_only")),
            Some(ResValue::Text("From lib".to_string()))
        );
        assert!(overlay.get_value(&ResName::new("com.lib", "string", "lib_only")).is_none());
    }

    #[test]
    fn index_covers_union_in_own_namespace() {
        let app = layer("com.example", &[("string", "title", "x")]);
        let lib = layer("com.lib", &[("string", "title", "y"), ("color", "accent", "#fff")]);
        let overlay = OverlayResourceLoader::new("com.example", vec![app, lib]).unwrap();

        let index = overlay.resource_index();
        assert_eq!(index.len(), 2);
        assert!(index.resource_id("@string/title", "com.example").is_some());
        assert!(index.resource_id("@color/accent", "com.example").is_some());
        assert!(index.resource_id("@com.lib:color/accent", "com.example").is_none());
    }
}
