//! Builds the routed application loader from a manifest.

use std::sync::Arc;

use crate::error::ResourceError;
use crate::manifest::{AppManifest, ResourcePath};

use super::{OverlayResourceLoader, PackageResourceLoader, ResourceLoader, RoutingResourceLoader, APP_PACKAGE_ID};

/// Composes platform base resources with a manifest's resource paths.
pub trait ResourceComposer: Send + Sync {
    /// Builds the composed loader. Fails without side effects if any
    /// resource path cannot be loaded.
    fn compose(
        &self,
        base: Arc<dyn ResourceLoader>,
        manifest: &AppManifest,
    ) -> Result<RoutingResourceLoader, ResourceError>;
}

/// Default composition: one `PackageResourceLoader` per resource path, an
/// overlay in declaration order, routed next to the platform namespace.
#[derive(Debug, Clone)]
pub struct DefaultResourceComposer {
    platform_package: String,
}

impl DefaultResourceComposer {
    /// Creates a composer routing base resources under `platform_package`.
    #[must_use]
    pub fn new(platform_package: impl Into<String>) -> Self {
        Self {
            platform_package: platform_package.into(),
        }
    }

    /// Namespace base resources are routed under.
    #[must_use]
    pub fn platform_package(&self) -> &str {
        &self.platform_package
    }

    /// Loads a single resource path.
    pub fn create_resource_loader(&self, path: &ResourcePath) -> Result<PackageResourceLoader, ResourceError> {
        PackageResourceLoader::load(path, APP_PACKAGE_ID)
    }
}

impl Default for DefaultResourceComposer {
    fn default() -> Self {
        Self::new("android")
    }
}

impl ResourceComposer for DefaultResourceComposer {
    fn compose(
        &self,
        base: Arc<dyn ResourceLoader>,
        manifest: &AppManifest,
    ) -> Result<RoutingResourceLoader, ResourceError> {
        let mut layers: Vec<Arc<dyn ResourceLoader>> = Vec::with_capacity(manifest.resource_paths.len());
        for path in &manifest.resource_paths {
            layers.push(Arc::new(self.create_resource_loader(path)?));
        }
        let overlay = OverlayResourceLoader::new(manifest.package_name.clone(), layers)?;

        tracing::debug!(
            package = %manifest.package_name,
            paths = manifest.resource_paths.len(),
            resources = overlay.resource_index().len(),
            "composed application resources"
        );

        RoutingResourceLoader::new(
            manifest.package_name.clone(),
            [
                (self.platform_package.clone(), base),
                (manifest.package_name.clone(), Arc::new(overlay) as Arc<dyn ResourceLoader>),
            ],
        )
    }
}
