//! Base platform resources.

use std::sync::Arc;

use super::{Configuration, PackageResourceLoader, Resources, ResourceLoader};

/// Supplies the un-composed platform resource set and its mutable configuration.
pub trait PlatformResourceProvider: Send + Sync {
    /// Loader for the platform namespace.
    fn system_loader(&self) -> Arc<dyn ResourceLoader>;

    /// System resources; their configuration is the one setUp rewrites.
    fn system_resources(&self) -> Resources;
}

/// In-process platform resources.
#[derive(Debug, Clone)]
pub struct PlatformResources {
    resources: Resources,
}

impl PlatformResources {
    /// Wraps a platform loader with a default configuration.
    #[must_use]
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        let namespace = loader.namespace().to_string();
        Self {
            resources: Resources::new(loader, namespace, Configuration::default()),
        }
    }

    /// Platform resources with no entries.
    #[must_use]
    pub fn empty(platform_package: &str) -> Self {
        Self::new(Arc::new(PackageResourceLoader::empty(platform_package)))
    }
}

impl PlatformResourceProvider for PlatformResources {
    fn system_loader(&self) -> Arc<dyn ResourceLoader> {
        Arc::clone(self.resources.loader())
    }

    fn system_resources(&self) -> Resources {
        self.resources.clone()
    }
}
