//! System and package contexts.

use std::sync::Arc;

use crate::error::PackageError;
use crate::registry::{ApplicationInfo, SimulatedPackageRegistry};
use crate::resources::Resources;

use super::ActivityThread;

/// Services a system context hands out to package contexts.
#[derive(Debug, Clone)]
pub struct SystemServices {
    /// Package registry of the running test.
    pub registry: Arc<SimulatedPackageRegistry>,
    /// Resources bound to the application package.
    pub app_resources: Resources,
    /// Platform resources.
    pub system_resources: Resources,
}

/// Process-level context created from the activity thread.
#[derive(Debug, Clone)]
pub struct SystemContext {
    thread: Arc<ActivityThread>,
    services: SystemServices,
}

impl SystemContext {
    /// Creates a system context owned by `thread`.
    #[must_use]
    pub fn new(thread: Arc<ActivityThread>, services: SystemServices) -> Self {
        Self { thread, services }
    }

    /// Owning activity thread.
    #[must_use]
    pub fn activity_thread(&self) -> &Arc<ActivityThread> {
        &self.thread
    }

    /// Platform resources.
    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.services.system_resources
    }

    /// Package registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SimulatedPackageRegistry> {
        &self.services.registry
    }

    /// Creates a context scoped to `package`.
    ///
    /// # Errors
    /// - `PackageNotFound`: if `package` is not in the registry
    pub fn create_package_context(&self, package: &str) -> Result<PackageContext, PackageError> {
        let application_info = self.services.registry.get_application_info(package)?;
        Ok(PackageContext {
            package_name: package.to_string(),
            resources: self.services.app_resources.clone(),
            registry: Arc::clone(&self.services.registry),
            application_info,
        })
    }
}

/// Context scoped to one installed package.
#[derive(Debug, Clone)]
pub struct PackageContext {
    package_name: String,
    resources: Resources,
    registry: Arc<SimulatedPackageRegistry>,
    application_info: ApplicationInfo,
}

impl PackageContext {
    /// Package this context belongs to.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Package resources.
    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Package manager seen through this context.
    #[must_use]
    pub fn registry(&self) -> &Arc<SimulatedPackageRegistry> {
        &self.registry
    }

    /// Application info captured when the context was created.
    #[must_use]
    pub fn application_info(&self) -> &ApplicationInfo {
        &self.application_info
    }
}
