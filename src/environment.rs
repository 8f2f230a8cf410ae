//! Per-test runtime environment.
//!
//! Everything a test can observe about the simulated process lives here:
//! main thread, scheduler, registry, resources and the application. A fresh
//! environment is installed by every `reset_static_state`; only the main
//! looper carries over between tests.

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::Application;
use crate::platform::{ActivityThread, SystemContext};
use crate::qualifiers::Qualifiers;
use crate::registry::SimulatedPackageRegistry;
use crate::resources::{ComposedResourceLoader, ResourceLoader, Resources};
use crate::scheduler::MainThreadScheduler;

/// Identifies one reset-to-teardown cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentId(Uuid);

impl EnvironmentId {
    /// Create a new random environment ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EnvironmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Simulated process state of the running test.
#[derive(Debug)]
pub struct RuntimeEnvironment {
    id: EnvironmentId,
    pub(crate) main_thread: Option<ThreadId>,
    pub(crate) scheduler: Arc<MainThreadScheduler>,
    pub(crate) registry: Arc<SimulatedPackageRegistry>,
    pub(crate) app_loader: Option<Arc<ComposedResourceLoader>>,
    pub(crate) system_loader: Option<Arc<dyn ResourceLoader>>,
    pub(crate) system_resources: Option<Resources>,
    pub(crate) app_resources: Option<Resources>,
    pub(crate) qualifiers: Qualifiers,
    pub(crate) api_level: Option<u32>,
    pub(crate) activity_thread: Option<Arc<ActivityThread>>,
    pub(crate) system_context: Option<SystemContext>,
    pub(crate) application: Option<Arc<Application>>,
}

impl RuntimeEnvironment {
    /// A clean environment bound to `main_thread`.
    #[must_use]
    pub fn new(main_thread: Option<ThreadId>) -> Self {
        Self {
            id: EnvironmentId::new(),
            main_thread,
            scheduler: Arc::new(MainThreadScheduler::new()),
            registry: Arc::new(SimulatedPackageRegistry::new()),
            app_loader: None,
            system_loader: None,
            system_resources: None,
            app_resources: None,
            qualifiers: Qualifiers::default(),
            api_level: None,
            activity_thread: None,
            system_context: None,
            application: None,
        }
    }

    /// Environment identity.
    #[must_use]
    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    /// Thread currently designated as the main thread.
    #[must_use]
    pub fn main_thread(&self) -> Option<ThreadId> {
        self.main_thread
    }

    /// Scheduler of the main thread.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<MainThreadScheduler> {
        &self.scheduler
    }

    /// Package registry of this test.
    #[must_use]
    pub fn registry(&self) -> &Arc<SimulatedPackageRegistry> {
        &self.registry
    }

    /// Composed application loader, once resources are ready.
    #[must_use]
    pub fn app_loader(&self) -> Option<&Arc<ComposedResourceLoader>> {
        self.app_loader.as_ref()
    }

    /// Platform loader, once resources are ready.
    #[must_use]
    pub fn system_loader(&self) -> Option<&Arc<dyn ResourceLoader>> {
        self.system_loader.as_ref()
    }

    /// Platform resources with the effective configuration applied.
    #[must_use]
    pub fn system_resources(&self) -> Option<&Resources> {
        self.system_resources.as_ref()
    }

    /// Application resources, once the package is registered.
    #[must_use]
    pub fn app_resources(&self) -> Option<&Resources> {
        self.app_resources.as_ref()
    }

    /// Effective qualifiers.
    #[must_use]
    pub fn qualifiers(&self) -> &Qualifiers {
        &self.qualifiers
    }

    /// Simulated API level.
    #[must_use]
    pub fn api_level(&self) -> Option<u32> {
        self.api_level
    }

    /// Activity thread, once prepared.
    #[must_use]
    pub fn activity_thread(&self) -> Option<&Arc<ActivityThread>> {
        self.activity_thread.as_ref()
    }

    /// System context, once prepared.
    #[must_use]
    pub fn system_context(&self) -> Option<&SystemContext> {
        self.system_context.as_ref()
    }

    /// The bound application.
    #[must_use]
    pub fn application(&self) -> Option<&Arc<Application>> {
        self.application.as_ref()
    }
}
