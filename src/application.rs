//! The application object under test.
//!
//! One `Application` is live per test. It is built by the harness-supplied
//! `ApplicationFactory`, attached to a package context during bootstrap, and
//! driven through its creation and termination hooks by the lifecycle.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{TestConfig, TestMethod};
use crate::error::LifecycleError;
use crate::manifest::AppManifest;
use crate::platform::PackageContext;
use crate::registry::SimulatedPackageRegistry;
use crate::resources::Resources;

/// Failure reported by an application hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    /// Creates a hook error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result returned by application hooks.
pub type HookResult = Result<(), HookError>;

/// Behaviour of the application under test.
pub trait ApplicationHooks: Send {
    /// Called once the application is attached and its resources are bound.
    fn on_create(&mut self, _app: &Application) -> HookResult {
        Ok(())
    }

    /// Called when the test environment is torn down.
    fn on_terminate(&mut self, _app: &Application) -> HookResult {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ApplicationHooks for NoopHooks {}

/// Builds the application for a test. Returning `None` is valid for tests
/// that run without an application.
pub trait ApplicationFactory {
    /// Creates the application for `method`.
    fn create_application(
        &self,
        method: &TestMethod,
        manifest: &AppManifest,
        config: &TestConfig,
    ) -> Option<Arc<Application>>;
}

impl<F> ApplicationFactory for F
where
    F: Fn(&TestMethod, &AppManifest, &TestConfig) -> Option<Arc<Application>>,
{
    fn create_application(
        &self,
        method: &TestMethod,
        manifest: &AppManifest,
        config: &TestConfig,
    ) -> Option<Arc<Application>> {
        self(method, manifest, config)
    }
}

/// Lifecycle of an application instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    /// Built by the factory, not yet attached.
    Constructed,
    /// Attached to its package context.
    Attached,
    /// Creation hook has run.
    Created,
    /// Termination hook has run.
    Terminated,
}

/// Stable identifier of an application instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(Uuid);

impl ApplicationId {
    /// Create a new random application ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct AppInner {
    state: ApplicationState,
    context: Option<PackageContext>,
    package_manager: Option<Arc<SimulatedPackageRegistry>>,
}

/// The process-wide application singleton of one test.
pub struct Application {
    id: ApplicationId,
    hooks: Mutex<Box<dyn ApplicationHooks>>,
    inner: RwLock<AppInner>,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Creates an application driven by `hooks`.
    #[must_use]
    pub fn new(hooks: impl ApplicationHooks + 'static) -> Arc<Self> {
        Arc::new(Self {
            id: ApplicationId::new(),
            hooks: Mutex::new(Box::new(hooks)),
            inner: RwLock::new(AppInner {
                state: ApplicationState::Constructed,
                context: None,
                package_manager: None,
            }),
        })
    }

    /// Creates an application with no behaviour of its own.
    #[must_use]
    pub fn plain() -> Arc<Self> {
        Self::new(NoopHooks)
    }

    /// Instance identity.
    #[must_use]
    pub fn id(&self) -> ApplicationId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ApplicationState {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state
    }

    /// Binds the package manager the application sees.
    pub fn bind_package_manager(&self, registry: Arc<SimulatedPackageRegistry>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .package_manager = Some(registry);
    }

    /// Package manager bound by the shadow binding, falling back to the one
    /// of the attached context.
    #[must_use]
    pub fn package_manager(&self) -> Option<Arc<SimulatedPackageRegistry>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .package_manager
            .clone()
            .or_else(|| inner.context.as_ref().map(|ctx| Arc::clone(ctx.registry())))
    }

    /// Attaches the application to its package context.
    pub fn attach(&self, context: PackageContext) -> Result<(), LifecycleError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.context.is_some() {
            return Err(LifecycleError::AlreadyAttached);
        }
        inner.context = Some(context);
        inner.state = ApplicationState::Attached;
        Ok(())
    }

    /// The attached package context.
    #[must_use]
    pub fn base_context(&self) -> Option<PackageContext> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .context
            .clone()
    }

    /// Resources of the attached context.
    #[must_use]
    pub fn resources(&self) -> Option<Resources> {
        self.base_context().map(|ctx| ctx.resources().clone())
    }

    /// Package name of the attached context.
    #[must_use]
    pub fn package_name(&self) -> Option<String> {
        self.base_context().map(|ctx| ctx.package_name().to_string())
    }

    fn set_state(&self, state: ApplicationState) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).state = state;
    }

    /// Runs the creation hook.
    pub(crate) fn on_create(&self) -> Result<(), LifecycleError> {
        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        hooks.on_create(self).map_err(|e| LifecycleError::Hook {
            hook: "on_create",
            message: e.to_string(),
        })?;
        drop(hooks);
        self.set_state(ApplicationState::Created);
        Ok(())
    }

    /// Runs the termination hook. The application is terminated even if the hook fails.
    pub fn on_terminate(&self) -> Result<(), LifecycleError> {
        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        let result = hooks.on_terminate(self);
        drop(hooks);
        self.set_state(ApplicationState::Terminated);
        result.map_err(|e| LifecycleError::Hook {
            hook: "on_terminate",
            message: e.to_string(),
        })
    }
}
