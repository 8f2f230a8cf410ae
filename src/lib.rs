//! # appsim - Simulated Application Runtime for In-Process Tests
//!
//! appsim stands up a simulated application process inside a test run: a
//! composed resource set, a package registry, a main thread with a
//! cooperative task queue, and the application object itself. Every test gets
//! a clean environment; only composed resources are shared across tests.
//!
//! ## Core Concepts
//!
//! - **`EnvironmentLifecycle`**: drives the per-test setup/teardown protocol as a state machine
//! - **`ResourceLoaderCache`**: process-wide, single-flight cache of composed resource loaders
//! - **`SimulatedPackageRegistry`**: in-memory package manager and intent resolver
//! - **`MainThreadScheduler`**: virtual-time task queue of the simulated main thread
//! - **`PlatformShim`**: versioned construction of platform internals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use appsim::{
//!     AppManifest, Application, EnvironmentConfig, EnvironmentLifecycle, PlatformResources,
//!     SdkTarget, TestConfig, TestMethod,
//! };
//!
//! let mut lifecycle = EnvironmentLifecycle::new(EnvironmentConfig::default())?;
//! let platform = PlatformResources::empty("android");
//! let manifest = AppManifest::from_path("app/manifest.json".as_ref())?;
//! let factory = |_: &TestMethod, _: &AppManifest, _: &TestConfig| Some(Application::plain());
//!
//! lifecycle.set_sdk_config(SdkTarget::new(28))?;
//! lifecycle.reset_static_state()?;
//! lifecycle.set_up_application_state(
//!     &TestMethod::new("MainActivityTest", "shows_title"),
//!     &factory,
//!     &platform,
//!     &manifest,
//!     &TestConfig::default(),
//! )?;
//! // ... test body ...
//! lifecycle.tear_down_application()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Value objects and configuration
pub mod config;
pub mod error;
pub mod manifest;
pub mod qualifiers;
pub mod sdk;

// Simulated process services
pub mod application;
pub mod looper;
pub mod platform;
pub mod registry;
pub mod resources;
pub mod scheduler;

// Orchestration
pub mod environment;
pub mod lifecycle;
pub mod logging;

// Re-export primary types at crate root for convenience
pub use application::{
    Application, ApplicationFactory, ApplicationHooks, ApplicationId, ApplicationState, HookError, HookResult,
    NoopHooks,
};
pub use config::{EnvironmentConfig, TestConfig, TestMethod};
pub use environment::{EnvironmentId, RuntimeEnvironment};
pub use error::{
    LifecycleError, ManifestRegistrationError, PackageError, ResourceError, SimError, SimResult,
};
pub use lifecycle::{EnvironmentLifecycle, LifecycleState, TransitionRecord};
pub use looper::Looper;
pub use manifest::{
    ActivityData, AppManifest, IntentFilterData, JsonManifestProvider, ManifestId, ManifestProvider, ResourcePath,
};
pub use platform::{
    ActivityThread, DefaultShadowBinding, Instrumentation, LoadedPackage, PackageContext, PlatformShim,
    PlatformShimFactory, ShadowBindingService, ShimTable, StandardShim, SystemContext,
};
pub use qualifiers::Qualifiers;
pub use registry::{
    ActivityInfo, ApplicationInfo, ComponentName, Intent, PackageInfo, ResolveInfo, SimulatedPackageRegistry,
};
pub use resources::{
    CacheKey, ComposedResourceLoader, Configuration, DefaultResourceComposer, PlatformResourceProvider,
    PlatformResources, ResName, ResValue, ResourceCache, ResourceComposer, ResourceLoader, ResourceLoaderCache,
    Resources, RoutingResourceLoader,
};
pub use scheduler::{MainThreadScheduler, SchedulerHandle};
pub use sdk::SdkTarget;
