//! Environment lifecycle orchestration.
//!
//! `EnvironmentLifecycle` drives the per-test protocol a harness calls in
//! this order:
//!
//! 1. `set_sdk_config` selects the platform shim for the simulated API level.
//! 2. `reset_static_state` discards the previous test's environment and makes
//!    the calling thread the main thread.
//! 3. `set_up_application_state` composes resources, registers the manifest,
//!    prepares the main looper and bootstraps the application.
//! 4. `tear_down_application` terminates and releases the application.
//!
//! Every step moves the `LifecycleState` machine forward; calling a step out
//! of order is an `IllegalTransition` rather than silent misconfiguration.
//! The resource cache is the only state that outlives a test.

pub mod state;

pub use state::{LifecycleState, TransitionRecord};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use chrono::Utc;

use crate::application::{Application, ApplicationFactory};
use crate::config::{EnvironmentConfig, TestConfig, TestMethod};
use crate::environment::{EnvironmentId, RuntimeEnvironment};
use crate::error::{LifecycleError, ManifestRegistrationError, PackageError, SimError, SimResult};
use crate::logging;
use crate::looper::Looper;
use crate::manifest::AppManifest;
use crate::platform::{
    ActivityThread, DefaultShadowBinding, PlatformShim, ShadowBindingService, ShimTable, SystemContext,
    SystemServices,
};
use crate::qualifiers::Qualifiers;
use crate::registry::{PackageInfo, SimulatedPackageRegistry};
use crate::resources::{
    Configuration, PlatformResourceProvider, ResName, ResourceCache, ResourceLoader, ResourceLoaderCache, Resources,
};
use crate::scheduler::MainThreadScheduler;
use crate::sdk::SdkTarget;

/// Resolves the manifest label reference to a resource id.
///
/// # Errors
/// - `MalformedLabel`: if the label is not an `@type/name` reference
/// - `UnresolvedLabel`: if the reference names no indexed resource
pub fn resolve_label(manifest: &AppManifest, resources: &Resources) -> Result<u32, ManifestRegistrationError> {
    let Some(label_ref) = manifest.label_ref.as_deref() else {
        return Ok(0);
    };
    if !label_ref.trim_start().starts_with('@') {
        return Err(ManifestRegistrationError::MalformedLabel {
            label_ref: label_ref.to_string(),
        });
    }
    let Some(name) = ResName::parse(label_ref, &manifest.package_name) else {
        return Err(ManifestRegistrationError::MalformedLabel {
            label_ref: label_ref.to_string(),
        });
    };
    resources
        .loader()
        .resource_index()
        .id_of(&name)
        .ok_or_else(|| ManifestRegistrationError::UnresolvedLabel {
            label_ref: label_ref.to_string(),
            package: manifest.package_name.clone(),
        })
}

/// Manifest meta-data with `@type/name` values replaced by their text.
/// Values that do not resolve are kept verbatim.
#[must_use]
pub fn resolve_meta_data(manifest: &AppManifest, resources: &Resources) -> BTreeMap<String, String> {
    manifest
        .meta_data
        .iter()
        .map(|(key, value)| {
            let resolved = if value.starts_with('@') {
                resources.get_text_by_name(value).unwrap_or_else(|| value.clone())
            } else {
                value.clone()
            };
            (key.clone(), resolved)
        })
        .collect()
}

/// Orchestrates setup and teardown of the simulated environment, one test at a time.
pub struct EnvironmentLifecycle {
    config: EnvironmentConfig,
    cache: Arc<dyn ResourceCache>,
    binder: Arc<dyn ShadowBindingService>,
    shims: ShimTable,
    sdk: Option<SdkTarget>,
    shim: Option<Arc<dyn PlatformShim>>,
    state: LifecycleState,
    transitions: Vec<TransitionRecord>,
    env: RuntimeEnvironment,
    // Prepared once per main thread and reused by every later test.
    main_looper: Option<Arc<Looper>>,
    logging_initialized: bool,
}

impl fmt::Debug for EnvironmentLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentLifecycle")
            .field("state", &self.state)
            .field("sdk", &self.sdk)
            .field("environment", &self.env.id())
            .finish_non_exhaustive()
    }
}

impl Default for EnvironmentLifecycle {
    fn default() -> Self {
        let config = EnvironmentConfig::default();
        let cache = ResourceLoaderCache::shared(&config.platform_package);
        Self::assemble(config, cache, Arc::new(DefaultShadowBinding), ShimTable::default())
    }
}

impl EnvironmentLifecycle {
    /// Creates a lifecycle backed by the process-wide resource cache of the
    /// configured platform package.
    ///
    /// # Errors
    /// - `Config`: if `config` fails validation
    pub fn new(config: EnvironmentConfig) -> SimResult<Self> {
        config.validate()?;
        let cache = ResourceLoaderCache::shared(&config.platform_package);
        Ok(Self::assemble(
            config,
            cache,
            Arc::new(DefaultShadowBinding),
            ShimTable::default(),
        ))
    }

    /// Creates a lifecycle with explicit collaborators.
    ///
    /// # Errors
    /// - `Config`: if `config` fails validation
    pub fn with_services(
        config: EnvironmentConfig,
        cache: Arc<dyn ResourceCache>,
        binder: Arc<dyn ShadowBindingService>,
        shims: ShimTable,
    ) -> SimResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, cache, binder, shims))
    }

    fn assemble(
        config: EnvironmentConfig,
        cache: Arc<dyn ResourceCache>,
        binder: Arc<dyn ShadowBindingService>,
        shims: ShimTable,
    ) -> Self {
        Self {
            config,
            cache,
            binder,
            shims,
            sdk: None,
            shim: None,
            state: LifecycleState::Idle,
            transitions: Vec::new(),
            env: RuntimeEnvironment::new(None),
            main_looper: None,
            logging_initialized: false,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every transition taken so far, oldest first.
    #[must_use]
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Configured platform version.
    #[must_use]
    pub fn sdk(&self) -> Option<SdkTarget> {
        self.sdk
    }

    /// Environment of the current test.
    #[must_use]
    pub fn environment(&self) -> &RuntimeEnvironment {
        &self.env
    }

    /// Identity of the current environment.
    #[must_use]
    pub fn environment_id(&self) -> EnvironmentId {
        self.env.id()
    }

    /// The application bound by the last successful setUp.
    #[must_use]
    pub fn current_application(&self) -> Option<Arc<Application>> {
        self.env.application.clone()
    }

    /// Thread currently designated as the main thread.
    #[must_use]
    pub fn main_thread(&self) -> Option<ThreadId> {
        self.env.main_thread
    }

    /// Hands the main-thread role to `thread`.
    pub fn set_main_thread(&mut self, thread: ThreadId) {
        self.env.main_thread = Some(thread);
    }

    /// Package registry of the current test.
    #[must_use]
    pub fn package_registry(&self) -> Arc<SimulatedPackageRegistry> {
        Arc::clone(&self.env.registry)
    }

    /// Main-thread scheduler of the current test.
    #[must_use]
    pub fn scheduler(&self) -> Arc<MainThreadScheduler> {
        Arc::clone(&self.env.scheduler)
    }

    /// Effective qualifiers of the current test.
    #[must_use]
    pub fn qualifiers(&self) -> &Qualifiers {
        &self.env.qualifiers
    }

    /// The main looper, once prepared.
    #[must_use]
    pub fn main_looper(&self) -> Option<Arc<Looper>> {
        self.main_looper.clone()
    }

    fn ensure(&self, to: LifecycleState) -> Result<(), LifecycleError> {
        if self.state.can_transition_to(to) {
            Ok(())
        } else {
            Err(LifecycleError::IllegalTransition { from: self.state, to })
        }
    }

    fn transition(&mut self, to: LifecycleState) -> Result<(), LifecycleError> {
        self.ensure(to)?;
        let from = self.state;
        self.transitions.push(TransitionRecord {
            environment: Some(self.env.id()),
            from,
            to,
            at: Utc::now(),
        });
        self.state = to;
        tracing::debug!(environment = %self.env.id(), from = %from, to = %to, "lifecycle transition");
        Ok(())
    }

    /// Selects the platform version for subsequent setUps.
    ///
    /// # Errors
    /// - `UnsupportedSdk`: if no shim covers `sdk`
    pub fn set_sdk_config(&mut self, sdk: SdkTarget) -> SimResult<()> {
        let shim = self.shims.select(sdk)?;
        tracing::debug!(sdk = %sdk, "sdk configured");
        self.sdk = Some(sdk);
        self.shim = Some(shim);
        Ok(())
    }

    /// Discards the previous test's environment and binds the calling thread
    /// as the main thread. Allowed from any state.
    ///
    /// An application left live by a skipped teardown is terminated first.
    pub fn reset_static_state(&mut self) -> SimResult<()> {
        if let Some(app) = self.env.application.take() {
            tracing::warn!(app = %app.id(), "previous application was not torn down; terminating it");
            if let Err(err) = app.on_terminate() {
                tracing::warn!(error = %err, "termination of leftover application failed");
            }
        }
        if let Some(thread) = &self.env.activity_thread {
            thread.release_application();
        }

        if self.config.init_logging && !self.logging_initialized {
            logging::init(&self.config.log_filter);
            self.logging_initialized = true;
        }

        self.env = RuntimeEnvironment::new(Some(thread::current().id()));
        self.transition(LifecycleState::Resetting)?;
        Ok(())
    }

    /// Bootstraps the simulated application for one test.
    ///
    /// Returns the created application, or `None` if `factory` produced none.
    /// On error no application is bound; the harness must not run the test.
    ///
    /// # Errors
    /// - `IllegalTransition`: if called without a preceding reset
    /// - `SdkNotConfigured`: if `set_sdk_config` was never called
    /// - `Resource`: if composing the manifest's resources fails
    /// - `Bootstrap`: if the manifest package is missing from the registry
    /// - `Hook`: if the application's creation hook fails
    pub fn set_up_application_state(
        &mut self,
        method: &TestMethod,
        factory: &dyn ApplicationFactory,
        platform: &dyn PlatformResourceProvider,
        manifest: &AppManifest,
        test_config: &TestConfig,
    ) -> SimResult<Option<Arc<Application>>> {
        self.ensure(LifecycleState::ResourcesReady)?;
        let (Some(sdk), Some(shim)) = (self.sdk, self.shim.clone()) else {
            return Err(LifecycleError::SdkNotConfigured.into());
        };
        tracing::debug!(test = %method, package = %manifest.package_name, sdk = %sdk, "setting up application state");

        let main_thread = thread::current().id();
        self.env.application = None;
        self.env.scheduler = Arc::new(MainThreadScheduler::new());
        self.env.main_thread = Some(main_thread);

        let configuration = self.prepare_resources(&*shim, sdk, platform, manifest, test_config)?;
        let app_resources = self.register_package(manifest, &configuration)?;
        let (activity_thread, system_context) =
            self.prepare_thread(&*shim, main_thread, &app_resources, &configuration)?;

        let application = factory.create_application(method, manifest, test_config);
        if let Some(app) = &application {
            let bootstrapped = self.bootstrap_application(
                app,
                manifest,
                &activity_thread,
                &system_context,
                &app_resources,
                &configuration,
            );
            if let Err(err) = bootstrapped {
                activity_thread.release_application();
                return Err(err);
            }
            self.env.application = Some(Arc::clone(app));
        } else {
            tracing::debug!(test = %method, "no application requested");
        }

        self.transition(LifecycleState::ApplicationBootstrapped)?;
        Ok(application)
    }

    fn prepare_resources(
        &mut self,
        shim: &dyn PlatformShim,
        sdk: SdkTarget,
        platform: &dyn PlatformResourceProvider,
        manifest: &AppManifest,
        test_config: &TestConfig,
    ) -> SimResult<Configuration> {
        let system_loader = platform.system_loader();
        let composed = self.cache.get(manifest, sdk, &system_loader)?;

        let width = self.config.default_screen_width_dp;
        let qualifiers = Qualifiers::new(&test_config.qualifiers)
            .with_platform_version(sdk.api_level())
            .with_smallest_screen_width(width)
            .with_screen_width(width);

        let system_resources = platform.system_resources();
        let mut configuration = system_resources.configuration();
        configuration.smallest_screen_width_dp = qualifiers.smallest_screen_width().unwrap_or(width);
        configuration.screen_width_dp = qualifiers.screen_width().unwrap_or(width);
        shim.override_qualifiers(&qualifiers, &mut configuration);
        system_resources.update_configuration(configuration.clone());
        tracing::debug!(qualifiers = %qualifiers, "effective qualifiers");

        self.env.app_loader = Some(composed);
        self.env.system_loader = Some(system_loader);
        self.env.system_resources = Some(system_resources);
        self.env.qualifiers = qualifiers;
        self.env.api_level = Some(sdk.api_level());
        self.transition(LifecycleState::ResourcesReady)?;
        Ok(configuration)
    }

    fn register_package(&mut self, manifest: &AppManifest, configuration: &Configuration) -> SimResult<Resources> {
        let composed = self
            .env
            .app_loader
            .clone()
            .ok_or_else(|| SimError::internal("composed loader missing after resources were prepared"))?;
        let loader: Arc<dyn ResourceLoader> = composed;
        let app_resources = Resources::new(loader, manifest.package_name.clone(), configuration.clone());

        let label_res = resolve_label(manifest, &app_resources).unwrap_or_else(|err| {
            tracing::warn!(package = %manifest.package_name, error = %err, "label did not resolve; using 0");
            0
        });
        let info = PackageInfo::from_manifest(manifest, label_res)
            .with_meta_data(resolve_meta_data(manifest, &app_resources));
        self.env.registry.add_package(info)?;

        self.env.app_resources = Some(app_resources.clone());
        self.transition(LifecycleState::PackageRegistered)?;
        Ok(app_resources)
    }

    fn prepare_thread(
        &mut self,
        shim: &dyn PlatformShim,
        main_thread: ThreadId,
        app_resources: &Resources,
        configuration: &Configuration,
    ) -> SimResult<(Arc<ActivityThread>, SystemContext)> {
        let looper = Looper::prepare_main_looper(&mut self.main_looper, main_thread, &self.env.scheduler);
        let activity_thread = Arc::new(shim.create_activity_thread(&looper, configuration.clone()));

        let system_resources = self
            .env
            .system_resources
            .clone()
            .unwrap_or_else(|| app_resources.clone());
        let services = SystemServices {
            registry: Arc::clone(&self.env.registry),
            app_resources: app_resources.clone(),
            system_resources,
        };
        let system_context = shim.create_system_context(&activity_thread, services);

        self.env.activity_thread = Some(Arc::clone(&activity_thread));
        self.env.system_context = Some(system_context.clone());
        self.transition(LifecycleState::ThreadPrepared)?;
        Ok((activity_thread, system_context))
    }

    fn bootstrap_application(
        &self,
        app: &Arc<Application>,
        manifest: &AppManifest,
        activity_thread: &ActivityThread,
        system_context: &SystemContext,
        app_resources: &Resources,
        configuration: &Configuration,
    ) -> SimResult<()> {
        let package = manifest.package_name.as_str();
        let bootstrap_err = |source: PackageError| LifecycleError::Bootstrap {
            package: package.to_string(),
            source,
        };

        self.binder.bind(app, manifest, &self.env.registry)?;

        let app_info = self.env.registry.get_application_info(package).map_err(bootstrap_err)?;
        let loaded = activity_thread.get_package_info(&app_info);
        let context = system_context.create_package_context(package).map_err(bootstrap_err)?;

        activity_thread.set_initial_application(Arc::clone(app));
        app.attach(context)?;

        let registered = self.env.registry.add_manifest_activities(manifest)?;
        tracing::debug!(package, activities = registered, "manifest activities registered");

        loaded.set_resources(app_resources.clone());
        loaded.set_application(Arc::clone(app));
        app_resources.update_configuration(configuration.clone());

        activity_thread.instrumentation().call_application_on_create(app)?;
        Ok(())
    }

    /// Terminates and releases the current application.
    ///
    /// The environment reaches `Terminated` and the application is released
    /// even if its termination hook fails; that failure is returned afterwards.
    /// The resource cache is left untouched.
    ///
    /// # Errors
    /// - `IllegalTransition`: if nothing was reset since the last teardown
    /// - `Hook`: if the termination hook failed
    pub fn tear_down_application(&mut self) -> SimResult<()> {
        self.ensure(LifecycleState::Terminated)?;

        let application = self.env.application.take();
        if let Some(thread) = &self.env.activity_thread {
            thread.release_application();
        }
        let result = application.map_or(Ok(()), |app| {
            tracing::debug!(app = %app.id(), "terminating application");
            app.on_terminate()
        });

        self.transition(LifecycleState::Terminated)?;
        result.map_err(SimError::from)
    }
}
