//! Activity thread, instrumentation and loaded package records.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::application::Application;
use crate::error::LifecycleError;
use crate::looper::Looper;
use crate::registry::ApplicationInfo;
use crate::resources::{Configuration, Resources};
use crate::sdk::SdkTarget;

/// Drives application hooks on behalf of the activity thread.
#[derive(Debug, Default)]
pub struct Instrumentation {
    on_create_calls: AtomicUsize,
}

impl Instrumentation {
    /// Creates an instrumentation with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the application's creation hook.
    pub fn call_application_on_create(&self, app: &Application) -> Result<(), LifecycleError> {
        self.on_create_calls.fetch_add(1, Ordering::Relaxed);
        app.on_create()
    }

    /// Number of creation hooks driven so far.
    #[must_use]
    pub fn on_create_calls(&self) -> usize {
        self.on_create_calls.load(Ordering::Relaxed)
    }
}

/// Runtime record of an installed package: its info, resources and application.
#[derive(Debug)]
pub struct LoadedPackage {
    application_info: ApplicationInfo,
    resources: RwLock<Option<Resources>>,
    application: RwLock<Option<Arc<Application>>>,
}

impl LoadedPackage {
    fn new(application_info: ApplicationInfo) -> Self {
        Self {
            application_info,
            resources: RwLock::new(None),
            application: RwLock::new(None),
        }
    }

    /// Application info the record was created from.
    #[must_use]
    pub fn application_info(&self) -> &ApplicationInfo {
        &self.application_info
    }

    /// Package name.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.application_info.package_name
    }

    /// Bound resources.
    #[must_use]
    pub fn resources(&self) -> Option<Resources> {
        self.resources.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Binds the package resources.
    pub fn set_resources(&self, resources: Resources) {
        *self.resources.write().unwrap_or_else(PoisonError::into_inner) = Some(resources);
    }

    /// Bound application.
    #[must_use]
    pub fn application(&self) -> Option<Arc<Application>> {
        self.application.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Binds the package application.
    pub fn set_application(&self, application: Arc<Application>) {
        *self.application.write().unwrap_or_else(PoisonError::into_inner) = Some(application);
    }
}

#[derive(Default)]
struct ThreadState {
    initial_application: Option<Arc<Application>>,
    packages: HashMap<String, Arc<LoadedPackage>>,
}

/// Simulated activity thread: the process's view of its runtime.
pub struct ActivityThread {
    sdk: SdkTarget,
    looper: Arc<Looper>,
    instrumentation: Instrumentation,
    compat_configuration: Configuration,
    state: RwLock<ThreadState>,
}

impl fmt::Debug for ActivityThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityThread")
            .field("sdk", &self.sdk)
            .field("looper", &self.looper.thread())
            .field("compat_configuration", &self.compat_configuration)
            .finish_non_exhaustive()
    }
}

impl ActivityThread {
    /// Creates a thread bound to the prepared main `looper`.
    #[must_use]
    pub fn new(sdk: SdkTarget, looper: Arc<Looper>, compat_configuration: Configuration) -> Self {
        Self {
            sdk,
            looper,
            instrumentation: Instrumentation::new(),
            compat_configuration,
            state: RwLock::new(ThreadState::default()),
        }
    }

    /// Platform version this thread simulates.
    #[must_use]
    pub fn sdk(&self) -> SdkTarget {
        self.sdk
    }

    /// Main looper.
    #[must_use]
    pub fn looper(&self) -> &Arc<Looper> {
        &self.looper
    }

    /// Instrumentation stand-in.
    #[must_use]
    pub fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }

    /// Compatibility configuration captured at construction.
    #[must_use]
    pub fn compat_configuration(&self) -> &Configuration {
        &self.compat_configuration
    }

    /// Application first bound to this thread.
    #[must_use]
    pub fn initial_application(&self) -> Option<Arc<Application>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .initial_application
            .clone()
    }

    /// Records the process application.
    pub fn set_initial_application(&self, application: Arc<Application>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .initial_application = Some(application);
    }

    /// Drops every reference this thread holds to an application.
    pub fn release_application(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.initial_application = None;
        for package in state.packages.values() {
            *package.application.write().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    /// Returns the loaded record for the package described by `info`,
    /// creating it on first request.
    pub fn get_package_info(&self, info: &ApplicationInfo) -> Arc<LoadedPackage> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            state
                .packages
                .entry(info.package_name.clone())
                .or_insert_with(|| Arc::new(LoadedPackage::new(info.clone()))),
        )
    }

    /// Loaded package by name.
    #[must_use]
    pub fn peek_package_info(&self, package: &str) -> Option<Arc<LoadedPackage>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .packages
            .get(package)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::AppManifest;
    use crate::registry::PackageInfo;
    use crate::scheduler::MainThreadScheduler;

    fn thread() -> ActivityThread {
        let mut slot = None;
        let scheduler = Arc::new(MainThreadScheduler::new());
        let looper = Looper::prepare_main_looper(&mut slot, std::thread::current().id(), &scheduler);
        ActivityThread::new(SdkTarget::new(28), looper, Configuration::default())
    }

    #[test]
    fn package_records_are_reused() {
        let thread = thread();
        let info = PackageInfo::from_manifest(&AppManifest::new("com.example"), 0).application_info;
        let first = thread.get_package_info(&info);
        let second = thread.get_package_info(&info);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.package_name(), "com.example");
        assert!(thread.peek_package_info("com.other").is_none());
    }

    #[test]
    fn instrumentation_counts_creation() {
        let thread = thread();
        let app = Application::plain();
        thread.instrumentation().call_application_on_create(&app).unwrap();
        assert_eq!(thread.instrumentation().on_create_calls(), 1);
        thread.set_initial_application(Arc::clone(&app));
        assert!(Arc::ptr_eq(&thread.initial_application().unwrap(), &app));
    }

    #[test]
    fn release_drops_application_references() {
        let thread = thread();
        let app = Application::plain();
        let info = PackageInfo::from_manifest(&AppManifest::new("com.example"), 0).application_info;
        thread.set_initial_application(Arc::clone(&app));
        thread.get_package_info(&info).set_application(Arc::clone(&app));

        thread.release_application();
        assert!(thread.initial_application().is_none());
        assert!(thread.peek_package_info("com.example").unwrap().application().is_none());
        assert_eq!(Arc::strong_count(&app), 1);
    }
}
