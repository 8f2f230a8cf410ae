use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use appsim::{
    ActivityData, AppManifest, Application, ApplicationHooks, ApplicationState, ComponentName, Configuration,
    DefaultResourceComposer, DefaultShadowBinding, EnvironmentConfig, EnvironmentLifecycle, HookError,
    HookResult, Intent, IntentFilterData, LifecycleError, LifecycleState, PlatformResourceProvider,
    PlatformResources, PlatformShim, Qualifiers, ResValue, ResourceLoaderCache, ResourcePath, SdkTarget,
    ShadowBindingService, ShimTable, SimError, SimResult, SimulatedPackageRegistry, TestConfig, TestMethod,
};
use appsim::resources::{PackageResourceLoader, PLATFORM_PACKAGE_ID};
use tempfile::TempDir;

fn write_table(dir: &Path, file: &str, json: &str) {
    std::fs::write(dir.join(file), json).unwrap();
}

fn app_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_table(
        dir.path(),
        "strings.json",
        r#"{ "string": { "app_name": "Example", "api_key": "k-123", "greeting": "@string/app_name" } }"#,
    );
    dir
}

fn manifest(res_dir: &Path) -> AppManifest {
    AppManifest::new("com.example")
        .with_label("@string/app_name")
        .with_resource_path(ResourcePath::new("com.example", res_dir))
        .with_meta_data("com.example.API_KEY", "@string/api_key")
        .with_activity(ActivityData::new(".Foo"))
        .with_activity(ActivityData::new("com.other.Bar"))
        .with_activity(ActivityData::new(".Main").with_intent_filter(IntentFilterData {
            actions: vec!["android.intent.action.MAIN".to_string()],
            categories: vec!["android.intent.category.LAUNCHER".to_string()],
        }))
}

fn platform() -> PlatformResources {
    PlatformResources::new(Arc::new(PackageResourceLoader::from_values(
        "android",
        PLATFORM_PACKAGE_ID,
        [("string", "ok", ResValue::Text("OK".to_string()))],
    )
    .unwrap()))
}

fn lifecycle_with(binder: Arc<dyn ShadowBindingService>) -> EnvironmentLifecycle {
    let config = EnvironmentConfig {
        init_logging: false,
        ..EnvironmentConfig::default()
    };
    let cache = Arc::new(ResourceLoaderCache::new(Arc::new(DefaultResourceComposer::default())));
    let mut lifecycle = EnvironmentLifecycle::with_services(config, cache, binder, ShimTable::default()).unwrap();
    lifecycle.set_sdk_config(SdkTarget::new(28)).unwrap();
    lifecycle
}

fn lifecycle() -> EnvironmentLifecycle {
    lifecycle_with(Arc::new(DefaultShadowBinding))
}

fn method() -> TestMethod {
    TestMethod::new("ExampleTest", "bootstraps")
}

#[derive(Default)]
struct Recorder {
    created: AtomicUsize,
    terminated: AtomicUsize,
    fail_terminate: AtomicBool,
    seen_label: Mutex<Option<String>>,
    saw_package_manager: AtomicBool,
}

struct RecorderHooks(Arc<Recorder>);

impl ApplicationHooks for RecorderHooks {
    fn on_create(&mut self, app: &Application) -> HookResult {
        self.0.created.fetch_add(1, Ordering::SeqCst);
        let label = app.resources().and_then(|res| res.get_text_by_name("@string/greeting"));
        *self.0.seen_label.lock().unwrap() = label;
        self.0
            .saw_package_manager
            .store(app.package_manager().is_some(), Ordering::SeqCst);
        Ok(())
    }

    fn on_terminate(&mut self, _app: &Application) -> HookResult {
        self.0.terminated.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_terminate.load(Ordering::SeqCst) {
            return Err(HookError::new("release failed"));
        }
        Ok(())
    }
}

fn recording_factory(recorder: &Arc<Recorder>) -> impl Fn(&TestMethod, &AppManifest, &TestConfig) -> Option<Arc<Application>> {
    let recorder = Arc::clone(recorder);
    move |_: &TestMethod, _: &AppManifest, _: &TestConfig| Some(Application::new(RecorderHooks(Arc::clone(&recorder))))
}

#[test]
fn full_cycle_binds_then_releases_application() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let recorder = Arc::new(Recorder::default());
    let factory = recording_factory(&recorder);
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    let app = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap()
        .unwrap();

    assert_eq!(lifecycle.state(), LifecycleState::ApplicationBootstrapped);
    assert!(Arc::ptr_eq(&lifecycle.current_application().unwrap(), &app));
    assert_eq!(app.state(), ApplicationState::Created);
    assert_eq!(app.package_name().as_deref(), Some("com.example"));
    assert_eq!(recorder.created.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.seen_label.lock().unwrap().as_deref(), Some("Example"));
    assert!(recorder.saw_package_manager.load(Ordering::SeqCst));

    let resources = app.resources().unwrap();
    assert_eq!(resources.get_text_by_name("@android:string/ok").as_deref(), Some("OK"));

    let thread = lifecycle.environment().activity_thread().unwrap().clone();
    assert_eq!(thread.instrumentation().on_create_calls(), 1);
    assert!(Arc::ptr_eq(&thread.initial_application().unwrap(), &app));
    let loaded = thread.peek_package_info("com.example").unwrap();
    assert!(loaded.resources().unwrap().ptr_eq(&resources));

    lifecycle.tear_down_application().unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    assert!(lifecycle.current_application().is_none());
    assert_eq!(app.state(), ApplicationState::Terminated);
    assert_eq!(recorder.terminated.load(Ordering::SeqCst), 1);
    assert!(thread.initial_application().is_none());

    lifecycle.reset_static_state().unwrap();
    assert!(lifecycle.current_application().is_none());
    let next = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap()
        .unwrap();
    assert!(!Arc::ptr_eq(&next, &app));
    assert_ne!(next.id(), app.id());
    assert!(Arc::ptr_eq(&lifecycle.current_application().unwrap(), &next));
    assert_eq!(recorder.terminated.load(Ordering::SeqCst), 1);
}

#[test]
fn transition_log_records_the_protocol() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let factory = recording_factory(&Arc::new(Recorder::default()));
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    lifecycle.tear_down_application().unwrap();

    let walked: Vec<_> = lifecycle.transitions().iter().map(|t| t.to).collect();
    assert_eq!(
        walked,
        vec![
            LifecycleState::Resetting,
            LifecycleState::ResourcesReady,
            LifecycleState::PackageRegistered,
            LifecycleState::ThreadPrepared,
            LifecycleState::ApplicationBootstrapped,
            LifecycleState::Terminated,
        ]
    );
    let env = lifecycle.environment_id();
    assert!(lifecycle.transitions().iter().all(|t| t.environment == Some(env)));
    assert!(lifecycle.transitions().windows(2).all(|w| w[0].at <= w[1].at));
}

#[test]
fn factory_returning_none_leaves_no_application() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let factory = |_: &TestMethod, _: &AppManifest, _: &TestConfig| -> Option<Arc<Application>> { None };
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    let app = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();

    assert!(app.is_none());
    assert!(lifecycle.current_application().is_none());
    assert_eq!(lifecycle.state(), LifecycleState::ApplicationBootstrapped);
    assert!(lifecycle.package_registry().contains_package("com.example"));
    lifecycle.tear_down_application().unwrap();
}

#[test]
fn manifest_activities_are_registered_with_qualified_names() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let factory = recording_factory(&Arc::new(Recorder::default()));
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    let registry = lifecycle.package_registry();

    let foo = Intent::for_component(ComponentName::new("com.example", "com.example.Foo"));
    let resolved = registry.resolve_activity(&foo).unwrap().unwrap();
    assert_eq!(resolved.activity_info.unwrap().name, "com.example.Foo");

    assert!(registry.resolve_activity(&Intent::new("com.other.Bar")).unwrap().is_some());
    assert!(registry
        .resolve_activity(&Intent::new("com.example.com.other.Bar"))
        .unwrap()
        .is_none());

    let launcher = registry
        .query_intent_activities(&Intent::new("android.intent.action.MAIN"))
        .unwrap();
    assert_eq!(launcher.len(), 1);
    assert!(launcher[0].targets(&ComponentName::new("com.example", "com.example.Main")));
}

#[test]
fn application_info_carries_label_and_resolved_meta_data() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let factory = recording_factory(&Arc::new(Recorder::default()));
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    let app = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap()
        .unwrap();

    let info = lifecycle.package_registry().get_application_info("com.example").unwrap();
    assert_ne!(info.label_res, 0);
    let resources = app.resources().unwrap();
    assert_eq!(resources.get_text(info.label_res).as_deref(), Some("Example"));
    assert_eq!(info.meta_data["com.example.API_KEY"], "k-123");
    assert_eq!(app.base_context().unwrap().application_info(), &info);
}

#[test]
fn unresolved_label_degrades_to_zero() {
    let dir = app_dir();
    let manifest = manifest(dir.path()).with_label("@string/not_there");
    let platform = platform();
    let factory = recording_factory(&Arc::new(Recorder::default()));
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();

    let info = lifecycle.package_registry().get_application_info("com.example").unwrap();
    assert_eq!(info.label_res, 0);
    assert!(lifecycle.current_application().is_some());
}

#[test]
fn effective_qualifiers_carry_platform_version_and_width_defaults() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let factory = recording_factory(&Arc::new(Recorder::default()));
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    assert_eq!(lifecycle.qualifiers().as_str(), "v28-sw320dp-w320dp");
    let config = platform.system_resources().configuration();
    assert_eq!(config.smallest_screen_width_dp, 320);
    assert_eq!(config.screen_width_dp, 320);
    assert_eq!(config.api_level, 28);
    let app_config = lifecycle.current_application().unwrap().resources().unwrap().configuration();
    assert_eq!(app_config, config);
    lifecycle.tear_down_application().unwrap();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(
            &method(),
            &factory,
            &platform,
            &manifest,
            &TestConfig::with_qualifiers("en-port-sw600dp"),
        )
        .unwrap();
    let qualifiers = lifecycle.qualifiers();
    assert_eq!(qualifiers.as_str(), "en-port-sw600dp-v28-w320dp");
    assert_eq!(qualifiers.smallest_screen_width(), Some(600));
    assert_eq!(platform.system_resources().configuration().smallest_screen_width_dp, 600);
}

struct UninstallingBinder;

impl ShadowBindingService for UninstallingBinder {
    fn bind(
        &self,
        _app: &Arc<Application>,
        manifest: &AppManifest,
        registry: &Arc<SimulatedPackageRegistry>,
    ) -> SimResult<()> {
        registry.remove_package(&manifest.package_name)?;
        Ok(())
    }
}

#[test]
fn missing_package_is_fatal_and_skips_creation() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let recorder = Arc::new(Recorder::default());
    let factory = recording_factory(&recorder);
    let mut lifecycle = lifecycle_with(Arc::new(UninstallingBinder));

    lifecycle.reset_static_state().unwrap();
    let err = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap_err();

    assert!(err.is_package_not_found());
    assert!(!err.is_retryable());
    assert!(matches!(
        err,
        SimError::Lifecycle(LifecycleError::Bootstrap { ref package, .. }) if package == "com.example"
    ));
    assert_eq!(recorder.created.load(Ordering::SeqCst), 0);
    assert!(lifecycle.current_application().is_none());
    let thread = lifecycle.environment().activity_thread().unwrap();
    assert!(thread.initial_application().is_none());
    assert_eq!(thread.instrumentation().on_create_calls(), 0);
    assert!(lifecycle
        .package_registry()
        .resolve_activity(&Intent::new("com.example.Foo"))
        .unwrap()
        .is_none());

    lifecycle.tear_down_application().unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Terminated);
}

#[test]
fn resource_failure_aborts_before_application_exists() {
    let missing = tempfile::tempdir().unwrap().path().join("gone");
    let manifest = AppManifest::new("com.broken").with_resource_path(ResourcePath::new("com.broken", missing));
    let platform = platform();
    let factory_called = AtomicBool::new(false);
    let factory = |_: &TestMethod, _: &AppManifest, _: &TestConfig| -> Option<Arc<Application>> {
        factory_called.store(true, Ordering::SeqCst);
        Some(Application::plain())
    };
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    let err = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap_err();

    assert!(err.is_resource());
    assert!(!factory_called.load(Ordering::SeqCst));
    assert!(lifecycle.current_application().is_none());
    assert_eq!(lifecycle.state(), LifecycleState::Resetting);
    assert!(!lifecycle.package_registry().contains_package("com.broken"));
}

#[test]
fn failing_termination_hook_still_terminates() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let recorder = Arc::new(Recorder::default());
    recorder.fail_terminate.store(true, Ordering::SeqCst);
    let factory = recording_factory(&recorder);
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    let app = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap()
        .unwrap();
    let loader = lifecycle.environment().app_loader().unwrap().clone();

    let err = lifecycle.tear_down_application().unwrap_err();
    assert!(matches!(
        err,
        SimError::Lifecycle(LifecycleError::Hook { hook: "on_terminate", .. })
    ));
    assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    assert!(lifecycle.current_application().is_none());
    assert_eq!(app.state(), ApplicationState::Terminated);

    recorder.fail_terminate.store(false, Ordering::SeqCst);
    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    assert!(Arc::ptr_eq(lifecycle.environment().app_loader().unwrap(), &loader));
}

#[test]
fn reset_terminates_application_left_by_skipped_teardown() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let recorder = Arc::new(Recorder::default());
    let factory = recording_factory(&recorder);
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    let leaked = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap()
        .unwrap();

    lifecycle.reset_static_state().unwrap();
    assert_eq!(leaked.state(), ApplicationState::Terminated);
    assert_eq!(recorder.terminated.load(Ordering::SeqCst), 1);
    assert!(lifecycle.current_application().is_none());
    assert_eq!(lifecycle.state(), LifecycleState::Resetting);
}

#[test]
fn each_test_gets_a_fresh_scheduler_on_the_same_looper() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let factory = recording_factory(&Arc::new(Recorder::default()));
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    let first_scheduler = lifecycle.scheduler();
    let first_looper = lifecycle.main_looper().unwrap();
    first_scheduler.post(|| {});
    lifecycle.tear_down_application().unwrap();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    let second_scheduler = lifecycle.scheduler();
    let second_looper = lifecycle.main_looper().unwrap();

    assert!(!Arc::ptr_eq(&first_scheduler, &second_scheduler));
    assert!(second_scheduler.is_idle());
    assert!(Arc::ptr_eq(&first_looper, &second_looper));
    assert!(Arc::ptr_eq(&second_looper.scheduler(), &second_scheduler));
    assert_eq!(lifecycle.main_thread(), Some(std::thread::current().id()));
}

#[test]
fn sdk_config_picks_shim_for_setup() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let factory = recording_factory(&Arc::new(Recorder::default()));
    let mut lifecycle = lifecycle();
    lifecycle.set_sdk_config(SdkTarget::new(33)).unwrap();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    assert_eq!(lifecycle.qualifiers().platform_version(), Some(33));
    let thread = lifecycle.environment().activity_thread().unwrap();
    assert_eq!(thread.sdk(), SdkTarget::new(33));
    assert_eq!(lifecycle.environment().api_level(), Some(33));
}

/// Copies the qualifier string and nothing else.
#[derive(Debug)]
struct QualifierStringShim(SdkTarget);

impl PlatformShim for QualifierStringShim {
    fn sdk(&self) -> SdkTarget {
        self.0
    }

    fn override_qualifiers(&self, qualifiers: &Qualifiers, configuration: &mut Configuration) {
        configuration.qualifiers = qualifiers.to_string();
    }
}

#[test]
fn screen_widths_follow_qualifiers_under_custom_shim() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let factory = recording_factory(&Arc::new(Recorder::default()));
    let config = EnvironmentConfig {
        init_logging: false,
        ..EnvironmentConfig::default()
    };
    let cache = Arc::new(ResourceLoaderCache::new(Arc::new(DefaultResourceComposer::default())));
    let shims = ShimTable::empty().with(16, |sdk: SdkTarget| Arc::new(QualifierStringShim(sdk)) as Arc<dyn PlatformShim>);
    let mut lifecycle =
        EnvironmentLifecycle::with_services(config, cache, Arc::new(DefaultShadowBinding), shims).unwrap();
    lifecycle.set_sdk_config(SdkTarget::new(28)).unwrap();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(
            &method(),
            &factory,
            &platform,
            &manifest,
            &TestConfig::with_qualifiers("sw600dp-w720dp"),
        )
        .unwrap();

    let config = platform.system_resources().configuration();
    assert_eq!(config.qualifiers, "sw600dp-w720dp-v28");
    assert_eq!(config.smallest_screen_width_dp, 600);
    assert_eq!(config.screen_width_dp, 720);

    lifecycle.tear_down_application().unwrap();
    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    let config = platform.system_resources().configuration();
    assert_eq!(config.smallest_screen_width_dp, 320);
    assert_eq!(config.screen_width_dp, 320);
}

#[test]
fn reused_application_is_rejected_by_binding() {
    let dir = app_dir();
    let manifest = manifest(dir.path());
    let platform = platform();
    let shared = Application::plain();
    let factory = {
        let shared = Arc::clone(&shared);
        move |_: &TestMethod, _: &AppManifest, _: &TestConfig| Some(Arc::clone(&shared))
    };
    let mut lifecycle = lifecycle();

    lifecycle.reset_static_state().unwrap();
    lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap();
    lifecycle.tear_down_application().unwrap();

    lifecycle.reset_static_state().unwrap();
    let err = lifecycle
        .set_up_application_state(&method(), &factory, &platform, &manifest, &TestConfig::default())
        .unwrap_err();
    assert!(matches!(err, SimError::Lifecycle(LifecycleError::Binding { .. })));
    assert!(lifecycle.current_application().is_none());
    assert_eq!(shared.state(), ApplicationState::Terminated);
}
