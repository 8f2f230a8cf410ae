use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use appsim::resources::{PackageResourceLoader, APP_PACKAGE_ID, PLATFORM_PACKAGE_ID};
use appsim::{
    AppManifest, Application, CacheKey, ComposedResourceLoader, EnvironmentConfig, EnvironmentLifecycle,
    PlatformResources, ResValue, ResourceCache, ResourceComposer, ResourceError, ResourceLoader,
    ResourceLoaderCache, RoutingResourceLoader, SdkTarget, TestConfig, TestMethod,
};

/// Composes from in-memory tables so the bench measures the cache, not disk reads.
struct InMemoryComposer;

impl ResourceComposer for InMemoryComposer {
    fn compose(
        &self,
        base: Arc<dyn ResourceLoader>,
        manifest: &AppManifest,
    ) -> Result<ComposedResourceLoader, ResourceError> {
        let names: Vec<String> = (0..256).map(|i| format!("entry_{i}")).collect();
        let app = PackageResourceLoader::from_values(
            manifest.package_name.clone(),
            APP_PACKAGE_ID,
            names
                .iter()
                .map(|name| ("string", name.as_str(), ResValue::Text(name.clone()))),
        )?;
        RoutingResourceLoader::new(
            manifest.package_name.clone(),
            [
                ("android".to_string(), base),
                (manifest.package_name.clone(), Arc::new(app) as Arc<dyn ResourceLoader>),
            ],
        )
    }
}

fn base() -> Arc<dyn ResourceLoader> {
    Arc::new(PackageResourceLoader::from_values(
        "android",
        PLATFORM_PACKAGE_ID,
        [("string", "ok", ResValue::Text("OK".to_string()))],
    )
    .unwrap())
}

fn bench_cache_hit(c: &mut Criterion) {
    let cache = ResourceLoaderCache::new(Arc::new(InMemoryComposer));
    let manifest = AppManifest::new("com.example").with_label("@string/entry_0");
    let base = base();
    let sdk = SdkTarget::new(28);
    let _ = cache.get(&manifest, sdk, &base).unwrap();

    let mut group = c.benchmark_group("cache");
    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        b.iter(|| black_box(cache.get(black_box(&manifest), sdk, &base).unwrap()));
    });
    group.bench_function("key", |b| {
        b.iter(|| black_box(CacheKey::new(black_box(&manifest), sdk)));
    });
    group.finish();
}

fn bench_lifecycle_cycle(c: &mut Criterion) {
    let config = EnvironmentConfig {
        init_logging: false,
        ..EnvironmentConfig::default()
    };
    let mut lifecycle = EnvironmentLifecycle::with_services(
        config,
        Arc::new(ResourceLoaderCache::new(Arc::new(InMemoryComposer))),
        Arc::new(appsim::DefaultShadowBinding),
        appsim::ShimTable::default(),
    )
    .unwrap();
    lifecycle.set_sdk_config(SdkTarget::new(28)).unwrap();
    let platform = PlatformResources::new(base());
    let manifest = AppManifest::new("com.example").with_label("@string/entry_0");
    let method = TestMethod::new("BenchTest", "cycle");
    let factory = |_: &TestMethod, _: &AppManifest, _: &TestConfig| Some(Application::plain());

    c.bench_function("lifecycle/setup_teardown", |b| {
        b.iter(|| {
            lifecycle.reset_static_state().unwrap();
            let app = lifecycle
                .set_up_application_state(&method, &factory, &platform, &manifest, &TestConfig::default())
                .unwrap();
            lifecycle.tear_down_application().unwrap();
            black_box(app)
        });
    });
}

criterion_group!(cache_lookup, bench_cache_hit, bench_lifecycle_cycle);
criterion_main!(cache_lookup);
