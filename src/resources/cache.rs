//! Process-wide cache of composed resource loaders.
//!
//! Composition reads every resource table of a manifest, so it is done once
//! per `(manifest, sdk)` pair and shared by every test using that pair.
//!
//! Concurrency contract:
//! - At most one composition per key, even under concurrent first access.
//!   Each key owns a slot; the first caller composes while holding the slot's
//!   init lock and later callers for that key wait on it.
//! - Callers for different keys never wait on each other's composition.
//! - Once a slot is populated, lookups only take the shared map read lock.
//! - A failed composition leaves the slot empty; nothing partial is cached.
//! - No eviction. Entries live as long as the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use crate::error::ResourceError;
use crate::manifest::{AppManifest, ManifestId};
use crate::sdk::SdkTarget;

use super::{ComposedResourceLoader, DefaultResourceComposer, ResourceComposer, ResourceLoader};

static SHARED: OnceLock<Mutex<HashMap<String, Arc<ResourceLoaderCache>>>> = OnceLock::new();

fn lock_err(context: &'static str) -> ResourceError {
    ResourceError::Backend {
        message: format!("poisoned lock: {context}"),
    }
}

/// Cache identity: manifest content plus API level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    manifest: ManifestId,
    api_level: u32,
}

impl CacheKey {
    /// Builds the key for a lookup.
    #[must_use]
    pub fn new(manifest: &AppManifest, sdk: SdkTarget) -> Self {
        Self {
            manifest: manifest.id(),
            api_level: sdk.api_level(),
        }
    }

    /// The manifest half of the key.
    #[must_use]
    pub const fn manifest(&self) -> ManifestId {
        self.manifest
    }

    /// The API level half of the key.
    #[must_use]
    pub const fn api_level(&self) -> u32 {
        self.api_level
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.manifest, self.api_level)
    }
}

/// Source of composed loaders for the environment lifecycle.
pub trait ResourceCache: Send + Sync {
    /// Returns the composed loader for `(manifest, sdk)`, composing it over
    /// `base` on first use. Equal keys always yield the same `Arc`.
    fn get(
        &self,
        manifest: &AppManifest,
        sdk: SdkTarget,
        base: &Arc<dyn ResourceLoader>,
    ) -> Result<Arc<ComposedResourceLoader>, ResourceError>;
}

#[derive(Default)]
struct Slot {
    value: OnceLock<Arc<ComposedResourceLoader>>,
    init: Mutex<()>,
}

/// Counters describing cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a populated slot.
    pub hits: u64,
    /// Successful compositions.
    pub compositions: u64,
    /// Failed compositions.
    pub failures: u64,
}

/// Single-flight cache of composed loaders keyed by `CacheKey`.
pub struct ResourceLoaderCache {
    composer: Arc<dyn ResourceComposer>,
    slots: RwLock<HashMap<CacheKey, Arc<Slot>>>,
    hits: AtomicU64,
    compositions: AtomicU64,
    failures: AtomicU64,
}

impl fmt::Debug for ResourceLoaderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLoaderCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ResourceLoaderCache {
    /// Creates an empty cache backed by `composer`.
    #[must_use]
    pub fn new(composer: Arc<dyn ResourceComposer>) -> Self {
        Self {
            composer,
            slots: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            compositions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// The process-wide cache using the default composer.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Self::shared(DefaultResourceComposer::default().platform_package())
    }

    /// The process-wide cache whose default composer routes base resources
    /// under `platform_package`. One cache exists per platform package.
    #[must_use]
    pub fn shared(platform_package: &str) -> Arc<Self> {
        let registry = SHARED.get_or_init(|| Mutex::new(HashMap::new()));
        // Entries are only ever inserted whole, so a poisoned map is still consistent.
        let mut caches = registry.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(caches.entry(platform_package.to_string()).or_insert_with(|| {
            Arc::new(Self::new(Arc::new(DefaultResourceComposer::new(platform_package))))
        }))
    }

    /// Looks up a populated entry without composing.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<ComposedResourceLoader>> {
        let slots = self.slots.read().ok()?;
        slots.get(key)?.value.get().cloned()
    }

    /// Number of populated entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .map(|slots| slots.values().filter(|slot| slot.value.get().is_some()).count())
            .unwrap_or(0)
    }

    /// Returns true if no entry is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            compositions: self.compositions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, key: CacheKey) -> Result<Arc<Slot>, ResourceError> {
        {
            let slots = self.slots.read().map_err(|_| lock_err("cache.read"))?;
            if let Some(slot) = slots.get(&key) {
                return Ok(Arc::clone(slot));
            }
        }

        let mut slots = self.slots.write().map_err(|_| lock_err("cache.write"))?;
        // Another thread may have inserted the slot while we waited.
        Ok(Arc::clone(slots.entry(key).or_default()))
    }
}

impl ResourceCache for ResourceLoaderCache {
    fn get(
        &self,
        manifest: &AppManifest,
        sdk: SdkTarget,
        base: &Arc<dyn ResourceLoader>,
    ) -> Result<Arc<ComposedResourceLoader>, ResourceError> {
        let key = CacheKey::new(manifest, sdk);
        let slot = self.slot(key)?;

        if let Some(loader) = slot.value.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(key = %key, "resource cache hit");
            return Ok(Arc::clone(loader));
        }

        let _init = slot.init.lock().map_err(|_| lock_err("cache.slot"))?;
        if let Some(loader) = slot.value.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(loader));
        }

        let composed = match self.composer.compose(Arc::clone(base), manifest) {
            Ok(composed) => Arc::new(composed),
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };
        // Only the holder of `init` sets the value, so this cannot race.
        let loader = Arc::clone(slot.value.get_or_init(|| composed));
        self.compositions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, package = %manifest.package_name, "resource cache miss; composed");
        Ok(loader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{PackageResourceLoader, RoutingResourceLoader};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct CountingComposer {
        calls: AtomicU64,
        delay: Duration,
        fail_package: Option<String>,
    }

    impl ResourceComposer for CountingComposer {
        fn compose(
            &self,
            base: Arc<dyn ResourceLoader>,
            manifest: &AppManifest,
        ) -> Result<RoutingResourceLoader, ResourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if self.fail_package.as_deref() == Some(manifest.package_name.as_str()) {
                return Err(ResourceError::Malformed {
                    path: "values.json".into(),
                    reason: "boom".to_string(),
                });
            }
            RoutingResourceLoader::new(manifest.package_name.clone(), [("android".to_string(), base)])
        }
    }

    fn base() -> Arc<dyn ResourceLoader> {
        Arc::new(PackageResourceLoader::empty("android"))
    }

    #[test]
    fn equal_keys_return_identical_loader() {
        let composer = Arc::new(CountingComposer::default());
        let cache = ResourceLoaderCache::new(composer.clone());
        let manifest = AppManifest::new("com.example");

        let a = cache.get(&manifest, SdkTarget::new(23), &base()).unwrap();
        let b = cache.get(&manifest.clone(), SdkTarget::new(23), &base()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(composer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, compositions: 1, failures: 0 });
        assert!(cache.peek(&CacheKey::new(&manifest, SdkTarget::new(23))).is_some());
    }

    #[test]
    fn different_manifest_or_sdk_yield_distinct_loaders() {
        let cache = ResourceLoaderCache::new(Arc::new(CountingComposer::default()));
        let m1 = AppManifest::new("com.one");
        let m2 = AppManifest::new("com.two");

        let a = cache.get(&m1, SdkTarget::new(23), &base()).unwrap();
        let b = cache.get(&m2, SdkTarget::new(23), &base()).unwrap();
        let c = cache.get(&m1, SdkTarget::new(21), &base()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn failed_composition_is_not_cached() {
        let composer = Arc::new(CountingComposer {
            fail_package: Some("com.bad".to_string()),
            ..CountingComposer::default()
        });
        let cache = ResourceLoaderCache::new(composer.clone());
        let manifest = AppManifest::new("com.bad");

        assert!(cache.get(&manifest, SdkTarget::new(23), &base()).is_err());
        assert!(cache.get(&manifest, SdkTarget::new(23), &base()).is_err());
        assert_eq!(composer.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().failures, 2);
    }

    #[test]
    fn concurrent_first_access_composes_once() {
        let composer = Arc::new(CountingComposer {
            delay: Duration::from_millis(50),
            ..CountingComposer::default()
        });
        let cache = Arc::new(ResourceLoaderCache::new(composer.clone()));
        let manifest = AppManifest::new("com.example");
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let manifest = manifest.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&manifest, SdkTarget::new(23), &base()).unwrap()
                })
            })
            .collect();

        let loaders: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(composer.calls.load(Ordering::SeqCst), 1);
        assert!(loaders.iter().all(|l| Arc::ptr_eq(l, &loaders[0])));
    }

    #[test]
    fn shared_caches_are_per_platform_package() {
        let global = ResourceLoaderCache::global();
        assert!(Arc::ptr_eq(&global, &ResourceLoaderCache::shared("android")));
        assert!(!Arc::ptr_eq(&global, &ResourceLoaderCache::shared("vendor.platform")));
    }
}
