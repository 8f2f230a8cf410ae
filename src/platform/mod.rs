//! Platform shims.
//!
//! The lifecycle never builds platform internals itself. It asks a
//! `PlatformShim` to apply qualifiers, build the activity thread and build
//! the system context. Shims are versioned: a `ShimTable` maps the lowest
//! API level a shim supports to a factory, and the table is consulted once
//! when the SDK is configured.

pub mod binding;
pub mod context;
pub mod thread;

pub use binding::{DefaultShadowBinding, ShadowBindingService};
pub use context::{PackageContext, SystemContext, SystemServices};
pub use thread::{ActivityThread, Instrumentation, LoadedPackage};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::LifecycleError;
use crate::looper::Looper;
use crate::qualifiers::Qualifiers;
use crate::resources::Configuration;
use crate::sdk::SdkTarget;

/// Version-specific construction of platform internals.
pub trait PlatformShim: Send + Sync + fmt::Debug {
    /// Platform version the shim was built for.
    fn sdk(&self) -> SdkTarget;

    /// Applies `qualifiers` to `configuration`.
    fn override_qualifiers(&self, qualifiers: &Qualifiers, configuration: &mut Configuration) {
        configuration.qualifiers = qualifiers.as_str().to_string();
        if let Some(dp) = qualifiers.smallest_screen_width() {
            configuration.smallest_screen_width_dp = dp;
        }
        if let Some(dp) = qualifiers.screen_width() {
            configuration.screen_width_dp = dp;
        }
        configuration.api_level = qualifiers
            .platform_version()
            .unwrap_or_else(|| self.sdk().api_level());
    }

    /// Builds the activity thread on the prepared main looper.
    fn create_activity_thread(&self, looper: &Arc<Looper>, compat: Configuration) -> ActivityThread {
        ActivityThread::new(self.sdk(), Arc::clone(looper), compat)
    }

    /// Builds the system context of `thread`.
    fn create_system_context(&self, thread: &Arc<ActivityThread>, services: SystemServices) -> SystemContext {
        SystemContext::new(Arc::clone(thread), services)
    }
}

/// Shim for every supported platform version.
#[derive(Debug, Clone, Copy)]
pub struct StandardShim {
    sdk: SdkTarget,
}

impl StandardShim {
    /// Creates a shim for `sdk`.
    #[must_use]
    pub const fn new(sdk: SdkTarget) -> Self {
        Self { sdk }
    }
}

impl PlatformShim for StandardShim {
    fn sdk(&self) -> SdkTarget {
        self.sdk
    }
}

/// Builds a shim for a selected platform version.
pub trait PlatformShimFactory: Send + Sync {
    /// Creates the shim for `sdk`.
    fn create(&self, sdk: SdkTarget) -> Arc<dyn PlatformShim>;
}

impl<F> PlatformShimFactory for F
where
    F: Fn(SdkTarget) -> Arc<dyn PlatformShim> + Send + Sync,
{
    fn create(&self, sdk: SdkTarget) -> Arc<dyn PlatformShim> {
        self(sdk)
    }
}

/// Versioned strategy table: lowest supported API level to shim factory.
#[derive(Clone)]
pub struct ShimTable {
    entries: BTreeMap<u32, Arc<dyn PlatformShimFactory>>,
}

impl fmt::Debug for ShimTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShimTable")
            .field("levels", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ShimTable {
    fn default() -> Self {
        Self::empty().with(SdkTarget::MIN_SUPPORTED, |sdk: SdkTarget| {
            Arc::new(StandardShim::new(sdk)) as Arc<dyn PlatformShim>
        })
    }
}

impl ShimTable {
    /// A table with no entries. Every selection fails until one is added.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers `factory` for `min_api_level` and above.
    #[must_use]
    pub fn with(mut self, min_api_level: u32, factory: impl PlatformShimFactory + 'static) -> Self {
        self.entries.insert(min_api_level, Arc::new(factory));
        self
    }

    /// Builds the shim of the highest entry not above `sdk`.
    ///
    /// # Errors
    /// - `UnsupportedSdk`: if `sdk` is below every entry
    pub fn select(&self, sdk: SdkTarget) -> Result<Arc<dyn PlatformShim>, LifecycleError> {
        let (_, factory) = self
            .entries
            .range(..=sdk.api_level())
            .next_back()
            .ok_or(LifecycleError::UnsupportedSdk {
                api_level: sdk.api_level(),
            })?;
        Ok(factory.create(sdk))
    }
}
