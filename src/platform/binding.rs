//! Shadow binding: wiring the application to the simulated platform.

use std::sync::Arc;

use crate::application::{Application, ApplicationState};
use crate::error::{LifecycleError, SimResult};
use crate::manifest::AppManifest;
use crate::registry::SimulatedPackageRegistry;

/// Binds a freshly built application to whatever platform doubles the
/// surrounding harness needs. Runs before the application is attached.
pub trait ShadowBindingService: Send + Sync {
    /// Binds `app` for `manifest`.
    fn bind(
        &self,
        app: &Arc<Application>,
        manifest: &AppManifest,
        registry: &Arc<SimulatedPackageRegistry>,
    ) -> SimResult<()>;
}

/// Binds the test's package registry as the application's package manager.
///
/// Only freshly constructed applications are accepted; an instance carried
/// over from an earlier test fails with `Binding`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultShadowBinding;

impl ShadowBindingService for DefaultShadowBinding {
    fn bind(
        &self,
        app: &Arc<Application>,
        manifest: &AppManifest,
        registry: &Arc<SimulatedPackageRegistry>,
    ) -> SimResult<()> {
        let state = app.state();
        if state != ApplicationState::Constructed {
            return Err(LifecycleError::Binding {
                message: format!("application {} is {state:?}, expected a fresh instance", app.id()),
            }
            .into());
        }
        tracing::trace!(package = %manifest.package_name, app = %app.id(), "binding package manager");
        app.bind_package_manager(Arc::clone(registry));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binding_installs_registry() {
        let app = Application::plain();
        let registry = Arc::new(SimulatedPackageRegistry::new());
        DefaultShadowBinding
            .bind(&app, &AppManifest::new("com.example"), &registry)
            .unwrap();
        assert!(Arc::ptr_eq(&app.package_manager().unwrap(), &registry));
    }

    #[test]
    fn terminated_application_is_not_rebound() {
        let app = Application::plain();
        app.on_terminate().unwrap();
        let err = DefaultShadowBinding
            .bind(&app, &AppManifest::new("com.example"), &Arc::new(SimulatedPackageRegistry::new()))
            .unwrap_err();
        assert!(matches!(err, crate::error::SimError::Lifecycle(LifecycleError::Binding { .. })));
        assert!(app.package_manager().is_none());
    }
}
