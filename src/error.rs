//! Error types for appsim.
//!
//! All errors are strongly typed using thiserror. Each concern owns its own
//! enum; `SimError` wraps them so callers can match on the exact failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Errors raised while loading or composing resources.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Resource path {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource file {path} is malformed: {reason}")]
    Malformed {
        path: PathBuf,
        reason: String,
    },

    #[error("Resource ids of package 0x{package_id:02x} overflow: {detail}")]
    IndexOverflow {
        package_id: u8,
        detail: String,
    },

    #[error("Resource namespace '{package}' is routed twice")]
    DuplicateNamespace {
        package: String,
    },

    #[error("Resource backend error: {message}")]
    Backend {
        message: String,
    },
}

/// Errors raised by the simulated package registry.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Package not found: {package}")]
    PackageNotFound {
        package: String,
    },

    #[error("Package registry error: {message}")]
    Backend {
        message: String,
    },
}

/// Label resolution failures. These are tolerated: the label id degrades to 0.
#[derive(Debug, Error)]
pub enum ManifestRegistrationError {
    #[error("Label reference '{label_ref}' is not a resource reference")]
    MalformedLabel {
        label_ref: String,
    },

    #[error("Label reference '{label_ref}' does not resolve in package {package}")]
    UnresolvedLabel {
        label_ref: String,
        package: String,
    },
}

/// Errors raised while driving the environment lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Illegal lifecycle transition: {from} -> {to}")]
    IllegalTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("No SDK target configured; call set_sdk_config before set_up_application_state")]
    SdkNotConfigured,

    #[error("No platform shim supports API level {api_level}")]
    UnsupportedSdk {
        api_level: u32,
    },

    #[error("Bootstrap of package {package} failed: {source}")]
    Bootstrap {
        package: String,
        #[source]
        source: PackageError,
    },

    #[error("Application hook '{hook}' failed: {message}")]
    Hook {
        hook: &'static str,
        message: String,
    },

    #[error("Shadow binding failed: {message}")]
    Binding {
        message: String,
    },

    #[error("Application is already attached to a context")]
    AlreadyAttached,
}

/// Top-level error type for appsim.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    /// Raised only by direct callers of `lifecycle::resolve_label`; setup
    /// tolerates label failures.
    #[error("Manifest registration error: {0}")]
    Manifest(#[from] ManifestRegistrationError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SimError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a resource loading/composition error.
    #[must_use]
    pub const fn is_resource(&self) -> bool {
        matches!(self, Self::Resource(_))
    }

    /// Returns true if a package lookup failed, directly or during bootstrap.
    #[must_use]
    pub const fn is_package_not_found(&self) -> bool {
        matches!(
            self,
            Self::Package(PackageError::PackageNotFound { .. })
                | Self::Lifecycle(LifecycleError::Bootstrap {
                    source: PackageError::PackageNotFound { .. },
                    ..
                })
        )
    }

    /// Returns true if a lifecycle method was called in the wrong state.
    #[must_use]
    pub const fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            Self::Lifecycle(LifecycleError::IllegalTransition { .. } | LifecycleError::SdkNotConfigured)
        )
    }

    /// Returns true if this error is retryable.
    ///
    /// Nothing in environment bootstrap is: every failure points at an
    /// inconsistent manifest, registry or configuration.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Resource(_)
            | Self::Package(_)
            | Self::Manifest(_)
            | Self::Lifecycle(_)
            | Self::Config { .. }
            | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for appsim operations.
pub type SimResult<T> = Result<T, SimError>;
