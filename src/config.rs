//! Environment and per-test configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Process-level configuration of the environment lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Smallest-width and width (dp) injected when a test leaves them unset.
    pub default_screen_width_dp: u32,
    /// Namespace the platform's base resources are routed under.
    pub platform_package: String,
    /// Fallback tracing filter when `APPSIM_LOG` is not set.
    pub log_filter: String,
    /// Whether `reset_static_state` installs the tracing subscriber.
    pub init_logging: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            default_screen_width_dp: 320,
            platform_package: "android".to_string(),
            log_filter: "warn".to_string(),
            init_logging: true,
        }
    }
}

impl EnvironmentConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SimError::config(format!("invalid environment config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SimResult<()> {
        if self.default_screen_width_dp == 0 {
            return Err(SimError::config("default_screen_width_dp must be > 0"));
        }
        if self.platform_package.trim().is_empty() {
            return Err(SimError::config("platform_package cannot be empty"));
        }
        Ok(())
    }
}

/// Per-test configuration, as declared on the test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Dash-separated resource qualifiers, e.g. `en-port`. May be empty.
    pub qualifiers: String,
    /// API level requested by the test, recorded for the harness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk: Option<u32>,
    /// Application class override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
}

impl TestConfig {
    /// Creates a config with the given qualifiers.
    #[must_use]
    pub fn with_qualifiers(qualifiers: impl Into<String>) -> Self {
        Self {
            qualifiers: qualifiers.into(),
            ..Self::default()
        }
    }
}

/// Identifies the test being executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestMethod {
    /// Owning test class or module path.
    pub class_name: String,
    /// Test function name.
    pub method_name: String,
}

impl TestMethod {
    /// Creates a test method descriptor.
    #[must_use]
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class_name, self.method_name)
    }
}
