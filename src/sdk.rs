//! Simulated platform version descriptor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The simulated platform version (API level) a test runs against.
///
/// Immutable; supplied once per test run through `set_sdk_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SdkTarget {
    api_level: u32,
}

impl SdkTarget {
    /// Oldest API level the default shim table supports.
    pub const MIN_SUPPORTED: u32 = 16;

    /// Creates a target for the given API level.
    #[must_use]
    pub const fn new(api_level: u32) -> Self {
        Self { api_level }
    }

    /// Returns the API level.
    #[must_use]
    pub const fn api_level(&self) -> u32 {
        self.api_level
    }
}

impl fmt::Display for SdkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sdk-{}", self.api_level)
    }
}

impl From<u32> for SdkTarget {
    fn from(api_level: u32) -> Self {
        Self::new(api_level)
    }
}
