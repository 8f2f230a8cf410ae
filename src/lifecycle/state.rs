//! Lifecycle states and the transition log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentId;

/// Position of the environment in the per-test bootstrap protocol.
///
/// Bootstrap walks the states linearly:
/// `Idle → Resetting → ResourcesReady → PackageRegistered → ThreadPrepared →
/// ApplicationBootstrapped → Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing has run yet.
    Idle,
    /// Static state cleared; ready for setUp.
    Resetting,
    /// Composed resources resolved and configuration applied.
    ResourcesReady,
    /// Manifest registered with the package registry.
    PackageRegistered,
    /// Main looper, activity thread and system context exist.
    ThreadPrepared,
    /// Application created, or no application requested.
    ApplicationBootstrapped,
    /// Torn down; the next test must reset first.
    Terminated,
}

impl LifecycleState {
    /// Stable string tag for structured logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resetting => "resetting",
            Self::ResourcesReady => "resources_ready",
            Self::PackageRegistered => "package_registered",
            Self::ThreadPrepared => "thread_prepared",
            Self::ApplicationBootstrapped => "application_bootstrapped",
            Self::Terminated => "terminated",
        }
    }

    /// The next state of a successful bootstrap, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Resetting),
            Self::Resetting => Some(Self::ResourcesReady),
            Self::ResourcesReady => Some(Self::PackageRegistered),
            Self::PackageRegistered => Some(Self::ThreadPrepared),
            Self::ThreadPrepared => Some(Self::ApplicationBootstrapped),
            Self::ApplicationBootstrapped => Some(Self::Terminated),
            Self::Terminated => None,
        }
    }

    /// Whether a test environment exists that teardown must release.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        !matches!(self, Self::Idle | Self::Terminated)
    }

    /// Returns true if `self → to` is allowed.
    ///
    /// Resetting is reachable from anywhere, bootstrap steps only advance one
    /// at a time, and teardown is allowed from any live state.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        match to {
            Self::Resetting => true,
            Self::Terminated => self.is_live(),
            _ => self.next() == Some(to),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single entry in the transition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Environment the transition belongs to; `None` before the first reset.
    pub environment: Option<EnvironmentId>,
    /// State before the transition.
    pub from: LifecycleState,
    /// State after the transition.
    pub to: LifecycleState,
    /// Wall-clock time of the transition.
    pub at: DateTime<Utc>,
}
