//! Intents and their resolution records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully qualified component: owning package plus class name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    /// Owning package.
    pub package: String,
    /// Fully qualified class name.
    pub class_name: String,
}

impl ComponentName {
    /// Creates a component name.
    #[must_use]
    pub fn new(package: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class_name: class_name.into(),
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class_name)
    }
}

/// A request to start a component, addressed either by action or explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Intent {
    /// Action string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Explicit target component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentName>,
}

impl Intent {
    /// An implicit intent for `action`.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            component: None,
        }
    }

    /// An explicit intent for `component`.
    #[must_use]
    pub fn for_component(component: ComponentName) -> Self {
        Self {
            action: None,
            component: Some(component),
        }
    }
}

/// Activity metadata attached to a resolution entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityInfo {
    /// Owning package.
    pub package_name: String,
    /// Qualified class name.
    pub name: String,
    /// Label resource id; 0 when none.
    #[serde(default)]
    pub label_res: u32,
    /// Whether other packages may start the activity.
    #[serde(default)]
    pub exported: bool,
}

/// One answer to an intent query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolveInfo {
    /// Resolved activity, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_info: Option<ActivityInfo>,
    /// Higher sorts first when several entries match.
    #[serde(default)]
    pub priority: i32,
}

impl ResolveInfo {
    /// A resolution pointing at `activity`.
    #[must_use]
    pub fn for_activity(activity: ActivityInfo) -> Self {
        Self {
            activity_info: Some(activity),
            priority: 0,
        }
    }

    /// Returns true if this entry resolves to `component`.
    #[must_use]
    pub fn targets(&self, component: &ComponentName) -> bool {
        self.activity_info
            .as_ref()
            .is_some_and(|a| a.package_name == component.package && a.name == component.class_name)
    }
}
