//! Resource qualifier strings (`en-port-sw320dp-w320dp-v23`).
//!
//! Helpers only ever add a qualifier the string does not already carry; a
//! value set by the test always wins over an injected default.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

static PLATFORM_VERSION: OnceLock<Regex> = OnceLock::new();
static SMALLEST_SCREEN_WIDTH: OnceLock<Regex> = OnceLock::new();
static SCREEN_WIDTH: OnceLock<Regex> = OnceLock::new();

fn platform_version_re() -> &'static Regex {
    PLATFORM_VERSION.get_or_init(|| Regex::new(r"^v(\d+)$").expect("static regex"))
}

fn smallest_screen_width_re() -> &'static Regex {
    SMALLEST_SCREEN_WIDTH.get_or_init(|| Regex::new(r"^sw(\d+)dp$").expect("static regex"))
}

fn screen_width_re() -> &'static Regex {
    SCREEN_WIDTH.get_or_init(|| Regex::new(r"^w(\d+)dp$").expect("static regex"))
}

/// A dash-separated qualifier string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Qualifiers(String);

impl Qualifiers {
    /// Wraps a qualifier string. Surrounding whitespace and empty segments are dropped.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let cleaned: Vec<&str> = raw
            .split('-')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        Self(cleaned.join("-"))
    }

    /// Returns the qualifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no qualifier is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('-').filter(|s| !s.is_empty())
    }

    fn find(&self, re: &Regex) -> Option<u32> {
        self.segments()
            .find_map(|seg| re.captures(seg)?.get(1)?.as_str().parse::<u32>().ok())
    }

    fn append(mut self, segment: &str) -> Self {
        if !self.0.is_empty() {
            self.0.push('-');
        }
        self.0.push_str(segment);
        self
    }

    /// Adds `v{api_level}` unless a platform version is already present.
    #[must_use]
    pub fn with_platform_version(self, api_level: u32) -> Self {
        if self.platform_version().is_some() {
            return self;
        }
        self.append(&format!("v{api_level}"))
    }

    /// Adds `sw{dp}dp` unless a smallest-width qualifier is already present.
    #[must_use]
    pub fn with_smallest_screen_width(self, dp: u32) -> Self {
        if self.smallest_screen_width().is_some() {
            return self;
        }
        self.append(&format!("sw{dp}dp"))
    }

    /// Adds `w{dp}dp` unless a width qualifier is already present.
    #[must_use]
    pub fn with_screen_width(self, dp: u32) -> Self {
        if self.screen_width().is_some() {
            return self;
        }
        self.append(&format!("w{dp}dp"))
    }

    /// The `v` qualifier value.
    #[must_use]
    pub fn platform_version(&self) -> Option<u32> {
        self.find(platform_version_re())
    }

    /// The `sw..dp` qualifier value.
    #[must_use]
    pub fn smallest_screen_width(&self) -> Option<u32> {
        self.find(smallest_screen_width_re())
    }

    /// The `w..dp` qualifier value.
    #[must_use]
    pub fn screen_width(&self) -> Option<u32> {
        self.find(screen_width_re())
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Qualifiers {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_qualifiers_get_every_default() {
        let q = Qualifiers::new("")
            .with_platform_version(23)
            .with_smallest_screen_width(320)
            .with_screen_width(320);
        assert_eq!(q.as_str(), "v23-sw320dp-w320dp");
        assert_eq!(q.platform_version(), Some(23));
        assert_eq!(q.smallest_screen_width(), Some(320));
        assert_eq!(q.screen_width(), Some(320));
    }

    #[test]
    fn existing_values_are_not_overridden() {
        let q = Qualifiers::new("en-sw600dp-w720dp-v21")
            .with_platform_version(23)
            .with_smallest_screen_width(320)
            .with_screen_width(320);
        assert_eq!(q.as_str(), "en-sw600dp-w720dp-v21");
        assert_eq!(q.smallest_screen_width(), Some(600));
        assert_eq!(q.screen_width(), Some(720));
        assert_eq!(q.platform_version(), Some(21));
    }

    #[test]
    fn smallest_width_is_not_mistaken_for_width() {
        let q = Qualifiers::new("sw480dp").with_screen_width(320);
        assert_eq!(q.as_str(), "sw480dp-w320dp");
        assert_eq!(q.screen_width(), Some(320));
        assert_eq!(q.smallest_screen_width(), Some(480));
    }

    #[test]
    fn new_drops_empty_segments() {
        assert_eq!(Qualifiers::new(" en--port- ").as_str(), "en-port");
        assert!(Qualifiers::new("  ").is_empty());
    }
}
