//! Classification of text fragments against enabled categories.

use regex::Regex;
use serde::{Serialize, Serializer};
use tracing::trace;

use super::patterns::{builtin_patterns, CategoryPattern};
use super::Category;
use crate::error::{Error, Result};
use crate::settings::Settings;

/// Fragments shorter than this (in characters) never match.
pub const MIN_TEXT_LEN: usize = 3;

/// A user-defined pattern.
///
/// The regex is compiled when the pattern is defined, so an invalid pattern
/// is rejected here and can never reach a scan.
#[derive(Debug, Clone)]
pub struct CustomPattern {
    name: String,
    regex: Regex,
    enabled: bool,
}

impl CustomPattern {
    /// Compile a custom pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` is not a valid regex, and
    /// a validation error if `name` is blank.
    pub fn new(name: impl Into<String>, pattern: &str, enabled: bool) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("custom pattern name cannot be empty"));
        }
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            name: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            regex,
            enabled,
        })
    }

    /// The pattern's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pattern source as the user wrote it.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Whether the pattern takes part in matching.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return a copy with the enabled flag changed.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The category this pattern claims.
    #[must_use]
    pub fn category(&self) -> Category {
        Category::Custom(self.name.clone())
    }

    /// Check if the text matches this pattern.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for CustomPattern {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.enabled == other.enabled
            && self.regex.as_str() == other.regex.as_str()
    }
}

impl Eq for CustomPattern {}

impl Serialize for CustomPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("CustomPattern", 3)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("pattern", self.regex.as_str())?;
        s.serialize_field("enabled", &self.enabled)?;
        s.end()
    }
}

/// Decides whether text is sensitive and which category claims it.
///
/// A matcher is a snapshot of one [`Settings`] value; rebuild it when the
/// settings change.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    builtins: Vec<&'static CategoryPattern>,
    custom: Vec<CustomPattern>,
    min_len: usize,
}

impl CategoryMatcher {
    /// Build a matcher for the categories enabled in `settings`.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self::with_min_len(settings, MIN_TEXT_LEN)
    }

    /// Build a matcher with a custom minimum fragment length.
    ///
    /// Values below [`MIN_TEXT_LEN`] are raised to it.
    #[must_use]
    pub fn with_min_len(settings: &Settings, min_len: usize) -> Self {
        let builtins = builtin_patterns()
            .iter()
            .filter(|p| settings.enabled_categories.contains(&p.category))
            .collect();
        let custom = settings
            .custom_patterns
            .iter()
            .filter(|p| p.is_enabled())
            .cloned()
            .collect();
        Self {
            builtins,
            custom,
            min_len: min_len.max(MIN_TEXT_LEN),
        }
    }

    /// Classify a text fragment.
    ///
    /// Returns the first enabled category that matches, or `None`.
    #[must_use]
    pub fn classify(&self, text: &str) -> Option<Category> {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_len {
            return None;
        }

        if let Some(pattern) = self.builtins.iter().find(|p| p.matches(trimmed)) {
            trace!(category = %pattern.category, "Text matched built-in category");
            return Some(pattern.category.clone());
        }

        self.custom.iter().find(|p| p.matches(trimmed)).map(|p| {
            trace!(pattern = %p.name, "Text matched custom pattern");
            p.category()
        })
    }

    /// Check if a text fragment matches any enabled category.
    #[must_use]
    pub fn is_sensitive(&self, text: &str) -> bool {
        self.classify(text).is_some()
    }

    /// Check if any category at all is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty() && self.custom.is_empty()
    }
}
