//! Redaction settings.
//!
//! Settings are owned by whoever controls the surface and are always
//! delivered to the engines as whole values, never as deltas.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::category::{Category, CustomPattern};

/// Default blur intensity in pixels.
pub const DEFAULT_INTENSITY: u32 = 10;

/// The redaction settings read by the engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Built-in categories that take part in matching.
    pub enabled_categories: BTreeSet<Category>,

    /// User-defined patterns, in evaluation order.
    pub custom_patterns: Vec<CustomPattern>,

    /// Blur strength handed to the masking primitive.
    pub intensity: u32,

    /// Whether a detected capture start turns protection back on.
    pub auto_enable: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled_categories: Category::BUILTIN.into_iter().collect(),
            custom_patterns: Vec::new(),
            intensity: DEFAULT_INTENSITY,
            auto_enable: true,
        }
    }
}

impl Settings {
    /// Check whether a category currently takes part in matching.
    #[must_use]
    pub fn is_enabled(&self, category: &Category) -> bool {
        match category {
            Category::Custom(name) => self
                .custom_patterns
                .iter()
                .any(|p| p.name() == name && p.is_enabled()),
            builtin => self.enabled_categories.contains(builtin),
        }
    }

    /// Return a copy with a built-in category switched on or off.
    ///
    /// Custom categories are toggled through their pattern instead.
    #[must_use]
    pub fn with_category(mut self, category: Category, enabled: bool) -> Self {
        if let Category::Custom(name) = &category {
            for pattern in &mut self.custom_patterns {
                if pattern.name() == name {
                    *pattern = pattern.clone().with_enabled(enabled);
                }
            }
        } else if enabled {
            self.enabled_categories.insert(category);
        } else {
            self.enabled_categories.remove(&category);
        }
        self
    }

    /// Return a copy with a custom pattern appended.
    ///
    /// A pattern with the same name replaces the earlier one in place.
    #[must_use]
    pub fn with_custom_pattern(mut self, pattern: CustomPattern) -> Self {
        if let Some(existing) = self
            .custom_patterns
            .iter_mut()
            .find(|p| p.name() == pattern.name())
        {
            *existing = pattern;
        } else {
            self.custom_patterns.push(pattern);
        }
        self
    }

    /// Return a copy with a different intensity.
    #[must_use]
    pub fn with_intensity(mut self, intensity: u32) -> Self {
        self.intensity = intensity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.enabled_categories.len(), 6);
        assert!(settings.custom_patterns.is_empty());
        assert_eq!(settings.intensity, DEFAULT_INTENSITY);
        assert!(settings.auto_enable);
    }

    #[test]
    fn test_toggle_builtin_category() {
        let settings = Settings::default().with_category(Category::Email, false);
        assert!(!settings.is_enabled(&Category::Email));
        assert!(settings.is_enabled(&Category::Pii));

        let settings = settings.with_category(Category::Email, true);
        assert!(settings.is_enabled(&Category::Email));
    }

    #[test]
    fn test_toggle_custom_category() {
        let settings = Settings::default()
            .with_custom_pattern(CustomPattern::new("Ticket", r"T-\d+", true).unwrap());
        let custom = Category::Custom("Ticket".into());
        assert!(settings.is_enabled(&custom));

        let settings = settings.with_category(custom.clone(), false);
        assert!(!settings.is_enabled(&custom));
        assert!(!settings.enabled_categories.contains(&custom));
    }

    #[test]
    fn test_custom_pattern_replaced_by_name() {
        let settings = Settings::default()
            .with_custom_pattern(CustomPattern::new("Ticket", r"T-\d+", true).unwrap())
            .with_custom_pattern(CustomPattern::new("Other", "x+y", true).unwrap())
            .with_custom_pattern(CustomPattern::new("Ticket", r"TK-\d+", true).unwrap());
        assert_eq!(settings.custom_patterns.len(), 2);
        assert_eq!(settings.custom_patterns[0].pattern(), r"TK-\d+");
    }

    #[test]
    fn test_unknown_custom_category_is_disabled() {
        let settings = Settings::default();
        assert!(!settings.is_enabled(&Category::Custom("Missing".into())));
    }
}
