//! Passive sharing-indicator probe.
//!
//! The probe answers one question per tick: does the document currently show
//! any control or banner that conferencing apps render while presenting?
//! Its answers are raw observations; the detector debounces them.

use tracing::{trace, warn};

use super::platform::{Platform, GENERIC_INDICATORS};
use crate::dom::Document;

/// Looks for sharing indicators in a document.
#[derive(Debug, Clone)]
pub struct IndicatorProbe {
    platform: Platform,
    selectors: Vec<&'static str>,
}

impl IndicatorProbe {
    /// Create a probe for a platform.
    ///
    /// Platform-specific indicators are checked before the generic list.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        let mut selectors: Vec<&'static str> = platform.indicators().to_vec();
        for selector in GENERIC_INDICATORS {
            if !selectors.contains(selector) {
                selectors.push(selector);
            }
        }
        Self {
            platform,
            selectors,
        }
    }

    /// The platform this probe was built for.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The selectors checked, in order.
    #[must_use]
    pub fn selectors(&self) -> &[&'static str] {
        &self.selectors
    }

    /// Check the document for any indicator.
    ///
    /// A selector that fails to evaluate is skipped.
    #[must_use]
    pub fn observe(&self, doc: &dyn Document) -> bool {
        for selector in &self.selectors {
            match doc.select(selector) {
                Ok(found) if !found.is_empty() => {
                    trace!(selector, platform = %self.platform, "Sharing indicator present");
                    return true;
                }
                Ok(_) => {}
                Err(e) => warn!(selector, error = %e, "Skipping indicator selector"),
            }
        }
        false
    }
}
