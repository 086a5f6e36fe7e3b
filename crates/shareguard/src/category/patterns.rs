//! Built-in category patterns.
//!
//! Each built-in [`Category`] is backed by one compiled regex. The exact
//! expressions are a tuning surface; callers should rely on the category
//! names, not on the precise shapes accepted.

use std::sync::OnceLock;

use regex::Regex;

use super::Category;

/// A compiled pattern for one built-in category.
#[derive(Debug)]
pub struct CategoryPattern {
    /// The category this pattern claims.
    pub category: Category,

    /// Description of what this pattern matches.
    pub description: &'static str,

    /// The compiled regex.
    regex: Regex,
}

impl CategoryPattern {
    /// Create a new category pattern.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn new(category: Category, description: &'static str, pattern: &str) -> Self {
        Self {
            category,
            description,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Check if the text matches this pattern.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Find the first match in the text.
    #[must_use]
    pub fn find<'a>(&self, text: &'a str) -> Option<regex::Match<'a>> {
        self.regex.find(text)
    }
}

/// All built-in patterns, in evaluation order.
///
/// The order is fixed: Email, CreditCard, ApiKey, AccountNumber, Revenue, PII.
#[must_use]
pub fn builtin_patterns() -> &'static [CategoryPattern] {
    static PATTERNS: OnceLock<Vec<CategoryPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            CategoryPattern::new(
                Category::Email,
                "Email addresses (local@domain.tld)",
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            ),
            CategoryPattern::new(
                Category::CreditCard,
                "13-19 digit card numbers, optionally grouped in blocks of 4",
                r"\b(?:\d{4}[ -]?){3}\d{1,7}\b",
            ),
            CategoryPattern::new(
                Category::ApiKey,
                "Long alphanumeric runs and vendor-prefixed secret tokens",
                r"\b[A-Za-z0-9]{32,}\b|\b(?:sk|pk|rk)_(?:live|test)_[A-Za-z0-9]{8,}|\bgh[pousr]_[A-Za-z0-9]{36}\b|\b(?:AKIA|ASIA)[A-Z0-9]{16}\b|\bxox[baprs]-[A-Za-z0-9-]{10,}",
            ),
            CategoryPattern::new(
                Category::AccountNumber,
                "Tokens prefixed by an account keyword",
                r"(?i)\bacct_[a-z0-9]{4,}\b|\b(?:account|acct)(?:[ _-]?(?:no|number|num|id))?\.?\s*[:#]?\s*\d[\d-]{3,}\b",
            ),
            CategoryPattern::new(
                Category::Revenue,
                "Currency-symbol prefixed or currency-code suffixed amounts",
                r"[$€£¥]\s?\d[\d,]*(?:\.\d{1,2})?|\b\d+(?:,\d{3})*(?:\.\d{2})?\s*(?:USD|EUR|GBP|JPY|CAD|AUD)\b",
            ),
            CategoryPattern::new(
                Category::Pii,
                "SSN-shaped and phone-number-shaped digit groups",
                r"\b\d{3}-\d{2}-\d{4}\b|\b(?:\+1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
            ),
        ]
    })
}

/// Look up the built-in pattern for a category.
///
/// Returns `None` for custom categories.
#[must_use]
pub fn builtin_pattern(category: &Category) -> Option<&'static CategoryPattern> {
    builtin_patterns().iter().find(|p| &p.category == category)
}
