//! Sensitivity categories and text classification.
//!
//! This module decides whether a fragment of on-screen text is sensitive:
//!
//! - **Built-in categories**: emails, card numbers, API keys, account
//!   numbers, revenue amounts and PII, each backed by a fixed pattern.
//!
//! - **Custom patterns**: user-defined regexes, compiled and validated when
//!   they are defined so that scanning never sees a malformed pattern.
//!
//! - **Deterministic precedence**: the first matching category wins, in the
//!   order Email, CreditCard, ApiKey, AccountNumber, Revenue, PII, then custom
//!   patterns in their configured order.
//!
//! # Example
//!
//! ```
//! use shareguard::category::{Category, CategoryMatcher};
//! use shareguard::Settings;
//!
//! let matcher = CategoryMatcher::new(&Settings::default());
//! assert_eq!(
//!     matcher.classify("Contact: jane@example.com"),
//!     Some(Category::Email)
//! );
//! assert_eq!(matcher.classify("ok"), None);
//! ```

mod matcher;
mod patterns;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use matcher::{CategoryMatcher, CustomPattern, MIN_TEXT_LEN};
pub use patterns::{builtin_pattern, builtin_patterns, CategoryPattern};

/// A sensitivity category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Email addresses.
    Email,
    /// Payment card numbers.
    CreditCard,
    /// API keys and secret tokens.
    ApiKey,
    /// Bank and customer account numbers.
    AccountNumber,
    /// Monetary amounts.
    Revenue,
    /// Personally identifiable information (SSNs, phone numbers).
    Pii,
    /// A user-defined pattern, identified by its name.
    Custom(String),
}

impl Category {
    /// The built-in categories in evaluation order.
    pub const BUILTIN: [Category; 6] = [
        Category::Email,
        Category::CreditCard,
        Category::ApiKey,
        Category::AccountNumber,
        Category::Revenue,
        Category::Pii,
    ];

    /// Check if this is a built-in category.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::CreditCard => write!(f, "credit_card"),
            Self::ApiKey => write!(f, "api_key"),
            Self::AccountNumber => write!(f, "account_number"),
            Self::Revenue => write!(f, "revenue"),
            Self::Pii => write!(f, "pii"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Email.to_string(), "email");
        assert_eq!(Category::CreditCard.to_string(), "credit_card");
        assert_eq!(Category::Pii.to_string(), "pii");
        assert_eq!(Category::Custom("SSN".into()).to_string(), "custom:SSN");
    }

    #[test]
    fn test_is_builtin() {
        assert!(Category::BUILTIN.iter().all(Category::is_builtin));
        assert!(!Category::Custom("x".into()).is_builtin());
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&Category::ApiKey).unwrap();
        assert_eq!(json, "\"api_key\"");

        let custom: Category = serde_json::from_str(r#"{"custom":"Ticket"}"#).unwrap();
        assert_eq!(custom, Category::Custom("Ticket".into()));
    }
}
