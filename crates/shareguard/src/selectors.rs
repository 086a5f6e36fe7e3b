//! Structural selectors for known surfaces.
//!
//! Some sites render sensitive values in markup that text matching alone
//! would miss (an amount split across nested spans, a card number behind a
//! label). For those hosts we keep a fixed table of CSS selectors, grouped by
//! the category they protect plus a catch-all `general` list.
//!
//! Lookup is by hostname substring; an unknown host yields an empty set and
//! the scan falls back to text matching only.

use serde::Serialize;

use crate::category::Category;

/// Selector lists for one surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceSelectors {
    /// Hostname substring this entry applies to.
    pub host: &'static str,
    /// Fields holding email addresses.
    pub email: &'static [&'static str],
    /// Fields holding card numbers.
    pub credit_card: &'static [&'static str],
    /// Fields holding API keys.
    pub api_keys: &'static [&'static str],
    /// Fields holding account numbers.
    pub account_numbers: &'static [&'static str],
    /// Fields holding monetary amounts.
    pub revenue: &'static [&'static str],
    /// Other sensitive fields (customer names, record bodies).
    pub general: &'static [&'static str],
}

impl SurfaceSelectors {
    /// An empty selector set.
    pub const EMPTY: Self = Self {
        host: "",
        email: &[],
        credit_card: &[],
        api_keys: &[],
        account_numbers: &[],
        revenue: &[],
        general: &[],
    };

    /// Check if this set has no selectors at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists().all(|(_, list)| list.is_empty())
    }

    /// Iterate the lists paired with the category each one protects.
    ///
    /// The `general` list holds personal customer data and is reported as
    /// [`Category::Pii`], so toggling PII also gates it.
    pub fn lists(&self) -> impl Iterator<Item = (Category, &'static [&'static str])> {
        [
            (Category::Email, self.email),
            (Category::CreditCard, self.credit_card),
            (Category::ApiKey, self.api_keys),
            (Category::AccountNumber, self.account_numbers),
            (Category::Revenue, self.revenue),
            (Category::Pii, self.general),
        ]
        .into_iter()
    }

    /// Total number of selectors across all lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists().map(|(_, list)| list.len()).sum()
    }
}

const SURFACES: &[SurfaceSelectors] = &[
    SurfaceSelectors {
        host: "mail.google.com",
        email: &[".gs .gD", ".adn.ads", ".go .gD", "[email]", ".iw"],
        general: &[".Tm.aeJ", ".nH .G-atb"],
        ..SurfaceSelectors::EMPTY
    },
    SurfaceSelectors {
        host: "dashboard.stripe.com",
        revenue: &[
            "[data-test-id*=\"amount\"]",
            "[class*=\"Amount\"]",
            ".cell-revenue",
            "[data-test-id*=\"balance\"]",
        ],
        credit_card: &[
            "[data-test-id*=\"card\"]",
            ".card-number",
            "[class*=\"CardNumber\"]",
        ],
        account_numbers: &["[data-test-id*=\"account\"]", ".account-number"],
        api_keys: &["[data-test-id*=\"key\"]", ".api-key", "code"],
        general: &[
            ".cell-customer",
            "[data-test-id*=\"customer\"]",
            ".customer-email",
        ],
        ..SurfaceSelectors::EMPTY
    },
    SurfaceSelectors {
        host: "salesforce.com",
        general: &[
            ".forcePageBlockItem",
            ".test-id__field-value",
            ".outputLookupContainer",
        ],
        account_numbers: &[
            "[data-aura-rendered-by*=\"AccountNumber\"]",
            ".accountNumber",
        ],
        revenue: &[
            "[data-aura-rendered-by*=\"Amount\"]",
            "[data-aura-rendered-by*=\"Revenue\"]",
        ],
        ..SurfaceSelectors::EMPTY
    },
];

/// Look up the selectors for a hostname.
///
/// The first table entry whose host is a substring of `hostname` wins.
#[must_use]
pub fn for_host(hostname: &str) -> SurfaceSelectors {
    let hostname = hostname.to_ascii_lowercase();
    SURFACES
        .iter()
        .find(|s| hostname.contains(s.host))
        .copied()
        .unwrap_or(SurfaceSelectors::EMPTY)
}

/// All known surfaces.
#[must_use]
pub fn surfaces() -> &'static [SurfaceSelectors] {
    SURFACES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_host_is_empty() {
        let selectors = for_host("example.org");
        assert!(selectors.is_empty());
        assert_eq!(selectors.len(), 0);
        assert_eq!(selectors, SurfaceSelectors::EMPTY);
    }

    #[test]
    fn test_substring_lookup() {
        let selectors = for_host("na42.lightning.salesforce.com");
        assert_eq!(selectors.host, "salesforce.com");
        assert!(!selectors.general.is_empty());
        assert!(selectors.email.is_empty());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let selectors = for_host("Dashboard.Stripe.com");
        assert_eq!(selectors.host, "dashboard.stripe.com");
    }

    #[test]
    fn test_stripe_lists() {
        let selectors = for_host("dashboard.stripe.com");
        assert!(selectors.api_keys.contains(&"code"));
        assert!(selectors.revenue.contains(&".cell-revenue"));
        assert_eq!(selectors.len(), 15);
    }

    #[test]
    fn test_general_list_is_reported_as_pii() {
        let selectors = for_host("mail.google.com");
        let general: Vec<_> = selectors
            .lists()
            .filter(|(category, _)| *category == Category::Pii)
            .collect();
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].1, selectors.general);
    }

    #[test]
    fn test_all_surface_selectors_parse() {
        for surface in surfaces() {
            for (_, list) in surface.lists() {
                for selector in list {
                    assert!(
                        scraper::Selector::parse(selector).is_ok(),
                        "Invalid selector: {selector}"
                    );
                }
            }
        }
    }
}
