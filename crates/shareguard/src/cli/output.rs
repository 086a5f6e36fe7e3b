//! Output shapes for the `scan` command.

use serde::Serialize;

use crate::category::Category;
use crate::dom::{ElementId, HtmlDocument};
use crate::engine::{RedactionEngine, ScanReport};
use crate::error::Result;

/// Longest text preview printed per masked element.
pub const PREVIEW_CHARS: usize = 60;

/// One masked element as printed by `scan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedElement {
    /// The element's id within the snapshot.
    pub element: ElementId,
    /// Lowercase tag name.
    pub tag: String,
    /// Category that caused the mask.
    pub category: Category,
    /// Whitespace-collapsed text preview.
    pub text: String,
}

/// The full result of a snapshot scan.
#[derive(Debug, Serialize)]
pub struct ScanOutput<'a> {
    /// Hostname the snapshot was scanned as.
    pub host: &'a str,
    /// Counters from the scan.
    pub report: ScanReport,
    /// Masked elements in registry order.
    pub masked: Vec<MaskedElement>,
}

/// Describe every element `engine` has masked in `doc`.
///
/// # Errors
///
/// Returns [`Error::Dom`](crate::Error::Dom) if a registered element is not
/// part of `doc`.
pub fn masked_elements(doc: &HtmlDocument, engine: &RedactionEngine) -> Result<Vec<MaskedElement>> {
    let registry = engine.registry();
    let mut masked = Vec::with_capacity(registry.len());
    for element in registry.elements() {
        let Some(record) = registry.get(element) else {
            continue;
        };
        masked.push(MaskedElement {
            element,
            tag: doc.tag_name(element)?.to_string(),
            category: record.category.clone(),
            text: preview(&doc.text_of(element)?),
        });
    }
    Ok(masked)
}

/// Render `value` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if `value` cannot be
/// represented as JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Collapse whitespace and cut `text` to [`PREVIEW_CHARS`].
#[must_use]
pub fn preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= PREVIEW_CHARS {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::EngineConfig;
    use crate::error::Error;
    use crate::events::EventSink;
    use crate::settings::Settings;

    const PAGE: &str = r"<div><p>Write to jane@example.com</p><p>Agenda</p></div>";

    fn scanned(doc: &mut HtmlDocument) -> RedactionEngine {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = EngineConfig::default();
        let sink = EventSink::disconnected();
        let mut engine = RedactionEngine::new("example.com", Settings::default(), config, tx, sink);
        engine.on_capture_state_changed(doc, true);
        engine
    }

    #[test]
    fn test_masked_elements_describe_registry() {
        let mut doc = HtmlDocument::parse("example.com", PAGE);
        let engine = scanned(&mut doc);

        let masked = masked_elements(&doc, &engine).unwrap();
        assert_eq!(masked.len(), 1);
        assert_eq!(masked[0].tag, "p");
        assert_eq!(masked[0].category, Category::Email);
        assert_eq!(masked[0].text, "Write to jane@example.com");
    }

    #[test]
    fn test_element_missing_from_document_is_a_dom_error() {
        let mut doc = HtmlDocument::parse("example.com", PAGE);
        let engine = scanned(&mut doc);

        let other = HtmlDocument::parse("example.com", "");
        let err = masked_elements(&other, &engine).unwrap_err();
        assert!(matches!(err, Error::Dom(_)), "{err}");
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_unrepresentable_value_is_a_json_error() {
        let mut value = BTreeMap::new();
        value.insert((1, 2), "tuple keys");

        let err = to_json(&value).unwrap_err();
        assert!(matches!(err, Error::Json(_)), "{err}");
    }

    #[test]
    fn test_to_json_renders_report() {
        let json = to_json(&ScanReport::default()).unwrap();
        assert!(json.contains("\"candidates\": 0"));
    }

    #[test]
    fn test_preview_collapses_and_truncates() {
        assert_eq!(preview("  a \n\t b  "), "a b");

        let long = "x".repeat(PREVIEW_CHARS + 5);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
    }
}
