//! Document abstraction.
//!
//! The redaction engine and the heuristic capture probe never touch a
//! concrete DOM. They talk to a [`Document`], which provides the three
//! platform primitives the core relies on:
//!
//! - **Querying**: structural selectors, visible text nodes and visibility.
//! - **Masking**: a reversible visual obfuscation keyed by an intensity.
//! - **Observation**: a subscription that reports subtree insertions,
//!   removals and text changes.
//!
//! [`html::HtmlDocument`] implements the contract on top of a parsed HTML
//! tree.

pub mod html;

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

pub use html::HtmlDocument;

/// Errors raised by document operations.
#[derive(Debug, Error)]
pub enum DomError {
    /// The element id is not known to this document.
    #[error("unknown element {0}")]
    UnknownElement(ElementId),

    /// The element exists but is no longer attached to the document.
    #[error("element {0} is detached from the document")]
    Detached(ElementId),

    /// A selector could not be parsed.
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector {
        /// The selector text.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// A markup fragment could not be inserted.
    #[error("invalid markup: {0}")]
    InvalidMarkup(String),
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DomError>;

/// Stable identity of an element within one document.
///
/// Ids are never reused, so an id held across mutations still names the same
/// element (or fails with [`DomError::Detached`] once it is removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(u64);

impl ElementId {
    /// Create an element id from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A text node together with the element that contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    /// The containing element.
    pub parent: ElementId,
    /// The node's text.
    pub text: String,
}

/// A change reported to document observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Children were inserted under or removed from the target.
    ChildList {
        /// The element whose children changed.
        target: ElementId,
    },
    /// Text inside the target changed.
    CharacterData {
        /// The element whose text changed.
        target: ElementId,
    },
}

impl Mutation {
    /// The element the mutation happened under.
    #[must_use]
    pub fn target(&self) -> ElementId {
        match self {
            Self::ChildList { target } | Self::CharacterData { target } => *target,
        }
    }
}

/// Channel on which a document delivers mutations to one observer.
pub type MutationSender = mpsc::UnboundedSender<Mutation>;

/// Handle returned by [`Document::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

impl ObserverHandle {
    /// Create a handle from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// A document the core can scan, mask and observe.
///
/// Delivery of mutations is single-threaded and in the order the document
/// applied them.
pub trait Document {
    /// The hostname the document was loaded from.
    fn hostname(&self) -> &str;

    /// Return every attached element matching a CSS selector, in document
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::InvalidSelector`] if the selector does not parse.
    fn select(&self, selector: &str) -> Result<Vec<ElementId>>;

    /// Return every non-empty text node in the rendered part of the
    /// document, in document order.
    fn text_nodes(&self) -> Vec<TextNode>;

    /// Check whether an element is rendered.
    ///
    /// Elements hidden by `display: none`, `visibility: hidden`, zero
    /// opacity or the `hidden` attribute, on themselves or an ancestor, are
    /// not visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown or detached.
    fn is_visible(&self, element: ElementId) -> Result<bool>;

    /// Read the effective value of a style property.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown.
    fn style(&self, element: ElementId, property: &str) -> Result<Option<String>>;

    /// Obscure an element with the given intensity.
    ///
    /// Applying a mask to an element that is already masked only changes the
    /// intensity; the saved pre-mask state is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown.
    fn apply_mask(&mut self, element: ElementId, intensity: u32) -> Result<()>;

    /// Restore an element to exactly its pre-mask visual state.
    ///
    /// Reverting an element that is not masked is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown.
    fn revert_mask(&mut self, element: ElementId) -> Result<()>;

    /// Start delivering mutations to `observer`.
    fn subscribe(&mut self, observer: MutationSender) -> ObserverHandle;

    /// Stop delivering mutations for `handle`. Unknown handles are ignored.
    fn unsubscribe(&mut self, handle: ObserverHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id_display() {
        assert_eq!(ElementId::new(12).to_string(), "#12");
        assert_eq!(ElementId::new(12).get(), 12);
    }

    #[test]
    fn test_mutation_target() {
        let id = ElementId::new(3);
        assert_eq!(Mutation::ChildList { target: id }.target(), id);
        assert_eq!(Mutation::CharacterData { target: id }.target(), id);
    }

    #[test]
    fn test_dom_error_display() {
        let err = DomError::Detached(ElementId::new(5));
        assert!(err.to_string().contains("#5"));

        let err = DomError::InvalidSelector {
            selector: "[[".to_string(),
            message: "unexpected token".to_string(),
        };
        assert!(err.to_string().contains("[["));
    }
}
