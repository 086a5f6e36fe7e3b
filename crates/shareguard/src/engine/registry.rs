//! Registry of masked elements.

use std::collections::HashMap;

use serde::Serialize;

use crate::category::Category;
use crate::dom::ElementId;

/// What was applied to one masked element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskRecord {
    /// Intensity the mask was applied with.
    pub applied_intensity: u32,
    /// Category that claimed the element on the latest scan.
    pub category: Category,
}

/// The set of currently masked elements, keyed by element identity.
///
/// An element appears at most once.
#[derive(Debug, Default)]
pub struct RedactionRegistry {
    entries: HashMap<ElementId, MaskRecord>,
}

impl RedactionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Returns `false` and leaves the registry untouched if
    /// the element is already present.
    pub fn insert(&mut self, element: ElementId, record: MaskRecord) -> bool {
        if self.entries.contains_key(&element) {
            return false;
        }
        self.entries.insert(element, record);
        true
    }

    /// Remove an element's record.
    pub fn remove(&mut self, element: ElementId) -> Option<MaskRecord> {
        self.entries.remove(&element)
    }

    /// Look up an element's record.
    #[must_use]
    pub fn get(&self, element: ElementId) -> Option<&MaskRecord> {
        self.entries.get(&element)
    }

    pub(crate) fn get_mut(&mut self, element: ElementId) -> Option<&mut MaskRecord> {
        self.entries.get_mut(&element)
    }

    /// Check if an element is masked.
    #[must_use]
    pub fn contains(&self, element: ElementId) -> bool {
        self.entries.contains_key(&element)
    }

    /// Number of masked elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is masked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Masked element ids, in ascending order.
    #[must_use]
    pub fn elements(&self) -> Vec<ElementId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate records.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &MaskRecord)> {
        self.entries.iter().map(|(id, record)| (*id, record))
    }

    /// Remove and return every record, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<(ElementId, MaskRecord)> {
        let mut drained: Vec<_> = self.entries.drain().collect();
        drained.sort_unstable_by_key(|(id, _)| *id);
        drained
    }
}
