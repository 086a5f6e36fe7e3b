//! HTML-backed document.
//!
//! [`HtmlDocument`] parses markup with `scraper` and implements the
//! [`Document`] contract over the resulting tree. Styles are computed from
//! inline `style` attributes plus a table of runtime overrides, which is also
//! where masks are written, so reverting a mask restores the override table
//! exactly.
//!
//! The page-side methods ([`set_text`](HtmlDocument::set_text),
//! [`append_html`](HtmlDocument::append_html),
//! [`remove`](HtmlDocument::remove)) mutate the tree the way a live page
//! would and notify subscribed observers.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ego_tree::{NodeId, NodeRef};
use scraper::node::Text;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::trace;

use super::{
    Document, DomError, ElementId, Mutation, MutationSender, ObserverHandle, Result, TextNode,
};

/// Elements whose content is never rendered.
const NON_RENDERED: &[&str] = &[
    "head", "script", "style", "template", "noscript", "title", "meta", "link",
];

/// Style property the mask is written to.
const MASK_PROPERTY: &str = "filter";

/// A parsed HTML document.
#[derive(Debug)]
pub struct HtmlDocument {
    hostname: String,
    html: Html,
    nodes: Vec<NodeId>,
    ids: HashMap<NodeId, ElementId>,
    overrides: HashMap<ElementId, BTreeMap<String, String>>,
    masks: HashMap<ElementId, Option<String>>,
    observers: Vec<(ObserverHandle, MutationSender)>,
    next_observer: u64,
}

impl HtmlDocument {
    /// Parse a full HTML document served from `hostname`.
    #[must_use]
    pub fn parse(hostname: impl Into<String>, markup: &str) -> Self {
        let mut doc = Self {
            hostname: hostname.into(),
            html: Html::parse_document(markup),
            nodes: Vec::new(),
            ids: HashMap::new(),
            overrides: HashMap::new(),
            masks: HashMap::new(),
            observers: Vec::new(),
            next_observer: 0,
        };
        let element_nodes: Vec<NodeId> = doc
            .html
            .tree
            .root()
            .descendants()
            .filter(|n| n.value().is_element())
            .map(|n| n.id())
            .collect();
        for node in element_nodes {
            doc.register(node);
        }
        doc
    }

    /// Read and parse an HTML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_file(hostname: impl Into<String>, path: &Path) -> std::io::Result<Self> {
        let markup = std::fs::read_to_string(path)?;
        Ok(Self::parse(hostname, &markup))
    }

    /// Return the first attached element matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector does not parse.
    pub fn first(&self, selector: &str) -> Result<Option<ElementId>> {
        Ok(self.select(selector)?.into_iter().next())
    }

    /// The element's tag name.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown.
    pub fn tag_name(&self, element: ElementId) -> Result<&str> {
        let node = self.node(element)?;
        node.value()
            .as_element()
            .map(scraper::node::Element::name)
            .ok_or(DomError::UnknownElement(element))
    }

    /// The concatenated text of the element and its descendants.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown.
    pub fn text_of(&self, element: ElementId) -> Result<String> {
        let node = self.node(element)?;
        Ok(ElementRef::wrap(node)
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default())
    }

    /// Check whether the element currently carries a mask.
    #[must_use]
    pub fn is_masked(&self, element: ElementId) -> bool {
        self.masks.contains_key(&element)
    }

    /// Number of masked elements.
    #[must_use]
    pub fn masked_count(&self) -> usize {
        self.masks.len()
    }

    /// Replace the element's children with a single text node.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown or detached.
    pub fn set_text(&mut self, element: ElementId, text: &str) -> Result<()> {
        let node_id = self.attached(element)?;
        let children: Vec<NodeId> = self
            .html
            .tree
            .get(node_id)
            .map(|n| n.children().map(|c| c.id()).collect())
            .unwrap_or_default();
        for child in children {
            if let Some(mut child) = self.html.tree.get_mut(child) {
                child.detach();
            }
        }
        if let Some(mut node) = self.html.tree.get_mut(node_id) {
            node.append(Node::Text(Text { text: text.into() }));
        }
        self.notify(Mutation::CharacterData { target: element });
        Ok(())
    }

    /// Parse `markup` as a fragment and append it under `parent`.
    ///
    /// Returns the ids of the top-level elements inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent is unknown or detached.
    pub fn append_html(&mut self, parent: ElementId, markup: &str) -> Result<Vec<ElementId>> {
        let parent_node = self.attached(parent)?;
        let fragment = Html::parse_fragment(markup);
        let mut added = Vec::new();
        self.graft_children(parent_node, *fragment.root_element(), &mut added, true)?;
        self.notify(Mutation::ChildList { target: parent });
        Ok(added)
    }

    /// Detach the element from the document.
    ///
    /// The id stays known; later operations on it report it as detached.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown or already detached.
    pub fn remove(&mut self, element: ElementId) -> Result<()> {
        let node_id = self.attached(element)?;
        let parent = self
            .html
            .tree
            .get(node_id)
            .and_then(|n| n.parent())
            .and_then(|p| self.ids.get(&p.id()).copied());
        if let Some(mut node) = self.html.tree.get_mut(node_id) {
            node.detach();
        }
        self.notify(Mutation::ChildList {
            target: parent.unwrap_or(element),
        });
        Ok(())
    }

    /// Set or clear a runtime style override, as page script would.
    ///
    /// Style changes are not reported to observers.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is unknown.
    pub fn set_style(
        &mut self,
        element: ElementId,
        property: &str,
        value: Option<&str>,
    ) -> Result<()> {
        self.node(element)?;
        self.write_override(element, property, value);
        Ok(())
    }

    fn register(&mut self, node: NodeId) -> ElementId {
        if let Some(id) = self.ids.get(&node) {
            return *id;
        }
        let id = ElementId::new(self.nodes.len() as u64);
        self.nodes.push(node);
        self.ids.insert(node, id);
        id
    }

    fn node(&self, element: ElementId) -> Result<NodeRef<'_, Node>> {
        usize::try_from(element.get())
            .ok()
            .and_then(|index| self.nodes.get(index))
            .and_then(|node| self.html.tree.get(*node))
            .ok_or(DomError::UnknownElement(element))
    }

    fn attached(&self, element: ElementId) -> Result<NodeId> {
        let node = self.node(element)?;
        if is_attached(self.html.tree.root().id(), node) {
            Ok(node.id())
        } else {
            Err(DomError::Detached(element))
        }
    }

    fn graft_children(
        &mut self,
        parent: NodeId,
        source: NodeRef<'_, Node>,
        added: &mut Vec<ElementId>,
        top_level: bool,
    ) -> Result<()> {
        for child in source.children() {
            let new_node = self
                .html
                .tree
                .get_mut(parent)
                .map(|mut p| p.append(child.value().clone()).id())
                .ok_or_else(|| DomError::InvalidMarkup("parent vanished".into()))?;
            if child.value().is_element() {
                let id = self.register(new_node);
                if top_level {
                    added.push(id);
                }
            }
            self.graft_children(new_node, child, added, false)?;
        }
        Ok(())
    }

    fn write_override(&mut self, element: ElementId, property: &str, value: Option<&str>) {
        let property = property.to_ascii_lowercase();
        match value {
            Some(value) => {
                self.overrides
                    .entry(element)
                    .or_default()
                    .insert(property, value.to_string());
            }
            None => {
                if let Some(styles) = self.overrides.get_mut(&element) {
                    styles.remove(&property);
                    if styles.is_empty() {
                        self.overrides.remove(&element);
                    }
                }
            }
        }
    }

    fn override_value(&self, element: ElementId, property: &str) -> Option<String> {
        self.overrides
            .get(&element)
            .and_then(|styles| styles.get(property))
            .cloned()
    }

    fn effective_style(&self, node: NodeRef<'_, Node>, property: &str) -> Option<String> {
        let property = property.to_ascii_lowercase();
        if let Some(value) = self
            .ids
            .get(&node.id())
            .and_then(|id| self.override_value(*id, &property))
        {
            return Some(value);
        }
        node.value()
            .as_element()
            .and_then(|el| el.attr("style"))
            .and_then(|style| inline_property(style, &property))
    }

    fn hides_itself(&self, node: NodeRef<'_, Node>) -> bool {
        let Some(element) = node.value().as_element() else {
            return false;
        };
        if NON_RENDERED.contains(&element.name()) || element.attr("hidden").is_some() {
            return true;
        }
        let display = self.effective_style(node, "display");
        let visibility = self.effective_style(node, "visibility");
        let opacity = self.effective_style(node, "opacity");
        display.as_deref() == Some("none")
            || matches!(visibility.as_deref(), Some("hidden" | "collapse"))
            || opacity
                .and_then(|o| o.parse::<f32>().ok())
                .is_some_and(|o| o <= 0.0)
    }

    fn notify(&mut self, mutation: Mutation) {
        trace!(?mutation, observers = self.observers.len(), "Document mutated");
        self.observers.retain(|(_, tx)| tx.send(mutation).is_ok());
    }
}

impl Document for HtmlDocument {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    fn select(&self, selector: &str) -> Result<Vec<ElementId>> {
        let parsed = Selector::parse(selector).map_err(|e| DomError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{e:?}"),
        })?;
        Ok(self
            .html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| parsed.matches(el))
            .filter_map(|el| self.ids.get(&el.id()).copied())
            .collect())
    }

    fn text_nodes(&self) -> Vec<TextNode> {
        let mut found = Vec::new();
        for node in self.html.tree.root().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            let Some(parent) = node.parent() else {
                continue;
            };
            let inside_non_rendered = std::iter::once(parent)
                .chain(parent.ancestors())
                .filter_map(|n| n.value().as_element())
                .any(|el| NON_RENDERED.contains(&el.name()));
            if inside_non_rendered {
                continue;
            }
            if let Some(parent_id) = self.ids.get(&parent.id()) {
                found.push(TextNode {
                    parent: *parent_id,
                    text: text.to_string(),
                });
            }
        }
        found
    }

    fn is_visible(&self, element: ElementId) -> Result<bool> {
        let node = self.node(element)?;
        if !is_attached(self.html.tree.root().id(), node) {
            return Err(DomError::Detached(element));
        }
        let hidden = std::iter::once(node)
            .chain(node.ancestors())
            .any(|n| self.hides_itself(n));
        Ok(!hidden)
    }

    fn style(&self, element: ElementId, property: &str) -> Result<Option<String>> {
        let node = self.node(element)?;
        Ok(self.effective_style(node, property))
    }

    fn apply_mask(&mut self, element: ElementId, intensity: u32) -> Result<()> {
        self.node(element)?;
        if !self.masks.contains_key(&element) {
            let prior = self.override_value(element, MASK_PROPERTY);
            self.masks.insert(element, prior);
        }
        let blur = format!("blur({intensity}px)");
        self.write_override(element, MASK_PROPERTY, Some(&blur));
        Ok(())
    }

    fn revert_mask(&mut self, element: ElementId) -> Result<()> {
        self.node(element)?;
        if let Some(prior) = self.masks.remove(&element) {
            self.write_override(element, MASK_PROPERTY, prior.as_deref());
        }
        Ok(())
    }

    fn subscribe(&mut self, observer: MutationSender) -> ObserverHandle {
        let handle = ObserverHandle::new(self.next_observer);
        self.next_observer += 1;
        self.observers.push((handle, observer));
        handle
    }

    fn unsubscribe(&mut self, handle: ObserverHandle) {
        self.observers.retain(|(h, _)| *h != handle);
    }
}

fn is_attached(root: NodeId, node: NodeRef<'_, Node>) -> bool {
    node.id() == root || node.ancestors().any(|a| a.id() == root)
}

fn inline_property(style: &str, property: &str) -> Option<String> {
    style.split(';').rev().find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case(property)
            .then(|| value.trim().to_ascii_lowercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const PAGE: &str = r#"
        <html>
          <head><title>jane@example.com</title><style>.x { color: red }</style></head>
          <body>
            <div id="contact">Contact: jane@example.com</div>
            <div id="gone" style="display: none">secret@example.com</div>
            <div id="faded" style="opacity: 0"><span id="inner">hidden@example.com</span></div>
            <div id="styled" style="filter: grayscale(1)">Styled</div>
            <p hidden id="attr">Attribute hidden</p>
            <ul id="list"></ul>
          </body>
        </html>
    "#;

    fn doc() -> HtmlDocument {
        HtmlDocument::parse("example.com", PAGE)
    }

    fn id(doc: &HtmlDocument, selector: &str) -> ElementId {
        doc.first(selector).unwrap().unwrap()
    }

    #[test]
    fn test_select_by_id_and_class() {
        let doc = doc();
        assert_eq!(doc.select("#contact").unwrap().len(), 1);
        assert_eq!(doc.select("div").unwrap().len(), 4);
        assert!(doc.select(".missing").unwrap().is_empty());
        assert_eq!(doc.hostname(), "example.com");
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let err = doc().select("[[nope").unwrap_err();
        assert!(matches!(err, DomError::InvalidSelector { .. }));
    }

    #[test]
    fn test_text_nodes_skip_non_rendered() {
        let doc = doc();
        let texts: Vec<String> = doc.text_nodes().into_iter().map(|t| t.text).collect();
        assert!(texts.iter().any(|t| t == "Contact: jane@example.com"));
        assert!(!texts.iter().any(|t| t.contains("color: red")));
        let mentions = texts.iter().filter(|t| t.contains("jane@")).count();
        assert_eq!(mentions, 1);
    }

    #[test]
    fn test_visibility() {
        let doc = doc();
        assert!(doc.is_visible(id(&doc, "#contact")).unwrap());
        assert!(!doc.is_visible(id(&doc, "#gone")).unwrap());
        assert!(!doc.is_visible(id(&doc, "#inner")).unwrap());
        assert!(!doc.is_visible(id(&doc, "#attr")).unwrap());
    }

    #[test]
    fn test_visibility_follows_runtime_style() {
        let mut doc = doc();
        let contact = id(&doc, "#contact");
        let hidden = Some("hidden");
        doc.set_style(contact, "visibility", hidden).unwrap();
        assert!(!doc.is_visible(contact).unwrap());
        doc.set_style(contact, "visibility", None).unwrap();
        assert!(doc.is_visible(contact).unwrap());
    }

    #[test]
    fn test_mask_then_revert_restores_style() {
        let mut doc = doc();
        for selector in ["#contact", "#styled"] {
            let el = id(&doc, selector);
            let before = doc.style(el, "filter").unwrap();

            doc.apply_mask(el, 12).unwrap();
            assert_eq!(
                doc.style(el, "filter").unwrap().as_deref(),
                Some("blur(12px)")
            );
            assert!(doc.is_masked(el));

            doc.revert_mask(el).unwrap();
            assert_eq!(doc.style(el, "filter").unwrap(), before);
            assert!(!doc.is_masked(el));
        }
    }

    #[test]
    fn test_mask_over_runtime_override_restores_override() {
        let mut doc = doc();
        let el = id(&doc, "#contact");
        doc.set_style(el, "filter", Some("sepia(1)")).unwrap();

        doc.apply_mask(el, 5).unwrap();
        doc.apply_mask(el, 20).unwrap();
        assert_eq!(
            doc.style(el, "filter").unwrap().as_deref(),
            Some("blur(20px)")
        );

        doc.revert_mask(el).unwrap();
        assert_eq!(
            doc.style(el, "filter").unwrap().as_deref(),
            Some("sepia(1)")
        );
    }

    #[test]
    fn test_revert_unmasked_is_noop() {
        let mut doc = doc();
        let el = id(&doc, "#contact");
        doc.revert_mask(el).unwrap();
        assert_eq!(doc.style(el, "filter").unwrap(), None);
    }

    #[test]
    fn test_unknown_element() {
        let mut doc = doc();
        let bogus = ElementId::new(10_000);
        assert!(matches!(doc.apply_mask(bogus, 1), Err(DomError::UnknownElement(_))));
        assert!(doc.is_visible(bogus).is_err());
    }

    #[test]
    fn test_append_html_registers_elements_and_notifies() {
        let mut doc = doc();
        let (tx, mut rx) = mpsc::unbounded_channel();
        doc.subscribe(tx);

        let list = id(&doc, "#list");
        let markup = r#"<li class="row">Card 4111 1111 1111 1111</li><li>plain</li>"#;
        let added = doc.append_html(list, markup).unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(doc.tag_name(added[0]).unwrap(), "li");
        assert_eq!(doc.select("#list .row").unwrap(), vec![added[0]]);
        let expected = Mutation::ChildList { target: list };
        assert_eq!(rx.try_recv().unwrap(), expected);
    }

    #[test]
    fn test_set_text_notifies_character_data() {
        let mut doc = doc();
        let (tx, mut rx) = mpsc::unbounded_channel();
        doc.subscribe(tx);

        let el = id(&doc, "#contact");
        doc.set_text(el, "Nothing to see").unwrap();
        assert_eq!(doc.text_of(el).unwrap(), "Nothing to see");
        let expected = Mutation::CharacterData { target: el };
        assert_eq!(rx.try_recv().unwrap(), expected);
    }

    #[test]
    fn test_remove_detaches_element() {
        let mut doc = doc();
        let el = id(&doc, "#contact");
        doc.remove(el).unwrap();

        assert!(doc.select("#contact").unwrap().is_empty());
        assert!(matches!(doc.is_visible(el), Err(DomError::Detached(_))));
        assert!(!doc
            .text_nodes()
            .iter()
            .any(|t| t.text.contains("jane@example.com")));
        assert!(matches!(doc.remove(el), Err(DomError::Detached(_))));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut doc = doc();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = doc.subscribe(tx);
        doc.unsubscribe(handle);

        let el = id(&doc, "#contact");
        doc.set_text(el, "changed").unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_inline_property_parsing() {
        assert_eq!(
            inline_property("color: red; DISPLAY : None", "display").as_deref(),
            Some("none")
        );
        assert_eq!(inline_property("color: red", "display"), None);
        assert_eq!(
            inline_property("opacity: 1; opacity: 0", "opacity").as_deref(),
            Some("0")
        );
    }
}
