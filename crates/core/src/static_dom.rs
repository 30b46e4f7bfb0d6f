//! In-memory document
//!
//! An arena of element nodes rooted at `<html>` with a `<body>` child. Layout
//! is not computed: every element carries the client rect it was given. Good
//! enough for running the codec and the placement engine headless and for
//! tests that need to reshape a page between two resolutions.

use crate::css::{self, SelectorError, SelectorList};
use crate::dom::{Dom, Rect, ViewportSize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

/// Handle to an element of a [`StaticDocument`]
///
/// Belongs to the document that created it. Any other document panics on an
/// out-of-range handle or reads an unrelated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Rect,
}

impl NodeData {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_owned(),
            id: None,
            classes: Vec::new(),
            parent,
            children: Vec::new(),
            rect: Rect::default(),
        }
    }
}

#[derive(Debug)]
pub struct StaticDocument {
    nodes: RefCell<Vec<NodeData>>,
    html: NodeId,
    body: NodeId,
    viewport: Cell<ViewportSize>,
    scrolled: RefCell<Vec<NodeId>>,
    highlighted: RefCell<BTreeSet<NodeId>>,
}

impl StaticDocument {
    /// Empty `<html><body></body></html>` document
    pub fn new(viewport: ViewportSize) -> Self {
        let html = NodeId(0);
        let body = NodeId(1);
        let mut root = NodeData::new("html", None);
        root.children.push(body);
        let mut body_node = NodeData::new("body", Some(html));
        body_node.rect = Rect::new(0.0, 0.0, viewport.width, viewport.height);

        Self {
            nodes: RefCell::new(vec![root, body_node]),
            html,
            body,
            viewport: Cell::new(viewport),
            scrolled: RefCell::new(Vec::new()),
            highlighted: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn html_element(&self) -> NodeId {
        self.html
    }

    pub fn body_element(&self) -> NodeId {
        self.body
    }

    /// Append a new `tag` element as the last child of `parent`
    pub fn append(&self, parent: NodeId, tag: &str) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(NodeData::new(tag, Some(parent)));
        nodes[parent.0].children.push(id);
        id
    }

    /// Insert a new `tag` element before the child at `index` of `parent`
    ///
    /// An index past the end appends.
    pub fn insert(&self, parent: NodeId, index: usize, tag: &str) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(NodeData::new(tag, Some(parent)));
        let children = &mut nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, id);
        id
    }

    /// Detach `node` (and its subtree) from the document
    ///
    /// The handle stays valid but no query will return it any more.
    pub fn remove(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    pub fn set_id(&self, node: NodeId, id: &str) {
        self.nodes.borrow_mut()[node.0].id = Some(id.to_owned());
    }

    pub fn remove_id(&self, node: NodeId) {
        self.nodes.borrow_mut()[node.0].id = None;
    }

    pub fn set_classes(&self, node: NodeId, classes: &[&str]) {
        let mut unique: Vec<String> = Vec::with_capacity(classes.len());
        for class in classes {
            if !class.is_empty() && !unique.iter().any(|existing| existing == class) {
                unique.push((*class).to_owned());
            }
        }
        self.nodes.borrow_mut()[node.0].classes = unique;
    }

    pub fn set_rect(&self, node: NodeId, rect: Rect) {
        self.nodes.borrow_mut()[node.0].rect = rect;
    }

    pub fn set_viewport(&self, viewport: ViewportSize) {
        self.viewport.set(viewport);
    }

    /// Shift every element's client rect, as scrolling the page would
    pub fn scroll_by(&self, dx: f64, dy: f64) {
        for node in self.nodes.borrow_mut().iter_mut() {
            node.rect = node.rect.translated(-dx, -dy);
        }
    }

    /// Whether `node` is still reachable from the document element
    pub fn is_connected(&self, node: NodeId) -> bool {
        let nodes = self.nodes.borrow();
        let mut current = node;
        loop {
            if current == self.html {
                return true;
            }
            match nodes[current.0].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Elements passed to `scroll_into_view`, oldest first
    pub fn scrolled_into_view(&self) -> Vec<NodeId> {
        self.scrolled.borrow().clone()
    }

    /// Elements currently highlighted, in node order
    pub fn highlighted(&self) -> Vec<NodeId> {
        self.highlighted.borrow().iter().copied().collect()
    }
}

impl Dom for StaticDocument {
    type Element = NodeId;

    fn tag_name(&self, element: &NodeId) -> String {
        self.nodes.borrow()[element.0].tag.clone()
    }

    fn id(&self, element: &NodeId) -> Option<String> {
        self.nodes.borrow()[element.0].id.clone()
    }

    fn class_list(&self, element: &NodeId) -> Vec<String> {
        self.nodes.borrow()[element.0].classes.clone()
    }

    fn parent_element(&self, element: &NodeId) -> Option<NodeId> {
        self.nodes.borrow()[element.0].parent
    }

    fn children(&self, element: &NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[element.0].children.clone()
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn document_element(&self) -> Option<NodeId> {
        Some(self.html)
    }

    fn bounding_client_rect(&self, element: &NodeId) -> Rect {
        self.nodes.borrow()[element.0].rect
    }

    fn viewport(&self) -> ViewportSize {
        self.viewport.get()
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selectors = SelectorList::parse(selector)?;
        Ok(css::query_all(self, &selectors))
    }

    fn scroll_into_view(&self, element: &NodeId) {
        self.scrolled.borrow_mut().push(*element);
    }

    fn set_highlight(&self, element: &NodeId, highlighted: bool) {
        let mut set = self.highlighted.borrow_mut();
        if highlighted {
            set.insert(*element);
        } else {
            set.remove(element);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> StaticDocument {
        StaticDocument::new(ViewportSize::new(1280.0, 800.0))
    }

    #[test]
    fn new_document_has_html_and_body() {
        let doc = doc();
        assert_eq!(doc.tag_name(&doc.html_element()), "html");
        assert_eq!(doc.tag_name(&doc.body_element()), "body");
        assert_eq!(doc.parent_element(&doc.body_element()), Some(doc.html_element()));
        assert_eq!(doc.parent_element(&doc.html_element()), None);
    }

    #[test]
    fn insert_places_node_before_index() {
        let doc = doc();
        let body = doc.body_element();
        let a = doc.append(body, "p");
        let c = doc.append(body, "p");
        let b = doc.insert(body, 1, "p");
        let first = doc.insert(body, 0, "h1");
        let last = doc.insert(body, 99, "footer");

        assert_eq!(doc.children(&body), vec![first, a, b, c, last]);
    }

    #[test]
    fn removed_subtree_is_unreachable() {
        let doc = doc();
        let section = doc.append(doc.body_element(), "section");
        let inner = doc.append(section, "span");
        doc.set_id(inner, "inner");

        doc.remove(section);

        assert!(!doc.is_connected(inner));
        assert_eq!(doc.query_selector("#inner").expect("query"), None);
        assert!(doc.children(&doc.body_element()).is_empty());
    }

    #[test]
    fn classes_are_deduplicated() {
        let doc = doc();
        let node = doc.append(doc.body_element(), "div");
        doc.set_classes(node, &["a", "b", "a", ""]);
        assert_eq!(doc.class_list(&node), vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn scrolling_shifts_client_rects() {
        let doc = doc();
        let node = doc.append(doc.body_element(), "div");
        doc.set_rect(node, Rect::new(100.0, 100.0, 200.0, 150.0));

        doc.scroll_by(0.0, 40.0);

        assert_eq!(doc.bounding_client_rect(&node), Rect::new(60.0, 100.0, 200.0, 110.0));
    }

    #[test]
    fn highlight_marks_and_unmarks() {
        let doc = doc();
        let a = doc.append(doc.body_element(), "div");
        let b = doc.append(doc.body_element(), "div");

        doc.set_highlight(&b, true);
        doc.set_highlight(&a, true);
        doc.set_highlight(&a, true);
        assert_eq!(doc.highlighted(), vec![a, b]);

        doc.set_highlight(&a, false);
        assert_eq!(doc.highlighted(), vec![b]);
    }
}
