//! Anchor selector codec
//!
//! [`encode`] turns an element into a [`Locator`], preferring ids, then
//! classes that are unique in the document, then `:nth-of-type` positions.
//! [`decode`] and [`resolve`] run a locator back against a document.
//!
//! # Example
//!
//! ```
//! use note_model::Locator;
//! use sticker_core::{decode, encode, StaticDocument, ViewportSize};
//!
//! let doc = StaticDocument::new(ViewportSize::new(1280.0, 800.0));
//! let list = doc.append(doc.body_element(), "ul");
//! doc.append(list, "li");
//! let second = doc.append(list, "li");
//!
//! let locator = encode(&doc, &second);
//! assert_eq!(locator.as_str(), "body > ul > li:nth-of-type(2)");
//! assert_eq!(decode(&doc, &locator), Some(second));
//! assert_eq!(decode(&doc, &Locator::new("#missing")), None);
//! ```

use crate::css::{escape_identifier, position_of_type};
use crate::dom::Dom;
use note_model::Locator;
use tracing::debug;

/// Outcome of running a locator against the current document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorResolution<E> {
    Resolved(E),
    /// Nothing matched, or the locator could not be parsed
    Unresolved,
}

impl<E> AnchorResolution<E> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, AnchorResolution::Resolved(_))
    }

    pub fn element(&self) -> Option<&E> {
        match self {
            AnchorResolution::Resolved(element) => Some(element),
            AnchorResolution::Unresolved => None,
        }
    }

    pub fn into_element(self) -> Option<E> {
        match self {
            AnchorResolution::Resolved(element) => Some(element),
            AnchorResolution::Unresolved => None,
        }
    }
}

impl<E> From<Option<E>> for AnchorResolution<E> {
    fn from(element: Option<E>) -> Self {
        match element {
            Some(element) => AnchorResolution::Resolved(element),
            None => AnchorResolution::Unresolved,
        }
    }
}

/// Build the locator for `element`
///
/// Encoding `<body>` or `<html>` yields the bare tag name.
pub fn encode<D: Dom + ?Sized>(dom: &D, element: &D::Element) -> Locator {
    if let Some(id) = non_empty_id(dom, element) {
        return Locator::new(format!("#{}", escape_identifier(&id)));
    }

    let body = dom.body();
    let root = dom.document_element();
    let mut path: Vec<String> = Vec::new();
    let mut current = Some(element.clone());

    while let Some(node) = current {
        if body.as_ref() == Some(&node) || root.as_ref() == Some(&node) {
            break;
        }
        if let Some(id) = non_empty_id(dom, &node) {
            path.push(format!("#{}", escape_identifier(&id)));
            break;
        }
        path.push(fragment(dom, &node));
        current = dom.parent_element(&node);
    }

    if path.is_empty() {
        return Locator::new(dom.tag_name(element).to_ascii_lowercase());
    }

    path.reverse();
    if !path[0].starts_with('#') {
        path.insert(0, "body".to_owned());
    }

    Locator::new(path.join(" > "))
}

/// First element matching `locator`, or `None`
///
/// Locators that fail to parse behave like locators that match nothing.
pub fn decode<D: Dom + ?Sized>(dom: &D, locator: &Locator) -> Option<D::Element> {
    match dom.query_selector(locator.as_str()) {
        Ok(found) => found,
        Err(err) => {
            debug!(locator = %locator, error = %err, "locator query failed");
            None
        }
    }
}

pub fn resolve<D: Dom + ?Sized>(dom: &D, locator: &Locator) -> AnchorResolution<D::Element> {
    let resolution = AnchorResolution::from(decode(dom, locator));
    if !resolution.is_resolved() {
        debug!(locator = %locator, "anchor unresolved");
    }
    resolution
}

fn non_empty_id<D: Dom + ?Sized>(dom: &D, element: &D::Element) -> Option<String> {
    dom.id(element).filter(|id| !id.is_empty())
}

fn fragment<D: Dom + ?Sized>(dom: &D, node: &D::Element) -> String {
    let tag = dom.tag_name(node).to_ascii_lowercase();
    let classes: Vec<String> = dom
        .class_list(node)
        .iter()
        .filter(|class| !class.is_empty())
        .map(|class| escape_identifier(class))
        .collect();

    for class in &classes {
        let candidate = format!("{tag}.{class}");
        if matches_only(dom, &candidate, node) {
            return candidate;
        }
    }

    for (index, first) in classes.iter().enumerate() {
        for second in &classes[index + 1..] {
            let candidate = format!("{tag}.{first}.{second}");
            if matches_only(dom, &candidate, node) {
                return candidate;
            }
        }
    }

    if has_same_tag_siblings(dom, node, &tag) {
        return format!("{tag}:nth-of-type({})", position_of_type(dom, node));
    }

    tag
}

fn matches_only<D: Dom + ?Sized>(dom: &D, selector: &str, node: &D::Element) -> bool {
    match dom.query_selector_all(selector) {
        Ok(found) => found.len() == 1 && &found[0] == node,
        Err(err) => {
            debug!(selector, error = %err, "candidate fragment rejected");
            false
        }
    }
}

fn has_same_tag_siblings<D: Dom + ?Sized>(dom: &D, node: &D::Element, tag: &str) -> bool {
    let Some(parent) = dom.parent_element(node) else {
        return false;
    };

    dom.children(&parent)
        .iter()
        .filter(|sibling| dom.tag_name(sibling).eq_ignore_ascii_case(tag))
        .nth(1)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ViewportSize;
    use crate::static_dom::{NodeId, StaticDocument};

    fn doc() -> StaticDocument {
        StaticDocument::new(ViewportSize::new(1280.0, 800.0))
    }

    fn roundtrips(doc: &StaticDocument, node: NodeId) {
        let locator = encode(doc, &node);
        assert_eq!(decode(doc, &locator), Some(node), "locator {locator}");
    }

    #[test]
    fn id_wins_over_everything() {
        let doc = doc();
        let wrapper = doc.append(doc.body_element(), "section");
        doc.set_id(wrapper, "outer");
        let node = doc.append(wrapper, "div");
        doc.set_classes(node, &["unique"]);
        doc.set_id(node, "x");

        assert_eq!(encode(&doc, &node).as_str(), "#x");
    }

    #[test]
    fn ids_are_escaped() {
        let doc = doc();
        let node = doc.append(doc.body_element(), "div");
        doc.set_id(node, "1:weird id");

        let locator = encode(&doc, &node);
        assert_eq!(locator.as_str(), "#\\31 \\:weird\\ id");
        assert_eq!(decode(&doc, &locator), Some(node));
    }

    #[test]
    fn empty_id_is_ignored() {
        let doc = doc();
        let node = doc.append(doc.body_element(), "p");
        doc.set_id(node, "");

        assert_eq!(encode(&doc, &node).as_str(), "body > p");
    }

    #[test]
    fn second_bare_sibling_uses_nth_of_type() {
        let doc = doc();
        let list = doc.append(doc.body_element(), "ul");
        doc.append(list, "li");
        let second = doc.append(list, "li");

        let locator = encode(&doc, &second);
        assert_eq!(locator.as_str(), "body > ul > li:nth-of-type(2)");
        assert!(locator.as_str().ends_with("li:nth-of-type(2)"));
        roundtrips(&doc, second);
    }

    #[test]
    fn nth_of_type_skips_other_tags() {
        let doc = doc();
        let parent = doc.append(doc.body_element(), "div");
        doc.append(parent, "h2");
        doc.append(parent, "p");
        doc.append(parent, "h2");
        let target = doc.append(parent, "p");

        assert_eq!(encode(&doc, &target).as_str(), "body > div > p:nth-of-type(2)");
        roundtrips(&doc, target);
    }

    #[test]
    fn only_child_of_its_tag_has_no_index() {
        let doc = doc();
        let parent = doc.append(doc.body_element(), "article");
        doc.append(parent, "h1");
        let target = doc.append(parent, "p");

        assert_eq!(encode(&doc, &target).as_str(), "body > article > p");
    }

    #[test]
    fn unique_single_class_replaces_tag() {
        let doc = doc();
        let a = doc.append(doc.body_element(), "div");
        let b = doc.append(doc.body_element(), "div");
        doc.set_classes(a, &["card"]);
        doc.set_classes(b, &["card", "featured"]);

        assert_eq!(encode(&doc, &b).as_str(), "body > div.featured");
        roundtrips(&doc, b);
    }

    #[test]
    fn class_pair_used_when_no_single_class_is_unique() {
        let doc = doc();
        let body = doc.body_element();
        let a = doc.append(body, "span");
        let b = doc.append(body, "span");
        let c = doc.append(body, "span");
        doc.set_classes(a, &["tag", "red"]);
        doc.set_classes(b, &["tag", "blue"]);
        doc.set_classes(c, &["red", "blue"]);
        let extra = doc.append(body, "span");
        doc.set_classes(extra, &["blue", "tag"]);

        // no single class is unique, the red+blue pair is
        assert_eq!(encode(&doc, &c).as_str(), "body > span.red.blue");
        roundtrips(&doc, c);
    }

    #[test]
    fn ambiguous_classes_fall_back_to_position() {
        let doc = doc();
        let body = doc.body_element();
        let a = doc.append(body, "li");
        let b = doc.append(body, "li");
        doc.set_classes(a, &["item"]);
        doc.set_classes(b, &["item"]);

        assert_eq!(encode(&doc, &b).as_str(), "body > li:nth-of-type(2)");
    }

    #[test]
    fn ancestor_id_anchors_the_path() {
        let doc = doc();
        let main = doc.append(doc.body_element(), "main");
        doc.set_id(main, "content");
        let section = doc.append(main, "section");
        doc.append(section, "p");
        let target = doc.append(section, "p");

        assert_eq!(encode(&doc, &target).as_str(), "#content > section > p:nth-of-type(2)");
        roundtrips(&doc, target);
    }

    #[test]
    fn encoding_is_deterministic_for_every_element() {
        let doc = doc();
        let body = doc.body_element();
        let nav = doc.append(body, "nav");
        doc.set_classes(nav, &["top"]);
        for _ in 0..3 {
            let item = doc.append(nav, "a");
            doc.set_classes(item, &["link"]);
        }
        let main = doc.append(body, "main");
        let table = doc.append(main, "table");
        for row in 0..4 {
            let tr = doc.append(table, "tr");
            for _ in 0..3 {
                let td = doc.append(tr, "td");
                if row == 2 {
                    doc.set_classes(td, &["hot"]);
                }
            }
        }

        let everything = doc.query_selector_all("body *").expect("query");
        assert!(everything.len() > 15);
        for node in everything {
            assert_eq!(encode(&doc, &node), encode(&doc, &node));
            roundtrips(&doc, node);
        }
    }

    #[test]
    fn removed_anchor_is_unresolved() {
        let doc = doc();
        let list = doc.append(doc.body_element(), "ol");
        doc.append(list, "li");
        let target = doc.append(list, "li");
        let locator = encode(&doc, &target);

        doc.remove(target);

        assert_eq!(decode(&doc, &locator), None);
        assert_eq!(resolve(&doc, &locator), AnchorResolution::Unresolved);
    }

    #[test]
    fn malformed_locators_are_unresolved() {
        let doc = doc();
        for raw in ["", "div >", "a:hover", "#", "[[["] {
            let locator = Locator::new(raw);
            assert_eq!(decode(&doc, &locator), None);
            assert!(!resolve(&doc, &locator).is_resolved());
        }
    }

    #[test]
    fn body_and_html_encode_to_their_tag() {
        let doc = doc();
        assert_eq!(encode(&doc, &doc.body_element()).as_str(), "body");
        assert_eq!(encode(&doc, &doc.html_element()).as_str(), "html");
        roundtrips(&doc, doc.body_element());
    }

    #[test]
    fn resolution_helpers() {
        let resolved: AnchorResolution<u8> = Some(3).into();
        assert!(resolved.is_resolved());
        assert_eq!(resolved.element(), Some(&3));
        assert_eq!(resolved.into_element(), Some(3));

        let unresolved: AnchorResolution<u8> = None.into();
        assert_eq!(unresolved.element(), None);
    }
}
