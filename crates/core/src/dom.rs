//! Element query and geometry capability
//!
//! The selector codec and the placement engine never talk to a browser
//! directly. They run against [`Dom`], which a wasm content script implements
//! on top of the live document and which [`crate::StaticDocument`] implements
//! in memory.

use crate::css::SelectorError;
use std::fmt;

/// Axis-aligned box in viewport (client) coordinates, CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, right: f64, bottom: f64) -> Self {
        Self { top, left, right, bottom }
    }

    /// Box from an origin and a size
    pub fn from_origin(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { top, left, right: left + width, bottom: top + height }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Same box moved by the given offsets
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            left: self.left + dx,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

/// Inner size of the window, CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Capabilities of a document needed to encode, resolve and place anchors
pub trait Dom {
    /// Handle to an element. Equality must mean "same node".
    type Element: Clone + PartialEq + fmt::Debug;

    fn tag_name(&self, element: &Self::Element) -> String;

    /// Value of the `id` attribute, if present
    fn id(&self, element: &Self::Element) -> Option<String>;

    fn class_list(&self, element: &Self::Element) -> Vec<String>;

    /// Parent element; `None` for the document element and detached roots
    fn parent_element(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Element children in document order
    fn children(&self, element: &Self::Element) -> Vec<Self::Element>;

    fn body(&self) -> Option<Self::Element>;

    fn document_element(&self) -> Option<Self::Element>;

    fn bounding_client_rect(&self, element: &Self::Element) -> Rect;

    fn viewport(&self) -> ViewportSize;

    /// Every element of the document matching `selector`, in document order
    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Element>, SelectorError>;

    /// First element of the document matching `selector`
    fn query_selector(&self, selector: &str) -> Result<Option<Self::Element>, SelectorError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// Bring the element into view. Documents without scrolling ignore it.
    fn scroll_into_view(&self, _element: &Self::Element) {}

    /// Mark or unmark an element as the anchor of a shown note
    fn set_highlight(&self, _element: &Self::Element, _highlighted: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_dimensions() {
        let rect = Rect::from_origin(100.0, 100.0, 100.0, 50.0);
        assert_eq!(rect, Rect::new(100.0, 100.0, 200.0, 150.0));
        assert_eq!(rect.width(), 100.0);
        assert_eq!(rect.height(), 50.0);
    }

    #[test]
    fn rect_translation_moves_all_edges() {
        let moved = Rect::new(10.0, 20.0, 30.0, 40.0).translated(5.0, -10.0);
        assert_eq!(moved, Rect::new(0.0, 25.0, 35.0, 30.0));
    }
}
