//! Note placement around an anchor
//!
//! Sides are tried in reading order: right, left, bottom, then top as the
//! fallback that always applies. Coordinates are viewport-fixed.

use crate::config::PlacementConfig;
use crate::dom::{Dom, Rect, ViewportSize};
use note_model::NoteSide;
use serde::{Deserialize, Serialize};

/// Where a note card goes, in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub side: NoteSide,
    pub top: f64,
    pub left: f64,
}

/// Inline `position: fixed` style for a [`Placement`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementStyle {
    pub top: String,
    pub left: String,
}

impl Placement {
    pub fn style(&self) -> PlacementStyle {
        PlacementStyle {
            top: format!("{}px", self.top),
            left: format!("{}px", self.left),
        }
    }
}

/// Place a note next to `anchor`
pub fn place(anchor: Rect, viewport: ViewportSize, config: &PlacementConfig) -> Placement {
    let PlacementConfig {
        note_width: width,
        note_margin: margin,
        viewport_padding: padding,
        min_note_height,
        assumed_note_height,
    } = *config;

    let space_right = viewport.width - anchor.right - margin;
    let space_left = anchor.left - margin;
    let space_below = viewport.height - anchor.bottom - margin;

    let mut placement = if space_right >= width + padding {
        Placement { side: NoteSide::Right, top: padding.max(anchor.top), left: anchor.right + margin }
    } else if space_left >= width + padding {
        Placement {
            side: NoteSide::Left,
            top: padding.max(anchor.top),
            left: anchor.left - width - margin,
        }
    } else if space_below >= min_note_height {
        Placement {
            side: NoteSide::Bottom,
            top: anchor.bottom + margin,
            left: clamp_left(anchor.left, viewport, config),
        }
    } else {
        Placement {
            side: NoteSide::Top,
            top: padding.max(anchor.top - margin - min_note_height),
            left: clamp_left(anchor.left, viewport, config),
        }
    };

    if placement.top + assumed_note_height > viewport.height {
        placement.top = padding.max(viewport.height - assumed_note_height - padding);
    }

    placement
}

/// Place a note next to `element` using its current geometry
pub fn place_element<D: Dom + ?Sized>(
    dom: &D,
    element: &D::Element,
    config: &PlacementConfig,
) -> Placement {
    place(dom.bounding_client_rect(element), dom.viewport(), config)
}

// The padding bound wins when the viewport is narrower than a note.
fn clamp_left(left: f64, viewport: ViewportSize, config: &PlacementConfig) -> f64 {
    let max = viewport.width - config.note_width - config.viewport_padding;
    left.min(max).max(config.viewport_padding)
}
