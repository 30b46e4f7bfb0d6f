//! Sticker Core Library
//!
//! Anchor codec, note placement and the per-page note board.
//!
//! Everything that touches a page goes through the [`Dom`] capability, so the
//! same code runs against a live document or against [`StaticDocument`].

pub mod board;
pub mod config;
pub mod css;
pub mod dom;
pub mod message;
pub mod placement;
pub mod selector;
pub mod static_dom;

pub use board::{
    BadgePublisher, BadgeRecorder, BoardError, BoardResult, NoteBoard, RescanReport, ViewOutcome,
};
pub use config::{ConfigError, PlacementConfig};
pub use css::{escape_identifier, SelectorError, SelectorList};
pub use dom::{Dom, Rect, ViewportSize};
pub use message::{BadgeUpdate, HostMessage, StateReply};
pub use placement::{place, place_element, Placement, PlacementStyle};
pub use selector::{decode, encode, resolve, AnchorResolution};
pub use static_dom::{NodeId, StaticDocument};
