//! Sticker Scheduler Library
//!
//! Frame-coalesced position notifications for anchored notes.
//!
//! Any number of notes subscribe to one [`PositionBroadcaster`]. It keeps a
//! single scroll/resize listener pair attached while it has subscribers and
//! re-runs every subscriber callback once per animation frame, however many
//! raw events arrived in between.
//!
//! # Example
//!
//! ```
//! use sticker_scheduler::{ManualFrameHost, PositionBroadcaster, ViewportEvent};
//! use std::rc::Rc;
//!
//! let host = Rc::new(ManualFrameHost::new());
//! let broadcaster = PositionBroadcaster::new(host.clone());
//!
//! let subscription = broadcaster.subscribe(|| {
//!     // recompute this note's placement
//!     Ok(())
//! });
//!
//! broadcaster.handle_event(ViewportEvent::Scroll);
//! broadcaster.handle_event(ViewportEvent::Resize);
//!
//! // The host fires the single requested frame
//! if let Some(frame) = host.take_requested_frame() {
//!     broadcaster.run_frame(frame);
//! }
//!
//! subscription.unsubscribe();
//! ```

mod broadcaster;
pub mod frame_budget;
mod host;

// Re-export public API
pub use broadcaster::{
    BroadcastStats, BroadcasterState, PositionBroadcaster, PositionCallback, Subscription,
    SubscriptionId,
};
pub use frame_budget::FrameBudget;
pub use host::{FrameHost, FrameRequestId, ManualFrameHost, ViewportEvent};
