//! Event-loop seam for the broadcaster
//!
//! The broadcaster never touches a window directly. Whatever embeds it (a
//! wasm content script, a webview bridge, a test) implements [`FrameHost`] and
//! forwards raw events and fired frames back into the broadcaster.

use std::cell::{Cell, RefCell};

/// Handle of a requested animation frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(pub u64);

/// Raw page signals that can move an anchor on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportEvent {
    Scroll,
    Resize,
}

/// Window capabilities the broadcaster drives
pub trait FrameHost {
    /// Attach the page-level listeners: scroll in the capture phase (so
    /// scrolling of nested containers is seen too) and resize.
    fn attach_listeners(&self);

    /// Detach the listeners attached by [`FrameHost::attach_listeners`].
    fn detach_listeners(&self);

    /// Schedule one animation frame callback.
    fn request_frame(&self) -> FrameRequestId;

    /// Cancel a frame that has not fired yet.
    fn cancel_frame(&self, frame: FrameRequestId);
}

/// Host that records what the broadcaster asked for
///
/// Frames only "fire" when the owner pops them with
/// [`ManualFrameHost::take_requested_frame`] and hands them to
/// [`crate::PositionBroadcaster::run_frame`]. Used by tests and by headless
/// embedders that drive frames from their own loop.
#[derive(Debug, Default)]
pub struct ManualFrameHost {
    listening: Cell<bool>,
    attach_count: Cell<u32>,
    detach_count: Cell<u32>,
    next_frame: Cell<u64>,
    requested: RefCell<Vec<FrameRequestId>>,
    cancelled: RefCell<Vec<FrameRequestId>>,
}

impl ManualFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether listeners are currently attached
    pub fn is_listening(&self) -> bool {
        self.listening.get()
    }

    pub fn attach_count(&self) -> u32 {
        self.attach_count.get()
    }

    pub fn detach_count(&self) -> u32 {
        self.detach_count.get()
    }

    /// Frames requested and neither taken nor cancelled
    pub fn requested_frames(&self) -> Vec<FrameRequestId> {
        self.requested.borrow().clone()
    }

    pub fn cancelled_frames(&self) -> Vec<FrameRequestId> {
        self.cancelled.borrow().clone()
    }

    /// Pop the oldest outstanding frame request
    pub fn take_requested_frame(&self) -> Option<FrameRequestId> {
        let mut requested = self.requested.borrow_mut();
        if requested.is_empty() {
            None
        } else {
            Some(requested.remove(0))
        }
    }
}

impl FrameHost for ManualFrameHost {
    fn attach_listeners(&self) {
        self.listening.set(true);
        self.attach_count.set(self.attach_count.get() + 1);
    }

    fn detach_listeners(&self) {
        self.listening.set(false);
        self.detach_count.set(self.detach_count.get() + 1);
    }

    fn request_frame(&self) -> FrameRequestId {
        let id = FrameRequestId(self.next_frame.get() + 1);
        self.next_frame.set(id.0);
        self.requested.borrow_mut().push(id);
        id
    }

    fn cancel_frame(&self, frame: FrameRequestId) {
        self.requested.borrow_mut().retain(|requested| *requested != frame);
        self.cancelled.borrow_mut().push(frame);
    }
}

impl<H: FrameHost + ?Sized> FrameHost for std::rc::Rc<H> {
    fn attach_listeners(&self) {
        (**self).attach_listeners();
    }

    fn detach_listeners(&self) {
        (**self).detach_listeners();
    }

    fn request_frame(&self) -> FrameRequestId {
        (**self).request_frame()
    }

    fn cancel_frame(&self, frame: FrameRequestId) {
        (**self).cancel_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_host_tracks_listeners() {
        let host = ManualFrameHost::new();
        assert!(!host.is_listening());

        host.attach_listeners();
        assert!(host.is_listening());

        host.detach_listeners();
        assert!(!host.is_listening());
        assert_eq!(host.attach_count(), 1);
        assert_eq!(host.detach_count(), 1);
    }

    #[test]
    fn test_manual_host_frame_queue() {
        let host = ManualFrameHost::new();
        let first = host.request_frame();
        let second = host.request_frame();
        assert_ne!(first, second);

        host.cancel_frame(first);
        assert_eq!(host.requested_frames(), vec![second]);
        assert_eq!(host.cancelled_frames(), vec![first]);

        assert_eq!(host.take_requested_frame(), Some(second));
        assert_eq!(host.take_requested_frame(), None);
    }
}
