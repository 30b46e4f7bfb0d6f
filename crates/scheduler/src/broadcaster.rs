//! Shared scroll/resize fan-out for note positions
//!
//! Every visible note needs its placement recomputed when the page scrolls or
//! resizes. The broadcaster owns the only pair of page listeners, alive while
//! at least one subscriber exists. Raw events are folded into one animation
//! frame in which every subscriber callback runs once.
//!
//! ```text
//!            subscribe (set was empty)
//!   Idle  ─────────────────────────────▶  Listening
//!         ◀─────────────────────────────
//!            unsubscribe (set now empty)
//! ```

use crate::frame_budget::{FrameBudget, FRAME_BUDGET_60FPS};
use crate::host::{FrameHost, FrameRequestId, ViewportEvent};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Callback run on every coalesced frame and on [`PositionBroadcaster::force_update`]
pub type PositionCallback = Box<dyn FnMut() -> anyhow::Result<()>>;

/// Identifier of one subscription. Never reused within a broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Listener state of the broadcaster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcasterState {
    /// No subscribers, no page listeners attached
    Idle,
    /// Page listeners attached
    Listening,
}

/// Broadcaster statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Raw scroll/resize events received while listening
    pub events_received: u64,

    /// Coalesced frames that ran a notification pass
    pub frames_run: u64,

    /// Passes triggered through `force_update`
    pub forced_updates: u64,

    /// Callback invocations that returned an error or panicked
    pub callback_failures: u64,

    /// Passes that ran past the frame budget
    pub budget_overruns: u64,
}

type SharedCallback = Rc<RefCell<PositionCallback>>;

struct Subscriber {
    id: SubscriptionId,
    callback: SharedCallback,
}

struct BroadcastState {
    state: BroadcasterState,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    pending: bool,
    scheduled: Option<FrameRequestId>,
    frame_budget: Duration,
    stats: BroadcastStats,
}

struct Shared {
    host: Box<dyn FrameHost>,
    inner: RefCell<BroadcastState>,
}

/// Coalescing scroll/resize notifier
///
/// Cloning yields another handle to the same broadcaster. Constructed once by
/// the embedding layer and passed to whatever needs it.
///
/// # Example
///
/// ```
/// use sticker_scheduler::{ManualFrameHost, PositionBroadcaster, ViewportEvent};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let host = Rc::new(ManualFrameHost::new());
/// let broadcaster = PositionBroadcaster::new(host.clone());
///
/// let calls = Rc::new(Cell::new(0));
/// let counter = calls.clone();
/// let subscription = broadcaster.subscribe(move || {
///     counter.set(counter.get() + 1);
///     Ok(())
/// });
///
/// for _ in 0..10 {
///     broadcaster.handle_event(ViewportEvent::Scroll);
/// }
/// let frame = host.take_requested_frame().expect("one frame requested");
/// broadcaster.run_frame(frame);
/// assert_eq!(calls.get(), 1);
///
/// subscription.unsubscribe();
/// assert!(!host.is_listening());
/// ```
#[derive(Clone)]
pub struct PositionBroadcaster {
    shared: Rc<Shared>,
}

impl fmt::Debug for PositionBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.borrow();
        f.debug_struct("PositionBroadcaster")
            .field("state", &inner.state)
            .field("subscribers", &inner.subscribers.len())
            .field("pending", &inner.pending)
            .field("scheduled", &inner.scheduled)
            .finish()
    }
}

impl PositionBroadcaster {
    /// Create an idle broadcaster driving `host`
    pub fn new(host: impl FrameHost + 'static) -> Self {
        Self {
            shared: Rc::new(Shared {
                host: Box::new(host),
                inner: RefCell::new(BroadcastState {
                    state: BroadcasterState::Idle,
                    subscribers: Vec::new(),
                    next_id: 0,
                    pending: false,
                    scheduled: None,
                    frame_budget: FRAME_BUDGET_60FPS,
                    stats: BroadcastStats::default(),
                }),
            }),
        }
    }

    /// Use a different budget for overrun reporting
    pub fn with_frame_budget(self, budget: Duration) -> Self {
        self.shared.inner.borrow_mut().frame_budget = budget;
        self
    }

    /// Register a callback
    ///
    /// The first subscriber attaches the page listeners. The returned handle
    /// is the only way to remove the callback again.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut() -> anyhow::Result<()> + 'static,
    {
        let (id, start_listening) = {
            let mut inner = self.shared.inner.borrow_mut();
            inner.next_id += 1;
            let id = SubscriptionId(inner.next_id);
            inner.subscribers.push(Subscriber {
                id,
                callback: Rc::new(RefCell::new(Box::new(callback))),
            });

            let start = inner.state == BroadcasterState::Idle;
            if start {
                inner.state = BroadcasterState::Listening;
            }
            (id, start)
        };

        if start_listening {
            self.shared.host.attach_listeners();
            tracing::debug!("position broadcaster listening");
        }

        Subscription { id, shared: Rc::downgrade(&self.shared), active: Cell::new(true) }
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (removed, cancel, stop_listening) = {
            let mut inner = self.shared.inner.borrow_mut();
            let before = inner.subscribers.len();
            inner.subscribers.retain(|subscriber| subscriber.id != id);
            let removed = inner.subscribers.len() != before;

            let stop = removed
                && inner.subscribers.is_empty()
                && inner.state == BroadcasterState::Listening;
            let mut cancel = None;
            if stop {
                inner.state = BroadcasterState::Idle;
                inner.pending = false;
                cancel = inner.scheduled.take();
            }
            (removed, cancel, stop)
        };

        if let Some(frame) = cancel {
            self.shared.host.cancel_frame(frame);
        }
        if stop_listening {
            self.shared.host.detach_listeners();
            tracing::debug!("position broadcaster idle");
        }
        removed
    }

    /// Entry point for raw scroll/resize events
    ///
    /// Requests an animation frame unless one is already scheduled. Returns
    /// `false` when the broadcaster is idle and the event was ignored.
    pub fn handle_event(&self, event: ViewportEvent) -> bool {
        let request = {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.state == BroadcasterState::Idle {
                return false;
            }

            inner.stats.events_received += 1;
            inner.pending = true;
            inner.scheduled.is_none()
        };

        if request {
            let frame = self.shared.host.request_frame();
            self.shared.inner.borrow_mut().scheduled = Some(frame);
            tracing::trace!(?event, ?frame, "scheduled position frame");
        }
        true
    }

    /// Run the notification pass for a fired animation frame
    ///
    /// Frames that were cancelled or superseded are ignored and `false` is
    /// returned.
    pub fn run_frame(&self, frame: FrameRequestId) -> bool {
        {
            let mut inner = self.shared.inner.borrow_mut();
            if inner.scheduled != Some(frame) {
                tracing::trace!(?frame, "ignoring stale position frame");
                return false;
            }
            inner.scheduled = None;
            inner.pending = false;
            inner.stats.frames_run += 1;
        }

        self.notify_subscribers();
        true
    }

    /// Run every callback immediately, outside the frame cycle
    pub fn force_update(&self) {
        self.shared.inner.borrow_mut().stats.forced_updates += 1;
        self.notify_subscribers();
    }

    fn notify_subscribers(&self) {
        let (snapshot, budget) = {
            let inner = self.shared.inner.borrow();
            let snapshot: Vec<(SubscriptionId, SharedCallback)> = inner
                .subscribers
                .iter()
                .map(|subscriber| (subscriber.id, Rc::clone(&subscriber.callback)))
                .collect();
            (snapshot, FrameBudget::new(inner.frame_budget))
        };

        let mut failures = 0;
        for (id, callback) in snapshot {
            // Removed by an earlier callback of this same pass
            if !self.is_subscribed(id) {
                continue;
            }

            let Ok(mut guard) = callback.try_borrow_mut() else {
                tracing::debug!(subscription = ?id, "skipping re-entrant position callback");
                continue;
            };

            match catch_unwind(AssertUnwindSafe(|| (&mut **guard)())) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    failures += 1;
                    tracing::warn!(subscription = ?id, error = %error, "position update callback failed");
                }
                Err(payload) => {
                    failures += 1;
                    let detail = panic_payload_message(payload);
                    tracing::warn!(subscription = ?id, panic = %detail, "position update callback panicked");
                }
            }
        }

        let mut inner = self.shared.inner.borrow_mut();
        inner.stats.callback_failures += failures;
        if let Some(over) = budget.overrun() {
            inner.stats.budget_overruns += 1;
            tracing::debug!(
                elapsed_us = budget.elapsed().as_micros() as u64,
                over_us = over.as_micros() as u64,
                "position pass exceeded frame budget"
            );
        }
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.shared.inner.borrow().subscribers.iter().any(|subscriber| subscriber.id == id)
    }

    pub fn state(&self) -> BroadcasterState {
        self.shared.inner.borrow().state
    }

    pub fn is_listening(&self) -> bool {
        self.state() == BroadcasterState::Listening
    }

    /// Whether events arrived since the last pass
    pub fn has_pending_frame(&self) -> bool {
        self.shared.inner.borrow().pending
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.inner.borrow().subscribers.len()
    }

    pub fn stats(&self) -> BroadcastStats {
        self.shared.inner.borrow().stats.clone()
    }
}

fn panic_payload_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "unknown panic payload".to_owned(),
        },
    }
}

/// Handle to one registered callback
///
/// Owned by whoever subscribed. Dropping it does not unsubscribe.
#[must_use = "the callback stays registered until `unsubscribe` is called"]
pub struct Subscription {
    id: SubscriptionId,
    shared: Weak<Shared>,
    active: Cell<bool>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether `unsubscribe` has not been called yet and the broadcaster is alive
    pub fn is_active(&self) -> bool {
        self.active.get() && self.shared.strong_count() > 0
    }

    /// Remove the callback. Only the first call has any effect.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }

        if let Some(shared) = self.shared.upgrade() {
            PositionBroadcaster { shared }.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}
