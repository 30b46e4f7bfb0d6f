//! Note board
//!
//! Per-page controller that owns the notes of one URL. It partitions stored
//! notes into active and orphan lists, keeps one broadcaster subscription per
//! active note while notes are shown, and persists edits through a
//! [`NoteStore`].

use crate::config::PlacementConfig;
use crate::dom::Dom;
use crate::message::{BadgeUpdate, HostMessage, StateReply};
use crate::placement::{place_element, Placement};
use crate::selector::{encode, resolve, AnchorResolution};
use note_model::{now_millis, Locator, Note, NoteId, ThemeId};
use sticker_scheduler::{PositionBroadcaster, Subscription};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use storage::{NoteStore, StorageError};
use tracing::{debug, info, trace, warn};

/// Errors returned by [`NoteBoard`] operations
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// `<body>` and `<html>` cannot carry a note
    #[error("notes cannot be attached to <{0}>")]
    UnselectableElement(String),
}

pub type BoardResult<T> = Result<T, BoardError>;

/// Receiver of badge counter updates (the extension background worker)
pub trait BadgePublisher {
    fn publish(&self, update: BadgeUpdate) -> anyhow::Result<()>;
}

impl<P: BadgePublisher + ?Sized> BadgePublisher for Rc<P> {
    fn publish(&self, update: BadgeUpdate) -> anyhow::Result<()> {
        (**self).publish(update)
    }
}

/// Publisher that keeps every update it receives
#[derive(Debug, Default)]
pub struct BadgeRecorder {
    updates: RefCell<Vec<BadgeUpdate>>,
}

impl BadgeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<BadgeUpdate> {
        self.updates.borrow().clone()
    }

    pub fn last(&self) -> Option<BadgeUpdate> {
        self.updates.borrow().last().copied()
    }
}

impl BadgePublisher for BadgeRecorder {
    fn publish(&self, update: BadgeUpdate) -> anyhow::Result<()> {
        self.updates.borrow_mut().push(update);
        Ok(())
    }
}

/// Result of [`NoteBoard::view_note`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    /// The anchor resolved and was scrolled into view
    Scrolled,
    /// The note exists but its anchor is gone
    Orphan,
    /// No note with that id on this page
    NotFound,
}

/// Notes that changed list during a [`NoteBoard::rescan`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RescanReport {
    pub reattached: usize,
    pub orphaned: usize,
}

type PlacementMap = Rc<RefCell<HashMap<NoteId, Placement>>>;

pub struct NoteBoard<D: Dom + 'static, S: NoteStore> {
    dom: Rc<D>,
    store: S,
    broadcaster: PositionBroadcaster,
    badge: Box<dyn BadgePublisher>,
    config: PlacementConfig,
    url: String,
    active: Vec<Note>,
    orphans: Vec<Note>,
    visible: bool,
    selection_mode: bool,
    editing: Option<NoteId>,
    subscriptions: HashMap<NoteId, Subscription>,
    placements: PlacementMap,
    highlighted: Vec<D::Element>,
}

impl<D: Dom + 'static, S: NoteStore> NoteBoard<D, S> {
    pub fn new(
        dom: Rc<D>,
        store: S,
        broadcaster: PositionBroadcaster,
        badge: impl BadgePublisher + 'static,
        url: impl Into<String>,
    ) -> Self {
        Self {
            dom,
            store,
            broadcaster,
            badge: Box::new(badge),
            config: PlacementConfig::default(),
            url: url.into(),
            active: Vec::new(),
            orphans: Vec::new(),
            visible: false,
            selection_mode: false,
            editing: None,
            subscriptions: HashMap::new(),
            placements: Rc::new(RefCell::new(HashMap::new())),
            highlighted: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: PlacementConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn broadcaster(&self) -> &PositionBroadcaster {
        &self.broadcaster
    }

    /// Notes whose anchor resolved, in storage order
    pub fn active_notes(&self) -> &[Note] {
        &self.active
    }

    /// Notes whose anchor did not resolve, in storage order
    pub fn orphan_notes(&self) -> &[Note] {
        &self.orphans
    }

    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.active.iter().chain(&self.orphans).find(|note| &note.id == id)
    }

    pub fn note_count(&self) -> usize {
        self.active.len() + self.orphans.len()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_selection_mode(&self) -> bool {
        self.selection_mode
    }

    /// Note currently open in the editor
    pub fn editing(&self) -> Option<&NoteId> {
        self.editing.as_ref()
    }

    /// Latest placement computed for an active, shown note
    pub fn placement(&self, id: &NoteId) -> Option<Placement> {
        self.placements.borrow().get(id).copied()
    }

    /// Anchors outlined while notes are shown
    pub fn highlighted_anchors(&self) -> &[D::Element] {
        &self.highlighted
    }

    /// Read the page's notes from storage and sort them by anchor state
    ///
    /// Notes always start hidden, so stored visibility is reset as well.
    pub fn load(&mut self) -> BoardResult<()> {
        self.store.set_visibility(false)?;
        self.set_visible(false);

        let notes = self.store.list_notes(&self.url)?;
        let (active, orphans): (Vec<Note>, Vec<Note>) =
            notes.into_iter().partition(|note| self.resolves(&note.selector));
        self.active = active;
        self.orphans = orphans;

        info!(
            url = %self.url,
            active = self.active.len(),
            orphans = self.orphans.len(),
            "loaded notes"
        );
        self.publish_badge();
        Ok(())
    }

    /// Show or hide notes without persisting the choice
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if visible {
            self.sync_subscriptions();
        } else {
            self.unsubscribe_all();
        }
    }

    /// Flip visibility and persist it. Returns the new visibility.
    pub fn toggle_visibility(&mut self) -> BoardResult<bool> {
        let visible = !self.visible;
        self.set_visible(visible);
        self.store.set_visibility(visible)?;
        Ok(visible)
    }

    pub fn start_selection(&mut self) {
        self.selection_mode = true;
    }

    pub fn stop_selection(&mut self) {
        self.selection_mode = false;
    }

    pub fn edit_note(&mut self, id: NoteId) {
        self.editing = Some(id);
    }

    /// Leave selection mode and close the editor
    pub fn cancel_interaction(&mut self) {
        self.selection_mode = false;
        self.editing = None;
    }

    /// Attach a new note to `element`
    pub fn create_note(&mut self, element: &D::Element, content: &str) -> BoardResult<Note> {
        if self.dom.body().as_ref() == Some(element)
            || self.dom.document_element().as_ref() == Some(element)
        {
            let tag = self.dom.tag_name(element).to_ascii_lowercase();
            return Err(BoardError::UnselectableElement(tag));
        }

        let locator = encode(&*self.dom, element);
        let placement = place_element(&*self.dom, element, &self.config);
        let note = Note::new(self.url.clone(), locator, content, placement.side);

        self.store.save_note(&note)?;
        debug!(note = %note.id, selector = %note.selector, side = %note.position, "created note");

        self.selection_mode = false;
        self.active.push(note.clone());
        if self.visible {
            self.sync_subscriptions();
        }
        self.broadcaster.force_update();
        self.publish_badge();
        Ok(note)
    }

    /// Persist new content and update the in-memory copy
    ///
    /// Returns whether the note is known to this board. Unknown ids are
    /// forwarded to storage, which ignores them.
    pub fn update_note_content(&mut self, id: &NoteId, content: &str) -> BoardResult<bool> {
        self.store.update_note_content(&self.url, id, content)?;

        let mut local = self.active.iter_mut().chain(self.orphans.iter_mut());
        let found = match local.find(|note| &note.id == id) {
            Some(note) => {
                note.set_content(content, now_millis());
                true
            }
            None => false,
        };

        if self.editing.as_ref() == Some(id) {
            self.editing = None;
        }
        Ok(found)
    }

    /// Delete a note from storage and from the board
    pub fn delete_note(&mut self, id: &NoteId) -> BoardResult<bool> {
        self.store.delete_note(&self.url, id)?;
        let removed = self.remove_local(id);
        self.publish_badge();
        Ok(removed)
    }

    /// Forget a note that was already deleted from storage elsewhere
    pub fn remove_local(&mut self, id: &NoteId) -> bool {
        let before = self.note_count();
        self.active.retain(|note| &note.id != id);
        self.orphans.retain(|note| &note.id != id);

        if let Some(subscription) = self.subscriptions.remove(id) {
            subscription.unsubscribe();
        }
        self.placements.borrow_mut().remove(id);
        if self.editing.as_ref() == Some(id) {
            self.editing = None;
        }
        if self.visible {
            self.refresh_highlights();
        }

        self.note_count() != before
    }

    /// Resolve every note again and move notes between the two lists
    pub fn rescan(&mut self) -> RescanReport {
        let mut report = RescanReport::default();
        let was_active: Vec<NoteId> = self.active.iter().map(|note| note.id.clone()).collect();

        let notes: Vec<Note> = self.active.drain(..).chain(self.orphans.drain(..)).collect();
        for note in notes {
            let resolved = self.resolves(&note.selector);
            let active_before = was_active.contains(&note.id);
            match (resolved, active_before) {
                (true, false) => report.reattached += 1,
                (false, true) => report.orphaned += 1,
                _ => {}
            }

            if resolved {
                self.active.push(note);
            } else {
                self.orphans.push(note);
            }
        }

        if self.visible {
            self.sync_subscriptions();
        }
        debug!(reattached = report.reattached, orphaned = report.orphaned, "rescanned anchors");
        report
    }

    /// Scroll to a note's anchor and show notes
    pub fn view_note(&mut self, id: &NoteId) -> BoardResult<ViewOutcome> {
        let Some(locator) = self.note(id).map(|note| note.selector.clone()) else {
            return Ok(ViewOutcome::NotFound);
        };

        let outcome = match resolve(&*self.dom, &locator) {
            AnchorResolution::Resolved(anchor) => {
                self.dom.scroll_into_view(&anchor);
                ViewOutcome::Scrolled
            }
            AnchorResolution::Unresolved => ViewOutcome::Orphan,
        };

        self.set_visible(true);
        self.store.set_visibility(true)?;
        Ok(outcome)
    }

    pub fn theme(&self) -> BoardResult<ThemeId> {
        Ok(self.store.theme()?)
    }

    pub fn set_theme(&self, theme: ThemeId) -> BoardResult<()> {
        Ok(self.store.set_theme(theme)?)
    }

    /// Apply a message from the popup or background worker
    ///
    /// Only [`HostMessage::GetState`] produces a reply.
    pub fn handle_message(&mut self, message: HostMessage) -> BoardResult<Option<StateReply>> {
        trace!(?message, "host message");
        match message {
            HostMessage::StartSelectionMode => self.start_selection(),
            HostMessage::StopSelectionMode => self.stop_selection(),
            HostMessage::GetState => {
                return Ok(Some(StateReply { is_selection_mode: self.selection_mode }));
            }
            HostMessage::SetVisibility { visible } => self.set_visible(visible),
            HostMessage::ToggleVisibility => {
                self.toggle_visibility()?;
            }
            HostMessage::ViewNote { note_id } => {
                self.view_note(&note_id)?;
            }
            HostMessage::EditNote { note_id } => self.edit_note(note_id),
            HostMessage::NoteDeleted { note_id } => {
                self.remove_local(&note_id);
            }
        }
        Ok(None)
    }

    fn resolves(&self, locator: &Locator) -> bool {
        resolve(&*self.dom, locator).is_resolved()
    }

    /// Subscribe every active note that has no subscription yet and drop
    /// subscriptions of notes that are no longer active
    fn sync_subscriptions(&mut self) {
        let active: Vec<&NoteId> = self.active.iter().map(|note| &note.id).collect();
        let stale: Vec<NoteId> = self
            .subscriptions
            .keys()
            .filter(|id| !active.contains(id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(subscription) = self.subscriptions.remove(&id) {
                subscription.unsubscribe();
            }
            self.placements.borrow_mut().remove(&id);
        }

        for note in &self.active {
            if self.subscriptions.contains_key(&note.id) {
                continue;
            }

            let tracker = AnchorTracker {
                dom: Rc::clone(&self.dom),
                locator: note.selector.clone(),
                id: note.id.clone(),
                placements: Rc::clone(&self.placements),
                config: self.config,
            };
            tracker.refresh();
            let subscription = self.broadcaster.subscribe(move || {
                tracker.refresh();
                Ok(())
            });
            self.subscriptions.insert(note.id.clone(), subscription);
        }
        self.refresh_highlights();
    }

    fn unsubscribe_all(&mut self) {
        for (_, subscription) in self.subscriptions.drain() {
            subscription.unsubscribe();
        }
        self.placements.borrow_mut().clear();
        self.refresh_highlights();
    }

    /// Outline the anchors of shown notes and clear every other outline
    fn refresh_highlights(&mut self) {
        for element in self.highlighted.drain(..) {
            self.dom.set_highlight(&element, false);
        }
        if !self.visible {
            return;
        }

        for note in &self.active {
            if let Some(element) = resolve(&*self.dom, &note.selector).into_element() {
                self.dom.set_highlight(&element, true);
                self.highlighted.push(element);
            }
        }
    }

    fn publish_badge(&self) {
        let update = BadgeUpdate::new(self.note_count());
        if let Err(error) = self.badge.publish(update) {
            warn!(count = update.count, error = %error, "failed to publish badge count");
        }
    }
}

impl<D: Dom + 'static, S: NoteStore> Drop for NoteBoard<D, S> {
    fn drop(&mut self) {
        self.visible = false;
        self.unsubscribe_all();
    }
}

impl<D: Dom + 'static, S: NoteStore> fmt::Debug for NoteBoard<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteBoard")
            .field("url", &self.url)
            .field("active", &self.active.len())
            .field("orphans", &self.orphans.len())
            .field("visible", &self.visible)
            .field("selection_mode", &self.selection_mode)
            .field("editing", &self.editing)
            .finish()
    }
}

/// Recomputes the placement of one note on every broadcaster pass
struct AnchorTracker<D> {
    dom: Rc<D>,
    locator: Locator,
    id: NoteId,
    placements: PlacementMap,
    config: PlacementConfig,
}

impl<D: Dom> AnchorTracker<D> {
    // An anchor that stops resolving keeps its last placement until the
    // next rescan moves the note to the orphan list.
    fn refresh(&self) {
        match resolve(&*self.dom, &self.locator) {
            AnchorResolution::Resolved(anchor) => {
                let placement = place_element(&*self.dom, &anchor, &self.config);
                self.placements.borrow_mut().insert(self.id.clone(), placement);
            }
            AnchorResolution::Unresolved => {
                trace!(note = %self.id, "anchor missing, keeping last placement");
            }
        }
    }
}
