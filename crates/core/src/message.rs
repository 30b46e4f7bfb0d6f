//! Messages exchanged with the extension popup and background worker
//!
//! All messages are JSON objects tagged by a `type` field, e.g.
//! `{"type":"VIEW_NOTE","noteId":"..."}`.

use note_model::NoteId;
use serde::{Deserialize, Serialize};

/// Requests delivered to the note board of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    StartSelectionMode,
    StopSelectionMode,
    /// Answered with a [`StateReply`]
    GetState,
    SetVisibility {
        visible: bool,
    },
    ToggleVisibility,
    #[serde(rename_all = "camelCase")]
    ViewNote {
        note_id: NoteId,
    },
    #[serde(rename_all = "camelCase")]
    EditNote {
        note_id: NoteId,
    },
    /// The note was already removed from storage elsewhere
    #[serde(rename_all = "camelCase")]
    NoteDeleted {
        note_id: NoteId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReply {
    pub is_selection_mode: bool,
}

/// Badge counter update, sent as `{"type":"UPDATE_BADGE","count":n}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "UPDATE_BADGE", rename_all = "camelCase")]
pub struct BadgeUpdate {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<u32>,
}

impl BadgeUpdate {
    pub fn new(count: usize) -> Self {
        Self { count, tab_id: None }
    }

    pub fn for_tab(mut self, tab_id: u32) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    /// Text shown on the toolbar badge; empty hides the badge
    pub fn text(&self) -> String {
        if self.count > 0 {
            self.count.to_string()
        } else {
            String::new()
        }
    }
}
