use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Side of the anchor element a note is displayed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl NoteSide {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteSide::Left => "left",
            NoteSide::Right => "right",
            NoteSide::Top => "top",
            NoteSide::Bottom => "bottom",
        }
    }
}

impl fmt::Display for NoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selector string that re-finds the anchor element of a note.
///
/// The string is opaque to everything except the selector codec that produced
/// it. It is persisted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Locator {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Random v4 UUID identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeId {
    #[default]
    Yellow,
    Blue,
    Green,
    Pink,
    Purple,
    Orange,
}

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Timestamp)
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub url: String,
    pub selector: Locator,
    /// HTML produced by the editing surface.
    pub content: String,
    /// Side chosen when the note was created. Informational only; live
    /// placement is always recomputed.
    pub position: NoteSide,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Note {
    pub fn new(
        url: impl Into<String>,
        selector: Locator,
        content: impl Into<String>,
        position: NoteSide,
    ) -> Self {
        let now = now_millis();
        Self {
            id: NoteId::generate(),
            url: url.into(),
            selector,
            content: content.into(),
            position,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_content(&mut self, content: impl Into<String>, at: Timestamp) {
        self.content = content.into();
        self.updated_at = at;
    }
}

/// All stored notes, grouped by page URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageNotes(BTreeMap<String, Vec<Note>>);

impl PageNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes_for(&self, url: &str) -> &[Note] {
        self.0.get(url).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count_for(&self, url: &str) -> usize {
        self.notes_for(url).len()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replaces the note with the same id on the same page, or appends it.
    pub fn upsert(&mut self, note: Note) {
        let page = self.0.entry(note.url.clone()).or_default();
        match page.iter_mut().find(|existing| existing.id == note.id) {
            Some(existing) => *existing = note,
            None => page.push(note),
        }
    }

    /// Removes a note. Pages left without notes are dropped entirely.
    pub fn remove(&mut self, url: &str, id: &NoteId) -> bool {
        let Some(page) = self.0.get_mut(url) else {
            return false;
        };

        let before = page.len();
        page.retain(|note| &note.id != id);
        let removed = page.len() != before;

        if page.is_empty() {
            self.0.remove(url);
        }

        removed
    }

    pub fn update_content(&mut self, url: &str, id: &NoteId, content: &str, at: Timestamp) -> bool {
        let Some(note) = self
            .0
            .get_mut(url)
            .and_then(|page| page.iter_mut().find(|note| &note.id == id))
        else {
            return false;
        };

        note.set_content(content, at);
        true
    }
}
