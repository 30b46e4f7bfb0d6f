//! Persistence for sticky notes and the per-profile note settings.
//!
//! Everything above this crate talks to storage through [`NoteStore`]. Two
//! implementations ship here: [`MemoryStore`] for tests and embedded hosts and
//! [`FileStore`], which keeps one JSON document per key under a data
//! directory.

mod config;
mod file;
mod memory;

pub use config::{ConfigError, StoreConfig};
pub use file::FileStore;
pub use memory::MemoryStore;

use note_model::{Note, NoteId, PageNotes, ThemeId};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("unsupported {key} schema version {found}")]
    UnsupportedVersion { key: &'static str, found: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Key-value contract the note board persists through.
///
/// Writes are fire-and-forget from the caller's point of view: failures are
/// reported once and never retried here.
pub trait NoteStore {
    fn all_notes(&self) -> Result<PageNotes, StorageError>;

    /// Notes stored for `url`, in insertion order.
    fn list_notes(&self, url: &str) -> Result<Vec<Note>, StorageError> {
        Ok(self.all_notes()?.notes_for(url).to_vec())
    }

    /// Inserts the note, or replaces the stored note with the same id.
    fn save_note(&self, note: &Note) -> Result<(), StorageError>;

    fn delete_note(&self, url: &str, id: &NoteId) -> Result<(), StorageError>;

    /// Replaces the content of a stored note and bumps its `updated_at`.
    /// Unknown ids are ignored.
    fn update_note_content(&self, url: &str, id: &NoteId, content: &str)
        -> Result<(), StorageError>;

    fn note_count(&self, url: &str) -> Result<usize, StorageError> {
        Ok(self.all_notes()?.count_for(url))
    }

    /// Whether notes are currently shown. Defaults to hidden.
    fn visibility(&self) -> Result<bool, StorageError>;

    fn set_visibility(&self, visible: bool) -> Result<(), StorageError>;

    fn theme(&self) -> Result<ThemeId, StorageError>;

    fn set_theme(&self, theme: ThemeId) -> Result<(), StorageError>;
}

impl<S: NoteStore + ?Sized> NoteStore for std::rc::Rc<S> {
    fn all_notes(&self) -> Result<PageNotes, StorageError> {
        (**self).all_notes()
    }

    fn list_notes(&self, url: &str) -> Result<Vec<Note>, StorageError> {
        (**self).list_notes(url)
    }

    fn save_note(&self, note: &Note) -> Result<(), StorageError> {
        (**self).save_note(note)
    }

    fn delete_note(&self, url: &str, id: &NoteId) -> Result<(), StorageError> {
        (**self).delete_note(url, id)
    }

    fn update_note_content(
        &self,
        url: &str,
        id: &NoteId,
        content: &str,
    ) -> Result<(), StorageError> {
        (**self).update_note_content(url, id, content)
    }

    fn note_count(&self, url: &str) -> Result<usize, StorageError> {
        (**self).note_count(url)
    }

    fn visibility(&self) -> Result<bool, StorageError> {
        (**self).visibility()
    }

    fn set_visibility(&self, visible: bool) -> Result<(), StorageError> {
        (**self).set_visibility(visible)
    }

    fn theme(&self) -> Result<ThemeId, StorageError> {
        (**self).theme()
    }

    fn set_theme(&self, theme: ThemeId) -> Result<(), StorageError> {
        (**self).set_theme(theme)
    }
}
