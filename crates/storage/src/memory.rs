use crate::{NoteStore, StorageError};
use note_model::{now_millis, Note, NoteId, PageNotes, ThemeId};
use std::cell::RefCell;

#[derive(Debug, Default)]
struct MemoryState {
    notes: PageNotes,
    visible: bool,
    theme: ThemeId,
}

/// In-process store. Nothing survives the value being dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `notes`.
    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.borrow_mut();
            for note in notes {
                state.notes.upsert(note);
            }
        }
        store
    }
}

impl NoteStore for MemoryStore {
    fn all_notes(&self) -> Result<PageNotes, StorageError> {
        Ok(self.state.borrow().notes.clone())
    }

    fn list_notes(&self, url: &str) -> Result<Vec<Note>, StorageError> {
        Ok(self.state.borrow().notes.notes_for(url).to_vec())
    }

    fn save_note(&self, note: &Note) -> Result<(), StorageError> {
        self.state.borrow_mut().notes.upsert(note.clone());
        Ok(())
    }

    fn delete_note(&self, url: &str, id: &NoteId) -> Result<(), StorageError> {
        self.state.borrow_mut().notes.remove(url, id);
        Ok(())
    }

    fn update_note_content(
        &self,
        url: &str,
        id: &NoteId,
        content: &str,
    ) -> Result<(), StorageError> {
        self.state.borrow_mut().notes.update_content(url, id, content, now_millis());
        Ok(())
    }

    fn visibility(&self) -> Result<bool, StorageError> {
        Ok(self.state.borrow().visible)
    }

    fn set_visibility(&self, visible: bool) -> Result<(), StorageError> {
        self.state.borrow_mut().visible = visible;
        Ok(())
    }

    fn theme(&self) -> Result<ThemeId, StorageError> {
        Ok(self.state.borrow().theme)
    }

    fn set_theme(&self, theme: ThemeId) -> Result<(), StorageError> {
        self.state.borrow_mut().theme = theme;
        Ok(())
    }
}
