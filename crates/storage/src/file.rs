use crate::{NoteStore, StorageError, StoreConfig};
use note_model::{now_millis, Note, NoteId, PageNotes, ThemeId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const NOTES_SCHEMA_VERSION: u32 = 1;
const SETTINGS_SCHEMA_VERSION: u32 = 1;

const NOTES_FILE: &str = "notes.json";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NotesEnvelope {
    version: u32,
    notes: PageNotes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    theme: ThemeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: Settings,
}

/// JSON-file backed store. Every call reads or rewrites the file it needs, so
/// several stores pointed at the same directory stay consistent with each
/// other as long as calls do not interleave.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    pretty: bool,
}

impl FileStore {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = directories::ProjectDirs::from("dev", "Sticker", "Sticker")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self::with_root(dirs.data_local_dir()))
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self { root: config.data_dir.clone(), pretty: config.pretty }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), pretty: true }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn notes_path(&self) -> PathBuf {
        self.root.join(NOTES_FILE)
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    fn load_notes(&self) -> Result<PageNotes, StorageError> {
        let Some(envelope) = read_json::<NotesEnvelope>(&self.notes_path())? else {
            return Ok(PageNotes::default());
        };
        if envelope.version > NOTES_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion { key: "notes", found: envelope.version });
        }
        Ok(envelope.notes)
    }

    fn store_notes(&self, notes: PageNotes) -> Result<(), StorageError> {
        let envelope = NotesEnvelope { version: NOTES_SCHEMA_VERSION, notes };
        self.write_json(&self.notes_path(), &envelope)
    }

    fn modify_notes(&self, apply: impl FnOnce(&mut PageNotes)) -> Result<(), StorageError> {
        let mut notes = self.load_notes()?;
        apply(&mut notes);
        self.store_notes(notes)
    }

    fn load_settings(&self) -> Result<Settings, StorageError> {
        let Some(envelope) = read_json::<SettingsEnvelope>(&self.settings_path())? else {
            return Ok(Settings::default());
        };
        if envelope.version > SETTINGS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                key: "settings",
                found: envelope.version,
            });
        }
        Ok(envelope.settings)
    }

    fn modify_settings(&self, apply: impl FnOnce(&mut Settings)) -> Result<(), StorageError> {
        let mut settings = self.load_settings()?;
        apply(&mut settings);
        let envelope = SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings };
        self.write_json(&self.settings_path(), &envelope)
    }

    /// Writes through a sibling temp file that is then renamed into place.
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let bytes =
            if self.pretty { serde_json::to_vec_pretty(value)? } else { serde_json::to_vec(value)? };

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;

        tracing::trace!(path = %path.display(), "wrote store document");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

impl NoteStore for FileStore {
    fn all_notes(&self) -> Result<PageNotes, StorageError> {
        self.load_notes()
    }

    fn save_note(&self, note: &Note) -> Result<(), StorageError> {
        self.modify_notes(|notes| notes.upsert(note.clone()))
    }

    fn delete_note(&self, url: &str, id: &NoteId) -> Result<(), StorageError> {
        self.modify_notes(|notes| {
            notes.remove(url, id);
        })
    }

    fn update_note_content(
        &self,
        url: &str,
        id: &NoteId,
        content: &str,
    ) -> Result<(), StorageError> {
        let mut notes = self.load_notes()?;
        if notes.update_content(url, id, content, now_millis()) {
            self.store_notes(notes)?;
        }
        Ok(())
    }

    fn visibility(&self) -> Result<bool, StorageError> {
        Ok(self.load_settings()?.visible)
    }

    fn set_visibility(&self, visible: bool) -> Result<(), StorageError> {
        self.modify_settings(|settings| settings.visible = visible)
    }

    fn theme(&self) -> Result<ThemeId, StorageError> {
        Ok(self.load_settings()?.theme)
    }

    fn set_theme(&self, theme: ThemeId) -> Result<(), StorageError> {
        self.modify_settings(|settings| settings.theme = theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use note_model::{Locator, NoteSide};

    fn sample(url: &str) -> Note {
        Note::new(url, Locator::from("body > main > p:nth-of-type(2)"), "<b>hi</b>", NoteSide::Right)
    }

    #[test]
    fn notes_round_trip_across_store_instances() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let note = sample("https://example.test/a");

        FileStore::with_root(temp.path()).save_note(&note).expect("save should succeed");
        let loaded = FileStore::with_root(temp.path())
            .list_notes("https://example.test/a")
            .expect("list should succeed");

        assert_eq!(loaded, vec![note]);
    }

    #[test]
    fn empty_directory_yields_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path().join("missing"));

        assert!(store.list_notes("https://example.test/").expect("list").is_empty());
        assert!(!store.visibility().expect("visibility"));
        assert_eq!(store.theme().expect("theme"), ThemeId::Yellow);
    }

    #[test]
    fn delete_of_last_note_removes_page() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());
        let note = sample("https://example.test/a");

        store.save_note(&note).expect("save");
        store.delete_note(&note.url, &note.id).expect("delete");

        assert!(store.all_notes().expect("all notes").is_empty());
    }

    #[test]
    fn update_content_bumps_updated_at() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::with_root(temp.path());
        let mut note = sample("https://example.test/a");
        note.updated_at = 0;
        store.save_note(&note).expect("save");

        store.update_note_content(&note.url, &note.id, "edited").expect("update");

        let stored = &store.list_notes(&note.url).expect("list")[0];
        assert_eq!(stored.content, "edited");
        assert!(stored.updated_at > 0);
    }

    #[test]
    fn settings_persist_independently_of_notes() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = FileStore::from_config(&StoreConfig::new(temp.path()).with_pretty(false));

        store.set_visibility(true).expect("set visibility");
        store.set_theme(ThemeId::Blue).expect("set theme");
        store.save_note(&sample("https://example.test/")).expect("save");

        let reopened = FileStore::with_root(temp.path());
        assert!(reopened.visibility().expect("visibility"));
        assert_eq!(reopened.theme().expect("theme"), ThemeId::Blue);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(temp.path().join(NOTES_FILE), r#"{ "version": 99, "notes": {} }"#)
            .expect("write notes");

        let err = FileStore::with_root(temp.path()).all_notes().expect_err("should reject");
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 99, .. }));
    }
}
