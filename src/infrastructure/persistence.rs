use crate::domain::{ApplicationId, Draft, DraftKey, DraftStoreError};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Durable key-value storage of wizard drafts.
///
/// `save` unconditionally overwrites. Implementations also keep a pointer to
/// the last active key so the wizard can resume without an explicit id.
pub trait DraftRepository {
    fn save(&self, key: &DraftKey, draft: &Draft) -> Result<(), DraftStoreError>;

    fn load(&self, key: &DraftKey) -> Result<Option<Draft>, DraftStoreError>;

    fn delete(&self, key: &DraftKey) -> Result<(), DraftStoreError>;

    fn last_active(&self) -> Result<Option<DraftKey>, DraftStoreError>;

    fn set_last_active(&self, key: &DraftKey) -> Result<(), DraftStoreError>;

    fn clear_last_active(&self) -> Result<(), DraftStoreError>;

    /// Moves the anonymous draft under the newly minted application id.
    ///
    /// Copies first and clears second, so a failure part way leaves the
    /// entered data in at least one place.
    fn migrate_new(&self, id: &ApplicationId) -> Result<Option<Draft>, DraftStoreError> {
        let Some(mut draft) = self.load(&DraftKey::New)? else {
            return Ok(None);
        };
        let target = DraftKey::Existing(id.clone());
        draft.application_id = Some(id.clone());
        self.save(&target, &draft)?;
        self.delete(&DraftKey::New)?;
        if self.last_active()? == Some(DraftKey::New) {
            self.set_last_active(&target)?;
        }
        tracing::info!(application_id = %id, "migrated anonymous draft");
        Ok(Some(draft))
    }
}

const LAST_ACTIVE_FILE: &str = "last-active.json";

/// Stores one pretty-printed JSON document per draft in a directory.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DraftStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &DraftKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.storage_name()))
    }

    fn write_atomically(&self, path: &Path, contents: &str) -> Result<(), DraftStoreError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_optional(path: &Path) -> Result<Option<String>, DraftStoreError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_optional(path: &Path) -> Result<(), DraftStoreError> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl DraftRepository for FileDraftStore {
    fn save(&self, key: &DraftKey, draft: &Draft) -> Result<(), DraftStoreError> {
        let json = serde_json::to_string_pretty(draft)?;
        self.write_atomically(&self.path_for(key), &json)
    }

    fn load(&self, key: &DraftKey) -> Result<Option<Draft>, DraftStoreError> {
        match Self::read_optional(&self.path_for(key))? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &DraftKey) -> Result<(), DraftStoreError> {
        Self::remove_optional(&self.path_for(key))
    }

    fn last_active(&self) -> Result<Option<DraftKey>, DraftStoreError> {
        match Self::read_optional(&self.dir.join(LAST_ACTIVE_FILE))? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    fn set_last_active(&self, key: &DraftKey) -> Result<(), DraftStoreError> {
        let json = serde_json::to_string(key)?;
        self.write_atomically(&self.dir.join(LAST_ACTIVE_FILE), &json)
    }

    fn clear_last_active(&self) -> Result<(), DraftStoreError> {
        Self::remove_optional(&self.dir.join(LAST_ACTIVE_FILE))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    drafts: HashMap<DraftKey, String>,
    last_active: Option<DraftKey>,
}

/// Shared in-memory store. Clones see the same drafts.
///
/// Drafts are held in their serialized form so a round trip behaves exactly
/// like the file store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDraftStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn keys(&self) -> Vec<DraftKey> {
        let mut keys: Vec<DraftKey> = self.with_state(|s| s.drafts.keys().cloned().collect());
        keys.sort_by_key(DraftKey::storage_name);
        keys
    }

    pub fn len(&self) -> usize {
        self.with_state(|s| s.drafts.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DraftRepository for InMemoryDraftStore {
    fn save(&self, key: &DraftKey, draft: &Draft) -> Result<(), DraftStoreError> {
        let json = serde_json::to_string(draft)?;
        self.with_state(|s| s.drafts.insert(key.clone(), json));
        Ok(())
    }

    fn load(&self, key: &DraftKey) -> Result<Option<Draft>, DraftStoreError> {
        match self.with_state(|s| s.drafts.get(key).cloned()) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &DraftKey) -> Result<(), DraftStoreError> {
        self.with_state(|s| s.drafts.remove(key));
        Ok(())
    }

    fn last_active(&self) -> Result<Option<DraftKey>, DraftStoreError> {
        Ok(self.with_state(|s| s.last_active.clone()))
    }

    fn set_last_active(&self, key: &DraftKey) -> Result<(), DraftStoreError> {
        self.with_state(|s| s.last_active = Some(key.clone()));
        Ok(())
    }

    fn clear_last_active(&self) -> Result<(), DraftStoreError> {
        self.with_state(|s| s.last_active = None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attachment, FileHandle, Stage, StagePayloads};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_draft() -> Draft {
        let mut payloads = StagePayloads::default();
        payloads.personal.surname = "Doe".to_string();
        payloads.personal.photo = Some(Attachment::pending(
            FileHandle::new("/home/jane/photo.png", "image/png", 2048),
            None,
        ));
        payloads.add_row(Stage::Qualifications);
        payloads.qualifications[1].institution = "UNILAG".to_string();
        payloads.qualifications[1].certificate = Some(Attachment::committed("https://portal.example/media/c.pdf"));
        payloads.exam_results[0].subjects = "Maths, English".to_string();
        Draft::new(Stage::ExamResults, None, 2, payloads)
    }

    fn without_live_handles(mut draft: Draft) -> Draft {
        if let Some(photo) = draft.payloads.personal.photo.take() {
            draft.payloads.personal.photo = Some(Attachment::Detached {
                display_name: photo.display_name().to_string(),
            });
        }
        draft
    }

    fn assert_round_trip(store: &dyn DraftRepository) {
        let draft = sample_draft();
        store.save(&DraftKey::New, &draft).unwrap();
        let loaded = store.load(&DraftKey::New).unwrap().unwrap();
        assert_eq!(loaded, without_live_handles(draft));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileDraftStore::new(dir.path()).unwrap();
        assert_round_trip(&store);
        assert!(dir.path().join("new.json").exists());
        assert!(!dir.path().join("new.json.tmp").exists());
    }

    #[test]
    fn test_memory_store_round_trip() {
        assert_round_trip(&InMemoryDraftStore::new());
    }

    #[test]
    fn test_load_missing_key_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileDraftStore::new(dir.path().join("nested")).unwrap();
        assert!(store.load(&DraftKey::Existing(ApplicationId::new("nope"))).unwrap().is_none());
        assert!(store.last_active().unwrap().is_none());
        store.delete(&DraftKey::New).unwrap();
        store.clear_last_active().unwrap();
    }

    #[test]
    fn test_save_overwrites() {
        let store = InMemoryDraftStore::new();
        let mut draft = sample_draft();
        store.save(&DraftKey::New, &draft).unwrap();
        draft.payloads.personal.surname = "Smith".to_string();
        store.save(&DraftKey::New, &draft).unwrap();

        assert_eq!(store.len(), 1);
        let loaded = store.load(&DraftKey::New).unwrap().unwrap();
        assert_eq!(loaded.payloads.personal.surname, "Smith");
    }

    #[test]
    fn test_last_active_pointer() {
        let dir = TempDir::new().unwrap();
        let store = FileDraftStore::new(dir.path()).unwrap();
        let key = DraftKey::Existing(ApplicationId::new("A1"));
        store.set_last_active(&key).unwrap();
        assert_eq!(store.last_active().unwrap(), Some(key));
        store.clear_last_active().unwrap();
        assert_eq!(store.last_active().unwrap(), None);
    }

    #[test]
    fn test_migrate_new_copies_then_clears() {
        let dir = TempDir::new().unwrap();
        let store = FileDraftStore::new(dir.path()).unwrap();
        let draft = sample_draft();
        store.save(&DraftKey::New, &draft).unwrap();
        store.set_last_active(&DraftKey::New).unwrap();

        let id = ApplicationId::new("A1");
        let migrated = store.migrate_new(&id).unwrap().unwrap();

        let target = DraftKey::Existing(id.clone());
        assert_eq!(migrated.application_id, Some(id));
        assert!(store.load(&DraftKey::New).unwrap().is_none());
        let loaded = store.load(&target).unwrap().unwrap();
        assert_eq!(loaded.payloads, without_live_handles(draft).payloads);
        assert_eq!(store.last_active().unwrap(), Some(target));
    }

    #[test]
    fn test_migrate_without_new_draft_is_noop() {
        let store = InMemoryDraftStore::new();
        assert!(store.migrate_new(&ApplicationId::new("A1")).unwrap().is_none());
        assert!(store.is_empty());
    }
}
