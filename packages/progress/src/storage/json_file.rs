//! JSON file progress store
//!
//! One `<user_id>.json` document per user under the data directory, holding a
//! word-keyed object of records. Writes go to a temp file and are renamed over
//! the original so a crash never leaves a half-written document.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use wordwise_algo::ProgressRecord;

use super::{check_user_id, ProgressStore, StorageError, StorageResult};

type UserDocument = BTreeMap<String, ProgressRecord>;

pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn new<P: AsRef<Path>>(dir: P) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn user_file(&self, user_id: &str) -> StorageResult<PathBuf> {
        check_file_safe(user_id)?;
        Ok(self.dir.join(format!("{user_id}.json")))
    }

    fn read_document(&self, user_id: &str) -> StorageResult<UserDocument> {
        let path = self.user_file(user_id)?;
        if !path.exists() {
            return Ok(UserDocument::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(UserDocument::new());
        }
        let mut document: UserDocument = serde_json::from_str(&content)?;
        // The map key is authoritative for hand-edited or legacy files
        for (word_id, record) in document.iter_mut() {
            if record.word_id.is_empty() {
                record.word_id = word_id.clone();
            }
        }
        Ok(document)
    }

    fn write_document(&self, user_id: &str, document: &UserDocument) -> StorageResult<()> {
        let path = self.user_file(user_id)?;
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(document)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl ProgressStore for JsonFileStore {
    fn load(&self, user_id: &str, word_id: &str) -> StorageResult<Option<ProgressRecord>> {
        Ok(self.read_document(user_id)?.remove(word_id))
    }

    fn save(&self, user_id: &str, record: &ProgressRecord) -> StorageResult<()> {
        self.save_all(user_id, std::slice::from_ref(record))
    }

    fn load_all(&self, user_id: &str) -> StorageResult<Vec<ProgressRecord>> {
        Ok(self.read_document(user_id)?.into_values().collect())
    }

    fn save_all(&self, user_id: &str, records: &[ProgressRecord]) -> StorageResult<()> {
        check_file_safe(user_id)?;
        for record in records {
            record.validate()?;
        }

        let _guard = self.write_lock.lock();
        let mut document = self.read_document(user_id)?;
        for record in records {
            document.insert(record.word_id.clone(), record.clone());
        }
        self.write_document(user_id, &document)?;

        tracing::debug!(user_id, count = records.len(), "progress document written");
        Ok(())
    }
}

/// User ids become file names; keep them to a conservative alphabet
fn check_file_safe(user_id: &str) -> StorageResult<()> {
    check_user_id(user_id)?;
    let allowed = user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if !allowed || user_id.starts_with('.') || user_id.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "user id {user_id:?} is not usable as a file name"
        )));
    }
    Ok(())
}
