//! In-memory progress store

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use wordwise_algo::ProgressRecord;

use super::{check_user_id, ProgressStore, StorageResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, BTreeMap<String, ProgressRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }
}

impl ProgressStore for MemoryStore {
    fn load(&self, user_id: &str, word_id: &str) -> StorageResult<Option<ProgressRecord>> {
        let users = self.users.read();
        Ok(users
            .get(user_id)
            .and_then(|words| words.get(word_id))
            .cloned())
    }

    fn save(&self, user_id: &str, record: &ProgressRecord) -> StorageResult<()> {
        check_user_id(user_id)?;
        record.validate()?;

        let mut users = self.users.write();
        users
            .entry(user_id.to_string())
            .or_default()
            .insert(record.word_id.clone(), record.clone());
        Ok(())
    }

    fn load_all(&self, user_id: &str) -> StorageResult<Vec<ProgressRecord>> {
        let users = self.users.read();
        Ok(users
            .get(user_id)
            .map(|words| words.values().cloned().collect())
            .unwrap_or_default())
    }

    fn save_all(&self, user_id: &str, records: &[ProgressRecord]) -> StorageResult<()> {
        check_user_id(user_id)?;
        for record in records {
            record.validate()?;
        }

        let mut users = self.users.write();
        let words = users.entry(user_id.to_string()).or_default();
        for record in records {
            words.insert(record.word_id.clone(), record.clone());
        }
        Ok(())
    }
}
