//! Review orchestration
//!
//! `ProgressService` is the collaborator the scheduling core expects: it loads
//! a record, runs the pure transition, and saves the result. Operations on the
//! same (user, word) key are serialized so two concurrent reviews can never
//! both start from the same stored state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use wordwise_algo::{
    due_words, due_words_limited, is_eligible_for_reinstatement, status_counts, ProgressRecord,
    ReviewOutcome, Scheduler, SchedulerConfig, StatusCounts, ValidationError, WordStatus,
};

use crate::config::Config;
use crate::legacy;
use crate::storage::{open_store, ProgressStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid stored record: {0}")]
    Validation(#[from] ValidationError),
    #[error("word {word_id} is retired until {until}")]
    Retired {
        word_id: String,
        until: DateTime<Utc>,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Outcome of [`ProgressService::record_review`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    pub record: ProgressRecord,
    pub newly_mastered: bool,
    pub status: WordStatus,
}

type LockKey = (String, String);

/// Lock table keyed by (user, word); entries are dropped once unused
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    fn with_lock<T>(&self, user_id: &str, word_id: &str, f: impl FnOnce() -> T) -> T {
        self.with_locks(user_id, &[word_id], f)
    }

    /// Hold every listed key at once. Keys are taken in sorted order; callers
    /// holding a single key never wait on another.
    fn with_locks<T>(&self, user_id: &str, word_ids: &[&str], f: impl FnOnce() -> T) -> T {
        let mut keys: Vec<LockKey> = word_ids
            .iter()
            .map(|word_id| (user_id.to_string(), word_id.to_string()))
            .collect();
        keys.sort_unstable();
        keys.dedup();

        let held: Vec<Arc<Mutex<()>>> = {
            let mut locks = self.locks.lock();
            keys.iter()
                .map(|key| Arc::clone(locks.entry(key.clone()).or_default()))
                .collect()
        };

        let result = {
            let _guards: Vec<_> = held.iter().map(|lock| lock.lock()).collect();
            f()
        };

        let mut locks = self.locks.lock();
        for (key, lock) in keys.iter().zip(&held) {
            // Only the table and this caller still hold it
            if Arc::strong_count(lock) == 2 {
                locks.remove(key);
            }
        }
        result
    }

    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

pub struct ProgressService<S> {
    store: S,
    scheduler: Scheduler,
    daily_limit: Option<usize>,
    locks: KeyLocks,
}

impl ProgressService<Box<dyn ProgressStore>> {
    /// Open the configured store and build a service around it
    pub fn from_config(config: &Config) -> ServiceResult<Self> {
        let store = open_store(&config.storage)?;
        Ok(ProgressService::new(store, config.scheduler.clone())
            .with_daily_limit(config.daily_review_limit))
    }
}

impl<S: ProgressStore> ProgressService<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        Self {
            store,
            scheduler: Scheduler::new(config),
            daily_limit: None,
            locks: KeyLocks::default(),
        }
    }

    /// Cap the number of words [`Self::due_words`] hands out
    pub fn with_daily_limit(mut self, limit: Option<usize>) -> Self {
        self.daily_limit = limit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Stored record for a word, or a fresh one that is not saved yet
    pub fn progress(
        &self,
        user_id: &str,
        word_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<ProgressRecord> {
        self.load_or_new(user_id, word_id, now)
    }

    /// Apply one review and persist the result.
    ///
    /// A retired word whose quarantine has run out is reinstated before the
    /// review is applied; one still in quarantine is refused.
    pub fn record_review(
        &self,
        user_id: &str,
        word_id: &str,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> ServiceResult<ReviewReport> {
        self.locks.with_lock(user_id, word_id, || {
            let mut current = self.load_or_new(user_id, word_id, now)?;

            if current.is_retired {
                if !is_eligible_for_reinstatement(&current, now) {
                    return Err(ServiceError::Retired {
                        word_id: word_id.to_string(),
                        until: current.next_review_at.unwrap_or(now),
                    });
                }
                current = self.scheduler.reinstate(&current, now);
                tracing::info!(user_id, word_id, "word reinstated before review");
            }

            let next = self.scheduler.compute_next_review(&current, outcome, now);
            self.store.save(user_id, &next)?;

            let newly_mastered = next.is_mastered && !current.is_mastered;
            if newly_mastered {
                tracing::info!(user_id, word_id, reviews = next.review_count, "word mastered");
            }
            tracing::debug!(
                user_id,
                word_id,
                correct = outcome.is_correct,
                review_count = next.review_count,
                interval_days = next.interval_days,
                ease_factor = next.ease_factor,
                "review recorded"
            );

            Ok(ReviewReport {
                status: next.status(),
                record: next,
                newly_mastered,
            })
        })
    }

    /// Pull a word out of rotation for the quarantine period
    pub fn retire_word(
        &self,
        user_id: &str,
        word_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<ProgressRecord> {
        self.locks.with_lock(user_id, word_id, || {
            let current = self.load_or_new(user_id, word_id, now)?;
            let retired = self.scheduler.retire(&current, now);
            self.store.save(user_id, &retired)?;

            tracing::info!(
                user_id,
                word_id,
                until = ?retired.next_review_at,
                "word retired"
            );
            Ok(retired)
        })
    }

    /// Reinstate every retired word whose quarantine has elapsed; returns their ids
    pub fn reinstate_eligible(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<String>> {
        let candidates: Vec<String> = self
            .store
            .load_all(user_id)?
            .into_iter()
            .filter(|record| is_eligible_for_reinstatement(record, now))
            .map(|record| record.word_id)
            .collect();

        let mut reinstated = Vec::with_capacity(candidates.len());
        for word_id in candidates {
            let done = self.locks.with_lock(user_id, &word_id, || -> ServiceResult<bool> {
                // Re-check under the lock; a concurrent call may have got here first
                let Some(current) = self.store.load(user_id, &word_id)? else {
                    return Ok(false);
                };
                if !is_eligible_for_reinstatement(&current, now) {
                    return Ok(false);
                }
                self.store.save(user_id, &self.scheduler.reinstate(&current, now))?;
                Ok(true)
            })?;

            if done {
                tracing::info!(user_id, word_id = %word_id, "word reinstated");
                reinstated.push(word_id);
            }
        }
        Ok(reinstated)
    }

    /// Words due for review, capped at the daily limit when one is set
    pub fn due_words(&self, user_id: &str, now: DateTime<Utc>) -> ServiceResult<Vec<String>> {
        let records = self.store.load_all(user_id)?;
        let due = match self.daily_limit {
            Some(limit) => due_words_limited(&records, now, limit),
            None => due_words(&records, now),
        };
        tracing::debug!(user_id, total = records.len(), due = due.len(), "due words");
        Ok(due)
    }

    pub fn summary(&self, user_id: &str, now: DateTime<Utc>) -> ServiceResult<StatusCounts> {
        let records = self.store.load_all(user_id)?;
        Ok(status_counts(&records, now))
    }

    /// Import legacy progress for a user, overwriting matching words.
    ///
    /// The imported words stay locked until the whole batch is saved.
    pub fn import_legacy(
        &self,
        user_id: &str,
        json: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<usize> {
        let records = legacy::import_learning_progress_with(json, now, self.scheduler.config())?;
        let word_ids: Vec<&str> = records.iter().map(|r| r.word_id.as_str()).collect();
        self.locks
            .with_locks(user_id, &word_ids, || self.store.save_all(user_id, &records))?;
        tracing::info!(user_id, count = records.len(), "legacy progress saved");
        Ok(records.len())
    }

    fn load_or_new(
        &self,
        user_id: &str,
        word_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<ProgressRecord> {
        match self.store.load(user_id, word_id)? {
            Some(record) => {
                if let Err(e) = record.validate() {
                    tracing::warn!(user_id, word_id, error = %e, "rejecting invalid stored record");
                    return Err(e.into());
                }
                Ok(record)
            }
            None => Ok(ProgressRecord::new(word_id, now)),
        }
    }
}
