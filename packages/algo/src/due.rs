//! Due-word query
//!
//! A record is due when it is neither retired nor mastered and its next review
//! is at or before `now`. A missing next-review date counts as due.
//!
//! Results are ordered by next review (missing dates first), then word id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{add_days, ProgressRecord, WordStatus};

pub fn is_due(record: &ProgressRecord, now: DateTime<Utc>) -> bool {
    if record.is_retired || record.is_mastered {
        return false;
    }
    record.next_review_at.map_or(true, |at| at <= now)
}

/// Word ids of every due record
pub fn due_words<'a, I>(records: I, now: DateTime<Utc>) -> Vec<String>
where
    I: IntoIterator<Item = &'a ProgressRecord>,
{
    due_records(records, now)
        .into_iter()
        .map(|record| record.word_id.clone())
        .collect()
}

/// Like [`due_words`], truncated to the first `limit` entries
pub fn due_words_limited<'a, I>(records: I, now: DateTime<Utc>, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a ProgressRecord>,
{
    due_records(records, now)
        .into_iter()
        .take(limit)
        .map(|record| record.word_id.clone())
        .collect()
}

/// Due records in review order
pub fn due_records<'a, I>(records: I, now: DateTime<Utc>) -> Vec<&'a ProgressRecord>
where
    I: IntoIterator<Item = &'a ProgressRecord>,
{
    let mut due: Vec<&ProgressRecord> = records
        .into_iter()
        .filter(|record| is_due(record, now))
        .collect();
    // None sorts before Some, which puts undated records first
    due.sort_by(|a, b| {
        a.next_review_at
            .cmp(&b.next_review_at)
            .then_with(|| a.word_id.cmp(&b.word_id))
    });
    due
}

/// Push a record's next review `days` out from whichever is later: its current
/// date or `now`. Used to spill reviews past a daily cap into later days.
pub fn postpone(record: &ProgressRecord, days: u32, now: DateTime<Utc>) -> ProgressRecord {
    let base = record.next_review_at.map_or(now, |at| at.max(now));
    let mut next = record.clone();
    next.next_review_at = Some(add_days(base, days));
    next
}

/// Per-status record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub new: usize,
    pub active: usize,
    pub mastered: usize,
    pub retired: usize,
    pub due: usize,
}

pub fn status_counts<'a, I>(records: I, now: DateTime<Utc>) -> StatusCounts
where
    I: IntoIterator<Item = &'a ProgressRecord>,
{
    let mut counts = StatusCounts::default();
    for record in records {
        counts.total += 1;
        match record.status() {
            WordStatus::New => counts.new += 1,
            WordStatus::Active => counts.active += 1,
            WordStatus::Mastered => counts.mastered += 1,
            WordStatus::Retired => counts.retired += 1,
        }
        if is_due(record, now) {
            counts.due += 1;
        }
    }
    counts
}
