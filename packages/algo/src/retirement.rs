//! Retirement and reinstatement
//!
//! Retiring is an explicit user action that pulls a word out of rotation for a
//! quarantine period and wipes its progress. Once the quarantine has elapsed
//! the word may be reinstated as new; nothing here does that automatically.

use chrono::{DateTime, Utc};

use crate::scheduler::Scheduler;
use crate::types::{add_days, ProgressRecord, DEFAULT_EASE_FACTOR};

impl Scheduler {
    pub fn retire(&self, record: &ProgressRecord, now: DateTime<Utc>) -> ProgressRecord {
        let mut next = record.clone();
        next.is_retired = true;
        next.is_mastered = false;
        next.review_count = 0;

        let mut until = add_days(now, self.config().retirement_quarantine_days);
        if let Some(last) = record.last_reviewed_at {
            until = until.max(last);
        }
        next.next_review_at = Some(until);
        next
    }

    /// Clear the retired flag and start the word over as new, due at `now`
    pub fn reinstate(&self, record: &ProgressRecord, now: DateTime<Utc>) -> ProgressRecord {
        ProgressRecord {
            word_id: record.word_id.clone(),
            review_count: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
            last_reviewed_at: None,
            next_review_at: Some(now),
            is_mastered: false,
            is_retired: false,
        }
    }
}

pub fn retire(record: &ProgressRecord, now: DateTime<Utc>) -> ProgressRecord {
    Scheduler::default().retire(record, now)
}

pub fn reinstate(record: &ProgressRecord, now: DateTime<Utc>) -> ProgressRecord {
    Scheduler::default().reinstate(record, now)
}

/// A retired record whose quarantine has run out
pub fn is_eligible_for_reinstatement(record: &ProgressRecord, now: DateTime<Utc>) -> bool {
    record.is_retired && record.next_review_at.map_or(true, |until| now >= until)
}
