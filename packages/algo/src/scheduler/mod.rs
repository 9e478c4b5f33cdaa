//! Spaced-Repetition Scheduler
//!
//! Pure review transition: `(record, outcome, now) -> record'`.
//!
//! - Incorrect answers reset the review count, drop the interval to one day
//!   and take 0.2 off the ease factor.
//! - Correct answers bump the review count, pick an interval through the
//!   configured [`IntervalPolicy`] and nudge ease by confidence.
//! - Crossing the mastery threshold promotes the word once and pins its next
//!   review to the mastery interval.
//!
//! The ease factor never drops below [`MIN_EASE_FACTOR`].

use chrono::{DateTime, Utc};

use crate::types::{
    add_days, clamp_ease, IntervalPolicy, ProgressRecord, ReviewOutcome, SchedulerConfig,
    LAPSE_EASE_PENALTY, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR, REVIEW_INTERVALS,
};

/// Scheduler bound to a configuration
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn policy(&self) -> IntervalPolicy {
        self.config.policy
    }

    /// Apply one review outcome to a record.
    ///
    /// Retired records are out of rotation and come back unchanged; the caller
    /// reinstates them first.
    pub fn compute_next_review(
        &self,
        record: &ProgressRecord,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> ProgressRecord {
        let mut next = record.clone();
        if record.is_retired {
            return next;
        }

        let ease = clamp_ease(record.ease_factor);

        if outcome.is_correct {
            next.review_count = record.review_count.saturating_add(1);
            next.interval_days =
                self.correct_interval(next.review_count, record.interval_days, ease);
            next.ease_factor = (ease + outcome.effective_confidence().ease_delta())
                .max(MIN_EASE_FACTOR);
        } else {
            next.review_count = 0;
            next.interval_days = 1;
            next.ease_factor = (ease - LAPSE_EASE_PENALTY).max(MIN_EASE_FACTOR);
        }
        next.next_review_at = Some(add_days(now, next.interval_days));

        if next.review_count >= self.mastery_threshold() && !record.is_mastered {
            next.is_mastered = true;
            next.interval_days = self.config.mastery_interval_days.clamp(1, MAX_INTERVAL_DAYS);
            next.next_review_at = Some(add_days(now, next.interval_days));
        }

        next.last_reviewed_at = Some(now);
        next
    }

    /// Interval in days for a correct review that brings the count to `review_count`
    pub fn correct_interval(&self, review_count: u32, previous_interval: u32, ease: f64) -> u32 {
        match self.config.policy {
            IntervalPolicy::FixedTable => {
                fixed_table_interval(review_count, self.config.mastery_interval_days)
            }
            IntervalPolicy::Multiplicative => {
                multiplicative_interval(review_count, previous_interval, ease)
            }
        }
    }

    fn mastery_threshold(&self) -> u32 {
        self.config.mastery_threshold.max(1)
    }
}

/// Fixed-table interval: review `n` (1-based) maps to `REVIEW_INTERVALS[n - 1]`,
/// anything past the table gets the mastery interval.
pub fn fixed_table_interval(review_count: u32, mastery_interval_days: u32) -> u32 {
    let index = review_count.saturating_sub(1) as usize;
    match REVIEW_INTERVALS.get(index) {
        Some(&days) => days,
        None => mastery_interval_days.clamp(1, MAX_INTERVAL_DAYS),
    }
}

/// SM-2 style interval: 1, 6, then the previous interval scaled by ease
pub fn multiplicative_interval(review_count: u32, previous_interval: u32, ease: f64) -> u32 {
    match review_count {
        0 | 1 => 1,
        2 => 6,
        _ => {
            let scaled = (f64::from(previous_interval.max(1)) * clamp_ease(ease)).round();
            if scaled.is_finite() {
                scaled.clamp(1.0, f64::from(MAX_INTERVAL_DAYS)) as u32
            } else {
                MAX_INTERVAL_DAYS
            }
        }
    }
}

/// Review transition under the default configuration
pub fn compute_next_review(
    record: &ProgressRecord,
    outcome: ReviewOutcome,
    now: DateTime<Utc>,
) -> ProgressRecord {
    Scheduler::default().compute_next_review(record, outcome, now)
}
