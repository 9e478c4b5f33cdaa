//! Record Sanitization
//!
//! Boundary checks for progress records.
//!
//! Functions:
//! - `validate_record` rejects records a caller should never construct
//! - `sanitize_record` clamps the fields that have a safe clamp

use thiserror::Error;

use crate::types::{clamp_ease, ProgressRecord, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("word id must not be empty")]
    EmptyWordId,
    #[error("ease factor must be finite, got {0}")]
    NonFiniteEase(f64),
    #[error("ease factor {0} is below the floor of 1.3")]
    EaseBelowFloor(f64),
    #[error("interval must be at least one day")]
    ZeroInterval,
    #[error("retired word {word_id} still has review count {review_count}")]
    RetiredWithReviews { word_id: String, review_count: u32 },
    #[error("word {word_id} is scheduled before its last review")]
    ScheduledBeforeLastReview { word_id: String },
}

/// Check every record invariant, returning the first violation
pub fn validate_record(record: &ProgressRecord) -> Result<(), ValidationError> {
    if record.word_id.trim().is_empty() {
        return Err(ValidationError::EmptyWordId);
    }
    if !record.ease_factor.is_finite() {
        return Err(ValidationError::NonFiniteEase(record.ease_factor));
    }
    if record.ease_factor < MIN_EASE_FACTOR {
        return Err(ValidationError::EaseBelowFloor(record.ease_factor));
    }
    if record.interval_days == 0 {
        return Err(ValidationError::ZeroInterval);
    }
    if record.is_retired && record.review_count != 0 {
        return Err(ValidationError::RetiredWithReviews {
            word_id: record.word_id.clone(),
            review_count: record.review_count,
        });
    }
    if let (Some(last), Some(next)) = (record.last_reviewed_at, record.next_review_at) {
        if next < last {
            return Err(ValidationError::ScheduledBeforeLastReview {
                word_id: record.word_id.clone(),
            });
        }
    }
    Ok(())
}

/// Clamp ease, interval, retirement counters and schedule ordering in place
pub fn sanitize_record(record: &mut ProgressRecord) {
    record.ease_factor = clamp_ease(record.ease_factor);
    record.interval_days = record.interval_days.clamp(1, MAX_INTERVAL_DAYS);

    if record.is_retired {
        record.review_count = 0;
        record.is_mastered = false;
    }

    if let (Some(last), Some(next)) = (record.last_reviewed_at, record.next_review_at) {
        if next < last {
            record.next_review_at = Some(last);
        }
    }
}

impl ProgressRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_record(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_EASE_FACTOR, EPSILON};
    use chrono::{Duration, TimeZone, Utc};

    fn record() -> ProgressRecord {
        ProgressRecord::new("apple", Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }

    // ==================== validate_record ====================

    #[test]
    fn test_fresh_record_is_valid() {
        assert_eq!(validate_record(&record()), Ok(()));
    }

    #[test]
    fn test_empty_word_id_rejected() {
        let mut r = record();
        r.word_id = "  ".to_string();
        assert_eq!(r.validate(), Err(ValidationError::EmptyWordId));
    }

    #[test]
    fn test_non_finite_ease_rejected() {
        let mut r = record();
        r.ease_factor = f64::INFINITY;
        assert!(matches!(r.validate(), Err(ValidationError::NonFiniteEase(_))));

        r.ease_factor = f64::NAN;
        assert!(matches!(r.validate(), Err(ValidationError::NonFiniteEase(_))));
    }

    #[test]
    fn test_ease_below_floor_rejected() {
        let mut r = record();
        r.ease_factor = 1.29;
        assert_eq!(r.validate(), Err(ValidationError::EaseBelowFloor(1.29)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut r = record();
        r.interval_days = 0;
        assert_eq!(r.validate(), Err(ValidationError::ZeroInterval));
    }

    #[test]
    fn test_retired_with_reviews_rejected() {
        let mut r = record();
        r.is_retired = true;
        r.review_count = 2;
        assert!(matches!(
            r.validate(),
            Err(ValidationError::RetiredWithReviews { review_count: 2, .. })
        ));
    }

    #[test]
    fn test_next_before_last_rejected() {
        let mut r = record();
        let next = r.next_review_at.unwrap();
        r.last_reviewed_at = Some(next + Duration::hours(1));
        assert!(matches!(
            r.validate(),
            Err(ValidationError::ScheduledBeforeLastReview { .. })
        ));
    }

    // ==================== sanitize_record ====================

    #[test]
    fn test_sanitize_clamps_ease_and_interval() {
        let mut r = record();
        r.ease_factor = 0.4;
        r.interval_days = 0;
        sanitize_record(&mut r);

        assert!((r.ease_factor - MIN_EASE_FACTOR).abs() < EPSILON);
        assert_eq!(r.interval_days, 1);
        assert_eq!(r.validate(), Ok(()));
    }

    #[test]
    fn test_sanitize_replaces_nan_ease_with_default() {
        let mut r = record();
        r.ease_factor = f64::NAN;
        sanitize_record(&mut r);
        assert!((r.ease_factor - DEFAULT_EASE_FACTOR).abs() < EPSILON);
    }

    #[test]
    fn test_sanitize_resets_retired_counters() {
        let mut r = record();
        r.is_retired = true;
        r.is_mastered = true;
        r.review_count = 7;
        sanitize_record(&mut r);

        assert_eq!(r.review_count, 0);
        assert!(!r.is_mastered);
        assert_eq!(r.validate(), Ok(()));
    }

    #[test]
    fn test_sanitize_raises_next_review_to_last_review() {
        let mut r = record();
        let last = r.next_review_at.unwrap() + Duration::days(2);
        r.last_reviewed_at = Some(last);
        sanitize_record(&mut r);

        assert_eq!(r.next_review_at, Some(last));
    }
}
