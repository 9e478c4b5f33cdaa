//! Common Types and Constants
//!
//! Shared data structures used across the scheduling modules.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Ease factor assigned to a freshly created record
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Lower bound enforced on the ease factor after every update
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Ease penalty applied on an incorrect answer
pub const LAPSE_EASE_PENALTY: f64 = 0.2;

/// Day counts for correct reviews 1..=10 under the fixed-table policy
pub const REVIEW_INTERVALS: [u32; 10] = [1, 2, 3, 5, 7, 10, 14, 21, 28, 35];

/// Interval used for review 11+ and on mastery promotion
pub const MASTERY_INTERVAL_DAYS: u32 = 60;

/// Review count at which a word is promoted to mastered
pub const MASTERY_THRESHOLD: u32 = 10;

/// Days a retired word stays out of rotation
pub const RETIREMENT_QUARANTINE_DAYS: u32 = 100;

/// Upper bound on any computed interval (100 years)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Tolerance for floating point comparisons
pub const EPSILON: f64 = 1e-9;

// ==================== Review Outcome ====================

/// Self-reported confidence attached to a review answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    /// Ease adjustment for a correct answer at this confidence
    pub const fn ease_delta(self) -> f64 {
        match self {
            Confidence::Low => -0.15,
            Confidence::Medium => 0.0,
            Confidence::High => 0.1,
        }
    }
}

/// Result of a single review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl ReviewOutcome {
    pub const fn correct(confidence: Confidence) -> Self {
        Self {
            is_correct: true,
            confidence: Some(confidence),
        }
    }

    pub const fn incorrect() -> Self {
        Self {
            is_correct: false,
            confidence: None,
        }
    }

    /// Confidence with the missing case folded to medium
    pub fn effective_confidence(&self) -> Confidence {
        self.confidence.unwrap_or(Confidence::Medium)
    }
}

// ==================== Progress Record ====================

/// Lifecycle classification of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordStatus {
    New,
    Active,
    Mastered,
    Retired,
}

impl WordStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            WordStatus::New => "new",
            WordStatus::Active => "active",
            WordStatus::Mastered => "mastered",
            WordStatus::Retired => "retired",
        }
    }
}

/// Scheduling state for one (user, word) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default)]
    pub word_id: String,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_review_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_mastered: bool,
    #[serde(default)]
    pub is_retired: bool,
}

fn default_ease_factor() -> f64 {
    DEFAULT_EASE_FACTOR
}

fn default_interval_days() -> u32 {
    1
}

impl ProgressRecord {
    /// Record for a word seen for the first time; due immediately
    pub fn new(word_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            word_id: word_id.into(),
            review_count: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
            last_reviewed_at: None,
            next_review_at: Some(now),
            is_mastered: false,
            is_retired: false,
        }
    }

    pub fn status(&self) -> WordStatus {
        if self.is_retired {
            WordStatus::Retired
        } else if self.is_mastered {
            WordStatus::Mastered
        } else if self.review_count == 0 {
            WordStatus::New
        } else {
            WordStatus::Active
        }
    }

    pub fn is_new(&self) -> bool {
        self.status() == WordStatus::New
    }
}

// ==================== Scheduler Config ====================

/// How a correct review turns into an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntervalPolicy {
    /// Static day table indexed by review count
    #[default]
    FixedTable,
    /// SM-2 style: 1, 6, then previous interval times ease
    Multiplicative,
}

impl IntervalPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "fixed_table" | "fixedtable" | "table" => Some(IntervalPolicy::FixedTable),
            "multiplicative" | "sm2" | "sm-2" => Some(IntervalPolicy::Multiplicative),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            IntervalPolicy::FixedTable => "fixed",
            IntervalPolicy::Multiplicative => "multiplicative",
        }
    }
}

/// Tunables for the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    pub policy: IntervalPolicy,
    pub mastery_threshold: u32,
    pub mastery_interval_days: u32,
    pub retirement_quarantine_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: IntervalPolicy::FixedTable,
            mastery_threshold: MASTERY_THRESHOLD,
            mastery_interval_days: MASTERY_INTERVAL_DAYS,
            retirement_quarantine_days: RETIREMENT_QUARANTINE_DAYS,
        }
    }
}

// ==================== Helpers ====================

/// `at + days`, saturating at the largest representable instant
pub fn add_days(at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    at.checked_add_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Clamp an ease factor into the valid domain
pub fn clamp_ease(ease: f64) -> f64 {
    if !ease.is_finite() {
        return DEFAULT_EASE_FACTOR;
    }
    ease.max(MIN_EASE_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_record_defaults() {
        let record = ProgressRecord::new("apple", now());

        assert_eq!(record.review_count, 0);
        assert!((record.ease_factor - DEFAULT_EASE_FACTOR).abs() < EPSILON);
        assert_eq!(record.interval_days, 1);
        assert_eq!(record.last_reviewed_at, None);
        assert_eq!(record.next_review_at, Some(now()));
        assert_eq!(record.status(), WordStatus::New);
    }

    #[test]
    fn test_status_precedence() {
        let mut record = ProgressRecord::new("apple", now());
        record.review_count = 3;
        assert_eq!(record.status(), WordStatus::Active);

        record.is_mastered = true;
        assert_eq!(record.status(), WordStatus::Mastered);

        record.is_retired = true;
        record.review_count = 0;
        assert_eq!(record.status(), WordStatus::Retired);
    }

    #[test]
    fn test_confidence_parse() {
        assert_eq!(Confidence::parse("HIGH"), Some(Confidence::High));
        assert_eq!(Confidence::parse(" low "), Some(Confidence::Low));
        assert_eq!(Confidence::parse("unsure"), None);
    }

    #[test]
    fn test_missing_confidence_counts_as_medium() {
        let outcome = ReviewOutcome {
            is_correct: true,
            confidence: None,
        };
        assert_eq!(outcome.effective_confidence(), Confidence::Medium);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(IntervalPolicy::parse("fixed"), Some(IntervalPolicy::FixedTable));
        assert_eq!(IntervalPolicy::parse("SM2"), Some(IntervalPolicy::Multiplicative));
        assert_eq!(IntervalPolicy::parse("ladder"), None);
    }

    #[test]
    fn test_clamp_ease() {
        assert!((clamp_ease(1.0) - MIN_EASE_FACTOR).abs() < EPSILON);
        assert!((clamp_ease(f64::NAN) - DEFAULT_EASE_FACTOR).abs() < EPSILON);
        assert!((clamp_ease(f64::INFINITY) - DEFAULT_EASE_FACTOR).abs() < EPSILON);
        assert!((clamp_ease(2.1) - 2.1).abs() < EPSILON);
    }

    #[test]
    fn test_add_days_saturates() {
        assert_eq!(add_days(DateTime::<Utc>::MAX_UTC, 1), DateTime::<Utc>::MAX_UTC);
        assert_eq!(add_days(now(), 0), now());
    }

    #[test]
    fn test_record_deserializes_with_missing_fields() {
        let record: ProgressRecord = serde_json::from_str(r#"{"wordId":"apple"}"#).unwrap();

        assert_eq!(record.word_id, "apple");
        assert_eq!(record.review_count, 0);
        assert!((record.ease_factor - DEFAULT_EASE_FACTOR).abs() < EPSILON);
        assert_eq!(record.interval_days, 1);
        assert_eq!(record.next_review_at, None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(ProgressRecord::new("apple", now())).unwrap();

        assert_eq!(json["wordId"], "apple");
        assert_eq!(json["reviewCount"], 0);
        assert_eq!(json["isRetired"], false);
        assert!(json.get("nextReviewAt").is_some());
    }
}
