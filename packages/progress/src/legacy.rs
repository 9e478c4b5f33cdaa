//! Import of progress kept by the old clients
//!
//! Two shapes are understood. The web client kept a word-keyed object in
//! local storage, optionally wrapped under [`LEGACY_STORAGE_KEY`]:
//!
//! ```json
//! { "apple": { "reviewCount": 3, "nextReviewDate": "2024-03-05",
//!              "lastPlayedDate": "2024-03-01T08:00:00", "isMastered": false,
//!              "retired": false, "category": "fruit" } }
//! ```
//!
//! The data-migration export is a list under [`MIGRATION_PROGRESS_KEY`]:
//!
//! ```json
//! { "progress": [ { "word_id": "apple", "review_count": 3,
//!                   "last_reviewed_at": "2024-03-01T08:00:00",
//!                   "srs_interval": 5, "ease_factor": 1.7 } ] }
//! ```
//!
//! Entries are read one at a time. Any field may be missing, null or of the
//! wrong type; an entry that is not an object at all is logged and skipped.
//! Every entry that is kept becomes a record that passes validation.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde_json::{Map, Value};
use wordwise_algo::{
    add_days, clamp_ease, fixed_table_interval, sanitize_record, ProgressRecord, SchedulerConfig,
    DEFAULT_EASE_FACTOR, MAX_INTERVAL_DAYS,
};

use crate::storage::{StorageError, StorageResult};

/// Local storage key the old web client used for the blob
pub const LEGACY_STORAGE_KEY: &str = "learningProgress";

/// Key holding the entry list in a data-migration export
pub const MIGRATION_PROGRESS_KEY: &str = "progress";

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const REVIEW_COUNT_KEYS: &[&str] = &["reviewCount", "review_count"];
const EASE_KEYS: &[&str] = &["easeFactor", "ease_factor"];
const INTERVAL_KEYS: &[&str] = &["intervalDays", "srs_interval"];
const LAST_REVIEW_KEYS: &[&str] = &["lastPlayedDate", "last_reviewed_at"];
const NEXT_REVIEW_KEYS: &[&str] = &["nextReviewDate", "next_review_at"];
const MASTERED_KEYS: &[&str] = &["isMastered", "is_mastered"];
const RETIRED_KEYS: &[&str] = &["retired", "is_retired"];
const WORD_ID_KEYS: &[&str] = &["word_id", "wordId"];

/// Import with the default scheduler configuration
pub fn import_learning_progress(json: &str, now: DateTime<Utc>) -> StorageResult<Vec<ProgressRecord>> {
    import_learning_progress_with(json, now, &SchedulerConfig::default())
}

/// Convert a legacy blob into records, ordered by word id.
///
/// Fails only when the text is not JSON or its top level is not an object.
/// When a word appears twice in a migration list the later entry wins.
pub fn import_learning_progress_with(
    json: &str,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> StorageResult<Vec<ProgressRecord>> {
    let root: Value = serde_json::from_str(json)?;
    let entries = collect_entries(root)?;

    let mut by_word = BTreeMap::new();
    let mut skipped = 0usize;
    for (word_id, entry) in entries {
        let word_id = word_id.trim();
        if word_id.is_empty() {
            tracing::warn!("skipping legacy entry with an empty word key");
            skipped += 1;
            continue;
        }
        let fields = match entry {
            Value::Object(fields) => fields,
            other => {
                tracing::warn!(word_id, kind = json_kind(&other), "skipping legacy entry that is not an object");
                skipped += 1;
                continue;
            }
        };
        let record = convert_entry(word_id, &fields, now, config);
        if by_word.insert(record.word_id.clone(), record).is_some() {
            tracing::warn!(word_id, "duplicate legacy entry, keeping the later one");
        }
    }

    let records: Vec<ProgressRecord> = by_word.into_values().collect();
    tracing::info!(count = records.len(), skipped, "imported legacy progress");
    Ok(records)
}

/// Flatten either shape into (word id, entry) pairs
fn collect_entries(root: Value) -> StorageResult<Vec<(String, Value)>> {
    let mut root = match root {
        Value::Object(root) => root,
        other => {
            return Err(StorageError::Serialization(serde_json::Error::custom(format!(
                "legacy progress must be a JSON object, found {}",
                json_kind(&other)
            ))))
        }
    };

    if let Some(Value::Array(items)) = root.get_mut(MIGRATION_PROGRESS_KEY) {
        return Ok(std::mem::take(items)
            .into_iter()
            .map(|item| {
                let word_id = item
                    .as_object()
                    .and_then(|fields| text(fields, WORD_ID_KEYS))
                    .unwrap_or_default()
                    .to_string();
                (word_id, item)
            })
            .collect());
    }

    if let Some(Value::Object(inner)) = root.remove(LEGACY_STORAGE_KEY) {
        root = inner;
    }
    Ok(root.into_iter().collect())
}

fn convert_entry(
    word_id: &str,
    fields: &Map<String, Value>,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> ProgressRecord {
    let last_reviewed_at = date_field(word_id, fields, LAST_REVIEW_KEYS);
    let mut next_review_at = date_field(word_id, fields, NEXT_REVIEW_KEYS);
    let mut review_count = number(fields, REVIEW_COUNT_KEYS).map_or(0, clamp_count);
    let mut is_mastered = flag(fields, MASTERED_KEYS);
    let is_retired = flag(fields, RETIRED_KEYS);
    let ease_factor = number(fields, EASE_KEYS).map_or(DEFAULT_EASE_FACTOR, clamp_ease);
    let stored_interval = number(fields, INTERVAL_KEYS).and_then(clamp_interval);

    if is_retired {
        review_count = 0;
        is_mastered = false;
        next_review_at = Some(add_days(now, config.retirement_quarantine_days));
    }

    let interval_days = if is_mastered {
        config.mastery_interval_days
    } else {
        stored_interval.unwrap_or_else(|| fixed_table_interval(review_count, config.mastery_interval_days))
    };

    // Migration exports carry the interval but not the due date
    if next_review_at.is_none() && stored_interval.is_some() {
        next_review_at = last_reviewed_at.map(|last| add_days(last, interval_days));
    }

    let mut record = ProgressRecord {
        word_id: word_id.to_string(),
        review_count,
        ease_factor,
        interval_days,
        last_reviewed_at,
        next_review_at,
        is_mastered,
        is_retired,
    };
    sanitize_record(&mut record);
    record
}

fn field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn text<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    field(fields, keys).and_then(Value::as_str)
}

/// Numbers, or strings holding one
fn number(fields: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    let parsed = match field(fields, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Only `true`, `"true"` or a non-zero number count as set
fn flag(fields: &Map<String, Value>, keys: &[&str]) -> bool {
    match field(fields, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn clamp_count(raw: f64) -> u32 {
    if raw > 0.0 {
        raw.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn clamp_interval(raw: f64) -> Option<u32> {
    (raw >= 1.0).then(|| raw.min(f64::from(MAX_INTERVAL_DAYS)) as u32)
}

fn date_field(word_id: &str, fields: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    let value = field(fields, keys)?;
    let Some(raw) = value.as_str() else {
        tracing::warn!(word_id, kind = json_kind(value), "legacy date is not a string, treating as unset");
        return None;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = parse_legacy_date(raw);
    if parsed.is_none() {
        tracing::warn!(word_id, value = raw, "unparseable legacy date, treating as unset");
    }
    parsed
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// RFC 3339, naive ISO date-time (taken as UTC) or a bare `YYYY-MM-DD` (midnight UTC)
pub fn parse_legacy_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use wordwise_algo::{WordStatus, EPSILON, MASTERY_INTERVAL_DAYS, MIN_EASE_FACTOR, RETIREMENT_QUARANTINE_DAYS};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn words(records: &[ProgressRecord]) -> Vec<&str> {
        records.iter().map(|r| r.word_id.as_str()).collect()
    }

    #[test]
    fn test_parse_legacy_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();

        assert_eq!(parse_legacy_date("2024-03-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_legacy_date("2024-03-01T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_legacy_date("2024-03-01T08:30:00"), Some(expected));
        assert_eq!(parse_legacy_date("2024-03-01T08:30:00.000"), Some(expected));
        assert_eq!(parse_legacy_date("2024-03-01 08:30:00"), Some(expected));
        assert_eq!(
            parse_legacy_date("2024-03-01"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_legacy_date("yesterday"), None);
        assert_eq!(parse_legacy_date("2024-13-01"), None);
    }

    #[test]
    fn test_import_active_entry() {
        let json = r#"{
            "apple": {
                "reviewCount": 3,
                "nextReviewDate": "2024-06-04",
                "lastPlayedDate": "2024-06-01T08:00:00",
                "isMastered": false,
                "retired": false,
                "category": "fruit"
            }
        }"#;

        let records = import_learning_progress(json, now()).unwrap();

        assert_eq!(records.len(), 1);
        let apple = &records[0];
        assert_eq!(apple.word_id, "apple");
        assert_eq!(apple.review_count, 3);
        assert_eq!(apple.interval_days, 3);
        assert!((apple.ease_factor - DEFAULT_EASE_FACTOR).abs() < EPSILON);
        assert_eq!(
            apple.next_review_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(apple.status(), WordStatus::Active);
        assert!(apple.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let records = import_learning_progress(r#"{"pear": {}}"#, now()).unwrap();

        let pear = &records[0];
        assert_eq!(pear.review_count, 0);
        assert_eq!(pear.interval_days, 1);
        assert_eq!(pear.last_reviewed_at, None);
        assert_eq!(pear.next_review_at, None);
        assert_eq!(pear.status(), WordStatus::New);
    }

    #[test]
    fn test_unparseable_date_becomes_null() {
        let json = r#"{"pear": {"reviewCount": 2, "nextReviewDate": "soon", "lastPlayedDate": ""}}"#;

        let pear = &import_learning_progress(json, now()).unwrap()[0];

        assert_eq!(pear.next_review_at, None);
        assert_eq!(pear.last_reviewed_at, None);
    }

    #[test]
    fn test_retired_entry_is_quarantined_from_import_time() {
        let json = r#"{"kiwi": {"reviewCount": 7, "retired": true, "isMastered": true,
                       "nextReviewDate": "2020-01-01"}}"#;

        let kiwi = &import_learning_progress(json, now()).unwrap()[0];

        assert!(kiwi.is_retired);
        assert!(!kiwi.is_mastered);
        assert_eq!(kiwi.review_count, 0);
        assert_eq!(
            kiwi.next_review_at,
            Some(now() + Duration::days(i64::from(RETIREMENT_QUARANTINE_DAYS)))
        );
        assert!(kiwi.validate().is_ok());
    }

    #[test]
    fn test_next_review_raised_to_last_review() {
        let json = r#"{"fig": {"reviewCount": 1, "nextReviewDate": "2024-05-01",
                      "lastPlayedDate": "2024-05-10"}}"#;

        let fig = &import_learning_progress(json, now()).unwrap()[0];

        assert_eq!(fig.next_review_at, fig.last_reviewed_at);
        assert!(fig.validate().is_ok());
    }

    #[test]
    fn test_mastered_entry_gets_mastery_interval() {
        let json = r#"{"plum": {"reviewCount": 12, "isMastered": true, "intervalDays": 9}}"#;

        let plum = &import_learning_progress(json, now()).unwrap()[0];

        assert_eq!(plum.interval_days, MASTERY_INTERVAL_DAYS);
        assert_eq!(plum.status(), WordStatus::Mastered);
    }

    #[test]
    fn test_odd_review_counts_are_clamped() {
        let json = r#"{"a": {"reviewCount": -4}, "b": {"reviewCount": 2.0}, "c": {"reviewCount": null},
                      "d": {"reviewCount": "3"}, "e": {"reviewCount": " 7 "}, "f": {"reviewCount": "lots"},
                      "g": {"reviewCount": [1]}}"#;

        let counts: Vec<u32> = import_learning_progress(json, now())
            .unwrap()
            .iter()
            .map(|r| r.review_count)
            .collect();

        assert_eq!(counts, vec![0, 2, 0, 3, 7, 0, 0]);
    }

    #[test]
    fn test_null_and_odd_flags_read_as_false() {
        let json = r#"{"apple": {"reviewCount": 2},
                       "pear": {"isMastered": null, "retired": null},
                       "plum": {"isMastered": "yes", "retired": {}},
                       "kiwi": {"isMastered": "TRUE"}}"#;

        let records = import_learning_progress(json, now()).unwrap();

        assert_eq!(words(&records), vec!["apple", "kiwi", "pear", "plum"]);
        assert!(records[1].is_mastered);
        for record in [&records[2], &records[3]] {
            assert!(!record.is_mastered);
            assert!(!record.is_retired);
        }
        assert_eq!(records[0].review_count, 2);
    }

    #[test]
    fn test_one_bad_entry_does_not_sink_the_rest() {
        for bad in [r#""garbage""#, "null", "42", "[1, 2]", r#"{"reviewCount": "3"}"#] {
            let json = format!(r#"{{"apple": {{"reviewCount": 2}}, "pear": {bad}}}"#);

            let records = import_learning_progress(&json, now()).unwrap();

            let apple = records.iter().find(|r| r.word_id == "apple").unwrap();
            assert_eq!(apple.review_count, 2, "entry {bad}");
            assert!(records.iter().all(|r| r.validate().is_ok()));
        }
    }

    #[test]
    fn test_non_object_entries_are_skipped() {
        let json = r#"{"apple": {"reviewCount": 2}, "pear": "garbage", "fig": null, "kiwi": [1]}"#;

        let records = import_learning_progress(json, now()).unwrap();

        assert_eq!(words(&records), vec!["apple"]);
    }

    #[test]
    fn test_stored_ease_and_interval_are_kept_within_bounds() {
        let json = r#"{"apple": {"reviewCount": 4, "easeFactor": 1.9, "intervalDays": 12},
                       "fig": {"reviewCount": 4, "easeFactor": 0.4, "intervalDays": 0},
                       "pear": {"reviewCount": 4, "easeFactor": "2.2", "intervalDays": 1e9},
                       "plum": {"reviewCount": 4, "easeFactor": "fast", "intervalDays": -3}}"#;

        let records = import_learning_progress(json, now()).unwrap();
        let [apple, fig, pear, plum] = records.as_slice() else {
            panic!("expected four records, got {records:?}");
        };

        assert!((apple.ease_factor - 1.9).abs() < EPSILON);
        assert_eq!(apple.interval_days, 12);
        assert!((fig.ease_factor - MIN_EASE_FACTOR).abs() < EPSILON);
        assert_eq!(fig.interval_days, fixed_table_interval(4, MASTERY_INTERVAL_DAYS));
        assert!((pear.ease_factor - 2.2).abs() < EPSILON);
        assert_eq!(pear.interval_days, MAX_INTERVAL_DAYS);
        assert!((plum.ease_factor - DEFAULT_EASE_FACTOR).abs() < EPSILON);
        assert_eq!(plum.interval_days, fixed_table_interval(4, MASTERY_INTERVAL_DAYS));
    }

    #[test]
    fn test_migration_list_keeps_ease_and_interval() {
        let json = r#"{"progress": [
            {"word_id": "apple", "review_count": 3, "correct_count": 2,
             "last_reviewed_at": "2024-05-20T09:00:00", "srs_interval": 5, "ease_factor": 1.7},
            {"word_id": "pear", "review_count": "1"}
        ]}"#;

        let records = import_learning_progress(json, now()).unwrap();

        assert_eq!(words(&records), vec!["apple", "pear"]);
        let apple = &records[0];
        let last = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();
        assert_eq!(apple.review_count, 3);
        assert!((apple.ease_factor - 1.7).abs() < EPSILON);
        assert_eq!(apple.interval_days, 5);
        assert_eq!(apple.last_reviewed_at, Some(last));
        assert_eq!(apple.next_review_at, Some(last + Duration::days(5)));
        assert!(apple.validate().is_ok());

        let pear = &records[1];
        assert_eq!(pear.review_count, 1);
        assert!((pear.ease_factor - DEFAULT_EASE_FACTOR).abs() < EPSILON);
        assert_eq!(pear.next_review_at, None);
    }

    #[test]
    fn test_migration_list_skips_unusable_items() {
        let json = r#"{"progress": [
            {"word_id": "plum", "review_count": 1},
            "garbage",
            {"review_count": 4},
            {"word_id": "  ", "review_count": 4},
            {"word_id": 17},
            {"word_id": "apple", "review_count": 2},
            {"word_id": "plum", "review_count": 6}
        ]}"#;

        let records = import_learning_progress(json, now()).unwrap();

        assert_eq!(words(&records), vec!["apple", "plum"]);
        assert_eq!(records[1].review_count, 6);
    }

    #[test]
    fn test_wrapped_blob_and_ordering() {
        let json = r#"{"learningProgress": {"zebra": {}, "ant": {}, "": {}}}"#;

        let records = import_learning_progress(json, now()).unwrap();

        assert_eq!(words(&records), vec!["ant", "zebra"]);
    }

    #[test]
    fn test_malformed_blob_is_an_error() {
        for json in ["[1, 2, 3]", "\"apple\"", "null", "{oops"] {
            assert!(
                matches!(
                    import_learning_progress(json, now()),
                    Err(StorageError::Serialization(_))
                ),
                "{json} should be rejected"
            );
        }
    }
}
