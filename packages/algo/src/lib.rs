//! # wordwise-algo - spaced-repetition scheduling core
//!
//! Pure, synchronous state transitions for vocabulary review:
//!
//! - **Scheduler** - next-review dates, interval growth and ease adjustment
//! - **Retirement** - explicit removal from rotation with a quarantine period
//! - **Due query** - which words are up for review right now
//!
//! No I/O and no shared state: every call takes a record by reference and
//! returns a new one. Persistence belongs to the caller.
//!
//! ## Modules
//!
//! - [`scheduler`] - review transition and interval policies
//! - [`retirement`] - retire / reinstate
//! - [`due`] - due-word query, daily caps, status counts
//! - [`sanitize`] - record validation and clamping
//! - [`types`] - records, outcomes, config and constants
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use wordwise_algo::{compute_next_review, due_words, Confidence, ProgressRecord, ReviewOutcome};
//!
//! let now = Utc::now();
//! let record = ProgressRecord::new("apple", now);
//! let reviewed = compute_next_review(&record, ReviewOutcome::correct(Confidence::High), now);
//!
//! assert_eq!(reviewed.review_count, 1);
//! assert!(due_words([&reviewed], now).is_empty());
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod due;
pub mod retirement;
pub mod sanitize;
pub mod scheduler;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use scheduler::{compute_next_review, fixed_table_interval, multiplicative_interval, Scheduler};

pub use retirement::{is_eligible_for_reinstatement, reinstate, retire};

pub use due::{
    due_records, due_words, due_words_limited, is_due, postpone, status_counts, StatusCounts,
};

pub use sanitize::{sanitize_record, validate_record, ValidationError};
