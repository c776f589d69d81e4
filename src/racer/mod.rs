//! Submission racer
//!
//! Fans one transaction out to the live endpoints in concurrent rounds,
//! classifies rejections, and memoizes the campaign outcome.

pub mod attempt;
pub mod policy;
#[allow(clippy::module_inception)]
pub mod racer;

pub use attempt::{AttemptError, AttemptOutcome, SubmissionAttempt};
pub use policy::{RetryPolicy, DEFAULT_PERMANENT_STOP_PATTERNS};
pub use racer::SubmissionRacer;
