use crate::errors::FailureClass;
use regex::{RegexSet, RegexSetBuilder};
use std::time::Duration;

/// Rejections that no retry can fix: sold out, per-wallet cap reached,
/// underfunded. Matched case-insensitively against the full error text.
pub const DEFAULT_PERMANENT_STOP_PATTERNS: &[&str] = &[
    "NoSupplyLeft",
    "WalletGlobalLimitExceeded",
    "NotEnoughValue",
    "MaxSupply",
    "insufficient funds",
    r"exceeds? .*limit",
];

/// Retry and classification rules for one campaign
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Rounds to run before giving up
    pub max_attempts: u32,
    /// Pause between failed rounds
    pub backoff: Duration,
    /// Upper bound on one round, fetches included
    pub round_timeout: Duration,
    patterns: Vec<String>,
    permanent_stop: RegexSet,
}

impl RetryPolicy {
    pub fn new<I, S>(
        max_attempts: u32,
        backoff: Duration,
        round_timeout: Duration,
        permanent_stop_patterns: I,
    ) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = permanent_stop_patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        let permanent_stop = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            max_attempts,
            backoff,
            round_timeout,
            patterns,
            permanent_stop,
        })
    }

    /// Short backoff and tight rounds for contested launches
    pub fn aggressive() -> Result<Self, regex::Error> {
        Self::new(
            5,
            Duration::from_millis(50),
            Duration::from_millis(1000),
            DEFAULT_PERMANENT_STOP_PATTERNS,
        )
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn classify(&self, message: &str) -> FailureClass {
        if self.permanent_stop.is_match(message) {
            FailureClass::PermanentStop
        } else {
            FailureClass::Retryable
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let patterns = DEFAULT_PERMANENT_STOP_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        // The built-in patterns are constant; an empty set is only a fallback
        let permanent_stop = RegexSetBuilder::new(DEFAULT_PERMANENT_STOP_PATTERNS)
            .case_insensitive(true)
            .build()
            .unwrap_or_else(|_| RegexSet::empty());

        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
            round_timeout: Duration::from_millis(1500),
            patterns,
            permanent_stop,
        }
    }
}
