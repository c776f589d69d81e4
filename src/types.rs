//! Common types used throughout the broadcaster

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Dry run: real reads, locally answered dispatch, no signing
    Simulation,
    /// Real signed submissions
    Production,
}

/// Gate that must hold before anything is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationCondition {
    /// Wall-clock instant (UTC)
    At(DateTime<Utc>),
    /// Minimum observed block height
    Height(u64),
}

impl fmt::Display for ActivationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(at) => write!(f, "at {}", at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Height(height) => write!(f, "block #{}", height),
        }
    }
}

/// EIP-1559 fee parameters, in wei
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParams {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeParams {
    /// Apply template overrides on top of a fresh estimate.
    ///
    /// The priority fee is capped at the max fee so an override of only one
    /// side can never yield an unsubmittable pair.
    pub fn with_overrides(self, overrides: &FeeOverrides) -> Self {
        let max_fee_per_gas = overrides.max_fee_per_gas.unwrap_or(self.max_fee_per_gas);
        let priority = overrides
            .max_priority_fee_per_gas
            .unwrap_or(self.max_priority_fee_per_gas);

        Self {
            max_fee_per_gas,
            max_priority_fee_per_gas: priority.min(max_fee_per_gas),
        }
    }
}

/// Optional fee overrides carried by a template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOverrides {
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

/// What to submit once activation is reached. Calldata is opaque here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxTemplate {
    /// Sending account (0x-prefixed, lowercase)
    pub from: String,
    /// Target contract
    pub to: String,
    /// Value attached, in wei
    pub value: u128,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub fees: FeeOverrides,
}

/// Bytes ready for dispatch, plus the parameters they were built with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSubmission {
    pub raw: Vec<u8>,
    pub nonce: u64,
    pub fees: FeeParams,
}

impl SignedSubmission {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

/// Opaque reference returned by a successful dispatch (a tx hash on EVM chains)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionHandle(String);

impl SubmissionHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a run ended without a submission being accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExhaustReason {
    /// Every round failed
    RetriesExhausted,
    /// A rejection matched a permanent-stop pattern
    PermanentStop { endpoint: String, message: String },
    /// The driving caller went away before the campaign finished
    Abandoned,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetriesExhausted => f.write_str("retries exhausted"),
            Self::PermanentStop { endpoint, message } => {
                write!(f, "permanent stop from {}: {}", endpoint, message)
            }
            Self::Abandoned => f.write_str("campaign abandoned before finishing"),
        }
    }
}

/// Final outcome of a submission campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Success {
        handle: SubmissionHandle,
        /// URL of the endpoint whose dispatch won the round
        endpoint: String,
        /// Rounds started, including the winning one
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
        reason: ExhaustReason,
    },
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn handle(&self) -> Option<&SubmissionHandle> {
        match self {
            Self::Success { handle, .. } => Some(handle),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Inclusion summary reported by the confirmation watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub block_number: u64,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_estimate_and_cap_priority() {
        let estimate = FeeParams {
            max_fee_per_gas: 40,
            max_priority_fee_per_gas: 2,
        };

        let only_max = FeeOverrides {
            max_fee_per_gas: Some(1),
            max_priority_fee_per_gas: None,
        };
        assert_eq!(
            estimate.with_overrides(&only_max),
            FeeParams {
                max_fee_per_gas: 1,
                max_priority_fee_per_gas: 1
            }
        );

        assert_eq!(estimate.with_overrides(&FeeOverrides::default()), estimate);
    }

    #[test]
    fn condition_display() {
        assert_eq!(ActivationCondition::Height(42).to_string(), "block #42");
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.006Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            ActivationCondition::At(at).to_string(),
            "at 2026-01-02T03:04:05.006Z"
        );
    }
}
