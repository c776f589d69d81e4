//! Configuration module for the broadcaster
//!
//! This module handles configuration loading from TOML files, `.env` and
//! environment variables, and converts the result into the runtime types
//! used by the pool, waiter and racer.

use crate::activation::WaiterSettings;
use crate::chain::encoding::{decode_data, normalize_address};
use crate::endpoint_pool::{CandidateSet, EndpointConfig, PoolSettings};
use crate::racer::{RetryPolicy, DEFAULT_PERMANENT_STOP_PATTERNS};
use crate::types::{ActivationCondition, FeeOverrides, TxTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment variable {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chain endpoints and probing
    pub endpoints: EndpointsConfig,

    /// When to fire
    #[serde(default)]
    pub activation: ActivationConfig,

    /// What to submit
    pub transaction: TransactionConfig,

    /// Rounds, backoff and stop patterns
    #[serde(default)]
    pub retry: RetryConfig,

    /// Activation polling cadence
    #[serde(default)]
    pub waiter: WaiterConfig,

    /// Remote signer
    #[serde(default)]
    pub signer: SignerConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// JSON-RPC endpoint URLs, in preference order for ties
    pub urls: Vec<String>,

    /// Per-request HTTP timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Liveness probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Pause between re-probe passes when nothing is live
    #[serde(default = "default_reselect_pause_ms")]
    pub reselect_pause_ms: u64,

    /// Background re-probe period; 0 disables
    #[serde(default)]
    pub health_check_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// RFC 3339 instant, e.g. "2026-10-18T16:00:00.000Z"
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,

    /// Minimum block height
    #[serde(default)]
    pub block: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Sending accounts, one campaign each (must be known to the signer).
    /// A single address or a list.
    #[serde(with = "accounts")]
    pub from: Vec<String>,

    /// Target contract
    pub to: String,

    /// Value in wei
    #[serde(default, with = "wei")]
    pub value: u128,

    /// Opaque calldata, 0x-prefixed hex
    #[serde(default = "default_data")]
    pub data: String,

    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    pub chain_id: u64,

    /// Override for the estimated max fee, in wei
    #[serde(default, with = "wei_opt")]
    pub max_fee_per_gas: Option<u128>,

    /// Override for the estimated priority fee, in wei
    #[serde(default, with = "wei_opt")]
    pub max_priority_fee_per_gas: Option<u128>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,

    /// Case-insensitive regexes; a matching rejection ends the campaign
    #[serde(default = "default_permanent_stop_patterns")]
    pub permanent_stop_patterns: Vec<String>,

    /// `"all-live"` or `{ fastest = n }`
    #[serde(default)]
    pub candidates: CandidateSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiterConfig {
    #[serde(default = "default_coarse_threshold_ms")]
    pub coarse_threshold_ms: u64,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_height_query_timeout_ms")]
    pub height_query_timeout_ms: u64,

    #[serde(default = "default_block_poll_distant_ms")]
    pub block_poll_distant_ms: u64,

    #[serde(default = "default_block_poll_near_ms")]
    pub block_poll_near_ms: u64,

    #[serde(default = "default_block_poll_final_ms")]
    pub block_poll_final_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// JSON-RPC URL exposing `eth_signTransaction`
    #[serde(default = "default_signer_url")]
    pub url: String,

    #[serde(default = "default_signer_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default)]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Poll for a receipt after a successful run
    #[serde(default = "default_true")]
    pub watch_confirmation: bool,

    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,
}

// Default value functions
fn default_request_timeout_ms() -> u64 { 3_000 }
fn default_probe_timeout_ms() -> u64 { 2_000 }
fn default_reselect_pause_ms() -> u64 { 10 }
fn default_data() -> String { "0x".to_string() }
fn default_gas_limit() -> u64 { 300_000 }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_ms() -> u64 { 100 }
fn default_round_timeout_ms() -> u64 { 1_500 }
fn default_permanent_stop_patterns() -> Vec<String> {
    DEFAULT_PERMANENT_STOP_PATTERNS.iter().map(|p| p.to_string()).collect()
}
fn default_coarse_threshold_ms() -> u64 { 300 }
fn default_tick_interval_ms() -> u64 { 1_000 }
fn default_height_query_timeout_ms() -> u64 { 1_000 }
fn default_block_poll_distant_ms() -> u64 { 100 }
fn default_block_poll_near_ms() -> u64 { 10 }
fn default_block_poll_final_ms() -> u64 { 1 }
fn default_signer_url() -> String { "http://127.0.0.1:8550".to_string() }
fn default_signer_timeout_ms() -> u64 { 2_000 }
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }
fn default_confirmation_timeout_secs() -> u64 { 120 }
fn default_confirmation_poll_ms() -> u64 { 500 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            round_timeout_ms: default_round_timeout_ms(),
            permanent_stop_patterns: default_permanent_stop_patterns(),
            candidates: CandidateSet::default(),
        }
    }
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            coarse_threshold_ms: default_coarse_threshold_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            height_query_timeout_ms: default_height_query_timeout_ms(),
            block_poll_distant_ms: default_block_poll_distant_ms(),
            block_poll_near_ms: default_block_poll_near_ms(),
            block_poll_final_ms: default_block_poll_final_ms(),
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            url: default_signer_url(),
            timeout_ms: default_signer_timeout_ms(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: default_metrics_port(),
            watch_confirmation: default_true(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            confirmation_poll_ms: default_confirmation_poll_ms(),
        }
    }
}

/// Wei amounts from a TOML integer or a decimal string (for values past i64)
mod wei {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum Raw {
        Int(u64),
        Text(String),
    }

    impl Raw {
        pub(super) fn into_u128(self) -> Result<u128, String> {
            match self {
                Raw::Int(value) => Ok(value as u128),
                Raw::Text(text) => {
                    let digits: String = text.trim().chars().filter(|c| *c != '_').collect();
                    digits
                        .parse::<u128>()
                        .map_err(|e| format!("invalid wei amount {:?}: {}", text, e))
                }
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        Raw::deserialize(deserializer)?
            .into_u128()
            .map_err(serde::de::Error::custom)
    }
}

/// One address or a list of them
mod accounts {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn serialize<S: Serializer>(value: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(account) => vec![account],
            OneOrMany::Many(accounts) => accounts,
        })
    }
}

mod wei_opt {
    use super::wei::Raw;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&value.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
        Option::<Raw>::deserialize(deserializer)?
            .map(Raw::into_u128)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration with `.env` and environment variable overrides.
    /// Validation is left to the caller so CLI overrides can land first.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Apply `STRIKE_*` overrides from any variable source
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(list) = lookup("STRIKE_ENDPOINTS") {
            let urls: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect();
            if urls.is_empty() {
                return Err(ConfigError::Env {
                    var: "STRIKE_ENDPOINTS",
                    message: "no URLs in list".to_string(),
                });
            }
            self.endpoints.urls = urls;
        }

        if let Some(url) = lookup("STRIKE_SIGNER_URL") {
            self.signer.url = url.trim().to_string();
        }

        if let Some(list) = lookup("STRIKE_FROM") {
            let accounts: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
            if accounts.is_empty() {
                return Err(ConfigError::Env {
                    var: "STRIKE_FROM",
                    message: "no accounts in list".to_string(),
                });
            }
            self.transaction.from = accounts;
        }

        Ok(())
    }

    /// Replace the configured activation with a single condition
    pub fn override_activation(&mut self, condition: ActivationCondition) {
        self.activation = match condition {
            ActivationCondition::At(at) => ActivationConfig {
                at: Some(at),
                block: None,
            },
            ActivationCondition::Height(block) => ActivationConfig {
                at: None,
                block: Some(block),
            },
        };
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Validation(message));

        if self.endpoints.urls.is_empty() {
            return invalid("at least one endpoint URL is required".to_string());
        }
        let mut seen = HashSet::new();
        for url in &self.endpoints.urls {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| ConfigError::Validation(format!("endpoint {:?}: {}", url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return invalid(format!("endpoint {:?}: only http(s) is supported", url));
            }
            if !seen.insert(url.trim_end_matches('/')) {
                return invalid(format!("duplicate endpoint {:?}", url));
            }
        }
        if self.endpoints.probe_timeout_ms == 0 {
            return invalid("endpoints.probe_timeout_ms must be > 0".to_string());
        }
        if self.endpoints.request_timeout_ms == 0 {
            return invalid("endpoints.request_timeout_ms must be > 0".to_string());
        }
        if self.waiter.height_query_timeout_ms == 0 {
            return invalid("waiter.height_query_timeout_ms must be > 0".to_string());
        }
        if self.signer.timeout_ms == 0 {
            return invalid("signer.timeout_ms must be > 0".to_string());
        }

        self.activation_condition()?;

        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be >= 1".to_string());
        }
        if self.retry.round_timeout_ms == 0 {
            return invalid("retry.round_timeout_ms must be > 0".to_string());
        }
        if let CandidateSet::Fastest(0) = self.retry.candidates {
            return invalid("retry.candidates.fastest must be >= 1".to_string());
        }
        self.retry_policy()?;

        self.tx_templates()?;

        if let (Some(max), Some(priority)) = (
            self.transaction.max_fee_per_gas,
            self.transaction.max_priority_fee_per_gas,
        ) {
            if priority > max {
                return invalid(format!(
                    "max_priority_fee_per_gas ({}) exceeds max_fee_per_gas ({})",
                    priority, max
                ));
            }
        }

        Ok(())
    }

    pub fn activation_condition(&self) -> Result<ActivationCondition, ConfigError> {
        match (self.activation.at, self.activation.block) {
            (Some(at), None) => Ok(ActivationCondition::At(at)),
            (None, Some(block)) => Ok(ActivationCondition::Height(block)),
            (Some(_), Some(_)) => Err(ConfigError::Validation(
                "set exactly one of activation.at and activation.block".to_string(),
            )),
            (None, None) => Err(ConfigError::Validation(
                "an activation condition (activation.at or activation.block) is required".to_string(),
            )),
        }
    }

    /// One template per sending account, in configured order
    pub fn tx_templates(&self) -> Result<Vec<TxTemplate>, ConfigError> {
        let tx = &self.transaction;
        if tx.from.is_empty() {
            return Err(ConfigError::Validation(
                "transaction.from needs at least one account".to_string(),
            ));
        }

        let mut accounts: Vec<String> = Vec::with_capacity(tx.from.len());
        for account in &tx.from {
            let normalized = normalize_address(account)
                .map_err(|e| ConfigError::Validation(format!("transaction.from: {}", e)))?;
            if accounts.contains(&normalized) {
                return Err(ConfigError::Validation(format!(
                    "transaction.from: duplicate account {:?}",
                    account
                )));
            }
            accounts.push(normalized);
        }

        let template = self.tx_template_for(String::new())?;
        Ok(accounts
            .into_iter()
            .map(|from| TxTemplate {
                from,
                ..template.clone()
            })
            .collect())
    }

    fn tx_template_for(&self, from: String) -> Result<TxTemplate, ConfigError> {
        let tx = &self.transaction;
        let to = normalize_address(&tx.to)
            .map_err(|e| ConfigError::Validation(format!("transaction.to: {}", e)))?;
        let data = decode_data(&tx.data)
            .map_err(|e| ConfigError::Validation(format!("transaction.data: {}", e)))?;

        Ok(TxTemplate {
            from,
            to,
            value: tx.value,
            data,
            gas_limit: tx.gas_limit,
            chain_id: tx.chain_id,
            fees: FeeOverrides {
                max_fee_per_gas: tx.max_fee_per_gas,
                max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
            },
        })
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.backoff_ms),
            Duration::from_millis(self.retry.round_timeout_ms),
            &self.retry.permanent_stop_patterns,
        )
        .map_err(|e| ConfigError::Validation(format!("retry.permanent_stop_patterns: {}", e)))
    }

    pub fn endpoint_configs(&self) -> Vec<EndpointConfig> {
        self.endpoints
            .urls
            .iter()
            .map(|url| EndpointConfig::from(url.as_str()))
            .collect()
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            probe_timeout: Duration::from_millis(self.endpoints.probe_timeout_ms),
            reselect_pause: Duration::from_millis(self.endpoints.reselect_pause_ms),
        }
    }

    pub fn health_check_interval(&self) -> Option<Duration> {
        match self.endpoints.health_check_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn waiter_settings(&self) -> WaiterSettings {
        let w = &self.waiter;
        WaiterSettings {
            coarse_threshold: Duration::from_millis(w.coarse_threshold_ms),
            tick_interval: Duration::from_millis(w.tick_interval_ms.max(1)),
            height_query_timeout: Duration::from_millis(w.height_query_timeout_ms),
            block_poll_distant: Duration::from_millis(w.block_poll_distant_ms.max(1)),
            block_poll_near: Duration::from_millis(w.block_poll_near_ms.max(1)),
            block_poll_final: Duration::from_millis(w.block_poll_final_ms.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
        [endpoints]
        urls = ["https://rpc.apechain.com/http", "https://apechain.calderachain.xyz/http"]

        [activation]
        at = "2026-10-18T16:00:00.000Z"

        [transaction]
        from = "0x00000000000000000000000000000000000000AA"
        to = "0x00000000000000000000000000000000000000bb"
        value = "1000000000000000000000"
        data = "0xa0712d680000000000000000000000000000000000000000000000000000000000000001"
        chain_id = 33139
        max_priority_fee_per_gas = 2000000000
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.round_timeout_ms, 1_500);
        assert_eq!(config.retry.candidates, CandidateSet::AllLive);
        assert_eq!(config.endpoints.probe_timeout_ms, 2_000);
        assert_eq!(config.health_check_interval(), None);
        assert_eq!(config.waiter_settings(), WaiterSettings::default());

        let templates = config.tx_templates().unwrap();
        assert_eq!(templates.len(), 1);
        let template = &templates[0];
        assert_eq!(template.from, "0x00000000000000000000000000000000000000aa");
        assert_eq!(template.value, 1_000_000_000_000_000_000_000);
        assert_eq!(template.data.len(), 36);
        assert_eq!(template.fees.max_priority_fee_per_gas, Some(2_000_000_000));
        assert_eq!(template.fees.max_fee_per_gas, None);
    }

    #[test]
    fn activation_must_be_exactly_one() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.activation.block = Some(100);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.override_activation(ActivationCondition::Height(200));
        assert_eq!(
            config.activation_condition().unwrap(),
            ActivationCondition::Height(200)
        );

        config.activation = ActivationConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_endpoints_and_patterns() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.endpoints.urls = vec![];
        assert!(config.validate().is_err());

        config.endpoints.urls = vec!["wss://rpc.example".to_string()];
        assert!(config.validate().is_err());

        config.endpoints.urls = vec!["https://a.example/".to_string(), "https://a.example".to_string()];
        assert!(config.validate().is_err());

        config.endpoints.urls = vec!["https://a.example".to_string()];
        config.retry.permanent_stop_patterns = vec!["(".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_transaction_fields() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.transaction.data = "0xabc".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.transaction.to = "0x1234".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.transaction.max_fee_per_gas = Some(1_000_000_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = [
            ("STRIKE_ENDPOINTS", " https://a.example , https://b.example ,"),
            ("STRIKE_SIGNER_URL", "http://signer:8550"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env_overrides(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.endpoints.urls, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.signer.url, "http://signer:8550");
        assert_eq!(config.transaction.from, vec!["0x00000000000000000000000000000000000000AA"]);

        let err = config
            .apply_env_overrides(|var| (var == "STRIKE_ENDPOINTS").then(|| " , ".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "STRIKE_ENDPOINTS", .. }));
    }

    #[test]
    fn several_accounts_share_one_transaction() {
        let toml = MINIMAL.replace(
            r#"from = "0x00000000000000000000000000000000000000AA""#,
            r#"from = ["0x00000000000000000000000000000000000000AA", "0x00000000000000000000000000000000000000cc"]"#,
        );
        let config = Config::from_toml_str(&toml).unwrap();
        config.validate().unwrap();

        let templates = config.tx_templates().unwrap();
        let accounts: Vec<&str> = templates.iter().map(|t| t.from.as_str()).collect();
        assert_eq!(
            accounts,
            vec![
                "0x00000000000000000000000000000000000000aa",
                "0x00000000000000000000000000000000000000cc"
            ]
        );
        assert_eq!(templates[0].data, templates[1].data);
        assert_eq!(templates[0].to, templates[1].to);
    }

    #[test]
    fn rejects_missing_or_duplicate_accounts() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.transaction.from = vec![];
        assert!(config.validate().is_err());

        // Same address, different case
        config.transaction.from = vec![
            "0x00000000000000000000000000000000000000AA".to_string(),
            "0x00000000000000000000000000000000000000aa".to_string(),
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate account"), "{}", err);
    }

    #[test]
    fn env_account_list_replaces_from() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config
            .apply_env_overrides(|var| {
                (var == "STRIKE_FROM").then(|| {
                    "0x00000000000000000000000000000000000000a1, 0x00000000000000000000000000000000000000a2".to_string()
                })
            })
            .unwrap();
        assert_eq!(config.tx_templates().unwrap().len(), 2);

        let err = config
            .apply_env_overrides(|var| (var == "STRIKE_FROM").then(|| ",".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "STRIKE_FROM", .. }));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let zeroed: [fn(&mut Config); 5] = [
            |c| c.endpoints.probe_timeout_ms = 0,
            |c| c.endpoints.request_timeout_ms = 0,
            |c| c.waiter.height_query_timeout_ms = 0,
            |c| c.signer.timeout_ms = 0,
            |c| c.retry.round_timeout_ms = 0,
        ];
        for zero in zeroed {
            let mut config = Config::from_toml_str(MINIMAL).unwrap();
            zero(&mut config);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("must be > 0"), "{}", err);
        }
    }

    #[test]
    fn candidates_parse_from_toml() {
        let toml = format!("{}\n[retry]\ncandidates = {{ fastest = 2 }}\n", MINIMAL);
        let config = Config::from_toml_str(&toml).unwrap();
        assert_eq!(config.retry.candidates, CandidateSet::Fastest(2));
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strike.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.endpoints.urls.len(), 2);
    }
}
