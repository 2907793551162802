//! Engine and service configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, ResolverError, Result};
use crate::selection::TieBreak;

/// Resolver behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// How to pick one contract when several match the same key.
    pub tie_break: TieBreak,

    /// Reject blank party and template identifiers before querying.
    pub validate_inputs: bool,

    /// Which create failures count as "already exists".
    pub duplicate_detection: DuplicateDetection,

    /// Backoff used by `get_or_create_with_retry`.
    pub retry: RetryConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::Last,
            validate_inputs: true,
            duplicate_detection: DuplicateDetection::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Classifier for "contract already exists" rejections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateDetection {
    /// Rejection codes treated as duplicates (exact match).
    pub codes: Vec<String>,

    /// Message fragments treated as duplicates (case-insensitive).
    pub message_fragments: Vec<String>,
}

impl Default for DuplicateDetection {
    fn default() -> Self {
        Self {
            codes: vec![
                "ALREADY_EXISTS".to_string(),
                "DUPLICATE_CONTRACT_KEY".to_string(),
            ],
            message_fragments: vec![
                "already exists".to_string(),
                "duplicate contract key".to_string(),
            ],
        }
    }
}

impl DuplicateDetection {
    pub fn is_duplicate(&self, error: &LedgerError) -> bool {
        let LedgerError::Rejected { code, message } = error else {
            return false;
        };

        if let Some(code) = code {
            if self.codes.iter().any(|c| c == code) {
                return true;
            }
        }

        let message = message.to_lowercase();
        self.message_fragments
            .iter()
            .any(|fragment| message.contains(&fragment.to_lowercase()))
    }
}

/// Exponential backoff for caller-side retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            multiplier: 2.0,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let millis = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }
}

/// Where and how to reach the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerEndpoint {
    pub url: String,

    /// Ledger user the session authenticates as.
    pub user_id: Option<String>,

    pub request_timeout_ms: u64,
}

impl Default for LedgerEndpoint {
    fn default() -> Self {
        Self {
            url: "http://localhost:7575".to_string(),
            user_id: None,
            request_timeout_ms: 30_000,
        }
    }
}

impl LedgerEndpoint {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub ledger: LedgerEndpoint,
    pub resolver: ResolverConfig,
}

impl ServiceConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ResolverError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ServiceConfig =
            toml::from_str(contents).map_err(|e| ResolverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.url.trim().is_empty() {
            return Err(ResolverError::Config("ledger.url must not be empty".into()));
        }
        if self.resolver.retry.max_attempts == 0 {
            return Err(ResolverError::Config(
                "resolver.retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
