//! # Engine Configuration
//!
//! Settings of the sale workflow, loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`TALLY_*`)
//! 2. Defaults (this file)
//!
//! | Variable                          | Default | Meaning                          |
//! |-----------------------------------|---------|----------------------------------|
//! | `TALLY_INVOICE_PREFIX`            | `INV`   | Sale number prefix               |
//! | `TALLY_MAX_SEQUENCE_RETRIES`      | `2`     | Retries after a number collision |
//! | `TALLY_TRANSACTION_TIMEOUT_MS`    | `10000` | Bound on one unit of work        |
//! | `TALLY_UTC_OFFSET_MINUTES`        | `0`     | Offset of the business day       |
//!
//! Configuration is read-only after initialization.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tally_core::DEFAULT_INVOICE_PREFIX;

/// Largest offset any real timezone uses (UTC+14:00).
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Prefix of generated sale numbers (`INV` → `INV-YYYYMMDD-NNN`).
    pub invoice_prefix: String,

    /// How many times a sale is retried after its number was taken by a
    /// concurrent checkout. Total attempts = retries + 1.
    pub max_sequence_retries: u32,

    /// Upper bound on one unit of work. On expiry it is rolled back.
    pub transaction_timeout: Duration,

    /// The calendar day of a sale number is taken at this offset from UTC.
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            invoice_prefix: DEFAULT_INVOICE_PREFIX.to_string(),
            max_sequence_retries: 2,
            transaction_timeout: Duration::from_secs(10),
            utc_offset_minutes: 0,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration from environment variables and defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();

        if let Some(prefix) = lookup("TALLY_INVOICE_PREFIX") {
            config.invoice_prefix = prefix.trim().to_string();
        }

        if let Some(retries) = lookup("TALLY_MAX_SEQUENCE_RETRIES") {
            config.max_sequence_retries = retries.trim().parse().map_err(|_| {
                ConfigError::InvalidValue("TALLY_MAX_SEQUENCE_RETRIES".to_string())
            })?;
        }

        if let Some(timeout) = lookup("TALLY_TRANSACTION_TIMEOUT_MS") {
            let millis: u64 = timeout.trim().parse().map_err(|_| {
                ConfigError::InvalidValue("TALLY_TRANSACTION_TIMEOUT_MS".to_string())
            })?;
            config.transaction_timeout = Duration::from_millis(millis);
        }

        if let Some(offset) = lookup("TALLY_UTC_OFFSET_MINUTES") {
            config.utc_offset_minutes = offset.trim().parse().map_err(|_| {
                ConfigError::InvalidValue("TALLY_UTC_OFFSET_MINUTES".to_string())
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the sale number prefix.
    pub fn with_invoice_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.invoice_prefix = prefix.into();
        self
    }

    /// Sets the number of retries after a sale number collision.
    pub fn with_max_sequence_retries(mut self, retries: u32) -> Self {
        self.max_sequence_retries = retries;
        self
    }

    /// Sets the unit-of-work timeout.
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Sets the business-day offset from UTC.
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Checks the values make sense together.
    ///
    /// ## Rules
    /// - Prefix is non-empty ASCII alphanumeric (it is followed by `-`)
    /// - Timeout is not zero
    /// - Offset is within ±14 hours
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.invoice_prefix.is_empty()
            || !self.invoice_prefix.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(ConfigError::InvalidValue("invoice_prefix".to_string()));
        }

        if self.transaction_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("transaction_timeout".to_string()));
        }

        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::InvalidValue("utc_offset_minutes".to_string()));
        }

        Ok(())
    }

    /// The calendar day `at` falls on, in the configured offset.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => at.with_timezone(&offset).date_naive(),
            None => at.date_naive(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

// =============================================================================
// Unit Tests
// =============================================================================
