use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use chrono::FixedOffset;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{limit::LimitPolicy, store::in_memory::DEFAULT_ALLOCATION_ATTEMPTS};

const SECONDS_PER_DAY: i32 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// Maximum successful outgoing total per source account and calendar date.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: Decimal,
    /// Offset from UTC defining calendar dates for the daily limit.
    #[serde(default)]
    pub utc_offset_seconds: i32,
    #[serde(default = "default_account_number_attempts")]
    pub account_number_attempts: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_daily_limit() -> Decimal {
    Decimal::new(5_000_00, 2)
}

fn default_account_number_attempts() -> usize {
    DEFAULT_ALLOCATION_ATTEMPTS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            utc_offset_seconds: 0,
            account_number_attempts: default_account_number_attempts(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LedgerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file `{}`", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config `{}`", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse config yaml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.daily_limit > Decimal::ZERO,
            "daily_limit must be positive, got {}",
            self.daily_limit
        );
        ensure!(
            self.utc_offset_seconds.abs() < SECONDS_PER_DAY,
            "utc_offset_seconds must be within one day, got {}",
            self.utc_offset_seconds
        );
        ensure!(
            self.account_number_attempts > 0,
            "account_number_attempts must be at least 1"
        );
        Ok(())
    }

    pub fn limit_policy(&self) -> Result<LimitPolicy> {
        let offset = FixedOffset::east_opt(self.utc_offset_seconds).with_context(|| {
            format!("utc_offset_seconds {} is out of range", self.utc_offset_seconds)
        })?;
        Ok(LimitPolicy::new(self.daily_limit, offset))
    }
}
