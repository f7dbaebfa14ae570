//! Runtime configuration: reporting timezone, rounding defaults and the B2B
//! VAT jurisdiction table.

use crate::core::currency::DEFAULT_PRECISION;
use crate::core::party::CountryCode;
use crate::core::period::{PeriodError, ReportingClock};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Timezone(#[from] PeriodError),
    #[error("VAT rate {rate} for {operating}/{merchant} must be within [0, 1)")]
    InvalidRate {
        operating: CountryCode,
        merchant: CountryCode,
        rate: f64,
    },
    #[error("VAT rule is missing a country code")]
    MissingCountry,
    #[error("rounding precision {0} exceeds 28 fractional digits")]
    InvalidPrecision(u32),
}

/// B2B VAT applies to payouts between an operating company incorporated in
/// `operating_country` and a merchant incorporated in `merchant_country`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatRule {
    pub operating_country: CountryCode,
    pub merchant_country: CountryCode,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VatConfig {
    /// Only records created on or after this date are backfilled.
    pub cutoff: NaiveDate,
    pub rules: Vec<VatRule>,
}

impl Default for VatConfig {
    fn default() -> Self {
        Self {
            cutoff: NaiveDate::from_ymd_opt(2020, 5, 1).unwrap_or_default(),
            rules: vec![VatRule {
                operating_country: CountryCode::new("CY"),
                merchant_country: CountryCode::new("CY"),
                rate: 0.19,
            }],
        }
    }
}

impl VatConfig {
    /// Rate for the exact (operating, merchant) pair, zero when no rule matches.
    pub fn rate_for(&self, operating: &CountryCode, merchant: &CountryCode) -> f64 {
        self.rules
            .iter()
            .find(|r| &r.operating_country == operating && &r.merchant_country == merchant)
            .map(|r| r.rate)
            .unwrap_or(0.0)
    }

    /// True when some rule names `country` as the operating side.
    pub fn covers_operating_country(&self, country: &CountryCode) -> bool {
        self.rules.iter().any(|r| &r.operating_country == country)
    }

    /// The cutoff as a UTC instant (midnight UTC).
    pub fn cutoff_instant(&self) -> DateTime<Utc> {
        self.cutoff.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.rules {
            if rule.operating_country.is_empty() || rule.merchant_country.is_empty() {
                return Err(ConfigError::MissingCountry);
            }
            if !(0.0..1.0).contains(&rule.rate) {
                return Err(ConfigError::InvalidRate {
                    operating: rule.operating_country.clone(),
                    merchant: rule.merchant_country.clone(),
                    rate: rule.rate,
                });
            }
        }
        Ok(())
    }
}

/// Top-level settings, loadable from JSON. Missing keys take defaults.
///
/// ```
/// use royalty_settlement::config::SettlementConfig;
///
/// let json = r#"{ "reporting_timezone": "Europe/Berlin" }"#;
/// let config = SettlementConfig::from_json(json).unwrap();
/// assert_eq!(config.reporting_timezone, "Europe/Berlin");
/// assert_eq!(config.vat.rules.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// IANA timezone in which period boundaries are defined.
    pub reporting_timezone: String,
    /// Fractional digits used by the keyed rounder unless overridden.
    pub rounding_precision: u32,
    pub vat: VatConfig,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            reporting_timezone: "Europe/Moscow".to_string(),
            rounding_precision: DEFAULT_PRECISION,
            vat: VatConfig::default(),
        }
    }
}

impl SettlementConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock()?;
        if self.rounding_precision > 28 {
            return Err(ConfigError::InvalidPrecision(self.rounding_precision));
        }
        self.vat.validate()
    }

    pub fn clock(&self) -> Result<ReportingClock, ConfigError> {
        Ok(ReportingClock::from_name(&self.reporting_timezone)?)
    }
}
